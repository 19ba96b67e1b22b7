// ABOUTME: HTTP GET readiness probe against a task's health endpoint.
// ABOUTME: 2xx is a pass; anything else (or no response in time) is not.

use async_trait::async_trait;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

use super::{HealthProbe, Outcome};

/// Probes `GET <address><path>` with a response deadline.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    path: String,
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            timeout,
        }
    }

    async fn get(&self, address: &str) -> Result<bool, String> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| format!("connect failed: {}", e))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| format!("handshake failed: {}", e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::trace!("health probe connection error: {}", e);
            }
        });

        let req = hyper::Request::builder()
            .method("GET")
            .uri(&self.path)
            .header("Host", address)
            .body(Empty::<bytes::Bytes>::new())
            .map_err(|e| format!("failed to build request: {}", e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| format!("request failed: {}", e))?;

        let status = resp.status();
        // Drain the body so the connection closes cleanly.
        let _ = resp.into_body().collect().await;

        Ok(status.is_success())
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    async fn probe(&self, address: &str) -> Outcome {
        match tokio::time::timeout(self.timeout, self.get(address)).await {
            Ok(Ok(true)) => Outcome::Pass,
            Ok(Ok(false)) => Outcome::Fail,
            // Connection errors count as failures, not timeouts.
            Ok(Err(e)) => {
                tracing::trace!("health probe failed for {}: {}", address, e);
                Outcome::Fail
            }
            Err(_elapsed) => Outcome::Timeout,
        }
    }
}
