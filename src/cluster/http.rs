// ABOUTME: HTTP implementations of the Scheduler and LoadBalancer traits.
// ABOUTME: One-shot hyper http1 connections against JSON control APIs.

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use tokio::net::TcpStream;

use crate::types::{ServiceName, TaskId};

use super::balancer::{BalancerError, DrainState, LoadBalancer};
use super::scheduler::{LaunchedTask, ScheduleError, Scheduler, TaskRunState, TaskSpec};

/// A one-shot JSON request against a control API.
///
/// Connection-per-request keeps the clients free of pooling state; the
/// orchestrator's call rates are a handful per second at most.
async fn request(
    addr: &str,
    method: &str,
    path: &str,
    body: Option<String>,
) -> Result<(StatusCode, bytes::Bytes), String> {
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| format!("failed to connect to {}: {}", addr, e))?;

    let io = TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| format!("HTTP handshake failed: {}", e))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!("control API connection error: {}", e);
        }
    });

    let mut builder = hyper::Request::builder()
        .method(method)
        .uri(path)
        .header("Host", addr);
    if body.is_some() {
        builder = builder.header("Content-Type", "application/json");
    }

    let req = builder
        .body(Full::new(bytes::Bytes::from(body.unwrap_or_default())))
        .map_err(|e| format!("failed to build request: {}", e))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| format!("request failed: {}", e))?;

    let status = resp.status();
    let collected = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| format!("failed to read response: {}", e))?;

    Ok((status, collected.to_bytes()))
}

fn body_text(bytes: &bytes::Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// =============================================================================
// Scheduler
// =============================================================================

/// Scheduler backed by the cluster's HTTP task API.
#[derive(Debug, Clone)]
pub struct HttpScheduler {
    addr: String,
}

impl HttpScheduler {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[derive(Deserialize)]
struct TaskStateResponse {
    state: TaskRunState,
}

#[async_trait]
impl Scheduler for HttpScheduler {
    async fn launch_task(&self, spec: &TaskSpec) -> Result<LaunchedTask, ScheduleError> {
        let body = serde_json::to_string(spec).map_err(|e| ScheduleError::Api(e.to_string()))?;

        let (status, bytes) = request(&self.addr, "POST", "/v1/tasks", Some(body))
            .await
            .map_err(ScheduleError::Unavailable)?;

        match status {
            StatusCode::CREATED | StatusCode::OK => serde_json::from_slice(&bytes)
                .map_err(|e| ScheduleError::Api(format!("malformed launch response: {}", e))),
            StatusCode::INSUFFICIENT_STORAGE | StatusCode::TOO_MANY_REQUESTS => {
                Err(ScheduleError::Capacity(body_text(&bytes)))
            }
            s if s.is_server_error() => Err(ScheduleError::Unavailable(body_text(&bytes))),
            s => Err(ScheduleError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }

    async fn task_state(&self, id: &TaskId) -> Result<TaskRunState, ScheduleError> {
        let path = format!("/v1/tasks/{}", id);
        let (status, bytes) = request(&self.addr, "GET", &path, None)
            .await
            .map_err(ScheduleError::Unavailable)?;

        match status {
            StatusCode::OK => {
                let resp: TaskStateResponse = serde_json::from_slice(&bytes)
                    .map_err(|e| ScheduleError::Api(format!("malformed state response: {}", e)))?;
                Ok(resp.state)
            }
            StatusCode::NOT_FOUND => Err(ScheduleError::NotFound(id.to_string())),
            s if s.is_server_error() => Err(ScheduleError::Unavailable(body_text(&bytes))),
            s => Err(ScheduleError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }

    async fn stop_task(&self, id: &TaskId) -> Result<(), ScheduleError> {
        let path = format!("/v1/tasks/{}/stop", id);
        let (status, bytes) = request(&self.addr, "POST", &path, None)
            .await
            .map_err(ScheduleError::Unavailable)?;

        match status {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            // Already gone counts as stopped.
            StatusCode::NOT_FOUND => Ok(()),
            s if s.is_server_error() => Err(ScheduleError::Unavailable(body_text(&bytes))),
            s => Err(ScheduleError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }

    async fn list_tasks(&self, service: &ServiceName) -> Result<Vec<LaunchedTask>, ScheduleError> {
        let path = format!("/v1/tasks?service={}", service);
        let (status, bytes) = request(&self.addr, "GET", &path, None)
            .await
            .map_err(ScheduleError::Unavailable)?;

        match status {
            StatusCode::OK => serde_json::from_slice(&bytes)
                .map_err(|e| ScheduleError::Api(format!("malformed list response: {}", e))),
            s if s.is_server_error() => Err(ScheduleError::Unavailable(body_text(&bytes))),
            s => Err(ScheduleError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }
}

// =============================================================================
// Load balancer
// =============================================================================

/// Load balancer backed by the target pool's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpBalancer {
    addr: String,
}

impl HttpBalancer {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[derive(Deserialize)]
struct DrainStateResponse {
    drain_state: DrainState,
}

#[async_trait]
impl LoadBalancer for HttpBalancer {
    async fn register(
        &self,
        service: &ServiceName,
        task: &TaskId,
        address: &str,
    ) -> Result<(), BalancerError> {
        let path = format!("/v1/pools/{}/targets", service);
        let body = serde_json::json!({ "task": task.as_str(), "address": address }).to_string();

        let (status, bytes) = request(&self.addr, "POST", &path, Some(body))
            .await
            .map_err(BalancerError::Unavailable)?;

        match status {
            StatusCode::NO_CONTENT | StatusCode::OK | StatusCode::CREATED => Ok(()),
            // Already registered is a no-op.
            StatusCode::CONFLICT => Ok(()),
            s if s.is_server_error() => Err(BalancerError::Unavailable(body_text(&bytes))),
            s => Err(BalancerError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }

    async fn begin_drain(
        &self,
        service: &ServiceName,
        task: &TaskId,
    ) -> Result<(), BalancerError> {
        let path = format!("/v1/pools/{}/targets/{}/drain", service, task);
        let (status, bytes) = request(&self.addr, "POST", &path, None)
            .await
            .map_err(BalancerError::Unavailable)?;

        match status {
            StatusCode::NO_CONTENT | StatusCode::OK => Ok(()),
            // Not in the pool: nothing to drain.
            StatusCode::NOT_FOUND => Ok(()),
            s if s.is_server_error() => Err(BalancerError::Unavailable(body_text(&bytes))),
            s => Err(BalancerError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }

    async fn drain_state(
        &self,
        service: &ServiceName,
        task: &TaskId,
    ) -> Result<DrainState, BalancerError> {
        let path = format!("/v1/pools/{}/targets/{}", service, task);
        let (status, bytes) = request(&self.addr, "GET", &path, None)
            .await
            .map_err(BalancerError::Unavailable)?;

        match status {
            StatusCode::OK => {
                let resp: DrainStateResponse = serde_json::from_slice(&bytes)
                    .map_err(|e| BalancerError::Api(format!("malformed drain response: {}", e)))?;
                Ok(resp.drain_state)
            }
            StatusCode::NOT_FOUND => Ok(DrainState::NotRegistered),
            s if s.is_server_error() => Err(BalancerError::Unavailable(body_text(&bytes))),
            s => Err(BalancerError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }

    async fn registered_targets(
        &self,
        service: &ServiceName,
    ) -> Result<Vec<TaskId>, BalancerError> {
        let path = format!("/v1/pools/{}/targets", service);
        let (status, bytes) = request(&self.addr, "GET", &path, None)
            .await
            .map_err(BalancerError::Unavailable)?;

        match status {
            StatusCode::OK => serde_json::from_slice(&bytes)
                .map_err(|e| BalancerError::Api(format!("malformed targets response: {}", e))),
            // Pool not created yet means no targets.
            StatusCode::NOT_FOUND => Ok(Vec::new()),
            s if s.is_server_error() => Err(BalancerError::Unavailable(body_text(&bytes))),
            s => Err(BalancerError::Api(format!("{}: {}", s, body_text(&bytes)))),
        }
    }
}
