// ABOUTME: Container image reference parsing and validation.
// ABOUTME: Handles formats like nginx, nginx:tag, registry/image:tag@digest.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed container image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        for c in input.chars() {
            if !c.is_ascii_alphanumeric()
                && c != '/'
                && c != ':'
                && c != '.'
                && c != '-'
                && c != '_'
                && c != '@'
            {
                return Err(ParseImageRefError::InvalidChar(c));
            }
        }

        let (without_digest, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // A colon only introduces a tag when it appears after the last slash;
        // otherwise it belongs to a registry port (registry:5000/app).
        let (name, tag) = match without_digest.rsplit_once(':') {
            Some((before, after)) if !after.contains('/') => {
                (before.to_string(), Some(after.to_string()))
            }
            _ => (without_digest.to_string(), None),
        };

        if name.is_empty() {
            return Err(ParseImageRefError::InvalidFormat(input.to_string()));
        }

        Ok(Self { name, tag, digest })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ImageRef::parse(&value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_name() {
        let r = ImageRef::parse("nginx").unwrap();
        assert_eq!(r.name(), "nginx");
        assert_eq!(r.tag(), None);
    }

    #[test]
    fn parses_name_and_tag() {
        let r = ImageRef::parse("myapp:2.1.0").unwrap();
        assert_eq!(r.name(), "myapp");
        assert_eq!(r.tag(), Some("2.1.0"));
    }

    #[test]
    fn registry_port_is_not_a_tag() {
        let r = ImageRef::parse("registry.internal:5000/team/app").unwrap();
        assert_eq!(r.name(), "registry.internal:5000/team/app");
        assert_eq!(r.tag(), None);
    }

    #[test]
    fn parses_digest() {
        let r = ImageRef::parse("app:v3@sha256:abcd1234").unwrap();
        assert_eq!(r.tag(), Some("v3"));
        assert_eq!(r.digest(), Some("sha256:abcd1234"));
    }

    #[test]
    fn display_round_trips() {
        let input = "registry.internal:5000/team/app:v3";
        assert_eq!(ImageRef::parse(input).unwrap().to_string(), input);
    }

    #[test]
    fn rejects_empty_and_invalid() {
        assert!(matches!(ImageRef::parse("  "), Err(ParseImageRefError::Empty)));
        assert!(matches!(
            ImageRef::parse("my app"),
            Err(ParseImageRefError::InvalidChar(' '))
        ));
    }
}
