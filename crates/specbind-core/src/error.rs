use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The API document itself is malformed.
///
/// Raised at load/registration time, never at request time. `Display` and
/// `Debug` render identically as `<InvalidSpecification: {message}>`.
#[derive(Clone, PartialEq, Eq, Error)]
#[error("<InvalidSpecification: {message}>")]
pub struct InvalidSpecification {
    pub message: String,
}

impl InvalidSpecification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Debug for InvalidSpecification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported Swagger version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidSpecification(#[from] InvalidSpecification),

    #[error("no handler registered for operationId '{0}'")]
    HandlerNotFound(String),

    #[error("{method} {path} has no operationId")]
    MissingOperationId { method: String, path: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}
