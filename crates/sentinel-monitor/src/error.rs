//! Error types for the monitor
//!
//! Every variant a poll cycle can produce is recoverable: the scheduler logs it
//! and keeps its cadence. Only `Config` can stop the process, and only at
//! start-up.

use std::time::Duration;

use sentinel_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MonitorError {
    #[error("Network failure: {0}")]
    Network(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error {status}: {}", .detail.as_deref().unwrap_or("API request failed"))]
    Api { status: u16, detail: Option<String> },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Session store error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse category of a [`MonitorError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    ApiError,
    MalformedResponse,
    Session,
    Config,
}

impl MonitorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MonitorError::Network(_) | MonitorError::Timeout(_) => ErrorKind::NetworkFailure,
            MonitorError::Api { .. } => ErrorKind::ApiError,
            MonitorError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            MonitorError::Session(_) => ErrorKind::Session,
            MonitorError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            MonitorError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            MonitorError::Api { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            MonitorError::MalformedResponse(err.to_string())
        } else if err.is_timeout() {
            MonitorError::Network(format!("request timed out: {}", err))
        } else {
            MonitorError::Network(err.to_string())
        }
    }
}

impl From<CoreError> for MonitorError {
    fn from(err: CoreError) -> Self {
        MonitorError::MalformedResponse(err.to_string())
    }
}

impl From<config::ConfigError> for MonitorError {
    fn from(err: config::ConfigError) -> Self {
        MonitorError::Config(err.to_string())
    }
}

pub type MonitorResult<T> = std::result::Result<T, MonitorError>;
