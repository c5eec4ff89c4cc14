// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code carried by a JSON-RPC error or a failed task result.
///
/// The server emits both numeric and string codes; the received shape is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    Number(i64),
    Text(String),
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCode::Number(n) => write!(f, "{n}"),
            ErrorCode::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Coarse classification of an [`XoError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Auth,
    Transport,
    Server,
    NotFound,
    Decode,
    Cancelled,
    Timeout,
    Validation,
    Invariant,
}

#[allow(clippy::result_large_err)]
#[derive(Debug, Error)]
pub enum XoError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Server error {code}: {message}")]
    Rpc {
        code: ErrorCode,
        message: String,
        data: Option<serde_json::Value>,
    },

    #[error("Task {task_id} ended with status {status}: {message}")]
    TaskFailed {
        task_id: String,
        status: String,
        message: String,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Server contract violation: {0}")]
    Invariant(String),
}

impl XoError {
    /// Classify the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            XoError::Config(_) => ErrorKind::Config,
            XoError::Auth(_) => ErrorKind::Auth,
            XoError::Transport(_) => ErrorKind::Transport,
            XoError::Http { status: 404, .. } | XoError::NotFound(_) => ErrorKind::NotFound,
            XoError::Http { .. } | XoError::Rpc { .. } | XoError::TaskFailed { .. } => {
                ErrorKind::Server
            }
            XoError::Decode(_) => ErrorKind::Decode,
            XoError::Cancelled => ErrorKind::Cancelled,
            XoError::Timeout(_) => ErrorKind::Timeout,
            XoError::Validation(_) => ErrorKind::Validation,
            XoError::Invariant(_) => ErrorKind::Invariant,
        }
    }

    /// HTTP status code, for errors produced by the REST transport.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            XoError::Http { status, .. } => Some(*status),
            XoError::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// `true` for server-reported errors, including not-found.
    #[must_use]
    pub fn is_server(&self) -> bool {
        matches!(self.kind(), ErrorKind::Server | ErrorKind::NotFound)
    }

    /// Whether a retry under the backoff mode may succeed.
    ///
    /// Transport failures, HTTP 5xx and HTTP 429 are transient; everything
    /// else is returned to the caller as-is.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            XoError::Transport(_) => true,
            XoError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        XoError::Validation(msg.into())
    }

    pub(crate) fn decode(msg: impl Into<String>) -> Self {
        XoError::Decode(msg.into())
    }
}

impl From<reqwest::Error> for XoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            XoError::Decode(err.to_string())
        } else if err.is_builder() {
            XoError::Config(err.to_string())
        } else {
            XoError::Transport(err.to_string())
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for XoError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::Url(e) => XoError::Config(e.to_string()),
            WsError::Http(resp) if resp.status() == http::StatusCode::UNAUTHORIZED => {
                XoError::Auth(format!("WebSocket upgrade rejected: {}", resp.status()))
            }
            other => XoError::Transport(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for XoError {
    fn from(err: serde_json::Error) -> Self {
        XoError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for XoError {
    fn from(err: url::ParseError) -> Self {
        XoError::Config(format!("Invalid URL: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, XoError>;
