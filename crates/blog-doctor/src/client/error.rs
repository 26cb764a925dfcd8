//! Remote client errors
//!
//! Structured error carrying whatever the backend told us: SQLSTATE or
//! PostgREST code, HTTP status, message, hint and details.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad origin of a client error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientErrorKind {
    /// The backend answered with an error response
    Api,
    /// The request never reached the backend
    Network,
    /// The response could not be decoded
    Decode,
    /// The transport gave up waiting
    Timeout,
}

/// Remote client error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientError {
    pub kind: ClientErrorKind,
    /// Backend error code (`42P01`, `42501`, `PGRST205`, ...)
    pub code: Option<String>,
    /// HTTP status when a response was received
    pub status: Option<u16>,
    pub message: String,
    pub hint: Option<String>,
    pub details: Option<String>,
}

impl ClientError {
    fn new(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            status: None,
            message: message.into(),
            hint: None,
            details: None,
        }
    }

    /// Create an Api error
    pub fn api(status: Option<u16>, code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            ..Self::new(ClientErrorKind::Api, message)
        }
    }

    /// Create a Network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Network, message)
    }

    /// Create a Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Decode, message)
    }

    /// Create a Timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ClientErrorKind::Timeout, message)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Check if the request never reached the backend
    pub fn is_network(&self) -> bool {
        self.kind == ClientErrorKind::Network
    }

    /// Check if the transport timed out
    pub fn is_timeout(&self) -> bool {
        self.kind == ClientErrorKind::Timeout
    }

    /// Backend code, if any
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.code, self.status) {
            (Some(code), _) => write!(f, "[{}] {}", code, self.message),
            (None, Some(status)) => write!(f, "HTTP {}: {}", status, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ClientError {}
