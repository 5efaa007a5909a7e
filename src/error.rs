//! Error taxonomy shared by every component of the crate.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::resilience::retry::Retryable;

pub type Result<T, E = BilletError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum BilletError {
    /// Missing or unusable host, client id or private key.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("picture '{0}' matches none of the alphanumeric, numeric or date grammars")]
    Grammar(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid bar code or digitable line: expected 44, 47 or 48 digits, got {digits}")]
    MalformedInput { digits: usize },

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("{0}")]
    ExternalService(ServiceFailure),
}

/// Normalized `{status, message, data}` view of a failed bank call.
///
/// `status` is `None` when no HTTP response was received at all
/// (connection refused, timeout, broken body).
#[derive(Debug, Clone, Serialize)]
pub struct ServiceFailure {
    pub status: Option<u16>,
    pub message: String,
    pub data: Option<Value>,
}

impl ServiceFailure {
    pub fn new(status: Option<u16>, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            status,
            message: message.into(),
            data,
        }
    }

    pub fn from_transport(err: &reqwest::Error) -> Self {
        Self::new(err.status().map(|s| s.as_u16()), err.to_string(), None)
    }

    pub fn is_retryable(&self) -> bool {
        self.status.map_or(true, |status| status >= 500)
    }
}

impl fmt::Display for ServiceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "bank responded {}: {}", status, self.message),
            None => write!(f, "bank unreachable: {}", self.message),
        }
    }
}

impl BilletError {
    pub fn validation(message: impl Into<String>) -> Self {
        BilletError::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        BilletError::Configuration(message.into())
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            BilletError::ExternalService(failure) => failure.is_retryable(),
            _ => false,
        }
    }
}

impl Retryable for BilletError {
    fn is_retryable(&self) -> bool {
        BilletError::is_retryable(self)
    }
}

impl From<ServiceFailure> for BilletError {
    fn from(failure: ServiceFailure) -> Self {
        BilletError::ExternalService(failure)
    }
}
