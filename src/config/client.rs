use std::fmt;

use crate::config::settings::{BankSettings, Settings};
use crate::error::{BilletError, Result};
use crate::resilience::retry::RetrySettings;

/// Everything a `BillingClient` needs. Credentials stay optional here so
/// that their absence is reported by the client constructor.
#[derive(Clone, Default)]
pub struct ClientConfig {
    pub host: Option<String>,
    pub client_id: Option<String>,
    /// PEM-encoded RSA private key
    pub private_key: Option<String>,
    pub bank: BankSettings,
    pub retry: RetrySettings,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, client_id: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            client_id: Some(client_id.into()),
            private_key: Some(private_key.into()),
            ..Self::default()
        }
    }

    pub fn with_settings(mut self, settings: &Settings) -> Self {
        self.bank = settings.bank.clone();
        self.retry = RetrySettings::from(settings.retry.as_ref());
        self
    }

    pub fn with_bank(mut self, bank: BankSettings) -> Self {
        self.bank = bank;
        self
    }

    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }
}

/// Inline PEM wins over a key file.
pub fn resolve_private_key(inline: Option<String>, file: Option<String>) -> Result<Option<String>> {
    match (inline, file) {
        (Some(pem), _) => Ok(Some(pem)),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| BilletError::configuration(format!("cannot read private key file {}: {}", path, e))),
        (None, None) => Ok(None),
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("host", &self.host)
            .field("client_id", &self.client_id)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("bank", &self.bank)
            .field("retry", &self.retry)
            .finish()
    }
}
