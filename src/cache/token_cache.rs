use std::future::Future;

use chrono::{Duration, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::cache::token::BearerToken;

/// Single-slot bearer token cache owned by one client.
///
/// Renewal is single-flight: the slot stays locked while a renewal is in
/// flight, so concurrent callers that find the token stale wait for that one
/// renewal instead of starting their own.
#[derive(Debug)]
pub struct TokenCache {
    slot: Mutex<Option<BearerToken>>,
    safety_margin: Duration,
}

impl TokenCache {
    pub fn new(safety_margin_seconds: u64) -> Self {
        Self {
            slot: Mutex::new(None),
            safety_margin: Duration::seconds(safety_margin_seconds as i64),
        }
    }

    /// Cached token, if present and not due for renewal.
    pub async fn get(&self) -> Option<BearerToken> {
        let slot = self.slot.lock().await;
        slot.as_ref()
            .filter(|token| !token.should_renew_at(Utc::now(), self.safety_margin))
            .cloned()
    }

    pub async fn set(&self, token: BearerToken) {
        *self.slot.lock().await = Some(token);
    }

    pub async fn invalidate(&self) {
        *self.slot.lock().await = None;
    }

    /// Returns the cached token or runs `renew` once to replace it.
    ///
    /// A failed or cancelled renewal leaves the previous content in place.
    pub async fn get_or_renew<F, Fut, E>(&self, renew: F) -> Result<BearerToken, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<BearerToken, E>>,
    {
        let mut slot = self.slot.lock().await;

        if let Some(token) = slot
            .as_ref()
            .filter(|token| !token.should_renew_at(Utc::now(), self.safety_margin))
        {
            debug!(expires_at = %token.expires_at, "using cached bearer token");
            return Ok(token.clone());
        }

        let token = renew().await?;
        *slot = Some(token.clone());
        Ok(token)
    }
}
