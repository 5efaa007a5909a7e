use chrono::{DateTime, Duration, Utc};

/// Access token issued by the bank's token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl BearerToken {
    pub fn new(value: String, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    /// Invalid once the wall clock passes `expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Due for renewal `safety_margin` before expiry.
    pub fn should_renew_at(&self, now: DateTime<Utc>, safety_margin: Duration) -> bool {
        self.value.is_empty() || self.is_expired_at(now + safety_margin)
    }
}
