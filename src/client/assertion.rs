use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::error::{BilletError, Result};
use crate::utils::constants::ASSERTION_VERSION;

/// Claims of the JWT bearer assertion exchanged for an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// token endpoint URL
    pub aud: String,
    /// client identifier
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// issuance instant in milliseconds, unique per assertion
    pub jti: i64,
    pub ver: String,
}

#[derive(Clone)]
pub struct AssertionGenerator {
    audience: String,
    subject: String,
    key: EncodingKey,
    ttl: Duration,
}

impl AssertionGenerator {
    pub fn new(audience: String, subject: String, key: EncodingKey, ttl: Duration) -> Self {
        Self {
            audience,
            subject,
            key,
            ttl,
        }
    }

    pub fn claims_at(&self, now: DateTime<Utc>) -> AssertionClaims {
        AssertionClaims {
            aud: self.audience.clone(),
            sub: self.subject.clone(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
            jti: now.timestamp_millis(),
            ver: ASSERTION_VERSION.to_owned(),
        }
    }

    /// RS256-signed assertion issued at `now`.
    pub fn generate_at(&self, now: DateTime<Utc>) -> Result<String> {
        encode(&Header::new(Algorithm::RS256), &self.claims_at(now), &self.key)
            .map_err(|e| BilletError::Signing(format!("cannot sign bearer assertion: {}", e)))
    }

    pub fn generate(&self) -> Result<String> {
        self.generate_at(Utc::now())
    }
}
