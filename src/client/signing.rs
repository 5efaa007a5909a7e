//! Canonical request signing.
//!
//! Every call to the bank carries an RSA/SHA-256 signature over eight
//! newline-separated lines:
//!
//! ```text
//! METHOD
//! /path
//! query string (form-urlencoded, exactly as sent)
//! JSON body
//! access token
//! nonce (epoch milliseconds)
//! timestamp (RFC 3339, millisecond precision, UTC)
//! SHA256
//! ```

use std::collections::BTreeMap;

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use http::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use jsonwebtoken::{Algorithm, EncodingKey};
use serde::Serialize;
use tracing::debug;

use crate::error::{BilletError, Result};

pub const SIGNATURE_ALGORITHM: &str = "SHA256";

pub const HEADER_ALGORITHM: &str = "x-brad-algorithm";
pub const HEADER_NONCE: &str = "x-brad-nonce";
pub const HEADER_TIMESTAMP: &str = "x-brad-timestamp";
pub const HEADER_SIGNATURE: &str = "x-brad-signature";

/// The attributes covered by a request signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest<'a> {
    pub method: &'a Method,
    pub url: &'a str,
    pub query: &'a str,
    pub payload: &'a str,
    pub token: &'a str,
    pub nonce: &'a str,
    pub timestamp: &'a str,
}

impl CanonicalRequest<'_> {
    pub fn to_canonical_string(&self) -> String {
        [
            self.method.as_str(),
            self.url,
            self.query,
            self.payload,
            self.token,
            self.nonce,
            self.timestamp,
            SIGNATURE_ALGORITHM,
        ]
        .join("\n")
    }
}

/// Nonce and timestamp of a request issued at `now`.
pub fn nonce_and_timestamp(now: DateTime<Utc>) -> (String, String) {
    (
        now.timestamp_millis().to_string(),
        now.to_rfc3339_opts(SecondsFormat::Millis, true),
    )
}

/// Form-urlencoded `k=v` pairs joined by `&`, in caller order. This text is
/// both signed and appended to the URL.
pub fn query_string(query: &[(String, String)]) -> Result<String> {
    serde_urlencoded::to_string(query).map_err(|e| BilletError::Signing(format!("cannot encode query: {}", e)))
}

#[derive(Clone)]
pub struct RequestSigner {
    key: EncodingKey,
}

impl RequestSigner {
    pub fn new(key: EncodingKey) -> Self {
        Self { key }
    }

    /// Base64 RSA PKCS#1 v1.5 SHA-256 signature of the UTF-8 `message`.
    pub fn sign(&self, message: &str) -> Result<String> {
        let url_safe = jsonwebtoken::crypto::sign(message.as_bytes(), &self.key, Algorithm::RS256)
            .map_err(|e| BilletError::Signing(e.to_string()))?;
        let raw = URL_SAFE_NO_PAD
            .decode(url_safe)
            .map_err(|e| BilletError::Signing(e.to_string()))?;
        Ok(STANDARD.encode(raw))
    }

    pub fn sign_canonical(&self, request: &CanonicalRequest<'_>) -> Result<String> {
        let canonical = request.to_canonical_string();
        debug!(canonical = %canonical, "signing request");
        self.sign(&canonical)
    }
}

/// A request ready to be sent: the exact payload bytes that were signed and
/// the credentials that go with them.
#[derive(Debug, Clone, Serialize)]
pub struct SignedRequest {
    #[serde(skip)]
    pub method: Method,
    #[serde(skip)]
    pub url: String,
    #[serde(skip)]
    /// encoded query, empty when there is none
    pub query: String,
    #[serde(skip)]
    pub payload: Option<String>,
    pub nonce: String,
    pub timestamp: String,
    pub signature: String,
    #[serde(rename = "access_token")]
    pub token: String,
    #[serde(serialize_with = "serialize_headers")]
    pub headers: HeaderMap,
}

impl SignedRequest {
    pub fn build_headers(nonce: &str, timestamp: &str, signature: &str, token: &str) -> Result<HeaderMap> {
        let value = |v: &str| HeaderValue::from_str(v).map_err(|e| BilletError::Signing(e.to_string()));

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(HeaderName::from_static(HEADER_ALGORITHM), HeaderValue::from_static(SIGNATURE_ALGORITHM));
        headers.insert(HeaderName::from_static(HEADER_NONCE), value(nonce)?);
        headers.insert(HeaderName::from_static(HEADER_TIMESTAMP), value(timestamp)?);
        headers.insert(HeaderName::from_static(HEADER_SIGNATURE), value(signature)?);
        headers.insert(AUTHORIZATION, value(&format!("Bearer {}", token))?);
        Ok(headers)
    }
}

fn serialize_headers<S: serde::Serializer>(headers: &HeaderMap, serializer: S) -> Result<S::Ok, S::Error> {
    let map: BTreeMap<&str, &str> = headers
        .iter()
        .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
        .collect();
    map.serialize(serializer)
}
