// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::routing::post;
use axum::{Form, Json};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use http::{HeaderMap, StatusCode};
use jsonwebtoken::{Algorithm, DecodingKey};

use crate::client::billing_client::BillingClient;
use crate::client::signing::{HEADER_NONCE, HEADER_SIGNATURE, HEADER_TIMESTAMP, SIGNATURE_ALGORITHM};
use crate::config::client::ClientConfig;
use crate::config::settings::BankSettings;
use crate::resilience::retry::RetrySettings;
use crate::utils::constants::{JWT_BEARER_GRANT_TYPE, TOKEN_ROUTE};

pub fn test_private_key() -> &'static str {
    include_str!("../fixtures/test_private_key.pem")
}

pub fn test_public_key() -> &'static str {
    include_str!("../fixtures/test_public_key.pem")
}

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

/// Millisecond backoff so retry tests stay fast.
pub fn fast_retry() -> RetrySettings {
    RetrySettings { attempts: 3, base_delay_ms: 1, max_delay_ms: 2 }
}

pub fn test_client(host: &str) -> BillingClient {
    test_client_with(host, BankSettings::default())
}

pub fn test_client_with(host: &str, bank: BankSettings) -> BillingClient {
    let config = ClientConfig::new(host, "client-1", test_private_key())
        .with_bank(bank)
        .with_retry(fast_retry());
    BillingClient::new(config).expect("test client")
}

/// Token route answering `tok-1`, `tok-2`, ... and counting exchanges.
/// Requests without the JWT bearer grant are rejected with 400.
pub fn token_router(counter: Arc<AtomicUsize>) -> Router {
    Router::new().route(
        TOKEN_ROUTE,
        post(move |Form(form): Form<HashMap<String, String>>| {
            let counter = counter.clone();
            async move {
                let valid = form.get("grant_type").map(String::as_str) == Some(JWT_BEARER_GRANT_TYPE)
                    && form.get("assertion").is_some_and(|a| a.split('.').count() == 3);
                if !valid {
                    return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid_grant" })));
                }
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                (StatusCode::OK, Json(json!({ "access_token": format!("tok-{}", n), "token_type": "Bearer" })))
            }
        }),
    )
}

/// Rebuilds the canonical string from what the bank received and checks the
/// signature header against the public key.
pub fn verify_received(method: &str, path: &str, query: &str, headers: &HeaderMap, body: &str) -> bool {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let token = header("authorization").trim_start_matches("Bearer ");
    let canonical = [
        method,
        path,
        query,
        body,
        token,
        header(HEADER_NONCE),
        header(HEADER_TIMESTAMP),
        SIGNATURE_ALGORITHM,
    ]
    .join("\n");

    let Ok(raw) = STANDARD.decode(header(HEADER_SIGNATURE)) else {
        return false;
    };
    jsonwebtoken::crypto::verify(
        &URL_SAFE_NO_PAD.encode(raw),
        canonical.as_bytes(),
        &DecodingKey::from_rsa_pem(test_public_key().as_bytes()).unwrap(),
        Algorithm::RS256,
    )
    .unwrap_or(false)
}
