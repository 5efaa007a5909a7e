use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::barcode::converter::{to_barcode, to_digitable_line};
use crate::client::billing_client::BillingClient;
use crate::client::types::RequestParams;
use crate::error::BilletError;
use crate::server::server::AppState;

static INVALID_INPUT_MSG: &str = "Invalid bar code or digitable line";
static SKIPPED_HEADERS: [&str; 5] = ["content-length", "content-type", "transfer-encoding", "connection", "keep-alive"];

#[derive(Clone)]
pub struct BilletState {
    client: Arc<BillingClient>,
}

impl BilletState {
    pub fn new(client: Arc<BillingClient>) -> Self {
        Self { client }
    }

    pub fn router(&self) -> Router<AppState> {
        for path in ["/cod-barras/{input}", "/consult-billet/{bar_code}", "/generate-jwt", "/sign-request", "/make-request"] {
            info!("served path: {}", path);
        }
        Router::new()
            .route("/cod-barras/{input}", get(convert_barcode))
            .route("/consult-billet/{bar_code}", get(consult_billet))
            .route("/generate-jwt", get(generate_jwt))
            .route("/sign-request", post(sign_request))
            .route("/make-request", post(make_request))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
}

impl IntoResponse for BilletError {
    fn into_response(self) -> Response {
        let status = status_of(&self);
        let body = ErrorBody {
            status: status.as_u16(),
            message: collapse_whitespace(&self.to_string()),
        };
        if status.is_server_error() {
            warn!(status = body.status, "{}", body.message);
        }
        (status, Json(body)).into_response()
    }
}

fn status_of(err: &BilletError) -> StatusCode {
    match err {
        BilletError::Grammar(_) | BilletError::Validation(_) | BilletError::MalformedInput { .. } => {
            StatusCode::BAD_REQUEST
        }
        BilletError::Authentication(_) => StatusCode::BAD_GATEWAY,
        BilletError::ExternalService(failure) => failure
            .status
            .and_then(|status| StatusCode::from_u16(status).ok())
            .unwrap_or(StatusCode::BAD_GATEWAY),
        BilletError::Configuration(_) | BilletError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Single-line message: whitespace runs and line breaks become one space.
pub fn collapse_whitespace(message: &str) -> String {
    message.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Conversion {
    cod_barras: String,
    linha_digitavel: String,
}

async fn convert_barcode(Path(input): Path<String>) -> Result<Json<Conversion>, BilletError> {
    Ok(Json(Conversion {
        cod_barras: to_barcode(&input)?,
        linha_digitavel: to_digitable_line(&input)?,
    }))
}

async fn consult_billet(State(state): State<AppState>, Path(bar_code): Path<String>) -> Response {
    match state.billet_state.client.consult_billet(&bar_code).await {
        Ok(Some(record)) => Json(record).into_response(),
        Ok(None) | Err(BilletError::MalformedInput { .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "status": 400, "error": INVALID_INPUT_MSG })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

async fn generate_jwt(State(state): State<AppState>) -> Result<Response, BilletError> {
    let jwt = state.billet_state.client.generate_assertion()?;
    Ok(Json(json!({ "jwt": jwt })).into_response())
}

async fn sign_request(
    State(state): State<AppState>,
    Json(params): Json<RequestParams>,
) -> Result<Response, BilletError> {
    let signed = state.billet_state.client.sign_request(&params).await?;
    Ok(Json(signed).into_response())
}

async fn make_request(
    State(state): State<AppState>,
    Json(params): Json<RequestParams>,
) -> Result<Response, BilletError> {
    let response = state.billet_state.client.make_request(&params).await?;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::OK);
    Ok((status, relayed_headers(&response.headers), Json(response.data)).into_response())
}

/// Bank response headers minus the ones describing the bank's own body framing.
fn relayed_headers(headers: &HashMap<String, String>) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !SKIPPED_HEADERS.contains(&name.to_ascii_lowercase().as_str()))
        .filter_map(|(name, value)| {
            Some((HeaderName::from_bytes(name.as_bytes()).ok()?, HeaderValue::from_str(value).ok()?))
        })
        .collect()
}
