use std::collections::HashMap;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use jsonwebtoken::EncodingKey;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::barcode::converter::{to_barcode, to_digitable_line};
use crate::cache::token::BearerToken;
use crate::cache::token_cache::TokenCache;
use crate::client::assertion::AssertionGenerator;
use crate::client::signing::{nonce_and_timestamp, query_string, CanonicalRequest, RequestSigner, SignedRequest};
use crate::client::types::{
    BankResponse, BilletRecord, RequestParams, TitleData, ValidationPayload, ValidationResponse,
};
use crate::config::client::ClientConfig;
use crate::error::{BilletError, Result, ServiceFailure};
use crate::observability::metrics::{get_metrics, OUTCOME_ERROR, OUTCOME_NOT_FOUND, OUTCOME_SUCCESS};
use crate::resilience::retry::RetrySettings;
use crate::utils::constants::{ENTRY_TYPE_BARCODE, JWT_BEARER_GRANT_TYPE, TOKEN_ROUTE, VALIDATION_ROUTE};

static CONSULT_OPERATION: &str = "consult_billet";
static MAKE_REQUEST_OPERATION: &str = "make_request";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Signed client for the bank's billet API.
///
/// Owns the bank host, client id and key, plus the bearer token cache. One
/// instance is meant to be built at startup and shared by reference.
pub struct BillingClient {
    host: String,
    agency: u32,
    token_ttl: Duration,
    http: Client,
    assertions: AssertionGenerator,
    signer: RequestSigner,
    tokens: TokenCache,
    retry: RetrySettings,
}

impl BillingClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let host = required(config.host, "Host")?.trim_end_matches('/').to_owned();
        let client_id = required(config.client_id, "ClientId")?;
        let private_key = required(config.private_key, "Private key")?;

        let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
            .map_err(|e| BilletError::configuration(format!("[Billet API] Private key is not a valid RSA PEM: {}", e)))?;

        let http = Client::builder()
            .timeout(StdDuration::from_millis(config.bank.http_timeout_ms))
            .build()
            .map_err(|e| BilletError::configuration(format!("cannot build HTTP client: {}", e)))?;

        let token_ttl = Duration::seconds(config.bank.token_ttl_seconds as i64);
        let assertions = AssertionGenerator::new(format!("{}{}", host, TOKEN_ROUTE), client_id, key.clone(), token_ttl);

        Ok(Self {
            host,
            agency: config.bank.agency,
            token_ttl,
            http,
            assertions,
            signer: RequestSigner::new(key),
            tokens: TokenCache::new(config.bank.safety_margin_seconds),
            retry: config.retry,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn token_cache(&self) -> &TokenCache {
        &self.tokens
    }

    /// Fresh RS256 bearer assertion for the token endpoint.
    pub fn generate_assertion(&self) -> Result<String> {
        self.assertions.generate()
    }

    /// Cached access token, renewed through `authenticate` when absent or stale.
    pub async fn get_token(&self) -> Result<String> {
        self.tokens
            .get_or_renew(|| self.authenticate())
            .await
            .map(|token| token.value)
    }

    /// Exchanges a bearer assertion for an access token valid for the configured TTL.
    pub async fn authenticate(&self) -> Result<BearerToken> {
        let metrics = get_metrics().await;
        let assertion = self.generate_assertion()?;
        let form = [("grant_type", JWT_BEARER_GRANT_TYPE), ("assertion", assertion.as_str())];

        let outcome = async {
            let response = self
                .http
                .post(self.endpoint(TOKEN_ROUTE))
                .form(&form)
                .send()
                .await
                .map_err(|e| format!("token request failed: {}", e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(format!("token endpoint responded {}: {}", status, body));
            }

            response
                .json::<TokenResponse>()
                .await
                .map_err(|e| format!("token response without access_token: {}", e))
        }
        .await;

        match outcome {
            Ok(TokenResponse { access_token }) if !access_token.is_empty() => {
                let expires_at = Utc::now() + self.token_ttl;
                info!("[Billet API] Successfully logged in");
                metrics.token_exchanges.with_label_values(&[OUTCOME_SUCCESS]).inc();
                metrics.token_expiry_unix.set(expires_at.timestamp());
                Ok(BearerToken::new(access_token, expires_at))
            }
            Ok(_) => {
                metrics.token_exchanges.with_label_values(&[OUTCOME_ERROR]).inc();
                Err(BilletError::Authentication("token endpoint returned an empty access_token".into()))
            }
            Err(message) => {
                warn!("[Billet API] {}", message);
                metrics.token_exchanges.with_label_values(&[OUTCOME_ERROR]).inc();
                Err(BilletError::Authentication(message))
            }
        }
    }

    /// Signs `params` with the given or cached token.
    pub async fn sign_request(&self, params: &RequestParams) -> Result<SignedRequest> {
        let method = params.method()?;
        let url = params.url().to_owned();
        let token = match &params.token {
            Some(token) => token.clone(),
            None => self.get_token().await?,
        };
        let payload = params
            .payload
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| BilletError::Signing(format!("cannot serialize payload: {}", e)))?;

        let (nonce, timestamp) = nonce_and_timestamp(Utc::now());
        let query = query_string(&params.query)?;
        let canonical = CanonicalRequest {
            method: &method,
            url: &url,
            query: &query,
            payload: payload.as_deref().unwrap_or(""),
            token: &token,
            nonce: &nonce,
            timestamp: &timestamp,
        };
        let signature = self.signer.sign_canonical(&canonical)?;
        let headers = SignedRequest::build_headers(&nonce, &timestamp, &signature, &token)?;

        Ok(SignedRequest {
            method,
            url,
            query,
            payload,
            nonce,
            timestamp,
            signature,
            token,
            headers,
        })
    }

    /// Validates a billet with the bank.
    ///
    /// `Ok(None)` means the bank answered but has no usable record for the
    /// input. Server-side and transport failures are retried with the
    /// configured backoff and then returned as retryable errors.
    pub async fn consult_billet(&self, input: &str) -> Result<Option<BilletRecord>> {
        let barcode = to_barcode(input)?;
        // a collection slip keeps its own 48-digit line
        let digitable_line = to_digitable_line(input)?;

        let metrics = get_metrics().await;
        let start = Instant::now();
        let payload = serde_json::to_value(ValidationPayload {
            agencia: self.agency,
            tipo_entrada: ENTRY_TYPE_BARCODE,
            dados_entrada: &barcode,
        })
        .map_err(|e| BilletError::Signing(format!("cannot serialize payload: {}", e)))?;
        let params = RequestParams::new(http::Method::POST, VALIDATION_ROUTE).with_payload(payload);

        let outcome = self
            .retry
            .run_with_retry(|| async {
                let signed = self.sign_request(&params).await?;
                let response = self.send(&signed).await?;
                self.read_validation(response, &barcode).await
            })
            .await;

        metrics
            .bank_request_duration
            .with_label_values(&[CONSULT_OPERATION])
            .observe(start.elapsed().as_secs_f64());

        let label = match &outcome {
            Ok(Some(_)) => OUTCOME_SUCCESS,
            Ok(None) => OUTCOME_NOT_FOUND,
            Err(_) => OUTCOME_ERROR,
        };
        metrics.bank_requests.with_label_values(&[CONSULT_OPERATION, label]).inc();

        outcome?
            .map(|title| BilletRecord::from_title(barcode.clone(), digitable_line, title))
            .transpose()
            .or_else(|e| {
                warn!(barcode = %barcode, error = %e, "[Billet API] unusable title data");
                Ok(None)
            })
    }

    /// Issues an arbitrary signed call and relays the bank's answer.
    pub async fn make_request(&self, params: &RequestParams) -> Result<BankResponse> {
        let metrics = get_metrics().await;
        let start = Instant::now();

        let outcome = async {
            let signed = self.sign_request(params).await?;
            let response = self.send(&signed).await?;

            let status = response.status();
            let headers: HashMap<String, String> = response
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.to_string(), v.to_owned())))
                .collect();
            let data = read_body(response).await?;

            if !status.is_success() {
                return Err(BilletError::from(ServiceFailure::new(
                    Some(status.as_u16()),
                    format!("Request failed with status code {}", status.as_u16()),
                    Some(data),
                )));
            }

            Ok(BankResponse {
                status: status.as_u16(),
                headers,
                data,
            })
        }
        .await;

        metrics
            .bank_request_duration
            .with_label_values(&[MAKE_REQUEST_OPERATION])
            .observe(start.elapsed().as_secs_f64());
        let label = if outcome.is_ok() { OUTCOME_SUCCESS } else { OUTCOME_ERROR };
        metrics.bank_requests.with_label_values(&[MAKE_REQUEST_OPERATION, label]).inc();

        outcome
    }

    async fn send(&self, signed: &SignedRequest) -> Result<Response> {
        let mut url = self.endpoint(&signed.url);
        if !signed.query.is_empty() {
            url = format!("{}?{}", url, signed.query);
        }
        let mut request = self
            .http
            .request(signed.method.clone(), url)
            .headers(signed.headers.clone());
        if let Some(payload) = &signed.payload {
            request = request.body(payload.clone());
        }

        debug!(method = %signed.method, url = %signed.url, "sending signed request");
        request
            .send()
            .await
            .map_err(|e| BilletError::from(ServiceFailure::from_transport(&e)))
    }

    /// Maps the validation response: title data, `None` for client-side
    /// rejections, retryable error for server-side ones. A 401 drops the
    /// cached token.
    async fn read_validation(
        &self,
        response: Response,
        barcode: &str,
    ) -> Result<Option<TitleData>> {
        let status = response.status();
        let data = read_body(response).await?;

        if status.is_server_error() {
            return Err(BilletError::from(ServiceFailure::new(
                Some(status.as_u16()),
                message_of(&data, status),
                Some(data),
            )));
        }

        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }

        if !status.is_success() {
            warn!(barcode = %barcode, status = status.as_u16(), response = %data, "[Billet API] Could not consult billet");
            return Ok(None);
        }

        match serde_json::from_value::<ValidationResponse>(data) {
            Ok(body) => Ok(Some(body.consulta_fator_data_vencimento_response)),
            Err(e) => {
                warn!(barcode = %barcode, error = %e, "[Billet API] unexpected validation response");
                Ok(None)
            }
        }
    }

    fn endpoint(&self, route: &str) -> String {
        if route.starts_with('/') {
            format!("{}{}", self.host, route)
        } else {
            format!("{}/{}", self.host, route)
        }
    }
}

fn required(value: Option<String>, name: &str) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| BilletError::configuration(format!("[Billet API] {} not defined", name)))
}

/// JSON body, or the raw text as a JSON string when it is not JSON.
async fn read_body(response: Response) -> Result<Value> {
    let text = response
        .text()
        .await
        .map_err(|e| BilletError::from(ServiceFailure::from_transport(&e)))?;
    if text.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
}

fn message_of(data: &Value, status: StatusCode) -> String {
    ["message", "mensagem", "error"]
        .iter()
        .find_map(|key| data.get(key).and_then(Value::as_str))
        .map(str::to_owned)
        .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()))
}
