// The HTTP adapter in front of a client talking to a mocked bank.

use std::sync::Arc;

use httpmock::Method::POST;
use httpmock::MockServer;
use reqwest::Client;
use serde_json::{json, Value};

use crate::config::settings::Settings;
use crate::observability::metrics::get_metrics;
use crate::server::server::{app, AppState};
use crate::tests::common::{spawn_axum, test_client, JoinHandle};
use crate::utils::constants::{TOKEN_ROUTE, VALIDATION_ROUTE};

async fn serve(bank: &MockServer, settings: Settings) -> (String, JoinHandle<()>) {
    let client = Arc::new(test_client(&bank.base_url()));
    let state = AppState::new(get_metrics().await, client);
    let (handle, addr) = spawn_axum(app(&settings, state)).await;
    (format!("http://{}", addr), handle)
}

async fn bank_with_token() -> MockServer {
    let bank = MockServer::start_async().await;
    bank.mock_async(|when, then| {
        when.method(POST).path(TOKEN_ROUTE);
        then.status(200).json_body(json!({ "access_token": "tok-srv" }));
    })
    .await;
    bank
}

#[tokio::test]
async fn consult_route_returns_the_record() {
    let bank = bank_with_token().await;
    bank.mock_async(|when, then| {
        when.method(POST).path(VALIDATION_ROUTE);
        then.status(200).json_body(json!({
            "consultaFatorDataVencimentoResponse": {
                "valorTitulo": 1234.5,
                "dataVencimento": 20250110,
                "nomeCedente": "FULANO DE TAL",
                "cnpjBeneficiario": 0,
                "cpfCnpjPagador": 1234567890u64
            }
        }));
    })
    .await;
    let (base, handle) = serve(&bank, Settings::default()).await;

    let response = Client::new()
        .get(format!("{}/consult-billet/34191790010104351004791020150008291070026000", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["digitable_line"], "34194.79104 20150.008298 10700.260002 1 79001010435100");
    assert_eq!(body["cpf_cnpj"], "01234567890");
    assert_eq!(body["amount"], "1234.50");
    assert_eq!(body["due_date"], "2025-01-10");

    handle.abort();
}

#[tokio::test]
async fn unknown_or_malformed_billet_is_a_400() {
    let bank = bank_with_token().await;
    bank.mock_async(|when, then| {
        when.method(POST).path(VALIDATION_ROUTE);
        then.status(404);
    })
    .await;
    let (base, handle) = serve(&bank, Settings::default()).await;

    for input in ["23797975500000370003381260007827139500006330", "123"] {
        let response = Client::new().get(format!("{}/consult-billet/{}", base, input)).send().await.unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "status": 400, "error": "Invalid bar code or digitable line" }));
    }

    handle.abort();
}

#[tokio::test]
async fn jwt_and_sign_routes() {
    let bank = bank_with_token().await;
    let (base, handle) = serve(&bank, Settings::default()).await;
    let http = Client::new();

    let jwt: Value = http.get(format!("{}/generate-jwt", base)).send().await.unwrap().json().await.unwrap();
    assert_eq!(jwt["jwt"].as_str().unwrap().split('.').count(), 3);

    let signed: Value = http
        .post(format!("{}/sign-request", base))
        .json(&json!({ "method": "post", "url": "/v1/x", "payload": { "a": 1 } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(signed["access_token"], "tok-srv");
    assert_eq!(signed["headers"]["authorization"], "Bearer tok-srv");
    for key in ["nonce", "timestamp", "signature"] {
        assert!(signed[key].as_str().is_some_and(|v| !v.is_empty()), "missing {key}");
    }

    handle.abort();
}

#[tokio::test]
async fn upstream_failure_keeps_its_status() {
    let bank = bank_with_token().await;
    bank.mock_async(|when, then| {
        when.method(POST).path("/v1/fail");
        then.status(409).body("conflito\n   de   dados");
    })
    .await;
    let (base, handle) = serve(&bank, Settings::default()).await;

    let response = Client::new()
        .post(format!("{}/make-request", base))
        .json(&json!({ "url": "/v1/fail" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 409);
    assert_eq!(body["message"], "bank responded 409: Request failed with status code 409");

    handle.abort();
}

#[tokio::test]
async fn metrics_route_follows_settings() {
    let bank = bank_with_token().await;
    let mut settings = Settings::default();
    settings.metrics.is_enabled = true;
    let (base, handle) = serve(&bank, settings).await;

    let response = Client::new().get(format!("{}/metrics", base)).send().await.unwrap();
    assert_eq!(response.status(), 200);

    let (disabled, disabled_handle) = serve(&bank, Settings::default()).await;
    let response = Client::new().get(format!("{}/metrics", disabled)).send().await.unwrap();
    assert_eq!(response.status(), 404);

    handle.abort();
    disabled_handle.abort();
}

#[tokio::test]
async fn barcode_route_converts_both_ways() {
    let bank = MockServer::start_async().await;
    let (base, handle) = serve(&bank, Settings::default()).await;
    let http = Client::new();

    for input in [
        "23797975500000370003381260007827139500006330",
        "23793.38128%2060007.827136%2095000.063305%207%2097550000037000",
    ] {
        let body: Value = http
            .get(format!("{}/cod-barras/{}", base, input))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            body,
            json!({
                "codBarras": "23797975500000370003381260007827139500006330",
                "linhaDigitavel": "23793.38128 60007.827136 95000.063305 7 97550000037000"
            })
        );
    }

    let response = http.get(format!("{}/cod-barras/12345", base)).send().await.unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 400);

    handle.abort();
}

#[tokio::test]
async fn make_request_relays_bank_headers_and_data() {
    let bank = bank_with_token().await;
    bank.mock_async(|when, then| {
        when.method(POST).path("/v1/pagamentos");
        then.status(201)
            .header("x-request-id", "req-7")
            .json_body(json!({ "id": 99, "situacao": "AGENDADO" }));
    })
    .await;
    let (base, handle) = serve(&bank, Settings::default()).await;

    let response = Client::new()
        .post(format!("{}/make-request", base))
        .json(&json!({ "url": "/v1/pagamentos", "payload": { "valor": 10 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 201);
    assert_eq!(response.headers()["x-request-id"], "req-7");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "id": 99, "situacao": "AGENDADO" }));

    handle.abort();
}
