// Ad-hoc signed calls: the fake bank records what it received and checks the
// signature against the bytes that actually arrived.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::http::{HeaderMap, Method, Uri};
use axum::routing::any;
use http::StatusCode;
use serde_json::{json, Value};

use crate::client::signing::{HEADER_NONCE, HEADER_TIMESTAMP};
use crate::client::types::RequestParams;
use crate::error::BilletError;
use crate::tests::common::{spawn_axum, test_client, token_router, verify_received};

#[derive(Debug, Clone)]
struct Received {
    method: String,
    path: String,
    query: String,
    headers: HeaderMap,
    body: String,
}

type Inbox = Arc<Mutex<Vec<Received>>>;

/// Fake bank: token route plus a catch-all that records the request and
/// answers with `status` and `reply`.
async fn fake_bank(status: StatusCode, reply: Value) -> (String, Inbox, Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
    let inbox: Inbox = Arc::default();
    let tokens = Arc::new(AtomicUsize::new(0));
    let recorder = inbox.clone();

    let router = token_router(tokens.clone()).route(
        "/v1/{*rest}",
        any(move |method: Method, uri: Uri, headers: HeaderMap, body: String| {
            let recorder = recorder.clone();
            let reply = reply.clone();
            async move {
                recorder.lock().unwrap().push(Received {
                    method: method.to_string(),
                    path: uri.path().to_owned(),
                    query: uri.query().unwrap_or_default().to_owned(),
                    headers,
                    body,
                });
                (status, [("x-request-id", "req-42")], axum::Json(reply))
            }
        }),
    );
    let (handle, addr) = spawn_axum(router).await;
    (format!("http://{}", addr), inbox, tokens, handle)
}

#[tokio::test]
async fn payload_bytes_sent_are_the_bytes_signed() {
    let (host, inbox, _, handle) = fake_bank(StatusCode::OK, json!({ "ok": true })).await;
    let client = test_client(&host);

    let params = RequestParams::new(Method::POST, "/v1/pagamentos")
        .with_payload(json!({ "valor": 10.5, "descricao": "título à vista", "itens": [1, 2] }));
    let response = client.make_request(&params).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.data, json!({ "ok": true }));
    assert_eq!(response.headers.get("x-request-id").map(String::as_str), Some("req-42"));

    let received = inbox.lock().unwrap().pop().expect("request received");
    assert_eq!(received.method, "POST");
    assert_eq!(received.path, "/v1/pagamentos");
    assert_eq!(serde_json::from_str::<Value>(&received.body).unwrap(), params.payload.clone().unwrap());
    assert!(verify_received("POST", "/v1/pagamentos", "", &received.headers, &received.body));

    handle.abort();
}

#[tokio::test]
async fn query_is_signed_in_caller_order() {
    let (host, inbox, _, handle) = fake_bank(StatusCode::OK, json!([])).await;
    let client = test_client(&host);

    let params = RequestParams::new(Method::GET, "/v1/titulos")
        .with_query("status", "aberto")
        .with_query("agencia", "3995");
    client.make_request(&params).await.unwrap();

    let received = inbox.lock().unwrap().pop().expect("request received");
    assert_eq!(received.method, "GET");
    assert_eq!(received.query, "status=aberto&agencia=3995");
    assert_eq!(received.body, "");
    assert!(verify_received("GET", "/v1/titulos", "status=aberto&agencia=3995", &received.headers, ""));
    // a tampered query no longer matches
    assert!(!verify_received("GET", "/v1/titulos", "agencia=3995&status=aberto", &received.headers, ""));

    handle.abort();
}

#[tokio::test]
async fn encoded_query_is_the_signed_query() {
    let (host, inbox, _, handle) = fake_bank(StatusCode::OK, json!([])).await;
    let client = test_client(&host);

    let params = RequestParams::new(Method::GET, "/v1/titulos")
        .with_query("desde", "2024-03-05T12:00:00")
        .with_query("nome", "joão da silva");
    let signed = client.sign_request(&params).await.unwrap();
    client.make_request(&params).await.unwrap();

    let received = inbox.lock().unwrap().pop().expect("request received");
    assert_eq!(received.query, signed.query);
    assert_eq!(received.query, "desde=2024-03-05T12%3A00%3A00&nome=jo%C3%A3o+da+silva");
    assert!(verify_received("GET", "/v1/titulos", &received.query, &received.headers, ""));

    handle.abort();
}

#[tokio::test]
async fn non_success_status_is_normalized() {
    let (host, _, _, handle) = fake_bank(StatusCode::UNPROCESSABLE_ENTITY, json!({ "erro": "campo invalido" })).await;
    let client = test_client(&host);

    let err = client
        .make_request(&RequestParams::new(Method::PUT, "/v1/pagamentos/1"))
        .await
        .unwrap_err();

    match err {
        BilletError::ExternalService(failure) => {
            assert_eq!(failure.status, Some(422));
            assert_eq!(failure.message, "Request failed with status code 422");
            assert_eq!(failure.data, Some(json!({ "erro": "campo invalido" })));
        }
        other => panic!("unexpected error {other:?}"),
    }

    handle.abort();
}

#[tokio::test]
async fn server_error_is_not_retried_for_arbitrary_calls() {
    let (host, inbox, _, handle) = fake_bank(StatusCode::BAD_GATEWAY, json!({})).await;
    let client = test_client(&host);

    let err = client
        .make_request(&RequestParams::new(Method::POST, "/v1/pagamentos"))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(inbox.lock().unwrap().len(), 1);

    handle.abort();
}

#[tokio::test]
async fn explicit_token_skips_the_exchange() {
    let (host, _, tokens, handle) = fake_bank(StatusCode::OK, json!({})).await;
    let client = test_client(&host);

    let signed = client
        .sign_request(&RequestParams::new(Method::GET, "/v1/x").with_token("caller-token"))
        .await
        .unwrap();

    assert_eq!(signed.token, "caller-token");
    assert_eq!(signed.headers["authorization"], "Bearer caller-token");
    assert_eq!(signed.headers[HEADER_NONCE], signed.nonce.as_str());
    assert_eq!(signed.headers[HEADER_TIMESTAMP], signed.timestamp.as_str());
    assert!(signed.payload.is_none());
    assert_eq!(tokens.load(Ordering::SeqCst), 0);

    handle.abort();
}

#[tokio::test]
async fn default_params_sign_a_post_to_root() {
    let (host, _, tokens, handle) = fake_bank(StatusCode::OK, json!({})).await;
    let client = test_client(&host);

    let signed = client.sign_request(&RequestParams::default()).await.unwrap();
    assert_eq!(signed.method, Method::POST);
    assert_eq!(signed.url, "/");
    assert_eq!(signed.token, "tok-1");
    assert_eq!(tokens.load(Ordering::SeqCst), 1);

    let rendered = serde_json::to_value(&signed).unwrap();
    assert_eq!(rendered["access_token"], "tok-1");
    assert_eq!(rendered["headers"]["x-brad-algorithm"], "SHA256");
    assert!(rendered.get("payload").is_none());

    handle.abort();
}
