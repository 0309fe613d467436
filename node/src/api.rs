//! # HTTP API
//!
//! The axum router in front of the [`Gateway`]. Shop code asks for signed
//! redirect forms over JSON; the banks call back on the two callback paths,
//! by browser redirect (GET or POST) and by server pingback.
//!
//! ## Endpoints
//!
//! | Method   | Path               | Description                              |
//! |----------|--------------------|------------------------------------------|
//! | GET      | `/health`          | Liveness probe                           |
//! | GET      | `/banks`           | Bank choices, sorted for display         |
//! | POST     | `/payments`        | Build a signed payment redirect          |
//! | POST     | `/auth`            | Build a signed identification redirect   |
//! | GET/POST | `/banks/response/` | Payment callback                         |
//! | GET/POST | `/banks/auth/`     | Identification callback                  |
//! | GET      | `/metrics`         | Prometheus exposition                    |
//!
//! Callback bodies are read as raw bytes. The engine decodes them with the
//! bank's charset, so nothing here may run them through a UTF-8 extractor.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{FromRef, RawQuery, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use banklink::config::{auth_callback_url, callback_url, AUTH_CALLBACK_PATH, PAYMENT_CALLBACK_PATH};
use banklink::registry::BankChoice;
use banklink::{
    AuthRequestBuilder, BanklinkError, CallbackReply, Gateway, Language, PaymentRequestBuilder,
    RedirectForm, Status,
};

use crate::metrics::{metrics_handler, SharedMetrics};

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Gateway,
    pub metrics: SharedMetrics,
    /// Public base URL; callback URLs sent to the banks hang off it.
    pub base_url: String,
}

impl FromRef<AppState> for SharedMetrics {
    fn from_ref(state: &AppState) -> Self {
        state.metrics.clone()
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full [`Router`] with CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/banks", get(banks_handler))
        .route("/payments", post(create_payment_handler))
        .route("/auth", post(create_auth_handler))
        .route(
            PAYMENT_CALLBACK_PATH,
            get(payment_callback_query).post(payment_callback_body),
        )
        .route(
            AUTH_CALLBACK_PATH,
            get(auth_callback_query).post(auth_callback_body),
        )
        .route("/metrics", get(metrics_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /payments`.
#[derive(Debug, Deserialize)]
pub struct CreatePayment {
    pub bank: String,
    pub amount: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    pub message: String,
    pub redirect_to: String,
    #[serde(default)]
    pub redirect_on_failure: Option<String>,
    /// Locale such as `en-US`; picks the bank's page language.
    #[serde(default)]
    pub language: Option<String>,
}

/// Body of `POST /auth`.
#[derive(Debug, Deserialize)]
pub struct CreateAuth {
    pub bank: String,
    pub redirect_to: String,
    #[serde(default)]
    pub redirect_on_failure: Option<String>,
}

/// A redirect form as JSON: the fields in submission order, plus the
/// auto-submitting HTML for clients that just want to render it.
#[derive(Debug, Serialize)]
pub struct FormResponse {
    /// Transaction or authentication id.
    pub id: u64,
    pub bank: String,
    pub status: Status,
    pub action: String,
    pub encoding: String,
    pub fields: Vec<(String, String)>,
    pub html: String,
}

impl FormResponse {
    fn new(id: u64, bank: &str, status: Status, form: &RedirectForm) -> Self {
        Self {
            id,
            bank: bank.to_string(),
            status,
            action: form.action().to_string(),
            encoding: form.encoding().label().to_string(),
            fields: form.fields().to_vec(),
            html: form.to_html(),
        }
    }
}

/// Error body returned on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// A [`BanklinkError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub BanklinkError);

impl From<BanklinkError> for ApiError {
    fn from(err: BanklinkError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            BanklinkError::NotFound { .. } => StatusCode::NOT_FOUND,
            BanklinkError::Protocol(_) | BanklinkError::Authentication(_) => {
                StatusCode::BAD_REQUEST
            }
            BanklinkError::Configuration(_)
            | BanklinkError::InvariantViolation(_)
            | BanklinkError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.0.kind(), "request failed: {}", self.0);
        } else {
            tracing::warn!(kind = self.0.kind(), "request rejected: {}", self.0);
        }
        let body = ErrorResponse {
            error: self.0.to_string(),
            kind: self.0.kind().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /banks`: what a checkout page offers, in display order.
async fn banks_handler(State(state): State<AppState>) -> Json<Vec<BankChoice>> {
    Json(state.gateway.registry().bank_choices())
}

/// `POST /payments`
async fn create_payment_handler(
    State(state): State<AppState>,
    Json(body): Json<CreatePayment>,
) -> Result<Json<FormResponse>, ApiError> {
    let mut builder = PaymentRequestBuilder::new(body.bank.as_str())
        .amount(body.amount)
        .message(body.message)
        .return_url(callback_url(&state.base_url))
        .redirect_to(body.redirect_to);
    if let Some(currency) = body.currency {
        builder = builder.currency(currency);
    }
    if let Some(url) = body.redirect_on_failure {
        builder = builder.redirect_on_failure(url);
    }
    if let Some(locale) = body.language.as_deref() {
        builder = builder.language(Language::from_locale(locale));
    }

    let gateway = state.gateway.clone();
    let request = run_blocking(move || builder.build(&gateway)).await?;
    state.metrics.request_built("payment", &body.bank);
    let tx = &request.transaction;
    Ok(Json(FormResponse::new(tx.id, &tx.bank_name, tx.status, &request.form)))
}

/// `POST /auth`
async fn create_auth_handler(
    State(state): State<AppState>,
    Json(body): Json<CreateAuth>,
) -> Result<Json<FormResponse>, ApiError> {
    let mut builder = AuthRequestBuilder::new(body.bank.as_str())
        .return_url(auth_callback_url(&state.base_url))
        .redirect_to(body.redirect_to);
    if let Some(url) = body.redirect_on_failure {
        builder = builder.redirect_on_failure(url);
    }

    let gateway = state.gateway.clone();
    let request = run_blocking(move || builder.build(&gateway)).await?;
    state.metrics.request_built("auth", &body.bank);
    let auth = &request.authentication;
    Ok(Json(FormResponse::new(auth.id, &auth.bank_name, auth.status, &request.form)))
}

/// `GET /banks/response/`: browser return with the fields in the query.
async fn payment_callback_query(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Response {
    handle_payment(&state, Bytes::from(query.unwrap_or_default())).await
}

/// `POST /banks/response/`: browser return or server pingback.
async fn payment_callback_body(State(state): State<AppState>, body: Bytes) -> Response {
    handle_payment(&state, body).await
}

/// `GET /banks/auth/`
async fn auth_callback_query(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    handle_auth(&state, Bytes::from(query.unwrap_or_default())).await
}

/// `POST /banks/auth/`
async fn auth_callback_body(State(state): State<AppState>, body: Bytes) -> Response {
    handle_auth(&state, body).await
}

async fn handle_payment(state: &AppState, raw: Bytes) -> Response {
    let started = Instant::now();
    let gateway = state.gateway.clone();
    let result = run_blocking(move || gateway.payment_callback(&raw)).await;
    state
        .metrics
        .callback_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(callback) => {
            state.metrics.callback("payment", applied_label(callback.applied));
            match callback.reply {
                CallbackReply::Acknowledge(text) => (StatusCode::OK, text).into_response(),
                CallbackReply::Redirect(url) => redirect(&url),
            }
        }
        Err(err) => {
            state.metrics.callback("payment", err.0.kind());
            err.into_response()
        }
    }
}

async fn handle_auth(state: &AppState, raw: Bytes) -> Response {
    let started = Instant::now();
    let gateway = state.gateway.clone();
    let result = run_blocking(move || gateway.auth_callback(&raw)).await;
    state
        .metrics
        .callback_latency_seconds
        .observe(started.elapsed().as_secs_f64());

    match result {
        Ok(outcome) => {
            state.metrics.callback("auth", applied_label(outcome.applied));
            redirect(&outcome.redirect_url)
        }
        Err(err) => {
            state.metrics.callback("auth", err.0.kind());
            err.into_response()
        }
    }
}

/// Signing, verification and sled writes (each followed by a flush) block,
/// so they run on tokio's blocking pool instead of a worker thread.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce() -> banklink::Result<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(ApiError),
        Err(e) => Err(ApiError(BanklinkError::InvariantViolation(format!(
            "banklink task did not complete: {e}"
        )))),
    }
}

fn applied_label(applied: bool) -> &'static str {
    if applied {
        "applied"
    } else {
        "duplicate"
    }
}

/// 302 to `url`. Banks post the return form, and browsers follow a 302
/// from a POST with a GET, which is what the shop pages expect.
fn redirect(url: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, url.to_string())]).into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use banklink::codec::encode_form;
    use banklink::config::SERVICE_PAYMENT_SUCCESS;
    use banklink::crypto::keys::load_private_key;
    use banklink::simulator::{nordea_auth_response, BankSimulator};
    use banklink::{BankConfig, BankConfigRegistry, Encoding, FieldMap};
    use http_body_util::BodyExt;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BASE_URL: &str = "http://shop.example";

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../protocol/tests/fixtures")
            .join(name)
    }

    fn test_app_state() -> AppState {
        let registry = BankConfigRegistry::new(vec![
            BankConfig::ipizza(
                "swedbank",
                "https://banklink.example/swedbank",
                "uid100052",
                "HP",
                fixture("merchant_key.pem"),
                fixture("bank_pub.pem"),
            ),
            BankConfig::nordea(
                "nordea",
                "https://netbank.nordea.example/eid.jsp",
                "87654321",
                "LEHTI",
            ),
        ])
        .expect("registry");
        let metrics = Arc::new(crate::metrics::NodeMetrics::new().expect("metrics"));
        let gateway = Gateway::in_memory(Arc::new(registry));
        gateway.notifications().subscribe(metrics.clone());

        AppState {
            gateway,
            metrics,
            base_url: BASE_URL.into(),
        }
    }

    fn swedbank_bank() -> BankSimulator {
        let key = load_private_key("swedbank", &fixture("bank_key.pem")).expect("bank key");
        BankSimulator::new(key, "HP", "uid100052")
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>, Option<String>) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let location = resp
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = resp.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, body, location)
    }

    async fn get(router: &Router, path: &str) -> (StatusCode, Vec<u8>, Option<String>) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        send(router, req).await
    }

    async fn post_json(
        router: &Router,
        path: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let (status, bytes, _) = send(router, req).await;
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn post_form(
        router: &Router,
        path: &str,
        body: Vec<u8>,
    ) -> (StatusCode, Vec<u8>, Option<String>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap();
        send(router, req).await
    }

    fn form_fields(json: &serde_json::Value) -> FieldMap {
        json["fields"]
            .as_array()
            .unwrap()
            .iter()
            .map(|pair| {
                (
                    pair[0].as_str().unwrap().to_string(),
                    pair[1].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }

    async fn start_payment(router: &Router) -> serde_json::Value {
        let (status, json) = post_json(
            router,
            "/payments",
            serde_json::json!({
                "bank": "swedbank",
                "amount": "13.99",
                "message": "My cool payment",
                "redirect_to": "http://shop.example/thanks",
                "redirect_on_failure": "http://shop.example/cart",
                "language": "en-GB",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        json
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let router = create_router(test_app_state());
        let (status, body, _) = get(&router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn banks_are_listed_in_display_order() {
        let router = create_router(test_app_state());
        let (status, body, _) = get(&router, "/banks").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["nordea", "swedbank"]);
    }

    #[tokio::test]
    async fn payment_form_is_signed_and_points_back_here() {
        let router = create_router(test_app_state());
        let json = start_payment(&router).await;

        assert_eq!(json["id"], 1);
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["action"], "https://banklink.example/swedbank");
        let fields = form_fields(&json);
        assert_eq!(fields["VK_STAMP"], "1");
        assert_eq!(fields["VK_AMOUNT"], "13.99");
        assert_eq!(fields["VK_LANG"], "ENG");
        assert_eq!(fields["VK_RETURN"], "http://shop.example/banks/response/");
        assert!(!fields["VK_MAC"].is_empty());
        assert!(json["html"].as_str().unwrap().contains("document.forms"));
    }

    #[tokio::test]
    async fn payment_errors_map_to_status_codes() {
        let router = create_router(test_app_state());

        let (status, json) = post_json(
            &router,
            "/payments",
            serde_json::json!({
                "bank": "swedbank",
                "amount": "0",
                "message": "nothing",
                "redirect_to": "http://shop.example/thanks",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["kind"], "protocol");

        let (status, json) = post_json(
            &router,
            "/payments",
            serde_json::json!({
                "bank": "danske",
                "amount": "1.00",
                "message": "x",
                "redirect_to": "http://shop.example/thanks",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json["kind"], "configuration");
    }

    #[tokio::test]
    async fn pingback_then_browser_return() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let json = start_payment(&router).await;
        let request = form_fields(&json);
        let bank = swedbank_bank();

        let pingback = bank
            .encode(&bank.payment_response(&request, SERVICE_PAYMENT_SUCCESS, true).unwrap())
            .unwrap();
        let (status, body, _) = post_form(&router, "/banks/response/", pingback).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"request handled");

        let browser = bank
            .encode(&bank.payment_response(&request, SERVICE_PAYMENT_SUCCESS, false).unwrap())
            .unwrap();
        let query = String::from_utf8(browser).unwrap();
        let (status, _, location) = get(&router, &format!("/banks/response/?{query}")).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(location.as_deref(), Some("http://shop.example/thanks"));

        let tx = state.gateway.transactions().find_by_stamp(1).unwrap().unwrap();
        assert!(tx.is_completed());

        let (_, metrics, _) = get(&router, "/metrics").await;
        let metrics = String::from_utf8(metrics).unwrap();
        assert!(metrics.contains(r#"banklink_callbacks_total{kind="payment",outcome="applied"} 1"#));
        assert!(metrics.contains(r#"banklink_callbacks_total{kind="payment",outcome="duplicate"} 1"#));
        assert!(metrics.contains(r#"banklink_events_total{event="transaction_succeeded"} 1"#));
    }

    #[tokio::test]
    async fn forged_callback_is_rejected() {
        let state = test_app_state();
        let router = create_router(state.clone());
        let json = start_payment(&router).await;
        let bank = swedbank_bank();

        let mut response = bank
            .payment_response(&form_fields(&json), SERVICE_PAYMENT_SUCCESS, true)
            .unwrap();
        response.insert("VK_AMOUNT".into(), "0.01".into());
        let (status, body, _) =
            post_form(&router, "/banks/response/", bank.encode(&response).unwrap()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "authentication");

        let tx = state.gateway.transactions().find_by_stamp(1).unwrap().unwrap();
        assert!(tx.is_pending());
    }

    #[tokio::test]
    async fn unknown_stamp_is_not_found() {
        let router = create_router(test_app_state());
        let (status, body, _) =
            post_form(&router, "/banks/response/", b"VK_STAMP=41&VK_MAC=abc".to_vec()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.error, "transaction 41 not found");
    }

    #[tokio::test]
    async fn nordea_login_redirects_after_callback() {
        let router = create_router(test_app_state());
        let (status, json) = post_json(
            &router,
            "/auth",
            serde_json::json!({
                "bank": "nordea",
                "redirect_to": "http://shop.example/account",
                "redirect_on_failure": "http://shop.example/login",
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["encoding"], "ISO-8859-1");
        let request = form_fields(&json);
        assert_eq!(request["A01Y_RETLINK"], "http://shop.example/banks/auth/");

        let response =
            nordea_auth_response(&request, "LEHTI", "Testi Asiakas", "010101-123N").unwrap();
        let body = encode_form(&response, Encoding::Latin1).unwrap();
        let (status, _, location) = post_form(&router, "/banks/auth/", body.into_bytes()).await;
        assert_eq!(status, StatusCode::FOUND);
        assert_eq!(location.as_deref(), Some("http://shop.example/account"));
    }

    #[tokio::test]
    async fn callback_in_the_wrong_protocol_is_bad_request() {
        let router = create_router(test_app_state());
        let (_, json) = post_json(
            &router,
            "/auth",
            serde_json::json!({ "bank": "nordea", "redirect_to": "http://shop.example/account" }),
        )
        .await;
        let nonce = json["id"].as_u64().unwrap();

        let (status, body, _) =
            get(&router, &format!("/banks/auth/?VK_SERVICE=3013&VK_NONCE={nonce}&VK_MAC=AAAA")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(err.kind, "protocol");
    }

    #[tokio::test]
    async fn callback_without_mac_is_bad_request() {
        let router = create_router(test_app_state());
        let (status, _, _) = get(&router, "/banks/auth/?VK_NONCE=1").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _, _) = get(&router, "/banks/response/").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
