//! HTTP API server for the Trust Hub node.
//!
//! REST endpoints for the agent operations plus a JSON-RPC 2.0 endpoint
//! accepting the same operations by method name.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;

use trusthub_agents::{
    AttestRequest, AttestationKind, AttestationResult, AuthorizationDecision, DecideRequest,
    ErrorCode, Request, ServiceError, VerifyOutcome, VerifyRequest,
};
use trusthub_identity::IssuerRole;

use crate::state::AppState;

// --- Response types ---

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub agents: Vec<AgentInfo>,
    pub uptime_secs: u64,
}

#[derive(Serialize)]
pub struct AgentInfo {
    pub kind: AttestationKind,
    pub method: String,
    pub issuer: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerInfo {
    pub id: String,
    pub role: IssuerRole,
    pub display_name: String,
    pub verification_method: String,
    pub public_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Serialize)]
pub struct RegistryResponse {
    pub issuers: Vec<IssuerInfo>,
    pub count: usize,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
        ErrorCode::StructuralValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::RequestConflict => StatusCode::CONFLICT,
        ErrorCode::MethodNotAvailable => StatusCode::NOT_FOUND,
        ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn api_error(e: ServiceError) -> ApiError {
    let code = e.code();
    tracing::warn!(code = %code, error = %e, "request failed");
    (
        status_for(code),
        Json(ErrorResponse {
            error: e.to_string(),
            code,
        }),
    )
}

/// Unwrap a JSON body, answering decode failures in the same error shape as
/// every other API failure.
fn decode_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        let error = rejection.body_text();
        tracing::debug!(%error, "request body rejected");
        (
            rejection.status(),
            Json(ErrorResponse {
                error,
                code: ErrorCode::InvalidRequest,
            }),
        )
    })
}

// --- Handlers ---

async fn handle_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        agents: state
            .dispatcher
            .attestation_agents()
            .into_iter()
            .map(|(kind, issuer)| AgentInfo {
                kind,
                method: kind.method().to_string(),
                issuer,
            })
            .collect(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn handle_registry(State(state): State<Arc<AppState>>) -> Json<RegistryResponse> {
    let issuers: Vec<IssuerInfo> = state
        .registry
        .iter()
        .map(|r| IssuerInfo {
            id: r.id.clone(),
            role: r.role,
            display_name: r.display_name.clone(),
            verification_method: r.verification_method.clone(),
            public_key: r.public_key.to_base64(),
            endpoint: r.endpoint.clone(),
        })
        .collect();
    let count = issuers.len();
    Json(RegistryResponse { issuers, count })
}

async fn handle_attest(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AttestRequest>, JsonRejection>,
) -> Result<Json<AttestationResult>, ApiError> {
    let req = decode_body(payload)?;
    state.dispatcher.attest(req).await.map(Json).map_err(api_error)
}

async fn handle_attest_kind(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    payload: Result<Json<AttestRequest>, JsonRejection>,
) -> Result<Json<AttestationResult>, ApiError> {
    let kind: AttestationKind = kind.parse().map_err(|error| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error,
                code: ErrorCode::InvalidRequest,
            }),
        )
    })?;
    let req = decode_body(payload)?;
    state
        .dispatcher
        .attest_as(kind, req)
        .await
        .map(Json)
        .map_err(api_error)
}

async fn handle_decide(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DecideRequest>, JsonRejection>,
) -> Result<Json<AuthorizationDecision>, ApiError> {
    let req = decode_body(payload)?;
    state.dispatcher.decide(req).await.map(Json).map_err(api_error)
}

async fn handle_verify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyOutcome>, ApiError> {
    let req = decode_body(payload)?;
    Ok(Json(state.dispatcher.verify(&req.credential)))
}

// --- JSON-RPC 2.0 ---

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;
const APPLICATION_ERROR: i64 = -32000;

fn rpc_error(id: Value, code: i64, message: impl Into<String>, data: Option<Value>) -> Value {
    let mut error = json!({ "code": code, "message": message.into() });
    if let Some(data) = data {
        error["data"] = data;
    }
    json!({ "jsonrpc": "2.0", "error": error, "id": id })
}

async fn handle_rpc(State(state): State<Arc<AppState>>, body: Bytes) -> Json<Value> {
    let envelope: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let detail = Some(json!(e.to_string()));
            return Json(rpc_error(Value::Null, PARSE_ERROR, "Parse error", detail));
        }
    };

    let id = envelope.get("id").cloned().unwrap_or(Value::Null);
    let method = match (
        envelope.get("jsonrpc").and_then(Value::as_str),
        envelope.get("method").and_then(Value::as_str),
    ) {
        (Some("2.0"), Some(method)) => method,
        _ => return Json(rpc_error(id, INVALID_REQUEST, "Invalid Request", None)),
    };

    if !state.dispatcher.supports(method) {
        tracing::debug!(%method, "unknown or unconfigured rpc method");
        return Json(rpc_error(id, METHOD_NOT_FOUND, "Method not found", None));
    }

    let params = envelope.get("params").cloned().unwrap_or(Value::Null);
    let request = match Request::from_parts(method, params) {
        Ok(r) => r,
        Err(e) => {
            return Json(rpc_error(
                id,
                INVALID_PARAMS,
                "Invalid params",
                Some(json!(e.to_string())),
            ))
        }
    };

    match state.dispatcher.dispatch(request).await {
        Ok(response) => Json(json!({ "jsonrpc": "2.0", "result": response, "id": id })),
        Err(e) => {
            let code = e.code();
            tracing::warn!(%method, code = %code, error = %e, "rpc call failed");
            Json(rpc_error(
                id,
                APPLICATION_ERROR,
                e.to_string(),
                Some(json!({ "code": code })),
            ))
        }
    }
}

// --- Server ---

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(handle_health))
        .route("/api/v1/registry", get(handle_registry))
        .route("/api/v1/attest", post(handle_attest))
        .route("/api/v1/attest/{kind}", post(handle_attest_kind))
        .route("/api/v1/decide", post(handle_decide))
        .route("/api/v1/verify", post(handle_verify))
        .route("/rpc", post(handle_rpc))
        .with_state(state)
}

pub async fn start_api_server(
    listen_addr: SocketAddr,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(%listen_addr, "HTTP API server started");
    axum::serve(listener, app).await?;
    Ok(())
}
