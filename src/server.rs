//! JSON HTTP server.
//!
//! Exposes the session index over a small JSON API suitable for agent tool
//! integrations. Every tool is a `POST /tools/{name}` with a JSON body and
//! returns `{ "result": ... }`.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/tools/search` | Semantic search `{query, limit?, project?}` |
//! | `POST` | `/tools/meta` | Session metadata `{session_id}` |
//! | `POST` | `/tools/read` | Session turns `{session_id, types?, tools?, first?, last?, offset?, limit?}` |
//! | `POST` | `/tools/list` | Session listing `{project?, limit?, order_by?}` |
//! | `POST` | `/tools/sync` | Incremental index build `{force?, prune?}` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "query must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `embeddings_disabled` (400),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::index::{build_index, BuildOptions};
use crate::list::list;
use crate::meta::meta;
use crate::models::ListOrder;
use crate::progress::NoProgress;
use crate::reader::{read_session, ReadOptions};
use crate::search::search;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    /// Serializes index builds; there is only ever one writer.
    sync_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            config: Arc::new(config),
            embedder,
            sync_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// All routes with permissive CORS.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/search", post(handle_search))
        .route("/tools/meta", post(handle_meta))
        .route("/tools/read", post(handle_read))
        .route("/tools/list", post(handle_list))
        .route("/tools/sync", post(handle_sync))
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`. Runs until the process is terminated.
pub async fn run_server(config: &Config, embedder: Arc<dyn Embedder>) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(AppState::new(config.clone(), embedder));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "session index server listening");
    println!("Session index server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn embeddings_disabled() -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "embeddings_disabled".to_string(),
        message: "semantic search requires an embedding provider; set [embedding] provider in config"
            .to_string(),
    }
}

fn internal(err: anyhow::Error) -> AppError {
    tracing::error!(error = %format!("{:#}", err), "request failed");
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{:#}", err),
    }
}

fn result<T: Serialize>(value: T) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "result": value }))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /tools/search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    project: Option<String>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    if !state.config.embedding.is_enabled() {
        return Err(embeddings_disabled());
    }

    let limit = req.limit.unwrap_or(state.config.search.default_limit);
    let hits = search(
        &state.config,
        state.embedder.as_ref(),
        &req.query,
        limit,
        req.project.as_deref(),
    )
    .await
    .map_err(internal)?;

    Ok(result(hits))
}

// ============ POST /tools/meta ============

#[derive(Deserialize)]
struct MetaRequest {
    session_id: String,
}

async fn handle_meta(
    State(state): State<AppState>,
    Json(req): Json<MetaRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    match meta(&state.config, &req.session_id).await.map_err(internal)? {
        Some(m) => Ok(result(m)),
        None => Err(not_found(format!("session not found: {}", req.session_id))),
    }
}

// ============ POST /tools/read ============

#[derive(Deserialize)]
struct ReadRequest {
    session_id: String,
    #[serde(flatten)]
    options: ReadOptions,
}

async fn handle_read(
    State(state): State<AppState>,
    Json(req): Json<ReadRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let turns = read_session(&state.config, &req.session_id, &req.options)
        .await
        .map_err(internal)?;
    Ok(result(turns))
}

// ============ POST /tools/list ============

#[derive(Deserialize, Default)]
#[serde(default)]
struct ListRequest {
    project: Option<String>,
    limit: Option<usize>,
    order_by: ListOrder,
}

async fn handle_list(
    State(state): State<AppState>,
    Json(req): Json<ListRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let sessions = list(
        &state.config,
        req.project.as_deref(),
        req.limit.unwrap_or(20),
        req.order_by,
    )
    .await
    .map_err(internal)?;
    Ok(result(sessions))
}

// ============ POST /tools/sync ============

#[derive(Deserialize, Default)]
#[serde(default)]
struct SyncRequest {
    force: bool,
    prune: bool,
}

async fn handle_sync(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let _guard = state.sync_lock.lock().await;
    let options = BuildOptions {
        force: req.force,
        prune: req.prune,
        verbose: false,
    };
    let stats = build_index(&state.config, state.embedder.as_ref(), options, &NoProgress)
        .await
        .map_err(internal)?;
    Ok(result(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::DisabledEmbedder;
    use tempfile::TempDir;

    async fn spawn(config: Config) -> String {
        let app = router(AppState::new(config, Arc::new(DisabledEmbedder)));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    #[tokio::test]
    async fn health_and_error_contract() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::with_dirs(tmp.path().join("projects"), tmp.path().join("index"));
        config.embedding.provider = "disabled".to_string();
        let base = spawn(config).await;
        let client = client();

        let health: serde_json::Value = client
            .get(format!("{}/health", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "ok");

        let resp = client
            .post(format!("{}/tools/meta", base))
            .json(&serde_json::json!({"session_id": "nope"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "not_found");

        let resp = client
            .post(format!("{}/tools/search", base))
            .json(&serde_json::json!({"query": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);

        let resp = client
            .post(format!("{}/tools/search", base))
            .json(&serde_json::json!({"query": "auth"}))
            .send()
            .await
            .unwrap();
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["error"]["code"], "embeddings_disabled");

        let body: serde_json::Value = client
            .post(format!("{}/tools/list", base))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["result"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn sync_then_read() {
        let tmp = TempDir::new().unwrap();
        let project = tmp.path().join("projects/-work-alpha");
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            project.join("s1.jsonl"),
            concat!(
                r#"{"type":"user","message":{"content":"hello"},"cwd":"/work/alpha"}"#,
                "\n",
                r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#,
                "\n"
            ),
        )
        .unwrap();
        let mut config = Config::with_dirs(tmp.path().join("projects"), tmp.path().join("index"));
        config.embedding.provider = "disabled".to_string();
        let base = spawn(config).await;
        let client = client();

        let body: serde_json::Value = client
            .post(format!("{}/tools/sync", base))
            .json(&serde_json::json!({}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["result"]["indexed"], 1);

        let body: serde_json::Value = client
            .post(format!("{}/tools/read", base))
            .json(&serde_json::json!({"session_id": "s1", "types": ["assistant"]}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            body["result"],
            serde_json::json!([{"type": "assistant", "content": "hi"}])
        );
    }
}
