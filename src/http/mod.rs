//! HTTP surface: the generic scope endpoint plus structure, path and schema diagnostics.

pub mod types;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use indexmap::IndexMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::Config;
use crate::db::Db;
use crate::error::{Result, ScopeGraphError};
use crate::fetch::{policy_for, FetchOptions, Principal, ScopePolicy, SqliteRecordStore};
use crate::schema::SchemaCatalog;
use crate::scope::{count_by_type, fetch_attached, fetch_members};
use crate::traversal::{Cancellation, StructureNode, Traversal, TraversalParams};
use types::*;

/// Header naming the acting principal. Required whenever `[schema] principal_column` is set.
pub const PRINCIPAL_HEADER: &str = "x-principal";

/// HTTP server exposing traversal over the configured database
pub struct ScopeServer {
    state: AppState,
}

impl ScopeServer {
    /// Create a new HTTP server around a frozen catalog
    pub fn new(db: Db, catalog: SchemaCatalog, config: Config) -> Result<Self> {
        // API key is optional if authless mode is enabled
        let api_key = if config.http_server.authless {
            String::new()
        } else {
            std::env::var(&config.http_server.api_key_env).map_err(|_| {
                ScopeGraphError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or as an environment variable, or enable authless mode.",
                    config.http_server.api_key_env
                ))
            })?
        };

        let policy = policy_for(&config.schema, &catalog);
        Ok(Self {
            state: AppState {
                db,
                catalog: Arc::new(catalog),
                policy,
                api_key,
                allowed_origins: config.http_server.allowed_origins.clone(),
                authless: config.http_server.authless,
                config: Arc::new(config),
            },
        })
    }

    /// Run the HTTP server
    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            ScopeGraphError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to bind to {}: {}. Another scopegraph instance may be running; set http_server.port in config.toml to use a different port.",
                    addr, e
                ),
            ))
        })?;

        log::info!("Starting scopegraph HTTP server on http://{}", addr);
        log::info!("Scope endpoint: http://{}/scope", addr);

        axum::serve(listener, self.router()).await.map_err(|e| {
            ScopeGraphError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("HTTP server error: {}", e),
            ))
        })?;

        Ok(())
    }

    /// Create the axum router
    pub fn router(&self) -> Router {
        // Explicit origins keep CORS preflight consistent with `validate_origin`.
        let cors = if self.state.allowed_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<axum::http::HeaderValue> = self
                .state
                .allowed_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/scope", post(handle_scope))
            .route("/structure", post(handle_structure))
            .route("/path", post(handle_path))
            .route("/schema", get(handle_schema))
            .route("/health", get(handle_health))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(self.state.clone())
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    db: Db,
    catalog: Arc<SchemaCatalog>,
    config: Arc<Config>,
    policy: Arc<dyn ScopePolicy>,
    api_key: String,
    allowed_origins: Vec<String>,
    authless: bool,
}

impl AppState {
    /// Bearer key and Origin checks, both skipped in authless mode.
    fn authorize(&self, headers: &HeaderMap) -> std::result::Result<(), Response> {
        if self.authless {
            return Ok(());
        }
        validate_auth(headers, &self.api_key)?;
        validate_origin(headers, &self.allowed_origins)
    }

    /// Acting principal for a request. With principal scoping configured, a
    /// request that names nobody is refused rather than run unscoped.
    fn principal(&self, headers: &HeaderMap) -> Result<Option<Principal>> {
        let principal = principal_from(headers);
        if principal.is_none() && self.config.schema.principal_column.is_some() {
            return Err(ScopeGraphError::InvalidInput(format!(
                "{} header is required when principal scoping is configured",
                PRINCIPAL_HEADER
            )));
        }
        Ok(principal)
    }

    /// Run `f` against a SQLite store on a blocking thread.
    ///
    /// The traversal is cancelled if the request future is dropped mid-flight.
    async fn with_store<T, G>(&self, params: TraversalParams, f: G) -> Result<T>
    where
        T: Send + 'static,
        G: FnOnce(&Traversal<'_, SqliteRecordStore<'_>>, &TraversalParams) -> Result<T> + Send + 'static,
    {
        let guard = CancelOnDrop(Cancellation::new());
        let params = params.cancel_on(guard.0.clone());
        let catalog = Arc::clone(&self.catalog);
        let config = Arc::clone(&self.config);
        let policy = Arc::clone(&self.policy);

        let result = self
            .db
            .with_connection(move |conn| {
                let store = SqliteRecordStore::new(conn, &catalog)
                    .with_policy(policy.as_ref())
                    .with_archived_column(config.schema.archived_column.clone());
                f(&Traversal::new(&catalog, &store), &params)
            })
            .await;
        drop(guard);
        result
    }
}

struct CancelOnDrop(Cancellation);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn principal_from(headers: &HeaderMap) -> Option<Principal> {
    headers
        .get(PRINCIPAL_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(Principal::new)
}

/// Map an engine error onto a status code and JSON body
fn error_response(request_id: Uuid, err: ScopeGraphError) -> Response {
    let status = match &err {
        ScopeGraphError::InvalidRoot(_) => StatusCode::NOT_FOUND,
        ScopeGraphError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        ScopeGraphError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        log::error!("[{}] request failed: {}", request_id, err);
    } else {
        log::info!("[{}] request rejected: {}", request_id, err);
    }
    (
        status,
        Json(serde_json::json!({
            "error": err.to_string(),
            "request_id": request_id.to_string(),
        })),
    )
        .into_response()
}

/// Handle the generic scope endpoint
async fn handle_scope(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ScopeRequest>,
) -> Response {
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let request_id = Uuid::new_v4();
    let principal = match state.principal(&headers) {
        Ok(principal) => principal,
        Err(e) => return error_response(request_id, e),
    };
    log::info!(
        "[{}] scope {} {:?} kinds={:?}",
        request_id,
        request.traversal.root,
        request.traversal.direction,
        request.kinds
    );

    let params = request.traversal.params(&state.config.traversal, principal);
    let root = request.traversal.root;
    let kinds = request.kinds;
    let catalog = Arc::clone(&state.catalog);
    let config = Arc::clone(&state.config);

    let result = state
        .with_store(params, move |traversal, params| {
            let closure = traversal.closure_of(&root, params)?;
            let store_options = FetchOptions {
                principal: params.principal.as_ref(),
                include_archived: params.include_archived,
            };

            let mut records = IndexMap::new();
            for kind in kinds {
                let rows = if let Some(attachable) = config.attachable(&kind) {
                    fetch_attached(traversal.store(), &closure.scope, attachable, &store_options)?
                } else if catalog.contains(&kind) {
                    fetch_members(traversal.store(), &catalog, &closure.scope, &kind, &store_options)?
                } else {
                    return Err(ScopeGraphError::InvalidInput(format!(
                        "unknown kind '{}': not a cataloged type or configured attachable",
                        kind
                    )));
                };
                records.insert(kind, rows);
            }

            Ok(ScopeResponse {
                root: closure.root.clone(),
                generated_at: chrono::Utc::now().to_rfc3339(),
                depth_reached: closure.depth_reached,
                counts: count_by_type(&closure.scope, &catalog),
                records,
            })
        })
        .await;

    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(request_id, e),
    }
}

/// Handle nested structure requests
async fn handle_structure(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TraversalRequest>,
) -> Response {
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let request_id = Uuid::new_v4();
    log::info!("[{}] structure {} {:?}", request_id, request.root, request.direction);

    let principal = match state.principal(&headers) {
        Ok(principal) => principal,
        Err(e) => return error_response(request_id, e),
    };
    let params = request.params(&state.config.traversal, principal);
    let root = request.root;
    let result: Result<StructureNode> = state
        .with_store(params, move |traversal, params| traversal.structure_of(&root, params))
        .await;

    match result {
        Ok(tree) => (StatusCode::OK, Json(tree)).into_response(),
        Err(e) => error_response(request_id, e),
    }
}

/// Handle path diagnostics
async fn handle_path(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PathRequest>,
) -> Response {
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let request_id = Uuid::new_v4();
    log::info!("[{}] path {} -> {}", request_id, request.source, request.target);

    let principal = match state.principal(&headers) {
        Ok(principal) => principal,
        Err(e) => return error_response(request_id, e),
    };
    let params = request.traversal().params(&state.config.traversal, principal);
    let (source, target) = (request.source, request.target);
    let result = state
        .with_store(params, move |traversal, params| {
            let steps = traversal.explain_path(&source, &target, params)?;
            Ok(PathResponse {
                found: steps.is_some(),
                steps: steps.unwrap_or_default(),
                source,
                target,
            })
        })
        .await;

    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(request_id, e),
    }
}

/// Handle schema listing
async fn handle_schema(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(response) = state.authorize(&headers) {
        return response;
    }
    let catalog = &state.catalog;
    let body = SchemaResponse {
        fingerprint: catalog.fingerprint(),
        tables: catalog
            .tables()
            .map(|t| TableSummary {
                name: t.name.clone(),
                label: catalog.label(&t.name).to_string(),
                primary_key: t.primary_key.clone(),
                traversable: catalog.is_traversable(&t.name),
            })
            .collect(),
        relations: catalog.descriptors().cloned().collect(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Handle health check endpoint
async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "scopegraph",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

/// Validate Authorization header
fn validate_auth(headers: &HeaderMap, expected_key: &str) -> std::result::Result<(), Response> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({
                    "error": "Missing Authorization header",
                    "message": "Use 'Authorization: Bearer <api-key>' header"
                })),
            )
                .into_response()
        })?;

    let Some(provided_key) = auth_header.strip_prefix("Bearer ") else {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "Invalid Authorization header format",
                "message": "Use 'Authorization: Bearer <api-key>' header"
            })),
        )
            .into_response());
    };

    if provided_key != expected_key {
        return Err((
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "Invalid API key" })),
        )
            .into_response());
    }

    Ok(())
}

/// Validate Origin header (prevents DNS rebinding attacks)
fn validate_origin(headers: &HeaderMap, allowed_origins: &[String]) -> std::result::Result<(), Response> {
    // No configured origins: local development
    if allowed_origins.is_empty() {
        return Ok(());
    }

    // No origin header: direct request, not a browser
    let Some(origin) = headers.get("origin").and_then(|h| h.to_str().ok()) else {
        return Ok(());
    };

    if allowed_origins
        .iter()
        .any(|allowed| origin == allowed || origin.starts_with(&format!("{}://", allowed)))
    {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "Origin not allowed",
                "message": format!("Origin '{}' is not in the allowed origins list", origin)
            })),
        )
            .into_response())
    }
}
