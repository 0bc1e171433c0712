//! Axum admin surface for triggering Product Hunt catalog syncs.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use toolmark_core::SyncResult;
use toolmark_storage::PgCatalogRepository;
use toolmark_sync::{SyncConfig, SyncEngine, SyncError, SyncRequest};
use tracing::{error, info, warn};

pub const CRATE_NAME: &str = "toolmark-web";

/// Header carrying the already-authenticated admin identity.
pub const ADMIN_ID_HEADER: &str = "x-admin-id";

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub fn new(engine: SyncEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }

    pub async fn from_env() -> anyhow::Result<Self> {
        let config = SyncConfig::from_env();
        let repo = PgCatalogRepository::connect(&config.database_url)
            .await
            .context("connecting catalog database")?;
        let engine = SyncEngine::from_config(&config, Arc::new(repo))?;
        Ok(Self::new(engine))
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing x-admin-id header")]
    Unauthorized,
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::Sync(SyncError::InvalidInput(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Sync(SyncError::Upstream(_)) => StatusCode::BAD_GATEWAY,
            ApiError::Sync(SyncError::Configuration(_) | SyncError::Catalog(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(%status, error = %self, "sync request failed");
        } else {
            warn!(%status, error = %self, "sync request rejected");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route("/api/admin/product-hunt/sync", post(product_hunt_sync_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("TOOLMARK_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::from_env().await?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "admin surface listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn product_hunt_sync_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SyncResult>, ApiError> {
    let admin = acting_admin(&headers).ok_or(ApiError::Unauthorized)?;
    let request = parse_request(&body)?;
    info!(admin, ?request, "product hunt sync requested");
    let result = state.engine.run(admin, &request).await?;
    Ok(Json(result))
}

fn acting_admin(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(ADMIN_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// An empty body is the default ranked sync.
fn parse_request(body: &[u8]) -> Result<SyncRequest, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SyncRequest::default());
    }
    serde_json::from_slice(body).map_err(|err| ApiError::BadRequest(err.to_string()))
}
