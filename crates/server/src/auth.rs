use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use service::KvStore;
use tracing::warn;

use crate::errors::ApiError;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct ServerState {
    pub store: Arc<dyn KvStore>,
    /// Store file offered by `GET /dbfile`.
    pub db_path: PathBuf,
    pub api_key: Arc<str>,
}

impl ServerState {
    pub fn new(store: Arc<dyn KvStore>, db_path: impl Into<PathBuf>, api_key: &str) -> Self {
        Self { store, db_path: db_path.into(), api_key: Arc::from(api_key) }
    }
}

/// Middleware: the `Authorization` header must equal the configured key exactly.
/// No scheme prefix is stripped.
pub async fn require_api_key(State(state): State<ServerState>, req: Request, next: Next) -> Result<Response, ApiError> {
    let presented = req.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if presented != Some(&*state.api_key) {
        warn!(method = %req.method(), path = %req.uri().path(), "rejected request with missing or wrong api key");
        return Err(ApiError::unauthorized());
    }
    Ok(next.run(req).await)
}
