use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use common::types::Status;
use utoipa::OpenApi;

use crate::errors::ApiError;
use crate::openapi::ApiDoc;

#[utoipa::path(
    get, path = "/status", tag = "system",
    responses((status = 200, description = "Process is up", body = crate::openapi::StatusDoc))
)]
pub async fn status() -> Json<Status> {
    Json(Status::running())
}

pub async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = service::observability::encode_metrics().map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(([(CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}

pub async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
