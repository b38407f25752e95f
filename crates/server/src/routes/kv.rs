//! Key-value handlers. All of them sit behind `require_api_key`.

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use service::storage::transfer::{self, ImportMode};
use service::ServiceError;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;

use crate::auth::ServerState;
use crate::errors::ApiError;

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    body.map(|Json(v)| v).map_err(|rej| ApiError::new(rej.status(), rej.body_text()))
}

/// Loose truthiness for the `replace` flag: `true`, non-zero numbers and
/// non-empty strings all count.
fn truthy(v: Option<&Value>) -> bool {
    match v {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

#[utoipa::path(
    post, path = "/set", tag = "kv",
    request_body = crate::openapi::SetRequestDoc,
    responses(
        (status = 200, description = "Stored", body = crate::openapi::KeyValueDoc),
        (status = 400, description = "key and value required", body = crate::openapi::ErrorDoc),
        (status = 403, description = "Unauthorized", body = crate::openapi::ErrorDoc)
    ),
    security(("api_key" = []))
)]
pub async fn set(State(state): State<ServerState>, body: Result<Json<Value>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    let body = json_body(body)?;
    let key = body.get("key").and_then(Value::as_str).filter(|k| !k.is_empty());
    let (Some(key), Some(value)) = (key, body.get("value")) else {
        return Err(ApiError::bad_request("key and value required"));
    };

    state.store.set(key, value.clone()).await?;
    info!(event = "set", key, "stored key");
    Ok(Json(json!({"success": true, "key": key, "value": value})))
}

#[utoipa::path(
    get, path = "/get/{key}", tag = "kv",
    params(("key" = String, Path, description = "Key to read")),
    responses(
        (status = 200, description = "Found", body = crate::openapi::KeyValueDoc),
        (status = 404, description = "Key not found", body = crate::openapi::ErrorDoc),
        (status = 403, description = "Unauthorized", body = crate::openapi::ErrorDoc)
    ),
    security(("api_key" = []))
)]
pub async fn get(State(state): State<ServerState>, Path(key): Path<String>) -> Result<Json<Value>, ApiError> {
    // a stored null reads the same as a missing key
    match state.store.get(&key).await? {
        Some(value) if !value.is_null() => Ok(Json(json!({"success": true, "key": key, "value": value}))),
        _ => Err(ServiceError::not_found("Key").into()),
    }
}

#[utoipa::path(
    delete, path = "/delete/{key}", tag = "kv",
    params(("key" = String, Path, description = "Key to remove")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Key not found", body = crate::openapi::ErrorDoc),
        (status = 403, description = "Unauthorized", body = crate::openapi::ErrorDoc)
    ),
    security(("api_key" = []))
)]
pub async fn delete(State(state): State<ServerState>, Path(key): Path<String>) -> Result<Json<Value>, ApiError> {
    if !state.store.has(&key).await? {
        return Err(ServiceError::not_found("Key").into());
    }
    state.store.delete(&key).await?;
    info!(event = "delete", key = %key, "deleted key");
    Ok(Json(json!({"success": true, "key": key})))
}

#[utoipa::path(
    get, path = "/export", tag = "kv",
    responses(
        (status = 200, description = "Every entry", body = crate::openapi::ExportDoc),
        (status = 403, description = "Unauthorized", body = crate::openapi::ErrorDoc)
    ),
    security(("api_key" = []))
)]
pub async fn export(State(state): State<ServerState>) -> Result<Json<Value>, ApiError> {
    let data = transfer::export_all(&*state.store).await?;
    let count = data.len();
    Ok(Json(json!({"success": true, "data": data, "count": count})))
}

#[utoipa::path(
    post, path = "/import", tag = "kv",
    request_body = crate::openapi::ImportRequestDoc,
    responses(
        (status = 200, description = "Imported", body = crate::openapi::ImportResponseDoc),
        (status = 400, description = "Valid data object required", body = crate::openapi::ErrorDoc),
        (status = 403, description = "Unauthorized", body = crate::openapi::ErrorDoc)
    ),
    security(("api_key" = []))
)]
pub async fn import(State(state): State<ServerState>, body: Result<Json<Value>, JsonRejection>) -> Result<Json<Value>, ApiError> {
    let mut body = json_body(body)?;
    let mode = ImportMode::from_replace_flag(truthy(body.get("replace")));
    let data = match body.get_mut("data").map(Value::take) {
        Some(Value::Object(data)) => data,
        _ => return Err(ApiError::bad_request("Valid data object required")),
    };

    let imported = transfer::import_all(&*state.store, data, mode).await?;
    Ok(Json(json!({"success": true, "imported": imported, "mode": mode.as_str()})))
}

#[utoipa::path(
    get, path = "/dbfile", tag = "kv",
    responses(
        (status = 200, description = "Raw SQLite file as an attachment"),
        (status = 404, description = "Database file not found", body = crate::openapi::ErrorDoc),
        (status = 403, description = "Unauthorized", body = crate::openapi::ErrorDoc)
    ),
    security(("api_key" = []))
)]
pub async fn dbfile(State(state): State<ServerState>, req: Request) -> Result<Response, ApiError> {
    if tokio::fs::metadata(&state.db_path).await.is_err() {
        return Err(ApiError::not_found("Database file not found"));
    }
    state.store.flush().await?;

    let served = ServeFile::new(&state.db_path).oneshot(req).await.unwrap_or_else(|never| match never {});
    if served.status() == StatusCode::NOT_FOUND {
        return Err(ApiError::not_found("Database file not found"));
    }
    let mut resp = served.map(Body::new);
    let headers = resp.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
    headers.insert(CONTENT_DISPOSITION, HeaderValue::from_static("attachment; filename=\"database.sqlite\""));
    info!(event = "dbfile_download", status = %resp.status(), "serving database file");
    Ok(resp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_flag_truthiness() {
        assert!(truthy(Some(&json!(true))));
        assert!(truthy(Some(&json!(1))));
        assert!(truthy(Some(&json!("yes"))));
        assert!(!truthy(None));
        assert!(!truthy(Some(&json!(false))));
        assert!(!truthy(Some(&json!(0))));
        assert!(!truthy(Some(&json!(""))));
        assert!(!truthy(Some(&Value::Null)));
    }
}
