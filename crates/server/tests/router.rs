use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use service::{KvStore, MemoryKvStore};
use tower::Service;
use uuid::Uuid;

use server::auth::ServerState;
use server::routes;

const KEY: &str = "test-key";

fn cors() -> tower_http::cors::CorsLayer {
    tower_http::cors::CorsLayer::very_permissive()
}

fn scratch_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("snapkv_router_{}", Uuid::new_v4())).join(name)
}

fn build_app_with(store: Arc<MemoryKvStore>, db_path: PathBuf, body_limit: usize) -> Router {
    let state = ServerState::new(store, db_path, KEY);
    routes::build_router(state, cors(), body_limit)
}

fn build_app(store: Arc<MemoryKvStore>) -> Router {
    build_app_with(store, scratch_path("database.sqlite"), 10 * 1024 * 1024)
}

fn authed(method: &str, uri: &str, body: Option<Value>) -> anyhow::Result<Request<Body>> {
    let builder = Request::builder().method(method).uri(uri).header("authorization", KEY);
    Ok(match body {
        Some(v) => builder.header("content-type", "application/json").body(Body::from(serde_json::to_vec(&v)?))?,
        None => builder.body(Body::empty())?,
    })
}

async fn send(app: &Router, req: Request<Body>) -> anyhow::Result<(StatusCode, Value)> {
    let resp = app.clone().call(req).await?;
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes)? };
    Ok((status, body))
}

#[tokio::test]
async fn status_is_public() -> anyhow::Result<()> {
    let app = build_app(MemoryKvStore::new());
    let req = Request::builder().uri("/status").body(Body::empty())?;
    let (status, body) = send(&app, req).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "running"}));
    Ok(())
}

#[tokio::test]
async fn protected_routes_reject_missing_or_wrong_key() -> anyhow::Result<()> {
    let app = build_app(MemoryKvStore::new());

    let req = Request::builder().uri("/export").body(Body::empty())?;
    let (status, body) = send(&app, req).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, json!({"success": false, "error": "Unauthorized"}));

    let req = Request::builder().uri("/get/a").header("authorization", format!("Bearer {KEY}")).body(Body::empty())?;
    let (status, _) = send(&app, req).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn set_then_get_then_delete() -> anyhow::Result<()> {
    let store = MemoryKvStore::new();
    let app = build_app(store.clone());

    let (status, body) = send(&app, authed("POST", "/set", Some(json!({"key": "x", "value": 42})))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "key": "x", "value": 42}));
    assert_eq!(store.get("x").await?, Some(json!(42)));

    let (status, body) = send(&app, authed("GET", "/get/x", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "key": "x", "value": 42}));

    let (status, body) = send(&app, authed("DELETE", "/delete/x", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "key": "x"}));

    let (status, body) = send(&app, authed("GET", "/get/x", None)?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"success": false, "error": "Key not found"}));

    let (status, _) = send(&app, authed("DELETE", "/delete/x", None)?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn set_requires_key_and_value() -> anyhow::Result<()> {
    let app = build_app(MemoryKvStore::new());
    for body in [json!({"value": 1}), json!({"key": "", "value": 1}), json!({"key": "a"}), json!({"key": 7, "value": 1})] {
        let (status, resp) = send(&app, authed("POST", "/set", Some(body.clone()))?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
        assert_eq!(resp["error"], "key and value required");
    }
    Ok(())
}

#[tokio::test]
async fn null_value_is_stored_but_reads_as_missing() -> anyhow::Result<()> {
    let store = MemoryKvStore::new();
    let app = build_app(store.clone());

    let (status, _) = send(&app, authed("POST", "/set", Some(json!({"key": "n", "value": null})))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(store.has("n").await?);

    let (status, _) = send(&app, authed("GET", "/get/n", None)?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // has() still sees it, so delete succeeds
    let (status, _) = send(&app, authed("DELETE", "/delete/n", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn export_returns_every_entry() -> anyhow::Result<()> {
    let store = MemoryKvStore::with_entries([("a", json!(1)), ("b", json!({"nested": [true]}))]);
    let app = build_app(store);

    let (status, body) = send(&app, authed("GET", "/export", None)?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": {"a": 1, "b": {"nested": [true]}}, "count": 2}));
    Ok(())
}

#[tokio::test]
async fn import_merges_by_default_and_replaces_on_request() -> anyhow::Result<()> {
    let store = MemoryKvStore::with_entries([("a", json!(1)), ("b", json!(0))]);
    let app = build_app(store.clone());

    let (status, body) = send(&app, authed("POST", "/import", Some(json!({"data": {"b": 2, "c": 3}})))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "imported": 2, "mode": "merge"}));
    assert_eq!(store.len().await, 3);

    let (status, body) =
        send(&app, authed("POST", "/import", Some(json!({"data": {"z": "only"}, "replace": true})))?).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "imported": 1, "mode": "replace"}));
    assert_eq!(store.len().await, 1);
    assert_eq!(store.get("z").await?, Some(json!("only")));
    Ok(())
}

#[tokio::test]
async fn import_rejects_non_object_data() -> anyhow::Result<()> {
    let store = MemoryKvStore::with_entries([("a", json!(1))]);
    let app = build_app(store.clone());

    for body in [json!({}), json!({"data": [1, 2]}), json!({"data": "text"}), json!({"data": null, "replace": true})] {
        let (status, resp) = send(&app, authed("POST", "/import", Some(body))?).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["error"], "Valid data object required");
    }
    assert_eq!(store.len().await, 1);
    Ok(())
}

#[tokio::test]
async fn dbfile_missing_is_404() -> anyhow::Result<()> {
    let app = build_app(MemoryKvStore::new());
    let (status, body) = send(&app, authed("GET", "/dbfile", None)?).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Database file not found");
    Ok(())
}

#[tokio::test]
async fn dbfile_is_served_as_attachment() -> anyhow::Result<()> {
    let path = scratch_path("database.sqlite");
    let dir = path.parent().map(PathBuf::from).unwrap_or_default();
    tokio::fs::create_dir_all(&dir).await?;
    tokio::fs::write(&path, b"SQLite format 3\0fake").await?;

    let app = build_app_with(MemoryKvStore::new(), path.clone(), 1024);
    let resp = app.clone().call(authed("GET", "/dbfile", None)?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp.headers().get("content-disposition").and_then(|v| v.to_str().ok()).map(str::to_owned);
    assert_eq!(disposition.as_deref(), Some("attachment; filename=\"database.sqlite\""));
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"SQLite format 3\0fake");

    let _ = tokio::fs::remove_dir_all(&dir).await;
    Ok(())
}

#[tokio::test]
async fn dbfile_streams_files_larger_than_body_limit() -> anyhow::Result<()> {
    let path = scratch_path("database.sqlite");
    let dir = path.parent().map(PathBuf::from).unwrap_or_default();
    tokio::fs::create_dir_all(&dir).await?;
    let contents: Vec<u8> = (0..512 * 1024u32).map(|i| (i % 251) as u8).collect();
    tokio::fs::write(&path, &contents).await?;

    let app = build_app_with(MemoryKvStore::new(), path.clone(), 1024);
    let resp = app.clone().call(authed("GET", "/dbfile", None)?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp.headers().get("content-type").and_then(|v| v.to_str().ok()).map(str::to_owned);
    assert_eq!(content_type.as_deref(), Some("application/octet-stream"));
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    assert_eq!(bytes.len(), contents.len());
    assert_eq!(&bytes[..], &contents[..]);

    let _ = tokio::fs::remove_dir_all(&dir).await;
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_rejected() -> anyhow::Result<()> {
    let app = build_app_with(MemoryKvStore::new(), scratch_path("database.sqlite"), 1024);
    let big = "x".repeat(4096);
    let (status, _) = send(&app, authed("POST", "/set", Some(json!({"key": "big", "value": big})))?).await?;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}

#[tokio::test]
async fn metrics_and_openapi_are_public() -> anyhow::Result<()> {
    service::observability::init_metrics();
    let app = build_app(MemoryKvStore::new());

    let resp = app.clone().call(Request::builder().uri("/metrics").body(Body::empty())?).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let text = axum::body::to_bytes(resp.into_body(), usize::MAX).await?;
    assert!(String::from_utf8_lossy(&text).contains("snapkv_backups_total"));

    let (status, doc) = send(&app, Request::builder().uri("/openapi.json").body(Body::empty())?).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"].get("/set").is_some());
    Ok(())
}
