use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::{self, ServerState};

pub mod kv;
pub mod system;

/// Build the full application router: public probes plus the key-protected
/// key-value routes.
pub fn build_router(state: ServerState, cors: CorsLayer, body_limit: usize) -> Router {
    let public = Router::new()
        .route("/status", get(system::status))
        .route("/metrics", get(system::metrics))
        .route("/openapi.json", get(system::openapi));

    let protected = Router::new()
        .route("/set", post(kv::set))
        .route("/get/:key", get(kv::get))
        .route("/delete/:key", delete(kv::delete))
        .route("/export", get(kv::export))
        .route("/import", post(kv::import))
        .route("/dbfile", get(kv::dbfile))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_api_key));

    public
        .merge(protected)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
