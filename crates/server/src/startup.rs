use axum::Router;
use configs::AppConfig;
use dotenvy::dotenv;
use service::persistence::{self, Persistence, PersistenceConfig, RestoreOutcome};
use service::runtime;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::auth::ServerState;
use crate::errors::StartupError;
use crate::routes;

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Load `.env`, then `config.toml` (if any) with environment overrides.
pub fn load_config() -> Result<AppConfig, StartupError> {
    dotenv().ok();
    AppConfig::load_and_validate().map_err(|e| StartupError::InvalidConfig(format!("{e:#}")))
}

/// Router over an already running persistence layer.
pub fn build_app(cfg: &AppConfig, persistence: &Persistence) -> Router {
    let state = ServerState::new(persistence.kv(), persistence.store().path(), cfg.api_key());
    routes::build_router(state, build_cors(), cfg.server.body_limit_bytes)
}

/// Create data directories and bring up persistence (restore + backup schedule).
pub async fn prepare(cfg: &AppConfig) -> Result<Persistence, StartupError> {
    runtime::ensure_env(&cfg.storage.path, &cfg.backup.path)
        .await
        .map_err(|e| StartupError::Runtime(e.to_string()))?;

    let persistence = persistence::init(PersistenceConfig::from_app(cfg)).await?;
    match persistence.restore_outcome() {
        RestoreOutcome::Restored(n) => info!(restored = n, "store restored from snapshot"),
        RestoreOutcome::Failed(e) => warn!(error = %e, "restore failed; continuing with what was loaded"),
        RestoreOutcome::NotNeeded | RestoreOutcome::NoSnapshot => {}
    }
    Ok(persistence)
}

/// Public entry: bring up persistence, then bind and serve until the task is dropped.
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    service::observability::init_metrics();
    if cfg.auth.api_key.is_none() {
        warn!("API_KEY not set; using the built-in development key");
    }

    let persistence = prepare(&cfg).await?;
    let app = build_app(&cfg, &persistence);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    let listener = tokio::net::TcpListener::bind((cfg.server.host.as_str(), cfg.server.port))
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;
    info!(addr = %listener.local_addr().map(|a| a.to_string()).unwrap_or(addr), "API listening");

    axum::serve(listener, app).await.map_err(|e| StartupError::Runtime(e.to_string()))?;
    // keep the backup schedule alive for as long as the server runs
    drop(persistence);
    Ok(())
}
