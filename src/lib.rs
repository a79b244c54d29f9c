// src/lib.rs
// Public library surface for the service binary, the preview CLI and integration tests.

pub mod api;
pub mod auth;
pub mod config;
pub mod ingest;
pub mod leads;
pub mod metrics;
pub mod news;
pub mod settings;
pub mod store;
pub mod topics;

use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub use crate::api::{router, AppState};
pub use crate::config::AppConfig;
pub use crate::news::{EventType, PolicyBulletin, UnionBulletin};
pub use crate::topics::{generate_topics, generate_topics_at, Topic, TopicConfig};

use crate::store::{MemoryStore, NewsStore};

/// Install the global subscriber. Filter from `RUST_LOG`, default `newsdesk=info,warn`;
/// `LOG_FORMAT=json` switches to JSON lines. Safe to call more than once.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newsdesk=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

/// Wire config, store, collaborators and metrics into the full router.
pub async fn app() -> anyhow::Result<axum::Router> {
    let cfg = AppConfig::load_default()?;
    build_app(cfg)
}

/// Same as [`app`] with an explicit config.
pub fn build_app(cfg: AppConfig) -> anyhow::Result<axum::Router> {
    let store: Arc<dyn NewsStore> = match &cfg.store.snapshot_path {
        Some(p) => Arc::new(MemoryStore::with_snapshot(p)?),
        None => Arc::new(MemoryStore::new()),
    };
    let auth = auth::build_auth_provider(&cfg.auth);
    let leads = leads::build_leads_client(&cfg.leads);
    let metrics = metrics::Metrics::init(cfg.topics.window_days);

    info!(
        leads = leads.provider_name(),
        webhook_key = cfg.server.webhook_api_key.is_some(),
        window_days = cfg.topics.window_days,
        "newsdesk configured"
    );

    let state = AppState::new(cfg, store, auth, leads);
    Ok(router(state).merge(metrics.router()))
}
