use std::sync::Arc;

use backend::{
    build_rocket,
    config::{Config, StoreKind},
    redis_store::RedisStore,
    routes::AppState,
    service::SurveyService,
    store::{MemoryStore, SurveyStore},
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting survey server");
    let config = Config::load()?;

    let store: Arc<dyn SurveyStore> = match config.store {
        StoreKind::Redis => Arc::new(RedisStore::connect(&config.redis_url, &config.retry).await?),
        StoreKind::Memory => {
            warn!("Using the in-memory store: votes are lost on restart and not shared between replicas");
            Arc::new(MemoryStore::new())
        }
    };

    let state = AppState::new(SurveyService::new(store, config.retry), &config);
    if let Some(url) = &state.public_base_url {
        info!("Voting links will use {url}");
    }

    build_rocket(state, config.cors_origin.clone()).launch().await?;

    info!("Server shut down");
    Ok(())
}
