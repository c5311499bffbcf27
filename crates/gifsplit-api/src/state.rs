//! Application state.

use std::sync::Arc;

use gifsplit_engine::{Engine, EngineConfig};
use gifsplit_media::{GifEncoder, SceneSegmenter};
use gifsplit_store::CacheStore;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub engine: Arc<Engine>,
}

impl AppState {
    /// Create new application state: open the store, resolve the FFmpeg
    /// tooling, and assemble the engine.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let engine_config = EngineConfig::from_env();
        let store = CacheStore::open(
            &engine_config.store_path,
            engine_config.max_jobs_stored,
        )
        .await?;
        let segmenter = SceneSegmenter::new(engine_config.encode_timeout_secs)?;
        let encoder = GifEncoder::new(
            engine_config.encode_timeout_secs,
            engine_config.merge_timeout_secs,
        )?;

        let engine = Engine::new(engine_config, store, Arc::new(segmenter), Arc::new(encoder));
        Ok(Self {
            config,
            engine: Arc::new(engine),
        })
    }
}
