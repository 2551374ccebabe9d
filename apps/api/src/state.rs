use std::sync::Arc;

use crate::config::Config;
use crate::generation::Pipeline;
use crate::llm_client::TextGenerator;
use crate::store::{InMemoryResultStore, ResultStore, SessionStore};
use crate::templates::TemplateStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    /// Pluggable result store. Default: process-local `InMemoryResultStore`.
    pub results: Arc<dyn ResultStore>,
    pub sessions: Arc<SessionStore>,
    pub config: Config,
}

impl AppState {
    /// Wires the pipeline and fresh in-memory stores around a generation backend.
    pub fn new(config: Config, generator: Arc<dyn TextGenerator>, templates: TemplateStore) -> Self {
        let pipeline = Pipeline::new(generator, Arc::new(templates), config.genai_model.clone());
        Self {
            pipeline: Arc::new(pipeline),
            results: Arc::new(InMemoryResultStore::new()),
            sessions: Arc::new(SessionStore::new()),
            config,
        }
    }

    /// True when no default credential is configured; callers may still send their own.
    pub fn mock_mode(&self) -> bool {
        self.config.genai_api_key.is_none()
    }
}
