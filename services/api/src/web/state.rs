//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use courseforge_core::ports::{
    ChatService, ContentAnalysisService, ContentGenerationService, DatabaseService,
};

use crate::config::Config;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub config: Arc<Config>,
    pub analysis_adapter: Arc<dyn ContentAnalysisService>,
    pub chat_adapter: Arc<dyn ChatService>,
    pub generation_adapter: Arc<dyn ContentGenerationService>,
}
