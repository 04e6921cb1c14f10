//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use crate::auth::TokenRegistry;
use crate::config::Config;
use crate::entities::SqliteStore;
use crate::upstream::CompletionClient;

/// State shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (file + env derived).
    pub config: Arc<Config>,
    /// Credential store.
    pub store: Arc<SqliteStore>,
    /// Session tokens issued by `/login`.
    pub tokens: Arc<TokenRegistry>,
    /// Model provider behind `/relay`.
    pub upstream: Arc<dyn CompletionClient>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("tokens", &self.tokens.len())
            .finish_non_exhaustive()
    }
}
