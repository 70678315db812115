// src/state.rs

use std::sync::Arc;

use axum::extract::FromRef;

use crate::{catalog::Catalog, config::Config, quiz::AttemptService, store::AttemptStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub attempts: AttemptService,
    pub config: Config,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>, store: Arc<dyn AttemptStore>, config: Config) -> Self {
        Self {
            attempts: AttemptService::new(catalog.clone(), store),
            catalog,
            config,
        }
    }
}

impl FromRef<AppState> for Arc<Catalog> {
    fn from_ref(state: &AppState) -> Self {
        state.catalog.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
