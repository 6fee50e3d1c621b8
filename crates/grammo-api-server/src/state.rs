use axum::extract::FromRef;
use std::sync::Arc;

use crate::config::Settings;
use crate::services::SessionRegistry;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(settings: Settings, registry: Arc<SessionRegistry>) -> Self {
        Self {
            settings: Arc::new(settings),
            registry,
        }
    }
}

impl FromRef<AppState> for Arc<SessionRegistry> {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}

impl FromRef<AppState> for Arc<Settings> {
    fn from_ref(state: &AppState) -> Self {
        state.settings.clone()
    }
}
