//! Application state provider.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::{
    app_context::AppState, config::ConfigManager, event::EventBus,
    providers::traits::AsyncProvider,
};

/// Builds the [`AppState`] from a loaded configuration.
///
/// Opening the driver directory does blocking file I/O, so it runs on the
/// blocking pool.
pub struct AppStateProvider {
    config_manager: ConfigManager,
    event_bus: EventBus,
}

impl AppStateProvider {
    pub const fn new(config_manager: ConfigManager, event_bus: EventBus) -> Self {
        Self {
            config_manager,
            event_bus,
        }
    }
}

#[async_trait]
impl AsyncProvider<Arc<AppState>> for AppStateProvider {
    async fn provide(&self) -> Result<Arc<AppState>> {
        let config_manager = self.config_manager.clone();
        let event_bus = self.event_bus.clone();

        let app_state =
            tokio::task::spawn_blocking(move || AppState::new(&config_manager, event_bus)).await?;
        Ok(Arc::new(app_state))
    }
}
