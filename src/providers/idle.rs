use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    app_context::AppState,
    idle::{IdleEventRouter, IdleEventSource},
    idle_sources::LogindIdleSource,
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Dims the keyboard while the session is idle.
///
/// Listens to logind unless a source was injected. Without a system bus
/// the service fails to start and the daemon keeps running with stats only.
///
/// # Priority and Criticality
///
/// - **Priority**: 8
/// - **Critical**: No
pub struct IdleServiceProvider {
    state: Arc<AppState>,
    source: Mutex<Option<Box<dyn IdleEventSource>>>,
}

impl IdleServiceProvider {
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            source: Mutex::new(None),
        }
    }

    /// Uses `source` instead of connecting to logind.
    pub fn with_source(state: Arc<AppState>, source: Box<dyn IdleEventSource>) -> Self {
        Self {
            state,
            source: Mutex::new(Some(source)),
        }
    }
}

#[async_trait]
impl ServiceProvider for IdleServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let injected = self.source.lock().await.take();
        let source: Box<dyn IdleEventSource> = match injected {
            Some(source) => source,
            None => Box::new(
                LogindIdleSource::connect()
                    .await
                    .context("Failed to subscribe to logind idle hint")?,
            ),
        };

        let router = IdleEventRouter::new(
            self.state.controller.clone(),
            self.state.config().service.dim_delay,
        );

        task_manager
            .spawn_task(self.name(), |cancel_token| async move {
                router.run(source, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "IdleService"
    }

    fn priority(&self) -> i32 {
        8
    }

    fn is_critical(&self) -> bool {
        false
    }
}
