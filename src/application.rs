//! Application entry point.

use anyhow::{Result, anyhow};

use crate::{config::ConfigManager, coordinator::SystemCoordinator, idle::IdleEventSource};

/// The daemon: a loaded configuration and the coordinator that runs it.
///
/// # Example
///
/// ```no_run
/// use kb_light_statsd::{application::Application, config::ConfigManager};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config_manager = ConfigManager::load(None).await?;
/// Application::builder()
///     .with_config_manager(config_manager)
///     .build()
///     .await?
///     .run()
///     .await
/// # }
/// ```
pub struct Application {
    coordinator: SystemCoordinator,
    config_manager: ConfigManager,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::default()
    }

    /// Initializes, starts the services and blocks until shutdown completes.
    ///
    /// A failed startup still shuts down whatever was already started.
    pub async fn run(mut self) -> Result<()> {
        self.coordinator
            .initialize(self.config_manager.clone())
            .await?;
        if let Err(e) = self.coordinator.start_all_services().await {
            self.coordinator.shutdown().await;
            return Err(e);
        }
        self.coordinator.run_main_loop().await
    }
}

#[derive(Default)]
pub struct ApplicationBuilder {
    config_manager: Option<ConfigManager>,
    idle_source: Option<Box<dyn IdleEventSource>>,
}

impl ApplicationBuilder {
    pub fn with_config_manager(mut self, config_manager: ConfigManager) -> Self {
        self.config_manager = Some(config_manager);
        self
    }

    /// Replaces the logind idle subscription.
    pub fn with_idle_source(mut self, source: Box<dyn IdleEventSource>) -> Self {
        self.idle_source = Some(source);
        self
    }

    pub async fn build(self) -> Result<Application> {
        let config_manager = self
            .config_manager
            .ok_or_else(|| anyhow!("Configuration manager is required"))?;

        let coordinator = match self.idle_source {
            Some(source) => SystemCoordinator::new().with_idle_source(source),
            None => SystemCoordinator::new(),
        };

        Ok(Application {
            coordinator,
            config_manager,
        })
    }
}
