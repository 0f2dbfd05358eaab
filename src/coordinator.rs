//! Service lifecycle: startup in priority order, main loop and shutdown.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use log::{debug, error, info, warn};
use tokio::{
    signal::unix::{SignalKind, signal},
    sync::broadcast::error::RecvError,
};

use crate::{
    app_context::AppState,
    config::ConfigManager,
    event::{Event, EventBus},
    idle::IdleEventSource,
    providers::{
        AppStateProvider, AsyncProvider, DBusServiceProvider, IdleServiceProvider,
        ServiceProvider, StatsServiceProvider,
    },
    task_manager::TaskManager,
};

/// Owns the services and drives the daemon from startup to cleanup.
///
/// Critical services must start; the others may fail and are logged.
/// Shutdown stops every task, then any fade in progress, and finally paints
/// every zone with the configured default colour.
pub struct SystemCoordinator {
    task_manager: TaskManager,
    event_bus: EventBus,
    shared_state: Option<Arc<AppState>>,
    service_providers: Vec<Box<dyn ServiceProvider>>,
    idle_source: Option<Box<dyn IdleEventSource>>,
}

impl Default for SystemCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemCoordinator {
    pub fn new() -> Self {
        Self {
            task_manager: TaskManager::new(),
            event_bus: EventBus::new(),
            shared_state: None,
            service_providers: Vec::new(),
            idle_source: None,
        }
    }

    /// Feeds idle changes from `source` instead of logind.
    pub fn with_idle_source(mut self, source: Box<dyn IdleEventSource>) -> Self {
        self.idle_source = Some(source);
        self
    }

    /// Builds the application state and registers the services.
    pub async fn initialize(&mut self, config_manager: ConfigManager) -> Result<()> {
        info!(
            "Initializing SystemCoordinator from {}",
            config_manager.path().display()
        );

        let state = AppStateProvider::new(config_manager, self.event_bus.clone())
            .provide()
            .await
            .context("Failed to initialize application state")?;

        self.initialize_with_state(state).await
    }

    /// Registers the services around an already built state.
    pub async fn initialize_with_state(&mut self, state: Arc<AppState>) -> Result<()> {
        self.shared_state = Some(state.clone());
        self.register_service_providers(state).await;

        info!("SystemCoordinator initialization completed");
        Ok(())
    }

    async fn register_service_providers(&mut self, state: Arc<AppState>) {
        self.add_service_provider(Box::new(StatsServiceProvider::new(
            state.clone(),
            self.event_bus.clone(),
        )));

        let idle = match self.idle_source.take() {
            Some(source) => IdleServiceProvider::with_source(state.clone(), source),
            None => IdleServiceProvider::new(state.clone()),
        };
        self.add_service_provider(Box::new(idle));

        if state.config().dbus.enabled {
            match DBusServiceProvider::new(state, self.event_bus.clone()).await {
                Ok(provider) => self.add_service_provider(Box::new(provider)),
                Err(e) => warn!("{e:#}, skipping D-Bus service"),
            }
        }

        info!(
            "Registered {} service providers in priority order",
            self.service_providers.len()
        );
    }

    /// Adds a service, keeping the list in priority order.
    pub fn add_service_provider(&mut self, provider: Box<dyn ServiceProvider>) {
        self.service_providers.push(provider);
        self.service_providers
            .sort_by_key(|p| std::cmp::Reverse(p.priority()));
    }

    /// Starts all registered services in priority order.
    pub async fn start_all_services(&mut self) -> Result<()> {
        info!(
            "Starting {} services in priority order...",
            self.service_providers.len()
        );

        for provider in &self.service_providers {
            let is_critical = provider.is_critical();

            match provider.start(&mut self.task_manager).await {
                Ok(()) => {
                    info!(
                        "Service '{}' started (priority: {}, critical: {})",
                        provider.name(),
                        provider.priority(),
                        is_critical
                    );
                }
                Err(e) if is_critical => {
                    return Err(e).with_context(|| {
                        format!("Critical service '{}' failed to start", provider.name())
                    });
                }
                Err(e) => {
                    warn!(
                        "Non-critical service '{}' failed to start: {e:#}",
                        provider.name()
                    );
                }
            }
        }

        info!("All critical services started");
        Ok(())
    }

    /// Runs until Ctrl+C, SIGTERM or [`Event::SystemShutdown`], then shuts
    /// down.
    pub async fn run_main_loop(&mut self) -> Result<()> {
        let mut event_rx = self.event_bus.subscribe();
        let mut sigterm = signal(SignalKind::terminate()).context("Failed to watch SIGTERM")?;
        info!("Starting main event loop");

        let outcome = loop {
            tokio::select! {
                result = tokio::signal::ctrl_c() => {
                    match result {
                        Ok(()) => {
                            info!("Received Ctrl+C, initiating graceful shutdown...");
                            break Ok(());
                        }
                        Err(e) => break Err(anyhow!("Failed to listen for Ctrl+C: {e}")),
                    }
                }

                _ = sigterm.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown...");
                    break Ok(());
                }

                event = event_rx.recv() => {
                    match self.handle_event(event) {
                        Ok(true) => break Ok(()),
                        Ok(false) => {}
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        self.shutdown().await;
        info!("Main event loop terminated");
        outcome
    }

    /// Returns `true` once shutdown was requested.
    fn handle_event(&self, event_result: Result<Event, RecvError>) -> Result<bool> {
        match event_result {
            Ok(Event::SystemShutdown) => {
                info!("Processing SystemShutdown event");
                return Ok(true);
            }
            Ok(Event::IdleChanged(idle)) => {
                info!("Session {}", if idle { "idle" } else { "active" });
            }
            Ok(Event::DimFinished(outcome)) => {
                info!("Dim sequence finished: {outcome:?}");
            }
            Ok(event) => {
                debug!("Received event: {event:?}");
            }
            Err(RecvError::Closed) => {
                bail!("Event bus channel closed unexpectedly");
            }
            Err(RecvError::Lagged(n)) => {
                warn!("Event bus lagged by {n} messages");
            }
        }
        Ok(false)
    }

    /// Stops every task, then any fade, then restores the default colour.
    pub async fn shutdown(&mut self) {
        info!("Initiating graceful shutdown...");

        if let Err(e) = self.task_manager.shutdown_all().await {
            error!("Error during task shutdown: {e:#}");
        }

        if let Some(state) = &self.shared_state {
            if let Some(outcome) = state.controller.stop_dim().await {
                debug!("Fade stopped at shutdown as {outcome:?}");
            }

            let def_color = state.config().service.def_color;
            match state.controller.reset_zones(def_color).await {
                Ok(_) => info!("All zones reset to {def_color}"),
                Err(e) => error!("Failed to reset zones to {def_color}: {e}"),
            }
        }

        info!("Shutdown complete");
    }

    pub const fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn running_services(&self) -> Vec<&'static str> {
        self.service_providers.iter().map(|p| p.name()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backlight::BacklightState,
        color::{Color, Zone},
        config::Config,
        controller::Controller,
        device::{DeviceChannel, testing::MemoryIo},
        idle::ChannelIdleSource,
        stats::StatsSampler,
    };
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::{collections::BTreeMap, time::Duration};

    fn test_state(io: &MemoryIo) -> Arc<AppState> {
        let mut config = Config::default();
        config.dbus.enabled = false;
        config.service.def_color = Color::Purple;
        config.service.dim_delay = 5;
        let controller = Controller::new(BacklightState::new(DeviceChannel::new(io.clone())));
        Arc::new(AppState::from_parts(
            Arc::new(config),
            Arc::new(controller),
            StatsSampler::new(Default::default()),
        ))
    }

    struct BrokenService {
        critical: bool,
    }

    #[async_trait]
    impl ServiceProvider for BrokenService {
        async fn start(&self, _task_manager: &mut TaskManager) -> Result<()> {
            Err(anyhow!("no hardware"))
        }

        fn name(&self) -> &'static str {
            "BrokenService"
        }

        fn priority(&self) -> i32 {
            20
        }

        fn is_critical(&self) -> bool {
            self.critical
        }
    }

    #[tokio::test]
    async fn registers_services_in_priority_order() {
        let io = MemoryIo::keyboard();
        let (_sender, source) = ChannelIdleSource::new(1);
        let mut coordinator = SystemCoordinator::new().with_idle_source(Box::new(source));

        coordinator
            .initialize_with_state(test_state(&io))
            .await
            .unwrap();

        assert_eq!(
            coordinator.running_services(),
            vec!["StatsService", "IdleService"]
        );
    }

    #[tokio::test]
    async fn critical_failure_aborts_startup() {
        let mut coordinator = SystemCoordinator::new();
        coordinator.add_service_provider(Box::new(BrokenService { critical: true }));

        let err = coordinator.start_all_services().await.unwrap_err();
        assert!(err.to_string().contains("BrokenService"));
    }

    #[tokio::test]
    async fn non_critical_failure_is_tolerated() {
        let mut coordinator = SystemCoordinator::new();
        coordinator.add_service_provider(Box::new(BrokenService { critical: false }));

        assert!(coordinator.start_all_services().await.is_ok());
    }

    #[tokio::test]
    async fn shutdown_event_stops_loop_and_resets_zones() {
        let io = MemoryIo::keyboard();
        let state = test_state(&io);
        state
            .controller
            .set_zone_colors(&BTreeMap::from([(Zone::Left, Color::Red)]))
            .await
            .unwrap();
        let (_sender, source) = ChannelIdleSource::new(1);
        let mut coordinator = SystemCoordinator::new().with_idle_source(Box::new(source));
        coordinator.initialize_with_state(state.clone()).await.unwrap();
        coordinator.start_all_services().await.unwrap();

        let event_bus = coordinator.event_bus().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            event_bus.publish(Event::SystemShutdown).unwrap();
        });

        coordinator.run_main_loop().await.unwrap();

        for name in ["kb_left", "kb_center", "kb_right"] {
            assert_eq!(io.value(name).as_deref(), Some("3"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_fade_before_cleanup() {
        let io = MemoryIo::keyboard();
        let state = test_state(&io);
        let (sender, source) = ChannelIdleSource::new(1);
        let mut coordinator = SystemCoordinator::new().with_idle_source(Box::new(source));
        coordinator.initialize_with_state(state.clone()).await.unwrap();
        coordinator.start_all_services().await.unwrap();

        sender.send(true).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert!(state.controller.is_dimming());

        coordinator.shutdown().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(!state.controller.is_dimming());
        assert!(io.writes_to("kb_off").is_empty());
        assert_eq!(io.value("kb_center").as_deref(), Some("3"));
    }
}
