//! Application state shared by every service.

use std::sync::Arc;

use log::warn;

use crate::{
    backlight::BacklightState,
    config::{Config, ConfigManager},
    controller::Controller,
    device::DeviceChannel,
    event::EventBus,
    stats::StatsSampler,
};

/// Shared application state containing all runtime data.
///
/// The configuration is immutable; the only mutable state is the backlight,
/// which lives behind the controller.
pub struct AppState {
    /// Configuration loaded at startup.
    pub config: Arc<Config>,
    /// Sole owner of the keyboard backlight.
    pub controller: Arc<Controller>,
    /// Metric to zone mappings polled by the stats service.
    pub sampler: Arc<StatsSampler>,
}

impl AppState {
    /// Opens the driver directory named in the configuration and builds the
    /// sampler for the configured zones.
    pub fn new(config_manager: &ConfigManager, event_bus: EventBus) -> Self {
        let config = config_manager.shared();

        let channel = DeviceChannel::sysfs(&config.driver.location);
        if !channel.present() {
            warn!(
                "Keyboard driver not found at {}, running without a backlight",
                config.driver.location.display()
            );
        }

        let controller = Controller::new(BacklightState::new(channel)).with_event_bus(event_bus);
        let sampler = StatsSampler::from_config(&config);

        Self::from_parts(config, Arc::new(controller), sampler)
    }

    pub fn from_parts(config: Arc<Config>, controller: Arc<Controller>, sampler: StatsSampler) -> Self {
        Self {
            config,
            controller,
            sampler: Arc::new(sampler),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
