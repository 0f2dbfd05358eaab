use std::{collections::HashMap, sync::Arc};

use log::{info, warn};
use zbus::{interface, object_server::SignalEmitter};

use crate::{
    controller::Controller,
    event::{Event, EventBus},
};

pub const BUS_NAME: &str = "io.github.kb_light_statsd";
pub const OBJECT_PATH: &str = "/io/github/kb_light_statsd";

/// Read-only view of the backlight plus a stop switch.
pub struct DBusInterface {
    controller: Arc<Controller>,
    event_bus: EventBus,
    version: String,
}

impl DBusInterface {
    pub fn new(controller: Arc<Controller>, version: String, event_bus: EventBus) -> Self {
        Self {
            controller,
            event_bus,
            version,
        }
    }
}

#[interface(name = "io.github.kb_light_statsd1")]
impl DBusInterface {
    #[zbus(signal)]
    async fn stopped(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;

    /// Asks the daemon to shut down.
    async fn stop(
        &self,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> zbus::fdo::Result<()> {
        info!("Shutdown requested over D-Bus");
        emitter.stopped().await?;
        self.event_bus
            .publish(Event::SystemShutdown)
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
    }

    #[zbus(property)]
    async fn version(&self) -> String {
        self.version.clone()
    }

    #[zbus(property)]
    async fn brightness(&self) -> u8 {
        match self.controller.get_brightness().await {
            Ok(brightness) => brightness,
            Err(e) => {
                warn!("{e}");
                self.controller.snapshot().await.brightness
            }
        }
    }

    #[zbus(property)]
    async fn powered_off(&self) -> bool {
        match self.controller.get_powered_off().await {
            Ok(off) => off,
            Err(e) => {
                warn!("{e}");
                self.controller.snapshot().await.powered_off
            }
        }
    }

    /// Zone name to colour name.
    #[zbus(property)]
    async fn zones(&self) -> HashMap<String, String> {
        self.controller
            .snapshot()
            .await
            .zones
            .into_iter()
            .map(|(zone, color)| (zone.to_string(), color.to_string()))
            .collect()
    }

    #[zbus(property)]
    async fn dimming(&self) -> bool {
        self.controller.is_dimming()
    }
}
