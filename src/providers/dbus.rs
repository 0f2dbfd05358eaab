//! D-Bus status service provider.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::info;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use zbus::Connection;

use crate::{
    app_context::AppState,
    event::EventBus,
    interface::{BUS_NAME, DBusInterface, OBJECT_PATH},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Publishes [`DBusInterface`] on the session bus.
///
/// # Priority and Criticality
///
/// - **Priority**: 3
/// - **Critical**: No
///
/// # Interface
///
/// - **Service Name**: `io.github.kb_light_statsd`
/// - **Object Path**: `/io/github/kb_light_statsd`
pub struct DBusServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
    connection: Connection,
}

impl DBusServiceProvider {
    /// Connects to the session bus. Fails when there is none.
    pub async fn new(state: Arc<AppState>, event_bus: EventBus) -> Result<Self> {
        let connection = Connection::session()
            .await
            .context("Failed to connect to the session bus")?;
        Ok(Self {
            state,
            event_bus,
            connection,
        })
    }
}

#[async_trait]
impl ServiceProvider for DBusServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let interface = DBusInterface::new(
            self.state.controller.clone(),
            env!("CARGO_PKG_VERSION").to_string(),
            self.event_bus.clone(),
        );

        self.connection
            .object_server()
            .at(OBJECT_PATH, interface)
            .await
            .context("Failed to register status object")?;
        self.connection
            .request_name(BUS_NAME)
            .await
            .with_context(|| format!("Failed to acquire bus name {BUS_NAME}"))?;

        let connection = self.connection.clone();
        task_manager
            .spawn_task(self.name(), |cancel_token| async move {
                run_dbus_service(connection, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "DBusService"
    }

    fn priority(&self) -> i32 {
        3
    }

    fn is_critical(&self) -> bool {
        false
    }
}

/// Holds the connection open until cancelled, then withdraws the object.
async fn run_dbus_service(connection: Connection, cancel_token: CancellationToken) -> Result<()> {
    cancel_token.cancelled().await;
    info!("D-Bus service cancelled");

    connection
        .object_server()
        .remove::<DBusInterface, _>(OBJECT_PATH)
        .await?;
    connection.release_name(BUS_NAME).await?;
    Ok(())
}
