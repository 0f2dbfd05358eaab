//! Session idle/active notifications and their effect on the backlight.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use async_trait::async_trait;
use log::{error, info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{controller::Controller, device::DeviceError, event::Event};

/// Length of one dim step in production.
pub const DIM_TICK: Duration = Duration::from_secs(1);

/// Stream of idle state changes: `true` when the session went idle.
#[async_trait]
pub trait IdleEventSource: Send {
    /// Waits for the next change. `Ok(None)` means the source is exhausted.
    async fn next_change(&mut self) -> Result<Option<bool>>;

    fn name(&self) -> &'static str;
}

/// Idle source fed through an mpsc channel.
pub struct ChannelIdleSource {
    receiver: mpsc::Receiver<bool>,
}

impl ChannelIdleSource {
    pub fn new(capacity: usize) -> (mpsc::Sender<bool>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver })
    }
}

#[async_trait]
impl IdleEventSource for ChannelIdleSource {
    async fn next_change(&mut self) -> Result<Option<bool>> {
        Ok(self.receiver.recv().await)
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

/// Turns idle changes into dim and wake commands on the controller.
///
/// Fades are spawned by the controller, so the router keeps reading events
/// while a fade is running.
#[derive(Clone)]
pub struct IdleEventRouter {
    controller: Arc<Controller>,
    dim_delay: u32,
    tick: Duration,
}

impl IdleEventRouter {
    pub fn new(controller: Arc<Controller>, dim_delay: u32) -> Self {
        Self::with_tick(controller, dim_delay, DIM_TICK)
    }

    pub fn with_tick(controller: Arc<Controller>, dim_delay: u32, tick: Duration) -> Self {
        Self {
            controller,
            dim_delay,
            tick,
        }
    }

    /// Idle starts a fresh fade; active cancels it and restores the keyboard.
    pub async fn on_idle_changed(&self, is_idle: bool) -> Result<(), DeviceError> {
        self.controller.publish(Event::IdleChanged(is_idle));

        if is_idle {
            self.controller.begin_dim(self.dim_delay, self.tick).await;
        } else {
            self.controller.end_dim().await?;
        }
        Ok(())
    }

    /// Routes changes from `source` until it is exhausted or `token` fires.
    ///
    /// Device errors on a single change are logged and routing continues.
    /// Errors from the source itself end the loop.
    pub async fn run(
        &self,
        mut source: Box<dyn IdleEventSource>,
        token: CancellationToken,
    ) -> Result<()> {
        info!("Listening for idle changes from {}", source.name());

        loop {
            let change = tokio::select! {
                () = token.cancelled() => {
                    info!("Idle router cancelled");
                    return Ok(());
                }
                change = source.next_change() => change?,
            };

            let Some(is_idle) = change else {
                info!("Idle source {} closed", source.name());
                return Ok(());
            };

            if let Err(e) = self.on_idle_changed(is_idle).await {
                error!("Failed to handle idle change to {is_idle}: {e}");
            }
        }
    }
}
