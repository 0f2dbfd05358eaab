//! Idle fade-out of the keyboard backlight.

use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{controller::Controller, device::DeviceError, event::Event};

/// Terminal state of a dim sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimOutcome {
    /// The countdown ran out and the backlight was switched off.
    PoweredOff,
    /// Activity resumed before the countdown finished.
    Cancelled,
    /// A device call failed and the starting brightness was put back.
    Restored,
}

/// A one-shot fade: brightness follows the countdown down, then the
/// backlight is powered off.
///
/// On every tick `remaining = dim_delay - elapsed` is compared with the
/// current brightness and written only when lower, so brightness never rises
/// during a fade. Cancellation is cooperative and observed at tick
/// boundaries and while sleeping; a write in progress always completes.
pub struct DimSequencer {
    controller: Arc<Controller>,
    dim_delay: u32,
    tick: Duration,
    initial_brightness: u8,
    token: CancellationToken,
}

impl DimSequencer {
    /// Captures the starting brightness before the first tick.
    pub async fn new(controller: Arc<Controller>, dim_delay: u32, tick: Duration) -> Self {
        let initial_brightness = match controller.get_brightness().await {
            Ok(brightness) => brightness,
            Err(e) => {
                warn!("Could not read brightness before dimming: {e}");
                controller.snapshot().await.brightness
            }
        };

        Self {
            controller,
            dim_delay,
            tick,
            initial_brightness,
            token: CancellationToken::new(),
        }
    }

    pub const fn initial_brightness(&self) -> u8 {
        self.initial_brightness
    }

    /// Spawns the fade as a background task.
    pub fn start(self) -> DimSession {
        let initial_brightness = self.initial_brightness;
        let token = self.token.clone();
        let guard = self.controller.enter_fade();

        let handle = tokio::spawn(async move {
            let outcome = self.run().await;
            drop(guard);
            self.controller.publish(Event::DimFinished(outcome));
            outcome
        });

        DimSession {
            initial_brightness,
            token,
            handle,
        }
    }

    async fn run(&self) -> DimOutcome {
        match self.fade().await {
            Ok(outcome) => {
                debug!("Dim sequence finished: {outcome:?}");
                outcome
            }
            Err(e) => {
                error!("Dim sequence failed, restoring brightness {}: {e}", self.initial_brightness);
                if let Err(e) = self.controller.set_brightness(self.initial_brightness).await {
                    error!("Failed to restore brightness: {e}");
                }
                DimOutcome::Restored
            }
        }
    }

    async fn fade(&self) -> Result<DimOutcome, DeviceError> {
        for elapsed in 0..self.dim_delay {
            if self.token.is_cancelled() {
                return Ok(DimOutcome::Cancelled);
            }

            let remaining = self.dim_delay - elapsed;
            let current = self.controller.get_brightness().await?;
            if remaining < u32::from(current) {
                // remaining < current <= MAX_BRIGHTNESS
                self.controller.set_brightness(remaining as u8).await?;
            }

            tokio::select! {
                () = self.token.cancelled() => return Ok(DimOutcome::Cancelled),
                () = sleep(self.tick) => {}
            }
        }

        if self.token.is_cancelled() {
            return Ok(DimOutcome::Cancelled);
        }

        self.controller.set_powered_off(true).await?;
        info!("Keyboard backlight powered off after {}s idle", self.dim_delay);
        Ok(DimOutcome::PoweredOff)
    }
}

/// Handle onto a running [`DimSequencer`].
pub struct DimSession {
    initial_brightness: u8,
    token: CancellationToken,
    handle: JoinHandle<DimOutcome>,
}

impl DimSession {
    pub const fn initial_brightness(&self) -> u8 {
        self.initial_brightness
    }

    /// Asks the fade to stop at its next tick boundary.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the fade to reach a terminal state.
    pub async fn join(self) -> DimOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Dim sequence task aborted: {e}");
                DimOutcome::Cancelled
            }
        }
    }

    pub async fn cancel_and_join(self) -> DimOutcome {
        self.cancel();
        self.join().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backlight::BacklightState,
        device::{DeviceChannel, testing::MemoryIo},
        event::EventBus,
    };
    use pretty_assertions::assert_eq;

    const TICK: Duration = Duration::from_secs(1);

    fn controller_over(io: &MemoryIo) -> Arc<Controller> {
        Arc::new(Controller::new(BacklightState::new(DeviceChannel::new(
            io.clone(),
        ))))
    }

    #[tokio::test(start_paused = true)]
    async fn full_fade_powers_off_once() {
        let io = MemoryIo::keyboard();
        let controller = controller_over(&io);

        let session = DimSequencer::new(controller.clone(), 5, TICK).await.start();
        assert_eq!(session.initial_brightness(), 10);

        let started = tokio::time::Instant::now();
        assert_eq!(session.join().await, DimOutcome::PoweredOff);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));

        assert_eq!(io.writes_to("kb_brightness"), vec!["5", "4", "3", "2", "1"]);
        assert_eq!(io.writes_to("kb_off"), vec!["1"]);
        let last = io.writes().last().cloned();
        assert_eq!(last, Some(("kb_off".to_string(), "1".to_string())));
    }

    #[tokio::test(start_paused = true)]
    async fn fade_never_raises_brightness() {
        let io = MemoryIo::keyboard();
        io.set_raw("kb_brightness", "3\n");
        let controller = controller_over(&io);

        let outcome = DimSequencer::new(controller, 6, TICK).await.start().join().await;

        assert_eq!(outcome, DimOutcome::PoweredOff);
        assert_eq!(io.writes_to("kb_brightness"), vec!["2", "1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_fade_without_power_off() {
        let io = MemoryIo::keyboard();
        let controller = controller_over(&io);

        let session = DimSequencer::new(controller.clone(), 5, TICK).await.start();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let writes_before = io.writes_to("kb_brightness");

        assert_eq!(session.cancel_and_join().await, DimOutcome::Cancelled);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(writes_before, vec!["5", "4", "3"]);
        assert_eq!(io.writes_to("kb_brightness"), writes_before);
        assert!(io.writes_to("kb_off").is_empty());
        assert_eq!(controller.get_brightness().await.unwrap(), 3);
        assert!(!controller.is_dimming());
    }

    #[tokio::test(start_paused = true)]
    async fn write_failure_restores_initial_brightness() {
        let io = MemoryIo::keyboard();
        io.set_raw("kb_brightness", "7\n");
        let controller = controller_over(&io);

        let session = DimSequencer::new(controller.clone(), 5, TICK).await.start();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        io.fail_writes_to("kb_off");

        assert_eq!(session.join().await, DimOutcome::Restored);
        assert_eq!(io.value("kb_brightness").as_deref(), Some("7"));
        assert_eq!(io.value("kb_off").as_deref(), Some("0"));
    }

    #[tokio::test(start_paused = true)]
    async fn outcome_is_published() {
        let io = MemoryIo::keyboard();
        let event_bus = EventBus::new();
        let mut receiver = event_bus.subscribe();
        let controller = Arc::new(
            Controller::new(BacklightState::new(DeviceChannel::new(io.clone())))
                .with_event_bus(event_bus),
        );

        DimSequencer::new(controller, 1, TICK).await.start().join().await;

        assert_eq!(
            receiver.recv().await.unwrap(),
            Event::DimFinished(DimOutcome::PoweredOff)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_powers_off_immediately() {
        let io = MemoryIo::keyboard();
        let controller = controller_over(&io);

        let outcome = DimSequencer::new(controller, 0, TICK).await.start().join().await;

        assert_eq!(outcome, DimOutcome::PoweredOff);
        assert!(io.writes_to("kb_brightness").is_empty());
        assert_eq!(io.value("kb_off").as_deref(), Some("1"));
    }
}
