//! Single owner of the keyboard backlight state.
//!
//! Every device access from the stats sampler, the dim sequence and the wake
//! path goes through one async mutex, so writes to different parameters are
//! never interleaved into a torn update. The controller also owns the one
//! live [`DimSession`].

use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use log::{debug, info};
use tokio::sync::Mutex;

use crate::{
    backlight::{BacklightSnapshot, BacklightState},
    color::{Color, Zone},
    device::DeviceError,
    dim::{DimOutcome, DimSequencer, DimSession},
    event::{Event, EventBus},
};

#[derive(Default)]
struct DimSlot {
    session: Option<DimSession>,
    /// Brightness captured by the most recent sequence, kept after it ends.
    last_initial: Option<u8>,
}

pub struct Controller {
    state: Mutex<BacklightState>,
    dim: Mutex<DimSlot>,
    fading: AtomicUsize,
    event_bus: Option<EventBus>,
}

impl Controller {
    pub fn new(state: BacklightState) -> Self {
        Self {
            state: Mutex::new(state),
            dim: Mutex::new(DimSlot::default()),
            fading: AtomicUsize::new(0),
            event_bus: None,
        }
    }

    /// Publishes dim outcomes on `event_bus`.
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub async fn present(&self) -> bool {
        self.state.lock().await.present()
    }

    pub async fn snapshot(&self) -> BacklightSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn get_brightness(&self) -> Result<u8, DeviceError> {
        self.state.lock().await.get_brightness()
    }

    pub async fn set_brightness(&self, value: u8) -> Result<u8, DeviceError> {
        self.state.lock().await.set_brightness(value)
    }

    pub async fn get_powered_off(&self) -> Result<bool, DeviceError> {
        self.state.lock().await.get_powered_off()
    }

    pub async fn set_powered_off(&self, off: bool) -> Result<bool, DeviceError> {
        self.state.lock().await.set_powered_off(off)
    }

    pub async fn get_zone_colors(&self, zones: &[Zone]) -> Result<BTreeMap<Zone, Color>, DeviceError> {
        self.state.lock().await.get_zone_colors(zones)
    }

    pub async fn set_zone_colors(
        &self,
        updates: &BTreeMap<Zone, Color>,
    ) -> Result<BTreeMap<Zone, Color>, DeviceError> {
        self.state.lock().await.set_zone_colors(updates)
    }

    /// Paints every zone with `color`; used as the shutdown cleanup.
    pub async fn reset_zones(&self, color: Color) -> Result<BTreeMap<Zone, Color>, DeviceError> {
        let updates = Zone::ALL.into_iter().map(|zone| (zone, color)).collect();
        self.set_zone_colors(&updates).await
    }

    /// Starts a new dim sequence, first cancelling and joining any running one.
    ///
    /// Returns the brightness the new sequence will restore to on wake.
    pub async fn begin_dim(self: &Arc<Self>, dim_delay: u32, tick: Duration) -> u8 {
        let mut slot = self.dim.lock().await;

        if let Some(previous) = slot.session.take() {
            let outcome = previous.cancel_and_join().await;
            debug!("Previous dim sequence ended as {outcome:?}");
        }

        let sequencer = DimSequencer::new(self.clone(), dim_delay, tick).await;
        let initial = sequencer.initial_brightness();
        info!("Session idle, dimming keyboard from {initial} over {dim_delay}s");

        slot.last_initial = Some(initial);
        slot.session = Some(sequencer.start());
        initial
    }

    /// Cancels the running dim sequence and restores the keyboard.
    ///
    /// Powers the backlight on and returns it to the brightness captured by
    /// the most recent sequence. Both writes are always attempted; the first
    /// failure is returned after the second write has run. Without any prior
    /// sequence there is nothing to restore and `Ok(None)` is returned.
    pub async fn end_dim(&self) -> Result<Option<u8>, DeviceError> {
        let mut slot = self.dim.lock().await;

        if let Some(session) = slot.session.take() {
            let outcome = session.cancel_and_join().await;
            debug!("Dim sequence ended as {outcome:?} on wake");
        }

        let Some(initial) = slot.last_initial else {
            debug!("Session active with no prior dim sequence, nothing to restore");
            return Ok(None);
        };

        let mut state = self.state.lock().await;
        let powered_on = state.set_powered_off(false);
        let restored = state.set_brightness(initial);

        powered_on?;
        let restored = restored?;
        info!("Session active, keyboard restored to brightness {restored}");
        Ok(Some(restored))
    }

    /// Cancels and joins the running dim sequence without restoring anything.
    pub async fn stop_dim(&self) -> Option<DimOutcome> {
        let session = self.dim.lock().await.session.take()?;
        Some(session.cancel_and_join().await)
    }

    /// Whether a dim sequence is currently fading.
    pub fn is_dimming(&self) -> bool {
        self.fading.load(Ordering::SeqCst) > 0
    }

    pub(crate) fn enter_fade(self: &Arc<Self>) -> FadeGuard {
        self.fading.fetch_add(1, Ordering::SeqCst);
        FadeGuard(self.clone())
    }

    pub(crate) fn publish(&self, event: Event) {
        if let Some(bus) = &self.event_bus {
            if let Err(e) = bus.publish(event) {
                debug!("No subscribers for controller event: {e}");
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn fades_in_flight(&self) -> usize {
        self.fading.load(Ordering::SeqCst)
    }
}

/// Marks a sequence as fading for as long as it is held.
pub(crate) struct FadeGuard(Arc<Controller>);

impl Drop for FadeGuard {
    fn drop(&mut self) {
        self.0.fading.fetch_sub(1, Ordering::SeqCst);
    }
}
