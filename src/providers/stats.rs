use anyhow::Result;
use async_trait::async_trait;
use log::info;
use std::{collections::BTreeMap, sync::Arc, time::Duration};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use crate::{
    app_context::AppState,
    event::{Event, EventBus},
    providers::traits::ServiceProvider,
    task_manager::TaskManager,
};

/// Periodic load sampling that recolours the keyboard zones.
///
/// # Priority and Criticality
///
/// - **Priority**: 10 (highest)
/// - **Critical**: Yes
pub struct StatsServiceProvider {
    state: Arc<AppState>,
    event_bus: EventBus,
}

impl StatsServiceProvider {
    pub fn new(state: Arc<AppState>, event_bus: EventBus) -> Self {
        Self { state, event_bus }
    }
}

#[async_trait]
impl ServiceProvider for StatsServiceProvider {
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
        let state = self.state.clone();
        let event_bus = self.event_bus.clone();

        task_manager
            .spawn_task(self.name(), |cancel_token| async move {
                run_stats_service(state, event_bus, cancel_token).await
            })
            .await
    }

    fn name(&self) -> &'static str {
        "StatsService"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn is_critical(&self) -> bool {
        true
    }
}

async fn run_stats_service(
    state: Arc<AppState>,
    event_bus: EventBus,
    cancel_token: CancellationToken,
) -> Result<()> {
    if state.sampler.is_empty() {
        info!("No metrics mapped to zones, stats polling idle");
        cancel_token.cancelled().await;
        return Ok(());
    }

    let period = Duration::from_secs(u64::from(state.config().service.polling_interval));
    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut shown = BTreeMap::new();

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                info!("Stats service cancelled");
                break;
            }
            _instant = interval.tick() => {
                let applied = state.sampler.poll_once(&state.controller).await;
                for (zone, color) in applied {
                    if shown.insert(zone, color) != Some(color) {
                        let _ = event_bus.publish(Event::ZoneColorChanged { zone, color });
                    }
                }
            }
        }
    }

    Ok(())
}
