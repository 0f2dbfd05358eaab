//! Maps system load onto keyboard zone colours.

use std::collections::BTreeMap;

use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::{
    color::{Color, Zone},
    config::Config,
    controller::Controller,
    metric_providers::{CpuLoad, GpuLoad, MemoryUsage},
    metrics::MetricProvider,
};

/// Load boundaries for the green/yellow/red scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Highest load still shown green.
    pub green: u8,
    /// Lowest load shown red.
    pub yellow: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            green: 40,
            yellow: 60,
        }
    }
}

/// `value <= green` is green, `value >= yellow` is red, anything strictly
/// between is yellow.
pub fn percent_to_color(value: u8, thresholds: Thresholds) -> Color {
    if value <= thresholds.green {
        Color::Green
    } else if value < thresholds.yellow {
        Color::Yellow
    } else {
        Color::Red
    }
}

struct ZoneMapping {
    zone: Zone,
    provider: Box<dyn MetricProvider>,
}

/// One metric per zone, sampled together on every poll.
pub struct StatsSampler {
    thresholds: Thresholds,
    mappings: Vec<ZoneMapping>,
}

impl StatsSampler {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            thresholds,
            mappings: Vec::new(),
        }
    }

    /// Sampler for the cpu/memory/gpu zones named in `config.stats`.
    pub fn from_config(config: &Config) -> Self {
        let stats = &config.stats;
        let providers: [(Option<Zone>, fn() -> Box<dyn MetricProvider>); 3] = [
            (stats.cpu, || Box::new(CpuLoad::new())),
            (stats.memory, || Box::new(MemoryUsage::new())),
            (stats.gpu, || Box::new(GpuLoad::new())),
        ];

        providers
            .into_iter()
            .filter_map(|(zone, make)| zone.map(|zone| (zone, make())))
            .fold(Self::new(config.thresholds), |sampler, (zone, provider)| {
                info!("Showing {} load on the {zone} zone", provider.name());
                sampler.with_mapping(zone, provider)
            })
    }

    pub fn with_mapping(mut self, zone: Zone, provider: Box<dyn MetricProvider>) -> Self {
        self.mappings.push(ZoneMapping { zone, provider });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Samples every mapped metric and recolours its zone.
    ///
    /// Unavailable metrics and failed writes only skip their own zone.
    /// Returns the colours the driver confirmed.
    pub async fn poll_once(&self, controller: &Controller) -> BTreeMap<Zone, Color> {
        let mut applied = BTreeMap::new();

        for ZoneMapping { zone, provider } in &self.mappings {
            let Some(value) = provider.sample().await else {
                debug!("{} load unavailable, leaving {zone} zone untouched", provider.name());
                continue;
            };

            let color = percent_to_color(value, self.thresholds);
            #[cfg(debug_assertions)]
            {
                debug!("{} load {value}% -> {color} on {zone}", provider.name());
            }

            match controller
                .set_zone_colors(&BTreeMap::from([(*zone, color)]))
                .await
            {
                Ok(confirmed) => applied.extend(confirmed),
                Err(e) => error!("Failed to colour {zone} zone: {e}"),
            }
        }

        applied
    }
}
