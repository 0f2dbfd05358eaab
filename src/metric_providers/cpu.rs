use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use log::warn;

use super::ratio_percent;
use crate::metrics::MetricProvider;

const PROC_STAT: &str = "/proc/stat";

/// Aggregate CPU jiffies from the first line of `/proc/stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTimes {
    pub idle: u64,
    pub total: u64,
}

impl CpuTimes {
    /// Parses the `cpu  user nice system idle iowait irq softirq steal ...` line.
    pub fn parse(stat: &str) -> Option<Self> {
        let line = stat.lines().find(|l| l.starts_with("cpu "))?;
        let fields: Vec<u64> = line
            .split_whitespace()
            .skip(1)
            .filter_map(|f| f.parse().ok())
            .collect();
        if fields.len() < 4 {
            return None;
        }

        // guest time is already accounted in user/nice
        let counted = &fields[..fields.len().min(8)];
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(Self {
            idle,
            total: counted.iter().sum(),
        })
    }

    /// Busy percentage between two readings.
    pub fn load_since(self, earlier: CpuTimes) -> Option<u8> {
        let total = self.total.checked_sub(earlier.total)?;
        let idle = self.idle.checked_sub(earlier.idle)?;
        ratio_percent(total.saturating_sub(idle), total)
    }
}

/// CPU utilisation over a short measurement window.
pub struct CpuLoad {
    stat_path: PathBuf,
    window: Duration,
}

impl CpuLoad {
    pub fn new() -> Self {
        Self::with_source(PROC_STAT, Duration::from_secs(1))
    }

    pub fn with_source(stat_path: impl Into<PathBuf>, window: Duration) -> Self {
        Self {
            stat_path: stat_path.into(),
            window,
        }
    }

    fn read_times(path: &Path) -> Option<CpuTimes> {
        match fs::read_to_string(path) {
            Ok(stat) => CpuTimes::parse(&stat),
            Err(e) => {
                warn!("Failed to read {}: {e}", path.display());
                None
            }
        }
    }
}

impl Default for CpuLoad {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for CpuLoad {
    async fn sample(&self) -> Option<u8> {
        let before = Self::read_times(&self.stat_path)?;
        tokio::time::sleep(self.window).await;
        let after = Self::read_times(&self.stat_path)?;
        after.load_since(before)
    }

    fn name(&self) -> &'static str {
        "cpu"
    }
}
