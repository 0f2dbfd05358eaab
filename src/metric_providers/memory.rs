use std::{fs, path::PathBuf};

use async_trait::async_trait;
use log::warn;

use super::ratio_percent;
use crate::metrics::MetricProvider;

const PROC_MEMINFO: &str = "/proc/meminfo";

/// Used memory as `(MemTotal - MemAvailable) / MemTotal`.
pub fn parse_meminfo(meminfo: &str) -> Option<u8> {
    let field = |name: &str| {
        meminfo
            .lines()
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(':'))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|kb| kb.parse::<u64>().ok())
    };

    let total = field("MemTotal")?;
    let available = field("MemAvailable")?;
    ratio_percent(total.saturating_sub(available), total)
}

pub struct MemoryUsage {
    meminfo_path: PathBuf,
}

impl MemoryUsage {
    pub fn new() -> Self {
        Self::with_source(PROC_MEMINFO)
    }

    pub fn with_source(meminfo_path: impl Into<PathBuf>) -> Self {
        Self {
            meminfo_path: meminfo_path.into(),
        }
    }
}

impl Default for MemoryUsage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for MemoryUsage {
    async fn sample(&self) -> Option<u8> {
        match fs::read_to_string(&self.meminfo_path) {
            Ok(meminfo) => parse_meminfo(&meminfo),
            Err(e) => {
                warn!("Failed to read {}: {e}", self.meminfo_path.display());
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    const MEMINFO: &str = "MemTotal:       16000000 kB\n\
                           MemFree:         2000000 kB\n\
                           MemAvailable:    4000000 kB\n\
                           Buffers:          500000 kB\n";

    #[test]
    fn usage_is_unavailable_share() {
        assert_eq!(parse_meminfo(MEMINFO), Some(75));
    }

    #[test]
    fn missing_fields_are_unavailable() {
        assert_eq!(parse_meminfo("MemTotal: 100 kB\n"), None);
        assert_eq!(parse_meminfo(""), None);
    }

    #[tokio::test]
    async fn samples_from_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), MEMINFO).unwrap();

        assert_eq!(MemoryUsage::with_source(file.path()).sample().await, Some(75));
        assert_eq!(MemoryUsage::with_source("/nonexistent").sample().await, None);
    }
}
