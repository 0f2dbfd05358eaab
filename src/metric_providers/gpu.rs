use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;

use super::ratio_percent;
use crate::metrics::MetricProvider;

const NVIDIA_SMI: &str = "nvidia-smi";
const QUERY: &str = "--query-gpu=utilization.gpu,utilization.memory,utilization.encoder,\
                     utilization.decoder,memory.used,memory.total";

/// Busiest of the GPU engine utilisations and framebuffer usage, taken from
/// the first GPU in `nvidia-smi` CSV output.
///
/// Columns: gpu, memory, encoder, decoder utilisation, then used and total
/// framebuffer MiB. Fields the driver reports as `[N/A]` are ignored.
pub fn parse_nvidia_smi(csv: &str) -> Option<u8> {
    let line = csv.lines().next()?;
    let fields: Vec<Option<u64>> = line.split(',').map(|f| f.trim().parse().ok()).collect();
    if fields.len() < 6 {
        return None;
    }

    let memory = match (fields[4], fields[5]) {
        (Some(used), Some(total)) => ratio_percent(used, total),
        _ => None,
    };

    fields[..4]
        .iter()
        .map(|util| util.map(|u| u.min(100) as u8))
        .chain(std::iter::once(memory))
        .flatten()
        .max()
}

/// NVIDIA GPU load; unavailable when `nvidia-smi` is not installed.
pub struct GpuLoad {
    program: String,
}

impl GpuLoad {
    pub fn new() -> Self {
        Self::with_program(NVIDIA_SMI)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GpuLoad {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricProvider for GpuLoad {
    async fn sample(&self) -> Option<u8> {
        let output = Command::new(&self.program)
            .args([QUERY, "--format=csv,noheader,nounits"])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await;

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                debug!("{} not usable: {e}", self.program);
                return None;
            }
        };

        if !output.status.success() {
            warn!("{} exited with {}", self.program, output.status);
            return None;
        }

        parse_nvidia_smi(&String::from_utf8_lossy(&output.stdout))
    }

    fn name(&self) -> &'static str {
        "gpu"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn picks_busiest_engine() {
        assert_eq!(parse_nvidia_smi("37, 12, 0, 0, 1024, 8192\n"), Some(37));
    }

    #[test]
    fn framebuffer_usage_counts() {
        assert_eq!(parse_nvidia_smi("5, 3, 0, 0, 6144, 8192\n"), Some(75));
    }

    #[test]
    fn not_available_fields_are_skipped() {
        assert_eq!(
            parse_nvidia_smi("[N/A], [N/A], 0, 0, 2048, 8192\n"),
            Some(25)
        );
    }

    #[test]
    fn malformed_output_is_unavailable() {
        assert_eq!(parse_nvidia_smi(""), None);
        assert_eq!(parse_nvidia_smi("No devices were found\n"), None);
    }

    #[test]
    fn only_first_gpu_is_read() {
        assert_eq!(
            parse_nvidia_smi("10, 0, 0, 0, 0, 8192\n90, 0, 0, 0, 0, 8192\n"),
            Some(10)
        );
    }

    #[tokio::test]
    async fn missing_tool_is_unavailable() {
        let gpu = GpuLoad::with_program("/nonexistent/nvidia-smi");
        assert_eq!(gpu.sample().await, None);
    }
}
