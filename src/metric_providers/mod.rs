//! Load sources read by the stats sampler.

pub mod cpu;
pub mod gpu;
pub mod memory;

pub use cpu::CpuLoad;
pub use gpu::GpuLoad;
pub use memory::MemoryUsage;

/// Converts a ratio to a whole percentage clamped to `0..=100`.
pub(crate) fn ratio_percent(part: u64, whole: u64) -> Option<u8> {
    if whole == 0 {
        return None;
    }
    let percent = (part.min(whole) as f64 * 100.0 / whole as f64).round();
    Some(percent as u8)
}
