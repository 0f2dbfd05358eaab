use async_trait::async_trait;

/// A system load percentage source polled by the stats sampler.
#[async_trait]
pub trait MetricProvider: Send + Sync {
    /// Current load in `0..=100`, or `None` when the metric is unavailable
    /// this cycle.
    async fn sample(&self) -> Option<u8>;

    fn name(&self) -> &'static str;
}
