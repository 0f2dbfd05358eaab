use anyhow::Result;
use async_trait::async_trait;

use crate::task_manager::TaskManager;

/// Builds a component that needs async initialization.
///
/// # Example
///
/// ```no_run
/// use kb_light_statsd::providers::traits::AsyncProvider;
///
/// struct GreetingProvider;
///
/// #[async_trait::async_trait]
/// impl AsyncProvider<String> for GreetingProvider {
///     async fn provide(&self) -> anyhow::Result<String> {
///         Ok("hello".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait AsyncProvider<T> {
    async fn provide(&self) -> Result<T>;
}

/// A long-running service started through the [`TaskManager`].
///
/// # Example
///
/// ```no_run
/// use kb_light_statsd::providers::traits::ServiceProvider;
/// use kb_light_statsd::task_manager::TaskManager;
/// use anyhow::Result;
///
/// struct HeartbeatService;
///
/// #[async_trait::async_trait]
/// impl ServiceProvider for HeartbeatService {
///     async fn start(&self, task_manager: &mut TaskManager) -> Result<()> {
///         task_manager.spawn_task(self.name(), |token| async move {
///             token.cancelled().await;
///             Ok(())
///         }).await
///     }
///
///     fn name(&self) -> &'static str { "HeartbeatService" }
/// }
/// ```
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Spawns the service's task(s).
    async fn start(&self, task_manager: &mut TaskManager) -> Result<()>;

    fn name(&self) -> &'static str;

    /// Startup priority, higher starts first.
    fn priority(&self) -> i32 {
        0
    }

    /// Whether the daemon refuses to run without this service.
    fn is_critical(&self) -> bool {
        false
    }
}
