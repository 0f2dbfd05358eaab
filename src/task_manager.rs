//! Background task lifecycle.

use std::{future::Future, time::Duration};

use anyhow::{Result, anyhow};
use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a task gets to react to cancellation during shutdown.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

struct ManagedTask {
    name: String,
    handle: JoinHandle<Result<()>>,
    token: CancellationToken,
}

/// Owns the daemon's long-running tasks.
///
/// Every task receives a child of one root token, so cancelling the root
/// stops them all. Tasks are joined in the order they were spawned.
pub struct TaskManager {
    tasks: Vec<ManagedTask>,
    root: CancellationToken,
    shutdown_timeout: Duration,
}

impl TaskManager {
    pub fn new() -> Self {
        Self::with_shutdown_timeout(SHUTDOWN_TIMEOUT)
    }

    pub fn with_shutdown_timeout(shutdown_timeout: Duration) -> Self {
        Self {
            tasks: Vec::new(),
            root: CancellationToken::new(),
            shutdown_timeout,
        }
    }

    /// Spawns `task_fn` with its own cancellation token.
    pub async fn spawn_task<F, Fut>(&mut self, name: impl Into<String>, task_fn: F) -> Result<()>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let name = name.into();
        if self.is_running(&name) {
            return Err(anyhow!("Task '{name}' is already running"));
        }

        let token = self.root.child_token();
        let task_name = name.clone();
        let fut = task_fn(token.clone());

        let handle = tokio::spawn(async move {
            let result = fut.await;
            match &result {
                Ok(()) => info!("Task '{task_name}' finished"),
                Err(e) => error!("Task '{task_name}' failed: {e:#}"),
            }
            result
        });

        info!("Task '{name}' spawned");
        self.tasks.push(ManagedTask {
            name,
            handle,
            token,
        });
        Ok(())
    }

    /// Cancels one task and waits for it.
    pub async fn stop_task(&mut self, name: &str) -> Result<()> {
        let index = self
            .tasks
            .iter()
            .position(|task| task.name == name)
            .ok_or_else(|| anyhow!("No task named '{name}'"))?;

        let task = self.tasks.remove(index);
        task.token.cancel();
        self.join(task).await
    }

    /// Cancels every task and joins them, each within the shutdown timeout.
    ///
    /// All tasks are joined even when some fail; the first failure is
    /// returned.
    pub async fn shutdown_all(&mut self) -> Result<()> {
        info!("Stopping {} tasks", self.tasks.len());
        self.root.cancel();

        let mut first_error = None;
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = self.join(task).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e.context("One or more tasks failed during shutdown")),
            None => {
                info!("All tasks stopped");
                Ok(())
            }
        }
    }

    async fn join(&self, task: ManagedTask) -> Result<()> {
        let ManagedTask { name, handle, .. } = task;

        match tokio::time::timeout(self.shutdown_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                error!("Task '{name}' panicked: {e}");
                Err(anyhow!("Task '{name}' panicked: {e}"))
            }
            Err(_) => {
                warn!("Task '{name}' ignored cancellation for {:?}", self.shutdown_timeout);
                Err(anyhow!("Task '{name}' shutdown timeout exceeded"))
            }
        }
    }

    pub fn active_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.tasks.iter().any(|task| task.name == name)
    }
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    };

    async fn until_cancelled(token: CancellationToken) -> Result<()> {
        token.cancelled().await;
        Ok(())
    }

    #[tokio::test]
    async fn shutdown_cancels_every_task() {
        let mut manager = TaskManager::new();
        manager.spawn_task("a", until_cancelled).await.unwrap();
        manager.spawn_task("b", until_cancelled).await.unwrap();
        assert_eq!(manager.active_count(), 2);

        manager.shutdown_all().await.unwrap();

        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected() {
        let mut manager = TaskManager::new();
        manager.spawn_task("stats", until_cancelled).await.unwrap();

        assert!(manager.spawn_task("stats", until_cancelled).await.is_err());
        manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn stop_task_leaves_others_running() {
        let mut manager = TaskManager::new();
        let other_cancelled = Arc::new(AtomicBool::new(false));
        manager.spawn_task("first", until_cancelled).await.unwrap();
        manager
            .spawn_task("second", {
                let flag = other_cancelled.clone();
                move |token| async move {
                    token.cancelled().await;
                    flag.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        manager.stop_task("first").await.unwrap();

        assert!(!manager.is_running("first"));
        assert!(manager.is_running("second"));
        assert!(!other_cancelled.load(Ordering::SeqCst));
        assert!(manager.stop_task("first").await.is_err());
        manager.shutdown_all().await.unwrap();
    }

    #[tokio::test]
    async fn failing_task_error_is_reported() {
        let mut manager = TaskManager::new();
        manager
            .spawn_task("broken", |_token| async { Err(anyhow!("sensor gone")) })
            .await
            .unwrap();
        manager.spawn_task("fine", until_cancelled).await.unwrap();

        let err = manager.shutdown_all().await.unwrap_err();

        assert!(format!("{err:#}").contains("sensor gone"));
        assert_eq!(manager.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_task_times_out() {
        let mut manager = TaskManager::with_shutdown_timeout(Duration::from_secs(1));
        manager
            .spawn_task("stuck", |_token| async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .await
            .unwrap();

        let err = manager.shutdown_all().await.unwrap_err();

        assert!(format!("{err:#}").contains("timeout"));
    }
}
