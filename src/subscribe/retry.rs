//! Recurring retry timer for recoverable subscribe failures.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Cadence between restore attempts after a recoverable failure.
pub const RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Cancellable 1 Hz timer. `start` always replaces a previous timer; `stop`
/// is a no-op when inactive. Tests drive the cadence through tokio's paused
/// time.
#[derive(Debug, Default)]
pub struct RetryTimer {
    task: Option<JoinHandle<()>>,
}

impl RetryTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    pub fn start<F>(&mut self, mut tick: F)
    where
        F: FnMut() + Send + 'static,
    {
        self.stop();
        self.task = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(RETRY_INTERVAL).await;
                tick();
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for RetryTimer {
    fn drop(&mut self) {
        self.stop();
    }
}
