use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use rocket::tokio::{
    self,
    sync::Notify,
    task::{JoinError, JoinHandle},
};

/// A task scheduled to run at a specific point in the future.
/// It can be triggered early, cancelled, or awaited directly.
pub struct ScheduledTask<T> {
    task_handle: JoinHandle<T>,
    trigger: Arc<Notify>,
}

impl<T> ScheduledTask<T>
where
    T: Send + 'static,
{
    /// Schedule the given task to execute at time `run_at`.
    /// If `run_at` is in the past, the task executes immediately.
    pub fn new<Fut>(task: Fut, run_at: DateTime<Utc>) -> Self
    where
        Fut: Future<Output = T> + Send + 'static,
    {
        let trigger = Arc::new(Notify::new());
        let notified = trigger.clone();
        let delay = time_until(run_at);
        let task_handle = tokio::spawn(async move {
            // Whichever comes first starts the task: the deadline, or an
            // explicit trigger.
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = notified.notified() => {}
            }
            task.await
        });

        Self {
            task_handle,
            trigger,
        }
    }

    /// Cancel the task. Returns true iff it had already completed before we could cancel it.
    pub async fn cancel(self) -> bool {
        self.task_handle.abort();
        self.task_handle.await.is_ok()
    }

    /// Run the task now instead of waiting for the scheduled time.
    pub fn trigger_now(&self) {
        self.trigger.notify_one();
    }
}

/// Awaiting a `ScheduledTask` waits for the task itself to finish.
impl<T> Future for ScheduledTask<T> {
    type Output = Result<T, JoinError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.task_handle).poll(cx)
    }
}

/// How long from now until `datetime`, clamped to zero for past times.
fn time_until(datetime: DateTime<Utc>) -> std::time::Duration {
    (datetime - Utc::now()).to_std().unwrap_or_default()
}
