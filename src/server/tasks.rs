use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::task::TaskTracker;
use tracing::error;

/// Fire and forget work that outlives the request that started it.
///
/// Every task is registered when spawned and deregistered when it finishes,
/// whether it returned or panicked. Shutdown waits on [`BackgroundTasks::wait`]
/// until the count reaches zero.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                error!(task = name, panic = %panic_message(&*panic), "background task panicked");
            }
        });
    }

    /// Tasks currently outstanding.
    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Resolves once every outstanding task has finished. Tasks may still be
    /// spawned while waiting and are waited for too.
    pub async fn wait(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn wait_returns_after_all_tasks_including_panicking_ones() {
        let tasks = BackgroundTasks::new();
        let done = Arc::new(AtomicUsize::new(0));

        for i in 0..4u64 {
            let done = done.clone();
            tasks.spawn("sleeper", async move {
                tokio::time::sleep(Duration::from_secs(i + 1)).await;
                done.fetch_add(1, Ordering::SeqCst);
            });
        }
        tasks.spawn("panicker", async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            panic!("boom");
        });

        assert_eq!(tasks.len(), 5);
        tasks.wait().await;

        assert!(tasks.is_empty());
        assert_eq!(done.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn Any + Send> = Box::new("static message");
        assert_eq!(panic_message(&*payload), "static message");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned message"));
        assert_eq!(panic_message(&*payload), "owned message");

        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(&*payload), "unknown panic payload");
    }
}
