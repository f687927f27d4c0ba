//! Ordered process shutdown.
//!
//! `Running -> Draining -> Stopped`. A termination signal (or [`ShutdownCoordinator::trigger`])
//! moves to `Draining`: the listener stops accepting and in-flight HTTP work
//! gets the configured grace period. Once the listener is done the
//! coordinator waits, with no time limit, for background tasks to finish,
//! then reports `Stopped`. An error from the listener, including grace
//! expiry, is held until the drain completes and then returned.
//!
//! Connections are served on their own tasks, so dropping the listener
//! future does not end them. When the grace period runs out the coordinator
//! cancels its hard-stop token instead, and [`abort_on_hard_stop`] answers
//! every request still in a handler with `503` and closes the connection.

use std::future::{Future, IntoFuture};
use std::io;
use std::time::Duration;

use anyhow::anyhow;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::watch;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tracing::{error, info, warn};

use super::tasks::BackgroundTasks;
use crate::error::ApiError;

/// How long aborted connections get to flush their `503` after grace expiry.
const ABORT_FLUSH: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

pub struct ShutdownCoordinator {
    tasks: BackgroundTasks,
    grace: Duration,
    draining: CancellationToken,
    hard_stop: CancellationToken,
    state: watch::Sender<ShutdownState>,
}

impl ShutdownCoordinator {
    pub fn new(tasks: BackgroundTasks, grace: Duration) -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        Self {
            tasks,
            grace,
            draining: CancellationToken::new(),
            hard_stop: CancellationToken::new(),
            state,
        }
    }

    pub fn tasks(&self) -> &BackgroundTasks {
        &self.tasks
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// Starts draining without waiting for a signal.
    pub fn trigger(&self) {
        self.draining.cancel();
    }

    /// Completes when draining starts. Hand this to the listener's graceful shutdown hook.
    pub fn draining(&self) -> WaitForCancellationFutureOwned {
        self.draining.clone().cancelled_owned()
    }

    /// Cancelled once the grace period expires with requests still in flight.
    pub fn hard_stop(&self) -> CancellationToken {
        self.hard_stop.clone()
    }

    /// Drives `server` until `signal` fires, then drains and stops.
    pub async fn run<F, S>(&self, server: F, signal: S) -> anyhow::Result<()>
    where
        F: IntoFuture<Output = io::Result<()>>,
        S: Future<Output = ()>,
    {
        let mut server = Box::pin(server.into_future());

        let listener_result = tokio::select! {
            result = &mut server => {
                self.enter_draining();
                result.map_err(anyhow::Error::from)
            }
            _ = wait_for_either(signal, self.draining.cancelled()) => {
                self.enter_draining();
                match tokio::time::timeout(self.grace, &mut server).await {
                    Ok(result) => result.map_err(anyhow::Error::from),
                    Err(_) => {
                        warn!(grace = ?self.grace, "grace period expired, aborting in-flight requests");
                        self.hard_stop.cancel();
                        let _ = tokio::time::timeout(ABORT_FLUSH, &mut server).await;
                        Err(anyhow!(
                            "in-flight requests did not finish within {:?}",
                            self.grace
                        ))
                    }
                }
            }
        };
        drop(server);

        info!(tasks = self.tasks.len(), "completing background tasks");
        self.tasks.wait().await;

        self.state.send_replace(ShutdownState::Stopped);
        match &listener_result {
            Ok(()) => info!("stopped server"),
            Err(err) => error!(error = %err, "stopped server with listener error"),
        }

        listener_result
    }

    fn enter_draining(&self) {
        self.draining.cancel();
        self.state.send_replace(ShutdownState::Draining);
    }
}

async fn wait_for_either<A, B>(a: A, b: B)
where
    A: Future<Output = ()>,
    B: Future<Output = ()>,
{
    tokio::select! {
        _ = a => {}
        _ = b => {}
    }
}

/// Outermost request layer. Races the rest of the stack against the
/// coordinator's hard-stop token so no handler outlives the grace period.
pub async fn abort_on_hard_stop(
    State(stop): State<CancellationToken>,
    request: Request,
    next: Next,
) -> Response {
    if stop.is_cancelled() {
        return ApiError::ShuttingDown.into_response();
    }

    tokio::select! {
        response = next.run(request) => response,
        _ = stop.cancelled() => ApiError::ShuttingDown.into_response(),
    }
}

/// Resolves on SIGINT or SIGTERM. Both are treated the same.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(signal = "SIGINT", "caught signal"),
        _ = terminate => info!(signal = "SIGTERM", "caught signal"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::{sleep, Instant};

    const GRACE: Duration = Duration::from_secs(5);

    /// Stands in for the listener: stops as soon as draining begins.
    fn cooperative_server(coordinator: &ShutdownCoordinator) -> impl Future<Output = io::Result<()>> {
        let draining = coordinator.draining();
        async move {
            draining.await;
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_only_after_every_background_task_even_past_grace() {
        let coordinator = ShutdownCoordinator::new(BackgroundTasks::new(), GRACE);
        let finished = Arc::new(AtomicUsize::new(0));

        for secs in [2u64, 8, 20] {
            let finished = finished.clone();
            coordinator.tasks().spawn("slow", async move {
                sleep(Duration::from_secs(secs)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }
        coordinator.tasks().spawn("panicking", async {
            sleep(Duration::from_secs(1)).await;
            panic!("task failed");
        });

        let started = Instant::now();
        let server = cooperative_server(&coordinator);
        coordinator
            .run(server, sleep(Duration::from_millis(100)))
            .await
            .unwrap();

        assert_eq!(coordinator.state(), ShutdownState::Stopped);
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(coordinator.tasks().is_empty());
        assert!(started.elapsed() >= Duration::from_secs(20));
    }

    #[tokio::test(start_paused = true)]
    async fn reports_draining_while_tasks_are_outstanding() {
        let coordinator = Arc::new(ShutdownCoordinator::new(BackgroundTasks::new(), GRACE));
        let mut states = coordinator.subscribe();
        coordinator.tasks().spawn("slow", sleep(Duration::from_secs(30)));

        let runner = {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                let server = cooperative_server(&coordinator);
                coordinator.run(server, std::future::pending()).await
            })
        };

        assert_eq!(*states.borrow(), ShutdownState::Running);
        coordinator.trigger();

        states.changed().await.unwrap();
        assert_eq!(*states.borrow_and_update(), ShutdownState::Draining);
        assert_eq!(coordinator.tasks().len(), 1);

        states.changed().await.unwrap();
        assert_eq!(*states.borrow(), ShutdownState::Stopped);
        runner.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn grace_expiry_is_returned_after_drain() {
        let coordinator = ShutdownCoordinator::new(BackgroundTasks::new(), GRACE);
        let finished = Arc::new(AtomicUsize::new(0));
        {
            let finished = finished.clone();
            coordinator.tasks().spawn("mail", async move {
                sleep(Duration::from_secs(12)).await;
                finished.fetch_add(1, Ordering::SeqCst);
            });
        }

        // A listener whose connections never close.
        let stuck = std::future::pending::<io::Result<()>>();
        let err = coordinator.run(stuck, async {}).await.unwrap_err();

        assert!(err.to_string().contains("did not finish"));
        assert!(coordinator.hard_stop().is_cancelled());
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn cooperative_drain_never_hard_stops() {
        let coordinator = ShutdownCoordinator::new(BackgroundTasks::new(), GRACE);
        let server = cooperative_server(&coordinator);
        coordinator.run(server, async {}).await.unwrap();
        assert!(!coordinator.hard_stop().is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn hard_stop_cuts_off_a_running_handler() {
        use axum::{body::Body, http::StatusCode, middleware::from_fn_with_state, routing::get, Router};
        use tower::ServiceExt;

        let finished = Arc::new(AtomicUsize::new(0));
        let stop = CancellationToken::new();
        let handler = {
            let finished = finished.clone();
            move || {
                let finished = finished.clone();
                async move {
                    sleep(Duration::from_secs(60)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                    "done"
                }
            }
        };
        let app = Router::new()
            .route("/", get(handler))
            .layer(from_fn_with_state(stop.clone(), abort_on_hard_stop));

        let request = axum::http::Request::builder().uri("/").body(Body::empty()).unwrap();
        let pending = tokio::spawn(app.oneshot(request));
        sleep(Duration::from_secs(1)).await;
        stop.cancel();

        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[axum::http::header::CONNECTION], "close");

        sleep(Duration::from_secs(120)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn listener_error_is_not_dropped() {
        let coordinator = ShutdownCoordinator::new(BackgroundTasks::new(), GRACE);
        let failing = async { Err(io::Error::new(io::ErrorKind::Other, "accept failed")) };

        let err = coordinator
            .run(failing, std::future::pending())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("accept failed"));
        assert_eq!(coordinator.state(), ShutdownState::Stopped);
    }
}
