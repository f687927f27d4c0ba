pub mod shutdown;
pub mod tasks;

use std::net::SocketAddr;

use axum::{middleware::from_fn_with_state, Router};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;

pub use shutdown::{abort_on_hard_stop, shutdown_signal, ShutdownCoordinator, ShutdownState};
pub use tasks::BackgroundTasks;

/// Binds the configured port and serves until a termination signal.
pub async fn serve(config: &Config, app: Router, coordinator: &ShutdownCoordinator) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, env = %config.environment, "starting server");
    serve_on(listener, app, coordinator, shutdown_signal()).await
}

/// Serves on an already bound listener until `signal` resolves or the
/// coordinator is triggered, then drains. Requests still running when the
/// grace period ends are answered with `503`.
pub async fn serve_on<S>(
    listener: TcpListener,
    app: Router,
    coordinator: &ShutdownCoordinator,
    signal: S,
) -> anyhow::Result<()>
where
    S: std::future::Future<Output = ()>,
{
    let app = app.layer(from_fn_with_state(coordinator.hard_stop(), abort_on_hard_stop));
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(coordinator.draining());

    coordinator.run(server, signal).await
}
