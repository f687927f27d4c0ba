use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cinevault::config::Config;
use cinevault::database::open_pool;
use cinevault::server::{self, BackgroundTasks, ShutdownCoordinator};
use cinevault::{app, mail, AppState, Governance};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so local runs pick up CINEVAULT_DB_DSN and friends.
    let _ = dotenvy::dotenv();

    let config = Config::parse();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let pool = open_pool(&config.db).await?;
    info!("database connection pool established");

    let mailer = mail::from_config(&config.smtp)?;
    let tasks = BackgroundTasks::new();
    let config = Arc::new(config);

    let state = AppState::new(config.clone(), pool.clone(), mailer, tasks.clone());
    let governance = Governance::from_state(&state);
    let sweeper = governance.throttle.spawn_sweeper();

    let coordinator = ShutdownCoordinator::new(tasks, config.shutdown_grace);
    let result = server::serve(&config, app(state, governance), &coordinator).await;

    sweeper.abort();
    pool.close().await;
    result
}
