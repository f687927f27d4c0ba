use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::database::Models;
use crate::mail::Mailer;
use crate::middleware::auth::{CredentialLookup, PrincipalResolver};
use crate::middleware::authorize::{AuthorizationChain, PermissionLookup};
use crate::middleware::metrics::Metrics;
use crate::middleware::rate_limit::ClientThrottle;
use crate::server::BackgroundTasks;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub models: Models,
    pub mailer: Arc<dyn Mailer>,
    pub tasks: BackgroundTasks,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new(config: Arc<Config>, pool: PgPool, mailer: Arc<dyn Mailer>, tasks: BackgroundTasks) -> Self {
        Self {
            config,
            models: Models::new(pool.clone()),
            pool,
            mailer,
            tasks,
            metrics: Arc::new(Metrics::new()),
        }
    }
}

/// The request governance pipeline that sits in front of the handlers.
#[derive(Clone)]
pub struct Governance {
    pub throttle: Arc<ClientThrottle>,
    pub resolver: PrincipalResolver,
    pub chain: AuthorizationChain,
}

impl Governance {
    pub fn new(
        throttle: Arc<ClientThrottle>,
        credentials: Arc<dyn CredentialLookup>,
        permissions: Arc<dyn PermissionLookup>,
    ) -> Self {
        Self {
            throttle,
            resolver: PrincipalResolver::new(credentials),
            chain: AuthorizationChain::new(permissions),
        }
    }

    /// Governance backed by the application's own storage.
    pub fn from_state(state: &AppState) -> Self {
        Self::new(
            Arc::new(ClientThrottle::new(&state.config.limiter)),
            Arc::new(state.models.users.clone()),
            Arc::new(state.models.permissions.clone()),
        )
    }
}
