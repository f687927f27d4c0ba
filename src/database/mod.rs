pub mod manager;
pub mod models;
pub mod versioned;

use sqlx::PgPool;

pub use manager::{open_pool, with_deadline, DatabaseError, QUERY_TIMEOUT};
pub use versioned::{ConcurrencyGuard, ConditionalUpdate, Versioned};

use models::{MovieModel, PermissionModel, TokenModel, UserModel};

/// Storage handles shared by every request.
#[derive(Clone)]
pub struct Models {
    pub movies: MovieModel,
    pub users: UserModel,
    pub tokens: TokenModel,
    pub permissions: PermissionModel,
    pub guard: ConcurrencyGuard,
}

impl Models {
    pub fn new(pool: PgPool) -> Self {
        Self {
            movies: MovieModel::new(pool.clone()),
            users: UserModel::new(pool.clone()),
            tokens: TokenModel::new(pool.clone()),
            permissions: PermissionModel::new(pool),
            guard: ConcurrencyGuard::default(),
        }
    }
}
