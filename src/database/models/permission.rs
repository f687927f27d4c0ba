use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::manager::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::middleware::authorize::PermissionLookup;

pub const MOVIES_READ: &str = "movies:read";
pub const MOVIES_WRITE: &str = "movies:write";

/// Permission codes held by one user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    pub fn include(&self, code: &str) -> bool {
        self.0.iter().any(|p| p == code)
    }
}

impl From<Vec<String>> for Permissions {
    fn from(codes: Vec<String>) -> Self {
        Self(codes)
    }
}

#[derive(Clone)]
pub struct PermissionModel {
    pool: PgPool,
}

impl PermissionModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The deadline is applied by the caller.
    pub async fn get_all_for_user(&self, user_id: i64) -> Result<Permissions, DatabaseError> {
        let query = r#"
            SELECT permissions.code
            FROM permissions
            INNER JOIN users_permissions ON users_permissions.permission_id = permissions.id
            INNER JOIN users ON users_permissions.user_id = users.id
            WHERE users.id = $1
        "#;

        let codes = sqlx::query_scalar::<_, String>(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(Permissions(codes))
    }

    pub async fn add_for_user(&self, user_id: i64, codes: &[&str]) -> Result<(), DatabaseError> {
        let query = r#"
            INSERT INTO users_permissions
            SELECT $1, permissions.id FROM permissions WHERE permissions.code = ANY($2)
        "#;

        let codes: Vec<String> = codes.iter().map(|c| c.to_string()).collect();
        with_deadline(QUERY_TIMEOUT, async {
            sqlx::query(query)
                .bind(user_id)
                .bind(&codes)
                .execute(&self.pool)
                .await?;
            Ok::<_, DatabaseError>(())
        })
        .await
    }
}

#[async_trait]
impl PermissionLookup for PermissionModel {
    async fn permissions_for_user(&self, user_id: i64) -> Result<Permissions, DatabaseError> {
        self.get_all_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_is_exact_membership() {
        let perms = Permissions::from(vec![MOVIES_READ.to_string()]);
        assert!(perms.include("movies:read"));
        assert!(!perms.include("movies:write"));
        assert!(!perms.include("movies"));
        assert!(!Permissions::default().include(MOVIES_READ));
    }
}
