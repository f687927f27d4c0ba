use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::{postgres::PgRow, FromRow, PgPool, Row};
use thiserror::Error;

use crate::database::manager::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::database::models::token::TokenScope;
use crate::database::versioned::{ConditionalUpdate, Versioned};
use crate::middleware::auth::CredentialLookup;
use crate::validator::{matches, Validator, EMAIL_RX};

const BCRYPT_COST: u32 = 12;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("stored password hash is not valid utf-8")]
    Encoding,
}

/// Password hash plus, transiently, the plaintext it was set from so that it
/// can be validated before the user is written.
#[derive(Clone, Default)]
pub struct Password {
    plaintext: Option<String>,
    hash: Option<Vec<u8>>,
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Password")
            .field("hash", &self.hash.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Password {
    pub fn from_hash(hash: Vec<u8>) -> Self {
        Self {
            plaintext: None,
            hash: Some(hash),
        }
    }

    pub fn hash(&self) -> Option<&[u8]> {
        self.hash.as_deref()
    }

    pub fn plaintext(&self) -> Option<&str> {
        self.plaintext.as_deref()
    }

    /// bcrypt is CPU bound, so hashing happens on the blocking pool.
    pub async fn set(&mut self, plaintext: &str) -> Result<(), PasswordError> {
        let owned = plaintext.to_string();
        let hash = tokio::task::spawn_blocking(move || bcrypt::hash(owned, BCRYPT_COST)).await??;
        self.plaintext = Some(plaintext.to_string());
        self.hash = Some(hash.into_bytes());
        Ok(())
    }

    pub async fn matches(&self, plaintext: &str) -> Result<bool, PasswordError> {
        let Some(hash) = self.hash.as_deref() else {
            return Ok(false);
        };
        let hash = std::str::from_utf8(hash)
            .map_err(|_| PasswordError::Encoding)?
            .to_string();
        let candidate = plaintext.to_string();
        Ok(tokio::task::spawn_blocking(move || bcrypt::verify(candidate, &hash)).await??)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password: Password,
    pub activated: bool,
    #[serde(skip)]
    pub version: i32,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            created_at: row.try_get("created_at")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password: Password::from_hash(row.try_get("password_hash")?),
            activated: row.try_get("activated")?,
            version: row.try_get("version")?,
        })
    }
}

impl Versioned for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }
}

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(password.len() >= 8, "password", "must be at least 8 bytes long");
    v.check(password.len() <= 72, "password", "must not be more than 72 bytes long");
}

pub fn validate_user(v: &mut Validator, user: &User) {
    v.check(!user.name.is_empty(), "name", "must be provided");
    v.check(user.name.len() <= 500, "name", "must not be more than 500 bytes long");
    validate_email(v, &user.email);

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, plaintext);
    }

    // A user reaching validation without a hash is a programming error, not bad input.
    debug_assert!(user.password.hash().is_some(), "missing password hash for user");
}

fn is_duplicate_email(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db.constraint() == Some("users_email_key"),
        _ => false,
    }
}

fn token_hash(plaintext: &str) -> Vec<u8> {
    Sha256::digest(plaintext.as_bytes()).to_vec()
}

#[derive(Clone)]
pub struct UserModel {
    pool: PgPool,
}

impl UserModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, user: &mut User) -> Result<(), DatabaseError> {
        let hash = user
            .password
            .hash()
            .ok_or(DatabaseError::MissingPasswordHash)?
            .to_vec();

        let query = r#"
            INSERT INTO users (name, email, password_hash, activated)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at, version
        "#;

        let row = with_deadline(QUERY_TIMEOUT, async {
            sqlx::query(query)
                .bind(&user.name)
                .bind(&user.email)
                .bind(hash)
                .bind(user.activated)
                .fetch_one(&self.pool)
                .await
                .map_err(|e| {
                    if is_duplicate_email(&e) {
                        DatabaseError::DuplicateEmail
                    } else {
                        DatabaseError::Sqlx(e)
                    }
                })
        })
        .await?;

        user.id = row.try_get("id")?;
        user.created_at = row.try_get("created_at")?;
        user.version = row.try_get("version")?;
        Ok(())
    }

    pub async fn get_by_email(&self, email: &str) -> Result<User, DatabaseError> {
        let query = r#"
            SELECT id, created_at, name, email::text AS email, password_hash, activated, version
            FROM users
            WHERE email = $1::citext
        "#;

        with_deadline(QUERY_TIMEOUT, async {
            sqlx::query_as::<_, User>(query)
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::from_row_lookup)
        })
        .await
    }

    pub async fn get(&self, id: i64) -> Result<User, DatabaseError> {
        let query = r#"
            SELECT id, created_at, name, email::text AS email, password_hash, activated, version
            FROM users
            WHERE id = $1
        "#;

        with_deadline(QUERY_TIMEOUT, async {
            sqlx::query_as::<_, User>(query)
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(DatabaseError::from_row_lookup)
        })
        .await
    }

    /// Finds the owner of an unexpired token. The deadline is the caller's.
    pub async fn get_for_token(
        &self,
        scope: TokenScope,
        plaintext: &str,
    ) -> Result<User, DatabaseError> {
        let query = r#"
            SELECT users.id, users.created_at, users.name, users.email::text AS email,
                   users.password_hash, users.activated, users.version
            FROM users
            INNER JOIN tokens ON users.id = tokens.user_id
            WHERE tokens.hash = $1
            AND tokens.scope = $2
            AND tokens.expiry > $3
        "#;

        sqlx::query_as::<_, User>(query)
            .bind(token_hash(plaintext))
            .bind(scope.as_str())
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_row_lookup)
    }
}

#[async_trait]
impl ConditionalUpdate<User> for UserModel {
    async fn update_if_version(&self, user: &User) -> Result<Option<i32>, DatabaseError> {
        let hash = user
            .password
            .hash()
            .ok_or(DatabaseError::MissingPasswordHash)?;

        let query = r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, activated = $4, version = version + 1
            WHERE id = $5 AND version = $6
            RETURNING version
        "#;

        sqlx::query_scalar::<_, i32>(query)
            .bind(&user.name)
            .bind(&user.email)
            .bind(hash)
            .bind(user.activated)
            .bind(user.id)
            .bind(user.version)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                if is_duplicate_email(&e) {
                    DatabaseError::DuplicateEmail
                } else {
                    DatabaseError::Sqlx(e)
                }
            })
    }
}

#[async_trait]
impl CredentialLookup for UserModel {
    async fn user_for_token(&self, scope: TokenScope, plaintext: &str) -> Result<User, DatabaseError> {
        self.get_for_token(scope, plaintext).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_hash() -> User {
        User {
            id: 1,
            created_at: Utc::now(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            password: Password::from_hash(b"$2b$12$placeholder".to_vec()),
            activated: false,
            version: 1,
        }
    }

    #[test]
    fn serialization_hides_password_and_version() {
        let value = serde_json::to_value(user_with_hash()).unwrap();
        assert!(value.get("password").is_none());
        assert!(value.get("version").is_none());
        assert_eq!(value["activated"], false);
    }

    #[test]
    fn debug_output_redacts_hash() {
        let rendered = format!("{:?}", user_with_hash().password);
        assert!(rendered.contains("<redacted>"));
        assert!(!rendered.contains("placeholder"));
    }

    #[test]
    fn password_rules() {
        let mut v = Validator::new();
        validate_password_plaintext(&mut v, "short");
        assert_eq!(v.errors["password"], "must be at least 8 bytes long");

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, &"x".repeat(73));
        assert_eq!(v.errors["password"], "must not be more than 72 bytes long");
    }

    #[test]
    fn user_rules() {
        let mut user = user_with_hash();
        user.name.clear();
        user.email = "nope".into();

        let mut v = Validator::new();
        validate_user(&mut v, &user);
        assert_eq!(v.errors["name"], "must be provided");
        assert_eq!(v.errors["email"], "must be a valid email address");
    }

    #[tokio::test]
    async fn password_set_then_matches() {
        let mut password = Password::default();
        password.set("pa55word-long").await.unwrap();

        assert_eq!(password.plaintext(), Some("pa55word-long"));
        assert!(password.matches("pa55word-long").await.unwrap());
        assert!(!password.matches("wrong-password").await.unwrap());
    }

    #[test]
    fn token_hash_is_sha256() {
        assert_eq!(token_hash("ABC").len(), 32);
        assert_eq!(token_hash("ABC"), token_hash("ABC"));
        assert_ne!(token_hash("ABC"), token_hash("ABD"));
    }
}
