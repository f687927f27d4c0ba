use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use serde::Serialize;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::database::manager::{with_deadline, DatabaseError, QUERY_TIMEOUT};
use crate::validator::Validator;

/// Length of a base32 encoded 16 byte token without padding.
pub const TOKEN_PLAINTEXT_LEN: usize = 26;

const TOKEN_ENTROPY_BYTES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenScope {
    Activation,
    Authentication,
    PasswordReset,
}

impl TokenScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenScope::Activation => "activation",
            TokenScope::Authentication => "authentication",
            TokenScope::PasswordReset => "password-reset",
        }
    }
}

impl fmt::Display for TokenScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Token {
    #[serde(rename = "token")]
    pub plaintext: String,
    #[serde(skip)]
    pub hash: Vec<u8>,
    #[serde(skip)]
    pub user_id: i64,
    pub expiry: DateTime<Utc>,
    #[serde(skip)]
    pub scope: TokenScope,
}

impl Token {
    /// Creates a random token for `user_id` that expires `ttl` from now.
    pub fn generate(user_id: i64, ttl: Duration, scope: TokenScope) -> Self {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let plaintext = BASE32_NOPAD.encode(&bytes);
        let hash = Sha256::digest(plaintext.as_bytes()).to_vec();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            plaintext,
            hash,
            user_id,
            expiry: Utc::now() + ttl,
            scope,
        }
    }
}

pub fn validate_token_plaintext(v: &mut Validator, plaintext: &str) {
    v.check(!plaintext.is_empty(), "token", "must be provided");
    v.check(
        plaintext.len() == TOKEN_PLAINTEXT_LEN,
        "token",
        "must be 26 bytes long",
    );
    v.check(
        plaintext.bytes().all(is_base32_symbol),
        "token",
        "must only contain base32 characters",
    );
}

/// Upper-case RFC 4648 alphabet, the only symbols [`Token::generate`] emits.
fn is_base32_symbol(b: u8) -> bool {
    b.is_ascii_uppercase() || (b'2'..=b'7').contains(&b)
}

#[derive(Clone)]
pub struct TokenModel {
    pool: PgPool,
}

impl TokenModel {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn new_token(
        &self,
        user_id: i64,
        ttl: Duration,
        scope: TokenScope,
    ) -> Result<Token, DatabaseError> {
        let token = Token::generate(user_id, ttl, scope);
        self.insert(&token).await?;
        Ok(token)
    }

    pub async fn insert(&self, token: &Token) -> Result<(), DatabaseError> {
        let query = r#"
            INSERT INTO tokens (hash, user_id, expiry, scope)
            VALUES ($1, $2, $3, $4)
        "#;

        with_deadline(QUERY_TIMEOUT, async {
            sqlx::query(query)
                .bind(&token.hash)
                .bind(token.user_id)
                .bind(token.expiry)
                .bind(token.scope.as_str())
                .execute(&self.pool)
                .await?;
            Ok::<_, DatabaseError>(())
        })
        .await
    }

    pub async fn delete_all_for_user(
        &self,
        scope: TokenScope,
        user_id: i64,
    ) -> Result<(), DatabaseError> {
        let query = r#"
            DELETE FROM tokens
            WHERE scope = $1 AND user_id = $2
        "#;

        with_deadline(QUERY_TIMEOUT, async {
            sqlx::query(query)
                .bind(scope.as_str())
                .bind(user_id)
                .execute(&self.pool)
                .await?;
            Ok::<_, DatabaseError>(())
        })
        .await
    }
}
