//! User accounts and session tokens
//!
//! Credentials live in a SQLite `users` table with argon2 password hashes.
//! A session token is an opaque random ASCII string stored in the user's
//! row; at most one is live per user, and issuing a new one overwrites the
//! previous. All tokens are cleared at server startup.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use rand::{distr::Alphanumeric, Rng};
use sqlx::{Row, SqlitePool};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Length of issued session tokens
pub const TOKEN_LEN: usize = 32;

/// Username resolved by the token middleware, available to handlers as a
/// request extension.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

/// Create the user table if it does not exist yet.
pub async fn init_user_db(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            username TEXT PRIMARY KEY NOT NULL,
            password_hash TEXT NOT NULL,
            token TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::debug!("user table ready");
    Ok(())
}

/// Hash a password with argon2 (PHC string format).
pub fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hash error: {}", e)))?;
    Ok(hash.to_string())
}

fn verify_hash(hash: &str, password: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Insert a new account. Fails if the username is taken.
pub async fn create_user(pool: &SqlitePool, username: &str, password: &str) -> ApiResult<()> {
    let hash = hash_password(password)?;
    sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?)")
        .bind(username)
        .bind(&hash)
        .execute(pool)
        .await?;
    Ok(())
}

/// Check a username/password pair against the stored hash. Unknown users
/// verify as false.
pub async fn verify_user_password(
    pool: &SqlitePool,
    username: &str,
    password: &str,
) -> Result<bool, sqlx::Error> {
    let row = sqlx::query("SELECT password_hash FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;

    Ok(match row {
        Some(row) => verify_hash(&row.get::<String, _>(0), password),
        None => false,
    })
}

/// A fresh random token of `n` alphanumeric ASCII characters.
pub fn create_token(n: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(n)
        .map(char::from)
        .collect()
}

/// Associate `token` with `username`, replacing any previous token.
/// Returns false when the user does not exist.
pub async fn save_token_to_user(
    pool: &SqlitePool,
    username: &str,
    token: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET token = ? WHERE username = ?")
        .bind(token)
        .bind(username)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Username owning `token`, if the token is live.
pub async fn verify_token(pool: &SqlitePool, token: &str) -> Result<Option<String>, sqlx::Error> {
    let row = sqlx::query("SELECT username FROM users WHERE token = ?")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| row.get(0)))
}

/// Invalidate the user's current token. Returns false for unknown users.
pub async fn logout_user(pool: &SqlitePool, username: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE users SET token = NULL WHERE username = ?")
        .bind(username)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Invalidate every token. Run at startup so sessions never survive a
/// server restart.
pub async fn delete_all_tokens(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET token = NULL")
        .execute(pool)
        .await?;
    Ok(())
}

/// Middleware guarding every route except `/login`: the `Authorization`
/// header must carry a live token. The resolved username is attached to
/// the request for handlers.
pub async fn require_token(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::Unauthorized("Token needed".to_string()))?;

    let username = verify_token(&state.pool, token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid token".to_string()))?;

    request.extensions_mut().insert(AuthUser(username));
    Ok(next.run(request).await)
}
