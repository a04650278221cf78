use anyhow::{anyhow, Result};
use sqlx::{Pool, Postgres};
use uuid::Uuid;

use crate::password::hash_password;

/// Create the first account if the users table is empty. Returns `false`
/// without writing anything when any account already exists, so the command
/// is safe to re-run on every deploy.
pub async fn bootstrap_account(
    pool: &Pool<Postgres>,
    email: &str,
    password: &str,
) -> Result<bool> {
    let email = email.trim();
    if email.is_empty() {
        return Err(anyhow!("email is required"));
    }
    if password.is_empty() {
        return Err(anyhow!("password is required"));
    }

    let mut tx = pool.begin().await?;
    let existing =
        sqlx::query_scalar::<_, String>("SELECT id FROM users LIMIT 1")
            .fetch_optional(&mut *tx)
            .await?;

    if existing.is_some() {
        tx.rollback().await?;
        return Ok(false);
    }

    let user_id = Uuid::new_v4().to_string();
    let password_hash = hash_password(password)?;

    sqlx::query(
        "INSERT INTO users (id, email, password_hash, is_active) \
         VALUES ($1, $2, $3, TRUE)",
    )
    .bind(&user_id)
    .bind(email)
    .bind(&password_hash)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(user_id, "bootstrapped first account");
    Ok(true)
}
