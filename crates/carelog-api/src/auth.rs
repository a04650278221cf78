use axum::extract::{ConnectInfo, State};
use axum::http::header::{AUTHORIZATION, RETRY_AFTER, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, StatusCode};
use axum::{Form, Json};
use carelog_core::auth::{issue_token_pair, verify_token, TokenKind};
use carelog_core::{metrics, password};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Postgres, Row};
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

use crate::models::Account;
use crate::{ApiError, ApiResult, AppState, SERVICE_NAME};

const AUTHENTICATE_BEARER_CHALLENGE: &str = r#"Bearer realm="carelog-api""#;

/// OAuth2 password-form login: the `username` field carries the email.
#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub full_name: Option<String>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
}

impl From<carelog_core::auth::TokenPair> for TokenResponse {
    fn from(pair: carelog_core::auth::TokenPair) -> Self {
        TokenResponse {
            access_token: pair.access_token,
            token_type: "bearer".to_string(),
            refresh_token: pair.refresh_token,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct RegisterResponse {
    pub account: Account,
    pub access_token: String,
    pub token_type: String,
    pub refresh_token: String,
}

#[derive(Clone)]
pub(crate) struct AuthContext {
    pub user_id: String,
}

pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Json<TokenResponse>> {
    enforce_rate_limit(&state, &rate_key(addr)).await?;
    let user_id = authenticate(&state, &form.username, &form.password).await?;
    issue_pair(&state, &user_id).map(|pair| Json(pair.into()))
}

pub async fn login_access_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    enforce_rate_limit(&state, &rate_key(addr)).await?;
    let user_id = authenticate(&state, &payload.email, &payload.password).await?;
    issue_pair(&state, &user_id).map(|pair| Json(pair.into()))
}

pub async fn register(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<Json<RegisterResponse>> {
    enforce_rate_limit(&state, &rate_key(addr)).await?;

    let email = validate_email(&payload.email)?;
    if payload.password.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_PASSWORD",
            "password must not be empty",
        ));
    }
    if payload.password != payload.confirm_password {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "PASSWORD_MISMATCH",
            "passwords do not match",
        ));
    }

    let password = payload.password.clone();
    let password_hash = tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|err| auth_internal_error(err.to_string()))?
        .map_err(|err| auth_internal_error(err.to_string()))?;

    let user_id = Uuid::new_v4().to_string();
    let row = sqlx::query(
        "INSERT INTO users (id, email, password_hash, full_name) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, email, full_name, is_active, preferences, version, last_sync",
    )
    .bind(&user_id)
    .bind(&email)
    .bind(&password_hash)
    .bind(&payload.full_name)
    .fetch_one(&state.pool)
    .await
    .map_err(|err| {
        if err
            .as_database_error()
            .map(|db| db.is_unique_violation())
            .unwrap_or(false)
        {
            ApiError::new(
                StatusCode::CONFLICT,
                "EMAIL_TAKEN",
                "email already registered",
            )
        } else {
            ApiError::from(err)
        }
    })?;

    let account = Account::from_row(&row)?;
    let pair = issue_pair(&state, &account.id)?;
    tracing::info!(user_id = %account.id, "account registered");

    Ok(Json(RegisterResponse {
        account,
        access_token: pair.access_token,
        token_type: "bearer".to_string(),
        refresh_token: pair.refresh_token,
    }))
}

pub async fn refresh_token(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(payload): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    enforce_rate_limit(&state, &rate_key(addr)).await?;

    let claims = verify_token(&payload.refresh_token, TokenKind::Refresh, &state.jwt)
        .map_err(|err| {
            metrics::inc_auth_failure(SERVICE_NAME);
            ApiError::new(StatusCode::UNAUTHORIZED, "AUTH_FAILED", err.to_string())
        })?;

    let row = sqlx::query("SELECT is_active FROM users WHERE id = $1")
        .bind(&claims.sub)
        .fetch_optional(&state.pool)
        .await?;
    let Some(row) = row else {
        metrics::inc_auth_failure(SERVICE_NAME);
        return Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "AUTH_FAILED",
            "unknown account",
        ));
    };
    let is_active: bool = row.try_get("is_active")?;
    if !is_active {
        return Err(account_disabled());
    }

    issue_pair(&state, &claims.sub).map(|pair| Json(pair.into()))
}

/// Verify credentials against the stored hash. Unknown email and wrong
/// password produce the same response so the endpoint cannot be used to
/// probe which addresses have accounts.
async fn authenticate(state: &AppState, email: &str, password: &str) -> ApiResult<String> {
    let row = sqlx::query("SELECT id, password_hash, is_active FROM users WHERE email = $1")
        .bind(email.trim())
        .fetch_optional(&state.pool)
        .await?;

    let Some(row) = row else {
        metrics::inc_auth_failure(SERVICE_NAME);
        return Err(invalid_credentials());
    };

    let user_id: String = row.try_get("id")?;
    let password_hash: String = row.try_get("password_hash")?;
    let is_active: bool = row.try_get("is_active")?;

    let password = password.to_string();
    let verified =
        tokio::task::spawn_blocking(move || password::verify_password(&password, &password_hash))
            .await
            .map_err(|err| auth_internal_error(err.to_string()))?
            .map_err(|err| auth_internal_error(err.to_string()))?;

    if !verified {
        metrics::inc_auth_failure(SERVICE_NAME);
        return Err(invalid_credentials());
    }
    if !is_active {
        return Err(account_disabled());
    }

    metrics::inc_auth_success(SERVICE_NAME);
    Ok(user_id)
}

pub(crate) async fn require_auth(state: &AppState, headers: &HeaderMap) -> ApiResult<AuthContext> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| auth_required_error("missing token"))?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| auth_required_error("invalid token"))?;
    let claims = verify_token(token, TokenKind::Access, &state.jwt)
        .map_err(|err| auth_required_error(err.to_string()))?;
    ensure_active_account(&state.pool, &claims.sub).await?;
    Ok(AuthContext {
        user_id: claims.sub,
    })
}

async fn ensure_active_account(pool: &Pool<Postgres>, user_id: &str) -> ApiResult<()> {
    let is_active = sqlx::query_scalar::<_, bool>("SELECT is_active FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    match is_active {
        Some(true) => Ok(()),
        Some(false) => Err(account_disabled()),
        None => Err(auth_required_error("unknown account")),
    }
}

pub(crate) async fn enforce_rate_limit(state: &AppState, key: &str) -> ApiResult<()> {
    if state.rate_limit_per_minute == 0 {
        return Ok(());
    }
    let outcome = state
        .rate_limiter
        .check(key, state.rate_limit_per_minute, Duration::from_secs(60))
        .await;
    if !outcome.allowed {
        metrics::inc_rate_limited(SERVICE_NAME);
        let retry_after = outcome
            .retry_after
            .map(|duration| duration.as_secs().max(1))
            .unwrap_or(60);
        return Err(ApiError::new(
            StatusCode::TOO_MANY_REQUESTS,
            "RATE_LIMITED",
            "too many requests",
        )
        .with_details(serde_json::json!({ "retry_after_seconds": retry_after }))
        .with_header(RETRY_AFTER, retry_after.to_string()));
    }
    Ok(())
}

fn rate_key(addr: SocketAddr) -> String {
    format!("auth:{}", addr.ip())
}

fn issue_pair(state: &AppState, user_id: &str) -> ApiResult<carelog_core::auth::TokenPair> {
    issue_token_pair(user_id, &state.jwt).map_err(|err| auth_internal_error(err.to_string()))
}

fn invalid_credentials() -> ApiError {
    ApiError::new(
        StatusCode::UNAUTHORIZED,
        "AUTH_FAILED",
        "incorrect email or password",
    )
    .with_header(WWW_AUTHENTICATE, AUTHENTICATE_BEARER_CHALLENGE.to_string())
}

fn account_disabled() -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, "ACCOUNT_DISABLED", "account disabled")
}

fn auth_required_error(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, "AUTH_REQUIRED", message).with_header(
        WWW_AUTHENTICATE,
        AUTHENTICATE_BEARER_CHALLENGE.to_string(),
    )
}

fn auth_internal_error(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "AUTH_ERROR", message)
}

fn validate_email(email: &str) -> ApiResult<String> {
    let email = email.trim();
    let valid = email
        .split_once('@')
        .map(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        })
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_EMAIL",
            "invalid email address",
        ));
    }
    Ok(email.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_email_accepts_plain_addresses() {
        assert_eq!(validate_email(" a@x.com ").unwrap(), "a@x.com");
        assert!(validate_email("a@x.com").is_ok());
    }

    #[test]
    fn validate_email_rejects_junk() {
        for junk in ["", "no-at-sign", "@x.com", "a@nodot", "a@.com", "a@x."] {
            assert!(validate_email(junk).is_err(), "accepted {junk:?}");
        }
    }
}
