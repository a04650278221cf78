use anyhow::Result;
use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use carelog_core::auth::JwtConfig;
use carelog_core::rate_limit::RateLimiter;
use carelog_core::{auth as jwt, config, db, http, logging, metrics, server};
use jsonwebtoken::Algorithm;
use serde::Serialize;
use serde_json::Value;
use sqlx::{Pool, Postgres};
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::ToSchema;

mod access;
mod activities;
mod auth;
mod babies;
mod care_team;
mod models;
mod openapi;
mod users;

#[cfg(test)]
mod handler_tests;
#[cfg(test)]
mod openapi_contract_tests;

const SERVICE_NAME: &str = "carelog-api";

pub(crate) const MAX_PAGE_SIZE: i64 = 100;

#[derive(Clone)]
pub(crate) struct AppState {
    pool: Pool<Postgres>,
    jwt: Arc<JwtConfig>,
    rate_limiter: Arc<RateLimiter>,
    rate_limit_per_minute: u64,
}

impl AppState {
    pub(crate) fn new(pool: Pool<Postgres>, config: &ApiConfig) -> Self {
        AppState {
            pool,
            jwt: Arc::new(JwtConfig {
                secret: config.secret_key.clone(),
                algorithm: config.jwt_algorithm,
                access_ttl_seconds: config.access_token_expire_minutes * 60,
                refresh_ttl_seconds: config.refresh_token_expire_days * 86_400,
            }),
            rate_limiter: Arc::new(RateLimiter::new()),
            rate_limit_per_minute: config.rate_limit_per_minute,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub(crate) struct ErrorResponse {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<Value>,
    header: Option<(HeaderName, String)>,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            header: None,
        }
    }

    pub(crate) fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub(crate) fn with_header(mut self, name: HeaderName, value: String) -> Self {
        self.header = Some((name, value));
        self
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "DB_ERROR", err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = ErrorResponse {
            code: self.code,
            message: self.message,
            details: self.details,
        };
        let mut response = (self.status, Json(payload)).into_response();
        if let Some((name, value)) = self.header {
            if let Ok(value) = HeaderValue::from_str(&value) {
                response.headers_mut().insert(name, value);
            }
        }
        response
    }
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub(crate) fn not_found(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub(crate) fn forbidden(message: impl Into<String>) -> ApiError {
    ApiError::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
}

pub(crate) fn stale_version() -> ApiError {
    ApiError::new(
        StatusCode::CONFLICT,
        "STALE_VERSION",
        "record changed since the expected version",
    )
}

/// Clamp offset pagination to sane bounds; limit is capped at
/// [`MAX_PAGE_SIZE`].
pub(crate) fn page_window(skip: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let skip = skip.unwrap_or(0).max(0);
    let limit = limit.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (skip, limit)
}

#[derive(Serialize, ToSchema)]
pub(crate) struct HealthStatus {
    status: String,
    version: String,
}

pub struct ApiConfig {
    pub addr: SocketAddr,
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_host: Option<String>,
    pub redis_port: u16,
    pub secret_key: String,
    pub jwt_algorithm: Algorithm,
    pub access_token_expire_minutes: u64,
    pub refresh_token_expire_days: u64,
    pub max_sync_batch_size: u64,
    pub rate_limit_per_minute: u64,
    pub cors_origins: Vec<String>,
}

pub fn load_config() -> Result<ApiConfig> {
    let addr = config::socket_addr_from_env("API_ADDR", "0.0.0.0:8000")?;
    let database_url = config::database_url_from_env()?;
    let database_max_connections = config::u64_from_env("DATABASE_MAX_CONNECTIONS", 10) as u32;
    // Recognized but consumed by no code path yet; see DESIGN.md.
    let redis_host = std::env::var("REDIS_HOST").ok();
    let redis_port = config::u64_from_env("REDIS_PORT", 6379) as u16;
    let secret_key = config::required_env("SECRET_KEY")?;
    let jwt_algorithm = jwt::parse_algorithm(
        &std::env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
    )?;
    let access_token_expire_minutes = config::u64_from_env("ACCESS_TOKEN_EXPIRE_MINUTES", 30);
    let refresh_token_expire_days = config::u64_from_env("REFRESH_TOKEN_EXPIRE_DAYS", 7);
    let max_sync_batch_size = config::u64_from_env("MAX_SYNC_BATCH_SIZE", 100);
    let rate_limit_per_minute = config::u64_from_env("RATE_LIMIT_PER_MINUTE", 100);
    let cors_origins = config::list_from_env("CORS_ORIGINS");

    Ok(ApiConfig {
        addr,
        database_url,
        database_max_connections,
        redis_host,
        redis_port,
        secret_key,
        jwt_algorithm,
        access_token_expire_minutes,
        refresh_token_expire_days,
        max_sync_batch_size,
        rate_limit_per_minute,
        cors_origins,
    })
}

pub(crate) fn router(state: AppState) -> Router {
    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/login/access-token", post(auth::login_access_token))
        .route("/register", post(auth::register))
        .route("/refresh-token", post(auth::refresh_token));

    let v1 = Router::new()
        .nest("/auth", auth_routes)
        .route("/users/me", get(users::me).patch(users::update_me))
        .route("/babies", post(babies::create_baby).get(babies::list_babies))
        .route(
            "/babies/:baby_id",
            get(babies::get_baby)
                .patch(babies::update_baby)
                .delete(babies::delete_baby),
        )
        .route(
            "/babies/:baby_id/activities",
            post(activities::create_activity).get(activities::list_activities),
        )
        .route(
            "/activities/:activity_id",
            get(activities::get_activity)
                .patch(activities::update_activity)
                .delete(activities::delete_activity),
        )
        .route(
            "/babies/:baby_id/care-team",
            get(care_team::list_members).post(care_team::add_member),
        )
        .route(
            "/care-team/:member_id",
            axum::routing::patch(care_team::update_member).delete(care_team::remove_member),
        )
        .route("/openapi.json", get(openapi_json));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .nest("/api/v1", v1)
        .with_state(state)
}

pub async fn run(config: ApiConfig) -> Result<()> {
    logging::init(SERVICE_NAME);
    metrics::init(SERVICE_NAME);

    let pool = db::connect(&config.database_url, config.database_max_connections).await?;
    let state = AppState::new(pool, &config);

    let router = router(state);
    let router = match http::cors_layer(&config.cors_origins) {
        Some(cors) => router.layer(cors),
        None => router,
    };
    let router = http::apply_standard_layers(router, SERVICE_NAME);

    server::serve(config.addr, router).await
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_ready(&state.pool).await {
        Ok(_) => (
            StatusCode::OK,
            Json(HealthStatus {
                status: "healthy".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthStatus {
                status: "unavailable".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            }),
        ),
    }
}

async fn metrics_endpoint() -> impl IntoResponse {
    metrics::metrics_response(SERVICE_NAME)
}

pub(crate) async fn openapi_json(headers: HeaderMap) -> impl IntoResponse {
    let server_url = openapi::infer_server_url(&headers);
    Json(openapi::document(server_url.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_window_clamps_bounds() {
        assert_eq!(page_window(None, None), (0, MAX_PAGE_SIZE));
        assert_eq!(page_window(Some(-5), Some(0)), (0, 1));
        assert_eq!(page_window(Some(20), Some(50)), (20, 50));
        assert_eq!(page_window(Some(0), Some(10_000)), (0, MAX_PAGE_SIZE));
    }
}
