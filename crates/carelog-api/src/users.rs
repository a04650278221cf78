use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{Postgres, QueryBuilder};

use crate::auth::require_auth;
use crate::models::Account;
use crate::{not_found, stale_version, ApiResult, AppState};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct AccountUpdateRequest {
    pub full_name: Option<String>,
    pub preferences: Option<Value>,
    /// Opt-in optimistic concurrency: reject the update when the stored
    /// version no longer matches.
    pub expected_version: Option<i32>,
}

pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Json<Account>> {
    let auth = require_auth(&state, &headers).await?;
    fetch_account(&state, &auth.user_id).await.map(Json)
}

pub async fn update_me(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<AccountUpdateRequest>,
) -> ApiResult<Json<Account>> {
    let auth = require_auth(&state, &headers).await?;

    if payload.full_name.is_none() && payload.preferences.is_none() {
        return fetch_account(&state, &auth.user_id).await.map(Json);
    }

    let mut query = QueryBuilder::<Postgres>::new("UPDATE users SET version = version + 1");
    if let Some(full_name) = payload.full_name {
        query.push(", full_name = ");
        query.push_bind(full_name);
    }
    if let Some(preferences) = payload.preferences {
        query.push(", preferences = ");
        query.push_bind(preferences);
    }
    query.push(" WHERE id = ");
    query.push_bind(auth.user_id.clone());
    if let Some(expected) = payload.expected_version {
        query.push(" AND version = ");
        query.push_bind(expected);
    }
    query.push(" RETURNING id, email, full_name, is_active, preferences, version, last_sync");

    let row = query.build().fetch_optional(&state.pool).await?;
    match row {
        Some(row) => Ok(Json(Account::from_row(&row)?)),
        None if payload.expected_version.is_some() => Err(stale_version()),
        None => Err(not_found("account not found")),
    }
}

async fn fetch_account(state: &AppState, user_id: &str) -> ApiResult<Account> {
    let row = sqlx::query(
        "SELECT id, email, full_name, is_active, preferences, version, last_sync \
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| not_found("account not found"))?;
    Account::from_row(&row)
}
