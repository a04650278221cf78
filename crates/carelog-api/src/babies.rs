use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::access::{ensure_baby_access, ensure_primary_caregiver};
use crate::auth::require_auth;
use crate::models::Baby;
use crate::{not_found, page_window, stale_version, ApiError, ApiResult, AppState};

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BabyCreateRequest {
    pub name: String,
    pub development_data: Option<Value>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct BabyUpdateRequest {
    pub name: Option<String>,
    pub development_data: Option<Value>,
    pub expected_version: Option<i32>,
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// The creator becomes the primary caregiver and gets a `primary` care-team
/// row in the same transaction.
pub async fn create_baby(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<BabyCreateRequest>,
) -> ApiResult<Json<Baby>> {
    let auth = require_auth(&state, &headers).await?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "INVALID_NAME",
            "name must not be empty",
        ));
    }

    let baby_id = Uuid::new_v4().to_string();
    let membership_id = Uuid::new_v4().to_string();
    let development_data = payload.development_data.unwrap_or_else(|| json!({}));

    let mut tx = state.pool.begin().await?;
    let row = sqlx::query(
        "INSERT INTO babies (id, name, primary_caregiver_id, development_data) \
         VALUES ($1, $2, $3, $4) \
         RETURNING id, name, primary_caregiver_id, development_data, version, sync_status",
    )
    .bind(&baby_id)
    .bind(name)
    .bind(&auth.user_id)
    .bind(&development_data)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO care_team_members (id, baby_id, user_id, role) \
         VALUES ($1, $2, $3, 'primary')",
    )
    .bind(&membership_id)
    .bind(&baby_id)
    .bind(&auth.user_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    tracing::info!(baby_id, "baby created");
    Ok(Json(Baby::from_row(&row)?))
}

pub async fn list_babies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> ApiResult<Json<Vec<Baby>>> {
    let auth = require_auth(&state, &headers).await?;
    let (skip, limit) = page_window(page.skip, page.limit);

    let rows = sqlx::query(
        "SELECT DISTINCT b.id, b.name, b.primary_caregiver_id, b.development_data, \
                b.version, b.sync_status \
         FROM babies b \
         LEFT JOIN care_team_members m ON m.baby_id = b.id \
         WHERE b.primary_caregiver_id = $1 OR m.user_id = $1 \
         ORDER BY b.name \
         OFFSET $2 LIMIT $3",
    )
    .bind(&auth.user_id)
    .bind(skip)
    .bind(limit)
    .fetch_all(&state.pool)
    .await?;

    rows.iter().map(Baby::from_row).collect::<ApiResult<Vec<_>>>().map(Json)
}

pub async fn get_baby(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(baby_id): Path<String>,
) -> ApiResult<Json<Baby>> {
    let auth = require_auth(&state, &headers).await?;
    ensure_baby_access(&state.pool, &baby_id, &auth.user_id).await?;

    let row = sqlx::query(
        "SELECT id, name, primary_caregiver_id, development_data, version, sync_status \
         FROM babies WHERE id = $1",
    )
    .bind(&baby_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| not_found("baby not found"))?;

    Ok(Json(Baby::from_row(&row)?))
}

pub async fn update_baby(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(baby_id): Path<String>,
    Json(payload): Json<BabyUpdateRequest>,
) -> ApiResult<Json<Baby>> {
    let auth = require_auth(&state, &headers).await?;
    ensure_primary_caregiver(&state.pool, &baby_id, &auth.user_id).await?;

    if payload.name.is_none() && payload.development_data.is_none() {
        return get_current(&state, &baby_id).await.map(Json);
    }
    if let Some(name) = &payload.name {
        if name.trim().is_empty() {
            return Err(ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_NAME",
                "name must not be empty",
            ));
        }
    }

    let mut query = QueryBuilder::<Postgres>::new("UPDATE babies SET version = version + 1");
    if let Some(name) = payload.name {
        query.push(", name = ");
        query.push_bind(name.trim().to_string());
    }
    if let Some(data) = payload.development_data {
        query.push(", development_data = ");
        query.push_bind(data);
    }
    query.push(" WHERE id = ");
    query.push_bind(baby_id.clone());
    if let Some(expected) = payload.expected_version {
        query.push(" AND version = ");
        query.push_bind(expected);
    }
    query.push(" RETURNING id, name, primary_caregiver_id, development_data, version, sync_status");

    let row = query.build().fetch_optional(&state.pool).await?;
    match row {
        Some(row) => Ok(Json(Baby::from_row(&row)?)),
        None if payload.expected_version.is_some() => Err(stale_version()),
        None => Err(not_found("baby not found")),
    }
}

/// Hard delete: the baby's activities and care-team rows go with it.
pub async fn delete_baby(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(baby_id): Path<String>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;
    ensure_primary_caregiver(&state.pool, &baby_id, &auth.user_id).await?;

    let mut tx = state.pool.begin().await?;
    sqlx::query("DELETE FROM activities WHERE baby_id = $1")
        .bind(&baby_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM care_team_members WHERE baby_id = $1")
        .bind(&baby_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM babies WHERE id = $1")
        .bind(&baby_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(baby_id, "baby deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn get_current(state: &AppState, baby_id: &str) -> ApiResult<Baby> {
    let row = sqlx::query(
        "SELECT id, name, primary_caregiver_id, development_data, version, sync_status \
         FROM babies WHERE id = $1",
    )
    .bind(baby_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| not_found("baby not found"))?;
    Baby::from_row(&row)
}
