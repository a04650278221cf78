use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::access::ensure_baby_access;
use crate::auth::require_auth;
use crate::models::{Activity, ActivityType};
use crate::{not_found, page_window, stale_version, ApiResult, AppState};

const ACTIVITY_COLUMNS: &str = "id, baby_id, activity_type, start_time, end_time, metadata, \
     created_by, version, sync_status, sync_attempts, last_sync_attempt";

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ActivityCreateRequest {
    pub activity_type: ActivityType,
    pub start_time: DateTime<Utc>,
    /// Absent for an activity that is still open (an ongoing nap).
    pub end_time: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct ActivityUpdateRequest {
    pub activity_type: Option<ActivityType>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub metadata: Option<Value>,
    pub expected_version: Option<i32>,
}

#[derive(Deserialize)]
pub struct ActivityListQuery {
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    /// Inclusive lower bound on start_time.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on start_time.
    pub until: Option<DateTime<Utc>>,
}

pub async fn create_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(baby_id): Path<String>,
    Json(payload): Json<ActivityCreateRequest>,
) -> ApiResult<Json<Activity>> {
    let auth = require_auth(&state, &headers).await?;
    ensure_baby_access(&state.pool, &baby_id, &auth.user_id).await?;

    let activity_id = Uuid::new_v4().to_string();
    let metadata = payload.metadata.unwrap_or_else(|| json!({}));

    let row = sqlx::query(
        "INSERT INTO activities (id, baby_id, activity_type, start_time, end_time, metadata, created_by) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id, baby_id, activity_type, start_time, end_time, metadata, \
                   created_by, version, sync_status, sync_attempts, last_sync_attempt",
    )
    .bind(&activity_id)
    .bind(&baby_id)
    .bind(payload.activity_type.as_str())
    .bind(payload.start_time)
    .bind(payload.end_time)
    .bind(&metadata)
    .bind(&auth.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(Activity::from_row(&row)?))
}

pub async fn list_activities(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(baby_id): Path<String>,
    Query(query): Query<ActivityListQuery>,
) -> ApiResult<Json<Vec<Activity>>> {
    let auth = require_auth(&state, &headers).await?;
    ensure_baby_access(&state.pool, &baby_id, &auth.user_id).await?;
    let (skip, limit) = page_window(query.skip, query.limit);

    let mut builder = QueryBuilder::<Postgres>::new(format!(
        "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE baby_id = "
    ));
    builder.push_bind(baby_id);
    if let Some(from) = query.from {
        builder.push(" AND start_time >= ");
        builder.push_bind(from);
    }
    if let Some(until) = query.until {
        builder.push(" AND start_time < ");
        builder.push_bind(until);
    }
    builder.push(" ORDER BY start_time DESC OFFSET ");
    builder.push_bind(skip);
    builder.push(" LIMIT ");
    builder.push_bind(limit);

    let rows = builder.build().fetch_all(&state.pool).await?;
    rows.iter()
        .map(Activity::from_row)
        .collect::<ApiResult<Vec<_>>>()
        .map(Json)
}

pub async fn get_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(activity_id): Path<String>,
) -> ApiResult<Json<Activity>> {
    let auth = require_auth(&state, &headers).await?;

    let row = fetch_activity_row(&state, &activity_id).await?;
    let activity = Activity::from_row(&row)?;
    ensure_baby_access(&state.pool, &activity.baby_id, &auth.user_id).await?;
    Ok(Json(activity))
}

pub async fn update_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(activity_id): Path<String>,
    Json(payload): Json<ActivityUpdateRequest>,
) -> ApiResult<Json<Activity>> {
    let auth = require_auth(&state, &headers).await?;

    let baby_id: String = sqlx::query("SELECT baby_id FROM activities WHERE id = $1")
        .bind(&activity_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| not_found("activity not found"))?
        .try_get("baby_id")?;
    ensure_baby_access(&state.pool, &baby_id, &auth.user_id).await?;

    let no_fields = payload.activity_type.is_none()
        && payload.start_time.is_none()
        && payload.end_time.is_none()
        && payload.metadata.is_none();
    if no_fields {
        let row = fetch_activity_row(&state, &activity_id).await?;
        return Ok(Json(Activity::from_row(&row)?));
    }

    let mut builder =
        QueryBuilder::<Postgres>::new("UPDATE activities SET version = version + 1");
    if let Some(kind) = payload.activity_type {
        builder.push(", activity_type = ");
        builder.push_bind(kind.as_str());
    }
    if let Some(start_time) = payload.start_time {
        builder.push(", start_time = ");
        builder.push_bind(start_time);
    }
    if let Some(end_time) = payload.end_time {
        builder.push(", end_time = ");
        builder.push_bind(end_time);
    }
    if let Some(metadata) = payload.metadata {
        builder.push(", metadata = ");
        builder.push_bind(metadata);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(activity_id.clone());
    if let Some(expected) = payload.expected_version {
        builder.push(" AND version = ");
        builder.push_bind(expected);
    }
    builder.push(format!(" RETURNING {ACTIVITY_COLUMNS}"));

    let row = builder.build().fetch_optional(&state.pool).await?;
    match row {
        Some(row) => Ok(Json(Activity::from_row(&row)?)),
        None if payload.expected_version.is_some() => Err(stale_version()),
        None => Err(not_found("activity not found")),
    }
}

pub async fn delete_activity(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(activity_id): Path<String>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;

    let baby_id: String = sqlx::query("SELECT baby_id FROM activities WHERE id = $1")
        .bind(&activity_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| not_found("activity not found"))?
        .try_get("baby_id")?;
    ensure_baby_access(&state.pool, &baby_id, &auth.user_id).await?;

    sqlx::query("DELETE FROM activities WHERE id = $1")
        .bind(&activity_id)
        .execute(&state.pool)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_activity_row(
    state: &AppState,
    activity_id: &str,
) -> ApiResult<sqlx::postgres::PgRow> {
    sqlx::query(
        "SELECT id, baby_id, activity_type, start_time, end_time, metadata, \
                created_by, version, sync_status, sync_attempts, last_sync_attempt \
         FROM activities WHERE id = $1",
    )
    .bind(activity_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| not_found("activity not found"))
}
