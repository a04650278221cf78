use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::access::{ensure_baby_access, ensure_primary_caregiver, primary_caregiver_of};
use crate::auth::require_auth;
use crate::models::{CareTeamMember, CareTeamRole};
use crate::{not_found, stale_version, ApiError, ApiResult, AppState};

const MEMBER_COLUMNS: &str = "id, baby_id, user_id, role, permissions, version, sync_status, \
     sync_attempts, last_sync_attempt";

#[derive(Deserialize, utoipa::ToSchema)]
pub struct MemberAddRequest {
    /// The invitee is looked up by account email.
    pub email: String,
    pub role: CareTeamRole,
    pub permissions: Option<Value>,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct MemberUpdateRequest {
    pub role: Option<CareTeamRole>,
    pub permissions: Option<Value>,
    pub expected_version: Option<i32>,
}

pub async fn list_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(baby_id): Path<String>,
) -> ApiResult<Json<Vec<CareTeamMember>>> {
    let auth = require_auth(&state, &headers).await?;
    ensure_baby_access(&state.pool, &baby_id, &auth.user_id).await?;

    let rows = sqlx::query(
        "SELECT id, baby_id, user_id, role, permissions, version, sync_status, \
                sync_attempts, last_sync_attempt \
         FROM care_team_members WHERE baby_id = $1 ORDER BY role, user_id",
    )
    .bind(&baby_id)
    .fetch_all(&state.pool)
    .await?;

    rows.iter()
        .map(CareTeamMember::from_row)
        .collect::<ApiResult<Vec<_>>>()
        .map(Json)
}

pub async fn add_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(baby_id): Path<String>,
    Json(payload): Json<MemberAddRequest>,
) -> ApiResult<Json<CareTeamMember>> {
    let auth = require_auth(&state, &headers).await?;
    ensure_primary_caregiver(&state.pool, &baby_id, &auth.user_id).await?;

    let invitee_id = sqlx::query_scalar::<_, String>("SELECT id FROM users WHERE email = $1")
        .bind(payload.email.trim())
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| not_found("no account with that email"))?;

    let member_id = Uuid::new_v4().to_string();
    let permissions = payload.permissions.unwrap_or_else(|| json!({}));

    let row = sqlx::query(
        "INSERT INTO care_team_members (id, baby_id, user_id, role, permissions) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING id, baby_id, user_id, role, permissions, version, sync_status, \
                   sync_attempts, last_sync_attempt",
    )
    .bind(&member_id)
    .bind(&baby_id)
    .bind(&invitee_id)
    .bind(payload.role.as_str())
    .bind(&permissions)
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
                "MEMBER_EXISTS",
                "account is already on this care team",
            )
        } else {
            ApiError::from(err)
        }
    })?;

    tracing::info!(baby_id, member_id, "care team member added");
    Ok(Json(CareTeamMember::from_row(&row)?))
}

pub async fn update_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
    Json(payload): Json<MemberUpdateRequest>,
) -> ApiResult<Json<CareTeamMember>> {
    let auth = require_auth(&state, &headers).await?;

    let baby_id = member_baby_id(&state, &member_id).await?;
    ensure_primary_caregiver(&state.pool, &baby_id, &auth.user_id).await?;

    if payload.role.is_none() && payload.permissions.is_none() {
        let row = fetch_member_row(&state, &member_id).await?;
        return Ok(Json(CareTeamMember::from_row(&row)?));
    }

    let mut builder =
        QueryBuilder::<Postgres>::new("UPDATE care_team_members SET version = version + 1");
    if let Some(role) = payload.role {
        builder.push(", role = ");
        builder.push_bind(role.as_str());
    }
    if let Some(permissions) = payload.permissions {
        builder.push(", permissions = ");
        builder.push_bind(permissions);
    }
    builder.push(" WHERE id = ");
    builder.push_bind(member_id.clone());
    if let Some(expected) = payload.expected_version {
        builder.push(" AND version = ");
        builder.push_bind(expected);
    }
    builder.push(format!(" RETURNING {MEMBER_COLUMNS}"));

    let row = builder.build().fetch_optional(&state.pool).await?;
    match row {
        Some(row) => Ok(Json(CareTeamMember::from_row(&row)?)),
        None if payload.expected_version.is_some() => Err(stale_version()),
        None => Err(not_found("care team member not found")),
    }
}

pub async fn remove_member(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(member_id): Path<String>,
) -> ApiResult<StatusCode> {
    let auth = require_auth(&state, &headers).await?;

    let row = fetch_member_row(&state, &member_id).await?;
    let member = CareTeamMember::from_row(&row)?;
    ensure_primary_caregiver(&state.pool, &member.baby_id, &auth.user_id).await?;

    let primary = primary_caregiver_of(&state.pool, &member.baby_id).await?;
    if member.user_id == primary {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "CANNOT_REMOVE_PRIMARY",
            "the primary caregiver's membership cannot be removed",
        ));
    }

    sqlx::query("DELETE FROM care_team_members WHERE id = $1")
        .bind(&member_id)
        .execute(&state.pool)
        .await?;
    tracing::info!(member_id, "care team member removed");
    Ok(StatusCode::NO_CONTENT)
}

async fn member_baby_id(state: &AppState, member_id: &str) -> ApiResult<String> {
    let baby_id: String = sqlx::query("SELECT baby_id FROM care_team_members WHERE id = $1")
        .bind(member_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| not_found("care team member not found"))?
        .try_get("baby_id")?;
    Ok(baby_id)
}

async fn fetch_member_row(state: &AppState, member_id: &str) -> ApiResult<sqlx::postgres::PgRow> {
    sqlx::query(
        "SELECT id, baby_id, user_id, role, permissions, version, sync_status, \
                sync_attempts, last_sync_attempt \
         FROM care_team_members WHERE id = $1",
    )
    .bind(member_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| not_found("care team member not found"))
}
