use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::Row;
use utoipa::ToSchema;

use crate::{ApiError, ApiResult};

/// Reconciliation state of a mutable record against an authoritative copy.
/// Persisted as TEXT; the reconciliation pass that would consume it is not
/// built yet, so the API only defaults and surfaces the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Synced,
    Conflict,
    Failed,
}

impl SyncStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Conflict => "conflict",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(SyncStatus::Pending),
            "synced" => Some(SyncStatus::Synced),
            "conflict" => Some(SyncStatus::Conflict),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Sleep,
    Feed,
    Diaper,
    Other,
}

impl ActivityType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityType::Sleep => "sleep",
            ActivityType::Feed => "feed",
            ActivityType::Diaper => "diaper",
            ActivityType::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sleep" => Some(ActivityType::Sleep),
            "feed" => Some(ActivityType::Feed),
            "diaper" => Some(ActivityType::Diaper),
            "other" => Some(ActivityType::Other),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CareTeamRole {
    Primary,
    Coparent,
}

impl CareTeamRole {
    pub fn as_str(self) -> &'static str {
        match self {
            CareTeamRole::Primary => "primary",
            CareTeamRole::Coparent => "coparent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "primary" => Some(CareTeamRole::Primary),
            "coparent" => Some(CareTeamRole::Coparent),
            _ => None,
        }
    }
}

fn bad_column(column: &str, raw: &str) -> ApiError {
    ApiError::new(
        StatusCode::INTERNAL_SERVER_ERROR,
        "DB_ERROR",
        format!("invalid {column} value: {raw}"),
    )
}

/// A caregiver account. The password hash never leaves the store layer.
#[derive(Debug, Serialize, ToSchema)]
pub struct Account {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub preferences: Value,
    pub version: i32,
    pub last_sync: Option<DateTime<Utc>>,
}

impl Account {
    pub(crate) fn from_row(row: &PgRow) -> ApiResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            full_name: row.try_get("full_name")?,
            is_active: row.try_get("is_active")?,
            preferences: row.try_get("preferences")?,
            version: row.try_get("version")?,
            last_sync: row.try_get("last_sync")?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Baby {
    pub id: String,
    pub name: String,
    pub primary_caregiver_id: String,
    pub development_data: Value,
    pub version: i32,
    pub sync_status: SyncStatus,
}

impl Baby {
    pub(crate) fn from_row(row: &PgRow) -> ApiResult<Self> {
        let raw_status: String = row.try_get("sync_status")?;
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            primary_caregiver_id: row.try_get("primary_caregiver_id")?,
            development_data: row.try_get("development_data")?,
            version: row.try_get("version")?,
            sync_status: SyncStatus::parse(&raw_status)
                .ok_or_else(|| bad_column("sync_status", &raw_status))?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Activity {
    pub id: String,
    pub baby_id: String,
    pub activity_type: ActivityType,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub metadata: Value,
    pub created_by: String,
    pub version: i32,
    pub sync_status: SyncStatus,
    pub sync_attempts: i32,
    pub last_sync_attempt: Option<DateTime<Utc>>,
}

impl Activity {
    pub(crate) fn from_row(row: &PgRow) -> ApiResult<Self> {
        let raw_type: String = row.try_get("activity_type")?;
        let raw_status: String = row.try_get("sync_status")?;
        Ok(Self {
            id: row.try_get("id")?,
            baby_id: row.try_get("baby_id")?,
            activity_type: ActivityType::parse(&raw_type)
                .ok_or_else(|| bad_column("activity_type", &raw_type))?,
            start_time: row.try_get("start_time")?,
            end_time: row.try_get("end_time")?,
            metadata: row.try_get("metadata")?,
            created_by: row.try_get("created_by")?,
            version: row.try_get("version")?,
            sync_status: SyncStatus::parse(&raw_status)
                .ok_or_else(|| bad_column("sync_status", &raw_status))?,
            sync_attempts: row.try_get("sync_attempts")?,
            last_sync_attempt: row.try_get("last_sync_attempt")?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CareTeamMember {
    pub id: String,
    pub baby_id: String,
    pub user_id: String,
    pub role: CareTeamRole,
    pub permissions: Value,
    pub version: i32,
    pub sync_status: SyncStatus,
    pub sync_attempts: i32,
    pub last_sync_attempt: Option<DateTime<Utc>>,
}

impl CareTeamMember {
    pub(crate) fn from_row(row: &PgRow) -> ApiResult<Self> {
        let raw_role: String = row.try_get("role")?;
        let raw_status: String = row.try_get("sync_status")?;
        Ok(Self {
            id: row.try_get("id")?,
            baby_id: row.try_get("baby_id")?,
            user_id: row.try_get("user_id")?,
            role: CareTeamRole::parse(&raw_role).ok_or_else(|| bad_column("role", &raw_role))?,
            permissions: row.try_get("permissions")?,
            version: row.try_get("version")?,
            sync_status: SyncStatus::parse(&raw_status)
                .ok_or_else(|| bad_column("sync_status", &raw_status))?,
            sync_attempts: row.try_get("sync_attempts")?,
            last_sync_attempt: row.try_get("last_sync_attempt")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_round_trips_through_strings() {
        for status in [
            SyncStatus::Pending,
            SyncStatus::Synced,
            SyncStatus::Conflict,
            SyncStatus::Failed,
        ] {
            assert_eq!(SyncStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SyncStatus::parse("unknown"), None);
    }

    #[test]
    fn activity_type_round_trips_through_strings() {
        for kind in [
            ActivityType::Sleep,
            ActivityType::Feed,
            ActivityType::Diaper,
            ActivityType::Other,
        ] {
            assert_eq!(ActivityType::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ActivityType::parse("bath"), None);
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(
            serde_json::to_string(&ActivityType::Diaper).unwrap(),
            "\"diaper\""
        );
        assert_eq!(
            serde_json::to_string(&CareTeamRole::Coparent).unwrap(),
            "\"coparent\""
        );
        let parsed: SyncStatus = serde_json::from_str("\"conflict\"").unwrap();
        assert_eq!(parsed, SyncStatus::Conflict);
    }
}
