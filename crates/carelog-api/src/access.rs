use sqlx::{Pool, Postgres};

use crate::{forbidden, not_found, ApiResult};

/// A caller can see a baby's data when they are the primary caregiver or
/// hold any care-team membership for it.
pub(crate) async fn ensure_baby_access(
    pool: &Pool<Postgres>,
    baby_id: &str,
    user_id: &str,
) -> ApiResult<()> {
    let primary = primary_caregiver_of(pool, baby_id).await?;
    if primary == user_id {
        return Ok(());
    }

    let is_member = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM care_team_members WHERE baby_id = $1 AND user_id = $2)",
    )
    .bind(baby_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if is_member {
        Ok(())
    } else {
        Err(forbidden("not a member of this baby's care team"))
    }
}

/// Mutations of the baby itself and of its care team require the `primary`
/// role (the designated primary caregiver always qualifies).
pub(crate) async fn ensure_primary_caregiver(
    pool: &Pool<Postgres>,
    baby_id: &str,
    user_id: &str,
) -> ApiResult<()> {
    let primary = primary_caregiver_of(pool, baby_id).await?;
    if primary == user_id {
        return Ok(());
    }

    let is_primary_member = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM care_team_members \
         WHERE baby_id = $1 AND user_id = $2 AND role = 'primary')",
    )
    .bind(baby_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if is_primary_member {
        Ok(())
    } else {
        Err(forbidden("requires the primary caregiver role"))
    }
}

pub(crate) async fn primary_caregiver_of(
    pool: &Pool<Postgres>,
    baby_id: &str,
) -> ApiResult<String> {
    sqlx::query_scalar::<_, String>("SELECT primary_caregiver_id FROM babies WHERE id = $1")
        .bind(baby_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| not_found("baby not found"))
}
