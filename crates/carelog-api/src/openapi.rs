#![allow(dead_code)]

use axum::http::HeaderMap;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::ServerBuilder;
use utoipa::{Modify, OpenApi};

use crate::activities::{ActivityCreateRequest, ActivityUpdateRequest};
use crate::auth::{
    LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse, TokenResponse,
};
use crate::babies::{BabyCreateRequest, BabyUpdateRequest};
use crate::care_team::{MemberAddRequest, MemberUpdateRequest};
use crate::models::{Account, Activity, ActivityType, Baby, CareTeamMember, CareTeamRole, SyncStatus};
use crate::users::AccountUpdateRequest;
use crate::{ErrorResponse, HealthStatus};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_doc,
        metrics_doc,
        openapi_doc,
        login_doc,
        login_access_token_doc,
        register_doc,
        refresh_token_doc,
        me_doc,
        update_me_doc,
        create_baby_doc,
        list_babies_doc,
        get_baby_doc,
        update_baby_doc,
        delete_baby_doc,
        create_activity_doc,
        list_activities_doc,
        get_activity_doc,
        update_activity_doc,
        delete_activity_doc,
        list_members_doc,
        add_member_doc,
        update_member_doc,
        remove_member_doc
    ),
    components(schemas(
        HealthStatus,
        ErrorResponse,
        TokenResponse,
        LoginRequest,
        RegisterRequest,
        RegisterResponse,
        RefreshRequest,
        Account,
        AccountUpdateRequest,
        Baby,
        BabyCreateRequest,
        BabyUpdateRequest,
        Activity,
        ActivityCreateRequest,
        ActivityUpdateRequest,
        CareTeamMember,
        MemberAddRequest,
        MemberUpdateRequest,
        SyncStatus,
        ActivityType,
        CareTeamRole
    )),
    modifiers(&SecurityAddon),
    security(("bearerAuth" = [])),
    tags(
        (name = "carelog-api", description = "Shared infant care tracking API")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearerAuth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn document(server_url: Option<&str>) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    if let Some(url) = server_url {
        doc.servers = Some(vec![ServerBuilder::new().url(url).build()]);
    }
    doc
}

pub fn infer_server_url(headers: &HeaderMap) -> Option<String> {
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get("host"))
        .and_then(|value| value.to_str().ok())?;
    let proto = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");
    Some(format!("{proto}://{host}"))
}

#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, body = HealthStatus), (status = 503, body = HealthStatus))
)]
fn health_doc() {}

#[utoipa::path(
    get,
    path = "/metrics",
    responses((status = 200, content_type = "text/plain", body = String))
)]
fn metrics_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/openapi.json",
    responses((status = 200, body = serde_json::Value))
)]
fn openapi_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body(content = serde_json::Value, content_type = "application/x-www-form-urlencoded"),
    responses((status = 200, body = TokenResponse), (status = 401, body = ErrorResponse))
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login/access-token",
    request_body = LoginRequest,
    responses((status = 200, body = TokenResponse), (status = 401, body = ErrorResponse))
)]
fn login_access_token_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, body = RegisterResponse),
        (status = 400, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn register_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh-token",
    request_body = RefreshRequest,
    responses((status = 200, body = TokenResponse), (status = 401, body = ErrorResponse))
)]
fn refresh_token_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    responses((status = 200, body = Account), (status = 401, body = ErrorResponse))
)]
fn me_doc() {}

#[utoipa::path(
    patch,
    path = "/api/v1/users/me",
    request_body = AccountUpdateRequest,
    responses((status = 200, body = Account), (status = 409, body = ErrorResponse))
)]
fn update_me_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/babies",
    request_body = BabyCreateRequest,
    responses((status = 200, body = Baby), (status = 400, body = ErrorResponse))
)]
fn create_baby_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/babies",
    params(
        ("skip" = Option<i64>, Query, description = "Offset into the result set"),
        ("limit" = Option<i64>, Query, description = "Page size, capped at 100")
    ),
    responses((status = 200, body = [Baby]))
)]
fn list_babies_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/babies/{baby_id}",
    params(("baby_id" = String, Path, description = "Baby id")),
    responses((status = 200, body = Baby), (status = 404, body = ErrorResponse))
)]
fn get_baby_doc() {}

#[utoipa::path(
    patch,
    path = "/api/v1/babies/{baby_id}",
    params(("baby_id" = String, Path, description = "Baby id")),
    request_body = BabyUpdateRequest,
    responses((status = 200, body = Baby), (status = 409, body = ErrorResponse))
)]
fn update_baby_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/babies/{baby_id}",
    params(("baby_id" = String, Path, description = "Baby id")),
    responses((status = 204, description = "Deleted"), (status = 403, body = ErrorResponse))
)]
fn delete_baby_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/babies/{baby_id}/activities",
    params(("baby_id" = String, Path, description = "Baby id")),
    request_body = ActivityCreateRequest,
    responses((status = 200, body = Activity), (status = 404, body = ErrorResponse))
)]
fn create_activity_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/babies/{baby_id}/activities",
    params(
        ("baby_id" = String, Path, description = "Baby id"),
        ("skip" = Option<i64>, Query, description = "Offset into the result set"),
        ("limit" = Option<i64>, Query, description = "Page size, capped at 100"),
        ("from" = Option<String>, Query, description = "Inclusive start_time lower bound (RFC 3339)"),
        ("until" = Option<String>, Query, description = "Exclusive start_time upper bound (RFC 3339)")
    ),
    responses((status = 200, body = [Activity]))
)]
fn list_activities_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/activities/{activity_id}",
    params(("activity_id" = String, Path, description = "Activity id")),
    responses((status = 200, body = Activity), (status = 404, body = ErrorResponse))
)]
fn get_activity_doc() {}

#[utoipa::path(
    patch,
    path = "/api/v1/activities/{activity_id}",
    params(("activity_id" = String, Path, description = "Activity id")),
    request_body = ActivityUpdateRequest,
    responses((status = 200, body = Activity), (status = 409, body = ErrorResponse))
)]
fn update_activity_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/activities/{activity_id}",
    params(("activity_id" = String, Path, description = "Activity id")),
    responses((status = 204, description = "Deleted"), (status = 404, body = ErrorResponse))
)]
fn delete_activity_doc() {}

#[utoipa::path(
    get,
    path = "/api/v1/babies/{baby_id}/care-team",
    params(("baby_id" = String, Path, description = "Baby id")),
    responses((status = 200, body = [CareTeamMember]))
)]
fn list_members_doc() {}

#[utoipa::path(
    post,
    path = "/api/v1/babies/{baby_id}/care-team",
    params(("baby_id" = String, Path, description = "Baby id")),
    request_body = MemberAddRequest,
    responses(
        (status = 200, body = CareTeamMember),
        (status = 404, body = ErrorResponse),
        (status = 409, body = ErrorResponse)
    )
)]
fn add_member_doc() {}

#[utoipa::path(
    patch,
    path = "/api/v1/care-team/{member_id}",
    params(("member_id" = String, Path, description = "Membership id")),
    request_body = MemberUpdateRequest,
    responses((status = 200, body = CareTeamMember), (status = 409, body = ErrorResponse))
)]
fn update_member_doc() {}

#[utoipa::path(
    delete,
    path = "/api/v1/care-team/{member_id}",
    params(("member_id" = String, Path, description = "Membership id")),
    responses((status = 204, description = "Deleted"), (status = 400, body = ErrorResponse))
)]
fn remove_member_doc() {}
