use crate::{
    auth::AuthUser,
    entities::{
        user::{self, UserRole, UserStatus},
        user_profile,
    },
    handlers::common::{caller_id, page_and_limit, paginated, validate_input, ArchiveRequest},
    services::users::{Actor, NewUser, ProfileChanges, UserChanges, UserFilter, UserRecord},
    ApiCreated, ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

fn actor(user: &AuthUser) -> Result<Actor, crate::errors::ServiceError> {
    Ok(Actor {
        id: caller_id(user)?,
        is_admin: user.is_admin(),
    })
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<UserStatus>,
    pub role: Option<UserRole>,
    /// Matches username, first or last name and email
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileSummary {
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl From<user_profile::Model> for ProfileSummary {
    fn from(p: user_profile::Model) -> Self {
        Self {
            avatar: p.avatar,
            bio: p.bio,
            address: p.address,
            birth_date: p.birth_date,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
    "username": "jdelacruz",
    "email": "juan@ktodrinks.ph",
    "first_name": "Juan",
    "last_name": "Dela Cruz",
    "phone_number": "0917-555-0123",
    "role": "delivery_driver",
    "status": "active",
    "is_active": true,
    "date_joined": "2024-12-09T10:30:00Z",
    "profile": {"avatar": null, "bio": null, "address": null, "birth_date": null}
}))]
pub struct UserSummary {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileSummary>,
}

impl From<user::Model> for UserSummary {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            phone_number: u.phone_number,
            role: u.role,
            status: u.status,
            is_active: u.is_active,
            date_joined: u.date_joined,
            profile: None,
        }
    }
}

impl From<UserRecord> for UserSummary {
    fn from((user, profile): UserRecord) -> Self {
        Self {
            profile: profile.map(ProfileSummary::from),
            ..Self::from(user)
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "username": "jdelacruz",
    "email": "juan@ktodrinks.ph",
    "password": "changeme-please",
    "first_name": "Juan",
    "last_name": "Dela Cruz",
    "role": "delivery_driver"
}))]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub first_name: String,
    #[validate(length(max = 150))]
    #[serde(default)]
    pub last_name: String,
    pub role: UserRole,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    /// Admin only
    pub role: Option<UserRole>,
    /// Admin only
    pub status: Option<UserStatus>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 255))]
    pub avatar: Option<String>,
    pub bio: Option<String>,
    pub address: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1))]
    pub old_password: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub new_password: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(UserListQuery),
    responses(
        (status = 200, description = "Users listed", body = ApiResponse<PaginatedResponse<UserSummary>>)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserListQuery>,
) -> ApiResult<PaginatedResponse<UserSummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let filter = UserFilter {
        status: query.status,
        role: query.role,
        search: query.search,
    };
    let (users, total) = state.user_service().list_users(filter, page, limit).await?;
    let items = users.into_iter().map(UserSummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created with an empty profile", body = ApiResponse<UserSummary>),
        (status = 403, description = "Caller is not an administrator", body = crate::errors::ErrorResponse),
        (status = 409, description = "Username taken", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateUserRequest>,
) -> ApiCreated<UserSummary> {
    validate_input(&payload)?;
    let record = state
        .user_service()
        .create_user(
            NewUser {
                username: payload.username,
                email: payload.email,
                password: payload.password,
                first_name: payload.first_name,
                last_name: payload.last_name,
                role: payload.role,
                phone_number: payload.phone_number,
            },
            Some(caller_id(&user)?),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/:id",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User fetched", body = ApiResponse<UserSummary>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<UserSummary> {
    let record = state.user_service().get_user(id).await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/:id",
    request_body = UpdateUserRequest,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User updated", body = ApiResponse<UserSummary>),
        (status = 403, description = "Not the caller's account, or a role/status change by a non-admin", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRequest>,
) -> ApiResult<UserSummary> {
    validate_input(&payload)?;
    let changes = UserChanges {
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        phone_number: payload.phone_number,
        role: payload.role,
        status: payload.status,
    };
    let record = state
        .user_service()
        .update_user(id, changes, actor(&user)?)
        .await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/users/:id",
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "User archived", body = ApiResponse<serde_json::Value>),
        (status = 403, description = "Not the caller's account", body = crate::errors::ErrorResponse),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.user_service().delete_user(id, actor(&user)?).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/:id/archive",
    request_body = ArchiveRequest,
    params(("id" = Uuid, Path, description = "User ID")),
    responses(
        (status = 200, description = "Archive state set", body = ApiResponse<UserSummary>),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn archive_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ArchiveRequest>>,
) -> ApiResult<UserSummary> {
    let archive = body.map(|Json(b)| b).unwrap_or_default().archive;
    let record = state.user_service().set_archived(id, archive).await?;
    let message = if archive { "User archived" } else { "User restored" };
    Ok(Json(ApiResponse::success(record.into()).with_message(message)))
}

#[utoipa::path(
    get,
    path = "/api/v1/users/profile",
    responses(
        (status = 200, description = "Current user with profile", body = ApiResponse<UserSummary>)
    ),
    tag = "users"
)]
pub async fn get_profile(State(state): State<AppState>, user: AuthUser) -> ApiResult<UserSummary> {
    let (account, profile) = state.user_service().profile(caller_id(&user)?).await?;
    Ok(Json(ApiResponse::success((account, Some(profile)).into())))
}

#[utoipa::path(
    put,
    path = "/api/v1/users/profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserSummary>)
    ),
    tag = "users"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> ApiResult<UserSummary> {
    validate_input(&payload)?;
    let changes = ProfileChanges {
        avatar: payload.avatar,
        bio: payload.bio,
        address: payload.address,
        birth_date: payload.birth_date,
    };
    let (account, profile) = state
        .user_service()
        .update_profile(caller_id(&user)?, changes)
        .await?;
    Ok(Json(ApiResponse::success((account, Some(profile)).into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/users/change-password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = ApiResponse<serde_json::Value>),
        (status = 400, description = "Old password incorrect or new password too short", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn change_password(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<ChangePasswordRequest>,
) -> ApiResult<serde_json::Value> {
    validate_input(&payload)?;
    state
        .user_service()
        .change_password(caller_id(&user)?, &payload.old_password, &payload.new_password)
        .await?;
    Ok(Json(ApiResponse::success(
        json!({ "message": "Password changed successfully" }),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_new_password_fails_validation() {
        let request = ChangePasswordRequest {
            old_password: "old-secret".into(),
            new_password: "short".into(),
        };
        assert!(validate_input(&request).is_err());
    }

    #[test]
    fn create_request_requires_valid_email() {
        let request: CreateUserRequest = serde_json::from_value(json!({
            "username": "driver1",
            "email": "not-an-email",
            "password": "long-enough-password",
            "role": "delivery_driver"
        }))
        .unwrap();
        assert!(validate_input(&request).is_err());
    }
}
