use crate::{
    entities::store::{self, DeliveryDay},
    handlers::common::{page_and_limit, paginated, validate_input, ArchiveRequest},
    services::stores::{StoreChanges, StoreFilter, StoreInput},
    ApiCreated, ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StoreListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Only archived (true) or only current (false) stores
    pub archived: Option<bool>,
    pub day: Option<DeliveryDay>,
    /// Matches name, location or owner
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "550e8400-e29b-41d4-a716-446655440000",
    "name": "Aling Nena Sari-Sari",
    "location": "12 Rizal St, Quezon City",
    "lat": 14.676,
    "lng": 121.0437,
    "owner_name": "Nena Santos",
    "email": "nena@example.com",
    "number": "0917-555-0101",
    "day": "Monday",
    "is_archived": false,
    "archived_at": null,
    "created_at": "2024-12-09T10:30:00Z",
    "updated_at": "2024-12-09T10:30:00Z"
}))]
pub struct StoreSummary {
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub owner_name: String,
    pub email: Option<String>,
    /// Contact number
    pub number: String,
    /// Delivery weekday
    pub day: DeliveryDay,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<store::Model> for StoreSummary {
    fn from(model: store::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            location: model.location,
            lat: model.lat,
            lng: model.lng,
            owner_name: model.owner_name,
            email: model.email,
            number: model.number,
            day: model.day,
            is_archived: model.is_archived,
            archived_at: model.archived_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateStoreRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1))]
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[validate(length(min = 1, max = 255))]
    pub owner_name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub number: String,
    pub day: DeliveryDay,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStoreRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub location: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    #[validate(length(min = 1, max = 255))]
    pub owner_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub number: Option<String>,
    pub day: Option<DeliveryDay>,
    pub is_archived: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/v1/stores",
    params(StoreListQuery),
    responses(
        (status = 200, description = "Stores listed", body = ApiResponse<PaginatedResponse<StoreSummary>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "stores"
)]
pub async fn list_stores(
    State(state): State<AppState>,
    Query(query): Query<StoreListQuery>,
) -> ApiResult<PaginatedResponse<StoreSummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let filter = StoreFilter {
        archived: query.archived,
        day: query.day,
        search: query.search,
    };

    let (stores, total) = state.store_service().list_stores(filter, page, limit).await?;
    let items = stores.into_iter().map(StoreSummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/stores/:id",
    params(("id" = Uuid, Path, description = "Store ID")),
    responses(
        (status = 200, description = "Store fetched", body = ApiResponse<StoreSummary>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stores"
)]
pub async fn get_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StoreSummary> {
    let store = state.store_service().get_store(id).await?;
    Ok(Json(ApiResponse::success(store.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores",
    request_body = CreateStoreRequest,
    responses(
        (status = 201, description = "Store created", body = ApiResponse<StoreSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "stores"
)]
pub async fn create_store(
    State(state): State<AppState>,
    Json(payload): Json<CreateStoreRequest>,
) -> ApiCreated<StoreSummary> {
    validate_input(&payload)?;

    let store = state
        .store_service()
        .create_store(StoreInput {
            name: payload.name,
            location: payload.location,
            lat: payload.lat,
            lng: payload.lng,
            owner_name: payload.owner_name,
            email: payload.email,
            number: payload.number,
            day: payload.day,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(store.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/stores/:id",
    request_body = UpdateStoreRequest,
    params(("id" = Uuid, Path, description = "Store ID")),
    responses(
        (status = 200, description = "Store updated", body = ApiResponse<StoreSummary>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stores"
)]
pub async fn update_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStoreRequest>,
) -> ApiResult<StoreSummary> {
    validate_input(&payload)?;

    let store = state
        .store_service()
        .update_store(
            id,
            StoreChanges {
                name: payload.name,
                location: payload.location,
                lat: payload.lat,
                lng: payload.lng,
                owner_name: payload.owner_name,
                email: payload.email,
                number: payload.number,
                day: payload.day,
                is_archived: payload.is_archived,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(store.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/stores/:id/archive",
    request_body = ArchiveRequest,
    params(("id" = Uuid, Path, description = "Store ID")),
    responses(
        (status = 200, description = "Archive flag set", body = ApiResponse<StoreSummary>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stores"
)]
pub async fn archive_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<ArchiveRequest>>,
) -> ApiResult<StoreSummary> {
    let archive = body.map(|Json(b)| b).unwrap_or_default().archive;
    let store = state.store_service().set_archived(id, archive).await?;
    Ok(Json(ApiResponse::success(store.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/stores/:id",
    params(("id" = Uuid, Path, description = "Store ID")),
    responses(
        (status = 200, description = "Store deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Store not found", body = crate::errors::ErrorResponse)
    ),
    tag = "stores"
)]
pub async fn delete_store(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.store_service().delete_store(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}
