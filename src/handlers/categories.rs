use crate::{
    entities::category,
    handlers::common::{page_and_limit, paginated, validate_input},
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
pub struct CategoryListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "6f1c2a52-8f0b-4e55-9d55-3a7a0e2a9f01",
    "name": "Softdrinks",
    "description": "Carbonated beverages",
    "created_at": "2024-12-09T10:30:00Z",
    "updated_at": "2024-12-09T10:30:00Z"
}))]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<category::Model> for CategorySummary {
    fn from(model: category::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            description: model.description,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    #[schema(example = "Softdrinks")]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateCategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    params(CategoryListQuery),
    responses(
        (status = 200, description = "Categories listed", body = ApiResponse<PaginatedResponse<CategorySummary>>)
    ),
    tag = "categories"
)]
pub async fn list_categories(
    State(state): State<AppState>,
    Query(query): Query<CategoryListQuery>,
) -> ApiResult<PaginatedResponse<CategorySummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let (categories, total) = state
        .category_service()
        .list_categories(query.search, page, limit)
        .await?;
    let items = categories.into_iter().map(CategorySummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories/:id",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category fetched", body = ApiResponse<CategorySummary>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<CategorySummary> {
    let category = state.category_service().get_category(id).await?;
    Ok(Json(ApiResponse::success(category.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<CategorySummary>),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn create_category(
    State(state): State<AppState>,
    Json(payload): Json<CreateCategoryRequest>,
) -> ApiCreated<CategorySummary> {
    validate_input(&payload)?;
    let category = state
        .category_service()
        .create_category(payload.name, payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(category.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/categories/:id",
    request_body = UpdateCategoryRequest,
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category updated", body = ApiResponse<CategorySummary>),
        (status = 404, description = "Category not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Name already used", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCategoryRequest>,
) -> ApiResult<CategorySummary> {
    validate_input(&payload)?;
    let category = state
        .category_service()
        .update_category(id, payload.name, payload.description)
        .await?;
    Ok(Json(ApiResponse::success(category.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/:id",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted", body = ApiResponse<serde_json::Value>),
        (status = 409, description = "Category still has products", body = crate::errors::ErrorResponse)
    ),
    tag = "categories"
)]
pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.category_service().delete_category(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}
