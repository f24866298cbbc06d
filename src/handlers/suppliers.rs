use crate::{
    entities::supplier,
    handlers::common::{page_and_limit, paginated, validate_input},
    services::suppliers::{SupplierChanges, SupplierInput},
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
pub struct SupplierListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Matches name or contact person
    pub search: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SupplierSummary {
    pub id: Uuid,
    #[schema(example = "Metro Beverage Distributors")]
    pub name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<supplier::Model> for SupplierSummary {
    fn from(model: supplier::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            contact_person: model.contact_person,
            email: model.email,
            phone_number: model.phone_number,
            address: model.address,
            is_active: model.is_active,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub contact_person: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 20))]
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers",
    params(SupplierListQuery),
    responses(
        (status = 200, description = "Suppliers listed", body = ApiResponse<PaginatedResponse<SupplierSummary>>)
    ),
    tag = "suppliers"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<SupplierListQuery>,
) -> ApiResult<PaginatedResponse<SupplierSummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let (suppliers, total) = state
        .supplier_service()
        .list_suppliers(query.search, query.is_active, page, limit)
        .await?;
    let items = suppliers.into_iter().map(SupplierSummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/suppliers/:id",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier fetched", body = ApiResponse<SupplierSummary>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<SupplierSummary> {
    let supplier = state.supplier_service().get_supplier(id).await?;
    Ok(Json(ApiResponse::success(supplier.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/suppliers",
    request_body = CreateSupplierRequest,
    responses(
        (status = 201, description = "Supplier created", body = ApiResponse<SupplierSummary>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSupplierRequest>,
) -> ApiCreated<SupplierSummary> {
    validate_input(&payload)?;
    let supplier = state
        .supplier_service()
        .create_supplier(SupplierInput {
            name: payload.name,
            contact_person: payload.contact_person,
            email: payload.email,
            phone_number: payload.phone_number,
            address: payload.address,
            is_active: payload.is_active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(supplier.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/suppliers/:id",
    request_body = UpdateSupplierRequest,
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier updated", body = ApiResponse<SupplierSummary>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSupplierRequest>,
) -> ApiResult<SupplierSummary> {
    validate_input(&payload)?;
    let supplier = state
        .supplier_service()
        .update_supplier(
            id,
            SupplierChanges {
                name: payload.name,
                contact_person: payload.contact_person,
                email: payload.email,
                phone_number: payload.phone_number,
                address: payload.address,
                is_active: payload.is_active,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(supplier.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/suppliers/:id",
    params(("id" = Uuid, Path, description = "Supplier ID")),
    responses(
        (status = 200, description = "Supplier deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Supplier not found", body = crate::errors::ErrorResponse)
    ),
    tag = "suppliers"
)]
pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.supplier_service().delete_supplier(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}
