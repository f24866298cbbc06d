use crate::{
    handlers::common::{page_and_limit, paginated, validate_input},
    services::products::{ProductChanges, ProductFilter, ProductInput, ProductRecord},
    ApiCreated, ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub active: Option<bool>,
    /// Matches name, product code or barcode
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "0b6f3a3e-54d4-4d4f-8a53-7b8d1e7f2a10",
    "product_id": "CK-1500",
    "name": "Cola Classic",
    "description": null,
    "category": {"id": "6f1c2a52-8f0b-4e55-9d55-3a7a0e2a9f01", "name": "Softdrinks"},
    "supplier_id": null,
    "unit_price": "65.00",
    "cost_price": "52.00",
    "size": "1.5L",
    "barcode": "4800888123456",
    "reorder_level": 10,
    "active": true,
    "current_stock": 4,
    "low_stock": true,
    "created_at": "2024-12-09T10:30:00Z",
    "updated_at": "2024-12-09T10:30:00Z"
}))]
pub struct ProductSummary {
    pub id: Uuid,
    /// Product code
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category: Option<CategoryRef>,
    pub supplier_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub size: String,
    pub barcode: Option<String>,
    pub reorder_level: i32,
    pub active: bool,
    /// Units on hand, 0 without an inventory row
    pub current_stock: i32,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ProductRecord> for ProductSummary {
    fn from(record: ProductRecord) -> Self {
        let low_stock = record.low_stock();
        let ProductRecord {
            product,
            category,
            current_stock,
        } = record;
        Self {
            id: product.id,
            product_id: product.product_id,
            name: product.name,
            description: product.description,
            category: category.map(|c| CategoryRef {
                id: c.id,
                name: c.name,
            }),
            supplier_id: product.supplier_id,
            unit_price: product.unit_price,
            cost_price: product.cost_price,
            size: product.size,
            barcode: product.barcode,
            reorder_level: product.reorder_level,
            active: product.active,
            current_stock,
            low_stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 50))]
    #[schema(example = "CK-1500")]
    pub product_id: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    #[validate(length(min = 1, max = 50))]
    #[schema(example = "1.5L")]
    pub size: String,
    pub barcode: Option<String>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub product_id: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub unit_price: Option<Decimal>,
    pub cost_price: Option<Decimal>,
    #[validate(length(min = 1, max = 50))]
    pub size: Option<String>,
    pub barcode: Option<String>,
    #[validate(range(min = 0))]
    pub reorder_level: Option<i32>,
    pub active: Option<bool>,
}

fn ensure_prices(prices: &[Option<Decimal>]) -> Result<(), crate::errors::ServiceError> {
    if prices.iter().flatten().any(|p| p.is_sign_negative()) {
        return Err(crate::errors::ServiceError::ValidationError(
            "prices cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products listed", body = ApiResponse<PaginatedResponse<ProductSummary>>)
    ),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> ApiResult<PaginatedResponse<ProductSummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let filter = ProductFilter {
        category_id: query.category_id,
        supplier_id: query.supplier_id,
        active: query.active,
        search: query.search,
    };
    let (records, total) = state
        .product_service()
        .list_products(filter, page, limit)
        .await?;
    let items = records.into_iter().map(ProductSummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product fetched", body = ApiResponse<ProductSummary>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ProductSummary> {
    let record = state.product_service().get_product(id).await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created with an empty inventory row", body = ApiResponse<ProductSummary>),
        (status = 400, description = "Unknown category or supplier", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> ApiCreated<ProductSummary> {
    validate_input(&payload)?;
    ensure_prices(&[Some(payload.unit_price), Some(payload.cost_price)])?;

    let record = state
        .product_service()
        .create_product(ProductInput {
            product_id: payload.product_id,
            name: payload.name,
            description: payload.description,
            category_id: payload.category_id,
            supplier_id: payload.supplier_id,
            unit_price: payload.unit_price,
            cost_price: payload.cost_price,
            size: payload.size,
            barcode: payload.barcode,
            reorder_level: payload.reorder_level,
            active: payload.active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/:id",
    request_body = UpdateProductRequest,
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductSummary>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product code already used", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> ApiResult<ProductSummary> {
    validate_input(&payload)?;
    ensure_prices(&[payload.unit_price, payload.cost_price])?;

    let record = state
        .product_service()
        .update_product(
            id,
            ProductChanges {
                product_id: payload.product_id,
                name: payload.name,
                description: payload.description,
                category_id: payload.category_id,
                supplier_id: payload.supplier_id,
                unit_price: payload.unit_price,
                cost_price: payload.cost_price,
                size: payload.size,
                barcode: payload.barcode,
                reorder_level: payload.reorder_level,
                active: payload.active,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "products"
)]
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.product_service().delete_product(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}
