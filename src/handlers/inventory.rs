use crate::{
    auth::AuthUser,
    entities::{
        inventory,
        inventory_transaction::{self, TransactionType},
        product,
    },
    errors::ServiceError,
    handlers::common::{caller_id, page_and_limit, paginated, validate_input},
    services::inventory::{StockMovement, TransactionFilter},
    ApiCreated, ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct InventoryListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub product_id: Option<Uuid>,
    pub low_stock: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "3d1e5c70-2a9b-4a8e-9d1f-0c6b7e5a4f21",
    "product_id": "0b6f3a3e-54d4-4d4f-8a53-7b8d1e7f2a10",
    "product_name": "Cola Classic",
    "product_size": "1.5L",
    "current_stock": 4,
    "reorder_level": 10,
    "low_stock": true,
    "last_updated": "2024-12-09T10:30:00Z"
}))]
pub struct InventoryItem {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub product_size: String,
    pub current_stock: i32,
    pub reorder_level: i32,
    pub low_stock: bool,
    pub last_updated: DateTime<Utc>,
}

impl From<(inventory::Model, Option<product::Model>)> for InventoryItem {
    fn from((row, product): (inventory::Model, Option<product::Model>)) -> Self {
        let reorder_level = product
            .as_ref()
            .map_or(product::DEFAULT_REORDER_LEVEL, |p| p.reorder_level);
        Self {
            id: row.id,
            product_id: row.product_id,
            product_name: product.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
            product_size: product.map(|p| p.size).unwrap_or_default(),
            current_stock: row.current_stock,
            reorder_level,
            low_stock: row.current_stock <= reorder_level,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub transaction_type: TransactionType,
    /// Signed quantity as submitted
    pub quantity: i32,
    pub previous_stock: i32,
    pub new_stock: i32,
    pub reference: Option<String>,
    pub reason: Option<String>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<(inventory_transaction::Model, Option<product::Model>)> for TransactionSummary {
    fn from(
        (tx, product): (inventory_transaction::Model, Option<product::Model>),
    ) -> Self {
        Self {
            id: tx.id,
            product_id: tx.product_id,
            product_name: product.map(|p| p.name),
            transaction_type: tx.transaction_type,
            quantity: tx.quantity,
            previous_stock: tx.previous_stock,
            new_stock: tx.new_stock,
            reference: tx.reference,
            reason: tx.reason,
            created_by: tx.created_by,
            created_at: tx.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "product_id": "0b6f3a3e-54d4-4d4f-8a53-7b8d1e7f2a10",
    "adjustment_value": -3,
    "reason": "Damaged in storage"
}))]
pub struct AdjustInventoryRequest {
    pub product_id: Uuid,
    /// Signed change applied to current stock
    pub adjustment_value: i32,
    #[serde(default = "default_adjustment_type")]
    pub transaction_type: TransactionType,
    #[validate(length(min = 1))]
    pub reason: String,
    pub reference: Option<String>,
}

fn default_adjustment_type() -> TransactionType {
    TransactionType::Adjustment
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub product_id: Option<Uuid>,
    pub transaction_type: Option<TransactionType>,
    /// Inclusive, on the creation date
    pub start_date: Option<NaiveDate>,
    /// Inclusive, on the creation date
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateTransactionRequest {
    pub product_id: Uuid,
    pub transaction_type: TransactionType,
    pub quantity: i32,
    pub reference: Option<String>,
    pub reason: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    params(InventoryListQuery),
    responses(
        (status = 200, description = "Stock levels listed", body = ApiResponse<PaginatedResponse<InventoryItem>>)
    ),
    tag = "inventory"
)]
pub async fn list_inventory(
    State(state): State<AppState>,
    Query(query): Query<InventoryListQuery>,
) -> ApiResult<PaginatedResponse<InventoryItem>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let (rows, total) = state
        .inventory_service()
        .list_inventory(query.product_id, query.low_stock, page, limit)
        .await?;
    let items = rows.into_iter().map(InventoryItem::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/:id",
    params(("id" = Uuid, Path, description = "Inventory row ID")),
    responses(
        (status = 200, description = "Stock level fetched", body = ApiResponse<InventoryItem>),
        (status = 404, description = "Inventory row not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_inventory(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<InventoryItem> {
    let row = state.inventory_service().get_inventory(id).await?;
    Ok(Json(ApiResponse::success(row.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    responses(
        (status = 200, description = "Rows at or below reorder level, lowest first", body = ApiResponse<Vec<InventoryItem>>)
    ),
    tag = "inventory"
)]
pub async fn low_stock(State(state): State<AppState>) -> ApiResult<Vec<InventoryItem>> {
    let rows = state.inventory_service().low_stock_items(None).await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(InventoryItem::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/adjust",
    request_body = AdjustInventoryRequest,
    responses(
        (status = 201, description = "Stock adjusted", body = ApiResponse<TransactionSummary>),
        (status = 400, description = "Missing reason", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AdjustInventoryRequest>,
) -> ApiCreated<TransactionSummary> {
    validate_input(&payload)?;
    let service = state.inventory_service();

    let tx = service
        .adjust(
            payload.product_id,
            payload.adjustment_value,
            payload.transaction_type,
            payload.reason,
            payload.reference,
            Some(caller_id(&user)?),
        )
        .await?;
    let record = service.get_transaction(tx.id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record.into()))))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/transactions",
    params(TransactionListQuery),
    responses(
        (status = 200, description = "Transactions listed, newest first", body = ApiResponse<PaginatedResponse<TransactionSummary>>)
    ),
    tag = "inventory"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    Query(query): Query<TransactionListQuery>,
) -> ApiResult<PaginatedResponse<TransactionSummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    if let (Some(start), Some(end)) = (query.start_date, query.end_date) {
        if start > end {
            return Err(ServiceError::ValidationError(
                "start_date must not be after end_date".to_string(),
            ));
        }
    }
    let filter = TransactionFilter {
        product_id: query.product_id,
        transaction_type: query.transaction_type,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let (rows, total) = state
        .inventory_service()
        .list_transactions(filter, page, limit)
        .await?;
    let items = rows.into_iter().map(TransactionSummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/inventory/transactions/:id",
    params(("id" = Uuid, Path, description = "Transaction ID")),
    responses(
        (status = 200, description = "Transaction fetched", body = ApiResponse<TransactionSummary>),
        (status = 404, description = "Transaction not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<TransactionSummary> {
    let record = state.inventory_service().get_transaction(id).await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/inventory/transactions",
    request_body = CreateTransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded and stock updated", body = ApiResponse<TransactionSummary>),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "inventory"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateTransactionRequest>,
) -> ApiCreated<TransactionSummary> {
    validate_input(&payload)?;
    let service = state.inventory_service();

    let mut movement =
        StockMovement::new(payload.product_id, payload.transaction_type, payload.quantity)
            .reason(payload.reason)
            .by(Some(caller_id(&user)?));
    if let Some(reference) = payload.reference {
        movement = movement.reference(reference);
    }

    let tx = service.create_transaction(movement).await?;
    let record = service.get_transaction(tx.id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record.into()))))
}
