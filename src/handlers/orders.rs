use crate::{
    auth::AuthUser,
    entities::{
        order::{self, OrderStatus},
        store::{self, DeliveryDay},
    },
    errors::ServiceError,
    handlers::common::{caller_id, page_and_limit, paginated, validate_input},
    services::{
        orders::{
            NewOrder, OrderChanges, OrderDetails, OrderFilter, OrderItemInput, OrderLine, Receipt,
        },
        receipts::render_receipt_pdf,
    },
    ApiCreated, ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OrderListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<OrderStatus>,
    pub store_id: Option<Uuid>,
    /// Inclusive, on the creation date
    pub start_date: Option<NaiveDate>,
    /// Inclusive, on the creation date
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StoreRef {
    pub id: Uuid,
    pub name: String,
    pub location: String,
}

impl From<store::Model> for StoreRef {
    fn from(store: store::Model) -> Self {
        Self {
            id: store.id,
            name: store.name,
            location: store.location,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemSummary {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub product_size: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    /// quantity x unit_price
    pub total: Decimal,
}

impl From<OrderLine> for OrderItemSummary {
    fn from((item, product): OrderLine) -> Self {
        Self {
            id: item.id,
            product_id: item.product_id,
            product_name: product.as_ref().map(|p| p.name.clone()),
            product_size: product.map(|p| p.size),
            quantity: item.quantity,
            unit_price: item.unit_price,
            total: item.total,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "c2b7d1f4-7e2a-4a0b-8f4e-1d2c3b4a5e6f",
    "order_id": "ORD-1A2B3C4D",
    "store": {"id": "550e8400-e29b-41d4-a716-446655440000", "name": "Aling Nena Sari-Sari", "location": "12 Rizal St, Quezon City"},
    "created_by": null,
    "status": "pending",
    "delivery_day": "Monday",
    "notes": null,
    "subtotal": "130.00",
    "tax": "2.60",
    "total": "132.60",
    "created_at": "2024-12-09T10:30:00Z",
    "updated_at": "2024-12-09T10:30:00Z"
}))]
pub struct OrderSummary {
    pub id: Uuid,
    /// Human-readable order number
    pub order_id: String,
    pub store: Option<StoreRef>,
    pub created_by: Option<Uuid>,
    pub status: OrderStatus,
    pub delivery_day: Option<DeliveryDay>,
    pub notes: Option<String>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    /// Present on single-order responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemSummary>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderSummary {
    pub(crate) fn new(order: order::Model, store: Option<store::Model>) -> Self {
        Self {
            id: order.id,
            order_id: order.order_id,
            store: store.map(StoreRef::from),
            created_by: order.created_by,
            status: order.status,
            delivery_day: order.delivery_day,
            notes: order.notes,
            subtotal: order.subtotal,
            tax: order.tax,
            total: order.total,
            items: None,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl From<OrderDetails> for OrderSummary {
    fn from(details: OrderDetails) -> Self {
        let mut summary = Self::new(details.order, details.store);
        summary.items = Some(details.items.into_iter().map(OrderItemSummary::from).collect());
        summary
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptStore {
    pub name: String,
    pub location: String,
    pub contact: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptItem {
    pub product: String,
    pub size: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReceiptResponse {
    pub order_id: String,
    /// `%Y-%m-%d %H:%M:%S`
    pub date: String,
    pub store: ReceiptStore,
    pub items: Vec<ReceiptItem>,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

impl From<Receipt> for ReceiptResponse {
    fn from(receipt: Receipt) -> Self {
        Self {
            order_id: receipt.order_id,
            date: receipt.date,
            store: ReceiptStore {
                name: receipt.store_name,
                location: receipt.store_location,
                contact: receipt.store_contact,
            },
            items: receipt
                .lines
                .into_iter()
                .map(|line| ReceiptItem {
                    product: line.product,
                    size: line.size,
                    quantity: line.quantity,
                    unit_price: line.unit_price,
                    total: line.total,
                })
                .collect(),
            subtotal: receipt.totals.subtotal,
            tax: receipt.totals.tax,
            total: receipt.totals.total,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct OrderItemRequest {
    pub product_id: Uuid,
    /// Defaults to 1
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    /// Defaults to the product's unit price
    pub unit_price: Option<Decimal>,
}

impl From<OrderItemRequest> for OrderItemInput {
    fn from(item: OrderItemRequest) -> Self {
        Self {
            product_id: item.product_id,
            quantity: item.quantity,
            unit_price: item.unit_price,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "store_id": "550e8400-e29b-41d4-a716-446655440000",
    "delivery_day": "Monday",
    "order_items": [
        {"product_id": "0b6f3a3e-54d4-4d4f-8a53-7b8d1e7f2a10", "quantity": 2}
    ]
}))]
pub struct CreateOrderRequest {
    pub store_id: Uuid,
    pub status: Option<OrderStatus>,
    pub delivery_day: Option<DeliveryDay>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate]
    pub order_items: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    pub status: Option<OrderStatus>,
    pub delivery_day: Option<DeliveryDay>,
    pub notes: Option<String>,
    /// A non-empty list replaces every existing item
    pub order_items: Option<Vec<OrderItemRequest>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderItemRequest {
    #[validate(range(min = 1))]
    pub quantity: Option<i32>,
    pub unit_price: Option<Decimal>,
}

fn ensure_prices<'a>(
    prices: impl IntoIterator<Item = &'a Option<Decimal>>,
) -> Result<(), ServiceError> {
    if prices.into_iter().flatten().any(|p| p.is_sign_negative()) {
        return Err(ServiceError::ValidationError(
            "unit_price cannot be negative".to_string(),
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders listed, newest first", body = ApiResponse<PaginatedResponse<OrderSummary>>)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> ApiResult<PaginatedResponse<OrderSummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let filter = OrderFilter {
        status: query.status,
        store_id: query.store_id,
        start_date: query.start_date,
        end_date: query.end_date,
    };
    let (rows, total) = state.order_service().list_orders(filter, page, limit).await?;
    let items = rows
        .into_iter()
        .map(|(order, store)| OrderSummary::new(order, store))
        .collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with store and items", body = ApiResponse<OrderSummary>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<OrderSummary> {
    let details = state.order_service().get_order(id).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created; stock drawn for each item", body = ApiResponse<OrderSummary>),
        (status = 400, description = "Unknown store or invalid item", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> ApiCreated<OrderSummary> {
    validate_input(&payload)?;
    ensure_prices(payload.order_items.iter().map(|i| &i.unit_price))?;

    let details = state
        .order_service()
        .create_order(NewOrder {
            store_id: payload.store_id,
            status: payload.status,
            delivery_day: payload.delivery_day,
            notes: payload.notes,
            items: payload.order_items.into_iter().map(Into::into).collect(),
            created_by: Some(caller_id(&user)?),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(details.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/:id",
    request_body = UpdateOrderRequest,
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order updated", body = ApiResponse<OrderSummary>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderRequest>,
) -> ApiResult<OrderSummary> {
    validate_input(&payload)?;
    if let Some(items) = &payload.order_items {
        items.iter().try_for_each(validate_input)?;
        ensure_prices(items.iter().map(|i| &i.unit_price))?;
    }

    let changes = OrderChanges {
        status: payload.status,
        delivery_day: payload.delivery_day,
        notes: payload.notes,
        items: payload
            .order_items
            .map(|items| items.into_iter().map(Into::into).collect()),
    };
    let details = state
        .order_service()
        .update_order(id, changes, Some(caller_id(&user)?))
        .await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order and its items deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.order_service().delete_order(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/:id/items",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order items", body = ApiResponse<Vec<OrderItemSummary>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_order_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<OrderItemSummary>> {
    let items = state.order_service().list_items(id).await?;
    Ok(Json(ApiResponse::success(
        items.into_iter().map(OrderItemSummary::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/items",
    request_body = OrderItemRequest,
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 201, description = "Item added and totals recomputed", body = ApiResponse<OrderItemSummary>),
        (status = 400, description = "Unknown product", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn add_order_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<OrderItemRequest>,
) -> ApiCreated<OrderItemSummary> {
    validate_input(&payload)?;
    ensure_prices([&payload.unit_price])?;

    let line = state
        .order_service()
        .add_item(id, payload.into(), Some(caller_id(&user)?))
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(line.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/:id/items/:item_id",
    request_body = UpdateOrderItemRequest,
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("item_id" = Uuid, Path, description = "Order item ID")
    ),
    responses(
        (status = 200, description = "Item updated and totals recomputed", body = ApiResponse<OrderItemSummary>),
        (status = 404, description = "Order or item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateOrderItemRequest>,
) -> ApiResult<OrderItemSummary> {
    validate_input(&payload)?;
    ensure_prices([&payload.unit_price])?;

    let line = state
        .order_service()
        .update_item(id, item_id, payload.quantity, payload.unit_price)
        .await?;
    Ok(Json(ApiResponse::success(line.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/orders/:id/items/:item_id",
    params(
        ("id" = Uuid, Path, description = "Order ID"),
        ("item_id" = Uuid, Path, description = "Order item ID")
    ),
    responses(
        (status = 200, description = "Item removed and totals recomputed", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Order or item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn delete_order_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<serde_json::Value> {
    state.order_service().delete_item(id, item_id).await?;
    Ok(Json(ApiResponse::success(
        json!({ "id": item_id, "order_id": id, "deleted": true }),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/:id/receipt",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Receipt data", body = ApiResponse<ReceiptResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn order_receipt(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ReceiptResponse> {
    let receipt = state.order_service().receipt(id).await?;
    Ok(Json(ApiResponse::success(receipt.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/:id/pdf",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Receipt as a PDF attachment", content_type = "application/pdf", body = Vec<u8>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn order_pdf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ServiceError> {
    let receipt = state.order_service().receipt(id).await?;
    let disposition = format!("attachment; filename=\"order_{}.pdf\"", receipt.order_id);
    let pdf = render_receipt_pdf(&receipt);

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}
