use crate::{
    auth::AuthUser,
    entities::{delivery::DeliveryStatus, delivery_status_update},
    errors::ServiceError,
    handlers::common::{caller_id, page_and_limit, paginated, validate_input},
    services::deliveries::{DeliveryChanges, DeliveryDetails, DeliveryFilter, NewDelivery, RouteStop},
    ApiCreated, ApiResponse, ApiResult, AppState, PaginatedResponse,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Accepts `HH:MM` as well as `HH:MM:SS`.
fn parse_clock(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

fn clock_time<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_clock(raw.trim())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", raw)))
}

fn optional_clock_time<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_clock(raw.trim()).map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid time '{}', expected HH:MM", raw))
        }),
        None => Ok(None),
    }
}

fn format_clock(time: NaiveTime) -> String {
    time.format("%H:%M").to_string()
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeliveryListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub status: Option<DeliveryStatus>,
    pub employee_id: Option<Uuid>,
    pub delivery_date: Option<NaiveDate>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RouteQuery {
    /// Required, `YYYY-MM-DD`
    pub delivery_date: Option<NaiveDate>,
    pub employee_id: Option<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryOrderRef {
    pub id: Uuid,
    pub order_id: String,
    pub total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryStoreRef {
    pub id: Uuid,
    pub name: String,
    pub location: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EmployeeRef {
    pub id: Uuid,
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "e4d3c2b1-0a9f-4e8d-8c7b-6a5f4e3d2c1b",
    "delivery_id": "DEL-9F8E7D6C",
    "order": {"id": "c2b7d1f4-7e2a-4a0b-8f4e-1d2c3b4a5e6f", "order_id": "ORD-1A2B3C4D", "total": "132.60"},
    "store": {"id": "550e8400-e29b-41d4-a716-446655440000", "name": "Aling Nena Sari-Sari", "location": "12 Rizal St, Quezon City"},
    "employee": {"id": "7c9e6679-7425-40de-944b-e07fc1f90ae7", "name": "Juan Dela Cruz"},
    "status": "in-transit",
    "delivery_date": "2024-12-10",
    "delivery_time": "09:30",
    "notes": null,
    "has_signature": false,
    "signature_path": null,
    "lat": null,
    "lng": null,
    "created_at": "2024-12-09T10:30:00Z",
    "updated_at": "2024-12-09T10:30:00Z"
}))]
pub struct DeliverySummary {
    pub id: Uuid,
    /// Human-readable delivery number
    pub delivery_id: String,
    pub order: Option<DeliveryOrderRef>,
    pub store: Option<DeliveryStoreRef>,
    pub employee: Option<EmployeeRef>,
    pub status: DeliveryStatus,
    pub delivery_date: NaiveDate,
    /// `HH:MM`
    pub delivery_time: String,
    pub notes: Option<String>,
    pub has_signature: bool,
    /// Path relative to the media root
    pub signature_path: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<DeliveryDetails> for DeliverySummary {
    fn from(details: DeliveryDetails) -> Self {
        let DeliveryDetails {
            delivery,
            order,
            store,
            employee,
        } = details;
        Self {
            id: delivery.id,
            delivery_id: delivery.delivery_id,
            order: order.map(|o| DeliveryOrderRef {
                id: o.id,
                order_id: o.order_id,
                total: o.total,
            }),
            store: store.map(|s| DeliveryStoreRef {
                id: s.id,
                name: s.name,
                location: s.location,
            }),
            employee: employee.map(|u| EmployeeRef {
                id: u.id,
                name: u.full_name(),
            }),
            status: delivery.status,
            delivery_date: delivery.delivery_date,
            delivery_time: format_clock(delivery.delivery_time),
            notes: delivery.notes,
            has_signature: delivery.has_signature,
            signature_path: delivery.signature_path,
            lat: delivery.lat,
            lng: delivery.lng,
            created_at: delivery.created_at,
            updated_at: delivery.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusUpdateSummary {
    pub id: Uuid,
    pub status: DeliveryStatus,
    pub notes: Option<String>,
    pub update_time: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl From<delivery_status_update::Model> for StatusUpdateSummary {
    fn from(update: delivery_status_update::Model) -> Self {
        Self {
            id: update.id,
            status: update.status,
            notes: update.notes,
            update_time: update.update_time,
            updated_by: update.updated_by,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteStopSummary {
    pub id: Uuid,
    pub delivery_id: String,
    pub order_id: String,
    pub store_name: String,
    pub address: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub status: DeliveryStatus,
    /// `HH:MM`
    pub delivery_time: String,
}

impl From<RouteStop> for RouteStopSummary {
    fn from(stop: RouteStop) -> Self {
        Self {
            id: stop.id,
            delivery_id: stop.delivery_id,
            order_id: stop.order_id,
            store_name: stop.store_name,
            address: stop.address,
            lat: stop.lat,
            lng: stop.lng,
            status: stop.status,
            delivery_time: stop.delivery_time,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "order_id": "c2b7d1f4-7e2a-4a0b-8f4e-1d2c3b4a5e6f",
    "employee_id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
    "delivery_date": "2024-12-10",
    "delivery_time": "09:30"
}))]
pub struct CreateDeliveryRequest {
    pub order_id: Uuid,
    /// Must be an active delivery driver
    pub employee_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub delivery_date: NaiveDate,
    #[serde(deserialize_with = "clock_time")]
    #[schema(value_type = String, example = "09:30")]
    pub delivery_time: NaiveTime,
    pub notes: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateDeliveryRequest {
    pub employee_id: Option<Uuid>,
    pub status: Option<DeliveryStatus>,
    pub delivery_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "optional_clock_time")]
    #[schema(value_type = Option<String>, example = "14:00")]
    pub delivery_time: Option<NaiveTime>,
    pub notes: Option<String>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lng: Option<f64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: DeliveryStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignatureRequest {
    /// Base64 PNG, optionally as a `data:image/png;base64,` URL
    #[serde(default)]
    pub signature_data: String,
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries",
    params(DeliveryListQuery),
    responses(
        (status = 200, description = "Deliveries listed; drivers only see their own", body = ApiResponse<PaginatedResponse<DeliverySummary>>)
    ),
    tag = "deliveries"
)]
pub async fn list_deliveries(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DeliveryListQuery>,
) -> ApiResult<PaginatedResponse<DeliverySummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let employee_id = if user.is_delivery_driver() && !user.is_admin() {
        Some(caller_id(&user)?)
    } else {
        query.employee_id
    };
    let filter = DeliveryFilter {
        status: query.status,
        employee_id,
        delivery_date: query.delivery_date,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let (rows, total) = state
        .delivery_service()
        .list_deliveries(filter, page, limit)
        .await?;
    let items = rows.into_iter().map(DeliverySummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/routes",
    params(RouteQuery),
    responses(
        (status = 200, description = "Stops for the day in delivery-time order", body = ApiResponse<Vec<RouteStopSummary>>),
        (status = 400, description = "delivery_date missing", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn delivery_routes(
    State(state): State<AppState>,
    Query(query): Query<RouteQuery>,
) -> ApiResult<Vec<RouteStopSummary>> {
    let date = query.delivery_date.ok_or_else(|| {
        ServiceError::BadRequest("delivery_date parameter is required.".to_string())
    })?;
    let stops = state
        .delivery_service()
        .routes(date, query.employee_id)
        .await?;
    Ok(Json(ApiResponse::success(
        stops.into_iter().map(RouteStopSummary::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/:id",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery fetched", body = ApiResponse<DeliverySummary>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn get_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<DeliverySummary> {
    let details = state.delivery_service().get_delivery(id).await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries",
    request_body = CreateDeliveryRequest,
    responses(
        (status = 201, description = "Delivery scheduled", body = ApiResponse<DeliverySummary>),
        (status = 400, description = "Unknown order or employee is not an active driver", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order already has a delivery", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn create_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateDeliveryRequest>,
) -> ApiCreated<DeliverySummary> {
    validate_input(&payload)?;
    let details = state
        .delivery_service()
        .create_delivery(NewDelivery {
            order_id: payload.order_id,
            employee_id: payload.employee_id,
            status: payload.status,
            delivery_date: payload.delivery_date,
            delivery_time: payload.delivery_time,
            notes: payload.notes,
            lat: payload.lat,
            lng: payload.lng,
            created_by: Some(caller_id(&user)?),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(details.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/deliveries/:id",
    request_body = UpdateDeliveryRequest,
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery updated", body = ApiResponse<DeliverySummary>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn update_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateDeliveryRequest>,
) -> ApiResult<DeliverySummary> {
    validate_input(&payload)?;
    let changes = DeliveryChanges {
        employee_id: payload.employee_id,
        status: payload.status,
        delivery_date: payload.delivery_date,
        delivery_time: payload.delivery_time,
        notes: payload.notes,
        lat: payload.lat,
        lng: payload.lng,
    };
    let details = state
        .delivery_service()
        .update_delivery(id, changes, Some(caller_id(&user)?))
        .await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/deliveries/:id",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Delivery deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn delete_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.delivery_service().delete_delivery(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/:id/update-status",
    request_body = UpdateStatusRequest,
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Status assigned", body = ApiResponse<DeliverySummary>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn update_delivery_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<DeliverySummary> {
    let details = state
        .delivery_service()
        .update_status(id, payload.status, payload.notes, Some(caller_id(&user)?))
        .await?;
    Ok(Json(ApiResponse::success(details.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/deliveries/:id/status-updates",
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Status history, newest first", body = ApiResponse<Vec<StatusUpdateSummary>>),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn delivery_status_updates(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<StatusUpdateSummary>> {
    let updates = state.delivery_service().status_updates(id).await?;
    Ok(Json(ApiResponse::success(
        updates.into_iter().map(StatusUpdateSummary::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/deliveries/:id/signature",
    request_body = SignatureRequest,
    params(("id" = Uuid, Path, description = "Delivery ID")),
    responses(
        (status = 200, description = "Signature stored", body = ApiResponse<DeliverySummary>),
        (status = 400, description = "Not delivered, empty or undecodable signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Delivery not found", body = crate::errors::ErrorResponse)
    ),
    tag = "deliveries"
)]
pub async fn upload_signature(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SignatureRequest>,
) -> ApiResult<DeliverySummary> {
    let details = state
        .delivery_service()
        .upload_signature(id, &payload.signature_data)
        .await?;
    Ok(Json(ApiResponse::success(details.into())))
}
