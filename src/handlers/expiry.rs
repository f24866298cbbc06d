use crate::{
    handlers::common::{page_and_limit, paginated, validate_input},
    services::expiry::{
        ExpiryChanges, ExpiryFilter, ExpiryInput, ExpiryRecord, DEFAULT_EXPIRY_WINDOW_DAYS,
    },
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

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpiryListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub product_id: Option<Uuid>,
    pub is_active: Option<bool>,
    /// Matches product name or batch number
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExpiringSoonQuery {
    /// Window length in days; invalid values fall back to 30
    pub days: Option<String>,
}

impl ExpiringSoonQuery {
    fn window_days(&self) -> u64 {
        self.days
            .as_deref()
            .and_then(|d| d.trim().parse().ok())
            .unwrap_or(DEFAULT_EXPIRY_WINDOW_DAYS)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[schema(example = json!({
    "id": "9a0c1b7e-5f0e-4c59-9d1a-2b4c6d8e0f12",
    "product_id": "0b6f3a3e-54d4-4d4f-8a53-7b8d1e7f2a10",
    "product_name": "Cola Classic",
    "batch_number": "B-2024-117",
    "quantity": 48,
    "production_date": "2024-06-01",
    "expiry_date": "2025-06-01",
    "days_until_expiry": 12,
    "is_active": true,
    "created_at": "2024-12-09T10:30:00Z",
    "updated_at": "2024-12-09T10:30:00Z"
}))]
pub struct ExpirySummary {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub batch_number: String,
    pub quantity: i32,
    pub production_date: NaiveDate,
    pub expiry_date: NaiveDate,
    /// Negative once expired
    pub days_until_expiry: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ExpiryRecord> for ExpirySummary {
    fn from((expiry, product): ExpiryRecord) -> Self {
        let today = Utc::now().date_naive();
        Self {
            id: expiry.id,
            product_id: expiry.product_id,
            product_name: product.map(|p| p.name),
            batch_number: expiry.batch_number,
            quantity: expiry.quantity,
            production_date: expiry.production_date,
            expiry_date: expiry.expiry_date,
            days_until_expiry: (expiry.expiry_date - today).num_days(),
            is_active: expiry.is_active,
            created_at: expiry.created_at,
            updated_at: expiry.updated_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateExpiryRequest {
    pub product_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub batch_number: String,
    #[validate(range(min = 0))]
    pub quantity: i32,
    pub production_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateExpiryRequest {
    #[validate(length(min = 1, max = 100))]
    pub batch_number: Option<String>,
    #[validate(range(min = 0))]
    pub quantity: Option<i32>,
    pub production_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/v1/product-expiry",
    params(ExpiryListQuery),
    responses(
        (status = 200, description = "Expiry records listed by expiry date", body = ApiResponse<PaginatedResponse<ExpirySummary>>)
    ),
    tag = "product-expiry"
)]
pub async fn list_expiries(
    State(state): State<AppState>,
    Query(query): Query<ExpiryListQuery>,
) -> ApiResult<PaginatedResponse<ExpirySummary>> {
    let (page, limit) = page_and_limit(query.page, query.limit)?;
    let filter = ExpiryFilter {
        product_id: query.product_id,
        is_active: query.is_active,
        search: query.search,
    };
    let (records, total) = state
        .expiry_service()
        .list_expiries(filter, page, limit)
        .await?;
    let items = records.into_iter().map(ExpirySummary::from).collect();
    Ok(Json(ApiResponse::success(paginated(items, total, page, limit))))
}

#[utoipa::path(
    get,
    path = "/api/v1/product-expiry/expiring-soon",
    params(ExpiringSoonQuery),
    responses(
        (status = 200, description = "Active batches expiring within the window", body = ApiResponse<Vec<ExpirySummary>>)
    ),
    tag = "product-expiry"
)]
pub async fn expiring_soon(
    State(state): State<AppState>,
    Query(query): Query<ExpiringSoonQuery>,
) -> ApiResult<Vec<ExpirySummary>> {
    let records = state
        .expiry_service()
        .expiring_soon(query.window_days())
        .await?;
    Ok(Json(ApiResponse::success(
        records.into_iter().map(ExpirySummary::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/product-expiry/:id",
    params(("id" = Uuid, Path, description = "Expiry record ID")),
    responses(
        (status = 200, description = "Expiry record fetched", body = ApiResponse<ExpirySummary>),
        (status = 404, description = "Expiry record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "product-expiry"
)]
pub async fn get_expiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ExpirySummary> {
    let record = state.expiry_service().get_expiry(id).await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    post,
    path = "/api/v1/product-expiry",
    request_body = CreateExpiryRequest,
    responses(
        (status = 201, description = "Expiry record created", body = ApiResponse<ExpirySummary>),
        (status = 400, description = "Unknown product or inverted dates", body = crate::errors::ErrorResponse)
    ),
    tag = "product-expiry"
)]
pub async fn create_expiry(
    State(state): State<AppState>,
    Json(payload): Json<CreateExpiryRequest>,
) -> ApiCreated<ExpirySummary> {
    validate_input(&payload)?;
    let record = state
        .expiry_service()
        .create_expiry(ExpiryInput {
            product_id: payload.product_id,
            batch_number: payload.batch_number,
            quantity: payload.quantity,
            production_date: payload.production_date,
            expiry_date: payload.expiry_date,
            is_active: payload.is_active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(record.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/product-expiry/:id",
    request_body = UpdateExpiryRequest,
    params(("id" = Uuid, Path, description = "Expiry record ID")),
    responses(
        (status = 200, description = "Expiry record updated", body = ApiResponse<ExpirySummary>),
        (status = 404, description = "Expiry record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "product-expiry"
)]
pub async fn update_expiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateExpiryRequest>,
) -> ApiResult<ExpirySummary> {
    validate_input(&payload)?;
    let record = state
        .expiry_service()
        .update_expiry(
            id,
            ExpiryChanges {
                batch_number: payload.batch_number,
                quantity: payload.quantity,
                production_date: payload.production_date,
                expiry_date: payload.expiry_date,
                is_active: payload.is_active,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(record.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/product-expiry/:id",
    params(("id" = Uuid, Path, description = "Expiry record ID")),
    responses(
        (status = 200, description = "Expiry record deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Expiry record not found", body = crate::errors::ErrorResponse)
    ),
    tag = "product-expiry"
)]
pub async fn delete_expiry(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.expiry_service().delete_expiry(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_days_fall_back_to_default() {
        let query = |days: Option<&str>| ExpiringSoonQuery {
            days: days.map(str::to_string),
        };
        assert_eq!(query(None).window_days(), 30);
        assert_eq!(query(Some("abc")).window_days(), 30);
        assert_eq!(query(Some("-4")).window_days(), 30);
        assert_eq!(query(Some("7")).window_days(), 7);
    }
}
