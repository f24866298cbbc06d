use crate::{
    entities::{
        dashboard_stat::{self, StatPeriod, StatType},
        recent_activity::{self, ActivityType},
    },
    handlers::{common::validate_input, inventory::InventoryItem, orders::OrderSummary},
    services::dashboard::{
        ChartPeriod, DashboardSummary, DeliveryPerformance, DeliveryPoint, SalesPoint, StatChanges,
        StatInput,
    },
    ApiCreated, ApiResponse, ApiResult, AppState,
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

const DEFAULT_ACTIVITY_LIMIT: u64 = 10;
const MAX_ACTIVITY_LIMIT: u64 = 100;

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PeriodQuery {
    /// `week`, `month` (default) or `year`
    pub period: Option<String>,
}

impl PeriodQuery {
    fn chart_period(&self) -> Result<ChartPeriod, crate::errors::ServiceError> {
        match self.period.as_deref() {
            None | Some("") => Ok(ChartPeriod::default()),
            Some(value) => value.parse(),
        }
    }
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityQuery {
    pub limit: Option<u64>,
}

#[derive(Debug, Deserialize, Default, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct StatListQuery {
    pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PerformanceSummary {
    pub on_time: Decimal,
    pub delayed: Decimal,
    pub failed: Decimal,
}

impl From<DeliveryPerformance> for PerformanceSummary {
    fn from(p: DeliveryPerformance) -> Self {
        Self {
            on_time: p.on_time,
            delayed: p.delayed,
            failed: p.failed,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ActivitySummary {
    pub id: Uuid,
    pub activity_type: ActivityType,
    pub title: String,
    pub description: String,
    pub reference_id: Option<String>,
    pub user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<recent_activity::Model> for ActivitySummary {
    fn from(a: recent_activity::Model) -> Self {
        Self {
            id: a.id,
            activity_type: a.activity_type,
            title: a.title,
            description: a.description,
            reference_id: a.reference_id,
            user_id: a.user_id,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatSummary {
    pub id: Uuid,
    pub title: String,
    pub stat_type: StatType,
    pub period: StatPeriod,
    pub current_value: Decimal,
    pub previous_value: Decimal,
    pub percentage_change: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<dashboard_stat::Model> for StatSummary {
    fn from(s: dashboard_stat::Model) -> Self {
        Self {
            id: s.id,
            title: s.title,
            stat_type: s.stat_type,
            period: s.period,
            current_value: s.current_value,
            previous_value: s.previous_value,
            percentage_change: s.percentage_change,
            is_active: s.is_active,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SummaryResponse {
    pub today_deliveries: u64,
    pub yesterday_deliveries: u64,
    pub today_deliveries_change: Decimal,
    pub monthly_deliveries: u64,
    pub last_month_deliveries: u64,
    pub monthly_deliveries_change: Decimal,
    pub total_sales: Decimal,
    pub last_month_sales: Decimal,
    pub total_sales_change: Decimal,
    pub low_stock_count: u64,
    pub delivery_performance: PerformanceSummary,
    /// Orders from the last 24 hours
    pub recent_orders: Vec<OrderSummary>,
    pub recent_activities: Vec<ActivitySummary>,
    /// Active stat cards
    pub stats: Vec<StatSummary>,
}

impl From<DashboardSummary> for SummaryResponse {
    fn from(s: DashboardSummary) -> Self {
        Self {
            today_deliveries: s.today_deliveries,
            yesterday_deliveries: s.yesterday_deliveries,
            today_deliveries_change: s.today_deliveries_change,
            monthly_deliveries: s.monthly_deliveries,
            last_month_deliveries: s.last_month_deliveries,
            monthly_deliveries_change: s.monthly_deliveries_change,
            total_sales: s.total_sales,
            last_month_sales: s.last_month_sales,
            total_sales_change: s.total_sales_change,
            low_stock_count: s.low_stock_count,
            delivery_performance: s.performance.into(),
            recent_orders: s
                .recent_orders
                .into_iter()
                .map(|(order, store)| OrderSummary::new(order, store))
                .collect(),
            recent_activities: s
                .recent_activities
                .into_iter()
                .map(ActivitySummary::from)
                .collect(),
            stats: s.stats.into_iter().map(StatSummary::from).collect(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SalesBucket {
    pub date: String,
    pub sales: Decimal,
}

impl From<SalesPoint> for SalesBucket {
    fn from(p: SalesPoint) -> Self {
        Self {
            date: p.date,
            sales: p.sales,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeliveryBucket {
    pub date: String,
    pub total: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

impl From<DeliveryPoint> for DeliveryBucket {
    fn from(p: DeliveryPoint) -> Self {
        Self {
            date: p.date,
            total: p.total,
            delivered: p.delivered,
            cancelled: p.cancelled,
        }
    }
}

/// Chart data tagged with the period it covers
#[derive(Debug, Serialize, ToSchema)]
pub struct ChartResponse<T> {
    pub period: String,
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "title": "Monthly sales",
    "stat_type": "sales",
    "period": "monthly",
    "current_value": "15000.00",
    "previous_value": "12000.00"
}))]
pub struct CreateStatRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    pub stat_type: StatType,
    pub period: StatPeriod,
    pub current_value: Decimal,
    pub previous_value: Decimal,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateStatRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: Option<String>,
    pub stat_type: Option<StatType>,
    pub period: Option<StatPeriod>,
    pub current_value: Option<Decimal>,
    pub previous_value: Option<Decimal>,
    pub is_active: Option<bool>,
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/summary",
    responses(
        (status = 200, description = "Headline figures", body = ApiResponse<SummaryResponse>)
    ),
    tag = "dashboard"
)]
pub async fn dashboard_summary(State(state): State<AppState>) -> ApiResult<SummaryResponse> {
    let summary = state.dashboard_service().summary().await?;
    Ok(Json(ApiResponse::success(summary.into())))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/sales",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Sales per bucket", body = ApiResponse<ChartResponse<SalesBucket>>),
        (status = 400, description = "Unknown period", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn sales_chart(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<ChartResponse<SalesBucket>> {
    let period = query.chart_period()?;
    let points = state.dashboard_service().sales_series(period).await?;
    Ok(Json(ApiResponse::success(ChartResponse {
        period: period.as_str().to_string(),
        data: points.into_iter().map(SalesBucket::from).collect(),
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/deliveries",
    params(PeriodQuery),
    responses(
        (status = 200, description = "Delivery counts per bucket", body = ApiResponse<ChartResponse<DeliveryBucket>>),
        (status = 400, description = "Unknown period", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn delivery_chart(
    State(state): State<AppState>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<ChartResponse<DeliveryBucket>> {
    let period = query.chart_period()?;
    let points = state.dashboard_service().delivery_series(period).await?;
    Ok(Json(ApiResponse::success(ChartResponse {
        period: period.as_str().to_string(),
        data: points.into_iter().map(DeliveryBucket::from).collect(),
    })))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/inventory",
    responses(
        (status = 200, description = "Lowest-stock items at or under their reorder level", body = ApiResponse<Vec<InventoryItem>>)
    ),
    tag = "dashboard"
)]
pub async fn inventory_alerts(State(state): State<AppState>) -> ApiResult<Vec<InventoryItem>> {
    let rows = state.dashboard_service().inventory_alerts().await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(InventoryItem::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/activities",
    params(ActivityQuery),
    responses(
        (status = 200, description = "Activity feed, newest first", body = ApiResponse<Vec<ActivitySummary>>)
    ),
    tag = "dashboard"
)]
pub async fn recent_activities(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivitySummary>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ACTIVITY_LIMIT)
        .clamp(1, MAX_ACTIVITY_LIMIT);
    let rows = state.dashboard_service().activities(limit).await?;
    Ok(Json(ApiResponse::success(
        rows.into_iter().map(ActivitySummary::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/dashboard/stats",
    params(StatListQuery),
    responses(
        (status = 200, description = "Stat cards", body = ApiResponse<Vec<StatSummary>>)
    ),
    tag = "dashboard"
)]
pub async fn list_stats(
    State(state): State<AppState>,
    Query(query): Query<StatListQuery>,
) -> ApiResult<Vec<StatSummary>> {
    let stats = state.dashboard_service().list_stats(query.is_active).await?;
    Ok(Json(ApiResponse::success(
        stats.into_iter().map(StatSummary::from).collect(),
    )))
}

#[utoipa::path(
    post,
    path = "/api/v1/dashboard/stats",
    request_body = CreateStatRequest,
    responses(
        (status = 201, description = "Stat card created", body = ApiResponse<StatSummary>),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn create_stat(
    State(state): State<AppState>,
    Json(payload): Json<CreateStatRequest>,
) -> ApiCreated<StatSummary> {
    validate_input(&payload)?;
    let stat = state
        .dashboard_service()
        .create_stat(StatInput {
            title: payload.title,
            stat_type: payload.stat_type,
            period: payload.period,
            current_value: payload.current_value,
            previous_value: payload.previous_value,
            is_active: payload.is_active,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(stat.into()))))
}

#[utoipa::path(
    put,
    path = "/api/v1/dashboard/stats/:id",
    request_body = UpdateStatRequest,
    params(("id" = Uuid, Path, description = "Stat ID")),
    responses(
        (status = 200, description = "Stat card updated", body = ApiResponse<StatSummary>),
        (status = 404, description = "Stat not found", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn update_stat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatRequest>,
) -> ApiResult<StatSummary> {
    validate_input(&payload)?;
    let stat = state
        .dashboard_service()
        .update_stat(
            id,
            StatChanges {
                title: payload.title,
                stat_type: payload.stat_type,
                period: payload.period,
                current_value: payload.current_value,
                previous_value: payload.previous_value,
                is_active: payload.is_active,
            },
        )
        .await?;
    Ok(Json(ApiResponse::success(stat.into())))
}

#[utoipa::path(
    delete,
    path = "/api/v1/dashboard/stats/:id",
    params(("id" = Uuid, Path, description = "Stat ID")),
    responses(
        (status = 200, description = "Stat card deleted", body = ApiResponse<serde_json::Value>),
        (status = 404, description = "Stat not found", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboard"
)]
pub async fn delete_stat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<serde_json::Value> {
    state.dashboard_service().delete_stat(id).await?;
    Ok(Json(ApiResponse::success(json!({ "id": id, "deleted": true }))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use assert_matches::assert_matches;

    #[test]
    fn missing_period_defaults_to_month() {
        let query = PeriodQuery::default();
        assert_eq!(query.chart_period().unwrap(), ChartPeriod::Month);
    }

    #[test]
    fn unknown_period_is_rejected() {
        let query = PeriodQuery {
            period: Some("decade".into()),
        };
        assert_matches!(query.chart_period(), Err(ServiceError::BadRequest(msg)) if msg.contains("week, month, or year"));
    }
}
