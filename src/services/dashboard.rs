use crate::{
    db::DbPool,
    entities::{
        dashboard_stat::{self, percentage_change, Entity as DashboardStat, StatPeriod, StatType},
        delivery::{self, DeliveryStatus, Entity as Delivery},
        order::{self, Entity as Order},
        order_item::{self, Entity as OrderItem},
        recent_activity,
        store::{self, Entity as Store},
    },
    errors::ServiceError,
    services::{
        activity::ActivityService,
        inventory::{InventoryService, StockLevel},
    },
};
use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::{collections::BTreeMap, str::FromStr, sync::Arc};
use tracing::{info, instrument};
use uuid::Uuid;

const RECENT_ORDER_LIMIT: u64 = 5;
const RECENT_ACTIVITY_LIMIT: u64 = 10;
const INVENTORY_ALERT_LIMIT: u64 = 10;

/// Chart window for the sales and delivery series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChartPeriod {
    Week,
    #[default]
    Month,
    Year,
}

impl FromStr for ChartPeriod {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            _ => Err(ServiceError::BadRequest(
                "Invalid period. Use week, month, or year.".to_string(),
            )),
        }
    }
}

impl ChartPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }

    /// Bucket labels in chronological order, ending with the bucket of `today`.
    pub fn buckets(self, today: NaiveDate) -> Vec<String> {
        match self {
            Self::Week => day_labels(today, 7),
            Self::Month => day_labels(today, 30),
            Self::Year => {
                let mut start = month_start(today);
                let mut labels = Vec::with_capacity(12);
                for _ in 0..12 {
                    labels.push(start.format("%Y-%m").to_string());
                    start = month_start(start - Days::new(1));
                }
                labels.reverse();
                labels
            }
        }
    }

    /// Bucket a date falls into.
    pub fn label(self, date: NaiveDate) -> String {
        match self {
            Self::Week | Self::Month => date.format("%Y-%m-%d").to_string(),
            Self::Year => date.format("%Y-%m").to_string(),
        }
    }

    /// First day covered by the chart.
    pub fn first_day(self, today: NaiveDate) -> NaiveDate {
        match self {
            Self::Week => today - Days::new(6),
            Self::Month => today - Days::new(29),
            Self::Year => {
                let mut start = month_start(today);
                for _ in 0..11 {
                    start = month_start(start - Days::new(1));
                }
                start
            }
        }
    }
}

fn day_labels(today: NaiveDate, days: u64) -> Vec<String> {
    (0..days)
        .rev()
        .map(|offset| (today - Days::new(offset)).format("%Y-%m-%d").to_string())
        .collect()
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date - Days::new(u64::from(date.day0()))
}

fn next_month_start(date: NaiveDate) -> NaiveDate {
    month_start(month_start(date) + Days::new(31))
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Share of `part` in `whole` as a percentage rounded to two places.
fn share(part: u64, whole: u64) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(part) / Decimal::from(whole) * Decimal::ONE_HUNDRED).round_dp(2)
}

/// Delivery outcome split over finished deliveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryPerformance {
    pub on_time: Decimal,
    pub delayed: Decimal,
    pub failed: Decimal,
}

impl DeliveryPerformance {
    pub fn from_counts(delivered: u64, cancelled: u64) -> Self {
        let finished = delivered + cancelled;
        if finished == 0 {
            return Self::default();
        }
        let on_time = share(delivered, finished);
        let failed = share(cancelled, finished);
        Self {
            on_time,
            failed,
            delayed: Decimal::ONE_HUNDRED - on_time - failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardSummary {
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
    pub performance: DeliveryPerformance,
    pub recent_orders: Vec<(order::Model, Option<store::Model>)>,
    pub recent_activities: Vec<recent_activity::Model>,
    pub stats: Vec<dashboard_stat::Model>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesPoint {
    pub date: String,
    pub sales: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliveryPoint {
    pub date: String,
    pub total: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

#[derive(Debug, Clone)]
pub struct StatInput {
    pub title: String,
    pub stat_type: StatType,
    pub period: StatPeriod,
    pub current_value: Decimal,
    pub previous_value: Decimal,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct StatChanges {
    pub title: Option<String>,
    pub stat_type: Option<StatType>,
    pub period: Option<StatPeriod>,
    pub current_value: Option<Decimal>,
    pub previous_value: Option<Decimal>,
    pub is_active: Option<bool>,
}

/// Aggregates for the dashboard and the stored stat cards
#[derive(Clone)]
pub struct DashboardService {
    db_pool: Arc<DbPool>,
    inventory: InventoryService,
    activity: ActivityService,
}

impl DashboardService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self {
            inventory: InventoryService::new(db_pool.clone()),
            activity: ActivityService::new(db_pool.clone()),
            db_pool,
        }
    }

    async fn count_deliveries(
        &self,
        from: NaiveDate,
        until: NaiveDate,
        status: Option<DeliveryStatus>,
    ) -> Result<u64, ServiceError> {
        let mut query = Delivery::find()
            .filter(delivery::Column::DeliveryDate.gte(from))
            .filter(delivery::Column::DeliveryDate.lt(until));
        if let Some(status) = status {
            query = query.filter(delivery::Column::Status.eq(status));
        }
        query
            .count(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Sum of line totals of orders created in `[from, until)`.
    async fn sales_between(&self, from: NaiveDate, until: NaiveDate) -> Result<Decimal, ServiceError> {
        let totals: Vec<Decimal> = OrderItem::find()
            .inner_join(Order)
            .filter(order::Column::CreatedAt.gte(day_start(from)))
            .filter(order::Column::CreatedAt.lt(day_start(until)))
            .select_only()
            .column(order_item::Column::Total)
            .into_tuple()
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        Ok(totals.into_iter().sum())
    }

    #[instrument(skip(self))]
    pub async fn summary(&self) -> Result<DashboardSummary, ServiceError> {
        let now = Utc::now();
        let today = now.date_naive();
        let tomorrow = today + Days::new(1);
        let yesterday = today - Days::new(1);
        let this_month = month_start(today);
        let next_month = next_month_start(today);
        let last_month = month_start(this_month - Days::new(1));

        let today_deliveries = self.count_deliveries(today, tomorrow, None).await?;
        let yesterday_deliveries = self.count_deliveries(yesterday, today, None).await?;
        let monthly_deliveries = self.count_deliveries(this_month, next_month, None).await?;
        let last_month_deliveries = self.count_deliveries(last_month, this_month, None).await?;

        let total_sales = self.sales_between(this_month, next_month).await?;
        let last_month_sales = self.sales_between(last_month, this_month).await?;

        let delivered = self
            .count_deliveries(this_month, next_month, Some(DeliveryStatus::Delivered))
            .await?;
        let cancelled = self
            .count_deliveries(this_month, next_month, Some(DeliveryStatus::Cancelled))
            .await?;

        let recent_orders = Order::find()
            .find_also_related(Store)
            .filter(order::Column::CreatedAt.gte(now - Duration::days(1)))
            .order_by_desc(order::Column::CreatedAt)
            .limit(RECENT_ORDER_LIMIT)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        Ok(DashboardSummary {
            today_deliveries,
            yesterday_deliveries,
            today_deliveries_change: percentage_change(
                today_deliveries.into(),
                yesterday_deliveries.into(),
            ),
            monthly_deliveries,
            last_month_deliveries,
            monthly_deliveries_change: percentage_change(
                monthly_deliveries.into(),
                last_month_deliveries.into(),
            ),
            total_sales,
            last_month_sales,
            total_sales_change: percentage_change(total_sales, last_month_sales),
            low_stock_count: self.inventory.low_stock_count().await?,
            performance: DeliveryPerformance::from_counts(delivered, cancelled),
            recent_orders,
            recent_activities: self.activity.recent(RECENT_ACTIVITY_LIMIT).await?,
            stats: self.list_stats(Some(true)).await?,
        })
    }

    /// Line totals per bucket of order creation, oldest first. Empty buckets
    /// are zero. Tax is excluded, matching `total_sales` in the summary.
    #[instrument(skip(self))]
    pub async fn sales_series(&self, period: ChartPeriod) -> Result<Vec<SalesPoint>, ServiceError> {
        let today = Utc::now().date_naive();
        let orders: Vec<(DateTime<Utc>, Decimal)> = OrderItem::find()
            .inner_join(Order)
            .filter(order::Column::CreatedAt.gte(day_start(period.first_day(today))))
            .filter(order::Column::CreatedAt.lt(day_start(today + Days::new(1))))
            .select_only()
            .column(order::Column::CreatedAt)
            .column(order_item::Column::Total)
            .into_tuple()
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let mut buckets: BTreeMap<String, Decimal> = period
            .buckets(today)
            .into_iter()
            .map(|label| (label, Decimal::ZERO))
            .collect();
        for (created_at, total) in orders {
            if let Some(sum) = buckets.get_mut(&period.label(created_at.date_naive())) {
                *sum += total;
            }
        }

        Ok(buckets
            .into_iter()
            .map(|(date, sales)| SalesPoint { date, sales })
            .collect())
    }

    /// Delivery counts per bucket by delivery date, oldest first.
    #[instrument(skip(self))]
    pub async fn delivery_series(
        &self,
        period: ChartPeriod,
    ) -> Result<Vec<DeliveryPoint>, ServiceError> {
        let today = Utc::now().date_naive();
        let deliveries: Vec<(NaiveDate, DeliveryStatus)> = Delivery::find()
            .filter(delivery::Column::DeliveryDate.gte(period.first_day(today)))
            .filter(delivery::Column::DeliveryDate.lte(today))
            .select_only()
            .column(delivery::Column::DeliveryDate)
            .column(delivery::Column::Status)
            .into_tuple()
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;

        let mut buckets: BTreeMap<String, DeliveryPoint> = period
            .buckets(today)
            .into_iter()
            .map(|date| {
                (
                    date.clone(),
                    DeliveryPoint {
                        date,
                        ..Default::default()
                    },
                )
            })
            .collect();
        for (date, status) in deliveries {
            if let Some(point) = buckets.get_mut(&period.label(date)) {
                point.total += 1;
                match status {
                    DeliveryStatus::Delivered => point.delivered += 1,
                    DeliveryStatus::Cancelled => point.cancelled += 1,
                    _ => {}
                }
            }
        }
        Ok(buckets.into_values().collect())
    }

    /// Lowest stock first
    #[instrument(skip(self))]
    pub async fn inventory_alerts(&self) -> Result<Vec<StockLevel>, ServiceError> {
        self.inventory.low_stock_items(Some(INVENTORY_ALERT_LIMIT)).await
    }

    #[instrument(skip(self))]
    pub async fn activities(&self, limit: u64) -> Result<Vec<recent_activity::Model>, ServiceError> {
        self.activity.recent(limit).await
    }

    #[instrument(skip(self))]
    pub async fn list_stats(
        &self,
        is_active: Option<bool>,
    ) -> Result<Vec<dashboard_stat::Model>, ServiceError> {
        let mut query = DashboardStat::find();
        if let Some(active) = is_active {
            query = query.filter(dashboard_stat::Column::IsActive.eq(active));
        }
        query
            .order_by_asc(dashboard_stat::Column::StatType)
            .order_by_asc(dashboard_stat::Column::Period)
            .all(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    async fn find_stat(&self, id: Uuid) -> Result<dashboard_stat::Model, ServiceError> {
        DashboardStat::find_by_id(id)
            .one(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::not_found("Dashboard stat", id))
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_stat(&self, input: StatInput) -> Result<dashboard_stat::Model, ServiceError> {
        let now = Utc::now();
        let stat = dashboard_stat::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(input.title),
            stat_type: Set(input.stat_type),
            period: Set(input.period),
            current_value: Set(input.current_value),
            previous_value: Set(input.previous_value),
            percentage_change: Set(Decimal::ZERO),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&*self.db_pool)
        .await
        .map_err(ServiceError::db_error)?;
        info!(stat = %stat.id, "dashboard stat created");
        Ok(stat)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_stat(
        &self,
        id: Uuid,
        changes: StatChanges,
    ) -> Result<dashboard_stat::Model, ServiceError> {
        let mut active: dashboard_stat::ActiveModel = self.find_stat(id).await?.into();
        if let Some(title) = changes.title {
            active.title = Set(title);
        }
        if let Some(stat_type) = changes.stat_type {
            active.stat_type = Set(stat_type);
        }
        if let Some(period) = changes.period {
            active.period = Set(period);
        }
        if let Some(current) = changes.current_value {
            active.current_value = Set(current);
        }
        if let Some(previous) = changes.previous_value {
            active.previous_value = Set(previous);
        }
        if let Some(is_active) = changes.is_active {
            active.is_active = Set(is_active);
        }
        active
            .update(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self))]
    pub async fn delete_stat(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = DashboardStat::delete_by_id(id)
            .exec(&*self.db_pool)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::not_found("Dashboard stat", id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn unknown_period_is_rejected() {
        assert_eq!("week".parse::<ChartPeriod>().unwrap(), ChartPeriod::Week);
        assert_matches!(
            "quarter".parse::<ChartPeriod>(),
            Err(ServiceError::BadRequest(msg)) if msg == "Invalid period. Use week, month, or year."
        );
    }

    #[test]
    fn week_has_seven_day_buckets_ending_today() {
        let buckets = ChartPeriod::Week.buckets(date(2024, 3, 3));
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets.first().unwrap(), "2024-02-26");
        assert_eq!(buckets.last().unwrap(), "2024-03-03");
        assert_eq!(ChartPeriod::Week.first_day(date(2024, 3, 3)), date(2024, 2, 26));
    }

    #[test]
    fn year_has_twelve_month_buckets() {
        let today = date(2024, 3, 15);
        let buckets = ChartPeriod::Year.buckets(today);
        assert_eq!(buckets.len(), 12);
        assert_eq!(buckets.first().unwrap(), "2023-04");
        assert_eq!(buckets.last().unwrap(), "2024-03");
        assert_eq!(ChartPeriod::Year.first_day(today), date(2023, 4, 1));
    }

    #[test]
    fn month_boundaries() {
        assert_eq!(month_start(date(2024, 2, 29)), date(2024, 2, 1));
        assert_eq!(next_month_start(date(2024, 1, 31)), date(2024, 2, 1));
        assert_eq!(next_month_start(date(2024, 12, 5)), date(2025, 1, 1));
    }

    #[test]
    fn performance_splits_finished_deliveries() {
        let perf = DeliveryPerformance::from_counts(3, 1);
        assert_eq!(perf.on_time, dec!(75));
        assert_eq!(perf.failed, dec!(25));
        assert_eq!(perf.delayed, dec!(0));

        assert_eq!(DeliveryPerformance::from_counts(0, 0), DeliveryPerformance::default());
    }
}
