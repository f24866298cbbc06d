use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Display,
    EnumString, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatType {
    #[sea_orm(string_value = "sales")]
    Sales,
    #[sea_orm(string_value = "orders")]
    Orders,
    #[sea_orm(string_value = "deliveries")]
    Deliveries,
    #[sea_orm(string_value = "inventory")]
    Inventory,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Display,
    EnumString, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StatPeriod {
    #[sea_orm(string_value = "daily")]
    Daily,
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "dashboard_stats")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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

/// Period-over-period change in percent, rounded to two places.
/// A zero previous value yields zero rather than an infinite change.
pub fn percentage_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    ((current - previous) / previous * Decimal::ONE_HUNDRED).round_dp(2)
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    /// Recomputes `percentage_change` from the current and previous values.
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if let (Some(current), Some(previous)) = (
            super::active_value(&self.current_value),
            super::active_value(&self.previous_value),
        ) {
            self.percentage_change = sea_orm::Set(percentage_change(current, previous));
        }
        self.updated_at = sea_orm::Set(Utc::now());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn percentage_change_handles_zero_previous() {
        assert_eq!(percentage_change(dec!(50), dec!(0)), Decimal::ZERO);
    }

    #[test]
    fn percentage_change_rounds_to_two_places() {
        assert_eq!(percentage_change(dec!(150), dec!(100)), dec!(50));
        assert_eq!(percentage_change(dec!(50), dec!(100)), dec!(-50));
        assert_eq!(percentage_change(dec!(2), dec!(3)), dec!(-33.33));
    }
}
