use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Display,
    EnumString, ToSchema, Default,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DeliveryStatus {
    #[default]
    #[sea_orm(string_value = "pending")]
    #[serde(rename = "pending")]
    #[strum(serialize = "pending")]
    Pending,
    #[sea_orm(string_value = "in-transit")]
    #[serde(rename = "in-transit")]
    #[strum(serialize = "in-transit")]
    InTransit,
    #[sea_orm(string_value = "delivered")]
    #[serde(rename = "delivered")]
    #[strum(serialize = "delivered")]
    Delivered,
    #[sea_orm(string_value = "cancelled")]
    #[serde(rename = "cancelled")]
    #[strum(serialize = "cancelled")]
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "deliveries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Human-readable number, `DEL-` followed by eight hex digits.
    #[sea_orm(unique)]
    pub delivery_id: String,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub employee_id: Option<Uuid>,
    pub status: DeliveryStatus,
    pub delivery_date: NaiveDate,
    pub delivery_time: NaiveTime,
    pub notes: Option<String>,
    pub has_signature: bool,
    pub signature_path: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::EmployeeId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    Employee,
    #[sea_orm(has_many = "super::delivery_status_update::Entity")]
    StatusUpdates,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Employee.def()
    }
}

impl Related<super::delivery_status_update::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusUpdates.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        self.updated_at = sea_orm::Set(Utc::now());
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn in_transit_uses_hyphenated_wire_name() {
        assert_eq!(DeliveryStatus::InTransit.to_string(), "in-transit");
        assert_eq!(
            DeliveryStatus::from_str("in-transit").unwrap(),
            DeliveryStatus::InTransit
        );
        assert_eq!(
            serde_json::to_string(&DeliveryStatus::InTransit).unwrap(),
            "\"in-transit\""
        );
    }
}
