use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Weekday on which a store receives its deliveries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Display,
    EnumString, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum DeliveryDay {
    #[sea_orm(string_value = "Monday")]
    Monday,
    #[sea_orm(string_value = "Tuesday")]
    Tuesday,
    #[sea_orm(string_value = "Wednesday")]
    Wednesday,
    #[sea_orm(string_value = "Thursday")]
    Thursday,
    #[sea_orm(string_value = "Friday")]
    Friday,
    #[sea_orm(string_value = "Saturday")]
    Saturday,
    #[sea_orm(string_value = "Sunday")]
    Sunday,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stores")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub location: String,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub owner_name: String,
    pub email: Option<String>,
    pub number: String,
    pub day: DeliveryDay,
    pub is_archived: bool,
    /// When the store was last archived; `None` while active
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
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
