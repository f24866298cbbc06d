use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_REORDER_LEVEL: i32 = 10;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// Business-facing product code, unique across the catalogue.
    #[sea_orm(unique)]
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub supplier_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub cost_price: Decimal,
    pub size: String,
    pub barcode: Option<String>,
    pub reorder_level: i32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_low_stock(&self, current_stock: i32) -> bool {
        current_stock <= self.reorder_level
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id"
    )]
    Category,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::SupplierId",
        to = "super::supplier::Column::Id",
        on_delete = "SetNull"
    )]
    Supplier,
    #[sea_orm(has_one = "super::inventory::Entity")]
    Inventory,
    #[sea_orm(has_many = "super::inventory_transaction::Entity")]
    InventoryTransactions,
    #[sea_orm(has_many = "super::product_expiry::Entity")]
    Expiries,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl Related<super::inventory::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Inventory.def()
    }
}

impl Related<super::inventory_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InventoryTransactions.def()
    }
}

impl Related<super::product_expiry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expiries.def()
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
    use rust_decimal_macros::dec;

    fn product(reorder_level: i32) -> Model {
        Model {
            id: Uuid::new_v4(),
            product_id: "P-001".into(),
            name: "Cola".into(),
            description: None,
            category_id: Uuid::new_v4(),
            supplier_id: None,
            unit_price: dec!(10),
            cost_price: dec!(7.5),
            size: "500ml".into(),
            barcode: None,
            reorder_level,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn low_stock_includes_the_reorder_level() {
        let p = product(DEFAULT_REORDER_LEVEL);
        assert!(p.is_low_stock(0));
        assert!(p.is_low_stock(10));
        assert!(!p.is_low_stock(11));
    }
}
