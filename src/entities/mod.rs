pub mod category;
pub mod dashboard_stat;
pub mod delivery;
pub mod delivery_status_update;
pub mod inventory;
pub mod inventory_transaction;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_expiry;
pub mod recent_activity;
pub mod refresh_token;
pub mod store;
pub mod supplier;
pub mod user;
pub mod user_profile;

use sea_orm::ActiveValue;

/// Value held by an active model field, if it was loaded or set.
pub(crate) fn active_value<V>(value: &ActiveValue<V>) -> Option<V>
where
    V: Clone + Into<sea_orm::Value>,
{
    match value {
        ActiveValue::Set(v) | ActiveValue::Unchanged(v) => Some(v.clone()),
        ActiveValue::NotSet => None,
    }
}
