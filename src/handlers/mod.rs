pub mod categories;
pub mod common;
pub mod dashboard;
pub mod deliveries;
pub mod expiry;
pub mod health;
pub mod inventory;
pub mod orders;
pub mod products;
pub mod stores;
pub mod suppliers;
pub mod users;

use crate::{config::AppConfig, db::DbPool, services};
use rust_decimal::{prelude::FromPrimitive, Decimal};
use rust_decimal_macros::dec;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub stores: Arc<services::stores::StoreService>,
    pub categories: Arc<services::categories::CategoryService>,
    pub suppliers: Arc<services::suppliers::SupplierService>,
    pub products: Arc<services::products::ProductService>,
    pub inventory: Arc<services::inventory::InventoryService>,
    pub expiry: Arc<services::expiry::ExpiryService>,
    pub orders: Arc<services::orders::OrderService>,
    pub deliveries: Arc<services::deliveries::DeliveryService>,
    pub dashboard: Arc<services::dashboard::DashboardService>,
    pub users: Arc<services::users::UserService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, config: &AppConfig) -> Self {
        let tax_rate = Decimal::from_f64(config.default_tax_rate)
            .map(|rate| rate.round_dp(4))
            .unwrap_or(dec!(0.02));

        Self {
            stores: Arc::new(services::stores::StoreService::new(db_pool.clone())),
            categories: Arc::new(services::categories::CategoryService::new(db_pool.clone())),
            suppliers: Arc::new(services::suppliers::SupplierService::new(db_pool.clone())),
            products: Arc::new(services::products::ProductService::new(db_pool.clone())),
            inventory: Arc::new(services::inventory::InventoryService::new(db_pool.clone())),
            expiry: Arc::new(services::expiry::ExpiryService::new(db_pool.clone())),
            orders: Arc::new(services::orders::OrderService::new(db_pool.clone(), tax_rate)),
            deliveries: Arc::new(services::deliveries::DeliveryService::new(
                db_pool.clone(),
                config.media_root.clone(),
            )),
            dashboard: Arc::new(services::dashboard::DashboardService::new(db_pool.clone())),
            users: Arc::new(services::users::UserService::new(db_pool)),
        }
    }
}
