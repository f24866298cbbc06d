//! K-TO Drinks operations API
//!
//! Stores, products, stock, orders and deliveries for a beverage distributor,
//! served as a JWT-protected REST API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    http::StatusCode,
    response::Json,
    routing::{delete, get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthRouterExt, AuthService};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub services: handlers::AppServices,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: config::AppConfig) -> Self {
        let services = handlers::AppServices::new(db.clone(), &config);
        Self {
            db,
            config,
            services,
        }
    }

    pub fn store_service(&self) -> Arc<services::stores::StoreService> {
        self.services.stores.clone()
    }

    pub fn category_service(&self) -> Arc<services::categories::CategoryService> {
        self.services.categories.clone()
    }

    pub fn supplier_service(&self) -> Arc<services::suppliers::SupplierService> {
        self.services.suppliers.clone()
    }

    pub fn product_service(&self) -> Arc<services::products::ProductService> {
        self.services.products.clone()
    }

    pub fn inventory_service(&self) -> Arc<services::inventory::InventoryService> {
        self.services.inventory.clone()
    }

    pub fn expiry_service(&self) -> Arc<services::expiry::ExpiryService> {
        self.services.expiry.clone()
    }

    pub fn order_service(&self) -> Arc<services::orders::OrderService> {
        self.services.orders.clone()
    }

    pub fn delivery_service(&self) -> Arc<services::deliveries::DeliveryService> {
        self.services.deliveries.clone()
    }

    pub fn dashboard_service(&self) -> Arc<services::dashboard::DashboardService> {
        self.services.dashboard.clone()
    }

    pub fn user_service(&self) -> Arc<services::users::UserService> {
        self.services.users.clone()
    }
}

/// Envelope of every successful JSON response.
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// One page of a list endpoint. `page` is 1-based.
#[derive(Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_envelope_carries_request_metadata() {
        let response = crate::tracing::scope_request_id(
            crate::tracing::RequestId::new("req-receipt-9"),
            async { ApiResponse::success(vec![1, 2, 3]) },
        )
        .await;

        assert!(response.success);
        let meta = response.meta.expect("meta");
        assert_eq!(meta.request_id.as_deref(), Some("req-receipt-9"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("rfc3339 timestamp");
    }

    #[test]
    fn message_is_omitted_unless_set() {
        let plain = serde_json::to_value(ApiResponse::success(1)).unwrap();
        assert!(plain.get("message").is_none());

        let noted =
            serde_json::to_value(ApiResponse::success(1).with_message("User archived")).unwrap();
        assert_eq!(noted["message"], "User archived");
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

/// Result of create endpoints, answered with 201
pub type ApiCreated<T> = Result<(StatusCode, Json<ApiResponse<T>>), errors::ServiceError>;

fn catalog_routes() -> Router<AppState> {
    use handlers::{categories, products, stores, suppliers};

    let stores_read = Router::new()
        .route("/stores", get(stores::list_stores))
        .route("/stores/:id", get(stores::get_store))
        .with_permission(perm::STORES_READ);
    let stores_create = Router::new()
        .route("/stores", post(stores::create_store))
        .with_permission(perm::STORES_CREATE);
    let stores_update = Router::new()
        .route("/stores/:id", put(stores::update_store))
        .route("/stores/:id/archive", post(stores::archive_store))
        .with_permission(perm::STORES_UPDATE);
    let stores_delete = Router::new()
        .route("/stores/:id", delete(stores::delete_store))
        .with_permission(perm::STORES_DELETE);

    let categories_read = Router::new()
        .route("/categories", get(categories::list_categories))
        .route("/categories/:id", get(categories::get_category))
        .with_permission(perm::CATEGORIES_READ);
    let categories_write = Router::new()
        .route("/categories", post(categories::create_category))
        .route(
            "/categories/:id",
            put(categories::update_category).delete(categories::delete_category),
        )
        .with_permission(perm::CATEGORIES_WRITE);

    let suppliers_read = Router::new()
        .route("/suppliers", get(suppliers::list_suppliers))
        .route("/suppliers/:id", get(suppliers::get_supplier))
        .with_permission(perm::SUPPLIERS_READ);
    let suppliers_write = Router::new()
        .route("/suppliers", post(suppliers::create_supplier))
        .route(
            "/suppliers/:id",
            put(suppliers::update_supplier).delete(suppliers::delete_supplier),
        )
        .with_permission(perm::SUPPLIERS_WRITE);

    let products_read = Router::new()
        .route("/products", get(products::list_products))
        .route("/products/:id", get(products::get_product))
        .with_permission(perm::PRODUCTS_READ);
    let products_create = Router::new()
        .route("/products", post(products::create_product))
        .with_permission(perm::PRODUCTS_CREATE);
    let products_update = Router::new()
        .route("/products/:id", put(products::update_product))
        .with_permission(perm::PRODUCTS_UPDATE);
    let products_delete = Router::new()
        .route("/products/:id", delete(products::delete_product))
        .with_permission(perm::PRODUCTS_DELETE);

    Router::new()
        .merge(stores_read)
        .merge(stores_create)
        .merge(stores_update)
        .merge(stores_delete)
        .merge(categories_read)
        .merge(categories_write)
        .merge(suppliers_read)
        .merge(suppliers_write)
        .merge(products_read)
        .merge(products_create)
        .merge(products_update)
        .merge(products_delete)
}

fn stock_routes() -> Router<AppState> {
    use handlers::{expiry, inventory};

    let inventory_read = Router::new()
        .route("/inventory", get(inventory::list_inventory))
        .route("/inventory/low-stock", get(inventory::low_stock))
        .route("/inventory/:id", get(inventory::get_inventory))
        .route("/inventory/transactions", get(inventory::list_transactions))
        .route("/inventory/transactions/:id", get(inventory::get_transaction))
        .with_permission(perm::INVENTORY_READ);
    let inventory_adjust = Router::new()
        .route("/inventory/adjust", post(inventory::adjust_inventory))
        .route("/inventory/transactions", post(inventory::create_transaction))
        .with_permission(perm::INVENTORY_ADJUST);

    let expiry_read = Router::new()
        .route("/product-expiry", get(expiry::list_expiries))
        .route("/product-expiry/expiring-soon", get(expiry::expiring_soon))
        .route("/product-expiry/:id", get(expiry::get_expiry))
        .with_permission(perm::EXPIRY_READ);
    let expiry_write = Router::new()
        .route("/product-expiry", post(expiry::create_expiry))
        .route(
            "/product-expiry/:id",
            put(expiry::update_expiry).delete(expiry::delete_expiry),
        )
        .with_permission(perm::EXPIRY_WRITE);

    Router::new()
        .merge(inventory_read)
        .merge(inventory_adjust)
        .merge(expiry_read)
        .merge(expiry_write)
}

fn fulfilment_routes() -> Router<AppState> {
    use handlers::{deliveries, orders};

    let orders_read = Router::new()
        .route("/orders", get(orders::list_orders))
        .route("/orders/:id", get(orders::get_order))
        .route("/orders/:id/items", get(orders::list_order_items))
        .route("/orders/:id/receipt", get(orders::order_receipt))
        .route("/orders/:id/pdf", get(orders::order_pdf))
        .with_permission(perm::ORDERS_READ);
    let orders_create = Router::new()
        .route("/orders", post(orders::create_order))
        .with_permission(perm::ORDERS_CREATE);
    let orders_update = Router::new()
        .route("/orders/:id", put(orders::update_order))
        .route("/orders/:id/items", post(orders::add_order_item))
        .route(
            "/orders/:id/items/:item_id",
            put(orders::update_order_item).delete(orders::delete_order_item),
        )
        .with_permission(perm::ORDERS_UPDATE);
    let orders_delete = Router::new()
        .route("/orders/:id", delete(orders::delete_order))
        .with_permission(perm::ORDERS_DELETE);

    let deliveries_read = Router::new()
        .route("/deliveries", get(deliveries::list_deliveries))
        .route("/deliveries/routes", get(deliveries::delivery_routes))
        .route("/deliveries/:id", get(deliveries::get_delivery))
        .route(
            "/deliveries/:id/status-updates",
            get(deliveries::delivery_status_updates),
        )
        .with_permission(perm::DELIVERIES_READ);
    let deliveries_create = Router::new()
        .route("/deliveries", post(deliveries::create_delivery))
        .with_permission(perm::DELIVERIES_CREATE);
    let deliveries_update = Router::new()
        .route("/deliveries/:id", put(deliveries::update_delivery))
        .route(
            "/deliveries/:id/update-status",
            post(deliveries::update_delivery_status),
        )
        .route("/deliveries/:id/signature", post(deliveries::upload_signature))
        .with_permission(perm::DELIVERIES_UPDATE);
    let deliveries_delete = Router::new()
        .route("/deliveries/:id", delete(deliveries::delete_delivery))
        .with_permission(perm::DELIVERIES_DELETE);

    Router::new()
        .merge(orders_read)
        .merge(orders_create)
        .merge(orders_update)
        .merge(orders_delete)
        .merge(deliveries_read)
        .merge(deliveries_create)
        .merge(deliveries_update)
        .merge(deliveries_delete)
}

fn back_office_routes() -> Router<AppState> {
    use handlers::{dashboard, users};

    let dashboard_read = Router::new()
        .route("/dashboard/summary", get(dashboard::dashboard_summary))
        .route("/dashboard/sales", get(dashboard::sales_chart))
        .route("/dashboard/deliveries", get(dashboard::delivery_chart))
        .route("/dashboard/inventory", get(dashboard::inventory_alerts))
        .route("/dashboard/activities", get(dashboard::recent_activities))
        .route("/dashboard/stats", get(dashboard::list_stats))
        .with_permission(perm::DASHBOARD_READ);
    let dashboard_manage = Router::new()
        .route("/dashboard/stats", post(dashboard::create_stat))
        .route(
            "/dashboard/stats/:id",
            put(dashboard::update_stat).delete(dashboard::delete_stat),
        )
        .with_permission(perm::DASHBOARD_MANAGE);

    // Self-service and self-or-admin routes; ownership is checked in the service.
    let users_self = Router::new()
        .route(
            "/users/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/users/change-password", post(users::change_password))
        .route("/users", get(users::list_users))
        .route(
            "/users/:id",
            get(users::get_user)
                .put(users::update_user)
                .delete(users::delete_user),
        )
        .with_auth();
    let users_manage = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/:id/archive", post(users::archive_user))
        .with_permission(perm::USERS_MANAGE);

    Router::new()
        .merge(dashboard_read)
        .merge(dashboard_manage)
        .merge(users_self)
        .merge(users_manage)
}

/// Everything mounted under `/api/v1` except the auth endpoints.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .merge(catalog_routes())
        .merge(stock_routes())
        .merge(fulfilment_routes())
        .merge(back_office_routes())
}

/// Full application router. HTTP-level layers (CORS, tracing, request id)
/// are added by the binary.
pub fn build_router(state: AppState, auth_service: Arc<AuthService>) -> Router {
    Router::new()
        .route("/", get(root))
        .nest("/health", handlers::health::health_routes())
        .nest("/api/v1", api_v1_routes())
        .with_state(state)
        .nest(
            "/api/v1/auth",
            auth::auth_routes().with_state(auth_service.clone()),
        )
        .merge(openapi::swagger_ui())
        .layer(Extension(auth_service))
}

async fn root() -> Json<Value> {
    Json(json!({
        "name": "K-TO Drinks API",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let status_data = json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git": option_env!("GIT_HASH").unwrap_or("unknown"),
        "build_time": option_env!("BUILD_TIME").unwrap_or("unknown"),
        "service": "k-to-drinks-api",
        "timestamp": Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(status_data)))
}
