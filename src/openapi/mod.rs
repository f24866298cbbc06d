use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "K-TO Drinks API",
        version = "1.0.0",
        description = r#"
# K-TO Drinks operations API

Back office for a beverage distributor: retail stores, the product catalog,
stock levels and expiry tracking, store orders with printable receipts, and
delivery runs with signature capture.

## Authentication

Obtain a token pair from `POST /api/v1/auth/token` and send the access token
on every other `/api/v1` request:

```
Authorization: Bearer <access-token>
```

## Pagination

List endpoints accept `page` (default 1) and `limit` (default 20, max 100)
and answer with `{items, total, page, limit, total_pages}`.
        "#
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development")
    ),
    tags(
        (name = "auth", description = "Token issue, refresh and logout"),
        (name = "users", description = "Accounts and profiles"),
        (name = "stores", description = "Retail stores"),
        (name = "categories", description = "Product categories"),
        (name = "suppliers", description = "Suppliers"),
        (name = "products", description = "Product catalog"),
        (name = "inventory", description = "Stock levels and transactions"),
        (name = "product-expiry", description = "Batch expiry tracking"),
        (name = "orders", description = "Store orders, receipts and PDFs"),
        (name = "deliveries", description = "Deliveries, status history, signatures and routes"),
        (name = "dashboard", description = "Aggregates, charts and stat cards"),
        (name = "health", description = "Service health")
    ),
    paths(
        crate::auth::login_handler,
        crate::auth::refresh_token_handler,
        crate::auth::logout_handler,

        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::delete_user,
        crate::handlers::users::archive_user,
        crate::handlers::users::get_profile,
        crate::handlers::users::update_profile,
        crate::handlers::users::change_password,

        crate::handlers::stores::list_stores,
        crate::handlers::stores::get_store,
        crate::handlers::stores::create_store,
        crate::handlers::stores::update_store,
        crate::handlers::stores::archive_store,
        crate::handlers::stores::delete_store,

        crate::handlers::categories::list_categories,
        crate::handlers::categories::get_category,
        crate::handlers::categories::create_category,
        crate::handlers::categories::update_category,
        crate::handlers::categories::delete_category,

        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::get_supplier,
        crate::handlers::suppliers::create_supplier,
        crate::handlers::suppliers::update_supplier,
        crate::handlers::suppliers::delete_supplier,

        crate::handlers::products::list_products,
        crate::handlers::products::get_product,
        crate::handlers::products::create_product,
        crate::handlers::products::update_product,
        crate::handlers::products::delete_product,

        crate::handlers::inventory::list_inventory,
        crate::handlers::inventory::get_inventory,
        crate::handlers::inventory::low_stock,
        crate::handlers::inventory::adjust_inventory,
        crate::handlers::inventory::list_transactions,
        crate::handlers::inventory::get_transaction,
        crate::handlers::inventory::create_transaction,

        crate::handlers::expiry::list_expiries,
        crate::handlers::expiry::expiring_soon,
        crate::handlers::expiry::get_expiry,
        crate::handlers::expiry::create_expiry,
        crate::handlers::expiry::update_expiry,
        crate::handlers::expiry::delete_expiry,

        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::list_order_items,
        crate::handlers::orders::add_order_item,
        crate::handlers::orders::update_order_item,
        crate::handlers::orders::delete_order_item,
        crate::handlers::orders::order_receipt,
        crate::handlers::orders::order_pdf,

        crate::handlers::deliveries::list_deliveries,
        crate::handlers::deliveries::delivery_routes,
        crate::handlers::deliveries::get_delivery,
        crate::handlers::deliveries::create_delivery,
        crate::handlers::deliveries::update_delivery,
        crate::handlers::deliveries::delete_delivery,
        crate::handlers::deliveries::update_delivery_status,
        crate::handlers::deliveries::delivery_status_updates,
        crate::handlers::deliveries::upload_signature,

        crate::handlers::dashboard::dashboard_summary,
        crate::handlers::dashboard::sales_chart,
        crate::handlers::dashboard::delivery_chart,
        crate::handlers::dashboard::inventory_alerts,
        crate::handlers::dashboard::recent_activities,
        crate::handlers::dashboard::list_stats,
        crate::handlers::dashboard::create_stat,
        crate::handlers::dashboard::update_stat,
        crate::handlers::dashboard::delete_stat,

        crate::handlers::health::health_check,
        crate::handlers::health::liveness_check,
    ),
    components(
        schemas(
            crate::errors::ErrorResponse,
            crate::handlers::common::ArchiveRequest,
            crate::entities::store::DeliveryDay,
            crate::entities::order::OrderStatus,
            crate::entities::delivery::DeliveryStatus,
            crate::entities::inventory_transaction::TransactionType,
            crate::entities::user::UserRole,
            crate::entities::user::UserStatus,
            crate::entities::dashboard_stat::StatType,
            crate::entities::dashboard_stat::StatPeriod,
            crate::entities::recent_activity::ActivityType,
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("K-TO Drinks API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/deliveries/routes"));
        assert!(json.contains("/api/v1/auth/token"));
    }
}
