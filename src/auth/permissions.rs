/*!
 * # Permissions Module
 *
 * Permissions are `resource:action` strings carried in the access token.
 */

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const UPDATE: &'static str = "update";
    pub const DELETE: &'static str = "delete";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const STORES: &'static str = "stores";
    pub const CATEGORIES: &'static str = "categories";
    pub const SUPPLIERS: &'static str = "suppliers";
    pub const PRODUCTS: &'static str = "products";
    pub const INVENTORY: &'static str = "inventory";
    pub const EXPIRY: &'static str = "expiry";
    pub const ORDERS: &'static str = "orders";
    pub const DELIVERIES: &'static str = "deliveries";
    pub const DASHBOARD: &'static str = "dashboard";
    pub const USERS: &'static str = "users";
}

/// Build a permission string from its parts.
pub fn permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Common permission string constants for compile-time safety
pub mod consts {
    pub const STORES_READ: &str = "stores:read";
    pub const STORES_CREATE: &str = "stores:create";
    pub const STORES_UPDATE: &str = "stores:update";
    pub const STORES_DELETE: &str = "stores:delete";

    pub const CATEGORIES_READ: &str = "categories:read";
    pub const CATEGORIES_WRITE: &str = "categories:write";

    pub const SUPPLIERS_READ: &str = "suppliers:read";
    pub const SUPPLIERS_WRITE: &str = "suppliers:write";

    pub const PRODUCTS_READ: &str = "products:read";
    pub const PRODUCTS_CREATE: &str = "products:create";
    pub const PRODUCTS_UPDATE: &str = "products:update";
    pub const PRODUCTS_DELETE: &str = "products:delete";

    pub const INVENTORY_READ: &str = "inventory:read";
    pub const INVENTORY_ADJUST: &str = "inventory:adjust";

    pub const EXPIRY_READ: &str = "expiry:read";
    pub const EXPIRY_WRITE: &str = "expiry:write";

    pub const ORDERS_READ: &str = "orders:read";
    pub const ORDERS_CREATE: &str = "orders:create";
    pub const ORDERS_UPDATE: &str = "orders:update";
    pub const ORDERS_DELETE: &str = "orders:delete";

    pub const DELIVERIES_READ: &str = "deliveries:read";
    pub const DELIVERIES_CREATE: &str = "deliveries:create";
    pub const DELIVERIES_UPDATE: &str = "deliveries:update";
    pub const DELIVERIES_DELETE: &str = "deliveries:delete";

    pub const DASHBOARD_READ: &str = "dashboard:read";
    pub const DASHBOARD_MANAGE: &str = "dashboard:manage";

    pub const USERS_READ: &str = "users:read";
    pub const USERS_MANAGE: &str = "users:manage";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_builder_matches_constants() {
        assert_eq!(
            permission(Resources::ORDERS, Actions::READ),
            consts::ORDERS_READ
        );
        assert_eq!(
            permission(Resources::STORES, Actions::DELETE),
            consts::STORES_DELETE
        );
        assert_eq!(permission(Resources::USERS, Actions::ALL), "users:*");
    }
}
