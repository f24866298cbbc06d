/*!
 * # Role-Based Access Control (RBAC) Module
 *
 * Maps the three account roles onto the permissions embedded in access tokens.
 */

use lazy_static::lazy_static;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;

/// Role definition with associated permissions
#[derive(Debug, Clone)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub permissions: Vec<String>,
}

lazy_static! {
    pub static ref ROLES: HashMap<String, Role> = {
        let mut roles = HashMap::new();

        roles.insert(
            "admin".to_string(),
            Role {
                name: "admin".to_string(),
                description: "Administrator with full access".to_string(),
                permissions: vec!["*".to_string()],
            },
        );

        roles.insert(
            "manager".to_string(),
            Role {
                name: "manager".to_string(),
                description: "Runs day-to-day operations".to_string(),
                permissions: vec![
                    "stores:*".to_string(),
                    "categories:*".to_string(),
                    "suppliers:*".to_string(),
                    "products:*".to_string(),
                    "inventory:*".to_string(),
                    "expiry:*".to_string(),
                    "orders:*".to_string(),
                    "deliveries:*".to_string(),
                    "dashboard:*".to_string(),
                    "users:read".to_string(),
                ],
            },
        );

        roles.insert(
            "delivery_driver".to_string(),
            Role {
                name: "delivery_driver".to_string(),
                description: "Drives delivery routes".to_string(),
                permissions: vec![
                    "stores:read".to_string(),
                    "categories:read".to_string(),
                    "products:read".to_string(),
                    "inventory:read".to_string(),
                    "orders:read".to_string(),
                    "deliveries:read".to_string(),
                    "deliveries:update".to_string(),
                    "dashboard:read".to_string(),
                    "users:read".to_string(),
                ],
            },
        );

        roles
    };
}

/// Get all permissions for a role
pub fn permissions_for_role(role_name: &str) -> Vec<String> {
    match ROLES.get(role_name) {
        Some(role) => role.permissions.clone(),
        None => {
            warn!("Role not found: {}", role_name);
            vec![]
        }
    }
}

/// Union of the permissions of several roles, sorted and deduplicated
pub fn permissions_for_roles(role_names: &[String]) -> Vec<String> {
    role_names
        .iter()
        .flat_map(|name| permissions_for_role(name))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Check if a granted permission covers a required one.
/// `resource:*` covers every action on the resource; `*` covers everything.
pub fn check_permission(user_permission: &str, required_permission: &str) -> bool {
    if user_permission == "*" || user_permission == required_permission {
        return true;
    }

    if let Some(resource) = user_permission.strip_suffix(":*") {
        return required_permission
            .split_once(':')
            .map(|(required_resource, _)| required_resource == resource)
            .unwrap_or(false);
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("orders:*", "orders:read", true)]
    #[case("orders:*", "ordersx:read", false)]
    #[case("orders:read", "orders:read", true)]
    #[case("orders:read", "orders:update", false)]
    #[case("*", "users:manage", true)]
    fn wildcard_matching(#[case] granted: &str, #[case] required: &str, #[case] ok: bool) {
        assert_eq!(check_permission(granted, required), ok);
    }

    #[test]
    fn driver_cannot_create_orders() {
        let perms = permissions_for_role("delivery_driver");
        assert!(perms.iter().any(|p| check_permission(p, "deliveries:update")));
        assert!(!perms.iter().any(|p| check_permission(p, "orders:create")));
    }

    #[test]
    fn unknown_role_has_no_permissions() {
        assert!(permissions_for_role("ghost").is_empty());
    }

    #[test]
    fn role_union_is_deduplicated() {
        let perms =
            permissions_for_roles(&["manager".to_string(), "delivery_driver".to_string()]);
        let reads = perms.iter().filter(|p| *p == "users:read").count();
        assert_eq!(reads, 1);
    }
}
