// Catalog
pub mod categories;
pub mod products;
pub mod stores;
pub mod suppliers;

// Stock
pub mod expiry;
pub mod inventory;

// Sales and fulfillment
pub mod deliveries;
pub mod orders;
pub mod receipts;

// Reporting
pub mod activity;
pub mod dashboard;

// Accounts
pub mod users;

use uuid::Uuid;

/// Human-readable identifier: `prefix`, a dash and eight uppercase hex digits.
pub(crate) fn short_reference(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, id[..8].to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_reference_shape() {
        let reference = short_reference("ORD");
        assert_eq!(reference.len(), 12);
        assert!(reference.starts_with("ORD-"));
        assert!(reference[4..]
            .chars()
            .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    }
}
