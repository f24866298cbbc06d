//! Property-based tests for the stock, money and dashboard arithmetic.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{Days, NaiveDate};
use k_to_drinks_api::{
    entities::{dashboard_stat::percentage_change, inventory_transaction::TransactionType},
    services::{dashboard::ChartPeriod, deliveries::decode_signature, orders::OrderTotals},
};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn transaction_type_strategy() -> impl Strategy<Value = TransactionType> {
    prop_oneof![
        Just(TransactionType::In),
        Just(TransactionType::Out),
        Just(TransactionType::Adjustment),
    ]
}

fn money_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0u64..20_000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(1990, 1, 1)
            .and_then(|d| d.checked_add_days(Days::new(offset)))
            .unwrap_or_default()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    #[test]
    fn stock_never_goes_negative(
        kind in transaction_type_strategy(),
        current in 0i32..100_000,
        quantity in -100_000i32..100_000,
    ) {
        prop_assert!(kind.apply(current, quantity) >= 0);
    }

    #[test]
    fn stock_in_adds_and_out_subtracts(current in 0i32..100_000, quantity in 0i32..100_000) {
        prop_assert_eq!(TransactionType::In.apply(current, quantity), current + quantity);
        prop_assert_eq!(
            TransactionType::Out.apply(current, quantity),
            (current - quantity).max(0)
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn order_total_is_subtotal_plus_rounded_tax(
        lines in prop::collection::vec(money_strategy(), 0..20),
    ) {
        let totals = OrderTotals::from_line_totals(lines.iter().copied(), dec!(0.02));
        let subtotal: Decimal = lines.iter().copied().sum();

        prop_assert_eq!(totals.subtotal, subtotal);
        prop_assert_eq!(totals.total, totals.subtotal + totals.tax);
        prop_assert!(totals.tax.scale() <= 2);
        prop_assert!((totals.tax - subtotal * dec!(0.02)).abs() <= dec!(0.005));
    }

    #[test]
    fn percentage_change_is_zero_without_a_baseline(current in money_strategy()) {
        prop_assert_eq!(percentage_change(current, Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn percentage_change_sign_follows_direction(
        current in money_strategy(),
        previous in (1i64..10_000_000).prop_map(|c| Decimal::new(c, 2)),
    ) {
        let change = percentage_change(current, previous);
        if current > previous {
            prop_assert!(change >= Decimal::ZERO);
        } else if current < previous {
            prop_assert!(change <= Decimal::ZERO);
        } else {
            prop_assert_eq!(change, Decimal::ZERO);
        }
        prop_assert!(change.scale() <= 2);
    }

    #[test]
    fn chart_buckets_end_with_today(today in date_strategy()) {
        for (period, count) in [
            (ChartPeriod::Week, 7),
            (ChartPeriod::Month, 30),
            (ChartPeriod::Year, 12),
        ] {
            let buckets = period.buckets(today);
            prop_assert_eq!(buckets.len(), count);
            prop_assert_eq!(buckets.last(), Some(&period.label(today)));
            prop_assert_eq!(buckets.first(), Some(&period.label(period.first_day(today))));
            let mut sorted = buckets.clone();
            sorted.sort();
            sorted.dedup();
            prop_assert_eq!(sorted, buckets);
        }
    }

    #[test]
    fn signatures_decode_with_or_without_data_url(bytes in prop::collection::vec(any::<u8>(), 1..256)) {
        let encoded = STANDARD.encode(&bytes);
        prop_assert_eq!(decode_signature(&encoded).ok(), Some(bytes.clone()));
        let data_url = format!("data:image/png;base64,{}", encoded);
        prop_assert_eq!(decode_signature(&data_url).ok(), Some(bytes));
    }
}
