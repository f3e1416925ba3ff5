//! Property-based tests for numbering, line amounts and input checks.

use bizdesk_api::{
    errors::ServiceError,
    services::{
        attachments::check_stored_name,
        document_writer::line_total,
        numbering::{format_number, next_in_sequence, parse_suffix, prefix_for, MAX_SEQUENCE},
        vehicles::normalize_vin,
    },
};
use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (1990i32..2100, 1u32..=12, 1u32..=28)
        .prop_map(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn kind_prefix_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("PR"),
        Just("PO"),
        Just("INV"),
        Just("RC"),
        Just("BN"),
        Just("PV"),
        Just("JO"),
        Just("RT"),
        Just("AS"),
    ]
}

fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..100_000, 0u32..=4).prop_map(|(units, scale)| Decimal::new(units, scale))
}

fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..10_000_000, 0u32..=2).prop_map(|(units, scale)| Decimal::new(units, scale))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn prefix_has_fixed_shape(kind in kind_prefix_strategy(), date in date_strategy()) {
        let prefix = prefix_for(kind, date);
        prop_assert!(prefix.starts_with(kind));
        prop_assert!(prefix.ends_with('-'));
        prop_assert_eq!(prefix.len(), kind.len() + 8);
        prop_assert_eq!(&prefix[kind.len() + 1..kind.len() + 5], date.format("%Y").to_string());
    }

    #[test]
    fn next_number_is_one_past_the_last(
        kind in kind_prefix_strategy(),
        date in date_strategy(),
        current in 1u32..MAX_SEQUENCE,
    ) {
        let prefix = prefix_for(kind, date);
        let last = format_number(&prefix, current);
        let next = next_in_sequence(&prefix, Some(&last)).unwrap();
        prop_assert!(next.starts_with(&prefix));
        prop_assert_eq!(parse_suffix(&next), Some(current + 1));
        prop_assert_eq!(next.len(), last.len());
    }

    #[test]
    fn text_order_matches_numeric_order(a in 1u32..=MAX_SEQUENCE, b in 1u32..=MAX_SEQUENCE) {
        let prefix = "BN-202403-";
        let (x, y) = (format_number(prefix, a), format_number(prefix, b));
        prop_assert_eq!(x.cmp(&y), a.cmp(&b));
    }

    #[test]
    fn non_digit_suffixes_do_not_parse(suffix in "[0-9]{0,3}[A-Za-z ._][0-9A-Za-z]{0,3}") {
        let number = format!("INV-202403-{}", suffix);
        prop_assert_eq!(parse_suffix(&number), None);
        let is_internal = matches!(
            next_in_sequence("INV-202403-", Some(&number)),
            Err(ServiceError::InternalError(_))
        );
        prop_assert!(is_internal);
    }

    #[test]
    fn line_totals_are_exact_products(
        quantity in quantity_strategy(),
        price in price_strategy(),
    ) {
        let total = line_total(quantity, price).unwrap();
        prop_assert_eq!(total, quantity * price);
        prop_assert!(total.scale() <= 6, "{} x {} -> {}", quantity, price, total);
    }

    #[test]
    fn oversized_lines_are_rejected(quantity in 100_000i64..1_000_000, price in 100_000i64..1_000_000) {
        let result = line_total(Decimal::from(quantity), Decimal::from(price));
        prop_assert!(matches!(result, Err(ServiceError::ValidationError(_))));
    }

    #[test]
    fn names_with_separators_are_rejected(
        head in "[a-z0-9]{0,8}",
        sep in prop_oneof![Just("/"), Just("\\"), Just("/../"), Just("\0")],
        tail in "[a-z0-9]{0,8}",
    ) {
        let name = format!("{}{}{}", head, sep, tail);
        prop_assert!(check_stored_name(&name).is_err(), "accepted {:?}", name);
    }

    #[test]
    fn dot_names_are_rejected(rest in "[.a-z0-9]{0,12}") {
        let name = format!(".{}", rest);
        prop_assert!(check_stored_name(&name).is_err());
    }

    #[test]
    fn vin_case_is_normalized(vin in "[A-HJ-NPR-Z0-9]{17}") {
        prop_assert_eq!(normalize_vin(&vin.to_lowercase()).unwrap(), vin.clone());
        prop_assert_eq!(normalize_vin(&format!("  {}  ", vin)).unwrap(), vin);
    }
}

#[test]
fn sequence_stops_at_9999() {
    let result = next_in_sequence("JO-202401-", Some("JO-202401-9999"));
    assert!(matches!(result, Err(ServiceError::Conflict(_))));
    assert_eq!(
        next_in_sequence("JO-202401-", None).unwrap(),
        "JO-202401-0001"
    );
}
