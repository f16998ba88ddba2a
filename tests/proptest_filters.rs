//! Property-based tests using proptest
//!
//! These tests verify filter classification and per-resource aggregation
//! using randomized inputs.

use azure_carbon::carbon::aggregate::{group_by_resource, CarbonResourceItem};
use azure_carbon::carbon::filter::{classify, Dimension, FilterTree, PredicateKind};
use azure_carbon::carbon::request::EmissionRecord;
use proptest::prelude::*;
use std::collections::{BTreeMap, HashSet};

/// Generate a filter value (no separators)
fn arb_value() -> impl Strategy<Value = String> {
    "[a-z0-9./_-]{1,20}"
}

/// Generate a tag key that is never a dimension name
fn arb_tag_name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,15}".prop_filter("must not be a dimension", |name| {
        Dimension::from_name(name).is_none()
    })
}

fn arb_dimension() -> impl Strategy<Value = Dimension> {
    prop::sample::select(Dimension::ALL.to_vec())
}

/// Generate emission-derived items over a small id space so groups form
fn arb_item() -> impl Strategy<Value = CarbonResourceItem> {
    (
        prop_oneof!["/r/a", "/r/b", "/r/c", "/r/d"],
        0u32..1000,
        prop_oneof!["westeurope", "eastus", "japaneast"],
    )
        .prop_map(|(id, carbon, location)| {
            let record = EmissionRecord {
                subscription_id: "sub".to_string(),
                resource_id: id.to_string(),
                resource_type: "microsoft.web/sites".to_string(),
                resource_group: "rg".to_string(),
                total_carbon_emission: f64::from(carbon),
            };
            CarbonResourceItem {
                resource_location: location.to_string(),
                ..CarbonResourceItem::from_record(record, None)
            }
        })
}

/// Totals and sorted location lists per resource id
fn summarize(items: &[CarbonResourceItem]) -> BTreeMap<String, (f64, Vec<String>)> {
    items
        .iter()
        .map(|item| {
            let mut locations: Vec<String> = item
                .resource_location
                .split(", ")
                .map(str::to_string)
                .collect();
            locations.sort();
            (item.resource_id.clone(), (item.carbon, locations))
        })
        .collect()
}

proptest! {
    /// Known dimension names classify as dimensions, values in order
    #[test]
    fn dimension_filters_keep_values(
        dimension in arb_dimension(),
        values in prop::collection::vec(arb_value(), 1..6)
    ) {
        let expression = format!("{}={}", dimension, values.join(";"));
        let tree = classify(&[expression]).unwrap();

        let Some(FilterTree::Predicate(predicate)) = tree else {
            panic!("expected a single predicate");
        };
        prop_assert_eq!(predicate.kind, PredicateKind::Dimension);
        prop_assert_eq!(predicate.name, dimension.as_str());
        prop_assert_eq!(predicate.values, values);
    }

    /// Any other name is a tag filter
    #[test]
    fn unknown_names_are_tags(
        name in arb_tag_name(),
        values in prop::collection::vec(arb_value(), 1..6)
    ) {
        let predicate = classify(&[format!("{}={}", name, values.join(";"))])
            .unwrap()
            .and_then(|tree| tree.predicates().first().cloned())
            .unwrap();

        prop_assert_eq!(predicate.kind, PredicateKind::Tag);
        prop_assert_eq!(predicate.name, name);
    }

    /// Several expressions form one AND in input order
    #[test]
    fn multiple_filters_are_anded(names in prop::collection::vec(arb_tag_name(), 2..6)) {
        let expressions: Vec<String> = names.iter().map(|n| format!("{}=x", n)).collect();
        let tree = classify(&expressions).unwrap().unwrap();

        prop_assert!(matches!(tree, FilterTree::And(_)));
        let classified: Vec<&str> = tree.predicates().iter().map(|p| p.name.as_str()).collect();
        let expected: Vec<&str> = names.iter().map(String::as_str).collect();
        prop_assert_eq!(classified, expected);
    }

    /// Expressions without '=' are rejected
    #[test]
    fn missing_separator_is_rejected(name in "[a-zA-Z]{1,20}") {
        prop_assert!(classify(&[name]).is_err());
    }

    /// Input order does not change totals or location lists
    #[test]
    fn aggregation_ignores_input_order(
        (items, shuffled) in prop::collection::vec(arb_item(), 0..40)
            .prop_flat_map(|items| (Just(items.clone()), Just(items).prop_shuffle()))
    ) {
        let a = summarize(&group_by_resource(items));
        let b = summarize(&group_by_resource(shuffled));
        prop_assert_eq!(a, b);
    }

    /// Output ids are unique and total carbon is preserved
    #[test]
    fn aggregation_preserves_total(items in prop::collection::vec(arb_item(), 0..40)) {
        let total: f64 = items.iter().map(|i| i.carbon).sum();
        let distinct: HashSet<&str> = items.iter().map(|i| i.resource_id.as_str()).collect();
        let expected_len = distinct.len();

        let grouped = group_by_resource(items.clone());
        let grouped_total: f64 = grouped.iter().map(|i| i.carbon).sum();
        let ids: HashSet<&str> = grouped.iter().map(|i| i.resource_id.as_str()).collect();

        prop_assert_eq!(grouped.len(), expected_len);
        prop_assert_eq!(ids.len(), expected_len);
        prop_assert_eq!(grouped_total, total);
    }

    /// Grouping already-grouped items changes nothing
    #[test]
    fn aggregation_is_idempotent(items in prop::collection::vec(arb_item(), 0..40)) {
        let once = group_by_resource(items);
        let twice = group_by_resource(once.clone());
        prop_assert_eq!(once, twice);
    }
}
