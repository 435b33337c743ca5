#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;
use std::collections::HashSet;
use warden_core::errors::WardenError;
use warden_core::{plan_update, Resource, TcpTarget};

const PATHS: [&str; 8] = [
    "ScopeId",
    "scope_id",
    "Name",
    "NAME",
    "Description",
    "description",
    "DefaultPort",
    "default_port",
];

fn column_of(path: &str) -> &'static str {
    TcpTarget::field_spec(path).unwrap().column
}

fn path_list() -> impl Strategy<Value = Vec<&'static str>> {
    prop::collection::vec(prop::sample::select(PATHS.to_vec()), 0..6)
}

fn proposed() -> impl Strategy<Value = TcpTarget> {
    ("[a-z]{0,8}", "[a-z]{0,8}", any::<u32>()).prop_map(|(name, description, port)| {
        TcpTarget::new("o_1", name)
            .unwrap()
            .with_description(description)
            .with_default_port(port)
    })
}

proptest! {
    #[test]
    fn plan_covers_exactly_the_named_fields(
        target in proposed(),
        mask in path_list(),
        nulls in path_list(),
    ) {
        let mask_cols: HashSet<_> = mask.iter().map(|p| column_of(p)).collect();
        let null_cols: HashSet<_> = nulls.iter().map(|p| column_of(p)).collect();

        match plan_update(&target, &mask, &nulls) {
            Ok(plan) => {
                let planned: HashSet<_> =
                    plan.assignments().iter().map(|a| a.field.column).collect();
                let named: HashSet<_> = mask_cols.union(&null_cols).copied().collect();
                prop_assert_eq!(planned, named);
                prop_assert_eq!(plan.len(), mask_cols.len() + null_cols.len());
                for a in plan.assignments() {
                    prop_assert_eq!(a.is_null(), null_cols.contains(a.field.column));
                    if let Some(v) = &a.value {
                        prop_assert_eq!(Some(v.clone()), target.field(a.field.column));
                    }
                }
            }
            Err(WardenError::EmptyFieldMask) => {
                prop_assert!(mask.is_empty() && nulls.is_empty());
            }
            Err(WardenError::AmbiguousUpdate { .. }) => {
                prop_assert!(!mask_cols.is_disjoint(&null_cols));
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn applying_a_plan_leaves_unnamed_fields_alone(
        target in proposed(),
        current in proposed(),
        mask in path_list(),
    ) {
        prop_assume!(!mask.is_empty());
        let none: Vec<&str> = Vec::new();
        let plan = plan_update(&target, &mask, &none).unwrap();

        let mut updated = current.clone();
        plan.apply_to(&mut updated).unwrap();

        for spec in TcpTarget::fields() {
            let expected = if plan.touches(spec.column) {
                target.field(spec.column)
            } else {
                current.field(spec.column)
            };
            prop_assert_eq!(updated.field(spec.column), expected);
        }
    }
}
