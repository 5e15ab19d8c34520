//! Property-based tests for view field selection
//!
//! Views over a fixed base schema are generated from random include, exclude
//! and optional sets; the derived field list must follow the base order and
//! optional fields must be omittable.

use proptest::prelude::*;
use schema_views::prelude::*;
use serde_json::json;

const FIELDS: [&str; 6] = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];

fn base_registry() -> SchemaRegistry {
    let registry = SchemaRegistry::default();
    let definition = FIELDS
        .iter()
        .fold(SchemaDefinition::new("Base"), |definition, name| {
            definition.field(*name, TypeExpr::Int)
        });
    registry.declare(definition).expect("base should declare");
    registry
}

/// Generate a subset of the base fields as a selection mask
fn arb_mask() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), FIELDS.len())
}

fn select(mask: &[bool]) -> Vec<&'static str> {
    FIELDS
        .iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|(name, _)| *name)
        .collect()
}

/// Generate an include set that is never empty
fn arb_include() -> impl Strategy<Value = Vec<&'static str>> {
    arb_mask()
        .prop_filter("include must name at least one field", |mask| {
            mask.iter().any(|keep| *keep)
        })
        .prop_map(|mask| select(&mask))
}

fn arb_exclude() -> impl Strategy<Value = Vec<&'static str>> {
    arb_mask().prop_map(|mask| select(&mask))
}

proptest! {
    #[test]
    fn prop_include_keeps_base_order(include in arb_include()) {
        let registry = base_registry();
        let view = registry
            .apply_view("Base", ViewSpec::new("Picked").with_include(include.clone()))
            .expect("valid include")
            .schema()
            .cloned()
            .expect("built");

        let names: Vec<_> = view.field_names().collect();
        prop_assert_eq!(names, include);
    }

    #[test]
    fn prop_exclude_removes_named_fields(exclude in arb_exclude()) {
        let registry = base_registry();
        registry
            .apply_view("Base", ViewSpec::new("Dropped").with_exclude(exclude.clone()))
            .expect("valid exclude");
        let view = registry.view("Base", "Dropped").expect("view");

        let expected: Vec<_> = FIELDS
            .iter()
            .copied()
            .filter(|name| !exclude.contains(name))
            .collect();
        let names: Vec<_> = view.field_names().collect();
        prop_assert_eq!(names, expected);
    }

    #[test]
    fn prop_optional_fields_may_be_omitted(optional in arb_exclude()) {
        let registry = base_registry();
        registry
            .apply_view("Base", ViewSpec::new("Loose").with_optional(optional.clone()))
            .expect("valid optional");

        let mut input = serde_json::Map::new();
        for name in FIELDS.iter().filter(|name| !optional.contains(*name)) {
            input.insert((*name).to_string(), json!(1));
        }
        let record = registry
            .construct("BaseLoose", serde_json::Value::Object(input))
            .expect("required fields supplied");

        for name in FIELDS {
            if optional.contains(&name) {
                prop_assert_eq!(record.get(name), Some(Value::Null));
                prop_assert!(!record.fields_set().contains(name));
            } else {
                prop_assert_eq!(record.get(name), Some(Value::Int(1)));
            }
        }
    }

    #[test]
    fn prop_include_with_exclude_is_rejected(include in arb_include(), exclude in arb_include()) {
        let registry = base_registry();
        let result = registry.apply_view(
            "Base",
            ViewSpec::new("Both").with_include(include).with_exclude(exclude),
        );
        let conflict = matches!(result, Err(ViewError::IncludeExcludeConflict { .. }));
        prop_assert!(conflict, "include with exclude must be rejected");
        prop_assert!(registry.view("Base", "Both").is_err());
    }
}
