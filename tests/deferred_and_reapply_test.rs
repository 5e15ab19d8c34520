//! Tests for deferred view builds and reapplication to subtypes

use pretty_assertions::assert_eq;
use schema_views::prelude::*;
use serde_json::json;
use std::sync::Arc;

#[test]
fn test_forward_reference_defers_views_until_rebuild() {
    let registry = SchemaRegistry::default();

    let declared = registry
        .declare(
            SchemaDefinition::new("Model")
                .field("f", TypeExpr::model("F"))
                .view(ViewSpec::new("View")),
        )
        .expect("model should declare");
    assert!(matches!(declared, Declared::Pending { ref reference } if reference == "F"));
    assert!(!registry.is_finalized("Model"));
    assert!(matches!(
        registry.view("Model", "View"),
        Err(ViewError::ViewNotFound { .. })
    ));

    registry
        .declare(
            SchemaDefinition::new("F")
                .field("f", TypeExpr::Float)
                .view(ViewSpec::new("View")),
        )
        .expect("F should declare");

    let built = registry.rebuild("Model").expect("rebuild");
    assert_eq!(built.len(), 1);
    assert!(registry.is_finalized("Model"));

    let view = registry.view("Model", "View").expect("view");
    assert!(Arc::ptr_eq(&built[0], &view));
    assert_eq!(view.field("f").map(|f| &f.ty), Some(&TypeExpr::model("FView")));

    let direct = registry.construct("ModelView", json!({"f": {"f": 0.0}})).expect("direct");
    let nested = direct.get("f").expect("f");
    assert_eq!(
        nested.as_record().and_then(|r| r.get("f")),
        Some(Value::Float(0.0))
    );

    let model = registry.construct("Model", json!({"f": {"f": 0.0}})).expect("model");
    let projected = model.view("View").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"f": {"f": 0.0}}));
}

#[test]
fn test_deferred_chain_keeps_declaration_order() {
    let registry = SchemaRegistry::default();
    registry
        .declare(
            SchemaDefinition::new("Model")
                .field("i", TypeExpr::Int)
                .field("f", TypeExpr::model("F"))
                .view(ViewSpec::new("Out"))
                .view(ViewSpec::new("OutLite").with_base(["Out"]).with_exclude(["f"])),
        )
        .expect("model should declare");
    assert!(
        registry
            .apply_view("Model", ViewSpec::new("Extra").with_include(["i"]))
            .expect("apply")
            .is_deferred()
    );
    assert_eq!(registry.deferred_views("Model").expect("count"), 3);

    registry
        .declare(SchemaDefinition::new("F").field("x", TypeExpr::Int))
        .expect("F should declare");

    let built = registry.rebuild("Model").expect("rebuild");
    let names: Vec<_> = built.iter().map(|schema| schema.name()).collect();
    assert_eq!(names, vec!["ModelOut", "ModelOutLite", "ModelExtra"]);
    assert_eq!(
        built[1].parent().map(|p| p.name()),
        Some("ModelOut"),
        "ancestor views built earlier in the chain are found"
    );
    assert_eq!(registry.deferred_views("Model").expect("count"), 0);
    assert!(registry.rebuild("Model").expect("second rebuild").is_empty());
}

#[test]
fn test_non_deferrable_errors_propagate() {
    let registry = SchemaRegistry::default();
    registry
        .declare(SchemaDefinition::new("Model").field("f", TypeExpr::model("F")))
        .expect("model should declare");
    registry
        .apply_view("Model", ViewSpec::new("Bad").with_optional(["missing"]))
        .expect("queued while pending");
    registry
        .declare(SchemaDefinition::new("F").field("x", TypeExpr::Int))
        .expect("F should declare");

    let err = registry.rebuild("Model").unwrap_err();
    assert!(matches!(err, ViewError::UnknownField { .. }));
    assert_eq!(registry.deferred_views("Model").expect("count"), 1);
}

#[test]
fn test_engine_rejection_is_not_deferred() {
    let registry = SchemaRegistry::default();
    let err = registry
        .declare(SchemaDefinition::new("Loop").extends("Loop"))
        .unwrap_err();
    assert!(matches!(err, ViewError::Engine(_)));

    let err = registry
        .declare(
            SchemaDefinition::new("Model")
                .field("x", TypeExpr::Int)
                .validator(ValidatorBinding::field_after("check", "nope", Ok)),
        )
        .unwrap_err();
    assert!(matches!(err, ViewError::Engine(_)));
    assert!(registry.schema("Model").is_err());
}

fn parent(registry: &SchemaRegistry) {
    registry
        .declare(
            SchemaDefinition::new("Parent")
                .field("x", TypeExpr::Int)
                .field("y", TypeExpr::Int)
                .view(ViewSpec::new("View").with_exclude(["y"])),
        )
        .expect("parent should declare");
}

#[test]
fn test_subtype_inherits_views_without_reapplication() {
    let registry = SchemaRegistry::default();
    parent(&registry);
    registry
        .declare(
            SchemaDefinition::new("ChildNotReapplied")
                .extends("Parent")
                .field("z", TypeExpr::Int),
        )
        .expect("child should declare");

    let view = registry.view("ChildNotReapplied", "View").expect("inherited view");
    assert_eq!(view.name(), "ParentView");
    assert!(!view.has_field("z"));
}

#[test]
fn test_reapply_base_views() {
    let registry = SchemaRegistry::default();
    parent(&registry);
    registry
        .declare(
            SchemaDefinition::new("ChildReapplied")
                .extends("Parent")
                .field("z", TypeExpr::Int)
                .reapplying_base_views(),
        )
        .expect("child should declare");

    let view = registry.view("ChildReapplied", "View").expect("view");
    assert_eq!(view.name(), "ChildReappliedView");
    assert_eq!(view.field_names().collect::<Vec<_>>(), vec!["x", "z"]);
    assert_eq!(view.view_root().map(|r| r.name()), Some("ChildReapplied"));
    assert!(view.is_subtype_of("Parent"));

    let parent_view = registry.view("Parent", "View").expect("parent view");
    assert!(!parent_view.has_field("z"));
    assert_eq!(
        registry.view_specs("ChildReapplied").expect("specs"),
        registry.view_specs("Parent").expect("specs")
    );

    let child = registry
        .construct("ChildReapplied", json!({"x": 1, "y": 2, "z": 3}))
        .expect("child");
    let projected = child.view("View").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"x": 1, "z": 3}));
}

#[test]
fn test_reapply_after_declaration() {
    let registry = SchemaRegistry::default();
    parent(&registry);
    registry
        .declare(
            SchemaDefinition::new("Child")
                .extends("Parent")
                .field("z", TypeExpr::Int),
        )
        .expect("child should declare");

    let child = registry.construct("Child", json!({"x": 1, "y": 2, "z": 3})).expect("child");
    let before = child.view("View").expect("factory").project().expect("projected");
    assert_eq!(before.schema().name(), "ParentView");

    let results = registry.reapply_base_views("Child").expect("reapply");
    assert_eq!(results.len(), 1);
    assert_eq!(
        results[0].schema().map(|s| s.name()),
        Some("ChildView")
    );

    let fresh = registry.construct("Child", json!({"x": 1, "y": 2, "z": 3})).expect("child");
    let after = fresh.view("View").expect("factory").project().expect("projected");
    assert_eq!(after.dump(), json!({"x": 1, "z": 3}));
}

#[test]
fn test_reapply_on_pending_subtype_defers() {
    let registry = SchemaRegistry::default();
    parent(&registry);
    registry
        .declare(
            SchemaDefinition::new("Child")
                .extends("Parent")
                .field("other", TypeExpr::model("Later"))
                .reapplying_base_views(),
        )
        .expect("child should declare");
    assert_eq!(registry.deferred_views("Child").expect("count"), 1);

    registry
        .declare(SchemaDefinition::new("Later").field("x", TypeExpr::Int))
        .expect("later should declare");
    let built = registry.rebuild("Child").expect("rebuild");
    assert_eq!(built[0].field_names().collect::<Vec<_>>(), vec!["x", "other"]);
}
