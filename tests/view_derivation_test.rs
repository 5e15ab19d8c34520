//! Tests for deriving views: field selection, optionality, overrides and
//! configuration errors

use pretty_assertions::assert_eq;
use schema_views::prelude::*;
use schema_views::types::FieldDefault;
use serde_json::json;
use std::sync::Arc;

fn registry_with(definition: SchemaDefinition) -> SchemaRegistry {
    let registry = SchemaRegistry::default();
    registry.declare(definition).expect("schema should declare");
    registry
}

fn xy() -> SchemaDefinition {
    SchemaDefinition::new("Model")
        .field("x", TypeExpr::Int)
        .field("y", TypeExpr::Int)
}

#[test]
fn test_basic_view() {
    let registry = registry_with(
        SchemaDefinition::new("Model")
            .field("x", TypeExpr::Int)
            .view(ViewSpec::new("View")),
    );

    let view = registry.view("Model", "View").expect("view");
    assert_eq!(view.name(), "ModelView");
    assert_eq!(view.view_name(), Some("View"));
    assert_eq!(view.view_root().map(|root| root.name()), Some("Model"));
    assert!(view.is_subtype_of("Model"));

    let direct = registry.construct("ModelView", json!({"x": 0})).expect("direct");
    assert_eq!(direct.dump(), json!({"x": 0}));
    assert!(direct.get("y").is_none());

    let record = registry.construct("Model", json!({"x": 1})).expect("record");
    let factory = record.view("View").expect("factory");
    assert_eq!(factory.view_name(), Some("View"));
    assert_eq!(factory.view_root().map(|root| root.name()), Some("Model"));
    let projected = factory.project().expect("projected");
    assert_eq!(projected.dump(), json!({"x": 1}));
    assert!(Arc::ptr_eq(projected.schema(), &view));
}

#[test]
fn test_include() {
    let registry = registry_with(xy().view(ViewSpec::new("View").with_include(["x"])));

    let view = registry.view("Model", "View").expect("view");
    assert_eq!(view.field_names().collect::<Vec<_>>(), vec!["x"]);

    let record = registry.construct("Model", json!({"x": 1, "y": 2})).expect("record");
    let projected = record.view("View").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"x": 1}));
    assert!(projected.get("y").is_none());
}

#[test]
fn test_exclude() {
    let registry = registry_with(xy().view(ViewSpec::new("View").with_exclude(["y"])));

    let direct = registry.construct("ModelView", json!({"x": 0})).expect("direct");
    assert_eq!(direct.dump(), json!({"x": 0}));

    let record = registry.construct("Model", json!({"x": 1, "y": 2})).expect("record");
    let projected = record.view("View").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"x": 1}));
}

#[test]
fn test_optional() {
    let registry = registry_with(xy().view(ViewSpec::new("View").with_optional(["y"])));

    let omitted = registry.construct("ModelView", json!({"x": 0})).expect("omitted");
    assert_eq!(omitted.dump(), json!({"x": 0, "y": null}));

    let given = registry.construct("ModelView", json!({"x": 0, "y": 1})).expect("given");
    assert_eq!(given.dump(), json!({"x": 0, "y": 1}));

    let null = registry.construct("ModelView", json!({"x": 0, "y": null})).expect("null");
    assert_eq!(null.get("y"), Some(Value::Null));

    let record = registry.construct("Model", json!({"x": 0, "y": 1})).expect("record");
    let projected = record.view("View").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"x": 0, "y": 1}));

    let field = registry.view("Model", "View").expect("view").field("y").cloned().expect("y");
    assert_eq!(field.ty, TypeExpr::optional(TypeExpr::Int));
    assert_eq!(field.default, FieldDefault::Value(json!(null)));
}

#[test]
fn test_optional_not_none() {
    let registry = registry_with(xy().view(ViewSpec::new("View").with_optional_not_none(["y"])));

    let omitted = registry.construct("ModelView", json!({"x": 0})).expect("omitted");
    assert_eq!(omitted.dump(), json!({"x": 0, "y": null}));

    let given = registry.construct("ModelView", json!({"x": 0, "y": 1})).expect("given");
    assert_eq!(given.dump(), json!({"x": 0, "y": 1}));

    match registry.construct("ModelView", json!({"x": 0, "y": null})) {
        Err(ViewError::Validation(err)) => {
            assert!(err.has_issue_at("y"));
            assert_eq!(err.issues_of(IssueKind::Null).len(), 1);
        }
        other => panic!("explicit null should be rejected, got {other:?}"),
    }

    let record = registry.construct("Model", json!({"x": 0, "y": 1})).expect("record");
    let projected = record.view("View").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"x": 0, "y": 1}));
}

#[test]
fn test_field_overrides() {
    let registry = registry_with(
        SchemaDefinition::new("Model")
            .field("i", TypeExpr::Int)
            .field_with_default("s", TypeExpr::Str, json!("default"))
            .field("f", TypeExpr::Float)
            .view(
                ViewSpec::new("View")
                    .with_field("i", FieldOverride::ty(TypeExpr::Str))
                    .with_field("s", FieldOverride::meta(FieldMeta::required()))
                    .with_field(
                        "f",
                        FieldOverride::full(TypeExpr::Int, FieldMeta::with_default(json!(7))),
                    ),
            ),
    );

    let view = registry.view("Model", "View").expect("view");
    assert_eq!(view.field("i").map(|f| &f.ty), Some(&TypeExpr::Str));
    assert_eq!(view.field("s").map(|f| &f.ty), Some(&TypeExpr::Str));
    assert!(view.field("s").is_some_and(|f| f.default.is_required()));
    assert_eq!(
        view.field("f").map(|f| &f.default),
        Some(&FieldDefault::Value(json!(7)))
    );

    let record = registry
        .construct("ModelView", json!({"i": "text", "s": "given"}))
        .expect("record");
    assert_eq!(record.dump(), json!({"i": "text", "s": "given", "f": 7}));

    match registry.construct("ModelView", json!({"i": "text"})) {
        Err(ViewError::Validation(err)) => assert!(err.has_issue_at("s")),
        other => panic!("s should be required, got {other:?}"),
    }
}

#[test]
fn test_include_and_exclude_together() {
    let registry = registry_with(xy());
    let err = registry
        .apply_view("Model", ViewSpec::new("View").with_include(["x"]).with_exclude(["y"]))
        .unwrap_err();
    assert!(matches!(err, ViewError::IncludeExcludeConflict { .. }));
    assert!(err.is_configuration());
    assert!(registry.view("Model", "View").is_err());
}

#[test]
fn test_overlapping_field_sets() {
    let registry = registry_with(xy());
    let err = registry
        .apply_view(
            "Model",
            ViewSpec::new("View")
                .with_optional(["y"])
                .with_field("y", FieldOverride::ty(TypeExpr::Str)),
        )
        .unwrap_err();
    match err {
        ViewError::OverlappingFields { fields, .. } => assert_eq!(fields, vec!["y".to_string()]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_missing_field_reference() {
    let registry = registry_with(xy());
    let err = registry
        .apply_view("Model", ViewSpec::new("View").with_optional(["z"]))
        .unwrap_err();
    assert!(matches!(err, ViewError::UnknownField { ref field, .. } if field == "z"));
}

#[test]
fn test_unknown_include_is_ignored_unless_strict() {
    let registry = registry_with(xy());
    let built = registry
        .apply_view("Model", ViewSpec::new("View").with_include(["x", "ghost"]))
        .expect("lenient include");
    let view = built.schema().expect("built");
    assert_eq!(view.field_names().collect::<Vec<_>>(), vec!["x"]);

    let strict = SchemaRegistry::new(RegistryConfig {
        strict_include: true,
        ..RegistryConfig::default()
    });
    strict.declare(xy()).expect("declared");
    assert!(matches!(
        strict.apply_view("Model", ViewSpec::new("View").with_include(["ghost"])),
        Err(ViewError::UnknownField { .. })
    ));
}

#[test]
fn test_extra_policy() {
    let registry = registry_with(
        xy().view(ViewSpec::new("Strict").with_extra(ExtraPolicy::Forbid))
            .view(ViewSpec::new("Open").with_extra(ExtraPolicy::Allow)),
    );

    let base = registry
        .construct("Model", json!({"x": 1, "y": 2, "z": 3}))
        .expect("ignored by default");
    assert_eq!(base.dump(), json!({"x": 1, "y": 2}));

    match registry.construct("ModelStrict", json!({"x": 1, "y": 2, "z": 3})) {
        Err(ViewError::Validation(err)) => {
            assert_eq!(err.issues_of(IssueKind::Extra).len(), 1);
            assert!(err.has_issue_at("z"));
        }
        other => panic!("extra key should be rejected, got {other:?}"),
    }

    let open = registry
        .construct("ModelOpen", json!({"x": 1, "y": 2, "z": 3}))
        .expect("allowed");
    assert_eq!(open.dump(), json!({"x": 1, "y": 2, "z": 3}));
}

#[test]
fn test_view_config_is_layered() {
    let registry = registry_with(
        SchemaDefinition::new("Model")
            .field("s", TypeExpr::Str)
            .with_config(SchemaConfig::default().with_str_strip_whitespace(true))
            .view(ViewSpec::new("Frozen").with_config(SchemaConfig::default().with_frozen(true))),
    );

    let view = registry.view("Model", "Frozen").expect("view");
    assert!(view.config().is_frozen());
    assert!(view.config().strips_whitespace());

    let record = registry.construct("ModelFrozen", json!({"s": "  a  "})).expect("record");
    assert_eq!(record.get("s"), Some(Value::from("a")));
    assert!(record.set("s", json!("b")).is_err());
}

#[test]
fn test_display() {
    let registry = registry_with(
        SchemaDefinition::new("Model")
            .field_with_default("x", TypeExpr::optional(TypeExpr::Int), json!(null))
            .view(ViewSpec::new("View")),
    );
    let record = registry.construct("Model", json!({})).expect("record");
    assert_eq!(record.to_string(), "x=null");
    assert_eq!(registry.view("Model", "View").expect("view").name(), "ModelView");
}

#[test]
fn test_any_type() {
    let registry = registry_with(
        SchemaDefinition::new("Model")
            .field("a", TypeExpr::Any)
            .view(ViewSpec::new("View")),
    );
    registry.construct("ModelView", json!({"a": 1})).expect("direct");
    let record = registry.construct("Model", json!({"a": [1, "two"]})).expect("record");
    let projected = record.view("View").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"a": [1, "two"]}));
}

#[test]
fn test_load_yaml() {
    let registry = SchemaRegistry::default();
    let names = registry
        .load_yaml(
            r"
schemas:
  - name: Group
    fields:
      name:
        type: str
    views:
      - name: Out
        exclude: [name]
  - name: User
    fields:
      id:
        type: int
      password:
        type: str
      groups:
        type:
          list:
            model: Group
        default:
          value: []
    views:
      - name: Out
        exclude: [password]
      - name: Update
        exclude: [id]
        optional: [password, groups]
",
        )
        .expect("document should load");
    assert_eq!(names, vec!["Group".to_string(), "User".to_string()]);
    assert_eq!(
        registry.schema_names(),
        vec!["Group", "GroupOut", "User", "UserOut", "UserUpdate"]
    );
    assert_eq!(
        registry.views_of("User").expect("views"),
        vec!["Out".to_string(), "Update".to_string()]
    );

    let out = registry.view("User", "Out").expect("out");
    assert_eq!(
        out.field("groups").map(|f| &f.ty),
        Some(&TypeExpr::list(TypeExpr::model("GroupOut")))
    );

    let user = registry
        .construct(
            "User",
            json!({"id": 1, "password": "pw", "groups": [{"name": "admins"}]}),
        )
        .expect("user");
    let projected = user.view("Out").expect("factory").project().expect("projected");
    assert_eq!(projected.dump(), json!({"id": 1, "groups": [{}]}));

    let update = registry.construct("UserUpdate", json!({})).expect("update");
    assert_eq!(update.dump(), json!({"password": null, "groups": null}));
}

#[test]
fn test_load_yaml_rejects_bad_document() {
    let registry = SchemaRegistry::default();
    assert!(matches!(
        registry.load_yaml("schemas: 3"),
        Err(ViewError::Config(_))
    ));
}

const CONFIGURED_DOCUMENT: &str = r"
config:
  strict_include: true
  default_extra: forbid
schemas:
  - name: Model
    fields:
      x:
        type: int
      tags:
        type:
          list: str
        default:
          value: []
    views:
      - name: Picked
        include: [x]
";

#[test]
fn test_from_yaml_applies_config_section() {
    let registry = SchemaRegistry::from_yaml(CONFIGURED_DOCUMENT).expect("document should load");
    assert!(registry.config().strict_include);

    match registry.construct("Model", json!({"x": 1, "zzz": 2})) {
        Err(ViewError::Validation(err)) => {
            assert_eq!(err.issues_of(IssueKind::Extra).len(), 1);
            assert!(err.has_issue_at("zzz"));
        }
        other => panic!("extra input should be forbidden, got {other:?}"),
    }
    let record = registry.construct("Model", json!({"x": 1})).expect("record");
    assert_eq!(record.dump(), json!({"x": 1, "tags": []}));

    let ghost = CONFIGURED_DOCUMENT.replace("include: [x]", "include: [x, ghost]");
    assert!(matches!(
        SchemaRegistry::from_yaml(&ghost),
        Err(ViewError::UnknownField { .. })
    ));
}

#[test]
fn test_load_yaml_rejects_config_section() {
    let registry = SchemaRegistry::default();
    assert!(matches!(
        registry.load_yaml(CONFIGURED_DOCUMENT),
        Err(ViewError::Config(_))
    ));
    assert!(registry.schema_names().is_empty());
}

#[test]
fn test_derived_name_collision_across_roots() {
    let registry = SchemaRegistry::default();
    registry
        .declare(
            SchemaDefinition::new("A")
                .field("a", TypeExpr::Int)
                .view(ViewSpec::new("BC")),
        )
        .expect("A should declare");
    registry
        .declare(SchemaDefinition::new("AB").field("b", TypeExpr::Int))
        .expect("AB should declare");

    match registry.apply_view("AB", ViewSpec::new("C")) {
        Err(ViewError::DuplicateSchema(name)) => assert_eq!(name, "ABC"),
        other => panic!("ABC is already derived from A, got {other:?}"),
    }

    let abc = registry.schema("ABC").expect("ABC");
    assert!(Arc::ptr_eq(&abc, &registry.view("A", "BC").expect("A.BC")));
    assert_eq!(abc.view_root().map(|r| r.name()), Some("A"));
    assert!(registry.view("AB", "C").is_err());
}
