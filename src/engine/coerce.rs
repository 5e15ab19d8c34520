//! Type coercion against [`TypeExpr`]

use indexmap::IndexMap;
use serde_json::Value as JsonValue;

use super::ConstructContext;
use crate::settings::SchemaConfig;
use crate::types::TypeExpr;
use crate::validation::{IssueKind, ValidationIssue, join_path};
use crate::value::Value;

type Issues = Vec<ValidationIssue>;

fn type_issue(path: &str, expected: &TypeExpr, raw: &JsonValue) -> Issues {
    vec![ValidationIssue::new(
        IssueKind::Type,
        path,
        format!("expected {expected}, got {}", json_kind(raw)),
    )]
}

fn json_kind(raw: &JsonValue) -> &'static str {
    match raw {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "int",
        JsonValue::Number(_) => "float",
        JsonValue::String(_) => "str",
        JsonValue::Array(_) => "list",
        JsonValue::Object(_) => "object",
    }
}

/// Coerce `raw` to `ty`, collecting issues under `path`
pub(super) fn coerce(
    ty: &TypeExpr,
    raw: &JsonValue,
    path: &str,
    config: &SchemaConfig,
    cx: ConstructContext<'_>,
) -> Result<Value, Issues> {
    let strict = config.is_strict();

    if raw.is_null() {
        return if ty.is_nullable() {
            Ok(Value::Null)
        } else {
            Err(vec![ValidationIssue::new(
                IssueKind::Null,
                path,
                format!("none is not an allowed value for {ty}"),
            )])
        };
    }

    match ty {
        TypeExpr::Any => Ok(Value::from_json(raw)),
        TypeExpr::Bool => coerce_bool(raw, strict).ok_or_else(|| type_issue(path, ty, raw)),
        TypeExpr::Int => coerce_int(raw, strict).ok_or_else(|| type_issue(path, ty, raw)),
        TypeExpr::Float => coerce_float(raw, strict).ok_or_else(|| type_issue(path, ty, raw)),
        TypeExpr::Str => match raw {
            JsonValue::String(s) if config.strips_whitespace() => Ok(Value::Str(s.trim().to_string())),
            JsonValue::String(s) => Ok(Value::Str(s.clone())),
            _ => Err(type_issue(path, ty, raw)),
        },
        TypeExpr::Model(name) => coerce_model(name, raw, path, cx),
        TypeExpr::List(inner) => {
            let items = raw.as_array().ok_or_else(|| type_issue(path, ty, raw))?;
            coerce_items(items.iter().map(|item| (inner.as_ref(), item)), path, config, cx)
                .map(Value::List)
        }
        TypeExpr::Set(inner) => {
            let items = raw.as_array().ok_or_else(|| type_issue(path, ty, raw))?;
            let values =
                coerce_items(items.iter().map(|item| (inner.as_ref(), item)), path, config, cx)?;
            let mut unique: Vec<Value> = Vec::with_capacity(values.len());
            for value in values {
                if !unique.contains(&value) {
                    unique.push(value);
                }
            }
            Ok(Value::List(unique))
        }
        TypeExpr::Map(inner) => {
            let map = raw.as_object().ok_or_else(|| type_issue(path, ty, raw))?;
            let mut issues = Vec::new();
            let mut values = IndexMap::with_capacity(map.len());
            for (key, item) in map {
                match coerce(inner, item, &join_path(path, key), config, cx) {
                    Ok(value) => {
                        values.insert(key.clone(), value);
                    }
                    Err(mut item_issues) => issues.append(&mut item_issues),
                }
            }
            if issues.is_empty() {
                Ok(Value::Map(values))
            } else {
                Err(issues)
            }
        }
        TypeExpr::Tuple(members) => {
            let items = raw.as_array().ok_or_else(|| type_issue(path, ty, raw))?;
            if items.len() != members.len() {
                return Err(vec![ValidationIssue::new(
                    IssueKind::Type,
                    path,
                    format!("expected {} items, got {}", members.len(), items.len()),
                )]);
            }
            coerce_items(members.iter().zip(items), path, config, cx).map(Value::List)
        }
        TypeExpr::Optional(inner) => coerce(inner, raw, path, config, cx),
        TypeExpr::Union(members) => {
            let mut issues = Vec::new();
            for member in members {
                match coerce(member, raw, path, config, cx) {
                    Ok(value) => return Ok(value),
                    Err(mut member_issues) => issues.append(&mut member_issues),
                }
            }
            if issues.is_empty() {
                Err(type_issue(path, ty, raw))
            } else {
                Err(issues)
            }
        }
    }
}

fn coerce_items<'t, 'j>(
    items: impl Iterator<Item = (&'t TypeExpr, &'j JsonValue)>,
    path: &str,
    config: &SchemaConfig,
    cx: ConstructContext<'_>,
) -> Result<Vec<Value>, Issues> {
    let mut issues = Vec::new();
    let mut values = Vec::new();
    for (index, (ty, item)) in items.enumerate() {
        match coerce(ty, item, &join_path(path, &index.to_string()), config, cx) {
            Ok(value) => values.push(value),
            Err(mut item_issues) => issues.append(&mut item_issues),
        }
    }
    if issues.is_empty() {
        Ok(values)
    } else {
        Err(issues)
    }
}

fn coerce_model(
    name: &str,
    raw: &JsonValue,
    path: &str,
    cx: ConstructContext<'_>,
) -> Result<Value, Issues> {
    let Some(object) = raw.as_object() else {
        return Err(type_issue(path, &TypeExpr::model(name), raw));
    };
    let registry = cx.registry();
    let schema = registry.schema(name).map_err(|err| {
        vec![ValidationIssue::new(IssueKind::Type, path, err.to_string())]
    })?;
    registry
        .engine()
        .construct(&schema, object.clone(), cx.nested())
        .map(Value::Record)
        .map_err(|err| prefix_issues(path, err.issues))
}

/// Re-root nested issues under `path`
pub(crate) fn prefix_issues(path: &str, issues: Issues) -> Issues {
    issues
        .into_iter()
        .map(|mut issue| {
            issue.path = if issue.path == super::ROOT_PATH {
                path.to_string()
            } else {
                join_path(path, &issue.path)
            };
            issue
        })
        .collect()
}

fn coerce_bool(raw: &JsonValue, strict: bool) -> Option<Value> {
    match raw {
        JsonValue::Bool(b) => Some(Value::Bool(*b)),
        _ if strict => None,
        JsonValue::Number(n) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        JsonValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(Value::Bool(true)),
            "false" | "0" | "no" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn coerce_int(raw: &JsonValue, strict: bool) -> Option<Value> {
    match raw {
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(Value::Int(i));
            }
            if strict {
                return None;
            }
            let f = n.as_f64()?;
            (f.fract() == 0.0 && f.is_finite() && f.abs() < 9.2e18).then(|| Value::Int(f as i64))
        }
        JsonValue::String(s) if !strict => s.trim().parse::<i64>().ok().map(Value::Int),
        _ => None,
    }
}

fn coerce_float(raw: &JsonValue, strict: bool) -> Option<Value> {
    match raw {
        JsonValue::Number(n) => n.as_f64().map(Value::Float),
        JsonValue::String(s) if !strict => s.trim().parse::<f64>().ok().map(Value::Float),
        _ => None,
    }
}
