//! Tool input schema normalization for strict-mode function calling.
//!
//! Strict mode rejects optional properties, property defaults, union types and open
//! objects. [`normalize_schema`] rewrites a schema so that every declared property is
//! required, defaults are gone, `["string", "null"]` style unions become a single type
//! with `nullable: true`, and objects are closed with `additionalProperties: false`.

use serde_json::{Map, Value};

/// Returns a strict-mode copy of `schema`. The input is left untouched.
///
/// Pure and idempotent: `normalize_schema(&normalize_schema(s)) == normalize_schema(s)`.
pub fn normalize_schema(schema: &Value) -> Value {
    let mut normalized = schema.clone();
    normalize_in_place(&mut normalized);
    normalized
}

fn normalize_in_place(schema: &mut Value) {
    let Some(obj) = schema.as_object_mut() else {
        return;
    };

    if let Some(items) = obj.get_mut("items") {
        normalize_in_place(items);
    }

    let keys: Vec<String> = match obj.get_mut("properties").and_then(Value::as_object_mut) {
        Some(properties) => {
            for property in properties.values_mut() {
                if let Some(fields) = property.as_object_mut() {
                    fields.remove("default");
                    collapse_type(fields);
                }
                normalize_in_place(property);
            }
            properties.keys().cloned().collect()
        }
        None => return,
    };

    match obj.get_mut("required") {
        Some(Value::Array(required)) => {
            for key in keys {
                if !required.iter().any(|r| r.as_str() == Some(key.as_str())) {
                    required.push(Value::String(key));
                }
            }
        }
        _ => {
            obj.insert(
                "required".into(),
                Value::Array(keys.into_iter().map(Value::String).collect()),
            );
        }
    }

    obj.entry("additionalProperties")
        .or_insert(Value::Bool(false));
}

fn collapse_type(fields: &mut Map<String, Value>) {
    let Some(Value::Array(types)) = fields.get("type") else {
        return;
    };
    if types.is_empty() {
        return;
    }

    let nullable = types.iter().any(|t| t.as_str() == Some("null"));
    let first_concrete = types
        .iter()
        .find(|t| t.as_str() != Some("null"))
        .cloned();

    match (first_concrete, nullable) {
        (Some(concrete), true) => {
            fields.insert("type".into(), concrete);
            fields.insert("nullable".into(), Value::Bool(true));
        }
        (Some(concrete), false) => {
            fields.insert("type".into(), concrete);
        }
        (None, _) => {
            fields.insert("type".into(), Value::String("null".into()));
        }
    }
}
