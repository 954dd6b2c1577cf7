//! Shallow JSON-schema checks for tool arguments and structured output.

use serde_json::Value;

/// Check `value` against the top level of a JSON schema.
///
/// Covers the schema `type`, `required` keys, declared property types and
/// string `enum` restrictions. Returns the first violation found.
pub fn check_shape(value: &Value, schema: &Value) -> Result<(), String> {
    if let Some(expected) = schema.get("type").and_then(Value::as_str) {
        if !matches_type(value, expected) {
            return Err(format!(
                "expected {expected}, got {}",
                type_name(value)
            ));
        }
    }

    let Some(object) = value.as_object() else {
        return Ok(());
    };

    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    for key in required {
        if !object.contains_key(key) {
            return Err(format!("missing required field '{key}'"));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, field) in object {
        let Some(field_schema) = properties.get(key) else {
            continue;
        };
        if let Some(expected) = field_schema.get("type").and_then(Value::as_str) {
            if !matches_type(field, expected) {
                return Err(format!(
                    "field '{key}' expected {expected}, got {}",
                    type_name(field)
                ));
            }
        }
        if let Some(allowed) = field_schema.get("enum").and_then(Value::as_array) {
            if !allowed.contains(field) {
                return Err(format!("field '{key}' has value {field} outside its enum"));
            }
        }
    }

    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "object" => value.is_object(),
        "array" => value.is_array(),
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
