//! JSON Schema subset used to validate structured completion output.
//!
//! The gateway is asked for strict JSON output, but replies are still
//! untrusted; every structured completion is re-validated locally against the
//! caller's schema before being handed back.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primitive type keyword accepted in a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

/// `additionalProperties` accepted as a boolean toggle or a nested schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Allowed(bool),
    Schema(Box<JsonSchema>),
}

/// Recursive structural description of accepted JSON shapes.
///
/// Supports `type`, `properties`, `items`, `required`, `enum`, composition via
/// `anyOf`/`oneOf`/`allOf`, and `additionalProperties`. A schema with no type
/// and no composition keyword is permissive and accepts any value.
///
/// Schemas are usually built from literal JSON:
///
/// ```
/// use openrouter_gateway::schema::JsonSchema;
/// use serde_json::json;
///
/// let schema: JsonSchema = serde_json::from_value(json!({
///     "type": "object",
///     "properties": {"ok": {"type": "boolean"}},
///     "required": ["ok"]
/// })).unwrap();
/// assert!(schema.validate(&json!({"ok": true})).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(rename = "anyOf", skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<JsonSchema>>,
    #[serde(rename = "oneOf", skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<JsonSchema>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<JsonSchema>>,
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<AdditionalProperties>,
}

impl JsonSchema {
    /// Validates a value depth-first, returning every violation found.
    ///
    /// Violations are path-qualified (for example `$.proposals[0].front`) so
    /// callers can localize failures. An empty vector means the value
    /// satisfies the schema.
    pub fn validate(&self, value: &Value) -> Vec<String> {
        validate_at(value, self, "$")
    }
}

fn validate_at(value: &Value, schema: &JsonSchema, path: &str) -> Vec<String> {
    if let Some(branches) = schema.any_of.as_deref().filter(|b| !b.is_empty()) {
        let results: Vec<Vec<String>> = branches
            .iter()
            .map(|branch| validate_at(value, branch, path))
            .collect();
        if results.iter().any(|errors| errors.is_empty()) {
            return Vec::new();
        }
        return results.into_iter().flatten().collect();
    }

    if let Some(branches) = schema.one_of.as_deref().filter(|b| !b.is_empty()) {
        let matching = branches
            .iter()
            .filter(|branch| validate_at(value, branch, path).is_empty())
            .count();
        if matching == 1 {
            return Vec::new();
        }
        // Deliberately coarse: no attempt to name which branch failed.
        return vec![format!("{path} should match exactly one schema variant")];
    }

    if let Some(branches) = schema.all_of.as_deref().filter(|b| !b.is_empty()) {
        return branches
            .iter()
            .flat_map(|branch| validate_at(value, branch, path))
            .collect();
    }

    if let Some(allowed) = &schema.enum_values {
        if !allowed.contains(value) {
            let listing: Vec<String> = allowed.iter().map(enum_member_display).collect();
            return vec![format!("{path} should be one of {}", listing.join(", "))];
        }
    }

    let Some(schema_type) = schema.schema_type else {
        // No type and no composition keyword: the schema is permissive.
        return Vec::new();
    };

    match schema_type {
        SchemaType::String => match value {
            Value::String(_) => Vec::new(),
            _ => vec![format!("{path} should be a string")],
        },
        SchemaType::Number => match value {
            Value::Number(_) => Vec::new(),
            _ => vec![format!("{path} should be a number")],
        },
        SchemaType::Boolean => match value {
            Value::Bool(_) => Vec::new(),
            _ => vec![format!("{path} should be a boolean")],
        },
        SchemaType::Null => match value {
            Value::Null => Vec::new(),
            _ => vec![format!("{path} should be null")],
        },
        SchemaType::Array => validate_array(value, schema, path),
        SchemaType::Object => validate_object(value, schema, path),
    }
}

fn validate_array(value: &Value, schema: &JsonSchema, path: &str) -> Vec<String> {
    let Some(items) = value.as_array() else {
        return vec![format!("{path} should be an array")];
    };
    let Some(item_schema) = &schema.items else {
        return Vec::new();
    };
    items
        .iter()
        .enumerate()
        .flat_map(|(index, item)| validate_at(item, item_schema, &format!("{path}[{index}]")))
        .collect()
}

fn validate_object(value: &Value, schema: &JsonSchema, path: &str) -> Vec<String> {
    let Some(object) = value.as_object() else {
        return vec![format!("{path} should be an object")];
    };

    let mut errors = Vec::new();

    if let Some(required) = &schema.required {
        for key in required {
            if !object.contains_key(key) {
                errors.push(format!("{path}.{key} is required"));
            }
        }
    }

    if let Some(properties) = &schema.properties {
        for (key, property_schema) in properties {
            if let Some(child) = object.get(key) {
                errors.extend(validate_at(child, property_schema, &format!("{path}.{key}")));
            }
        }
    }

    let declared = |key: &str| {
        schema
            .properties
            .as_ref()
            .is_some_and(|properties| properties.contains_key(key))
    };

    match &schema.additional_properties {
        Some(AdditionalProperties::Allowed(false)) if schema.properties.is_some() => {
            for key in object.keys() {
                if !declared(key) {
                    errors.push(format!("{path}.{key} is not allowed"));
                }
            }
        }
        Some(AdditionalProperties::Schema(extra_schema)) => {
            for (key, child) in object {
                if !declared(key) {
                    errors.extend(validate_at(child, extra_schema, &format!("{path}.{key}")));
                }
            }
        }
        _ => {}
    }

    errors
}

fn enum_member_display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
