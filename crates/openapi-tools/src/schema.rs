//! Schema compilation.
//!
//! [`compile`] turns one (post-expansion) [`SchemaNode`] into a
//! [`CompiledSchema`]: a runtime validator plus the JSON Schema shape that is
//! surfaced to the calling agent as documentation. Both halves are pure.
//!
//! Validation collects every violation rather than stopping at the first,
//! and never rejects unknown object keys: upstream APIs add fields over time
//! and tools compiled against an older description must keep working.

use crate::spec::SchemaNode;
use serde_json::{Map, Value, json};
use std::fmt;

/// One field-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON-path-style location, e.g. `$.requestBody.attributesForFaceting[2]`.
    pub path: String,
    pub reason: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

/// A schema node compiled into an executable validator.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    node: SchemaNode,
    doc: Value,
}

/// Compile a schema node into a validator with an attached documentation shape.
#[must_use]
pub fn compile(node: &SchemaNode) -> CompiledSchema {
    CompiledSchema {
        node: node.clone(),
        doc: json_schema(node),
    }
}

impl CompiledSchema {
    /// The JSON Schema documentation shape, including descriptions, defaults,
    /// enumerations, and numeric bounds.
    #[must_use]
    pub fn json_schema(&self) -> &Value {
        &self.doc
    }

    #[must_use]
    pub fn node(&self) -> &SchemaNode {
        &self.node
    }

    /// Validate a value, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns the full list of violated field paths and reasons.
    pub fn validate(&self, value: &Value) -> Result<(), Vec<Violation>> {
        let mut violations = Vec::new();
        check(&self.node, value, "$", &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

fn check(node: &SchemaNode, value: &Value, path: &str, out: &mut Vec<Violation>) {
    match node {
        SchemaNode::Any { .. } => {}
        SchemaNode::String { enumeration, .. } => match value.as_str() {
            Some(s) => {
                if !enumeration.is_empty() && !enumeration.iter().any(|e| e == s) {
                    out.push(Violation {
                        path: path.to_string(),
                        reason: format!("'{s}' is not one of [{}]", enumeration.join(", ")),
                    });
                }
            }
            None => out.push(type_violation(path, "string", value)),
        },
        SchemaNode::Number {
            minimum, maximum, ..
        } => match value.as_f64() {
            Some(n) if value.is_number() => {
                if let Some(min) = minimum {
                    if n < *min {
                        out.push(bound_violation(path, "less than minimum", *min));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        out.push(bound_violation(path, "greater than maximum", *max));
                    }
                }
            }
            _ => out.push(type_violation(path, "number", value)),
        },
        SchemaNode::Integer {
            minimum, maximum, ..
        } => {
            if value.is_i64() || value.is_u64() {
                let n = value.as_i64().unwrap_or(i64::MAX);
                if let Some(min) = minimum {
                    if n < *min {
                        out.push(bound_violation(path, "less than minimum", *min));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        out.push(bound_violation(path, "greater than maximum", *max));
                    }
                }
            } else {
                out.push(type_violation(path, "integer", value));
            }
        }
        SchemaNode::Boolean { .. } => {
            if !value.is_boolean() {
                out.push(type_violation(path, "boolean", value));
            }
        }
        SchemaNode::Array {
            items, min_items, ..
        } => match value.as_array() {
            Some(arr) => {
                if let Some(min) = min_items {
                    if (arr.len() as u64) < *min {
                        out.push(Violation {
                            path: path.to_string(),
                            reason: format!("expected at least {min} items, got {}", arr.len()),
                        });
                    }
                }
                if let Some(item_schema) = items {
                    for (i, item) in arr.iter().enumerate() {
                        check(item_schema, item, &format!("{path}[{i}]"), out);
                    }
                }
            }
            None => out.push(type_violation(path, "array", value)),
        },
        SchemaNode::Object {
            properties,
            required,
            ..
        } => match value.as_object() {
            Some(obj) => {
                for key in required {
                    if !obj.contains_key(key) {
                        out.push(Violation {
                            path: format!("{path}.{key}"),
                            reason: "missing required property".to_string(),
                        });
                    }
                }
                // Declared keys are validated when present; unknown keys pass.
                for (key, prop_schema) in properties {
                    if let Some(prop_value) = obj.get(key) {
                        check(prop_schema, prop_value, &format!("{path}.{key}"), out);
                    }
                }
            }
            None => out.push(type_violation(path, "object", value)),
        },
    }
}

fn type_violation(path: &str, expected: &str, got: &Value) -> Violation {
    Violation {
        path: path.to_string(),
        reason: format!("expected {expected}, got {}", type_name(got)),
    }
}

fn bound_violation(path: &str, relation: &str, bound: impl fmt::Display) -> Violation {
    Violation {
        path: path.to_string(),
        reason: format!("{relation} {bound}"),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a schema node as a JSON Schema value for tool documentation.
#[must_use]
pub fn json_schema(node: &SchemaNode) -> Value {
    let mut out = Map::new();

    match node {
        SchemaNode::String { enumeration, .. } => {
            out.insert("type".to_string(), json!("string"));
            if !enumeration.is_empty() {
                out.insert("enum".to_string(), json!(enumeration));
            }
        }
        SchemaNode::Number {
            minimum, maximum, ..
        } => {
            out.insert("type".to_string(), json!("number"));
            if let Some(min) = minimum {
                out.insert("minimum".to_string(), json!(min));
            }
            if let Some(max) = maximum {
                out.insert("maximum".to_string(), json!(max));
            }
        }
        SchemaNode::Integer {
            minimum, maximum, ..
        } => {
            out.insert("type".to_string(), json!("integer"));
            if let Some(min) = minimum {
                out.insert("minimum".to_string(), json!(min));
            }
            if let Some(max) = maximum {
                out.insert("maximum".to_string(), json!(max));
            }
        }
        SchemaNode::Boolean { .. } => {
            out.insert("type".to_string(), json!("boolean"));
        }
        SchemaNode::Array {
            items, min_items, ..
        } => {
            out.insert("type".to_string(), json!("array"));
            if let Some(item_schema) = items {
                out.insert("items".to_string(), json_schema(item_schema));
            }
            if let Some(min) = min_items {
                out.insert("minItems".to_string(), json!(min));
            }
        }
        SchemaNode::Object {
            properties,
            required,
            ..
        } => {
            out.insert("type".to_string(), json!("object"));
            if !properties.is_empty() {
                let props: Map<String, Value> = properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), json_schema(prop)))
                    .collect();
                out.insert("properties".to_string(), Value::Object(props));
            }
            if !required.is_empty() {
                out.insert("required".to_string(), json!(required));
            }
        }
        SchemaNode::Any { .. } => {}
    }

    let metadata = node.metadata();
    if let Some(description) = &metadata.description {
        out.insert("description".to_string(), json!(description));
    }
    if let Some(default) = &metadata.default {
        out.insert("default".to_string(), default.clone());
    }

    Value::Object(out)
}
