//! Typed API description model.
//!
//! The model is deliberately closed: schema nodes are a tagged variant set
//! rather than a pass-through of arbitrary JSON Schema, so the compiler can
//! be a pure recursive function with no runtime type inspection. Input trees
//! are expected to be reference-free; run [`crate::expand::expand_refs`]
//! first.

use crate::error::Result;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// A loaded, reference-free API description.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiDescription {
    /// Server URL templates with variable slots, first entry preferred.
    #[serde(default)]
    pub servers: Vec<ServerTemplate>,
    /// Path template -> operations by method.
    #[serde(default)]
    pub paths: BTreeMap<String, PathOperations>,
}

impl ApiDescription {
    /// Deserialize a description from an expanded JSON tree.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree does not match the description model.
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Iterate every declared operation as `(path, method, operation)`.
    pub fn operations(&self) -> impl Iterator<Item = (&str, &'static str, &Operation)> {
        self.paths.iter().flat_map(|(path, item)| {
            item.iter().map(move |(method, op)| (path.as_str(), method, op))
        })
    }
}

/// A server URL template, e.g. `https://{appId}.example.net`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerTemplate {
    pub url: String,
    #[serde(default)]
    pub variables: BTreeMap<String, ServerVariable>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerVariable {
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Operations declared under one path template.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathOperations {
    #[serde(default)]
    pub get: Option<Operation>,
    #[serde(default)]
    pub post: Option<Operation>,
    #[serde(default)]
    pub put: Option<Operation>,
    #[serde(default)]
    pub delete: Option<Operation>,
}

impl PathOperations {
    /// Iterate declared operations as `(method, operation)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Operation)> {
        [
            ("get", &self.get),
            ("post", &self.post),
            ("put", &self.put),
            ("delete", &self.delete),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

/// One declared `(path, method)` pair.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Globally unique operation identifier.
    pub operation_id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub request_body: Option<RequestBody>,
}

impl Operation {
    /// The human description surfaced to the calling agent.
    #[must_use]
    pub fn doc(&self) -> String {
        self.summary
            .clone()
            .or_else(|| self.description.clone())
            .unwrap_or_default()
    }
}

/// Where a declared parameter is placed on the outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamLocation {
    Path,
    Query,
}

/// One declared operation parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    #[serde(rename = "in")]
    pub location: ParamLocation,
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub schema: Option<SchemaNode>,
}

/// A declared request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestBody {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: BTreeMap<String, MediaType>,
}

impl RequestBody {
    /// The JSON media-type schema, if declared.
    #[must_use]
    pub fn json_schema(&self) -> Option<&SchemaNode> {
        self.content
            .get("application/json")
            .and_then(|mt| mt.schema.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaType {
    #[serde(default)]
    pub schema: Option<SchemaNode>,
}

/// Description/default metadata attached to any schema node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaMetadata {
    pub description: Option<String>,
    pub default: Option<Value>,
}

/// A recursive, closed schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    String {
        /// Allowed values; empty means unconstrained.
        enumeration: Vec<String>,
        metadata: SchemaMetadata,
    },
    Number {
        minimum: Option<f64>,
        maximum: Option<f64>,
        metadata: SchemaMetadata,
    },
    Integer {
        minimum: Option<i64>,
        maximum: Option<i64>,
        metadata: SchemaMetadata,
    },
    Boolean {
        metadata: SchemaMetadata,
    },
    Array {
        items: Option<Box<SchemaNode>>,
        min_items: Option<u64>,
        metadata: SchemaMetadata,
    },
    Object {
        properties: BTreeMap<String, SchemaNode>,
        required: Vec<String>,
        metadata: SchemaMetadata,
    },
    /// Open/untyped: accepts any value.
    Any {
        metadata: SchemaMetadata,
    },
}

impl SchemaNode {
    /// An unconstrained node with no metadata.
    #[must_use]
    pub fn any() -> Self {
        SchemaNode::Any {
            metadata: SchemaMetadata::default(),
        }
    }

    /// An unconstrained string with a description, for injected arguments.
    #[must_use]
    pub fn string(description: impl Into<String>) -> Self {
        SchemaNode::String {
            enumeration: Vec::new(),
            metadata: SchemaMetadata {
                description: Some(description.into()),
                default: None,
            },
        }
    }

    pub fn metadata(&self) -> &SchemaMetadata {
        match self {
            SchemaNode::String { metadata, .. }
            | SchemaNode::Number { metadata, .. }
            | SchemaNode::Integer { metadata, .. }
            | SchemaNode::Boolean { metadata }
            | SchemaNode::Array { metadata, .. }
            | SchemaNode::Object { metadata, .. }
            | SchemaNode::Any { metadata } => metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut SchemaMetadata {
        match self {
            SchemaNode::String { metadata, .. }
            | SchemaNode::Number { metadata, .. }
            | SchemaNode::Integer { metadata, .. }
            | SchemaNode::Boolean { metadata }
            | SchemaNode::Array { metadata, .. }
            | SchemaNode::Object { metadata, .. }
            | SchemaNode::Any { metadata } => metadata,
        }
    }

    /// Classify a raw JSON Schema value into the closed variant set.
    ///
    /// Total over well-formed input: unrecognized or absent `type` tags
    /// classify structurally (`properties` -> object, `enum` -> string enum)
    /// and otherwise fall back to [`SchemaNode::Any`].
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return SchemaNode::any();
        };

        let metadata = SchemaMetadata {
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            default: obj.get("default").cloned(),
        };

        let declared = obj.get("type").and_then(Value::as_str);
        match declared {
            Some("string") => SchemaNode::String {
                enumeration: string_enum(obj.get("enum")),
                metadata,
            },
            Some("number") => SchemaNode::Number {
                minimum: obj.get("minimum").and_then(Value::as_f64),
                maximum: obj.get("maximum").and_then(Value::as_f64),
                metadata,
            },
            Some("integer") => SchemaNode::Integer {
                minimum: obj.get("minimum").and_then(Value::as_i64),
                maximum: obj.get("maximum").and_then(Value::as_i64),
                metadata,
            },
            Some("boolean") => SchemaNode::Boolean { metadata },
            Some("array") => SchemaNode::Array {
                items: obj.get("items").map(|v| Box::new(SchemaNode::from_value(v))),
                min_items: obj.get("minItems").and_then(Value::as_u64),
                metadata,
            },
            Some("object") => SchemaNode::Object {
                properties: object_properties(obj.get("properties")),
                required: string_enum(obj.get("required")),
                metadata,
            },
            // Unrecognized type tags stay open rather than failing startup.
            Some(_) => SchemaNode::Any { metadata },
            None => {
                if obj.contains_key("properties") {
                    SchemaNode::Object {
                        properties: object_properties(obj.get("properties")),
                        required: string_enum(obj.get("required")),
                        metadata,
                    }
                } else if obj.contains_key("enum") {
                    SchemaNode::String {
                        enumeration: string_enum(obj.get("enum")),
                        metadata,
                    }
                } else {
                    SchemaNode::Any { metadata }
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(SchemaNode::from_value(&value))
    }
}

fn string_enum(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn object_properties(value: Option<&Value>) -> BTreeMap<String, SchemaNode> {
    value
        .and_then(Value::as_object)
        .map(|props| {
            props
                .iter()
                .map(|(name, schema)| (name.clone(), SchemaNode::from_value(schema)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_a_minimal_description() {
        let yaml = r#"
servers:
  - url: https://{appId}.example.net
    variables:
      appId:
        description: Application host slot
paths:
  /1/indexes/{indexName}/settings:
    put:
      operationId: setSettings
      summary: Update index settings
      parameters:
        - in: path
          name: indexName
          required: true
          schema: { type: string }
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              properties:
                attributesForFaceting:
                  type: array
                  items: { type: string }
"#;
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        let description = ApiDescription::from_value(value).unwrap();

        let ops: Vec<_> = description.operations().collect();
        assert_eq!(ops.len(), 1);
        let (path, method, op) = ops[0];
        assert_eq!(path, "/1/indexes/{indexName}/settings");
        assert_eq!(method, "put");
        assert_eq!(op.operation_id, "setSettings");
        assert_eq!(op.doc(), "Update index settings");
        assert!(op.request_body.as_ref().unwrap().json_schema().is_some());
        assert_eq!(op.parameters[0].location, ParamLocation::Path);
    }

    #[test]
    fn classifies_untyped_nodes_structurally() {
        let with_props = SchemaNode::from_value(&json!({
            "properties": { "a": { "type": "string" } },
            "required": ["a"]
        }));
        assert!(matches!(with_props, SchemaNode::Object { .. }));

        let bare_enum = SchemaNode::from_value(&json!({ "enum": ["x", "y"] }));
        match bare_enum {
            SchemaNode::String { enumeration, .. } => assert_eq!(enumeration, vec!["x", "y"]),
            other => panic!("expected string enum, got {other:?}"),
        }

        assert_eq!(SchemaNode::from_value(&json!({})), SchemaNode::any());
    }

    #[test]
    fn keeps_metadata_and_bounds() {
        let node = SchemaNode::from_value(&json!({
            "type": "integer",
            "minimum": 0,
            "maximum": 1000,
            "description": "hits per page",
            "default": 20
        }));

        match &node {
            SchemaNode::Integer {
                minimum, maximum, ..
            } => {
                assert_eq!(*minimum, Some(0));
                assert_eq!(*maximum, Some(1000));
            }
            other => panic!("expected integer, got {other:?}"),
        }
        assert_eq!(node.metadata().description.as_deref(), Some("hits per page"));
        assert_eq!(node.metadata().default, Some(json!(20)));
    }
}
