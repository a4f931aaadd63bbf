//! Internal `$ref` expansion.
//!
//! API descriptions routinely factor shared parameter and schema definitions
//! into `components` and point at them with internal JSON-pointer references.
//! The rest of the compiler wants a self-contained tree, so expansion runs
//! first: [`expand_refs`] returns a copy of the input with zero remaining
//! references.
//!
//! Expansion is pure. Cyclic pointer chains are rejected rather than inlined
//! infinitely, and sibling keys next to a `$ref` (e.g. a local description
//! override) survive inlining, with the local key winning.

use crate::error::{Result, SpecError};
use serde_json::{Map, Value};

/// Inline every internal `$ref` in `root` into a self-contained tree.
///
/// # Errors
///
/// Returns [`SpecError::MalformedReference`] for a non-string `$ref`, an
/// external reference, or a pointer with no target, and
/// [`SpecError::CyclicReference`] when an expansion path revisits itself.
pub fn expand_refs(root: &Value) -> Result<Value> {
    let mut in_flight: Vec<String> = Vec::new();
    expand_node(root, root, &mut in_flight)
}

fn expand_node(root: &Value, node: &Value, in_flight: &mut Vec<String>) -> Result<Value> {
    match node {
        Value::Object(map) => {
            if map.contains_key("$ref") {
                expand_reference(root, map, in_flight)
            } else {
                let mut out = Map::with_capacity(map.len());
                for (key, value) in map {
                    out.insert(key.clone(), expand_node(root, value, in_flight)?);
                }
                Ok(Value::Object(out))
            }
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(expand_node(root, item, in_flight)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

fn expand_reference(
    root: &Value,
    map: &Map<String, Value>,
    in_flight: &mut Vec<String>,
) -> Result<Value> {
    let reference = match &map["$ref"] {
        Value::String(s) => s.clone(),
        other => {
            return Err(SpecError::MalformedReference {
                pointer: other.to_string(),
                reason: "$ref must be a string".to_string(),
            });
        }
    };

    if in_flight.iter().any(|p| p == &reference) {
        return Err(SpecError::CyclicReference { pointer: reference });
    }

    let target = lookup(root, &reference)?;

    in_flight.push(reference.clone());
    let expanded = expand_node(root, target, in_flight)?;
    in_flight.pop();

    // Preserve sibling keys: local keys overlay the expanded target.
    let siblings: Vec<(&String, &Value)> = map.iter().filter(|(k, _)| *k != "$ref").collect();
    if siblings.is_empty() {
        return Ok(expanded);
    }

    let Value::Object(mut merged) = expanded else {
        // Non-object targets have no keys to overlay; the reference wins.
        return Ok(expanded);
    };
    for (key, value) in siblings {
        merged.insert(key.clone(), expand_node(root, value, in_flight)?);
    }
    Ok(Value::Object(merged))
}

fn lookup<'a>(root: &'a Value, reference: &str) -> Result<&'a Value> {
    let Some(fragment) = reference.strip_prefix('#') else {
        return Err(SpecError::MalformedReference {
            pointer: reference.to_string(),
            reason: "only internal '#/...' references are supported".to_string(),
        });
    };

    if fragment.is_empty() {
        return Ok(root);
    }

    if !fragment.starts_with('/') {
        return Err(SpecError::MalformedReference {
            pointer: reference.to_string(),
            reason: "expected JSON pointer starting with '/'".to_string(),
        });
    }

    root.pointer(fragment)
        .ok_or_else(|| SpecError::MalformedReference {
            pointer: reference.to_string(),
            reason: format!("missing pointer '{fragment}'"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn inlines_internal_schema_ref() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Name": { "type": "string", "description": "a name" }
                }
            },
            "paths": {
                "/x": { "schema": { "$ref": "#/components/schemas/Name" } }
            }
        });

        let expanded = expand_refs(&doc).unwrap();
        assert_eq!(
            expanded.pointer("/paths/~1x/schema/type"),
            Some(&json!("string"))
        );
        assert_eq!(
            expanded.pointer("/paths/~1x/schema/description"),
            Some(&json!("a name"))
        );
    }

    #[test]
    fn follows_chained_refs() {
        let doc = json!({
            "a": { "$ref": "#/b" },
            "b": { "$ref": "#/c" },
            "c": { "type": "integer" }
        });

        let expanded = expand_refs(&doc).unwrap();
        assert_eq!(expanded.pointer("/a/type"), Some(&json!("integer")));
    }

    #[test]
    fn sibling_keys_override_expanded_target() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Name": { "type": "string", "description": "generic" }
                }
            },
            "param": {
                "$ref": "#/components/schemas/Name",
                "description": "specific"
            }
        });

        let expanded = expand_refs(&doc).unwrap();
        assert_eq!(expanded.pointer("/param/type"), Some(&json!("string")));
        assert_eq!(
            expanded.pointer("/param/description"),
            Some(&json!("specific"))
        );
    }

    #[test]
    fn cyclic_refs_are_rejected() {
        let doc = json!({
            "a": { "$ref": "#/b" },
            "b": { "$ref": "#/a" }
        });

        let err = expand_refs(&doc).unwrap_err();
        assert!(matches!(err, SpecError::CyclicReference { .. }));
    }

    #[test]
    fn self_referencing_node_is_rejected() {
        let doc = json!({ "a": { "$ref": "#/a" } });
        let err = expand_refs(&doc).unwrap_err();
        assert!(matches!(err, SpecError::CyclicReference { .. }));
    }

    #[test]
    fn repeated_ref_in_sibling_branches_is_not_a_cycle() {
        let doc = json!({
            "shared": { "type": "boolean" },
            "x": { "$ref": "#/shared" },
            "y": { "$ref": "#/shared" }
        });

        let expanded = expand_refs(&doc).unwrap();
        assert_eq!(expanded.pointer("/x/type"), Some(&json!("boolean")));
        assert_eq!(expanded.pointer("/y/type"), Some(&json!("boolean")));
    }

    #[test]
    fn missing_pointer_names_the_reference() {
        let doc = json!({ "a": { "$ref": "#/nope/nothing" } });
        let err = expand_refs(&doc).unwrap_err();
        match err {
            SpecError::MalformedReference { pointer, .. } => {
                assert_eq!(pointer, "#/nope/nothing");
            }
            other => panic!("expected MalformedReference, got {other}"),
        }
    }

    #[test]
    fn external_references_are_rejected() {
        let doc = json!({ "a": { "$ref": "common.yaml#/components/schemas/X" } });
        let err = expand_refs(&doc).unwrap_err();
        assert!(matches!(err, SpecError::MalformedReference { .. }));
    }

    #[test]
    fn refs_inside_arrays_are_expanded() {
        let doc = json!({
            "defs": { "Q": { "name": "q", "in": "query" } },
            "parameters": [ { "$ref": "#/defs/Q" } ]
        });

        let expanded = expand_refs(&doc).unwrap();
        assert_eq!(expanded.pointer("/parameters/0/name"), Some(&json!("q")));
    }
}
