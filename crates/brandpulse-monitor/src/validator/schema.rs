//! JSON schema for constrained model output.
//!
//! Strict structured output requires every object to set
//! `additionalProperties: false`, list every property in `required`, and be
//! fully inlined (no `$ref`). Numeric `format` hints are not accepted either.

use schemars::{schema_for, JsonSchema};
use serde_json::Value;

/// Strict-mode schema for `T`.
#[must_use]
pub fn strict_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(schema).unwrap_or_default();

    inline_refs(&mut value);
    fix_object_schemas(&mut value);
    strip_formats(&mut value);

    if let Value::Object(map) = &mut value {
        map.remove("definitions");
        map.remove("$schema");
        map.remove("title");
    }

    value
}

/// Schema name sent alongside the schema body.
#[must_use]
pub fn schema_name<T: JsonSchema>() -> String {
    <T as JsonSchema>::schema_name()
}

fn fix_object_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));

                if let Some(Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<Value> =
                        props.keys().map(|k| Value::String(k.clone())).collect();
                    map.insert("required".to_string(), Value::Array(all_keys));
                }
            }
            for v in map.values_mut() {
                fix_object_schemas(v);
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(fix_object_schemas),
        _ => {}
    }
}

fn strip_formats(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if matches!(map.get("format"), Some(Value::String(_))) {
                map.remove("format");
            }
            map.values_mut().for_each(strip_formats);
        }
        Value::Array(arr) => arr.iter_mut().for_each(strip_formats),
        _ => {}
    }
}

fn inline_refs(value: &mut Value) {
    let definitions = match value {
        Value::Object(map) => map.get("definitions").cloned(),
        _ => None,
    };
    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(def) = ref_path
                    .strip_prefix("#/definitions/")
                    .and_then(|name| definitions.get(name))
                {
                    *value = def.clone();
                    inline_refs_recursive(value, definitions);
                    return;
                }
            }

            // schemars wraps documented `$ref` fields as `allOf: [ {$ref} ]`
            if let Some(Value::Array(all_of)) = map.get("allOf").cloned() {
                if let [single] = all_of.as_slice() {
                    let description = map.get("description").cloned();
                    *value = single.clone();
                    inline_refs_recursive(value, definitions);
                    if let (Some(desc), Value::Object(inlined)) = (description, &mut *value) {
                        inlined.insert("description".to_string(), desc);
                    }
                    return;
                }
            }

            for v in map.values_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidationResult;

    fn schema() -> Value {
        strict_schema::<ValidationResult>()
    }

    #[test]
    fn top_level_is_closed_object() {
        let schema = schema();
        let obj = schema.as_object().unwrap();
        assert_eq!(obj.get("type"), Some(&Value::String("object".to_string())));
        assert_eq!(obj.get("additionalProperties"), Some(&Value::Bool(false)));
        assert!(!obj.contains_key("definitions"));
        assert!(!obj.contains_key("$schema"));
    }

    #[test]
    fn all_four_fields_are_required() {
        let schema = schema();
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        for field in ["is_relevant", "subject", "sentiment", "sentiment_score"] {
            assert!(required.contains(&field), "missing {field}");
        }
        assert_eq!(required.len(), 4);
    }

    #[test]
    fn enums_are_inlined_with_display_labels() {
        let text = serde_json::to_string(&schema()).unwrap();
        assert!(!text.contains("$ref"));
        assert!(text.contains("User Experience"));
        assert!(text.contains("\"mixed\""));
    }

    #[test]
    fn numeric_format_hints_are_removed() {
        let text = serde_json::to_string(&schema()).unwrap();
        assert!(!text.contains("\"format\""));
    }

    #[test]
    fn name_is_type_name() {
        assert_eq!(schema_name::<ValidationResult>(), "ValidationResult");
    }
}
