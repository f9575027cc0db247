//! Schema validation and default filling.
//!
//! Configuration arrives as untyped JSON. Before it is decoded into the
//! typed model it goes through two passes over the [`Schema`]:
//!
//! - [`validate`] reports missing required values, type mismatches, item
//!   count violations and strings that do not match their attribute's
//!   pattern, each as a [`Diagnostic`] carrying the dotted attribute path;
//! - [`apply_defaults`] fills absent attributes with their schema default.
//!
//! # Example
//!
//! ```
//! use hemmer_provider_ghost::schema::{Attribute, Schema};
//! use hemmer_provider_ghost::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("vpc_id", Attribute::required_string().with_pattern("^vpc-[a-z0-9]*$"));
//!
//! assert!(validate(&schema, &json!({"vpc_id": "vpc-3f1eb65a"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"vpc_id": "subnet-1"}));
//! assert_eq!(diagnostics[0].summary, "\"vpc_id\" must match ^vpc-[a-z0-9]*$");
//! ```

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

use crate::schema::{Attribute, AttributeType, Block, Diagnostic, NestedBlock, Schema};
use regex::Regex;
use serde_json::Value;

/// Compiled attribute patterns, keyed by source.
static PATTERNS: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Validate a JSON value against a schema.
///
/// Returns one diagnostic per problem; an empty list means the value is valid.
/// Computed-only attributes are skipped, absent optional attributes are fine.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Fill absent or null attributes with their schema default, recursing into
/// every item of every nested block.
pub fn apply_defaults(schema: &Schema, value: &mut Value) {
    apply_block_defaults(&schema.block, value);
}

/// Check `value` against a regular expression, producing the diagnostic
/// reported for attribute `path` when it does not match.
pub fn matches_pattern(pattern: &str, value: &str, path: &str) -> Option<Diagnostic> {
    match compiled(pattern) {
        Ok(re) if re.is_match(value) => None,
        Ok(_) => Some(
            Diagnostic::error(format!("\"{}\" must match {}", path, pattern))
                .with_attribute(path),
        ),
        Err(err) => Some(
            Diagnostic::error(format!("Invalid pattern for attribute '{}'", path))
                .with_detail(err.to_string())
                .with_attribute(path),
        ),
    }
}

fn compiled(pattern: &str) -> Result<Regex, regex::Error> {
    let mut patterns = PATTERNS.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(re) = patterns.get(pattern) {
        return Ok(re.clone());
    }

    let re = Regex::new(pattern)?;
    patterns.insert(pattern.to_string(), re.clone());
    Ok(re)
}

fn apply_block_defaults(block: &Block, value: &mut Value) {
    let Value::Object(obj) = value else {
        return;
    };

    for (name, attr) in &block.attributes {
        if let Some(default) = &attr.default {
            let slot = obj.entry(name.clone()).or_insert(Value::Null);
            if slot.is_null() {
                *slot = default.clone();
            }
        }
    }

    for (name, nested) in &block.blocks {
        if let Some(Value::Array(items)) = obj.get_mut(name) {
            for item in items {
                apply_block_defaults(&nested.block, item);
            }
        }
    }
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag = Diagnostic::error("Expected object")
                .with_detail(format!("Got {}", type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.computed && !attr.flags.optional && !attr.flags.required {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_type(&attr.attr_type, v, path, diagnostics);

            // Only check the format of values that have the right type
            if diagnostics.len() == before {
                if let (Some(pattern), Some(s)) = (&attr.pattern, v.as_str()) {
                    diagnostics.extend(matches_pattern(pattern, s, path));
                }
            }
        },
    }
}

fn validate_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match attr_type {
        AttributeType::String => {
            if !value.is_string() {
                diagnostics.push(type_error(path, "string", value));
            }
        },
        AttributeType::Int64 => {
            if !is_int64(value) {
                diagnostics.push(type_error(path, "int64", value));
            }
        },
        AttributeType::Bool => {
            if !value.is_boolean() {
                diagnostics.push(type_error(path, "bool", value));
            }
        },
        AttributeType::List(element_type) | AttributeType::Set(element_type) => {
            let Some(items) = value.as_array() else {
                let expected = if matches!(attr_type, AttributeType::Set(_)) {
                    "set"
                } else {
                    "list"
                };
                diagnostics.push(type_error(path, expected, value));
                return;
            };
            for (i, item) in items.iter().enumerate() {
                validate_type(element_type, item, &format!("{}.{}", path, i), diagnostics);
            }
            if matches!(attr_type, AttributeType::Set(_)) {
                check_unique(items, path, diagnostics);
            }
        },
    }
}

fn check_unique(items: &[Value], path: &str, diagnostics: &mut Vec<Diagnostic>) {
    for (i, item) in items.iter().enumerate() {
        if items[..i].contains(item) {
            diagnostics.push(
                Diagnostic::error(format!("Duplicate value in set '{}'", path))
                    .with_detail(format!("{} appears more than once", item))
                    .with_attribute(format!("{}.{}", path, i)),
            );
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let items = match value {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(v) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", type_name(v)))
                    .with_attribute(path),
            );
            return;
        },
    };

    let len = items.len() as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }

    for (i, item) in items.iter().enumerate() {
        validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    matches!(value, Value::Number(n) if n.is_i64())
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic::error(format!("Invalid type for attribute '{}'", path))
        .with_detail(format!("Expected {}, got {}", expected, type_name(got)))
        .with_attribute(path)
}

/// Drop null entries from an object so serde defaults apply to them.
pub(crate) fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            obj.retain(|_, v| !v.is_null());
            obj.values_mut().for_each(strip_nulls);
        },
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Block, NestedBlock};
    use serde_json::json;

    #[test]
    fn test_required_string() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());

        assert!(validate(&schema, &json!({"name": "web"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));

        let diagnostics = validate(&schema, &json!({"name": null}));
        assert_eq!(diagnostics.len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_computed_attribute_skipped() {
        let schema = Schema::v0().with_attribute("id", Attribute::computed_string());
        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"id": 123})).is_empty());
    }

    #[test]
    fn test_int64() {
        let schema = Schema::v0().with_attribute("max", Attribute::required_int64());

        assert!(validate(&schema, &json!({"max": 3})).is_empty());
        assert!(validate(&schema, &json!({"max": -1})).is_empty());
        assert_eq!(validate(&schema, &json!({"max": 3.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"max": "3"})).len(), 1);
    }

    #[test]
    fn test_pattern_matches() {
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::required_string().with_pattern("^[a-zA-Z0-9]*$"),
        );

        assert!(validate(&schema, &json!({"name": "thisIsAPositiveTest"})).is_empty());

        let diagnostics = validate(&schema, &json!({"name": "thisIsANegativeTest-"}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "\"name\" must match ^[a-zA-Z0-9]*$");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
    }

    #[test]
    fn test_pattern_not_checked_on_wrong_type() {
        let schema = Schema::v0().with_attribute(
            "name",
            Attribute::required_string().with_pattern("^[a-z]*$"),
        );

        let diagnostics = validate(&schema, &json!({"name": 42}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Invalid type"));
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let diag = matches_pattern("([a-z", "abc", "name").unwrap();
        assert!(diag.summary.contains("Invalid pattern"));
        assert!(diag.detail.is_some());
        assert!(!PATTERNS.lock().unwrap().contains_key("([a-z"));
    }

    #[test]
    fn test_pattern_compiled_once() {
        let pattern = "^cached-[0-9]+$";
        assert!(matches_pattern(pattern, "cached-1", "name").is_none());
        assert!(matches_pattern(pattern, "cached-x", "name").is_some());

        let patterns = PATTERNS.lock().unwrap();
        assert!(patterns.contains_key(pattern));
        assert_eq!(patterns.keys().filter(|key| key.as_str() == pattern).count(), 1);
    }

    #[test]
    fn test_string_set() {
        let schema =
            Schema::v0().with_attribute("security_groups", Attribute::optional_string_set());

        assert!(validate(&schema, &json!({"security_groups": ["sg-1", "sg-2"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"security_groups": ["sg-1", "sg-1"]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("security_groups.1"));

        let diagnostics = validate(&schema, &json!({"security_groups": ["sg-1", 2]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("security_groups.1"));
    }

    #[test]
    fn test_list_of_one_bounds() {
        let schema = Schema::v0().with_block(
            "build_infos",
            NestedBlock::list_of_one(
                Block::new().with_attribute("source_ami", Attribute::required_string()),
            )
            .with_min_items(1),
        );

        assert!(validate(&schema, &json!({"build_infos": [{"source_ami": "ami-1"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(
            &schema,
            &json!({"build_infos": [{"source_ami": "ami-1"}, {"source_ami": "ami-2"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));

        let diagnostics = validate(&schema, &json!({"build_infos": {"source_ami": "ami-1"}}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_deeply_nested_path() {
        let schema = Schema::v0().with_block(
            "environment_infos",
            NestedBlock::list_of_one(Block::new().with_block(
                "optional_volumes",
                NestedBlock::list(
                    Block::new().with_attribute("volume_size", Attribute::required_int64()),
                ),
            )),
        );

        let diagnostics = validate(
            &schema,
            &json!({"environment_infos": [{"optional_volumes": [{"volume_size": "big"}]}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("environment_infos.0.optional_volumes.0.volume_size")
        );
    }

    #[test]
    fn test_root_not_object() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        let diagnostics = validate(&schema, &json!("not an object"));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Expected object"));
        assert!(diagnostics[0].attribute.is_none());
    }

    #[test]
    fn test_apply_defaults() {
        let schema = Schema::v0()
            .with_attribute(
                "instance_monitoring",
                Attribute::optional_bool().with_default(json!(false)),
            )
            .with_block(
                "build_infos",
                NestedBlock::list_of_one(
                    Block::new()
                        .with_attribute(
                            "ssh_username",
                            Attribute::optional_string().with_default(json!("admin")),
                        )
                        .with_attribute("source_ami", Attribute::required_string()),
                ),
            );

        let mut value = json!({
            "instance_monitoring": null,
            "build_infos": [{"source_ami": "ami-1"}]
        });
        apply_defaults(&schema, &mut value);

        assert_eq!(value["instance_monitoring"], false);
        assert_eq!(value["build_infos"][0]["ssh_username"], "admin");
        assert_eq!(value["build_infos"][0]["source_ami"], "ami-1");

        // Explicit values win
        let mut value = json!({"build_infos": [{"ssh_username": "ec2-user"}]});
        apply_defaults(&schema, &mut value);
        assert_eq!(value["build_infos"][0]["ssh_username"], "ec2-user");
    }

    #[test]
    fn test_strip_nulls() {
        let mut value = json!({"a": null, "b": [{"c": null, "d": 1}]});
        strip_nulls(&mut value);
        assert_eq!(value, json!({"b": [{"d": 1}]}));
    }
}
