//! Schema validation, style linting, and breaking-change checks
//!
//! Three layers, from strict to advisory:
//! 1. **Structural check** (`check_schema`): the document must be a schema
//!    object with a valid `id`, `lexicon` version, and non-empty `defs`.
//!    Failures here make a document unusable for comparison or publication.
//! 2. **Style lints** (`lint_schema`): best-practice warnings that never
//!    block an operation on their own.
//! 3. **Evolution checks** (`breaking_changes`): rules about what may change
//!    between an already-published schema and its local successor.

use std::collections::BTreeSet;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::nsid::Nsid;

/// Top-level fields a schema document may carry. Anything else is flagged
/// by the strict lint pass.
const KNOWN_FIELDS: &[&str] = &["lexicon", "id", "revision", "description", "defs", "$type"];

/// Severity of a lint finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LintLevel {
    Warn,
    Error,
}

/// A single lint or breaking-change finding
#[derive(Debug, Clone, Serialize)]
pub struct LintIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nsid: Option<String>,
    pub level: LintLevel,
    pub name: &'static str,
    pub message: String,
}

impl LintIssue {
    fn new(level: LintLevel, name: &'static str, message: impl Into<String>) -> Self {
        Self {
            file_path: None,
            nsid: None,
            level,
            name,
            message: message.into(),
        }
    }
}

/// Validate the structural shape of a schema document and extract its
/// identifier. Returns a plain message on failure so callers can attach
/// their own context (file path, record key).
pub fn check_schema(doc: &Value) -> Result<Nsid, String> {
    let obj = doc
        .as_object()
        .ok_or_else(|| "schema document must be a JSON object".to_string())?;

    match obj.get("lexicon") {
        Some(v) if v.as_u64() == Some(1) => {}
        Some(v) => return Err(format!("unsupported lexicon language version: {v}")),
        None => return Err("missing 'lexicon' language version field".to_string()),
    }

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| "missing 'id' field".to_string())?;
    let nsid = Nsid::parse(id).map_err(|_| format!("'id' is not a valid NSID: {id}"))?;

    let defs = obj
        .get("defs")
        .and_then(Value::as_object)
        .ok_or_else(|| "missing 'defs' object".to_string())?;
    if defs.is_empty() {
        return Err("'defs' must contain at least one definition".to_string());
    }
    for (name, def) in defs {
        let def_obj = def
            .as_object()
            .ok_or_else(|| format!("definition '{name}' must be an object"))?;
        if !def_obj.get("type").map(Value::is_string).unwrap_or(false) {
            return Err(format!("definition '{name}' missing 'type' field"));
        }
    }

    Ok(nsid)
}

/// Run style and best-practice lints over a structurally valid document.
pub fn lint_schema(doc: &Value) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let Some(obj) = doc.as_object() else {
        return issues;
    };

    for key in obj.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            issues.push(LintIssue::new(
                LintLevel::Warn,
                "unexpected-field",
                format!("schema JSON contains unexpected top-level field '{key}'"),
            ));
        }
    }

    let Some(defs) = obj.get("defs").and_then(Value::as_object) else {
        return issues;
    };
    let name_re = Regex::new(r"^[a-z][a-zA-Z0-9]*$").expect("static regex");

    for (name, def) in defs {
        if !name_re.is_match(name) {
            issues.push(LintIssue::new(
                LintLevel::Warn,
                "definition-name-style",
                format!("definition name '{name}' should be lowerCamelCase"),
            ));
        }
        let def_type = def.get("type").and_then(Value::as_str).unwrap_or("");
        if name == "main" && def.get("description").is_none() {
            issues.push(LintIssue::new(
                LintLevel::Warn,
                "missing-description",
                "main definition should have a description".to_string(),
            ));
        }
        if def_type == "record" && def.get("key").is_none() {
            issues.push(LintIssue::new(
                LintLevel::Error,
                "record-missing-key",
                format!("record definition '{name}' missing 'key' field"),
            ));
        }
    }

    issues
}

/// Check evolution rules between a published schema (`old`) and its local
/// successor (`new`). Both must already pass `check_schema`.
pub fn breaking_changes(old: &Value, new: &Value) -> Vec<LintIssue> {
    let mut issues = Vec::new();
    let empty = serde_json::Map::new();
    let old_defs = old.get("defs").and_then(Value::as_object).unwrap_or(&empty);
    let new_defs = new.get("defs").and_then(Value::as_object).unwrap_or(&empty);

    for (name, old_def) in old_defs {
        let Some(new_def) = new_defs.get(name) else {
            issues.push(LintIssue::new(
                LintLevel::Error,
                "removed-definition",
                format!("definition '{name}' was removed"),
            ));
            continue;
        };

        let old_type = old_def.get("type").and_then(Value::as_str).unwrap_or("");
        let new_type = new_def.get("type").and_then(Value::as_str).unwrap_or("");
        if old_type != new_type {
            issues.push(LintIssue::new(
                LintLevel::Error,
                "definition-type-changed",
                format!("definition '{name}' changed type from '{old_type}' to '{new_type}'"),
            ));
            continue;
        }

        match old_type {
            "object" => check_object_evolution(name, old_def, new_def, &mut issues),
            "record" => {
                if let (Some(old_rec), Some(new_rec)) = (old_def.get("record"), new_def.get("record")) {
                    check_object_evolution(name, old_rec, new_rec, &mut issues);
                }
            }
            _ => {}
        }
    }

    issues
}

fn check_object_evolution(def_name: &str, old: &Value, new: &Value, issues: &mut Vec<LintIssue>) {
    let empty = serde_json::Map::new();
    let old_props = old
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let new_props = new
        .get("properties")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    for (field, old_field) in old_props {
        let Some(new_field) = new_props.get(field) else {
            issues.push(LintIssue::new(
                LintLevel::Error,
                "removed-field",
                format!("field '{def_name}.{field}' was removed"),
            ));
            continue;
        };
        let old_type = old_field.get("type").and_then(Value::as_str).unwrap_or("");
        let new_type = new_field.get("type").and_then(Value::as_str).unwrap_or("");
        if old_type != new_type {
            issues.push(LintIssue::new(
                LintLevel::Error,
                "field-type-changed",
                format!(
                    "field '{def_name}.{field}' changed type from '{old_type}' to '{new_type}'"
                ),
            ));
        }
    }

    let required_set = |v: &Value| -> BTreeSet<String> {
        v.get("required")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };
    let old_required = required_set(old);
    for field in required_set(new).difference(&old_required) {
        issues.push(LintIssue::new(
            LintLevel::Error,
            "new-required-field",
            format!("field '{def_name}.{field}' is newly required"),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_schema() -> Value {
        json!({
            "lexicon": 1,
            "id": "com.example.foo",
            "defs": {
                "main": {
                    "type": "record",
                    "description": "a thing",
                    "key": "tid",
                    "record": {
                        "type": "object",
                        "required": ["name"],
                        "properties": {
                            "name": { "type": "string" },
                            "count": { "type": "integer" }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn test_check_schema_valid() {
        let nsid = check_schema(&valid_schema()).unwrap();
        assert_eq!(nsid.as_str(), "com.example.foo");
    }

    #[test]
    fn test_check_schema_rejects_bad_shapes() {
        assert!(check_schema(&json!([])).is_err());
        assert!(check_schema(&json!({"id": "com.example.foo"})).is_err());
        assert!(check_schema(&json!({"lexicon": 2, "id": "com.example.foo", "defs": {}})).is_err());
        assert!(check_schema(&json!({"lexicon": 1, "id": "not an nsid", "defs": {"main": {"type": "record"}}})).is_err());
        assert!(check_schema(&json!({"lexicon": 1, "id": "com.example.foo", "defs": {}})).is_err());
    }

    #[test]
    fn test_lint_clean_schema() {
        assert!(lint_schema(&valid_schema()).is_empty());
    }

    #[test]
    fn test_lint_unexpected_field() {
        let mut schema = valid_schema();
        schema["bogus"] = json!(true);
        let issues = lint_schema(&schema);
        assert!(issues.iter().any(|i| i.name == "unexpected-field"));
    }

    #[test]
    fn test_lint_record_missing_key() {
        let mut schema = valid_schema();
        schema["defs"]["main"].as_object_mut().unwrap().remove("key");
        let issues = lint_schema(&schema);
        assert!(issues
            .iter()
            .any(|i| i.name == "record-missing-key" && i.level == LintLevel::Error));
    }

    #[test]
    fn test_breaking_no_changes() {
        let schema = valid_schema();
        assert!(breaking_changes(&schema, &schema).is_empty());
    }

    #[test]
    fn test_breaking_removed_field() {
        let old = valid_schema();
        let mut new = valid_schema();
        new["defs"]["main"]["record"]["properties"]
            .as_object_mut()
            .unwrap()
            .remove("count");
        let issues = breaking_changes(&old, &new);
        assert!(issues.iter().any(|i| i.name == "removed-field"));
    }

    #[test]
    fn test_breaking_new_required_field() {
        let old = valid_schema();
        let mut new = valid_schema();
        new["defs"]["main"]["record"]["required"] = json!(["name", "count"]);
        let issues = breaking_changes(&old, &new);
        assert!(issues.iter().any(|i| i.name == "new-required-field"));
    }

    #[test]
    fn test_breaking_removed_definition() {
        let old = valid_schema();
        let new = json!({
            "lexicon": 1,
            "id": "com.example.foo",
            "defs": { "other": { "type": "string" } }
        });
        let issues = breaking_changes(&old, &new);
        assert!(issues.iter().any(|i| i.name == "removed-definition"));
    }

    #[test]
    fn test_breaking_field_type_changed() {
        let old = valid_schema();
        let mut new = valid_schema();
        new["defs"]["main"]["record"]["properties"]["count"]["type"] = json!("string");
        let issues = breaking_changes(&old, &new);
        assert!(issues.iter().any(|i| i.name == "field-type-changed"));
    }
}
