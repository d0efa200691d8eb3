//! Schema document canonicalization and reconciliation verdicts
//!
//! Local files are the editable source of truth and never carry the `$type`
//! discriminator; published records always do. Equality is therefore defined
//! over the canonicalized form: the JSON value tree with the top-level
//! `$type` key removed. Nested `$type` occurrences are part of the schema
//! itself and are preserved.

use serde_json::Value;

/// Transport-only discriminator field on published records.
pub const TYPE_FIELD: &str = "$type";

/// Classification of one identifier across the local and remote catalogs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Present locally, never published.
    LocalOnly,
    /// Published, but not present locally.
    RemoteOnly,
    /// Present on both sides with equal canonical content.
    Identical,
    /// Present on both sides with differing content.
    Diverged,
}

/// Strip the top-level `$type` key, returning the canonical comparison form.
pub fn canonicalize(doc: &Value) -> Value {
    match doc {
        Value::Object(map) => {
            let mut map = map.clone();
            map.remove(TYPE_FIELD);
            Value::Object(map)
        }
        other => other.clone(),
    }
}

/// Classify a local/remote document pair.
///
/// At least one side must be present: the caller iterates the union of
/// catalog keys, so both-absent cannot occur.
pub fn classify(local: Option<&Value>, remote: Option<&Value>) -> Verdict {
    match (local, remote) {
        (Some(_), None) => Verdict::LocalOnly,
        (None, Some(_)) => Verdict::RemoteOnly,
        (Some(l), Some(r)) => {
            if canonicalize(l) == canonicalize(r) {
                Verdict::Identical
            } else {
                Verdict::Diverged
            }
        }
        (None, None) => unreachable!("identifier absent from both catalogs"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonicalize_strips_top_level_type_only() {
        let doc = json!({
            "$type": "com.atproto.lexicon.schema",
            "id": "com.example.foo",
            "defs": {
                "main": { "$type": "kept", "type": "record" }
            }
        });
        let canon = canonicalize(&doc);
        assert!(canon.get(TYPE_FIELD).is_none());
        assert_eq!(canon["defs"]["main"]["$type"], json!("kept"));
    }

    #[test]
    fn test_type_field_never_diverges() {
        let local = json!({"id": "com.example.foo", "x": 1});
        let remote = json!({"$type": "com.atproto.lexicon.schema", "id": "com.example.foo", "x": 1});
        assert_eq!(classify(Some(&local), Some(&remote)), Verdict::Identical);
        // differing $type values are still identical
        let remote2 = json!({"$type": "something.else", "id": "com.example.foo", "x": 1});
        assert_eq!(classify(Some(&local), Some(&remote2)), Verdict::Identical);
    }

    #[test]
    fn test_content_difference_diverges() {
        let local = json!({"id": "com.example.foo", "x": 2});
        let remote = json!({"$type": "com.atproto.lexicon.schema", "id": "com.example.foo", "x": 1});
        assert_eq!(classify(Some(&local), Some(&remote)), Verdict::Diverged);
    }

    #[test]
    fn test_one_sided() {
        let doc = json!({"id": "com.example.foo"});
        assert_eq!(classify(Some(&doc), None), Verdict::LocalOnly);
        assert_eq!(classify(None, Some(&doc)), Verdict::RemoteOnly);
    }

    #[test]
    fn test_self_classify_identical() {
        let doc = json!({"id": "com.example.foo", "defs": {"main": {"type": "record"}}});
        assert_eq!(classify(Some(&doc), Some(&doc)), Verdict::Identical);
    }
}
