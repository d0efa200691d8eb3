//! Built-in schema templates for the `new` command

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::catalog;
use crate::error::{Result, SyncError};
use crate::nsid::Nsid;

const TMPL_RECORD: &str = include_str!("../templates/record.json");
const TMPL_QUERY: &str = include_str!("../templates/query.json");
const TMPL_PROCEDURE: &str = include_str!("../templates/procedure.json");
const TMPL_PERMISSION_SET: &str = include_str!("../templates/permission-set.json");

/// Available template names, in listing order.
pub const TEMPLATE_NAMES: &[&str] = &["record", "query", "procedure", "permission-set"];

/// Instantiate a template with the given NSID substituted as its `id`.
pub fn instantiate(kind: &str, nsid: &Nsid) -> Result<Value> {
    let raw = match kind {
        "record" => TMPL_RECORD,
        "query" => TMPL_QUERY,
        "procedure" => TMPL_PROCEDURE,
        "permission-set" => TMPL_PERMISSION_SET,
        _ => return Err(SyncError::UnknownTemplate(kind.to_string())),
    };
    let mut doc: Value = serde_json::from_str(raw)?;
    if let Some(map) = doc.as_object_mut() {
        map.insert("id".to_string(), Value::from(nsid.as_str()));
    }
    Ok(doc)
}

/// Instantiate a template and write it to the identifier's canonical path.
/// Refuses to overwrite an existing file.
pub fn create_schema_file(
    kind: &str,
    nsid: &Nsid,
    lexicons_dir: &Path,
    output_dir: Option<&Path>,
) -> Result<PathBuf> {
    let doc = instantiate(kind, nsid)?;
    let fpath = catalog::path_for_nsid(lexicons_dir, output_dir, nsid);
    if fpath.exists() {
        return Err(SyncError::FileExists(fpath));
    }
    catalog::write_schema_file(&fpath, &doc)?;
    Ok(fpath)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lint;
    use tempfile::tempdir;

    #[test]
    fn test_all_templates_are_valid_schemas() {
        let nsid = Nsid::parse("com.example.thing").unwrap();
        for kind in TEMPLATE_NAMES {
            let doc = instantiate(kind, &nsid).unwrap();
            let parsed = lint::check_schema(&doc).unwrap();
            assert_eq!(parsed, nsid, "template {kind} should carry the substituted id");
        }
    }

    #[test]
    fn test_unknown_template() {
        let nsid = Nsid::parse("com.example.thing").unwrap();
        assert!(matches!(
            instantiate("bogus", &nsid),
            Err(SyncError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn test_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let nsid = Nsid::parse("com.example.thing").unwrap();
        create_schema_file("record", &nsid, dir.path(), None).unwrap();
        let err = create_schema_file("record", &nsid, dir.path(), None).unwrap_err();
        assert!(matches!(err, SyncError::FileExists(_)));
    }
}
