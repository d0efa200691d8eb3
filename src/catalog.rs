//! Local schema catalog
//!
//! Walks directories (or explicit file lists), parses each JSON document as
//! a schema, and produces a deterministic identifier -> document mapping.
//! The load is all-or-nothing: any parse or structural failure aborts with
//! an error naming the offending path. Duplicate identifiers across files
//! overwrite in sorted-path order, with a warning diagnostic.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::document;
use crate::error::{Result, SyncError};
use crate::lint;
use crate::nsid::{Group, Nsid};

/// The local schema catalog, rebuilt from disk on every invocation.
#[derive(Debug, Default)]
pub struct LocalCatalog {
    schemas: BTreeMap<Nsid, Value>,
}

impl LocalCatalog {
    /// Load schemas from the given paths, or from `default_dir` when no
    /// paths are given. Errors if no paths are given and the default
    /// directory does not exist.
    pub fn load(paths: &[PathBuf], default_dir: &Path) -> Result<Self> {
        let files = collect_paths(paths, default_dir)?;
        let mut schemas = BTreeMap::new();
        for fp in files {
            let (nsid, doc) = load_schema_file(&fp)?;
            if schemas.contains_key(&nsid) {
                warn!(nsid = %nsid, path = %fp.display(), "duplicate schema identifier, last file wins");
            }
            schemas.insert(nsid, doc);
        }
        Ok(Self { schemas })
    }

    pub fn schemas(&self) -> &BTreeMap<Nsid, Value> {
        &self.schemas
    }

    pub fn into_schemas(self) -> BTreeMap<Nsid, Value> {
        self.schemas
    }

    /// All distinct groups present in the catalog, sorted.
    pub fn groups(&self) -> BTreeSet<Group> {
        self.schemas.keys().map(Nsid::group).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Enumerate schema file paths: directory arguments are walked recursively
/// for `.json` files, file arguments are taken verbatim. Result is sorted
/// for deterministic load order.
pub fn collect_paths(args: &[PathBuf], default_dir: &Path) -> Result<Vec<PathBuf>> {
    let roots: Vec<PathBuf> = if args.is_empty() {
        if !default_dir.exists() {
            return Err(SyncError::MissingLexiconDir);
        }
        vec![default_dir.to_path_buf()]
    } else {
        args.to_vec()
    };

    let mut files = Vec::new();
    for root in &roots {
        let meta = fs::metadata(root).map_err(|e| SyncError::CatalogLoad {
            path: root.clone(),
            message: e.to_string(),
        })?;
        if meta.is_dir() {
            for entry in WalkDir::new(root) {
                let entry = entry.map_err(|e| SyncError::CatalogLoad {
                    path: root.clone(),
                    message: e.to_string(),
                })?;
                if entry.file_type().is_dir() {
                    continue;
                }
                let path = entry.path();
                if path.extension().map(|x| x == "json").unwrap_or(false) {
                    files.push(path.to_path_buf());
                }
            }
        } else {
            files.push(root.clone());
        }
    }

    files.sort();
    Ok(files)
}

/// Parse and structurally validate one schema file.
pub fn load_schema_file(path: &Path) -> Result<(Nsid, Value)> {
    let content = fs::read_to_string(path).map_err(|e| SyncError::CatalogLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    let doc: Value = serde_json::from_str(&content).map_err(|e| SyncError::InvalidSchema {
        context: path.display().to_string(),
        message: e.to_string(),
    })?;
    let nsid = lint::check_schema(&doc).map_err(|message| SyncError::InvalidSchema {
        context: path.display().to_string(),
        message,
    })?;
    Ok((nsid, doc))
}

/// The on-disk path for an identifier: dots become path separators under
/// the lexicons dir, or a flat `<name>.json` under an explicit output dir.
pub fn path_for_nsid(lexicons_dir: &Path, output_dir: Option<&Path>, nsid: &Nsid) -> PathBuf {
    if let Some(out) = output_dir {
        return out.join(format!("{}.json", nsid.name()));
    }
    let sub = nsid.as_str().replace('.', "/");
    lexicons_dir.join(format!("{sub}.json"))
}

/// Write a schema document to disk in canonical local form: `$type`
/// stripped, pretty-printed, newline-terminated. Creates parent
/// directories as needed.
pub fn write_schema_file(path: &Path, doc: &Value) -> Result<()> {
    lint::check_schema(doc).map_err(|message| SyncError::InvalidSchema {
        context: path.display().to_string(),
        message,
    })?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let canon = document::canonicalize(doc);
    let mut bytes = serde_json::to_vec_pretty(&canon)?;
    bytes.push(b'\n');
    fs::write(path, bytes)?;
    debug!(path = %path.display(), "wrote schema file");
    Ok(())
}
