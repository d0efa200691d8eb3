//! Sync drivers
//!
//! Every driver shares one control skeleton: load the local catalog, fetch
//! the remote catalog for each locally-present group, union the identifiers,
//! then walk the union in sorted order classifying each local/remote pair.
//! Recoverable per-identifier issues are accumulated as the `IssuesFound`
//! sentinel and surfaced only after the full pass, so one bad schema never
//! suppresses reporting on the rest.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::Value;
use similar::TextDiff;
use tracing::warn;

use crate::catalog::{self, LocalCatalog};
use crate::document::{self, Verdict, TYPE_FIELD};
use crate::error::{Result, SyncError};
use crate::lint::{self, LintIssue, LintLevel};
use crate::nsid::{Group, Nsid};
use crate::resolver::{resolve_group_owner, Did, IdentityResolver};
use crate::session::Session;
use crate::store::{fetch_group, visit_group_records, GroupVisit, RecordStore, SCHEMA_COLLECTION};

/// Cooperative cancellation token threaded through every driver. Checked
/// between groups and between identifiers so multi-group loops stop
/// promptly on interrupt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Shared driver dependencies: the identity and storage collaborators, the
/// base directory for local schema files, and the cancellation token.
pub struct SyncContext<'a> {
    pub resolver: &'a dyn IdentityResolver,
    pub store: &'a dyn RecordStore,
    pub lexicons_dir: PathBuf,
    pub cancel: CancelToken,
}

impl<'a> SyncContext<'a> {
    pub fn new(
        resolver: &'a dyn IdentityResolver,
        store: &'a dyn RecordStore,
        lexicons_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            store,
            lexicons_dir: lexicons_dir.into(),
            cancel: CancelToken::new(),
        }
    }

    /// Load the local catalog and fetch the remote catalog for every group
    /// present locally.
    pub fn build_catalogs(
        &self,
        paths: &[PathBuf],
    ) -> Result<(BTreeMap<Nsid, Value>, BTreeMap<Nsid, Value>)> {
        let local = LocalCatalog::load(paths, &self.lexicons_dir)?;
        let mut remote = BTreeMap::new();
        for group in local.groups() {
            self.cancel.check()?;
            fetch_group(self.resolver, self.store, &group, &mut remote, &self.cancel)?;
        }
        Ok((local.into_schemas(), remote))
    }

    /// Run a comparison function over the sorted union of local and remote
    /// identifiers. A comparison returning `IssuesFound` is recorded and the
    /// pass continues; any other error aborts.
    pub fn run_comparisons<F>(&self, paths: &[PathBuf], mut comp: F) -> Result<()>
    where
        F: FnMut(&Nsid, Option<&Value>, Option<&Value>) -> Result<()>,
    {
        let (local, remote) = self.build_catalogs(paths)?;

        let mut all: BTreeSet<Nsid> = local.keys().cloned().collect();
        all.extend(remote.keys().cloned());

        let mut any_failures = false;
        for nsid in &all {
            self.cancel.check()?;
            match comp(nsid, local.get(nsid), remote.get(nsid)) {
                Ok(()) => {}
                Err(SyncError::IssuesFound) => any_failures = true,
                Err(e) => return Err(e),
            }
        }

        if any_failures {
            Err(SyncError::IssuesFound)
        } else {
            Ok(())
        }
    }
}

/// Report per-identifier sync state: unpublished (🟠), remote-new (⭕),
/// in-sync (🟢), or needs-update (🟣).
pub fn run_status(ctx: &SyncContext, paths: &[PathBuf], out: &mut dyn Write) -> Result<()> {
    ctx.run_comparisons(paths, |nsid, local, remote| {
        let glyph = match document::classify(local, remote) {
            Verdict::RemoteOnly => "⭕",
            Verdict::LocalOnly => "🟠",
            Verdict::Identical => "🟢",
            Verdict::Diverged => "🟣",
        };
        writeln!(out, " {glyph} {nsid}")?;
        Ok(())
    })
}

/// Print a structural diff for every diverged schema.
pub fn run_diff(ctx: &SyncContext, paths: &[PathBuf], out: &mut dyn Write) -> Result<()> {
    ctx.run_comparisons(paths, |nsid, local, remote| {
        let (Some(local), Some(remote)) = (local, remote) else {
            return Ok(());
        };
        let local = document::canonicalize(local);
        let remote = document::canonicalize(remote);
        if local == remote {
            return Ok(());
        }

        let local_pretty = serde_json::to_string_pretty(&local)?;
        let remote_pretty = serde_json::to_string_pretty(&remote)?;
        let diff = TextDiff::from_lines(&local_pretty, &remote_pretty);

        writeln!(out, "diff {nsid}")?;
        write!(
            out,
            "{}",
            diff.unified_diff().context_radius(3).header("local", "remote")
        )?;
        writeln!(out)?;
        Ok(())
    })
}

/// Check diverged schemas against evolution rules (old = remote, new = local).
pub fn run_breaking(
    ctx: &SyncContext,
    paths: &[PathBuf],
    json_output: bool,
    out: &mut dyn Write,
) -> Result<()> {
    ctx.run_comparisons(paths, |nsid, local, remote| {
        let (Some(local), Some(remote)) = (local, remote) else {
            return Ok(());
        };
        let local = document::canonicalize(local);
        let remote = document::canonicalize(remote);
        if local == remote {
            return Ok(());
        }

        let mut issues = lint::breaking_changes(&remote, &local);
        for iss in &mut issues {
            iss.nsid = Some(nsid.to_string());
        }

        if json_output {
            for iss in &issues {
                writeln!(out, "{}", serde_json::to_string(iss)?)?;
            }
        } else if issues.is_empty() {
            writeln!(out, " 🟢 {nsid}")?;
        } else {
            writeln!(out, " 🟡 {nsid}")?;
            for iss in &issues {
                writeln!(out, "    [{}]: {}", iss.name, iss.message)?;
            }
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(SyncError::IssuesFound)
        }
    })
}

/// Lint local schema files. Purely local: the remote catalog is never
/// consulted.
pub fn run_lint(
    paths: &[PathBuf],
    lexicons_dir: &Path,
    json_output: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let files = catalog::collect_paths(paths, lexicons_dir)?;
    let mut any_failures = false;
    for fp in files {
        match lint_file(&fp, json_output, out) {
            Ok(()) => {}
            Err(SyncError::IssuesFound) => any_failures = true,
            Err(e) => return Err(e),
        }
    }
    if any_failures {
        Err(SyncError::IssuesFound)
    } else {
        Ok(())
    }
}

fn lint_file(path: &Path, json_output: bool, out: &mut dyn Write) -> Result<()> {
    let content = fs::read_to_string(path).map_err(|e| SyncError::CatalogLoad {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let parsed: std::result::Result<Value, _> = serde_json::from_str(&content);
    let doc = match parsed {
        Ok(doc) => doc,
        Err(e) => return report_parse_failure(path, e.to_string(), json_output, out),
    };
    let nsid = match lint::check_schema(&doc) {
        Ok(nsid) => nsid,
        Err(message) => return report_parse_failure(path, message, json_output, out),
    };

    let mut issues = lint::lint_schema(&doc);
    for iss in &mut issues {
        iss.file_path = Some(path.display().to_string());
        iss.nsid = Some(nsid.to_string());
    }

    if json_output {
        for iss in &issues {
            writeln!(out, "{}", serde_json::to_string(iss)?)?;
        }
    } else if issues.is_empty() {
        writeln!(out, " 🟢 {}", path.display())?;
    } else {
        writeln!(out, " 🟡 {}", path.display())?;
        for iss in &issues {
            writeln!(out, "    [{}]: {}", iss.name, iss.message)?;
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(SyncError::IssuesFound)
    }
}

fn report_parse_failure(
    path: &Path,
    message: String,
    json_output: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let iss = LintIssue {
        file_path: Some(path.display().to_string()),
        nsid: None,
        level: LintLevel::Error,
        name: "schema-json-parse",
        message,
    };
    if json_output {
        writeln!(out, "{}", serde_json::to_string(&iss)?)?;
    } else {
        writeln!(out, " 🔴 {}", path.display())?;
        writeln!(out, "    [{}]: {}", iss.name, iss.message)?;
    }
    Err(SyncError::IssuesFound)
}

/// Options for the publish driver.
#[derive(Debug, Clone, Copy, Default)]
pub struct PublishOpts {
    /// Overwrite already-published schemas that diverged.
    pub update: bool,
    /// Skip the DNS ownership requirement (can clobber foreign records).
    pub skip_dns_check: bool,
}

/// Publish new or updated local schemas under the authenticated account.
///
/// Authorization invariant: unless `skip_dns_check` is set, a schema is
/// published only when its group's DNS record resolves to the session's own
/// DID. Unresolved or mismatched ownership yields a per-identifier skip and
/// a non-zero issue count, never a batch abort.
pub fn run_publish(
    ctx: &SyncContext,
    session: &Session,
    paths: &[PathBuf],
    opts: PublishOpts,
    out: &mut dyn Write,
) -> Result<()> {
    let (local, remote) = ctx.build_catalogs(paths)?;

    let mut owners: BTreeMap<Group, Did> = BTreeMap::new();
    let groups: BTreeSet<Group> = local.keys().map(Nsid::group).collect();
    for group in groups {
        ctx.cancel.check()?;
        match resolve_group_owner(ctx.resolver, &group) {
            Ok(Some(did)) => {
                owners.insert(group, did);
            }
            Ok(None) => {}
            Err(e) => warn!(group = %group, error = %e, "failed resolving group owner"),
        }
    }

    let mut all: BTreeSet<Nsid> = local.keys().cloned().collect();
    all.extend(remote.keys().cloned());

    let mut any_issues = false;
    for nsid in &all {
        ctx.cancel.check()?;
        let Some(local_doc) = local.get(nsid) else {
            continue;
        };
        let remote_doc = remote.get(nsid);

        if let Some(remote_doc) = remote_doc {
            if document::canonicalize(local_doc) == document::canonicalize(remote_doc) {
                writeln!(out, " 🟢 {nsid} (unchanged)")?;
                continue;
            }
            if !opts.update {
                writeln!(out, " 🟠 {nsid} (needs --update)")?;
                any_issues = true;
                continue;
            }
        }

        if !opts.skip_dns_check {
            let authorized = owners.get(&nsid.group()) == Some(&session.did);
            if !authorized {
                writeln!(out, " ⭕ {nsid} (group does not resolve to {})", session.did)?;
                any_issues = true;
                continue;
            }
        }

        let mut record = document::canonicalize(local_doc);
        if let Some(map) = record.as_object_mut() {
            map.insert(TYPE_FIELD.to_string(), Value::from(SCHEMA_COLLECTION));
        }
        ctx.store
            .put_record(session, SCHEMA_COLLECTION, nsid.as_str(), record)?;

        if remote_doc.is_none() {
            writeln!(out, " 🟢 {nsid}")?;
        } else {
            writeln!(out, " 🟣 {nsid}")?;
        }
    }

    if any_issues {
        Err(SyncError::IssuesFound)
    } else {
        Ok(())
    }
}

/// Options for the pull driver.
#[derive(Debug, Clone, Default)]
pub struct PullOpts {
    /// Overwrite existing local files.
    pub update: bool,
    /// Write flat `<name>.json` files to this directory instead of the
    /// nested layout under the lexicons dir.
    pub output_dir: Option<PathBuf>,
}

/// Fetch published schemas to local files. Patterns may be full NSIDs or
/// group patterns ending in `.` or `.*` (sub-groups are not recursed into).
pub fn run_pull(
    ctx: &SyncContext,
    patterns: &[String],
    opts: &PullOpts,
    out: &mut dyn Write,
) -> Result<()> {
    let mut any_issues = false;
    for raw in patterns {
        ctx.cancel.check()?;
        if let Ok(group) = Group::parse_pattern(raw) {
            if pull_group(ctx, &group, opts, out)? {
                any_issues = true;
            }
            continue;
        }
        let nsid = Nsid::parse(raw).map_err(|_| SyncError::InvalidPattern(raw.clone()))?;
        pull_single(ctx, &nsid, opts, out)?;
    }
    if any_issues {
        Err(SyncError::IssuesFound)
    } else {
        Ok(())
    }
}

fn pull_single(ctx: &SyncContext, nsid: &Nsid, opts: &PullOpts, out: &mut dyn Write) -> Result<()> {
    let fpath = catalog::path_for_nsid(&ctx.lexicons_dir, opts.output_dir.as_deref(), nsid);
    if !opts.update && fpath.exists() {
        writeln!(out, " 🟣 {nsid}")?;
        return Ok(());
    }

    let did = ctx.resolver.resolve_nsid(nsid)?;
    let endpoint = ctx.resolver.lookup_did(&did)?;
    let rec = ctx
        .store
        .get_record(&endpoint, SCHEMA_COLLECTION, &did, nsid.as_str())?;
    let value = rec
        .value
        .ok_or_else(|| SyncError::MissingRecordValue(nsid.to_string()))?;

    catalog::write_schema_file(&fpath, &value)?;
    writeln!(out, " 🟢 {nsid}")?;
    Ok(())
}

fn pull_group(
    ctx: &SyncContext,
    group: &Group,
    opts: &PullOpts,
    out: &mut dyn Write,
) -> Result<bool> {
    let visit = visit_group_records(ctx.resolver, ctx.store, group, &ctx.cancel, |nsid, value| {
        let fpath = catalog::path_for_nsid(&ctx.lexicons_dir, opts.output_dir.as_deref(), &nsid);
        if !opts.update && fpath.exists() {
            writeln!(out, " 🟣 {nsid}")?;
            return Ok(());
        }
        catalog::write_schema_file(&fpath, &value)?;
        writeln!(out, " 🟢 {nsid}")?;
        Ok(())
    })?;

    match visit {
        GroupVisit::Unclaimed => {
            writeln!(out, " ⭕ {group}* (group did not resolve)")?;
            Ok(true)
        }
        GroupVisit::Complete => Ok(false),
    }
}

/// Delete published schema records under the authenticated account. Local
/// files are never touched. Per-identifier failures are reported and the
/// batch continues.
pub fn run_unpublish(
    ctx: &SyncContext,
    session: &Session,
    nsids: &[String],
    out: &mut dyn Write,
) -> Result<()> {
    let mut parsed = nsids
        .iter()
        .map(|raw| Nsid::parse(raw))
        .collect::<Result<Vec<_>>>()?;
    parsed.sort();

    let mut any_issues = false;
    for nsid in &parsed {
        ctx.cancel.check()?;
        match ctx
            .store
            .delete_record(session, SCHEMA_COLLECTION, nsid.as_str())
        {
            Ok(true) => writeln!(out, " 🟢 {nsid}")?,
            Ok(false) => {
                writeln!(out, " 🟠 {nsid}")?;
                writeln!(out, "    record deletion failed: schema record did not exist")?;
                any_issues = true;
            }
            Err(e) => {
                writeln!(out, " 🟠 {nsid}")?;
                writeln!(out, "    record deletion failed: {e}")?;
                any_issues = true;
            }
        }
    }

    if any_issues {
        Err(SyncError::IssuesFound)
    } else {
        Ok(())
    }
}

/// Read-only advisory: report every locally-present group that does not
/// resolve via DNS, with the exact TXT record shape needed to claim it.
pub fn run_check_dns(
    ctx: &SyncContext,
    paths: &[PathBuf],
    example_did: &str,
    example_is_default: bool,
    out: &mut dyn Write,
) -> Result<()> {
    let local = LocalCatalog::load(paths, &ctx.lexicons_dir)?;

    let mut missing: Vec<Group> = Vec::new();
    for group in local.groups() {
        ctx.cancel.check()?;
        match resolve_group_owner(ctx.resolver, &group) {
            Ok(Some(_)) => {}
            Ok(None) => missing.push(group),
            Err(e) => {
                warn!(group = %group, error = %e, "group owner resolution failed");
                missing.push(group);
            }
        }
    }

    if missing.is_empty() {
        writeln!(out, "all lexicon schema NSIDs resolved successfully")?;
        return Ok(());
    }
    missing.sort();

    writeln!(out, "Some lexicon NSIDs did not resolve via DNS:")?;
    writeln!(out)?;
    for group in &missing {
        writeln!(out, "    {group}*")?;
    }
    writeln!(out)?;
    writeln!(out, "To make these resolve, add DNS TXT entries like:")?;
    writeln!(out)?;
    for group in &missing {
        writeln!(out, "    _lexicon.{}\tTXT\t\"did={}\"", group.domain(), example_did)?;
    }
    if example_is_default {
        writeln!(out)?;
        writeln!(out, "(substituting your account DID for the example value)")?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Note that DNS management interfaces commonly require only the sub-domain parts of a name, not the full registered domain."
    )?;

    Ok(())
}
