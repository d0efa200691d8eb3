//! Record storage interface and remote catalog fetching
//!
//! Published schemas live as records in a per-account collection. The wire
//! protocol is a collaborator behind the [`RecordStore`] trait; this module
//! implements the cursor-paginated enumeration of one group's published
//! schemas on top of it.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::lint;
use crate::nsid::{Group, Nsid};
use crate::resolver::{resolve_group, Did, GroupResolution, IdentityResolver};
use crate::session::Session;
use crate::sync::CancelToken;

/// The well-known collection holding published schema records.
pub const SCHEMA_COLLECTION: &str = "com.atproto.lexicon.schema";

/// Page size for record listing.
pub const LIST_PAGE_SIZE: u32 = 100;

/// One record as returned by the storage protocol.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordRef {
    pub uri: String,
    #[serde(default)]
    pub cid: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
}

impl RecordRef {
    /// The record key: the final path segment of the record URI.
    pub fn record_key(&self) -> &str {
        self.uri.rsplit('/').next().unwrap_or_default()
    }
}

/// One page of a record listing.
#[derive(Debug, Clone)]
pub struct RecordPage {
    pub records: Vec<RecordRef>,
    pub cursor: Option<String>,
}

/// Record-storage collaborator interface.
pub trait RecordStore {
    /// List one page of records in a collection, for the given account, at
    /// the given endpoint.
    fn list_records(
        &self,
        endpoint: &str,
        collection: &str,
        repo: &Did,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<RecordPage>;

    /// Fetch a single record by key.
    fn get_record(&self, endpoint: &str, collection: &str, repo: &Did, rkey: &str)
        -> Result<RecordRef>;

    /// Create or overwrite a record under the authenticated account.
    fn put_record(&self, session: &Session, collection: &str, rkey: &str, record: Value)
        -> Result<()>;

    /// Delete a record under the authenticated account. Returns whether the
    /// server committed a deletion (false when the record did not exist).
    fn delete_record(&self, session: &Session, collection: &str, rkey: &str) -> Result<bool>;
}

/// Outcome of visiting one group's published records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupVisit {
    /// The group has no DNS record; nothing was visited.
    Unclaimed,
    /// All pages were enumerated.
    Complete,
}

/// Enumerate every published schema record belonging to `group`, invoking
/// `visit` for each identifier/document pair in server order.
///
/// An unresolvable group is a soft miss (`Unclaimed`), never an error. A
/// record whose key is not a valid NSID is skipped with a warning; records
/// from other groups hosted in the same collection are filtered silently.
/// A record whose document fails structural validation aborts the fetch:
/// it cannot be safely compared or re-published.
///
/// The enumeration is not restartable mid-sequence: a pagination failure
/// surfaces as an error and the caller must re-issue the whole group.
pub fn visit_group_records(
    resolver: &dyn IdentityResolver,
    store: &dyn RecordStore,
    group: &Group,
    cancel: &CancelToken,
    mut visit: impl FnMut(Nsid, Value) -> Result<()>,
) -> Result<GroupVisit> {
    debug!(group = %group, "resolving schemas for NSID group");
    let (did, endpoint) = match resolve_group(resolver, group)? {
        GroupResolution::Resolved { did, endpoint } => (did, endpoint),
        GroupResolution::Unclaimed => {
            warn!(group = %group, "skipping NSID group which did not resolve");
            return Ok(GroupVisit::Unclaimed);
        }
    };

    let mut cursor: Option<String> = None;
    loop {
        cancel.check()?;
        let page = store.list_records(
            &endpoint,
            SCHEMA_COLLECTION,
            &did,
            LIST_PAGE_SIZE,
            cursor.as_deref(),
        )?;
        for rec in page.records {
            let rkey = rec.record_key();
            let nsid = match Nsid::parse(rkey) {
                Ok(nsid) => nsid,
                Err(_) => {
                    warn!(did = %did, rkey, "ignoring invalid schema NSID");
                    continue;
                }
            };
            if !group.contains(&nsid) {
                // the collection is per-account, not per-group
                continue;
            }
            let value = rec
                .value
                .ok_or_else(|| SyncError::MissingRecordValue(nsid.to_string()))?;
            lint::check_schema(&value).map_err(|message| SyncError::InvalidSchema {
                context: nsid.to_string(),
                message,
            })?;
            visit(nsid, value)?;
        }
        match page.cursor {
            Some(c) if !c.is_empty() => cursor = Some(c),
            _ => break,
        }
    }
    Ok(GroupVisit::Complete)
}

/// Fetch all of one group's published schemas into `remote`.
pub fn fetch_group(
    resolver: &dyn IdentityResolver,
    store: &dyn RecordStore,
    group: &Group,
    remote: &mut BTreeMap<Nsid, Value>,
    cancel: &CancelToken,
) -> Result<GroupVisit> {
    visit_group_records(resolver, store, group, cancel, |nsid, value| {
        remote.insert(nsid, value);
        Ok(())
    })
}
