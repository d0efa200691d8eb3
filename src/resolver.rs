//! Identity resolution interface and group ownership
//!
//! Group ownership is established indirectly: a DNS TXT record under the
//! group's registered domain names an account DID, and that DID resolves to
//! a service endpoint hosting the account's records. The resolution
//! subsystem itself is a collaborator behind the [`IdentityResolver`]
//! trait; this module layers group-level tri-state semantics on top.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::nsid::{Group, Nsid};

/// A decentralized account identifier (`did:method:identifier`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Did(String);

impl Did {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut parts = raw.splitn(3, ':');
        let (scheme, method, ident) = (parts.next(), parts.next(), parts.next());
        match (scheme, method, ident) {
            (Some("did"), Some(m), Some(i)) if !m.is_empty() && !i.is_empty() => {
                Ok(Self(raw.to_string()))
            }
            _ => Err(SyncError::InvalidDid(raw.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The DID method (`plc`, `web`, ...).
    pub fn method(&self) -> &str {
        self.0.split(':').nth(1).unwrap_or_default()
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Did {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Identity/DNS collaborator interface.
pub trait IdentityResolver {
    /// Resolve an NSID to its owning account via DNS indirection. Must
    /// return [`SyncError::NsidUnresolved`] when no DNS record exists, as
    /// distinct from transport failures.
    fn resolve_nsid(&self, nsid: &Nsid) -> Result<Did>;

    /// Resolve an account to its record-hosting service endpoint URL.
    fn lookup_did(&self, did: &Did) -> Result<String>;
}

/// Outcome of resolving a group to its owning account and endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupResolution {
    /// The group's DNS record names an account with a working endpoint.
    Resolved { did: Did, endpoint: String },
    /// No DNS record exists for the group: ownership unknown, not denied.
    Unclaimed,
}

/// Resolve a group to its owner and endpoint. A missing DNS record yields
/// `Unclaimed`; an endpoint lookup failure is an error, since callers
/// needing this entry point cannot proceed without an endpoint.
pub fn resolve_group(resolver: &dyn IdentityResolver, group: &Group) -> Result<GroupResolution> {
    let did = match resolver.resolve_nsid(&group.placeholder()) {
        Ok(did) => did,
        Err(SyncError::NsidUnresolved(_)) => return Ok(GroupResolution::Unclaimed),
        Err(e) => return Err(e),
    };
    let endpoint = resolver.lookup_did(&did)?;
    Ok(GroupResolution::Resolved { did, endpoint })
}

/// Resolve only the owning account of a group. A missing DNS record yields
/// `Ok(None)` ("ownership unknown"), never an error.
pub fn resolve_group_owner(resolver: &dyn IdentityResolver, group: &Group) -> Result<Option<Did>> {
    match resolver.resolve_nsid(&group.placeholder()) {
        Ok(did) => Ok(Some(did)),
        Err(SyncError::NsidUnresolved(_)) => Ok(None),
        Err(e) => Err(e),
    }
}
