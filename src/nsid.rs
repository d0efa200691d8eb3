//! NSID syntax and namespace grouping
//!
//! An NSID is a dot-delimited hierarchical name (`com.example.getThing`):
//! a reverse-domain authority followed by a final name segment. The "group"
//! of an NSID is its authority with a trailing dot (`com.example.`), and is
//! the unit of DNS-verified ownership.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

/// Maximum overall NSID length, in characters.
const MAX_NSID_LEN: usize = 317;

/// Maximum length of a single dot-delimited segment.
const MAX_SEGMENT_LEN: usize = 63;

/// A validated namespaced identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Nsid(String);

impl Nsid {
    /// Parse and validate an NSID string.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() || raw.len() > MAX_NSID_LEN {
            return Err(SyncError::InvalidNsid(raw.to_string()));
        }
        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() < 3 {
            return Err(SyncError::InvalidNsid(raw.to_string()));
        }
        for (i, seg) in segments.iter().enumerate() {
            if seg.is_empty() || seg.len() > MAX_SEGMENT_LEN {
                return Err(SyncError::InvalidNsid(raw.to_string()));
            }
            let last = i == segments.len() - 1;
            if last {
                // name segment: leading letter, then alphanumeric
                let mut chars = seg.chars();
                let first = chars.next().unwrap_or('0');
                if !first.is_ascii_alphabetic() || !chars.all(|c| c.is_ascii_alphanumeric()) {
                    return Err(SyncError::InvalidNsid(raw.to_string()));
                }
            } else {
                // authority segment: hostname label rules
                if !seg
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
                    || seg.starts_with('-')
                    || seg.ends_with('-')
                {
                    return Err(SyncError::InvalidNsid(raw.to_string()));
                }
                // TLD segment must not start with a digit
                if i == 0 && seg.starts_with(|c: char| c.is_ascii_digit()) {
                    return Err(SyncError::InvalidNsid(raw.to_string()));
                }
            }
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The final (name) segment.
    pub fn name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// The owning group: all but the last segment, trailing-dot-terminated.
    pub fn group(&self) -> Group {
        let parts: Vec<&str> = self.0.split('.').collect();
        let mut g = parts[..parts.len() - 1].join(".");
        g.push('.');
        Group(g)
    }

    /// The authority domain in regular DNS order (`com.example.foo` -> `example.com`).
    pub fn authority(&self) -> String {
        let parts: Vec<&str> = self.0.split('.').collect();
        let mut auth: Vec<&str> = parts[..parts.len() - 1].to_vec();
        auth.reverse();
        auth.join(".")
    }
}

impl fmt::Display for Nsid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Nsid {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// A namespace group: the shared authority prefix of a set of NSIDs,
/// trailing-dot-terminated (e.g. `com.example.`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Group(String);

impl Group {
    /// Parse a group pattern: a partial NSID ending in `.` or `.*`.
    ///
    /// The `.*` suffix is normalized to `.`. Validated by test-parsing the
    /// pattern with a placeholder name segment appended.
    pub fn parse_pattern(raw: &str) -> Result<Self> {
        let trimmed = raw.strip_suffix('*').unwrap_or(raw);
        if !trimmed.ends_with('.') {
            return Err(SyncError::InvalidGroupPattern(raw.to_string()));
        }
        Nsid::parse(&format!("{trimmed}name"))
            .map_err(|_| SyncError::InvalidGroupPattern(raw.to_string()))?;
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Synthetic NSID used for DNS-based ownership resolution of this group.
    pub fn placeholder(&self) -> Nsid {
        // valid by construction: the group came from a valid NSID or a
        // pattern that already round-tripped through Nsid::parse
        Nsid(format!("{}name", self.0))
    }

    /// The group's registered domain in regular DNS order.
    pub fn domain(&self) -> String {
        self.placeholder().authority()
    }

    /// Whether the given NSID belongs to this group (exact parent, not
    /// recursive: sub-groups do not match).
    pub fn contains(&self, nsid: &Nsid) -> bool {
        nsid.group() == *self
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        for raw in [
            "com.example.foo",
            "com.example.fooBar",
            "net.users.bob.ping",
            "a-0.b-1.c",
        ] {
            assert!(Nsid::parse(raw).is_ok(), "{raw} should parse");
        }
    }

    #[test]
    fn test_parse_invalid() {
        for raw in [
            "",
            "com.example",
            "com.exa💩ple.thing",
            "com.example.3foo",
            "com.example.foo-bar",
            "com.-example.foo",
            "0com.example.foo",
            "com..foo",
        ] {
            assert!(Nsid::parse(raw).is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn test_group_derivation() {
        let nsid = Nsid::parse("com.example.foo").unwrap();
        let group = nsid.group();
        assert_eq!(group.as_str(), "com.example.");
        assert!(group.contains(&nsid));
        assert!(!group.contains(&Nsid::parse("com.example.sub.foo").unwrap()));
    }

    #[test]
    fn test_group_pattern_round_trip() {
        let nsid = Nsid::parse("com.example.foo").unwrap();
        let group = nsid.group();
        // the group of any valid NSID is itself a valid pattern
        let reparsed = Group::parse_pattern(group.as_str()).unwrap();
        assert_eq!(reparsed, group);
    }

    #[test]
    fn test_group_pattern_star_suffix() {
        let group = Group::parse_pattern("com.example.*").unwrap();
        assert_eq!(group.as_str(), "com.example.");
    }

    #[test]
    fn test_group_pattern_rejects_plain_nsid() {
        assert!(Group::parse_pattern("com.example.foo").is_err());
        assert!(Group::parse_pattern("example.").is_err());
    }

    #[test]
    fn test_authority_reversed() {
        let nsid = Nsid::parse("com.example.foo").unwrap();
        assert_eq!(nsid.authority(), "example.com");
        assert_eq!(nsid.group().domain(), "example.com");
        assert_eq!(nsid.name(), "foo");
    }

    #[test]
    fn test_placeholder() {
        let group = Group::parse_pattern("app.bsky.feed.").unwrap();
        assert_eq!(group.placeholder().as_str(), "app.bsky.feed.name");
    }
}
