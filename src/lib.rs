//! Lexicon Sync & Publish Engine
//!
//! Reconciles schema definitions stored as local JSON files against
//! authoritative copies published on a decentralized network. Each schema
//! is addressed by a hierarchical NSID; ownership of a namespace group is
//! established through DNS records naming an account DID.
//!
//! ## Architecture
//!
//! ```text
//! local files          remote records
//!     │                      │
//!     ▼                      ▼
//! LocalCatalog ──┐    fetch_group (per group, cursor-paginated)
//!                │          │
//!                └──► union, sorted ──► classify ──► driver decision
//!                                        LocalOnly / RemoteOnly /
//!                                        Identical / Diverged
//! ```
//!
//! Drivers (status, diff, lint, breaking, publish, pull, unpublish,
//! check-dns) share that skeleton and differ only in what they do with
//! each verdict. Publication is gated on the authorization invariant:
//! only the DNS-verified owner of a group may publish into it.

pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod lint;
pub mod net;
pub mod nsid;
pub mod resolver;
pub mod session;
pub mod store;
pub mod sync;
pub mod template;

pub use catalog::LocalCatalog;
pub use document::{canonicalize, classify, Verdict};
pub use error::{Result, SyncError};
pub use nsid::{Group, Nsid};
pub use resolver::{Did, GroupResolution, IdentityResolver};
pub use session::Session;
pub use store::{RecordPage, RecordRef, RecordStore, SCHEMA_COLLECTION};
pub use sync::{CancelToken, PublishOpts, PullOpts, SyncContext};
