//! Authenticated session state
//!
//! A session is an explicit value (account DID, service endpoint, tokens)
//! passed into every driver that writes to the network. It can be persisted
//! as a JSON state file so repeated invocations do not re-authenticate.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};
use crate::resolver::Did;

/// An authenticated session against one service endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub did: Did,
    pub endpoint: String,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(did: Did, endpoint: impl Into<String>, access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            did,
            endpoint: endpoint.into(),
            access_token: access.into(),
            refresh_token: refresh.into(),
            created_at: Utc::now(),
        }
    }

    /// Path of the persisted session file under the platform state directory.
    pub fn state_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "lexsync").ok_or(SyncError::NoStateDir)?;
        let dir = dirs
            .state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf();
        Ok(dir.join("auth-session.json"))
    }

    /// Persist the session, readable only by the current user.
    pub fn save(&self) -> Result<()> {
        let path = Self::state_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        fs::write(&path, bytes)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    /// Load a previously persisted session.
    pub fn load() -> Result<Self> {
        let path = Self::state_path()?;
        let content = fs::read_to_string(&path).map_err(|_| SyncError::NoAuthSession)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Remove any persisted session. Returns whether one existed.
    pub fn clear() -> Result<bool> {
        let path = Self::state_path()?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_round_trip_json() {
        let session = Session::new(
            Did::parse("did:plc:abc123").unwrap(),
            "https://pds.example.com",
            "access",
            "refresh",
        );
        let json = serde_json::to_string(&session).unwrap();
        let back: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(back.did, session.did);
        assert_eq!(back.endpoint, "https://pds.example.com");
    }
}
