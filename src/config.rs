//! Configuration
//!
//! Layered: built-in defaults, then a `lexsync.toml` file in the working
//! directory or XDG config dir, then `LEXSYNC_*` environment variables.
//!
//! ## Example config file (lexsync.toml):
//! ```toml
//! lexicons_dir = "lexicons/"
//! doh_endpoint = "https://cloudflare-dns.com/dns-query"
//! plc_host = "https://plc.directory"
//! service = "https://bsky.social"
//! example_did = "did:web:lex.example.com"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::net::{DEFAULT_DOH_ENDPOINT, DEFAULT_PLC_HOST};

/// Tool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LexsyncConfig {
    /// Base directory for project lexicon files
    #[serde(default = "default_lexicons_dir")]
    pub lexicons_dir: PathBuf,

    /// DNS-over-HTTPS resolver endpoint for NSID ownership lookups
    #[serde(default = "default_doh_endpoint")]
    pub doh_endpoint: String,

    /// PLC directory host for DID document resolution
    #[serde(default = "default_plc_host")]
    pub plc_host: String,

    /// Default service endpoint for login
    #[serde(default = "default_service")]
    pub service: String,

    /// Publication DID used in check-dns example text
    #[serde(default = "default_example_did")]
    pub example_did: String,
}

fn default_lexicons_dir() -> PathBuf {
    PathBuf::from("lexicons/")
}

fn default_doh_endpoint() -> String {
    DEFAULT_DOH_ENDPOINT.to_string()
}

fn default_plc_host() -> String {
    DEFAULT_PLC_HOST.to_string()
}

fn default_service() -> String {
    "https://bsky.social".to_string()
}

fn default_example_did() -> String {
    "did:web:lex.example.com".to_string()
}

impl Default for LexsyncConfig {
    fn default() -> Self {
        Self {
            lexicons_dir: default_lexicons_dir(),
            doh_endpoint: default_doh_endpoint(),
            plc_host: default_plc_host(),
            service: default_service(),
            example_did: default_example_did(),
        }
    }
}

impl LexsyncConfig {
    /// Load configuration from default locations.
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("lexsync").required(false))
            .add_source(File::with_name(".lexsync").required(false));

        if let Some(dirs) = directories::ProjectDirs::from("", "", "lexsync") {
            let xdg_config = dirs.config_dir().join("lexsync.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        builder = builder.add_source(Environment::with_prefix("LEXSYNC"));

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LexsyncConfig::default();
        assert_eq!(config.lexicons_dir, PathBuf::from("lexicons/"));
        assert_eq!(config.example_did, "did:web:lex.example.com");
    }

    #[test]
    fn test_serialize_config() {
        let config = LexsyncConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("lexicons_dir"));
        assert!(toml_str.contains("doh_endpoint"));
    }
}
