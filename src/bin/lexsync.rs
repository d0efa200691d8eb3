//! Lexicon sync CLI
//!
//! Thin argument layer over the sync drivers: every subcommand builds the
//! HTTP-backed collaborators, runs one driver, and maps the "issues
//! occurred" sentinel to a non-zero exit code.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lexsync::config::LexsyncConfig;
use lexsync::net::{self, HttpIdentityResolver, HttpRecordStore};
use lexsync::sync::{self, PublishOpts, PullOpts, SyncContext};
use lexsync::template;
use lexsync::{Nsid, Result, Session, SyncError};

#[derive(Parser)]
#[command(name = "lexsync")]
#[command(version, about = "Sync, lint, and publish lexicon schemas")]
struct Cli {
    /// Base directory for project lexicon files
    #[arg(long, global = true, env = "LEXSYNC_LEXICONS_DIR")]
    lexicons_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check if local lexicons are in sync with the live network
    Status {
        /// Schema files or directories (defaults to the lexicons dir)
        paths: Vec<PathBuf>,
    },

    /// Print differences for any updated lexicon schemas
    Diff {
        paths: Vec<PathBuf>,
    },

    /// Check schema syntax, best practices, and style
    Lint {
        paths: Vec<PathBuf>,
        /// Output structured JSON issues
        #[arg(long)]
        json: bool,
    },

    /// Check for changes that break lexicon evolution rules
    Breaking {
        paths: Vec<PathBuf>,
        /// Output structured JSON issues
        #[arg(long)]
        json: bool,
    },

    /// Upload any new or updated lexicons
    Publish {
        paths: Vec<PathBuf>,
        /// Update existing schema records
        #[arg(short, long)]
        update: bool,
        /// Skip the NSID DNS resolution match requirement
        #[arg(long)]
        skip_dns_check: bool,
        /// Account identifier (handle or DID) for login
        #[arg(long, env = "LEXSYNC_USERNAME")]
        username: Option<String>,
        /// Account password (app password recommended) for login
        #[arg(short, long, env = "LEXSYNC_PASSWORD")]
        password: Option<String>,
    },

    /// Fetch (or update) lexicon schemas to the local directory
    Pull {
        /// Full NSIDs, or group patterns ending in '.' or '.*'
        #[arg(required = true)]
        patterns: Vec<String>,
        /// Overwrite any existing local files
        #[arg(short, long)]
        update: bool,
        /// Write schema files to a specific directory (flat layout)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Delete lexicon schema records from the current account
    Unpublish {
        #[arg(required = true)]
        nsids: Vec<String>,
        /// Account identifier (handle or DID) for login
        #[arg(long, env = "LEXSYNC_USERNAME")]
        username: Option<String>,
        /// Account password (app password recommended) for login
        #[arg(short, long, env = "LEXSYNC_PASSWORD")]
        password: Option<String>,
    },

    /// Check for schemas missing DNS NSID resolution
    CheckDns {
        paths: Vec<PathBuf>,
        /// Lexicon publication DID for example text
        #[arg(long)]
        example_did: Option<String>,
    },

    /// Create a new lexicon schema from a template
    New {
        /// Template name (see --list-templates)
        schema_type: Option<String>,
        /// NSID for the new schema
        nsid: Option<String>,
        /// List available templates
        #[arg(short, long)]
        list_templates: bool,
    },

    /// Remove any persisted auth session
    Logout,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => {}
        Err(SyncError::IssuesFound) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(2);
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let cfg = LexsyncConfig::load()?;
    let lexicons_dir = cli.lexicons_dir.unwrap_or_else(|| cfg.lexicons_dir.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Status { paths } => {
            let resolver = HttpIdentityResolver::new(&cfg.doh_endpoint, &cfg.plc_host)?;
            let store = HttpRecordStore::new()?;
            let ctx = SyncContext::new(&resolver, &store, lexicons_dir);
            sync::run_status(&ctx, &paths, &mut out)
        }

        Commands::Diff { paths } => {
            let resolver = HttpIdentityResolver::new(&cfg.doh_endpoint, &cfg.plc_host)?;
            let store = HttpRecordStore::new()?;
            let ctx = SyncContext::new(&resolver, &store, lexicons_dir);
            sync::run_diff(&ctx, &paths, &mut out)
        }

        Commands::Lint { paths, json } => sync::run_lint(&paths, &lexicons_dir, json, &mut out),

        Commands::Breaking { paths, json } => {
            let resolver = HttpIdentityResolver::new(&cfg.doh_endpoint, &cfg.plc_host)?;
            let store = HttpRecordStore::new()?;
            let ctx = SyncContext::new(&resolver, &store, lexicons_dir);
            sync::run_breaking(&ctx, &paths, json, &mut out)
        }

        Commands::Publish {
            paths,
            update,
            skip_dns_check,
            username,
            password,
        } => {
            let session = authenticate(&cfg, username.as_deref(), password.as_deref())?;
            let resolver = HttpIdentityResolver::new(&cfg.doh_endpoint, &cfg.plc_host)?;
            let store = HttpRecordStore::new()?;
            let ctx = SyncContext::new(&resolver, &store, lexicons_dir);
            let opts = PublishOpts {
                update,
                skip_dns_check,
            };
            sync::run_publish(&ctx, &session, &paths, opts, &mut out)
        }

        Commands::Pull {
            patterns,
            update,
            output_dir,
        } => {
            let resolver = HttpIdentityResolver::new(&cfg.doh_endpoint, &cfg.plc_host)?;
            let store = HttpRecordStore::new()?;
            let ctx = SyncContext::new(&resolver, &store, lexicons_dir);
            let opts = PullOpts { update, output_dir };
            sync::run_pull(&ctx, &patterns, &opts, &mut out)
        }

        Commands::Unpublish {
            nsids,
            username,
            password,
        } => {
            let session = authenticate(&cfg, username.as_deref(), password.as_deref())?;
            let resolver = HttpIdentityResolver::new(&cfg.doh_endpoint, &cfg.plc_host)?;
            let store = HttpRecordStore::new()?;
            let ctx = SyncContext::new(&resolver, &store, lexicons_dir);
            sync::run_unpublish(&ctx, &session, &nsids, &mut out)
        }

        Commands::CheckDns { paths, example_did } => {
            let resolver = HttpIdentityResolver::new(&cfg.doh_endpoint, &cfg.plc_host)?;
            let store = HttpRecordStore::new()?;
            let ctx = SyncContext::new(&resolver, &store, lexicons_dir);
            let example_is_default = example_did.is_none();
            let example = example_did.unwrap_or_else(|| cfg.example_did.clone());
            sync::run_check_dns(&ctx, &paths, &example, example_is_default, &mut out)
        }

        Commands::New {
            schema_type,
            nsid,
            list_templates,
        } => {
            if list_templates {
                writeln!(out, "Available schema templates:")?;
                writeln!(out)?;
                for name in template::TEMPLATE_NAMES {
                    writeln!(out, "  {name}")?;
                }
                writeln!(out)?;
                return Ok(());
            }
            let (Some(schema_type), Some(raw)) = (schema_type, nsid) else {
                return Err(SyncError::InvalidPattern(
                    "usage: lexsync new <schema-type> <nsid>".to_string(),
                ));
            };
            let nsid = Nsid::parse(&raw)?;
            let path = template::create_schema_file(&schema_type, &nsid, &lexicons_dir, None)?;
            writeln!(out, " 🟢 {} ({})", nsid, path.display())?;
            Ok(())
        }

        Commands::Logout => {
            if Session::clear()? {
                writeln!(out, "auth session removed")?;
            } else {
                writeln!(out, "no auth session found (already logged out)")?;
            }
            Ok(())
        }
    }
}

/// Login with explicit credentials (persisting the session), or fall back
/// to a previously persisted session.
fn authenticate(cfg: &LexsyncConfig, username: Option<&str>, password: Option<&str>) -> Result<Session> {
    match (username, password) {
        (Some(user), Some(pass)) => {
            let session = net::login(&cfg.service, user, pass)?;
            if let Err(e) = session.save() {
                tracing::warn!(error = %e, "failed to persist auth session");
            }
            Ok(session)
        }
        (None, None) => Session::load(),
        _ => Err(SyncError::MissingCredentials),
    }
}
