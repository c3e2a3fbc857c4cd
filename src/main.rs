//! # Foldex CLI (`foldex`)
//!
//! The `foldex` binary is the operator interface for Foldex. It provides
//! commands for database initialization, folder ingestion, batch crawling,
//! full-text search, and ledger/owner/scope management.
//!
//! ## Usage
//!
//! ```bash
//! foldex --config ./config/foldex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `foldex init` | Create the SQLite database and run schema migrations |
//! | `foldex ingest <path>` | Fingerprint and ingest one uploaded folder |
//! | `foldex crawl` | Ingest every new folder under the uploads root |
//! | `foldex search "<query>"` | Full-text search over indexed documents |
//! | `foldex ledger list` | Show completed-ingestion records, newest first |
//! | `foldex ledger rm <fp> <owner>` | Delete a completion record |
//! | `foldex owners` | Per-owner document counts |
//! | `foldex rm-owner <owner>` | Delete all of an owner's documents |
//! | `foldex scope list\|create\|delete` | Manage index scopes |

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use foldex::progress::ProgressMode;
use foldex::{admin, config, crawl, ingest, search};

/// Foldex CLI — folder ingestion and full-text search with structural
/// duplicate detection.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/foldex.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "foldex",
    about = "Foldex — folder ingestion and full-text search with structural duplicate detection",
    version,
    long_about = "Foldex ingests folder trees dropped into an uploads directory, extracts text \
    from heterogeneous formats (PDF, HTML, Excel, CSV, plain text), and indexes it into an \
    embedded SQLite FTS5 store. A structural fingerprint over each folder's paths, sizes, and \
    extensions feeds a persisted ledger that keeps the same folder state from being indexed twice."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/foldex.toml`. Database, ledger, and ingest
    /// settings are read from this file.
    #[arg(long, global = true, default_value = "./config/foldex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (scopes, documents, documents_fts). This command is idempotent —
    /// running it multiple times is safe.
    Init,

    /// Fingerprint and ingest one uploaded folder.
    ///
    /// Computes the folder's structural fingerprint, checks the ledger and
    /// the index for a previous ingestion of the same state, and — when the
    /// folder is new — extracts and indexes every eligible file.
    Ingest {
        /// Path to the uploaded folder (its name becomes the owner).
        path: PathBuf,

        /// Index scope to ingest into (defaults to `ingest.default_scope`).
        #[arg(long)]
        scope: Option<String>,

        /// Progress output: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Ingest every new folder under the configured uploads root.
    ///
    /// Scans the uploads root's immediate subdirectories in name order. For
    /// each, the ledger's completion claim is verified against the live
    /// index; stale records are dropped and the folder re-ingested.
    Crawl {
        /// Index scope to ingest into (defaults to `ingest.default_scope`).
        #[arg(long)]
        scope: Option<String>,

        /// Progress output: `auto`, `human`, `json`, or `off`.
        #[arg(long, default_value = "auto")]
        progress: String,
    },

    /// Search indexed documents.
    ///
    /// By default every term must match somewhere in the file name or
    /// extracted text; `--phrase` requires the terms to appear adjacent and
    /// in order.
    Search {
        /// The search query string.
        query: String,

        /// Match the query as an exact phrase.
        #[arg(long)]
        phrase: bool,

        /// Maximum number of results to return.
        #[arg(long)]
        limit: Option<i64>,

        /// Index scope to search (defaults to `ingest.default_scope`).
        #[arg(long)]
        scope: Option<String>,
    },

    /// Inspect and edit the completed-ingestion ledger.
    Ledger {
        #[command(subcommand)]
        action: LedgerAction,
    },

    /// List owners with document counts and indexing times.
    Owners {
        /// Index scope to inspect (defaults to `ingest.default_scope`).
        #[arg(long)]
        scope: Option<String>,
    },

    /// Delete all documents belonging to one owner.
    ///
    /// The ledger record (if any) is untouched; remove it with
    /// `foldex ledger rm` to make the folder eligible again, or let the next
    /// crawl reconcile it away.
    RmOwner {
        /// Owner (top-level folder name) whose documents to delete.
        owner: String,

        /// Index scope to delete from (defaults to `ingest.default_scope`).
        #[arg(long)]
        scope: Option<String>,
    },

    /// Manage index scopes.
    Scope {
        #[command(subcommand)]
        action: ScopeAction,
    },
}

/// Ledger subcommands.
#[derive(Subcommand)]
enum LedgerAction {
    /// Show all completion records, newest first.
    List,

    /// Delete one completion record, making that folder state eligible for
    /// ingestion again.
    Rm {
        /// Full fingerprint of the record (lowercase hex).
        fingerprint: String,

        /// Owner (top-level folder name) of the record.
        owner: String,

        /// Scope of the record (defaults to `ingest.default_scope`).
        #[arg(long)]
        scope: Option<String>,
    },
}

/// Scope subcommands.
#[derive(Subcommand)]
enum ScopeAction {
    /// List all scopes.
    List,
    /// Create a scope.
    Create {
        /// Scope name.
        name: String,
    },
    /// Delete a scope and every document in it.
    Delete {
        /// Scope name.
        name: String,
    },
}

fn parse_progress(value: &str) -> Result<ProgressMode> {
    ProgressMode::parse(value)
        .ok_or_else(|| anyhow::anyhow!("unknown progress mode: {} (use auto, human, json, or off)", value))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            admin::run_init(&cfg).await?;
        }
        Commands::Ingest {
            path,
            scope,
            progress,
        } => {
            let mode = parse_progress(&progress)?;
            ingest::run_ingest(&cfg, &path, scope, mode).await?;
        }
        Commands::Crawl { scope, progress } => {
            let mode = parse_progress(&progress)?;
            crawl::run_crawl(&cfg, scope, mode).await?;
        }
        Commands::Search {
            query,
            phrase,
            limit,
            scope,
        } => {
            search::run_search(&cfg, &query, phrase, limit, scope).await?;
        }
        Commands::Ledger { action } => match action {
            LedgerAction::List => {
                admin::run_ledger_list(&cfg).await?;
            }
            LedgerAction::Rm {
                fingerprint,
                owner,
                scope,
            } => {
                admin::run_ledger_rm(&cfg, &fingerprint, &owner, scope).await?;
            }
        },
        Commands::Owners { scope } => {
            admin::run_owners(&cfg, scope).await?;
        }
        Commands::RmOwner { owner, scope } => {
            admin::run_rm_owner(&cfg, &owner, scope).await?;
        }
        Commands::Scope { action } => match action {
            ScopeAction::List => {
                admin::run_scope_list(&cfg).await?;
            }
            ScopeAction::Create { name } => {
                admin::run_scope_create(&cfg, &name).await?;
            }
            ScopeAction::Delete { name } => {
                admin::run_scope_delete(&cfg, &name).await?;
            }
        },
    }

    Ok(())
}
