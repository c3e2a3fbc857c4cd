//! Batch crawl over the uploads root.
//!
//! Scans every immediate subdirectory of the configured uploads root and runs
//! the ingestion pipeline for each one that clears the reconciling duplicate
//! check. This is the only workflow that reconciles the ledger against the
//! live store: records whose documents have vanished are dropped so the
//! folder can be ingested again.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::db;
use crate::fingerprint::compute_fingerprint;
use crate::ingest::{index_folder_files, FileStats};
use crate::ledger::Ledger;
use crate::models::Fingerprint;
use crate::progress::{IngestEvent, IngestProgressReporter, ProgressMode};
use crate::resolver::{DuplicateResolver, DuplicateSource, Reconciliation};
use crate::store::sqlite::SqliteStore;
use crate::store::DocumentStore;

/// Per-folder result of a crawl pass.
#[derive(Debug)]
pub enum CrawlResult {
    Ingested {
        fingerprint: Fingerprint,
        stats: FileStats,
        /// A stale ledger record was dropped before re-ingesting.
        stale_removed: bool,
    },
    Duplicate {
        fingerprint: Fingerprint,
        source: DuplicateSource,
    },
    /// The folder could not be processed; the crawl continued past it.
    Failed { error: String },
}

#[derive(Debug)]
pub struct CrawlFolder {
    pub owner: String,
    pub result: CrawlResult,
}

#[derive(Debug, Default)]
pub struct CrawlReport {
    pub folders: Vec<CrawlFolder>,
}

impl CrawlReport {
    pub fn ingested(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| matches!(f.result, CrawlResult::Ingested { .. }))
            .count()
    }

    pub fn duplicates(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| matches!(f.result, CrawlResult::Duplicate { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.folders
            .iter()
            .filter(|f| matches!(f.result, CrawlResult::Failed { .. }))
            .count()
    }
}

/// Crawls `uploads_root`, ingesting every eligible folder into `scope`.
///
/// A failure in one folder is recorded and the crawl moves on; only a broken
/// uploads root itself aborts the pass.
pub async fn crawl_uploads(
    config: &Config,
    store: &dyn DocumentStore,
    ledger: &Ledger,
    scope: &str,
    uploads_root: &Path,
    reporter: &dyn IngestProgressReporter,
) -> Result<CrawlReport> {
    let folders = list_owner_folders(uploads_root)?;
    let resolver = DuplicateResolver::new(ledger, store, scope);
    let mut report = CrawlReport::default();

    for folder in folders {
        let owner = match folder.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => continue,
        };

        let result = crawl_one(config, &resolver, store, scope, &folder, &owner, reporter).await;
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                eprintln!("warning: crawl failed for {}: {:#}", owner, e);
                CrawlResult::Failed {
                    error: format!("{:#}", e),
                }
            }
        };
        report.folders.push(CrawlFolder { owner, result });
    }

    Ok(report)
}

async fn crawl_one(
    config: &Config,
    resolver: &DuplicateResolver<'_>,
    store: &dyn DocumentStore,
    scope: &str,
    folder: &Path,
    owner: &str,
    reporter: &dyn IngestProgressReporter,
) -> Result<CrawlResult> {
    reporter.report(IngestEvent::Fingerprinting {
        folder: owner.to_string(),
    });
    let fingerprint = compute_fingerprint(folder)?;

    match resolver.reconcile(&fingerprint, owner).await? {
        Reconciliation::Duplicate(source) => {
            reporter.report(IngestEvent::Skipped {
                folder: owner.to_string(),
                reason: format!("duplicate ({})", source),
            });
            Ok(CrawlResult::Duplicate {
                fingerprint,
                source,
            })
        }
        Reconciliation::Eligible { stale_removed } => {
            let stats = index_folder_files(
                config,
                resolver,
                store,
                scope,
                folder,
                owner,
                &fingerprint,
                reporter,
            )
            .await?;
            Ok(CrawlResult::Ingested {
                fingerprint,
                stats,
                stale_removed,
            })
        }
    }
}

/// Immediate subdirectories of the uploads root, sorted by name.
fn list_owner_folders(uploads_root: &Path) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(uploads_root)
        .with_context(|| format!("cannot read uploads root: {}", uploads_root.display()))?;

    let mut folders = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            folders.push(entry.path());
        }
    }
    folders.sort();
    Ok(folders)
}

/// CLI entry point for `foldex crawl`.
pub async fn run_crawl(
    config: &Config,
    scope_override: Option<String>,
    progress: ProgressMode,
) -> Result<()> {
    let scope = scope_override.unwrap_or_else(|| config.ingest.default_scope.clone());
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    if !store.scope_exists(&scope).await? {
        store.create_scope(&scope).await?;
    }

    let ledger = Ledger::spawn(&config.ledger.path);
    let reporter = progress.reporter();

    let report = crawl_uploads(
        config,
        &store,
        &ledger,
        &scope,
        &config.ingest.uploads_root,
        reporter.as_ref(),
    )
    .await?;

    println!("crawl {}", config.ingest.uploads_root.display());
    println!("  scope: {}", scope);
    for folder in &report.folders {
        match &folder.result {
            CrawlResult::Ingested {
                stats,
                stale_removed,
                ..
            } => {
                let note = if *stale_removed {
                    " (stale record removed)"
                } else {
                    ""
                };
                println!(
                    "  {}: indexed {} of {} files{}",
                    folder.owner, stats.indexed, stats.total, note
                );
            }
            CrawlResult::Duplicate { source, .. } => {
                println!("  {}: duplicate ({})", folder.owner, source);
            }
            CrawlResult::Failed { error } => {
                println!("  {}: failed ({})", folder.owner, error);
            }
        }
    }
    println!(
        "  folders: {} ingested, {} duplicate, {} failed",
        report.ingested(),
        report.duplicates(),
        report.failures()
    );
    println!("ok");

    pool.close().await;
    Ok(())
}
