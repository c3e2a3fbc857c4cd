//! Ingestion pipeline orchestration.
//!
//! Coordinates one pass over an uploaded folder: fingerprint → duplicate
//! check → per-file extraction and indexing → ledger finalize. The duplicate
//! check always completes before any document write, and the finalize always
//! happens after all writes for the pass — never interleaved. Files are
//! processed one at a time in traversal order, so indexing order within a
//! folder is deterministic.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::Config;
use crate::db;
use crate::extract;
use crate::fingerprint::{self, compute_fingerprint, dotted_extension};
use crate::ledger::Ledger;
use crate::models::{Fingerprint, IndexedDocument};
use crate::progress::{IngestEvent, IngestProgressReporter, ProgressMode};
use crate::resolver::{DuplicateResolver, DuplicateSource};
use crate::store::sqlite::SqliteStore;
use crate::store::DocumentStore;

/// Per-file counters for one pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStats {
    pub total: u64,
    pub indexed: u64,
    pub extraction_fallbacks: u64,
    pub index_failures: u64,
}

/// Result of one ingestion pass over a folder.
#[derive(Debug)]
pub struct IngestOutcome {
    pub owner: String,
    pub fingerprint: Fingerprint,
    /// Set when the duplicate check decided to skip the folder entirely.
    pub skipped: Option<DuplicateSource>,
    pub stats: FileStats,
}

/// One eligible file inside a folder.
struct FileEntry {
    path: PathBuf,
    relative: String,
}

/// Runs a full ingestion pass over `folder` into `scope`.
pub async fn ingest_folder(
    config: &Config,
    store: &dyn DocumentStore,
    ledger: &Ledger,
    scope: &str,
    folder: &Path,
    reporter: &dyn IngestProgressReporter,
) -> Result<IngestOutcome> {
    let owner = owner_name(folder)?;
    reporter.report(IngestEvent::Fingerprinting {
        folder: owner.clone(),
    });
    let fingerprint = compute_fingerprint(folder)?;

    let resolver = DuplicateResolver::new(ledger, store, scope);
    if let crate::resolver::DuplicateCheck::Duplicate(source) =
        resolver.check(&fingerprint, &owner).await?
    {
        reporter.report(IngestEvent::Skipped {
            folder: owner.clone(),
            reason: format!("duplicate ({})", source),
        });
        return Ok(IngestOutcome {
            owner,
            fingerprint,
            skipped: Some(source),
            stats: FileStats::default(),
        });
    }

    let stats = index_folder_files(config, &resolver, store, scope, folder, &owner, &fingerprint, reporter)
        .await?;

    Ok(IngestOutcome {
        owner,
        fingerprint,
        skipped: None,
        stats,
    })
}

/// Extraction + indexing for a folder already cleared by a duplicate check.
/// Finalizes the ledger only when at least one document landed; a pass with
/// zero successes leaves no completion marker and stays eligible for retry.
pub(crate) async fn index_folder_files(
    config: &Config,
    resolver: &DuplicateResolver<'_>,
    store: &dyn DocumentStore,
    scope: &str,
    folder: &Path,
    owner: &str,
    fingerprint: &Fingerprint,
    reporter: &dyn IngestProgressReporter,
) -> Result<FileStats> {
    let files = collect_files(config, folder)?;
    let mut stats = FileStats {
        total: files.len() as u64,
        ..FileStats::default()
    };

    for entry in &files {
        let extraction = extract::extract_file(&entry.path);
        if extraction.fallback {
            stats.extraction_fallbacks += 1;
        }

        let doc = build_document(folder, owner, fingerprint, entry, extraction.text);
        match store.index_document(scope, &doc).await {
            Ok(_) => stats.indexed += 1,
            Err(e) => {
                stats.index_failures += 1;
                eprintln!("warning: failed to index {}: {}", entry.relative, e);
            }
        }

        reporter.report(IngestEvent::Indexing {
            folder: owner.to_string(),
            n: stats.indexed + stats.index_failures,
            total: stats.total,
        });
    }

    if stats.indexed > 0 {
        resolver.finalize(fingerprint, owner, owner).await?;
    }

    Ok(stats)
}

/// Collects eligible files under `folder`, sorted by relative path so the
/// indexing order is deterministic and matches directory traversal order.
fn collect_files(config: &Config, folder: &Path) -> Result<Vec<FileEntry>> {
    let include_set = build_globset(&config.ingest.include_globs)?;
    let exclude_set = build_globset(&config.ingest.exclude_globs)?;

    let mut files = Vec::new();
    let walker = WalkDir::new(folder).follow_links(config.ingest.follow_symlinks);
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = fingerprint::relative_path(folder, entry.path());

        if exclude_set.is_match(&relative) {
            continue;
        }
        if !include_set.is_match(&relative) {
            continue;
        }

        files.push(FileEntry {
            path: entry.path().to_path_buf(),
            relative,
        });
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}

fn build_document(
    folder: &Path,
    owner: &str,
    fingerprint: &Fingerprint,
    entry: &FileEntry,
    extracted_text: String,
) -> IndexedDocument {
    let subdirectory = match entry.relative.rsplit_once('/') {
        Some((parent, _)) => parent.to_string(),
        None => String::new(),
    };
    let file_name = entry
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| entry.relative.clone());
    let full_path = std::fs::canonicalize(&entry.path)
        .unwrap_or_else(|_| folder.join(&entry.relative))
        .display()
        .to_string();

    // Binary formats carry no raw text copy.
    let raw_content = match dotted_extension(&entry.path).as_str() {
        ".pdf" | ".xlsx" | ".xls" => None,
        _ => std::fs::read_to_string(&entry.path).ok(),
    };

    IndexedDocument {
        id: Uuid::new_v4().to_string(),
        owner: owner.to_string(),
        subdirectory,
        full_path,
        file_name,
        extracted_text,
        raw_content,
        fingerprint: fingerprint.as_str().to_string(),
        indexed_at: chrono::Utc::now().timestamp(),
    }
}

fn owner_name(folder: &Path) -> Result<String> {
    folder
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .with_context(|| format!("cannot derive owner from path: {}", folder.display()))
}

/// CLI entry point for `foldex ingest`.
pub async fn run_ingest(
    config: &Config,
    path: &Path,
    scope_override: Option<String>,
    progress: ProgressMode,
) -> Result<()> {
    if !path.is_dir() {
        bail!("not a directory: {}", path.display());
    }

    let scope = scope_override.unwrap_or_else(|| config.ingest.default_scope.clone());
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());
    if !store.scope_exists(&scope).await? {
        store.create_scope(&scope).await?;
    }

    let ledger = Ledger::spawn(&config.ledger.path);
    let reporter = progress.reporter();
    let started = std::time::Instant::now();

    let outcome = ingest_folder(config, &store, &ledger, &scope, path, reporter.as_ref()).await?;

    println!("ingest {}", outcome.owner);
    println!("  scope: {}", scope);
    println!("  fingerprint: {}", outcome.fingerprint);
    match outcome.skipped {
        Some(source) => {
            println!("  skipped: duplicate ({})", source);
        }
        None => {
            println!("  files: {}", outcome.stats.total);
            println!("  indexed: {}", outcome.stats.indexed);
            println!("  extraction fallbacks: {}", outcome.stats.extraction_fallbacks);
            println!("  index failures: {}", outcome.stats.index_failures);
            println!("  elapsed: {:.2}s", started.elapsed().as_secs_f64());
            if outcome.stats.indexed == 0 && outcome.stats.total > 0 {
                println!("  no files indexed; folder remains eligible for retry");
            }
        }
    }
    println!("ok");

    pool.close().await;
    Ok(())
}
