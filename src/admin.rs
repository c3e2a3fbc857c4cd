//! Operator commands: database initialization, ledger inspection, owner and
//! scope management.

use anyhow::{bail, Result};

use crate::config::Config;
use crate::db;
use crate::ledger::Ledger;
use crate::models::Fingerprint;
use crate::store::sqlite::SqliteStore;
use crate::store::DocumentStore;

/// `foldex init` — create the database file and run schema migrations.
pub async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!("Database initialized successfully.");
    Ok(())
}

/// `foldex ledger list` — all completion records, newest-first.
pub async fn run_ledger_list(config: &Config) -> Result<()> {
    let ledger = Ledger::spawn(&config.ledger.path);
    let records = ledger.list_all().await?;

    if records.is_empty() {
        println!("Ledger is empty.");
        return Ok(());
    }

    for record in &records {
        // Full fingerprint so the line can be fed back to `ledger rm`.
        println!(
            "{}  {}  {}  {}",
            record.completed_at.format("%Y-%m-%d %H:%M:%S"),
            record.scope,
            record.owner,
            record.fingerprint
        );
    }
    println!("{} record(s)", records.len());
    Ok(())
}

/// `foldex ledger rm` — delete one completion record, making the folder
/// eligible for ingestion again.
pub async fn run_ledger_rm(
    config: &Config,
    fingerprint: &str,
    owner: &str,
    scope_override: Option<String>,
) -> Result<()> {
    let scope = scope_override.unwrap_or_else(|| config.ingest.default_scope.clone());
    let ledger = Ledger::spawn(&config.ledger.path);
    let fingerprint = Fingerprint::from_hex(fingerprint);

    if ledger.remove(&fingerprint, owner, &scope).await? {
        println!("Removed ledger record for {} in {}.", owner, scope);
    } else {
        println!("No matching ledger record.");
    }
    Ok(())
}

/// `foldex owners` — per-owner document counts and indexing times.
pub async fn run_owners(config: &Config, scope_override: Option<String>) -> Result<()> {
    let scope = scope_override.unwrap_or_else(|| config.ingest.default_scope.clone());
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let owners = store.list_owners(&scope).await?;
    if owners.is_empty() {
        println!("No owners in scope {}.", scope);
        pool.close().await;
        return Ok(());
    }

    for summary in &owners {
        let first = format_ts(summary.first_indexed);
        let last = format_ts(summary.last_indexed);
        let fingerprint = summary
            .fingerprint
            .as_deref()
            .map(short_hex)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}  {} document(s)  {}  first {}  last {}",
            summary.owner, summary.document_count, fingerprint, first, last
        );
    }

    pool.close().await;
    Ok(())
}

/// `foldex rm-owner` — bulk-delete every document for one owner.
pub async fn run_rm_owner(
    config: &Config,
    owner: &str,
    scope_override: Option<String>,
) -> Result<()> {
    let scope = scope_override.unwrap_or_else(|| config.ingest.default_scope.clone());
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let deleted = store.delete_by_owner(&scope, owner).await?;
    println!("Deleted {} document(s) for {} in {}.", deleted, owner, scope);

    pool.close().await;
    Ok(())
}

pub async fn run_scope_list(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let scopes = store.list_scopes().await?;
    if scopes.is_empty() {
        println!("No scopes.");
    } else {
        for scope in &scopes {
            println!("{}", scope);
        }
    }

    pool.close().await;
    Ok(())
}

pub async fn run_scope_create(config: &Config, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("scope name must not be empty");
    }

    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    if store.scope_exists(name).await? {
        println!("Scope {} already exists.", name);
    } else {
        store.create_scope(name).await?;
        println!("Created scope {}.", name);
    }

    pool.close().await;
    Ok(())
}

/// `foldex scope delete` — drop the scope and every document in it. Ledger
/// records pointing at it become stale and are reconciled away by the next
/// crawl.
pub async fn run_scope_delete(config: &Config, name: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    if !store.scope_exists(name).await? {
        println!("No such scope: {}", name);
        pool.close().await;
        return Ok(());
    }

    store.delete_scope(name).await?;
    println!("Deleted scope {}.", name);

    pool.close().await;
    Ok(())
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn short_hex(s: &str) -> String {
    if s.len() > 12 {
        format!("{}…", &s[..12])
    } else {
        s.to_string()
    }
}
