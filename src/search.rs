use anyhow::Result;

use crate::config::Config;
use crate::db;
use crate::store::sqlite::SqliteStore;
use crate::store::{DocumentStore, SearchQuery};

const DEFAULT_LIMIT: i64 = 20;

/// CLI entry point for `foldex search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    phrase: bool,
    limit: Option<i64>,
    scope_override: Option<String>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let scope = scope_override.unwrap_or_else(|| config.ingest.default_scope.clone());
    let pool = db::connect(config).await?;
    crate::migrate::run_migrations(&pool).await?;
    let store = SqliteStore::new(pool.clone());

    let hits = store
        .search(
            &scope,
            &SearchQuery {
                text: query.to_string(),
                phrase,
                limit: limit.unwrap_or(DEFAULT_LIMIT),
            },
        )
        .await?;

    if hits.is_empty() {
        println!("No results.");
        pool.close().await;
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        let location = if hit.subdirectory.is_empty() {
            hit.owner.clone()
        } else {
            format!("{}/{}", hit.owner, hit.subdirectory)
        };
        println!("{}. [{:.2}] {} / {}", i + 1, hit.raw_score, location, hit.file_name);
        println!(
            "    excerpt: \"{}\"",
            hit.snippet.replace('\n', " ").trim()
        );
        println!("    id: {}", hit.document_id);
        println!();
    }

    pool.close().await;
    Ok(())
}
