//! SQLite + FTS5 [`DocumentStore`] implementation.
//!
//! Documents live in a `documents` table keyed by scope; full-text search goes
//! through the `documents_fts` FTS5 table (file name + extracted text), ranked
//! by bm25. Schema is created by [`crate::migrate::run_migrations`].

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::models::IndexedDocument;

use super::{DocumentStore, OwnerSummary, SearchHit, SearchQuery};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }
}

/// Builds an FTS5 MATCH string. Terms are individually quoted (implicit AND);
/// a phrase query becomes one quoted string. Quoting keeps user input from
/// being parsed as FTS syntax.
fn fts_match_string(query: &SearchQuery) -> String {
    let escape = |s: &str| s.replace('"', "\"\"");
    let text = query.text.trim();
    if text.is_empty() {
        return String::new();
    }
    if query.phrase {
        format!("\"{}\"", escape(text))
    } else {
        text.split_whitespace()
            .map(|t| format!("\"{}\"", escape(t)))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn index_document(&self, scope: &str, doc: &IndexedDocument) -> Result<String> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO documents
                (id, scope, owner, subdirectory, full_path, file_name,
                 extracted_text, raw_content, fingerprint, indexed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(scope)
        .bind(&doc.owner)
        .bind(&doc.subdirectory)
        .bind(&doc.full_path)
        .bind(&doc.file_name)
        .bind(&doc.extracted_text)
        .bind(&doc.raw_content)
        .bind(&doc.fingerprint)
        .bind(doc.indexed_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO documents_fts (document_id, file_name, extracted_text) VALUES (?, ?, ?)")
            .bind(&doc.id)
            .bind(&doc.file_name)
            .bind(&doc.extracted_text)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(doc.id.clone())
    }

    async fn count_matching(&self, scope: &str, owner: &str, fingerprint: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM documents WHERE scope = ? AND owner = ? AND fingerprint = ?",
        )
        .bind(scope)
        .bind(owner)
        .bind(fingerprint)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }

    async fn search(&self, scope: &str, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let match_str = fts_match_string(query);
        if match_str.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r#"
            SELECT d.id, d.owner, d.subdirectory, d.file_name,
                   bm25(documents_fts) AS rank,
                   snippet(documents_fts, 2, '[', ']', '…', 16) AS snip
            FROM documents_fts
            JOIN documents d ON d.id = documents_fts.document_id
            WHERE documents_fts MATCH ? AND d.scope = ?
            ORDER BY rank
            LIMIT ?
            "#,
        )
        .bind(&match_str)
        .bind(scope)
        .bind(query.limit)
        .fetch_all(&self.pool)
        .await?;

        let hits = rows
            .iter()
            .map(|row| {
                let rank: f64 = row.get("rank");
                SearchHit {
                    document_id: row.get("id"),
                    owner: row.get("owner"),
                    subdirectory: row.get("subdirectory"),
                    file_name: row.get("file_name"),
                    // bm25() is lower-is-better; flip so higher is better.
                    raw_score: -rank,
                    snippet: row.get("snip"),
                }
            })
            .collect();
        Ok(hits)
    }

    async fn delete_by_owner(&self, scope: &str, owner: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM documents_fts WHERE document_id IN
             (SELECT id FROM documents WHERE scope = ? AND owner = ?)",
        )
        .bind(scope)
        .bind(owner)
        .execute(&mut *tx)
        .await?;

        let deleted = sqlx::query("DELETE FROM documents WHERE scope = ? AND owner = ?")
            .bind(scope)
            .bind(owner)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    async fn list_owners(&self, scope: &str) -> Result<Vec<OwnerSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT owner, COUNT(*) AS doc_count, MAX(fingerprint) AS fingerprint,
                   MIN(indexed_at) AS first_indexed, MAX(indexed_at) AS last_indexed
            FROM documents
            WHERE scope = ?
            GROUP BY owner
            ORDER BY doc_count DESC, owner
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| OwnerSummary {
                owner: row.get("owner"),
                document_count: row.get("doc_count"),
                fingerprint: row.get("fingerprint"),
                first_indexed: row.get("first_indexed"),
                last_indexed: row.get("last_indexed"),
            })
            .collect())
    }

    async fn scope_exists(&self, scope: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scopes WHERE name = ?")
            .bind(scope)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn create_scope(&self, scope: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO scopes (name, created_at) VALUES (?, ?)")
            .bind(scope)
            .bind(chrono::Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_scope(&self, scope: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM documents_fts WHERE document_id IN
             (SELECT id FROM documents WHERE scope = ?)",
        )
        .bind(scope)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM documents WHERE scope = ?")
            .bind(scope)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM scopes WHERE name = ?")
            .bind(scope)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_scopes(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT name FROM scopes ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}
