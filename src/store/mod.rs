//! Storage abstraction over the destination document store.
//!
//! The [`DocumentStore`] trait defines every operation the ingestion pipeline,
//! duplicate resolver, and operator commands need from the search backend,
//! enabling pluggable implementations (SQLite FTS5 in production, in-memory
//! for tests).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::IndexedDocument;

/// A full-text query against one scope.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    /// Exact phrase match instead of all-terms match.
    pub phrase: bool,
    pub limit: i64,
}

/// One search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document_id: String,
    pub owner: String,
    pub subdirectory: String,
    pub file_name: String,
    /// Backend-relative relevance score; higher is better.
    pub raw_score: f64,
    pub snippet: String,
}

/// Per-owner aggregate for operator inspection.
#[derive(Debug, Clone)]
pub struct OwnerSummary {
    pub owner: String,
    pub document_count: i64,
    pub fingerprint: Option<String>,
    pub first_indexed: i64,
    pub last_indexed: i64,
}

/// Abstract document store.
///
/// Scope creation, deletion, and selection are glue concerns — the core
/// pipeline only ever receives an already-resolved scope identifier.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`index_document`](DocumentStore::index_document) | Write one document into a scope |
/// | [`count_matching`](DocumentStore::count_matching) | Count documents matching owner + fingerprint |
/// | [`search`](DocumentStore::search) | Term or phrase full-text search |
/// | [`delete_by_owner`](DocumentStore::delete_by_owner) | Bulk-delete all of an owner's documents |
/// | [`list_owners`](DocumentStore::list_owners) | Per-owner document aggregates |
/// | [`scope_exists`](DocumentStore::scope_exists) / [`create_scope`](DocumentStore::create_scope) / [`delete_scope`](DocumentStore::delete_scope) / [`list_scopes`](DocumentStore::list_scopes) | Scope management |
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Writes one document into the scope, returning its id.
    async fn index_document(&self, scope: &str, doc: &IndexedDocument) -> Result<String>;

    /// Counts documents in the scope matching both owner and fingerprint
    /// exactly. The duplicate resolver's remote check.
    async fn count_matching(&self, scope: &str, owner: &str, fingerprint: &str) -> Result<u64>;

    /// Full-text search within the scope.
    async fn search(&self, scope: &str, query: &SearchQuery) -> Result<Vec<SearchHit>>;

    /// Deletes every document belonging to `owner` in the scope; returns the
    /// number deleted.
    async fn delete_by_owner(&self, scope: &str, owner: &str) -> Result<u64>;

    /// Per-owner document counts and first/last indexed timestamps.
    async fn list_owners(&self, scope: &str) -> Result<Vec<OwnerSummary>>;

    async fn scope_exists(&self, scope: &str) -> Result<bool>;

    async fn create_scope(&self, scope: &str) -> Result<()>;

    /// Removes the scope and every document in it.
    async fn delete_scope(&self, scope: &str) -> Result<()>;

    async fn list_scopes(&self) -> Result<Vec<String>>;
}
