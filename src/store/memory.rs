//! In-memory [`DocumentStore`] implementation for unit tests.
//!
//! Uses `BTreeSet`/`Vec` behind `std::sync::RwLock` for thread safety.
//! Search is naive substring matching over extracted text and file names.

use std::collections::BTreeSet;
use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::IndexedDocument;

use super::{DocumentStore, OwnerSummary, SearchHit, SearchQuery};

struct StoredDoc {
    scope: String,
    doc: IndexedDocument,
}

/// In-memory store for tests.
pub struct MemoryStore {
    scopes: RwLock<BTreeSet<String>>,
    docs: RwLock<Vec<StoredDoc>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            scopes: RwLock::new(BTreeSet::new()),
            docs: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn index_document(&self, scope: &str, doc: &IndexedDocument) -> Result<String> {
        self.docs.write().unwrap().push(StoredDoc {
            scope: scope.to_string(),
            doc: doc.clone(),
        });
        Ok(doc.id.clone())
    }

    async fn count_matching(&self, scope: &str, owner: &str, fingerprint: &str) -> Result<u64> {
        let docs = self.docs.read().unwrap();
        Ok(docs
            .iter()
            .filter(|s| s.scope == scope && s.doc.owner == owner && s.doc.fingerprint == fingerprint)
            .count() as u64)
    }

    async fn search(&self, scope: &str, query: &SearchQuery) -> Result<Vec<SearchHit>> {
        let needle = query.text.to_lowercase();
        let terms: Vec<&str> = needle.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let docs = self.docs.read().unwrap();
        let mut hits: Vec<SearchHit> = docs
            .iter()
            .filter(|s| s.scope == scope)
            .filter_map(|s| {
                let haystack =
                    format!("{} {}", s.doc.file_name, s.doc.extracted_text).to_lowercase();
                let matched = if query.phrase {
                    haystack.contains(needle.trim())
                } else {
                    terms.iter().all(|t| haystack.contains(t))
                };
                if matched {
                    Some(SearchHit {
                        document_id: s.doc.id.clone(),
                        owner: s.doc.owner.clone(),
                        subdirectory: s.doc.subdirectory.clone(),
                        file_name: s.doc.file_name.clone(),
                        raw_score: terms.len() as f64,
                        snippet: s.doc.extracted_text.chars().take(120).collect(),
                    })
                } else {
                    None
                }
            })
            .collect();
        hits.truncate(query.limit as usize);
        Ok(hits)
    }

    async fn delete_by_owner(&self, scope: &str, owner: &str) -> Result<u64> {
        let mut docs = self.docs.write().unwrap();
        let before = docs.len();
        docs.retain(|s| !(s.scope == scope && s.doc.owner == owner));
        Ok((before - docs.len()) as u64)
    }

    async fn list_owners(&self, scope: &str) -> Result<Vec<OwnerSummary>> {
        let docs = self.docs.read().unwrap();
        let mut summaries: Vec<OwnerSummary> = Vec::new();
        for s in docs.iter().filter(|s| s.scope == scope) {
            match summaries.iter_mut().find(|o| o.owner == s.doc.owner) {
                Some(existing) => {
                    existing.document_count += 1;
                    existing.first_indexed = existing.first_indexed.min(s.doc.indexed_at);
                    existing.last_indexed = existing.last_indexed.max(s.doc.indexed_at);
                }
                None => summaries.push(OwnerSummary {
                    owner: s.doc.owner.clone(),
                    document_count: 1,
                    fingerprint: Some(s.doc.fingerprint.clone()),
                    first_indexed: s.doc.indexed_at,
                    last_indexed: s.doc.indexed_at,
                }),
            }
        }
        summaries.sort_by(|a, b| b.document_count.cmp(&a.document_count));
        Ok(summaries)
    }

    async fn scope_exists(&self, scope: &str) -> Result<bool> {
        Ok(self.scopes.read().unwrap().contains(scope))
    }

    async fn create_scope(&self, scope: &str) -> Result<()> {
        self.scopes.write().unwrap().insert(scope.to_string());
        Ok(())
    }

    async fn delete_scope(&self, scope: &str) -> Result<()> {
        self.scopes.write().unwrap().remove(scope);
        self.docs.write().unwrap().retain(|s| s.scope != scope);
        Ok(())
    }

    async fn list_scopes(&self) -> Result<Vec<String>> {
        Ok(self.scopes.read().unwrap().iter().cloned().collect())
    }
}
