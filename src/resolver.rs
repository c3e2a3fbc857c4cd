//! Duplicate detection and ledger reconciliation.
//!
//! The resolver layers the persisted ledger over the live document store as
//! an ordered decision list: ledger first (fast, no remote round trip), store
//! second (covers data indexed before the ledger existed), and a conservative
//! policy for the case where the store cannot be reached.

use anyhow::Result;

use crate::ledger::Ledger;
use crate::models::Fingerprint;
use crate::store::DocumentStore;

/// Which layer established that a folder is a duplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateSource {
    Ledger,
    Index,
}

impl std::fmt::Display for DuplicateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DuplicateSource::Ledger => f.write_str("ledger"),
            DuplicateSource::Index => f.write_str("index"),
        }
    }
}

/// Outcome of the ordered duplicate check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateCheck {
    /// Positively known to be already ingested.
    Duplicate(DuplicateSource),
    /// Neither layer knows the folder.
    New,
    /// The store could not be queried; only the ledger's negative answer is
    /// known. Resolved by policy to "proceed".
    Unknown,
}

/// Outcome of the reconciliation variant used by the crawl workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Duplicate(DuplicateSource),
    /// The folder should be ingested. `stale_removed` is set when a ledger
    /// record claimed completion but the store held no matching documents,
    /// and the record was deleted.
    Eligible { stale_removed: bool },
}

pub struct DuplicateResolver<'a> {
    ledger: &'a Ledger,
    store: &'a dyn DocumentStore,
    scope: &'a str,
}

impl<'a> DuplicateResolver<'a> {
    pub fn new(ledger: &'a Ledger, store: &'a dyn DocumentStore, scope: &'a str) -> Self {
        DuplicateResolver {
            ledger,
            store,
            scope,
        }
    }

    /// Ordered, short-circuiting duplicate check.
    ///
    /// 1. Ledger hit — duplicate, without touching the store.
    /// 2. Store holds a document matching owner + fingerprint — duplicate.
    /// 3. Neither — new.
    /// 4. Store query failed — `Unknown`; the warning is logged and the
    ///    ledger's negative answer stands. A failed check never propagates
    ///    as an error of the overall operation.
    pub async fn check(&self, fingerprint: &Fingerprint, owner: &str) -> Result<DuplicateCheck> {
        if self.ledger.exists(fingerprint, owner, self.scope).await? {
            return Ok(DuplicateCheck::Duplicate(DuplicateSource::Ledger));
        }

        match self
            .store
            .count_matching(self.scope, owner, fingerprint.as_str())
            .await
        {
            Ok(0) => Ok(DuplicateCheck::New),
            Ok(_) => Ok(DuplicateCheck::Duplicate(DuplicateSource::Index)),
            Err(e) => {
                eprintln!(
                    "warning: duplicate check against store failed for {} ({}); using ledger answer only",
                    owner, e
                );
                Ok(DuplicateCheck::Unknown)
            }
        }
    }

    /// True when ingestion should be skipped.
    pub async fn should_skip(&self, fingerprint: &Fingerprint, owner: &str) -> Result<bool> {
        Ok(matches!(
            self.check(fingerprint, owner).await?,
            DuplicateCheck::Duplicate(_)
        ))
    }

    /// Reconciliation variant used by the crawl workflow only.
    ///
    /// A ledger claim of completion is verified against the live store; if no
    /// matching document exists, the record is stale (index wiped or scope
    /// deleted) — it is removed and the folder reported eligible. If the
    /// verification query fails, the ledger is trusted as-is rather than
    /// deleting a record on uncertain evidence.
    pub async fn reconcile(&self, fingerprint: &Fingerprint, owner: &str) -> Result<Reconciliation> {
        if self.ledger.exists(fingerprint, owner, self.scope).await? {
            match self
                .store
                .count_matching(self.scope, owner, fingerprint.as_str())
                .await
            {
                Ok(0) => {
                    self.ledger.remove(fingerprint, owner, self.scope).await?;
                    return Ok(Reconciliation::Eligible { stale_removed: true });
                }
                Ok(_) => return Ok(Reconciliation::Duplicate(DuplicateSource::Ledger)),
                Err(e) => {
                    eprintln!(
                        "warning: ledger verification against store failed for {} ({}); keeping ledger entry",
                        owner, e
                    );
                    return Ok(Reconciliation::Duplicate(DuplicateSource::Ledger));
                }
            }
        }

        match self.check(fingerprint, owner).await? {
            DuplicateCheck::Duplicate(src) => Ok(Reconciliation::Duplicate(src)),
            DuplicateCheck::New | DuplicateCheck::Unknown => Ok(Reconciliation::Eligible {
                stale_removed: false,
            }),
        }
    }

    /// Records completion in the ledger. Callers must only invoke this after
    /// at least one document was successfully indexed.
    pub async fn finalize(
        &self,
        fingerprint: &Fingerprint,
        owner: &str,
        folder_display_name: &str,
    ) -> Result<()> {
        self.ledger
            .save(fingerprint, owner, folder_display_name, self.scope)
            .await
    }
}
