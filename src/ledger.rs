//! Durable ledger of completed ingestions.
//!
//! The ledger is a single flat JSON file mapping `"<fingerprint>:<owner>:<scope>"`
//! keys to completion records. Every operation reloads the whole file and
//! rewrites it on mutation — there is no in-memory cache across calls.
//!
//! All access goes through a single-writer task ([`Ledger`]) owning the file
//! exclusively, so two concurrent operations can never interleave a
//! load→save round trip and lose a write.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};

use crate::models::Fingerprint;

/// Composite key for one completed ingestion: (fingerprint, owner, scope).
///
/// Two scopes each hold their own record for the same (fingerprint, owner)
/// pair — ingestion into one scope never blocks another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerKey {
    pub fingerprint: Fingerprint,
    pub owner: String,
    pub scope: String,
}

impl std::fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.fingerprint, self.owner, self.scope)
    }
}

/// One completion record. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerRecord {
    pub fingerprint: Fingerprint,
    pub owner: String,
    pub folder_display_name: String,
    pub scope: String,
    pub completed_at: DateTime<Utc>,
}

/// The persisted ledger file. Each operation does a full load at the start
/// and a full atomic rewrite at the end.
pub struct LedgerFile {
    path: PathBuf,
}

impl LedgerFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        LedgerFile { path: path.into() }
    }

    /// Reads the whole ledger into memory. Creates an empty file if absent.
    ///
    /// A malformed file degrades to an empty map with a warning rather than
    /// failing the caller — the document store remains the fallback source
    /// of truth for duplicate checks.
    pub fn load(&self) -> Result<BTreeMap<String, LedgerRecord>> {
        if !self.path.exists() {
            let empty = BTreeMap::new();
            self.persist(&empty)?;
            return Ok(empty);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read ledger file: {}", self.path.display()))?;

        match serde_json::from_str(&content) {
            Ok(map) => Ok(map),
            Err(e) => {
                eprintln!(
                    "warning: ledger file {} is corrupt ({}); treating as empty",
                    self.path.display(),
                    e
                );
                Ok(BTreeMap::new())
            }
        }
    }

    pub fn exists(&self, key: &LedgerKey) -> Result<bool> {
        Ok(self.load()?.contains_key(&key.to_string()))
    }

    /// Inserts a record for the key if absent, then persists. Re-saving an
    /// existing key is a no-op — records are never overwritten.
    pub fn save(
        &self,
        fingerprint: &Fingerprint,
        owner: &str,
        folder_display_name: &str,
        scope: &str,
    ) -> Result<()> {
        let mut map = self.load()?;
        let key = LedgerKey {
            fingerprint: fingerprint.clone(),
            owner: owner.to_string(),
            scope: scope.to_string(),
        }
        .to_string();

        if map.contains_key(&key) {
            return Ok(());
        }

        map.insert(
            key,
            LedgerRecord {
                fingerprint: fingerprint.clone(),
                owner: owner.to_string(),
                folder_display_name: folder_display_name.to_string(),
                scope: scope.to_string(),
                completed_at: Utc::now(),
            },
        );
        self.persist(&map)
    }

    /// Removes the key if present, persists, and reports whether anything
    /// was deleted.
    pub fn remove(&self, key: &LedgerKey) -> Result<bool> {
        let mut map = self.load()?;
        let removed = map.remove(&key.to_string()).is_some();
        if removed {
            self.persist(&map)?;
        }
        Ok(removed)
    }

    /// All records, newest-first by completion time.
    pub fn list_all(&self) -> Result<Vec<LedgerRecord>> {
        let map = self.load()?;
        let mut records: Vec<LedgerRecord> = map.into_values().collect();
        records.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(records)
    }

    /// Writes the whole map via temp file + rename so a crash mid-write
    /// never leaves a truncated ledger behind.
    fn persist(&self, map: &BTreeMap<String, LedgerRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(map)?;
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "ledger.json".to_string());
        let tmp = self.path.with_file_name(format!("{}.tmp", file_name));

        std::fs::write(&tmp, json)
            .with_context(|| format!("cannot write ledger file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot replace ledger file: {}", self.path.display()))?;
        Ok(())
    }
}

enum LedgerCommand {
    Exists {
        key: LedgerKey,
        reply: oneshot::Sender<Result<bool>>,
    },
    Save {
        fingerprint: Fingerprint,
        owner: String,
        folder_display_name: String,
        scope: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Remove {
        key: LedgerKey,
        reply: oneshot::Sender<Result<bool>>,
    },
    ListAll {
        reply: oneshot::Sender<Result<Vec<LedgerRecord>>>,
    },
}

/// Cloneable handle to the single-writer ledger task.
///
/// The task owns the [`LedgerFile`] exclusively; commands are serialized over
/// a channel, which closes the load/save race between concurrent operations
/// within the process.
#[derive(Clone)]
pub struct Ledger {
    tx: mpsc::Sender<LedgerCommand>,
}

impl Ledger {
    /// Spawns the writer task for the ledger at `path`.
    pub fn spawn(path: impl AsRef<Path>) -> Self {
        let file = LedgerFile::new(path.as_ref());
        let (tx, mut rx) = mpsc::channel::<LedgerCommand>(64);

        tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    LedgerCommand::Exists { key, reply } => {
                        let _ = reply.send(file.exists(&key));
                    }
                    LedgerCommand::Save {
                        fingerprint,
                        owner,
                        folder_display_name,
                        scope,
                        reply,
                    } => {
                        let _ =
                            reply.send(file.save(&fingerprint, &owner, &folder_display_name, &scope));
                    }
                    LedgerCommand::Remove { key, reply } => {
                        let _ = reply.send(file.remove(&key));
                    }
                    LedgerCommand::ListAll { reply } => {
                        let _ = reply.send(file.list_all());
                    }
                }
            }
        });

        Ledger { tx }
    }

    pub async fn exists(&self, fingerprint: &Fingerprint, owner: &str, scope: &str) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Exists {
            key: key_for(fingerprint, owner, scope),
            reply,
        })
        .await?;
        rx.await.map_err(closed)?
    }

    pub async fn save(
        &self,
        fingerprint: &Fingerprint,
        owner: &str,
        folder_display_name: &str,
        scope: &str,
    ) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Save {
            fingerprint: fingerprint.clone(),
            owner: owner.to_string(),
            folder_display_name: folder_display_name.to_string(),
            scope: scope.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(closed)?
    }

    pub async fn remove(&self, fingerprint: &Fingerprint, owner: &str, scope: &str) -> Result<bool> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Remove {
            key: key_for(fingerprint, owner, scope),
            reply,
        })
        .await?;
        rx.await.map_err(closed)?
    }

    pub async fn list_all(&self) -> Result<Vec<LedgerRecord>> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::ListAll { reply }).await?;
        rx.await.map_err(closed)?
    }

    async fn send(&self, cmd: LedgerCommand) -> Result<()> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| anyhow!("ledger task stopped"))
    }
}

fn key_for(fingerprint: &Fingerprint, owner: &str, scope: &str) -> LedgerKey {
    LedgerKey {
        fingerprint: fingerprint.clone(),
        owner: owner.to_string(),
        scope: scope.to_string(),
    }
}

fn closed(_: oneshot::error::RecvError) -> anyhow::Error {
    anyhow!("ledger task stopped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn fp(s: &str) -> Fingerprint {
        Fingerprint::from_hex(s)
    }

    #[test]
    fn load_creates_empty_file_when_absent() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data/ledger.json");
        let ledger = LedgerFile::new(&path);

        let map = ledger.load().unwrap();
        assert!(map.is_empty());
        assert!(path.exists());
        assert_eq!(fs::read_to_string(&path).unwrap().trim(), "{}");
    }

    #[test]
    fn save_load_exists_round_trip() {
        let tmp = TempDir::new().unwrap();
        let ledger = LedgerFile::new(tmp.path().join("ledger.json"));
        let key = LedgerKey {
            fingerprint: fp("abc123"),
            owner: "devA".to_string(),
            scope: "cases".to_string(),
        };

        assert!(!ledger.exists(&key).unwrap());
        ledger.save(&fp("abc123"), "devA", "devA", "cases").unwrap();
        assert!(ledger.exists(&key).unwrap());

        assert!(ledger.remove(&key).unwrap());
        assert!(!ledger.exists(&key).unwrap());
        assert!(!ledger.remove(&key).unwrap());
    }

    #[test]
    fn save_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let ledger = LedgerFile::new(tmp.path().join("ledger.json"));

        ledger.save(&fp("abc"), "devA", "devA", "cases").unwrap();
        let first = ledger.list_all().unwrap();
        ledger.save(&fp("abc"), "devA", "devA", "cases").unwrap();
        let second = ledger.list_all().unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first[0].completed_at, second[0].completed_at);
    }

    #[test]
    fn scopes_are_independent() {
        let tmp = TempDir::new().unwrap();
        let ledger = LedgerFile::new(tmp.path().join("ledger.json"));

        ledger.save(&fp("abc"), "devA", "devA", "scope-a").unwrap();
        let key_b = LedgerKey {
            fingerprint: fp("abc"),
            owner: "devA".to_string(),
            scope: "scope-b".to_string(),
        };
        assert!(!ledger.exists(&key_b).unwrap());

        ledger.save(&fp("abc"), "devA", "devA", "scope-b").unwrap();
        assert_eq!(ledger.list_all().unwrap().len(), 2);
    }

    #[test]
    fn unrelated_keys_survive_a_save() {
        let tmp = TempDir::new().unwrap();
        let ledger = LedgerFile::new(tmp.path().join("ledger.json"));

        ledger.save(&fp("aaa"), "devA", "devA", "cases").unwrap();
        ledger.save(&fp("bbb"), "devB", "devB", "cases").unwrap();

        let map = ledger.load().unwrap();
        assert!(map.contains_key("aaa:devA:cases"));
        assert!(map.contains_key("bbb:devB:cases"));
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledger.json");
        fs::write(&path, "not json {{{").unwrap();

        let ledger = LedgerFile::new(&path);
        assert!(ledger.load().unwrap().is_empty());

        // Still usable after corruption.
        ledger.save(&fp("abc"), "devA", "devA", "cases").unwrap();
        assert_eq!(ledger.list_all().unwrap().len(), 1);
    }

    #[test]
    fn list_all_is_newest_first() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("ledger.json");
        fs::write(
            &path,
            r#"{
  "aaa:devA:cases": {
    "fingerprint": "aaa", "owner": "devA", "folderDisplayName": "devA",
    "scope": "cases", "completedAt": "2024-01-01T00:00:00Z"
  },
  "bbb:devB:cases": {
    "fingerprint": "bbb", "owner": "devB", "folderDisplayName": "devB",
    "scope": "cases", "completedAt": "2024-06-01T00:00:00Z"
  }
}"#,
        )
        .unwrap();

        let records = LedgerFile::new(&path).list_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].owner, "devB");
        assert_eq!(records[1].owner, "devA");
    }

    #[test]
    fn record_serializes_with_camel_case_keys() {
        let record = LedgerRecord {
            fingerprint: fp("abc"),
            owner: "devA".to_string(),
            folder_display_name: "devA".to_string(),
            scope: "cases".to_string(),
            completed_at: Utc::now(),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"folderDisplayName\""));
        assert!(json.contains("\"completedAt\""));
    }

    #[tokio::test]
    async fn handle_round_trips_through_writer_task() {
        let tmp = TempDir::new().unwrap();
        let ledger = Ledger::spawn(tmp.path().join("ledger.json"));

        assert!(!ledger.exists(&fp("abc"), "devA", "cases").await.unwrap());
        ledger.save(&fp("abc"), "devA", "devA", "cases").await.unwrap();
        assert!(ledger.exists(&fp("abc"), "devA", "cases").await.unwrap());
        assert_eq!(ledger.list_all().await.unwrap().len(), 1);
        assert!(ledger.remove(&fp("abc"), "devA", "cases").await.unwrap());
        assert!(!ledger.exists(&fp("abc"), "devA", "cases").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_saves_all_land() {
        let tmp = TempDir::new().unwrap();
        let ledger = Ledger::spawn(tmp.path().join("ledger.json"));

        let mut handles = Vec::new();
        for i in 0..10 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                let digest = format!("{:064x}", i);
                ledger
                    .save(&fp(&digest), &format!("dev{}", i), "name", "cases")
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(ledger.list_all().await.unwrap().len(), 10);
    }
}
