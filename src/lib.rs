//! # Foldex
//!
//! A folder-ingestion and full-text search tool for heterogeneous document
//! drops.
//!
//! Foldex watches an uploads root where folder trees are dropped (one folder
//! per owner), converts their files (PDF, HTML, Excel, CSV, plain text) into
//! searchable text, and indexes everything into an embedded SQLite + FTS5
//! store. Ingestion is guarded by a folder-fingerprinting protocol: a
//! structural SHA-256 digest over relative paths, sizes, and extensions
//! identifies each folder's exact state, and a persisted ledger of completed
//! ingestions (backed by the live index) prevents the same state from being
//! indexed twice.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────┐
//! │ Uploads dir │──▶│   Pipeline   │──▶│  SQLite  │
//! │  (folders)  │   │ Fingerprint  │   │   FTS5   │
//! └─────────────┘   │ Dedup+Extract│   └────┬─────┘
//!                   └──────┬───────┘        │
//!                          ▼                ▼
//!                   ┌──────────────┐  ┌──────────┐
//!                   │ Ledger (JSON)│  │   CLI    │
//!                   └──────────────┘  │ (foldex) │
//!                                     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! foldex init                       # create database
//! foldex ingest ./uploads/devA      # ingest one folder
//! foldex crawl                      # ingest every new folder in uploads
//! foldex search "meeting notes"
//! foldex search "jane doe" --phrase
//! foldex owners                     # per-owner document counts
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`fingerprint`] | Structural folder digests |
//! | [`ledger`] | Persisted record of completed ingestions |
//! | [`resolver`] | Ledger + index duplicate decisions |
//! | [`ingest`] | Per-folder ingestion pipeline |
//! | [`crawl`] | Batch crawl over the uploads root |
//! | [`extract`] | File-format text extraction |
//! | [`store`] | Document store trait, SQLite and in-memory backends |
//! | [`search`] | Search command |
//! | [`admin`] | Ledger, owner, and scope operator commands |
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod admin;
pub mod config;
pub mod crawl;
pub mod db;
pub mod extract;
pub mod fingerprint;
pub mod ingest;
pub mod ledger;
pub mod migrate;
pub mod models;
pub mod progress;
pub mod resolver;
pub mod search;
pub mod store;
