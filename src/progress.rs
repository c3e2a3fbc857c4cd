//! Ingestion progress reporting.
//!
//! Reports observable progress during `foldex ingest` and `foldex crawl` so
//! users see which folder is being fingerprinted and how many files are left.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for one ingestion pass.
#[derive(Clone, Debug)]
pub enum IngestEvent {
    /// Walking the folder tree and hashing its structure. Total unknown.
    Fingerprinting { folder: String },
    /// The duplicate check decided to skip the folder.
    Skipped { folder: String, reason: String },
    /// Index phase: n files processed out of total.
    Indexing { folder: String, n: u64, total: u64 },
}

/// Reports ingest progress. Implementations write to stderr (human or JSON).
pub trait IngestProgressReporter: Send + Sync {
    /// Emit a progress event. Called from the ingestion pipeline.
    fn report(&self, event: IngestEvent);
}

/// Human-friendly progress on stderr: "ingest devA  indexing  12 / 1,204 files".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestEvent) {
        let line = match &event {
            IngestEvent::Fingerprinting { folder } => {
                format!("ingest {}  fingerprinting...\n", folder)
            }
            IngestEvent::Skipped { folder, reason } => {
                format!("ingest {}  skipped ({})\n", folder, reason)
            }
            IngestEvent::Indexing { folder, n, total } => {
                format!(
                    "ingest {}  indexing  {} / {} files\n",
                    folder,
                    format_number(*n),
                    format_number(*total)
                )
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl IngestProgressReporter for JsonProgress {
    fn report(&self, event: IngestEvent) {
        let obj = match &event {
            IngestEvent::Fingerprinting { folder } => serde_json::json!({
                "event": "progress",
                "folder": folder,
                "phase": "fingerprinting"
            }),
            IngestEvent::Skipped { folder, reason } => serde_json::json!({
                "event": "progress",
                "folder": folder,
                "phase": "skipped",
                "reason": reason
            }),
            IngestEvent::Indexing { folder, n, total } => serde_json::json!({
                "event": "progress",
                "folder": folder,
                "phase": "indexing",
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl IngestProgressReporter for NoProgress {
    fn report(&self, _event: IngestEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            "auto" => Some(Self::default_for_tty()),
            _ => None,
        }
    }

    /// Build a reporter for this mode. Caller passes it to the pipeline.
    pub fn reporter(&self) -> Box<dyn IngestProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
