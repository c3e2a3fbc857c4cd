use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Root directory holding uploaded folder trees, one owner folder each.
    #[serde(default = "default_uploads_root")]
    pub uploads_root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    /// Scope used when the CLI is not given an explicit `--scope`.
    #[serde(default = "default_scope")]
    pub default_scope: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            uploads_root: default_uploads_root(),
            include_globs: default_include_globs(),
            exclude_globs: Vec::new(),
            follow_symlinks: false,
            default_scope: default_scope(),
        }
    }
}

fn default_uploads_root() -> PathBuf {
    PathBuf::from("./uploads")
}

/// The formats the pipeline knows how to make searchable.
fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.html".to_string(),
        "**/*.htm".to_string(),
        "**/*.txt".to_string(),
        "**/*.css".to_string(),
        "**/*.pdf".to_string(),
        "**/*.csv".to_string(),
        "**/*.info".to_string(),
        "**/*.xlsx".to_string(),
        "**/*.xls".to_string(),
    ]
}

fn default_scope() -> String {
    "directory-index".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.ingest.include_globs.is_empty() {
        anyhow::bail!("ingest.include_globs must not be empty");
    }
    if config.ingest.default_scope.trim().is_empty() {
        anyhow::bail!("ingest.default_scope must not be empty");
    }

    // Catch malformed patterns at startup rather than mid-pass.
    for pattern in config
        .ingest
        .include_globs
        .iter()
        .chain(config.ingest.exclude_globs.iter())
    {
        globset::Glob::new(pattern)
            .with_context(|| format!("invalid glob pattern in config: {}", pattern))?;
    }

    Ok(config)
}
