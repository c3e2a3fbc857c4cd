//! Structural fingerprinting of directory trees.
//!
//! The fingerprint is a SHA-256 digest over a canonical serialization of the
//! tree's shape: relative paths, file sizes, and lowercased extensions. Byte
//! content is deliberately excluded, so the digest is cheap even for large
//! trees at the cost of not distinguishing same-name/same-size files with
//! different content.

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::models::Fingerprint;

/// Computes the structural fingerprint of the tree rooted at `root`.
///
/// Entries at each level are sorted by name before hashing, so the digest
/// never depends on filesystem-reported order. Renaming `root` itself does
/// not change the digest; only paths relative to it matter. A missing root
/// or unreadable entry is a fatal error — no partial digest is produced.
pub fn compute_fingerprint(root: &Path) -> Result<Fingerprint> {
    let meta = std::fs::metadata(root)
        .with_context(|| format!("cannot stat fingerprint root: {}", root.display()))?;
    if !meta.is_dir() {
        bail!("fingerprint root is not a directory: {}", root.display());
    }

    let mut hasher = Sha256::new();
    hash_directory(root, root, &mut hasher)?;
    Ok(Fingerprint::from_hex(hex::encode(hasher.finalize())))
}

fn hash_directory(root: &Path, dir: &Path, hasher: &mut Sha256) -> Result<()> {
    let mut entries: Vec<_> = std::fs::read_dir(dir)
        .with_context(|| format!("cannot read directory: {}", dir.display()))?
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("cannot list directory: {}", dir.display()))?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        // Follows symlinks, matching stat semantics.
        let meta = std::fs::metadata(&path)
            .with_context(|| format!("cannot stat entry: {}", path.display()))?;
        let relative = relative_path(root, &path);

        if meta.is_dir() {
            hasher.update(format!("DIR:{}", relative));
            hash_directory(root, &path, hasher)?;
        } else if meta.is_file() {
            hasher.update(format!(
                "FILE:{}:{}:{}",
                relative,
                meta.len(),
                dotted_extension(&path)
            ));
        }
    }
    Ok(())
}

/// Path relative to `root`, normalized to `/` separators so the digest is
/// identical across platforms.
pub(crate) fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

/// Lowercased extension with leading dot, or empty when the file has none.
pub(crate) fn dotted_extension(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}
