// src/tree/fingerprint.rs

//! Build fingerprints guarding quick-mode rebuilds
//!
//! A full build records what the target tree looked like (outside the mod
//! bytecode unit) and what the patch directory contained. A quick rebuild only
//! swaps the mod unit inside the last compiled package, so it is only valid
//! while both digests still match.

use crate::error::{Error, Result};
use crate::tree::path::manifest_path;
use crate::tree::walker::walk_files;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;
use xxhash_rust::xxh3::Xxh3;

/// Scratch directory apktool leaves inside a tree it recompiled
const RECOMPILE_SCRATCH_DIR: &str = "build";

/// Snapshot of the inputs of the last full build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFingerprint {
    /// Mod bytecode unit excluded from `tree_digest`
    pub unit: u32,
    /// xxh3-128 over the target tree outside the mod unit
    pub tree_digest: String,
    /// xxh3-128 over the patch directory
    pub patch_digest: String,
    /// When the full build finished
    pub created_at: DateTime<Utc>,
}

impl BuildFingerprint {
    /// Fingerprint the current state of `target` and `patch_dir`
    ///
    /// `unit_dir` is the directory name of the mod unit inside `target`.
    /// Recompilation scratch output is not part of the fingerprint.
    pub fn compute(target: &Path, patch_dir: &Path, unit: u32, unit_dir: &str) -> Result<Self> {
        Ok(Self {
            unit,
            tree_digest: digest_tree(target, &[unit_dir, RECOMPILE_SCRATCH_DIR])?,
            patch_digest: digest_tree(patch_dir, &[])?,
            created_at: Utc::now(),
        })
    }

    /// Whether two fingerprints describe the same build inputs
    pub fn matches(&self, other: &Self) -> bool {
        self.unit == other.unit
            && self.tree_digest == other.tree_digest
            && self.patch_digest == other.patch_digest
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("Invalid build fingerprint {}: {}", path.display(), e)))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize build fingerprint: {}", e)))?;
        std::fs::write(path, json).map_err(|e| Error::io_at(path, e))
    }
}

/// Digest every regular file under `root`, skipping the named top-level entries
///
/// Files are hashed in sorted relative-path order, each as its forward-slash
/// path, a NUL, its length and its bytes. A missing root digests as empty.
pub fn digest_tree(root: &Path, excluded: &[&str]) -> Result<String> {
    let mut files = Vec::new();
    for file in &walk_files(root) {
        let file = file?;
        let relative = manifest_path(root, &file)?;
        let top = relative.split('/').next().unwrap_or_default();
        if excluded.contains(&top) {
            continue;
        }
        files.push((relative, file));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Xxh3::new();
    for (relative, file) in &files {
        let content = std::fs::read(file).map_err(|e| Error::io_at(file, e))?;
        hasher.update(relative.as_bytes());
        hasher.update(&[0]);
        hasher.update(&(content.len() as u64).to_le_bytes());
        hasher.update(&content);
    }

    debug!("Digested {} files under {}", files.len(), root.display());
    Ok(format!("{:032x}", hasher.digest128()))
}
