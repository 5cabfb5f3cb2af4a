// src/tree/apply.rs

//! Patch application: overlay a patch directory onto a fresh target tree
//!
//! All copies happen before any deletion. Deletion is best-effort: entries
//! that no longer name a regular file in the target are skipped.

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::tree::manifest::DeletionManifest;
use crate::tree::path::safe_join;
use crate::tree::walker::walk_files;
use std::path::Path;
use tracing::{debug, info, warn};

/// What an application changed in the target tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Files copied from the patch directory
    pub copied: usize,
    /// Files deleted because the manifest named them
    pub deleted: usize,
    /// Manifest entries that did not name a regular file
    pub skipped: usize,
}

/// Overlays patch directories, ignoring pipeline-owned file names
#[derive(Debug, Clone)]
pub struct PatchApplier {
    ignored_files: Vec<String>,
}

impl PatchApplier {
    pub fn new(ignored_files: Vec<String>) -> Self {
        Self { ignored_files }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.ignored_patch_files.clone())
    }

    fn is_ignored(&self, file: &Path) -> bool {
        file.file_name()
            .map(|name| {
                let name = name.to_string_lossy();
                self.ignored_files.iter().any(|ignored| *ignored == name)
            })
            .unwrap_or(false)
    }

    /// Apply `patch_dir` and `manifest_file` to `target`
    ///
    /// A missing patch directory is a logged no-op.
    pub fn apply(&self, patch_dir: &Path, manifest_file: &Path, target: &Path) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        if !patch_dir.is_dir() {
            info!(
                "Skipping patch injection, patch dir {} doesn't exist (your local repo may be outdated)",
                patch_dir.display()
            );
            return Ok(report);
        }

        for file in &walk_files(patch_dir) {
            let file = file?;
            if self.is_ignored(&file) {
                continue;
            }

            let relative = file.strip_prefix(patch_dir).map_err(|_| {
                Error::InvalidPath(format!("{} is not under {}", file.display(), patch_dir.display()))
            })?;
            let dest = target.join(relative);
            debug!("Copying patch: {} -> {}", file.display(), dest.display());

            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
            }
            std::fs::copy(&file, &dest).map_err(|e| Error::io_at(&file, e))?;
            report.copied += 1;
        }

        let manifest = DeletionManifest::read_or_empty(manifest_file);
        for entry in manifest.entries() {
            let path = match safe_join(target, entry) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Ignoring manifest entry {}: {}", entry, e);
                    report.skipped += 1;
                    continue;
                }
            };

            let is_file = std::fs::symlink_metadata(&path)
                .map(|m| m.is_file())
                .unwrap_or(false);
            if !is_file {
                report.skipped += 1;
                continue;
            }

            info!("Deleting {}", path.display());
            match std::fs::remove_file(&path) {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!("Failed to delete {}: {}", path.display(), e);
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }
}
