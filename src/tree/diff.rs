// src/tree/diff.rs

//! Tree differencing: synthesize a patch set from two decompiled trees
//!
//! The forward walk (modified tree) finds changed and added files and copies
//! them into the patch directory. The reverse walk (baseline tree) finds
//! files the mod removed and records them in the deletion manifest. Both
//! walks use the same tracked subpath list.
//!
//! Comparison runs in parallel per tracked subpath; copies and manifest
//! accumulation happen afterwards on the calling thread, in tracked order.

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::tree::manifest::DeletionManifest;
use crate::tree::path::manifest_path;
use crate::tree::walker::walk_files;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// Buffer size for streaming file comparison (64 KB)
const COMPARE_BUFFER_SIZE: usize = 64 * 1024;

/// Outcome of comparing one modified file with its baseline counterpart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareResult {
    /// Same length and content
    Equal,
    /// Both exist, content differs
    NotEqual,
    /// Only the modified tree has the file
    BaselineMissing,
}

/// Result of differencing two trees
#[derive(Debug, Clone)]
pub struct PatchSet {
    /// Directory the changed files were copied into
    pub patch_dir: PathBuf,
    /// Relative paths copied into `patch_dir`, forward-slash form
    pub copied: Vec<String>,
    /// Files present in the baseline but not in the modified tree
    pub deletions: DeletionManifest,
}

impl PatchSet {
    /// Whether the diff found nothing to patch
    pub fn is_empty(&self) -> bool {
        self.copied.is_empty() && self.deletions.is_empty()
    }
}

/// Compares a baseline tree against a modified tree over tracked subpaths
#[derive(Debug, Clone)]
pub struct TreeDiffer {
    anchor_file: String,
    tracked_subpaths: Vec<String>,
    manifest_name: String,
}

impl TreeDiffer {
    pub fn new(
        anchor_file: impl Into<String>,
        tracked_subpaths: Vec<String>,
        manifest_name: impl Into<String>,
    ) -> Self {
        Self {
            anchor_file: anchor_file.into(),
            tracked_subpaths,
            manifest_name: manifest_name.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.anchor_file.clone(),
            settings.tracked_subpaths.clone(),
            settings.deletion_manifest_name.clone(),
        )
    }

    /// Location of the deletion manifest inside a patch directory
    pub fn manifest_path(&self, patch_dir: &Path) -> PathBuf {
        patch_dir.join(&self.manifest_name)
    }

    /// Diff `baseline` against `modified`, writing the patch set to `patch_dir`
    ///
    /// Any previous content of `patch_dir` is replaced. If anything fails
    /// after the anchor check, `patch_dir` is removed so that no half-written
    /// patch set survives.
    pub fn diff(&self, baseline: &Path, modified: &Path, patch_dir: &Path) -> Result<PatchSet> {
        self.check_anchor(baseline, modified)?;

        match self.write_patch_set(baseline, modified, patch_dir) {
            Ok(patch_set) => Ok(patch_set),
            Err(e) => {
                error!("Patch creation failed, removing {}", patch_dir.display());
                if patch_dir.exists()
                    && let Err(cleanup) = std::fs::remove_dir_all(patch_dir)
                {
                    error!("Failed to remove {}: {}", patch_dir.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    /// Both trees must agree on the anchor file, or they were decompiled
    /// under different settings
    fn check_anchor(&self, baseline: &Path, modified: &Path) -> Result<()> {
        let baseline_anchor = baseline.join(&self.anchor_file);
        let modified_anchor = modified.join(&self.anchor_file);

        match compare(&baseline_anchor, &modified_anchor) {
            Ok(CompareResult::Equal) => Ok(()),
            Ok(_) => Err(Error::AnchorMismatch {
                anchor: self.anchor_file.clone(),
            }),
            Err(Error::Patch(msg)) => Err(Error::Precondition(msg)),
            Err(e) => Err(e),
        }
    }

    fn write_patch_set(&self, baseline: &Path, modified: &Path, patch_dir: &Path) -> Result<PatchSet> {
        if patch_dir.exists() {
            std::fs::remove_dir_all(patch_dir).map_err(|e| Error::io_at(patch_dir, e))?;
        }
        std::fs::create_dir_all(patch_dir).map_err(|e| Error::io_at(patch_dir, e))?;

        let changed = self.changed_files(baseline, modified)?;
        let mut copied = Vec::with_capacity(changed.len());
        for (relative, source) in changed {
            let dest = patch_dir.join(&relative);
            if let Some(parent) = dest.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
            }
            std::fs::copy(&source, &dest).map_err(|e| Error::io_at(&source, e))?;
            copied.push(relative);
        }

        let deletions = self.deleted_files(baseline, modified)?;
        deletions.write(&self.manifest_path(patch_dir))?;

        info!(
            "Patch set: {} changed or added, {} deleted",
            copied.len(),
            deletions.len()
        );

        Ok(PatchSet {
            patch_dir: patch_dir.to_path_buf(),
            copied,
            deletions,
        })
    }

    /// Forward walk: files of `modified` that differ from or are missing in `baseline`
    fn changed_files(&self, baseline: &Path, modified: &Path) -> Result<Vec<(String, PathBuf)>> {
        let per_subpath: Vec<Result<Vec<(String, PathBuf)>>> = self
            .tracked_subpaths
            .par_iter()
            .map(|subpath| {
                let root = modified.join(subpath);
                debug!("Walking {}", root.display());

                let mut changed = Vec::new();
                for file in &walk_files(&root) {
                    let file = file?;
                    let relative = manifest_path(modified, &file)?;
                    match compare(&baseline.join(&relative), &file)? {
                        CompareResult::Equal => {}
                        CompareResult::NotEqual | CompareResult::BaselineMissing => {
                            changed.push((relative, file));
                        }
                    }
                }
                Ok(changed)
            })
            .collect();

        let mut seen = HashSet::new();
        let mut changed = Vec::new();
        for result in per_subpath {
            for (relative, file) in result? {
                if seen.insert(relative.clone()) {
                    changed.push((relative, file));
                }
            }
        }
        Ok(changed)
    }

    /// Reverse walk: files of `baseline` with no counterpart in `modified`
    fn deleted_files(&self, baseline: &Path, modified: &Path) -> Result<DeletionManifest> {
        let per_subpath: Vec<Result<Vec<String>>> = self
            .tracked_subpaths
            .par_iter()
            .map(|subpath| {
                let root = baseline.join(subpath);
                debug!("Walking {} (reverse)", root.display());

                let mut missing = Vec::new();
                for file in &walk_files(&root) {
                    let file = file?;
                    let relative = manifest_path(baseline, &file)?;
                    if !modified.join(&relative).exists() {
                        missing.push(relative);
                    }
                }
                Ok(missing)
            })
            .collect();

        let mut seen = HashSet::new();
        let mut manifest = DeletionManifest::new();
        for result in per_subpath {
            for relative in result? {
                if seen.insert(relative.clone()) {
                    manifest.push(relative);
                }
            }
        }
        Ok(manifest)
    }
}

/// Compare a baseline file with a modified file
pub fn compare(baseline_file: &Path, modified_file: &Path) -> Result<CompareResult> {
    let baseline_exists = baseline_file.is_file();
    let modified_exists = modified_file.is_file();

    match (baseline_exists, modified_exists) {
        (false, false) => Err(Error::Patch(format!(
            "Neither tree contains {}. It looks like you're attempting to create patches \
             on your first run, which won't work. Run a normal build first.",
            modified_file.display()
        ))),
        (true, false) => Err(Error::Patch(format!(
            "{} disappeared from the modified tree during comparison",
            modified_file.display()
        ))),
        (false, true) => Ok(CompareResult::BaselineMissing),
        (true, true) => {
            if files_equal(baseline_file, modified_file)? {
                Ok(CompareResult::Equal)
            } else {
                Ok(CompareResult::NotEqual)
            }
        }
    }
}

/// Byte-compare two files, checking length first
pub fn files_equal(a: &Path, b: &Path) -> Result<bool> {
    let a_len = std::fs::metadata(a).map_err(|e| Error::io_at(a, e))?.len();
    let b_len = std::fs::metadata(b).map_err(|e| Error::io_at(b, e))?.len();
    if a_len != b_len {
        return Ok(false);
    }

    let mut a_reader = BufReader::new(File::open(a).map_err(|e| Error::io_at(a, e))?);
    let mut b_reader = BufReader::new(File::open(b).map_err(|e| Error::io_at(b, e))?);
    let mut a_buf = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut b_buf = vec![0u8; COMPARE_BUFFER_SIZE];

    loop {
        let a_read = read_full(&mut a_reader, &mut a_buf).map_err(|e| Error::io_at(a, e))?;
        let b_read = read_full(&mut b_reader, &mut b_buf).map_err(|e| Error::io_at(b, e))?;
        if a_read != b_read || a_buf[..a_read] != b_buf[..b_read] {
            return Ok(false);
        }
        if a_read == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
