// src/tree/walker.rs

//! Lazy traversal of regular files under a root
//!
//! A [`FileWalk`] only records its root; every call to [`FileWalk::iter`]
//! starts a fresh traversal, so the same walk can be consumed more than once.
//! Symbolic links are never followed and never yielded.

use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Restartable sequence of regular files under a root path
#[derive(Debug, Clone)]
pub struct FileWalk {
    root: PathBuf,
}

/// Walk the regular files under `root`
///
/// - a regular file root yields exactly itself
/// - a missing root (or a root that is a symlink) yields nothing
pub fn walk_files(root: impl AsRef<Path>) -> FileWalk {
    FileWalk {
        root: root.as_ref().to_path_buf(),
    }
}

impl FileWalk {
    /// Root this walk starts from
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start a new traversal
    pub fn iter(&self) -> Box<dyn Iterator<Item = Result<PathBuf>> + '_> {
        let meta = match std::fs::symlink_metadata(&self.root) {
            Ok(meta) => meta,
            Err(_) => return Box::new(std::iter::empty()),
        };

        if meta.file_type().is_symlink() {
            debug!("Not following symlinked root {}", self.root.display());
            return Box::new(std::iter::empty());
        }

        if meta.is_file() {
            return Box::new(std::iter::once(Ok(self.root.clone())));
        }

        if !meta.is_dir() {
            return Box::new(std::iter::empty());
        }

        let entries = WalkDir::new(&self.root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(e) if e.file_type().is_file() => Some(Ok(e.into_path())),
                Ok(_) => None,
                Err(e) => Some(Err(e.into())),
            });

        Box::new(entries)
    }

    /// Collect every file of the walk, stopping at the first error
    pub fn collect_files(&self) -> Result<Vec<PathBuf>> {
        self.iter().collect()
    }
}

impl<'a> IntoIterator for &'a FileWalk {
    type Item = Result<PathBuf>;
    type IntoIter = Box<dyn Iterator<Item = Result<PathBuf>> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
