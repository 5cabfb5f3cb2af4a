// src/tree/manifest.rs

//! Deletion manifest: files present in the baseline but absent from the mod
//!
//! On disk the manifest is UTF-8 text, one forward-slash relative path per
//! line, each line newline-terminated. Entry order is discovery order and
//! carries no meaning beyond that.

use crate::error::{Error, Result};
use std::path::Path;
use tracing::warn;

/// Ordered list of relative paths to delete after a patch overlay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionManifest {
    entries: Vec<String>,
}

impl DeletionManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry, normalizing separators and stripping leading slashes
    pub fn push(&mut self, path: impl AsRef<str>) {
        let normalized = path.as_ref().replace('\\', "/");
        let normalized = normalized.trim().trim_start_matches('/');
        if !normalized.is_empty() {
            self.entries.push(normalized.to_string());
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.iter().any(|e| e == path)
    }

    /// Parse manifest text; blank lines are skipped
    pub fn parse(text: &str) -> Self {
        let mut manifest = Self::new();
        for line in text.lines() {
            manifest.push(line);
        }
        manifest
    }

    /// Render manifest text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(entry);
            out.push('\n');
        }
        out
    }

    /// Read a manifest file
    pub fn read(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io_at(path, e))?;
        Ok(Self::parse(&text))
    }

    /// Read a manifest file, treating a missing or unreadable file as empty
    pub fn read_or_empty(path: &Path) -> Self {
        match Self::read(path) {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                Self::new()
            }
        }
    }

    /// Write the manifest, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        std::fs::write(path, self.to_text()).map_err(|e| Error::io_at(path, e))
    }
}
