// src/error.rs

//! Error types for apkpatch

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the patch engine, the rewriter and the build pipeline
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error at {path}: {source}")]
    IoAt {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error(
        "The reference decompiled APK and the modded APK do not match at {anchor}.\n\n\
         The likely cause is that one of them was decompiled with --no-debug-info. \
         Check the files and try again."
    )]
    AnchorMismatch { anchor: String },

    #[error("Patch error: {0}")]
    Patch(String),

    #[error("Command {command} failed:\n{output}")]
    ToolFailed { command: String, output: String },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Checksum mismatch for {url}\nExpected: {expected}\nReceived: {actual}")]
    ChecksumMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Declined(String),
}

impl Error {
    /// Attach the offending path to an I/O error
    pub fn io_at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::IoAt {
            path: path.into(),
            source,
        }
    }

    /// Process exit status for this error
    ///
    /// Declining an interactive download is a deliberate stop, not a failure.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Declined(_) => 0,
            _ => 1,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        Self::Archive(e.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        let path = e.path().map(|p| p.display().to_string());
        match e.into_io_error() {
            Some(io) => match path {
                Some(p) => Self::IoAt {
                    path: PathBuf::from(p),
                    source: io,
                },
                None => Self::Io(io),
            },
            None => Self::InvalidPath(format!(
                "filesystem loop detected at {}",
                path.unwrap_or_else(|| "<unknown>".to_string())
            )),
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;
