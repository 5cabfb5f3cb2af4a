// src/tree/mod.rs

//! Decompiled tree operations
//!
//! Walking, differencing two trees into a patch set, overlaying a patch set
//! onto a fresh tree, and fingerprinting trees for quick rebuilds.

pub mod apply;
pub mod diff;
pub mod fingerprint;
pub mod manifest;
pub mod path;
pub mod walker;

pub use apply::{ApplyReport, PatchApplier};
pub use diff::{CompareResult, PatchSet, TreeDiffer, compare, files_equal};
pub use fingerprint::{BuildFingerprint, digest_tree};
pub use manifest::DeletionManifest;
pub use walker::{FileWalk, walk_files};
