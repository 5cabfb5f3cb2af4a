// src/lib.rs

//! apkpatch
//!
//! Rebuilds a modded Android package from a mod project and a set of
//! source-controlled patches, then aligns, signs, installs and launches it.
//!
//! # Architecture
//!
//! - Decompiled trees: the stock package is decompiled once into a target tree
//!   that every run mutates in place
//! - Patch sets: changed files plus a deletion manifest, produced by diffing
//!   the stock tree against a hand-modded target tree
//! - Deconfliction: mod code and its embedded runtimes are renamed away from
//!   the host package's own copies before they are merged
//! - Pipeline: a linear, fail-fast stage sequence driving external tools
//!   through one gateway

pub mod cli;
pub mod config;
mod error;
pub mod pipeline;
pub mod platform;
pub mod settings;
pub mod smali;
pub mod tools;
pub mod tree;

pub use config::{ConfigFile, PipelineConfig, RunFlags, SigningInfo};
pub use error::{Error, Result};
pub use pipeline::{AssumeYes, Confirm, Pipeline, PipelineStage, PipelineState, RunSummary};
pub use settings::Settings;
pub use smali::SmaliRewriter;
pub use tools::{BuildTools, Toolbox};
pub use tree::{DeletionManifest, PatchApplier, PatchSet, TreeDiffer, walk_files};
