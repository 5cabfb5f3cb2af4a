// src/smali/mod.rs

//! Symbol deconfliction for smali sources
//!
//! Mod code ships its own copies of runtime libraries (kotlin, kotlinx, grpc,
//! picasso) that the host application also bundles. Before the mod unit is
//! merged into the host tree, every reference to those namespaces is moved to
//! a private name, and annotations that break reflection after the rename are
//! removed.
//!
//! Rewriting is idempotent: renamed tokens no longer match the reserved
//! prefixes, and removed annotation blocks leave nothing for a second pass.

mod port;

pub use port::{PortReport, port_units};

use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::tree::walker::walk_files;
use rayon::prelude::*;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, warn};

static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern is valid"));

/// Line prefixes of debug-only directives
const DEBUG_DIRECTIVES: &[&str] = &[".param ", ".local ", ".end local", ".line ", ".restart "];

/// Rename of a reserved namespace prefix
///
/// A literal substring replacement, except where the match continues a longer
/// namespace path (`Lcom/foo/Lkotlin/`). Letters before the match do not
/// block it: primitive descriptors sit right before `L...;` in signatures
/// such as `(ILkotlin/Unit;)V`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceRule {
    pub from: String,
    pub to: String,
}

impl NamespaceRule {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Rules for the runtime libraries embedded in the mod unit, in order
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("Lkotlin/", "Lkotlin2/"),
            // referenced by name through reflection
            Self::new("kotlin.internal.jdk8.", "kotlin2.internal.jdk8."),
            Self::new("Lkotlinx/", "Lkotlinx2/"),
            Self::new("Lio/grpc/", "Lio/grpc2/"),
            Self::new("Lcom/squareup/picasso/", "Lcom/squareup/picasso2/"),
        ]
    }

    /// Replace every occurrence of `from` not preceded by a path separator
    pub fn apply(&self, text: &str) -> String {
        if self.from.is_empty() {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for (idx, _) in text.match_indices(self.from.as_str()) {
            let nested = text[..idx]
                .chars()
                .next_back()
                .is_some_and(is_path_separator);
            if !nested {
                out.push_str(&text[last..idx]);
                out.push_str(&self.to);
                last = idx + self.from.len();
            }
        }
        out.push_str(&text[last..]);
        out
    }
}

fn is_path_separator(c: char) -> bool {
    matches!(c, '_' | '$' | '/' | '.' | '-')
}

/// Annotation block removed from rewritten sources
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationRule {
    /// `runtime`, `system` or `build`
    pub visibility: String,
    /// Type descriptor, e.g. `Lkotlin2/Metadata;`
    pub type_name: String,
}

impl AnnotationRule {
    pub fn new(visibility: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            visibility: visibility.into(),
            type_name: type_name.into(),
        }
    }

    /// Annotations that fail at runtime once kotlin is renamed
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("runtime", "Lkotlin2/jvm/JvmStatic;"),
            Self::new("system", "Ldalvik/annotation/MethodParameters;"),
            Self::new("runtime", "Lkotlin2/Metadata;"),
            Self::new("system", "Ldalvik/annotation/SourceDebugExtension;"),
        ]
    }

    fn opens(&self, line: &str) -> bool {
        let Some(rest) = line.trim().strip_prefix(".annotation ") else {
            return false;
        };
        let mut parts = rest.split_whitespace();
        parts.next() == Some(self.visibility.as_str()) && parts.next() == Some(self.type_name.as_str())
    }

    /// Remove every block this rule names
    ///
    /// A block without its `.end annotation` is left in place.
    pub fn apply(&self, text: &str) -> String {
        let lines: Vec<&str> = text.split_inclusive('\n').collect();
        let mut out = String::with_capacity(text.len());
        let mut i = 0;

        while i < lines.len() {
            if self.opens(lines[i]) {
                let end = lines[i + 1..]
                    .iter()
                    .position(|l| l.trim() == ".end annotation")
                    .map(|offset| i + 1 + offset);
                match end {
                    Some(end) => {
                        i = end + 1;
                        continue;
                    }
                    None => warn!(
                        "Unterminated .annotation {} {}, leaving it in place",
                        self.visibility, self.type_name
                    ),
                }
            }
            out.push_str(lines[i]);
            i += 1;
        }

        out
    }
}

/// Applies namespace and annotation rules to smali text
#[derive(Debug, Clone)]
pub struct SmaliRewriter {
    namespace_rules: Vec<NamespaceRule>,
    annotation_rules: Vec<AnnotationRule>,
}

impl SmaliRewriter {
    pub fn new(namespace_rules: Vec<NamespaceRule>, annotation_rules: Vec<AnnotationRule>) -> Self {
        Self {
            namespace_rules,
            annotation_rules,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings.namespace_rules.clone(),
            settings.annotation_rules.clone(),
        )
    }

    /// Rewrite smali source text
    pub fn rewrite_text(&self, text: &str, strip_debug: bool) -> String {
        let mut out = text.to_string();
        for rule in &self.namespace_rules {
            out = rule.apply(&out);
        }
        for rule in &self.annotation_rules {
            out = rule.apply(&out);
        }
        if strip_debug {
            out = strip_debug_directives(&out);
        }
        out
    }

    /// Rewrite a file in place
    pub fn rewrite_file(&self, file: &Path, strip_debug: bool) -> Result<()> {
        let text = std::fs::read_to_string(file).map_err(|e| Error::io_at(file, e))?;
        let rewritten = self.rewrite_text(&text, strip_debug);
        if rewritten != text {
            std::fs::write(file, rewritten).map_err(|e| Error::io_at(file, e))?;
        }
        Ok(())
    }

    /// Rewrite every `.smali` file under `root`, returning how many were visited
    pub fn rewrite_tree(&self, root: &Path, strip_debug: bool) -> Result<usize> {
        let files: Vec<_> = walk_files(root)
            .collect_files()?
            .into_iter()
            .filter(|f| f.extension().is_some_and(|ext| ext == "smali"))
            .collect();

        files
            .par_iter()
            .try_for_each(|file| self.rewrite_file(file, strip_debug))?;

        debug!("Rewrote {} smali files under {}", files.len(), root.display());
        Ok(files.len())
    }
}

/// Drop debug-only directive lines and collapse blank runs
///
/// A `.param` line that opens an annotated parameter block is kept, since
/// removing it would orphan the block's `.end param`.
pub fn strip_debug_directives(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let mut kept = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed == "nop" {
            continue;
        }
        if trimmed.starts_with(".param ") && opens_param_block(&lines[i + 1..]) {
            kept.push(*line);
            continue;
        }
        if DEBUG_DIRECTIVES.iter().any(|d| trimmed.starts_with(d)) {
            continue;
        }
        kept.push(*line);
    }

    let mut joined = kept.join("\n");
    if text.ends_with('\n') {
        joined.push('\n');
    }
    BLANK_RUNS.replace_all(&joined, "\n\n").into_owned()
}

fn opens_param_block(following: &[&str]) -> bool {
    following
        .iter()
        .map(|l| l.trim())
        .find(|l| !l.is_empty())
        .is_some_and(|l| l.starts_with(".annotation "))
}
