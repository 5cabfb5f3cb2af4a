// src/settings.rs

//! Fixed protocol values: tool versions, tracked subpaths and rewrite rules
//!
//! A [`Settings`] value is built once at startup and handed to every
//! component that needs it. Nothing in the crate reads these values from
//! global state.

use crate::smali::{AnnotationRule, NamespaceRule};

/// Versions of the provisioned external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersions {
    /// Android platform-tools release (adb)
    pub platform_tools: String,
    /// Android build-tools release (aapt, apksigner, zipalign)
    pub build_tools: String,
    /// Directory name inside the build-tools archive
    pub build_tools_codename: String,
    /// apktool jar version
    pub apktool: String,
    /// smali assembler jar version
    pub smali: String,
}

impl Default for ToolVersions {
    fn default() -> Self {
        Self {
            platform_tools: "r34.0.5".to_string(),
            build_tools: "r34-rc4".to_string(),
            build_tools_codename: "android-14".to_string(),
            apktool: "2.10.0".to_string(),
            smali: "2.5.2".to_string(),
        }
    }
}

/// Unmodified package that patches are computed against
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePackage {
    /// Stem used for the downloaded file and its decompiled tree
    pub name: String,
    /// Download location
    pub url: String,
    /// Expected SHA-384 of the download, lowercase hex
    pub sha384: String,
}

impl Default for ReferencePackage {
    fn default() -> Self {
        Self {
            name: "discord-stock-126021".to_string(),
            url: "https://pool.apk.aptoide.com/floricraft/com-discord-126021-62830695-9be8c22e12da4fdcfeb09242a4b3a648.apk".to_string(),
            sha384: "5c3ae81ea5bb9379ee5f0b484960d887518e7e87223a195a34f61fda6c170c794e8acdda10fd890755ca1474edab0d3d".to_string(),
        }
    }
}

/// Immutable settings shared by the patch engine, rewriter and pipeline
#[derive(Debug, Clone)]
pub struct Settings {
    pub tools: ToolVersions,

    /// Numbered bytecode unit that receives the mod code (`smali_classes<N>`)
    pub mods_unit: u32,

    /// File names that are never overlaid from a patch directory
    pub ignored_patch_files: Vec<String>,

    /// Name of the deletion manifest inside the patch directory
    pub deletion_manifest_name: String,

    /// File that must be byte-identical in both trees before diffing
    pub anchor_file: String,

    /// Subpaths that take part in differencing, in order
    pub tracked_subpaths: Vec<String>,

    /// Namespace rewrite rules, applied in order
    pub namespace_rules: Vec<NamespaceRule>,

    /// Annotation blocks removed from rewritten smali
    pub annotation_rules: Vec<AnnotationRule>,

    /// Baseline package used by `--patch`
    pub reference: ReferencePackage,

    /// Entry count at which a reference tree counts as already decompiled
    pub min_decompiled_entries: usize,

    /// Maximum heap for jar-based tools, in megabytes
    pub java_max_memory_mb: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tools: ToolVersions::default(),
            mods_unit: 4,
            ignored_patch_files: vec![
                "FilesToDelete.txt".to_string(),
                "network_security_config.xml".to_string(),
            ],
            deletion_manifest_name: "FilesToDelete.txt".to_string(),
            anchor_file: "smali/c.smali".to_string(),
            tracked_subpaths: [
                "assets",
                "lib",
                "res",
                "smali",
                "smali_classes2",
                "smali_classes3",
                // single file next to directories sharing its prefix
                "smali_classes4/$r8$backportedMethods$utility$Long$1$hashCode.smali",
                "smali_classes4/b",
                "smali_classes4/z",
                "AndroidManifest.xml",
                "apktool.yml",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            namespace_rules: NamespaceRule::defaults(),
            annotation_rules: AnnotationRule::defaults(),
            reference: ReferencePackage::default(),
            min_decompiled_entries: 12,
            java_max_memory_mb: 2048,
        }
    }
}

impl Settings {
    /// Directory name of a numbered bytecode unit (1 is plain `smali`)
    pub fn unit_dir_name(unit: u32) -> String {
        if unit <= 1 {
            "smali".to_string()
        } else {
            format!("smali_classes{}", unit)
        }
    }

    /// Archive entry name of a numbered bytecode unit (1 is plain `classes.dex`)
    pub fn unit_dex_name(unit: u32) -> String {
        if unit <= 1 {
            "classes.dex".to_string()
        } else {
            format!("classes{}.dex", unit)
        }
    }

    /// Whether a patch file name is reserved for the pipeline
    pub fn is_ignored_patch_file(&self, file_name: &str) -> bool {
        self.ignored_patch_files.iter().any(|n| n == file_name)
    }

    /// Override the reference package location
    pub fn with_reference(mut self, url: impl Into<String>, sha384: impl Into<String>) -> Self {
        self.reference.url = url.into();
        self.reference.sha384 = sha384.into().to_lowercase();
        self
    }
}
