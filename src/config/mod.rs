// src/config/mod.rs

//! Pipeline configuration
//!
//! A run is configured by a TOML file plus command-line flags. Both are
//! resolved once into an immutable [`PipelineConfig`] that every stage reads.
//!
//! ```toml
//! [paths]
//! base_dir = "/work/apkpatch"
//! base_decompiled_apk = "/work/stock-decompiled"
//!
//! [gradle]
//! project_home = "/work/mod-project"
//! java_home = "/usr/lib/jvm/java-17"
//!
//! [signing]
//! type = "key"
//! key = "/keys/release.pk8"
//! cert = "/keys/release.pem"
//! ```

pub mod signing;

pub use signing::{Password, Signer, SignerSection, SigningInfo, SigningSection};

use crate::error::{Error, Result};
use crate::settings::{ReferencePackage, Settings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default config file name, looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// `[paths]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsSection {
    /// Working directory for tools, build outputs and the reference package
    pub base_dir: PathBuf,
    /// Decompiled stock package that patches and mod code are merged into
    pub base_decompiled_apk: PathBuf,
}

/// `[gradle]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradleSection {
    /// Root of the mod's gradle project
    pub project_home: PathBuf,
    /// JDK used for the gradle build
    #[serde(default)]
    pub java_home: Option<PathBuf>,
}

/// `[reference]`, overriding the stock package used by `--patch`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSection {
    pub url: String,
    pub sha384: String,
}

/// Config file contents before validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    pub paths: PathsSection,
    pub gradle: GradleSection,
    pub signing: SigningSection,
    #[serde(default)]
    pub reference: Option<ReferenceSection>,
}

impl ConfigFile {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        Self::parse(&text).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }
}

/// Mode flags from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunFlags {
    /// Replace only the mod bytecode unit in the last compiled package
    pub quick: bool,
    /// Keep debug directives in decompiled and rewritten smali
    pub keep_debug_info: bool,
    pub verbose: bool,
    /// Regenerate the patch set from the decompiled stock package
    pub create_patches: bool,
    /// Answer download prompts with yes
    pub assume_yes: bool,
}

impl RunFlags {
    /// Reject flag combinations that cannot run
    pub fn validate(&self) -> Result<()> {
        if self.quick && self.create_patches {
            return Err(Error::Precondition(
                "--patch and -q arguments cannot be used at the same time".to_string(),
            ));
        }
        Ok(())
    }

    /// Debug directives are stripped unless asked to keep them
    pub fn strip_debug(&self) -> bool {
        !self.keep_debug_info
    }
}

/// Immutable configuration of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub flags: RunFlags,
    pub base_dir: PathBuf,
    pub base_decompiled_apk: PathBuf,
    pub signing: SigningInfo,
    pub project_home: PathBuf,
    pub java_home: Option<PathBuf>,
}

impl PipelineConfig {
    /// Validate a parsed config file
    ///
    /// Flag combinations are checked first. `base_dir` is created when
    /// missing. `settings` picks up a `[reference]` override.
    pub fn resolve(file: ConfigFile, flags: RunFlags, settings: &mut Settings) -> Result<Self> {
        flags.validate()?;

        let base_dir = file.paths.base_dir;
        if !base_dir.exists() {
            debug!("Creating base dir {}", base_dir.display());
            std::fs::create_dir_all(&base_dir).map_err(|e| {
                Error::Config(format!(
                    "base_dir in [paths]: {} does not exist and could not be created: {}",
                    base_dir.display(),
                    e
                ))
            })?;
        }
        if !base_dir.is_dir() {
            return Err(Error::Config(format!(
                "base_dir in [paths]: {} is a file, expected a directory",
                base_dir.display()
            )));
        }

        let base_decompiled_apk = file.paths.base_decompiled_apk;
        if base_decompiled_apk.exists() && !base_decompiled_apk.is_dir() {
            return Err(Error::Config(format!(
                "base_decompiled_apk in [paths]: {} is a file, expected a directory",
                base_decompiled_apk.display()
            )));
        }

        let project_home = existing_dir(file.gradle.project_home, "gradle", "project_home")?;
        let java_home = file
            .gradle
            .java_home
            .map(|home| existing_dir(home, "gradle", "java_home"))
            .transpose()?;

        let signing = file.signing.resolve()?;

        if let Some(reference) = file.reference {
            let name = settings.reference.name.clone();
            settings.reference = ReferencePackage {
                name,
                url: reference.url,
                sha384: reference.sha384.to_lowercase(),
            };
        }

        Ok(Self {
            flags,
            base_dir,
            base_decompiled_apk,
            signing,
            project_home,
            java_home,
        })
    }

    /// Load and validate a config file
    pub fn load(path: &Path, flags: RunFlags, settings: &mut Settings) -> Result<Self> {
        Self::resolve(ConfigFile::load(path)?, flags, settings)
    }

    /// Decompiled output of the gradle-built package
    pub fn decompiled_dir(&self) -> PathBuf {
        self.base_dir.join("decompiled")
    }

    /// Package produced by the gradle build
    pub fn gradle_built_apk(&self) -> PathBuf {
        self.project_home.join("app/build/outputs/apk/debug/app-debug.apk")
    }

    pub fn patch_dir(&self) -> PathBuf {
        self.project_home.join("patch")
    }

    pub fn deletion_manifest(&self, settings: &Settings) -> PathBuf {
        self.patch_dir().join(&settings.deletion_manifest_name)
    }

    /// Recompiled package, before alignment
    pub fn compiled_apk(&self) -> PathBuf {
        self.base_dir.join("compiled.apk")
    }

    /// Aligned and signed package installed on the device
    pub fn compiled_aligned_apk(&self) -> PathBuf {
        self.base_dir.join("compiled-aligned.apk")
    }

    /// Side file written by the signer next to the aligned package
    pub fn compiled_aligned_idsig(&self) -> PathBuf {
        self.base_dir.join("compiled-aligned.apk.idsig")
    }

    pub fn reference_apk(&self, reference: &ReferencePackage) -> PathBuf {
        self.base_dir.join(format!("{}.apk", reference.name))
    }

    pub fn reference_tree(&self, reference: &ReferencePackage) -> PathBuf {
        self.base_dir.join(&reference.name)
    }

    /// Install root of provisioned tools for a host (`linux`, `windows`)
    pub fn tools_dir(&self, host_dir: &str) -> PathBuf {
        self.base_dir.join(host_dir)
    }

    pub fn fingerprint_file(&self) -> PathBuf {
        self.base_dir.join("build-fingerprint.json")
    }

    /// Assembled mod unit written before injection into the compiled package
    pub fn assembled_unit(&self, settings: &Settings) -> PathBuf {
        self.base_dir.join(Settings::unit_dex_name(settings.mods_unit))
    }

    /// Mod unit directory inside the target tree
    pub fn target_unit_dir(&self, settings: &Settings) -> PathBuf {
        self.base_decompiled_apk
            .join(Settings::unit_dir_name(settings.mods_unit))
    }
}

fn existing_dir(path: PathBuf, section: &str, key: &str) -> Result<PathBuf> {
    if !path.exists() {
        return Err(Error::Config(format!(
            "{} in [{}]: {} does not exist",
            key,
            section,
            path.display()
        )));
    }
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "{} in [{}]: {} is a file, expected a directory",
            key,
            section,
            path.display()
        )));
    }
    Ok(path)
}
