// src/pipeline/patches.rs

//! Reference package handling and patch creation
//!
//! The reference package is the unmodified upstream release. Its decompiled
//! form seeds the target tree on first run and is the baseline that
//! `--patch` diffs the target tree against.

use super::Confirm;
use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::tools::BuildTools;
use crate::tree::{PatchSet, TreeDiffer};
use std::path::Path;
use tracing::{debug, info, warn};

/// Whether `tree` already holds a decompiled package
///
/// apktool output always has a handful of top-level entries; fewer than
/// `min_entries` means a missing or interrupted decompile.
pub fn is_decompiled(tree: &Path, min_entries: usize) -> bool {
    if !tree.is_dir() {
        return false;
    }
    match std::fs::read_dir(tree) {
        Ok(entries) => entries.take(min_entries).count() >= min_entries,
        Err(e) => {
            warn!("Failed to list {}: {}", tree.display(), e);
            false
        }
    }
}

/// The reference package and the trees decompiled from it
pub struct ReferenceTrees<'a, T: BuildTools + ?Sized> {
    tools: &'a T,
    confirm: &'a dyn Confirm,
    config: &'a PipelineConfig,
    settings: &'a Settings,
}

impl<'a, T: BuildTools + ?Sized> ReferenceTrees<'a, T> {
    pub fn new(
        tools: &'a T,
        confirm: &'a dyn Confirm,
        config: &'a PipelineConfig,
        settings: &'a Settings,
    ) -> Self {
        Self {
            tools,
            confirm,
            config,
            settings,
        }
    }

    /// Download the reference package unless it is already present
    pub fn ensure_reference_apk(&self) -> Result<()> {
        let reference = &self.settings.reference;
        let apk = self.config.reference_apk(reference);
        if apk.is_file() {
            debug!("Reference package present at {}", apk.display());
            return Ok(());
        }

        let prompt = format!(
            "The base {} APK needs to be downloaded for patching.\nWould you like to do so now? (y/n)",
            reference.name
        );
        if !self.confirm.confirm(&prompt) {
            warn!("APK file download declined, exiting process");
            return Err(Error::Declined("APK file download declined".to_string()));
        }

        info!("Downloading {} APK... (This could take a while)", reference.name);
        self.tools.fetch(&reference.url, &apk, Some(&reference.sha384))
    }

    /// Decompile the reference package into `tree` unless already done
    ///
    /// Debug info is always kept so both trees pass the anchor check.
    pub fn ensure_decompiled(&self, tree: &Path) -> Result<()> {
        if is_decompiled(tree, self.settings.min_decompiled_entries) {
            debug!("{} already decompiled, skipping decompilation", tree.display());
            return Ok(());
        }

        self.ensure_reference_apk()?;
        info!(
            "Decompiling stock {} APK into {}... (This could take a while)",
            self.settings.reference.name,
            tree.display()
        );
        let apk = self.config.reference_apk(&self.settings.reference);
        self.tools
            .decompile(&apk, tree, true)
            .check("Decompile reference")?;
        Ok(())
    }

    /// Seed the target tree from the reference package on first run
    pub fn setup_target(&self) -> Result<()> {
        self.ensure_decompiled(&self.config.base_decompiled_apk)
    }

    /// Diff the reference tree against the target tree into the patch directory
    ///
    /// A failed diff leaves no patch directory behind.
    pub fn create_patches(&self) -> Result<PatchSet> {
        let reference_tree = self.config.reference_tree(&self.settings.reference);
        self.ensure_decompiled(&reference_tree)?;

        let patch_dir = self.config.patch_dir();
        info!("Creating patch...");
        let patch_set = TreeDiffer::from_settings(self.settings).diff(
            &reference_tree,
            &self.config.base_decompiled_apk,
            &patch_dir,
        )?;

        info!(
            "Done creating patch ({}): {} files changed, {} files to delete",
            patch_dir.display(),
            patch_set.copied.len(),
            patch_set.deletions.len()
        );
        Ok(patch_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::AssumeYes;
    use crate::pipeline::fake::{Decline, FakeTools, test_config};
    use std::fs;

    #[test]
    fn test_is_decompiled_threshold() {
        let temp = tempfile::tempdir().unwrap();
        let tree = temp.path().join("tree");
        assert!(!is_decompiled(&tree, 2));

        fs::create_dir_all(tree.join("smali")).unwrap();
        assert!(!is_decompiled(&tree, 2));
        fs::write(tree.join("apktool.yml"), "v").unwrap();
        assert!(is_decompiled(&tree, 2));
    }

    #[test]
    fn test_setup_downloads_and_decompiles() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let settings = Settings::default();
        let tools = FakeTools::new();

        ReferenceTrees::new(&tools, &AssumeYes, &config, &settings)
            .setup_target()
            .unwrap();

        let calls = tools.calls();
        assert!(calls[0].starts_with("fetch"));
        assert!(calls[1].starts_with("decompile"));
        assert!(calls[1].ends_with("keep=true"));
        assert!(is_decompiled(&config.base_decompiled_apk, settings.min_decompiled_entries));
    }

    #[test]
    fn test_setup_skips_existing_tree() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let settings = Settings::default();
        let tools = FakeTools::new();
        FakeTools::write_tree(&config.base_decompiled_apk, &FakeTools::stock_tree());

        ReferenceTrees::new(&tools, &Decline, &config, &settings)
            .setup_target()
            .unwrap();
        assert!(tools.calls().is_empty());
    }

    #[test]
    fn test_declined_download() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let settings = Settings::default();
        let tools = FakeTools::new();

        let err = ReferenceTrees::new(&tools, &Decline, &config, &settings)
            .setup_target()
            .unwrap_err();
        assert!(matches!(err, Error::Declined(_)));
        assert_eq!(err.exit_code(), 0);
        assert!(tools.calls().is_empty());
    }

    #[test]
    fn test_create_patches_against_reference() {
        let temp = tempfile::tempdir().unwrap();
        let config = test_config(temp.path());
        let settings = Settings::default();
        let tools = FakeTools::new();

        let mut modded = FakeTools::stock_tree();
        modded.push(("res/values/strings.xml".to_string(), "<resources>mod</resources>".to_string()));
        modded.retain(|(path, _)| path != "assets/old.bin");
        FakeTools::write_tree(&config.base_decompiled_apk, &modded);

        let patch_set = ReferenceTrees::new(&tools, &AssumeYes, &config, &settings)
            .create_patches()
            .unwrap();

        assert_eq!(patch_set.copied, ["res/values/strings.xml"]);
        assert_eq!(patch_set.deletions.entries(), ["assets/old.bin"]);
        assert!(config.deletion_manifest(&settings).is_file());
    }
}
