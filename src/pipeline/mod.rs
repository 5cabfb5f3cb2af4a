// src/pipeline/mod.rs

//! Build pipeline orchestrator
//!
//! A run is a fixed sequence of [`PipelineStage`]s chosen from the run flags.
//! Stages execute strictly in order; the first failing stage ends the run and
//! leaves the pipeline in [`PipelineState::Failed`]. Only launching the app at
//! the end is best-effort.
//!
//! Full build:
//!
//! ```text
//! ProvisionTools -> [CreatePatches] -> ExternalBuild -> Decompile -> RewriteSymbols
//!   -> InjectPatches -> ExternalRecompile -> Align -> Sign -> Install
//!   -> LaunchIfResolvable -> Cleanup
//! ```
//!
//! Quick mode replaces `InjectPatches -> ExternalRecompile` with
//! `InjectPrebuiltUnit`, which reuses the package of the last full build.

#[cfg(test)]
pub(crate) mod fake;
pub mod patches;
pub mod quick;
pub mod stage;

pub use patches::{ReferenceTrees, is_decompiled};
pub use quick::{replace_archive_entry, verify_fingerprint};
pub use stage::{PipelineStage, PipelineState, RunSummary, StageReport};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::smali::{SmaliRewriter, port_units};
use crate::tools::{BuildTools, format_duration};
use crate::tree::{BuildFingerprint, PatchApplier};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Yes/no questions asked before downloads
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Answers every prompt with yes (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, prompt: &str) -> bool {
        debug!("Assuming yes: {}", prompt);
        true
    }
}

/// One pipeline run over a fixed configuration
pub struct Pipeline<'a, T: BuildTools> {
    config: &'a PipelineConfig,
    settings: &'a Settings,
    tools: &'a T,
    confirm: &'a dyn Confirm,
    state: PipelineState,
    /// Recorded after patch injection, saved once recompilation succeeds
    pending_fingerprint: Option<BuildFingerprint>,
}

impl<'a, T: BuildTools> Pipeline<'a, T> {
    pub fn new(
        config: &'a PipelineConfig,
        settings: &'a Settings,
        tools: &'a T,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            config,
            settings,
            tools,
            confirm,
            state: PipelineState::Pending,
            pending_fingerprint: None,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Stages this run will execute
    pub fn plan(&self) -> Vec<PipelineStage> {
        PipelineStage::plan(&self.config.flags)
    }

    /// Preconditions checked before any side effect
    pub fn validate(&self) -> Result<()> {
        let flags = &self.config.flags;
        flags.validate()?;

        if flags.quick {
            if !self.config.compiled_apk().is_file() {
                return Err(Error::Precondition(
                    "Quick mode cannot run, the previously built APK does not exist.".to_string(),
                ));
            }
            if !self.config.fingerprint_file().is_file() {
                return Err(Error::Precondition(
                    "Quick mode cannot run, the last full build left no fingerprint. Run a full build first."
                        .to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Execute every planned stage, stopping at the first failure
    pub fn run(&mut self) -> Result<RunSummary> {
        self.validate()?;

        let mut summary = RunSummary::default();
        for stage in self.plan() {
            self.state = PipelineState::Running(stage);
            debug!("Entering stage {}", stage);
            let start = Instant::now();

            match self.run_stage(stage) {
                Ok(()) => {}
                Err(e) if stage.is_best_effort() => {
                    warn!("{} failed, continuing: {}", stage, e);
                }
                Err(e) => {
                    error!("{} failed", stage);
                    self.state = PipelineState::Failed {
                        stage,
                        reason: e.to_string(),
                    };
                    return Err(e);
                }
            }

            let elapsed = start.elapsed();
            info!("{} done in {}", stage, format_duration(elapsed));
            summary.stages.push(StageReport { stage, elapsed });
        }

        self.state = PipelineState::Completed;
        Ok(summary)
    }

    fn run_stage(&mut self, stage: PipelineStage) -> Result<()> {
        match stage {
            PipelineStage::ProvisionTools => self.provision_tools(),
            PipelineStage::CreatePatches => self.reference_trees().create_patches().map(|_| ()),
            PipelineStage::ExternalBuild => {
                info!("Executing gradle build, this can take a while...");
                self.tools.gradle_build().check(stage.name())?;
                Ok(())
            }
            PipelineStage::Decompile => {
                self.tools
                    .decompile(
                        &self.config.gradle_built_apk(),
                        &self.config.decompiled_dir(),
                        self.config.flags.keep_debug_info,
                    )
                    .check(stage.name())?;
                Ok(())
            }
            PipelineStage::RewriteSymbols => self.rewrite_symbols(),
            PipelineStage::InjectPrebuiltUnit => self.inject_prebuilt_unit(),
            PipelineStage::InjectPatches => self.inject_patches(),
            PipelineStage::ExternalRecompile => self.recompile(),
            PipelineStage::Align => {
                self.tools
                    .align(&self.config.compiled_apk(), &self.config.compiled_aligned_apk())
                    .check(stage.name())?;
                Ok(())
            }
            PipelineStage::Sign => {
                self.tools
                    .sign(&self.config.signing, &self.config.compiled_aligned_apk())
                    .check(stage.name())?;
                Ok(())
            }
            PipelineStage::Install => {
                self.tools
                    .install(&self.config.compiled_aligned_apk())
                    .check(stage.name())?;
                Ok(())
            }
            PipelineStage::LaunchIfResolvable => {
                self.launch();
                Ok(())
            }
            PipelineStage::Cleanup => {
                self.cleanup();
                Ok(())
            }
        }
    }

    fn reference_trees(&self) -> ReferenceTrees<'_, T> {
        ReferenceTrees::new(self.tools, self.confirm, self.config, self.settings)
    }

    fn provision_tools(&self) -> Result<()> {
        let missing = self.tools.missing_tools();
        if !missing.is_empty() {
            let mut prompt = String::from("The following executables need to be downloaded:\n");
            for tool in &missing {
                prompt.push_str(&format!("- {} : {}\n", tool.name, tool.url));
            }
            prompt.push_str("Would you like to do so now? (y/n)");

            if !self.confirm.confirm(&prompt) {
                warn!("Install declined, exiting");
                return Err(Error::Declined("Install declined".to_string()));
            }
            self.tools.install_missing()?;
        }

        self.reference_trees().setup_target()
    }

    fn rewrite_symbols(&self) -> Result<()> {
        let rewriter = SmaliRewriter::from_settings(self.settings);
        let report = port_units(
            &rewriter,
            &self.config.decompiled_dir(),
            &self.config.target_unit_dir(self.settings),
            self.config.flags.strip_debug(),
        )?;
        info!(
            "Ported {} mod files, {} kotlin files and {} protobuf files from {} units",
            report.mods, report.kotlin, report.protobuf, report.units
        );
        Ok(())
    }

    fn inject_patches(&mut self) -> Result<()> {
        let target = &self.config.base_decompiled_apk;
        let report = PatchApplier::from_settings(self.settings).apply(
            &self.config.patch_dir(),
            &self.config.deletion_manifest(self.settings),
            target,
        )?;
        debug!(
            "Patch injection: {} copied, {} deleted, {} skipped",
            report.copied, report.deleted, report.skipped
        );

        let unit = self.settings.mods_unit;
        self.pending_fingerprint = Some(BuildFingerprint::compute(
            target,
            &self.config.patch_dir(),
            unit,
            &Settings::unit_dir_name(unit),
        )?);
        Ok(())
    }

    fn recompile(&mut self) -> Result<()> {
        // the old fingerprint would vouch for a package about to be replaced
        let fingerprint_file = self.config.fingerprint_file();
        if fingerprint_file.exists() {
            std::fs::remove_file(&fingerprint_file)
                .map_err(|e| Error::io_at(&fingerprint_file, e))?;
        }

        info!("Compiling APK... (this could take a while)");
        self.tools
            .recompile(&self.config.base_decompiled_apk, &self.config.compiled_apk())
            .check(PipelineStage::ExternalRecompile.name())?;

        if let Some(fingerprint) = self.pending_fingerprint.take() {
            fingerprint.save(&fingerprint_file)?;
            debug!("Saved build fingerprint to {}", fingerprint_file.display());
        }
        Ok(())
    }

    fn inject_prebuilt_unit(&self) -> Result<()> {
        let unit = self.settings.mods_unit;
        let unit_dir = self.config.target_unit_dir(self.settings);
        verify_fingerprint(
            &self.config.fingerprint_file(),
            &self.config.base_decompiled_apk,
            &self.config.patch_dir(),
            unit,
            &Settings::unit_dir_name(unit),
        )?;

        let dex = self.config.assembled_unit(self.settings);
        self.tools
            .assemble_unit(&unit_dir, &dex)
            .check(PipelineStage::InjectPrebuiltUnit.name())?;
        replace_archive_entry(&self.config.compiled_apk(), &Settings::unit_dex_name(unit), &dex)?;

        if let Err(e) = std::fs::remove_file(&dex) {
            warn!("Failed to remove {}: {}", dex.display(), e);
        }
        Ok(())
    }

    fn launch(&self) {
        let apk = self.config.compiled_aligned_apk();
        let Some(info) = self.tools.package_info(&apk) else {
            warn!("Could not extract package info / find entry point to auto launch app");
            return;
        };

        info!("Launching: {}/{}", info.package_name, info.launchable_activity);
        let result = self.tools.launch(&info);
        if !result.success {
            warn!("Launch failed: {}", result.output);
        }
    }

    /// `compiled.apk` stays: quick mode rebuilds from it
    fn cleanup(&self) {
        let idsig = self.config.compiled_aligned_idsig();
        if idsig.exists()
            && let Err(e) = std::fs::remove_file(&idsig)
        {
            warn!("Failed to remove {}: {}", idsig.display(), e);
        }
    }
}
