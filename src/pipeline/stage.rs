// src/pipeline/stage.rs

//! Pipeline stages and run state

use crate::config::RunFlags;
use std::fmt;
use std::time::Duration;

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PipelineStage {
    /// Download missing tools and set up the target tree
    ProvisionTools,
    /// Diff the reference tree against the target tree into the patch directory
    CreatePatches,
    /// gradle build of the mod project
    ExternalBuild,
    /// Decompile the gradle-built package
    Decompile,
    /// Rewrite and port mod and shared-runtime smali into the target tree
    RewriteSymbols,
    /// Quick mode: assemble the mod unit and swap it into the last package
    InjectPrebuiltUnit,
    /// Overlay the patch directory onto the target tree
    InjectPatches,
    /// Recompile the target tree into a package
    ExternalRecompile,
    Align,
    Sign,
    Install,
    /// Start the installed app when its entry point can be resolved
    LaunchIfResolvable,
    Cleanup,
}

impl PipelineStage {
    /// Every stage in order
    pub fn all() -> &'static [PipelineStage] {
        &[
            Self::ProvisionTools,
            Self::CreatePatches,
            Self::ExternalBuild,
            Self::Decompile,
            Self::RewriteSymbols,
            Self::InjectPrebuiltUnit,
            Self::InjectPatches,
            Self::ExternalRecompile,
            Self::Align,
            Self::Sign,
            Self::Install,
            Self::LaunchIfResolvable,
            Self::Cleanup,
        ]
    }

    /// Label used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProvisionTools => "Provision tools",
            Self::CreatePatches => "Create patches",
            Self::ExternalBuild => "Gradle build",
            Self::Decompile => "Decompile",
            Self::RewriteSymbols => "Smali port",
            Self::InjectPrebuiltUnit => "Smali (quick mode)",
            Self::InjectPatches => "Patch injection",
            Self::ExternalRecompile => "Compile",
            Self::Align => "Zipalign",
            Self::Sign => "Sign",
            Self::Install => "Install",
            Self::LaunchIfResolvable => "Launch",
            Self::Cleanup => "Cleanup",
        }
    }

    /// Stages whose failure is logged without ending the run
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::LaunchIfResolvable)
    }

    /// Stages to run for a set of flags
    ///
    /// Quick mode swaps the patch overlay and recompilation for the prebuilt
    /// unit injection; patch creation is inserted after provisioning.
    pub fn plan(flags: &RunFlags) -> Vec<PipelineStage> {
        Self::all()
            .iter()
            .copied()
            .filter(|stage| match stage {
                Self::CreatePatches => flags.create_patches,
                Self::InjectPrebuiltUnit => flags.quick,
                Self::InjectPatches | Self::ExternalRecompile => !flags.quick,
                _ => true,
            })
            .collect()
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Where a run currently is
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
    /// Nothing has run yet
    Pending,
    Running(PipelineStage),
    Completed,
    /// Terminal failure; no later stage ran
    Failed { stage: PipelineStage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed { .. })
    }
}

/// One executed stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: PipelineStage,
    pub elapsed: Duration,
}

/// Stages of a successful run, in order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub stages: Vec<StageReport>,
}

impl RunSummary {
    pub fn total(&self) -> Duration {
        self.stages.iter().map(|s| s.elapsed).sum()
    }

    /// Executed stages without timings
    pub fn executed(&self) -> Vec<PipelineStage> {
        self.stages.iter().map(|s| s.stage).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_plan() {
        let plan = PipelineStage::plan(&RunFlags::default());
        assert_eq!(plan.first(), Some(&PipelineStage::ProvisionTools));
        assert!(plan.contains(&PipelineStage::InjectPatches));
        assert!(plan.contains(&PipelineStage::ExternalRecompile));
        assert!(!plan.contains(&PipelineStage::CreatePatches));
        assert!(!plan.contains(&PipelineStage::InjectPrebuiltUnit));
        assert_eq!(plan.len(), 11);
    }

    #[test]
    fn test_quick_plan() {
        let flags = RunFlags {
            quick: true,
            ..Default::default()
        };
        let plan = PipelineStage::plan(&flags);
        assert!(plan.contains(&PipelineStage::InjectPrebuiltUnit));
        assert!(!plan.contains(&PipelineStage::InjectPatches));
        assert!(!plan.contains(&PipelineStage::ExternalRecompile));
        let rewrite = plan.iter().position(|s| *s == PipelineStage::RewriteSymbols);
        let inject = plan.iter().position(|s| *s == PipelineStage::InjectPrebuiltUnit);
        assert!(rewrite < inject);
    }

    #[test]
    fn test_patch_plan_creates_patches_after_provisioning() {
        let flags = RunFlags {
            create_patches: true,
            ..Default::default()
        };
        let plan = PipelineStage::plan(&flags);
        assert_eq!(&plan[..3], &[
            PipelineStage::ProvisionTools,
            PipelineStage::CreatePatches,
            PipelineStage::ExternalBuild,
        ]);
    }

    #[test]
    fn test_summary_total() {
        let summary = RunSummary {
            stages: vec![
                StageReport {
                    stage: PipelineStage::Align,
                    elapsed: Duration::from_millis(300),
                },
                StageReport {
                    stage: PipelineStage::Sign,
                    elapsed: Duration::from_millis(700),
                },
            ],
        };
        assert_eq!(summary.total(), Duration::from_secs(1));
        assert_eq!(summary.executed(), [PipelineStage::Align, PipelineStage::Sign]);
    }
}
