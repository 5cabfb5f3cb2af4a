// src/tools/toolbox.rs

//! The external operations the pipeline depends on
//!
//! [`BuildTools`] is the seam between the pipeline and the outside world.
//! [`Toolbox`] implements it with the provisioned Android tools, spawning
//! them through a [`CommandRunner`].

use super::command::{CommandRunner, ExecutionResult, ProcessRunner, ToolCommand};
use super::download::Downloader;
use super::executable::{Executable, JavaLauncher};
use crate::config::{PipelineConfig, Signer, SigningInfo};
use crate::error::{Error, Result};
use crate::platform::HostPlatform;
use crate::settings::Settings;
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static PACKAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"package: name='([^']*)'").expect("package pattern is valid"));
static LAUNCHABLE_ACTIVITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"launchable-activity: name='([^']*)'").expect("activity pattern is valid")
});

/// Minimum SDK that receives the rotated signer
const ROTATION_MIN_SDK: &str = "28";

/// Identity of an installed package, enough to launch it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub package_name: String,
    pub launchable_activity: String,
}

/// Parse `aapt dump badging` output
pub fn parse_badging(output: &str) -> Option<PackageInfo> {
    let package_name = PACKAGE_NAME.captures(output)?.get(1)?.as_str().to_string();
    let launchable_activity = LAUNCHABLE_ACTIVITY
        .captures(output)?
        .get(1)?
        .as_str()
        .to_string();
    Some(PackageInfo {
        package_name,
        launchable_activity,
    })
}

/// A tool that still has to be downloaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTool {
    pub name: String,
    pub url: String,
}

/// External operations used by the build pipeline
pub trait BuildTools {
    /// Tools that are not installed yet
    fn missing_tools(&self) -> Vec<MissingTool>;

    /// Download and unpack every missing tool
    fn install_missing(&self) -> Result<()>;

    /// Download `url` to `dest`, verifying the SHA-384 when given
    fn fetch(&self, url: &str, dest: &Path, sha384: Option<&str>) -> Result<()>;

    fn gradle_build(&self) -> ExecutionResult;

    fn decompile(&self, apk: &Path, out_dir: &Path, keep_debug_info: bool) -> ExecutionResult;

    fn recompile(&self, tree: &Path, apk_out: &Path) -> ExecutionResult;

    /// Assemble one smali unit directory into a dex file
    fn assemble_unit(&self, unit_dir: &Path, dex_out: &Path) -> ExecutionResult;

    fn align(&self, apk_in: &Path, apk_out: &Path) -> ExecutionResult;

    /// Sign in place
    fn sign(&self, signing: &SigningInfo, apk: &Path) -> ExecutionResult;

    fn install(&self, apk: &Path) -> ExecutionResult;

    fn package_info(&self, apk: &Path) -> Option<PackageInfo>;

    fn launch(&self, info: &PackageInfo) -> ExecutionResult;
}

/// Provisioned Android tools
pub struct Toolbox<R: CommandRunner = ProcessRunner> {
    runner: R,
    platform: Box<dyn HostPlatform>,
    java: JavaLauncher,
    downloader: Downloader,
    gradle: Executable,
    adb: Executable,
    aapt: Executable,
    apksigner: Executable,
    zipalign: Executable,
    smali: Executable,
    apktool: Executable,
}

impl Toolbox<ProcessRunner> {
    pub fn new(
        config: &PipelineConfig,
        settings: &Settings,
        platform: Box<dyn HostPlatform>,
    ) -> Result<Self> {
        Self::with_runner(config, settings, platform, ProcessRunner)
    }
}

impl<R: CommandRunner> Toolbox<R> {
    /// Lay out the tools under `<base_dir>/<os>` and run them with `runner`
    pub fn with_runner(
        config: &PipelineConfig,
        settings: &Settings,
        platform: Box<dyn HostPlatform>,
        runner: R,
    ) -> Result<Self> {
        let os = platform.os_name();
        let tools_dir = config.tools_dir(os);
        std::fs::create_dir_all(&tools_dir)
            .map_err(|e| Error::io_at(&tools_dir, e))?;
        let versions = &settings.tools;

        let platform_archive = format!("platform-tools_{}-{}.zip", versions.platform_tools, os);
        let platform_dir = tools_dir.join("platform-tools");
        let adb = Executable::zipped(
            "adb",
            tools_dir.join(&platform_archive),
            platform_dir.clone(),
            platform.adb_path(&platform_dir),
            format!("https://dl.google.com/android/repository/{}", platform_archive),
        );

        let build_archive = format!("build-tools_{}-{}.zip", versions.build_tools, os);
        let build_dir = tools_dir.join(format!("build-tools-{}", versions.build_tools));
        let build_tool = |name: &str| {
            let file = platform.build_tool_file(name);
            Executable::zipped(
                file.clone(),
                tools_dir.join(&build_archive),
                build_dir.clone(),
                build_dir.join(&versions.build_tools_codename).join(file),
                format!("https://dl.google.com/android/repository/{}", build_archive),
            )
        };
        let aapt = build_tool("aapt");
        let apksigner = build_tool("apksigner");
        let zipalign = build_tool("zipalign");

        let smali_jar = format!("smali-{}.jar", versions.smali);
        let smali = Executable::jar(
            smali_jar.clone(),
            tools_dir.join(&smali_jar),
            format!("https://bitbucket.org/JesusFreke/smali/downloads/{}", smali_jar),
        );

        let apktool_jar = format!("apktool_{}.jar", versions.apktool);
        let apktool = Executable::jar(
            apktool_jar.clone(),
            tools_dir.join(&apktool_jar),
            format!("https://bitbucket.org/iBotPeaches/apktool/downloads/{}", apktool_jar),
        );

        let gradle = Executable::gradle(config.project_home.clone(), config.java_home.clone());
        let java = JavaLauncher::resolve(
            config.java_home.as_deref(),
            platform.as_ref(),
            settings.java_max_memory_mb,
        );
        debug!("Using java at {}", java.java.display());

        Ok(Self {
            runner,
            platform,
            java,
            downloader: Downloader::new()?,
            gradle,
            adb,
            aapt,
            apksigner,
            zipalign,
            smali,
            apktool,
        })
    }

    fn executables(&self) -> [&Executable; 7] {
        [
            &self.gradle,
            &self.adb,
            &self.aapt,
            &self.apksigner,
            &self.zipalign,
            &self.smali,
            &self.apktool,
        ]
    }

    fn command(&self, tool: &Executable) -> ToolCommand {
        tool.command(self.platform.as_ref(), &self.java)
    }

    fn run(&self, command: ToolCommand) -> ExecutionResult {
        let command = self.platform.prepare(command);
        self.runner.run(&command)
    }

    fn signer_args(command: ToolCommand, signer: &Signer) -> ToolCommand {
        match signer {
            Signer::Key { key, cert } => command.option_path("--key", key).option_path("--cert", cert),
            // no quotes around the password: they would become part of it
            Signer::Password { keystore, password } => command
                .option_path("--ks", keystore)
                .option("--ks-pass", format!("pass:{}", password.expose())),
        }
    }
}

impl<R: CommandRunner> BuildTools for Toolbox<R> {
    fn missing_tools(&self) -> Vec<MissingTool> {
        self.executables()
            .into_iter()
            .filter(|tool| !tool.is_installed())
            .filter_map(|tool| {
                tool.url().map(|url| MissingTool {
                    name: tool.name().to_string(),
                    url: url.to_string(),
                })
            })
            .collect()
    }

    fn install_missing(&self) -> Result<()> {
        // build-tools executables share one archive; is_installed is
        // rechecked so it is only fetched once
        for tool in self.executables() {
            tool.install(&self.downloader)?;
        }
        Ok(())
    }

    fn fetch(&self, url: &str, dest: &Path, sha384: Option<&str>) -> Result<()> {
        self.downloader.download(url, dest, sha384)
    }

    fn gradle_build(&self) -> ExecutionResult {
        info!("Executing gradle build, this can take a while...");
        self.run(self.command(&self.gradle))
    }

    fn decompile(&self, apk: &Path, out_dir: &Path, keep_debug_info: bool) -> ExecutionResult {
        let mut command = self.command(&self.apktool).arg("d");
        if !keep_debug_info {
            command = command.arg("--no-debug-info");
        }
        self.run(command.arg("--force").option_path("-o", out_dir).path(apk))
    }

    fn recompile(&self, tree: &Path, apk_out: &Path) -> ExecutionResult {
        info!("Compiling APK... (this could take a while)");
        self.run(
            self.command(&self.apktool)
                .arg("b")
                .arg("--use-aapt2")
                .arg("-nc")
                .option_path("-o", apk_out)
                .path(tree),
        )
    }

    fn assemble_unit(&self, unit_dir: &Path, dex_out: &Path) -> ExecutionResult {
        self.run(
            self.command(&self.smali)
                .arg("a")
                .path(unit_dir)
                .option_path("-o", dex_out),
        )
    }

    fn align(&self, apk_in: &Path, apk_out: &Path) -> ExecutionResult {
        self.run(
            self.command(&self.zipalign)
                .args(["-f", "-p", "4"])
                .path(apk_in)
                .path(apk_out),
        )
    }

    fn sign(&self, signing: &SigningInfo, apk: &Path) -> ExecutionResult {
        let mut command = self.command(&self.apksigner).arg("sign");
        match signing {
            SigningInfo::Key { key, cert } => {
                command = command.option_path("--key", key).option_path("--cert", cert);
            }
            SigningInfo::Password { keystore, password } => {
                command = command
                    .option_path("--ks", keystore)
                    .option("--ks-pass", format!("pass:{}", password.expose()));
            }
            SigningInfo::Rotate { lineage, signers } => {
                command = command.option("--rotation-min-sdk-version", ROTATION_MIN_SDK);
                for (i, signer) in signers.iter().enumerate() {
                    if i > 0 {
                        command = command.arg("--next-signer");
                    }
                    command = Self::signer_args(command, signer);
                }
                command = command.option_path("--lineage", lineage);
            }
        }
        self.run(command.option_path("--out", apk).path(apk))
    }

    fn install(&self, apk: &Path) -> ExecutionResult {
        self.run(self.command(&self.adb).arg("install").arg("-r").path(apk))
    }

    fn package_info(&self, apk: &Path) -> Option<PackageInfo> {
        let result = self.run(self.command(&self.aapt).arg("dump").arg("badging").path(apk));
        if !result.success {
            debug!("aapt failed: {}", result.output);
            return None;
        }
        parse_badging(&result.output)
    }

    fn launch(&self, info: &PackageInfo) -> ExecutionResult {
        // kill first so the app boots fresh
        let stop = self.run(
            self.command(&self.adb)
                .args(["shell", "am", "force-stop"])
                .arg(info.package_name.as_str()),
        );
        if !stop.success {
            debug!("force-stop failed: {}", stop.output);
        }

        let component = format!("{}/{}", info.package_name, info.launchable_activity);
        self.run(
            self.command(&self.adb)
                .args(["shell", "am", "start"])
                .option("-n", component.replace('$', "\\$")),
        )
    }
}
