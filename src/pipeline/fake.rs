// src/pipeline/fake.rs

//! In-process stand-in for the external tools

use super::Confirm;
use crate::config::{PipelineConfig, RunFlags, SigningInfo};
use crate::error::Result;
use crate::tools::{BuildTools, ExecutionResult, MissingTool, PackageInfo};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use zip::write::SimpleFileOptions;

/// Answers every prompt with no
pub struct Decline;

impl Confirm for Decline {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

pub fn test_config(root: &Path) -> PipelineConfig {
    let base_dir = root.join("base");
    let project_home = root.join("project");
    fs::create_dir_all(&base_dir).unwrap();
    fs::create_dir_all(&project_home).unwrap();
    PipelineConfig {
        flags: RunFlags::default(),
        base_dir,
        base_decompiled_apk: root.join("stock"),
        signing: SigningInfo::Key {
            key: root.join("key.pk8"),
            cert: root.join("cert.pem"),
        },
        project_home,
        java_home: None,
    }
}

/// Records calls and fakes their file system effects
#[derive(Default)]
pub struct FakeTools {
    calls: Mutex<Vec<String>>,
    missing: Vec<MissingTool>,
    fail_on: Option<&'static str>,
    package: Option<PackageInfo>,
}

impl FakeTools {
    pub fn new() -> Self {
        Self {
            package: Some(PackageInfo {
                package_name: "com.discord".to_string(),
                launchable_activity: "com.discord.main.MainActivity".to_string(),
            }),
            ..Default::default()
        }
    }

    /// Fail every call whose log line starts with `op`
    pub fn failing(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn with_missing(mut self, missing: Vec<MissingTool>) -> Self {
        self.missing = missing;
        self
    }

    pub fn without_package(mut self) -> Self {
        self.package = None;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Decompiled reference package
    pub fn stock_tree() -> Vec<(String, String)> {
        [
            ("AndroidManifest.xml", "<manifest package=\"com.discord\"/>"),
            ("apktool.yml", "version: 2.10.0"),
            ("assets/old.bin", "old asset"),
            ("lib/arm64-v8a/libapp.so", "elf"),
            ("original/AndroidManifest.xml", "binary"),
            ("res/values/colors.xml", "<resources/>"),
            ("smali/c.smali", ".class public Lc;\n.super Ljava/lang/Object;\n"),
            ("smali_classes2/a/A.smali", ".class public La/A;\n"),
            ("smali_classes3/b/B.smali", ".class public Lb/B;\n"),
            ("smali_classes4/b/C.smali", ".class public Lb/C;\n"),
            ("smali_classes5/d/D.smali", ".class public Ld/D;\n"),
            ("unknown/stamp-cert-sha256", "stamp"),
        ]
        .iter()
        .map(|(p, c)| (p.to_string(), c.to_string()))
        .collect()
    }

    /// Decompiled gradle build of the mod project
    pub fn built_tree() -> Vec<(String, String)> {
        [
            (
                "smali/mods/Hook.smali",
                ".class public Lmods/Hook;\n.super Ljava/lang/Object;\n\n\
                 .method public static run()V\n    .registers 1\n    .line 12\n    \
                 invoke-static {}, Lkotlin/Unit;->get()V\n    return-void\n.end method\n",
            ),
            ("smali/kotlin/Unit.smali", ".class public final Lkotlin/Unit;\n"),
            (
                "smali_classes2/com/google/protobuf/Any.smali",
                ".class public final Lcom/google/protobuf/Any;\n",
            ),
        ]
        .iter()
        .map(|(p, c)| (p.to_string(), c.to_string()))
        .collect()
    }

    pub fn write_tree(root: &Path, files: &[(String, String)]) {
        for (relative, content) in files {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    fn record(&self, line: String) -> ExecutionResult {
        let success = self.fail_on.is_none_or(|op| !line.starts_with(op));
        self.calls.lock().unwrap().push(line.clone());
        ExecutionResult {
            command: line,
            output: if success { String::new() } else { "simulated failure".to_string() },
            success,
            exit_code: Some(if success { 0 } else { 1 }),
            elapsed: Duration::from_millis(1),
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn write_apk(path: &Path, dex: &str) {
    let mut zip = zip::ZipWriter::new(fs::File::create(path).unwrap());
    for (name, content) in [("AndroidManifest.xml", "manifest"), ("classes4.dex", dex)] {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

impl BuildTools for FakeTools {
    fn missing_tools(&self) -> Vec<MissingTool> {
        self.missing.clone()
    }

    fn install_missing(&self) -> Result<()> {
        self.record("install_missing".to_string()).check("Install tools")?;
        Ok(())
    }

    fn fetch(&self, url: &str, dest: &Path, _sha384: Option<&str>) -> Result<()> {
        self.record(format!("fetch {}", url)).check("Download")?;
        fs::create_dir_all(dest.parent().unwrap()).unwrap();
        fs::write(dest, "apk").unwrap();
        Ok(())
    }

    fn gradle_build(&self) -> ExecutionResult {
        self.record("gradle_build".to_string())
    }

    fn decompile(&self, apk: &Path, out_dir: &Path, keep_debug_info: bool) -> ExecutionResult {
        let result = self.record(format!("decompile {} keep={}", file_name(apk), keep_debug_info));
        if result.success {
            let tree = if file_name(apk) == "app-debug.apk" {
                Self::built_tree()
            } else {
                Self::stock_tree()
            };
            if out_dir.exists() {
                fs::remove_dir_all(out_dir).unwrap();
            }
            Self::write_tree(out_dir, &tree);
        }
        result
    }

    fn recompile(&self, tree: &Path, apk_out: &Path) -> ExecutionResult {
        let result = self.record(format!("recompile {}", file_name(tree)));
        if result.success {
            fs::create_dir_all(tree.join("build/apk")).unwrap();
            fs::write(tree.join("build/apk/classes.dex"), "scratch").unwrap();
            write_apk(apk_out, "full build");
        }
        result
    }

    fn assemble_unit(&self, unit_dir: &Path, dex_out: &Path) -> ExecutionResult {
        let result = self.record(format!("assemble_unit {}", file_name(unit_dir)));
        if result.success {
            fs::write(dex_out, "quick build").unwrap();
        }
        result
    }

    fn align(&self, apk_in: &Path, apk_out: &Path) -> ExecutionResult {
        let result = self.record(format!("align {}", file_name(apk_in)));
        if result.success {
            fs::copy(apk_in, apk_out).unwrap();
        }
        result
    }

    fn sign(&self, _signing: &SigningInfo, apk: &Path) -> ExecutionResult {
        let result = self.record(format!("sign {}", file_name(apk)));
        if result.success {
            let mut idsig = PathBuf::from(apk).into_os_string();
            idsig.push(".idsig");
            fs::write(idsig, "idsig").unwrap();
        }
        result
    }

    fn install(&self, apk: &Path) -> ExecutionResult {
        self.record(format!("install {}", file_name(apk)))
    }

    fn package_info(&self, apk: &Path) -> Option<PackageInfo> {
        self.record(format!("package_info {}", file_name(apk)));
        self.package.clone()
    }

    fn launch(&self, info: &PackageInfo) -> ExecutionResult {
        self.record(format!(
            "launch {}/{}",
            info.package_name, info.launchable_activity
        ))
    }
}
