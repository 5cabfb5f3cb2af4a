// src/platform.rs

//! Host platform differences
//!
//! Tool archives, executable names and batch-file invocation differ between
//! Linux and Windows hosts. [`detect`] picks the implementation once at
//! startup; nothing else in the crate checks the target OS.

use crate::tools::command::ToolCommand;
use std::fmt;
use std::path::{Path, PathBuf};

/// Capabilities that depend on the host operating system
pub trait HostPlatform: fmt::Debug + Send + Sync {
    /// Suffix used in Android SDK archive names, and the tools directory name
    fn os_name(&self) -> &'static str;

    /// adb inside an extracted platform-tools archive
    fn adb_path(&self, platform_tools_dir: &Path) -> PathBuf;

    /// File name of a build-tools executable (`aapt`, `apksigner`, `zipalign`)
    fn build_tool_file(&self, name: &str) -> String;

    /// gradle wrapper script of a project
    fn gradle_wrapper(&self, project_home: &Path) -> PathBuf;

    /// Executable name of the JVM launcher
    fn java_file(&self) -> &'static str;

    /// Adjust a command before it is spawned
    fn prepare(&self, command: ToolCommand) -> ToolCommand {
        command
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LinuxHost;

impl HostPlatform for LinuxHost {
    fn os_name(&self) -> &'static str {
        "linux"
    }

    fn adb_path(&self, platform_tools_dir: &Path) -> PathBuf {
        platform_tools_dir.join("platform-tools/adb")
    }

    fn build_tool_file(&self, name: &str) -> String {
        name.to_string()
    }

    fn gradle_wrapper(&self, project_home: &Path) -> PathBuf {
        project_home.join("gradlew")
    }

    fn java_file(&self) -> &'static str {
        "java"
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WindowsHost;

impl HostPlatform for WindowsHost {
    fn os_name(&self) -> &'static str {
        "windows"
    }

    fn adb_path(&self, platform_tools_dir: &Path) -> PathBuf {
        platform_tools_dir.join("platform-tools/adb.exe")
    }

    /// apksigner ships as a batch wrapper around a jar
    fn build_tool_file(&self, name: &str) -> String {
        match name {
            "apksigner" => "apksigner.bat".to_string(),
            other => format!("{}.exe", other),
        }
    }

    fn gradle_wrapper(&self, project_home: &Path) -> PathBuf {
        project_home.join("gradlew.bat")
    }

    fn java_file(&self) -> &'static str {
        "java.exe"
    }

    /// Batch files only run through `cmd /C`
    fn prepare(&self, command: ToolCommand) -> ToolCommand {
        let is_batch = command
            .program()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("bat"));
        if is_batch {
            command.wrapped_in("cmd", &["/C"])
        } else {
            command
        }
    }
}

/// Platform implementation for the running host
pub fn detect() -> Box<dyn HostPlatform> {
    if cfg!(windows) {
        Box::new(WindowsHost)
    } else {
        Box::new(LinuxHost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linux_paths() {
        let host = LinuxHost;
        assert_eq!(host.adb_path(Path::new("/t")), PathBuf::from("/t/platform-tools/adb"));
        assert_eq!(host.build_tool_file("zipalign"), "zipalign");
        assert_eq!(host.gradle_wrapper(Path::new("/p")), PathBuf::from("/p/gradlew"));
    }

    #[test]
    fn test_windows_names() {
        let host = WindowsHost;
        assert_eq!(host.build_tool_file("apksigner"), "apksigner.bat");
        assert_eq!(host.build_tool_file("zipalign"), "zipalign.exe");
        assert_eq!(host.os_name(), "windows");
    }

    #[test]
    fn test_windows_wraps_batch_files() {
        let command = ToolCommand::new("C:/tools/apksigner.bat").arg("sign");
        let prepared = WindowsHost.prepare(command);
        assert_eq!(prepared.program(), Path::new("cmd"));
        assert_eq!(prepared.get_args()[0], "/C");
        assert!(prepared.get_args()[1].ends_with("apksigner.bat"));
        assert_eq!(prepared.get_args()[2], "sign");

        let exe = WindowsHost.prepare(ToolCommand::new("C:/tools/zipalign.exe"));
        assert_eq!(exe.program(), Path::new("C:/tools/zipalign.exe"));
    }
}
