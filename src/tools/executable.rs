// src/tools/executable.rs

//! Provisioned external tools
//!
//! Every tool the pipeline calls is one of three kinds: a binary inside a
//! zip archive, a single jar run by the JVM, or the gradle wrapper of the mod
//! project. The kind decides how the tool is installed and how it is invoked.

use super::command::ToolCommand;
use super::download::{Downloader, extract_zip, make_executable};
use crate::error::{Error, Result};
use crate::platform::HostPlatform;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// How a tool is provisioned and launched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutableKind {
    /// Binary extracted from a downloaded zip
    Zipped {
        /// Download location of the archive
        archive: PathBuf,
        /// Directory the archive is extracted into
        extract_dir: PathBuf,
        /// Binary inside `extract_dir`
        executable: PathBuf,
        url: String,
        sha384: Option<String>,
    },
    /// Jar run with `java -jar`
    Jar {
        jar: PathBuf,
        url: String,
        sha384: Option<String>,
    },
    /// gradle wrapper of the mod project; never downloaded
    Gradle {
        project_home: PathBuf,
        java_home: Option<PathBuf>,
    },
}

/// A named external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Executable {
    name: String,
    kind: ExecutableKind,
}

/// How jar tools are started
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JavaLauncher {
    pub java: PathBuf,
    pub max_memory_mb: u32,
}

impl JavaLauncher {
    /// Prefer the configured JDK, then `java` on PATH
    pub fn resolve(java_home: Option<&Path>, platform: &dyn HostPlatform, max_memory_mb: u32) -> Self {
        let from_home = java_home
            .map(|home| home.join("bin").join(platform.java_file()))
            .filter(|java| java.is_file());
        let java = from_home
            .or_else(|| which::which("java").ok())
            .unwrap_or_else(|| PathBuf::from(platform.java_file()));
        Self { java, max_memory_mb }
    }
}

impl Executable {
    pub fn zipped(
        name: impl Into<String>,
        archive: PathBuf,
        extract_dir: PathBuf,
        executable: PathBuf,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ExecutableKind::Zipped {
                archive,
                extract_dir,
                executable,
                url: url.into(),
                sha384: None,
            },
        }
    }

    pub fn jar(name: impl Into<String>, jar: PathBuf, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: ExecutableKind::Jar {
                jar,
                url: url.into(),
                sha384: None,
            },
        }
    }

    pub fn gradle(project_home: PathBuf, java_home: Option<PathBuf>) -> Self {
        Self {
            name: "Gradle Build".to_string(),
            kind: ExecutableKind::Gradle {
                project_home,
                java_home,
            },
        }
    }

    /// Require a SHA-384 for the downloaded file
    pub fn with_sha384(mut self, hash: impl Into<String>) -> Self {
        let hash = Some(hash.into().to_lowercase());
        match &mut self.kind {
            ExecutableKind::Zipped { sha384, .. } | ExecutableKind::Jar { sha384, .. } => {
                *sha384 = hash;
            }
            ExecutableKind::Gradle { .. } => {}
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ExecutableKind {
        &self.kind
    }

    /// Download location, if the tool is downloaded at all
    pub fn url(&self) -> Option<&str> {
        match &self.kind {
            ExecutableKind::Zipped { url, .. } | ExecutableKind::Jar { url, .. } => Some(url),
            ExecutableKind::Gradle { .. } => None,
        }
    }

    pub fn is_installed(&self) -> bool {
        match &self.kind {
            ExecutableKind::Zipped { executable, .. } => executable.is_file(),
            ExecutableKind::Jar { jar, .. } => jar.is_file(),
            ExecutableKind::Gradle { .. } => true,
        }
    }

    /// Download and unpack the tool unless it is already present
    pub fn install(&self, downloader: &Downloader) -> Result<()> {
        if self.is_installed() {
            return Ok(());
        }
        info!("Downloading {}...", self.name);

        match &self.kind {
            ExecutableKind::Zipped {
                archive,
                extract_dir,
                executable,
                url,
                sha384,
            } => {
                downloader.download(url, archive, sha384.as_deref())?;
                extract_zip(archive, extract_dir)?;
                if let Err(e) = std::fs::remove_file(archive) {
                    warn!("Failed to remove {}: {}", archive.display(), e);
                }
                if !executable.is_file() {
                    return Err(Error::Archive(format!(
                        "{} does not contain {}",
                        url,
                        executable.display()
                    )));
                }
                make_executable(executable)?;
            }
            ExecutableKind::Jar { jar, url, sha384 } => {
                downloader.download(url, jar, sha384.as_deref())?;
            }
            ExecutableKind::Gradle { .. } => {}
        }

        info!("{} finished", self.name);
        Ok(())
    }

    /// Base invocation, before tool-specific arguments
    pub fn command(&self, platform: &dyn HostPlatform, java: &JavaLauncher) -> ToolCommand {
        match &self.kind {
            ExecutableKind::Zipped { executable, .. } => ToolCommand::new(executable),
            ExecutableKind::Jar { jar, .. } => ToolCommand::new(&java.java)
                .arg(format!("-Xmx{}m", java.max_memory_mb))
                .option_path("-jar", jar),
            ExecutableKind::Gradle {
                project_home,
                java_home,
            } => {
                let mut command = ToolCommand::new(platform.gradle_wrapper(project_home))
                    .option_path("--project-dir", project_home)
                    .arg(":app:assembleDebug");
                if let Some(home) = java_home.as_ref().filter(|h| h.exists()) {
                    let home = std::path::absolute(home).unwrap_or_else(|_| home.clone());
                    command = command.arg(format!("-Dorg.gradle.java.home={}", home.display()));
                }
                command
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::LinuxHost;

    fn java() -> JavaLauncher {
        JavaLauncher {
            java: PathBuf::from("/usr/bin/java"),
            max_memory_mb: 2048,
        }
    }

    #[test]
    fn test_jar_command() {
        let temp = tempfile::tempdir().unwrap();
        let jar = temp.path().join("apktool_2.10.0.jar");
        let tool = Executable::jar("apktool", jar.clone(), "https://example.com/apktool.jar");

        let command = tool.command(&LinuxHost, &java());
        assert_eq!(command.program(), Path::new("/usr/bin/java"));
        assert_eq!(
            command.get_args(),
            &["-Xmx2048m".to_string(), "-jar".to_string(), jar.display().to_string()]
        );
        assert!(!tool.is_installed());
        std::fs::write(&jar, "jar").unwrap();
        assert!(tool.is_installed());
    }

    #[test]
    fn test_gradle_command() {
        let temp = tempfile::tempdir().unwrap();
        let jdk = temp.path().join("jdk");
        std::fs::create_dir_all(&jdk).unwrap();

        let tool = Executable::gradle(temp.path().to_path_buf(), Some(jdk.clone()));
        let command = tool.command(&LinuxHost, &java());
        assert_eq!(command.program(), temp.path().join("gradlew"));
        assert_eq!(command.get_args()[0], "--project-dir");
        assert_eq!(command.get_args()[2], ":app:assembleDebug");
        assert_eq!(
            command.get_args()[3],
            format!("-Dorg.gradle.java.home={}", jdk.display())
        );
        assert!(tool.is_installed());
        assert_eq!(tool.url(), None);
    }

    #[test]
    fn test_gradle_skips_missing_java_home() {
        let temp = tempfile::tempdir().unwrap();
        let tool = Executable::gradle(temp.path().to_path_buf(), Some(temp.path().join("nope")));
        assert_eq!(tool.command(&LinuxHost, &java()).get_args().len(), 3);
    }

    #[test]
    fn test_with_sha384() {
        let tool = Executable::jar("smali", PathBuf::from("/t/smali.jar"), "u").with_sha384("ABCD");
        match tool.kind() {
            ExecutableKind::Jar { sha384, .. } => assert_eq!(sha384.as_deref(), Some("abcd")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_java_launcher_prefers_java_home() {
        let temp = tempfile::tempdir().unwrap();
        let bin = temp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        std::fs::write(bin.join("java"), "").unwrap();

        let launcher = JavaLauncher::resolve(Some(temp.path()), &LinuxHost, 1024);
        assert_eq!(launcher.java, bin.join("java"));
        assert_eq!(launcher.max_memory_mb, 1024);
    }
}
