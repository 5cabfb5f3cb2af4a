// src/tools/mod.rs

//! External Android tools
//!
//! Provisioning (download, verify, extract) and invocation of the tools the
//! pipeline drives: gradle, apktool, smali, zipalign, apksigner, aapt and adb.

pub mod command;
pub mod download;
pub mod executable;
pub mod toolbox;

pub use command::{CommandRunner, ExecutionResult, ProcessRunner, ToolCommand, format_duration};
pub use download::{Downloader, extract_zip, sha384_file, verify_sha384};
pub use executable::{Executable, ExecutableKind, JavaLauncher};
pub use toolbox::{BuildTools, MissingTool, PackageInfo, Toolbox, parse_badging};
