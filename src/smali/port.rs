// src/smali/port.rs

//! Port mod code and shared runtimes from the built tree into the host tree

use super::SmaliRewriter;
use crate::error::{Error, Result};
use crate::settings::Settings;
use crate::tree::walker::walk_files;
use std::path::Path;
use tracing::debug;

/// Destination of the mod code inside the host unit
const MODS_DIR: &str = "mods";
/// Destination of the quarantined runtimes inside the host unit
const QUARANTINE_DIR: &str = "_doNotTouch";

/// Files ported per source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortReport {
    /// Numbered units found in the built tree
    pub units: u32,
    pub mods: usize,
    pub kotlin: usize,
    pub protobuf: usize,
}

/// Rewrite and copy mod-owned and runtime-owned code into `target_unit`
///
/// Units of `built_tree` are visited in order (`smali`, `smali_classes2`, ...)
/// until the first missing one. In each unit:
///
/// - `mods/` is rewritten and copied to `<target_unit>/mods`
/// - `kotlin/` is renamed to `kotlin2/`, rewritten and copied to
///   `<target_unit>/_doNotTouch/kotlin2`
/// - `com/google/protobuf/` is rewritten and copied to
///   `<target_unit>/_doNotTouch/protobuf`
///
/// The destination `mods` and `_doNotTouch` directories are cleared first.
pub fn port_units(
    rewriter: &SmaliRewriter,
    built_tree: &Path,
    target_unit: &Path,
    strip_debug: bool,
) -> Result<PortReport> {
    let mods_out = target_unit.join(MODS_DIR);
    let quarantine_out = target_unit.join(QUARANTINE_DIR);
    for dir in [&mods_out, &quarantine_out] {
        if dir.exists() {
            std::fs::remove_dir_all(dir).map_err(|e| Error::io_at(dir, e))?;
        }
    }

    let mut report = PortReport::default();
    for unit in 1.. {
        let unit_dir = built_tree.join(Settings::unit_dir_name(unit));
        if !unit_dir.is_dir() {
            break;
        }
        report.units = unit;
        debug!("Scanning {}", unit_dir.display());

        let mods = unit_dir.join("mods");
        if mods.is_dir() {
            report.mods += rewrite_and_copy(rewriter, &mods, &mods_out, strip_debug)?;
        }

        let kotlin = unit_dir.join("kotlin");
        if kotlin.is_dir() {
            let renamed = unit_dir.join("kotlin2");
            if renamed.exists() {
                std::fs::remove_dir_all(&renamed).map_err(|e| Error::io_at(&renamed, e))?;
            }
            std::fs::rename(&kotlin, &renamed).map_err(|e| Error::io_at(&kotlin, e))?;
            report.kotlin += rewrite_and_copy(
                rewriter,
                &renamed,
                &quarantine_out.join("kotlin2"),
                strip_debug,
            )?;
        }

        let protobuf = unit_dir.join("com/google/protobuf");
        if protobuf.is_dir() {
            report.protobuf += rewrite_and_copy(
                rewriter,
                &protobuf,
                &quarantine_out.join("protobuf"),
                strip_debug,
            )?;
        }
    }

    debug!("Port finished: {:?}", report);
    Ok(report)
}

fn rewrite_and_copy(
    rewriter: &SmaliRewriter,
    source: &Path,
    dest: &Path,
    strip_debug: bool,
) -> Result<usize> {
    rewriter.rewrite_tree(source, strip_debug)?;
    copy_tree(source, dest)
}

/// Copy every regular file under `source` to the mirrored path under `dest`
fn copy_tree(source: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    for file in &walk_files(source) {
        let file = file?;
        let relative = file.strip_prefix(source).map_err(|_| {
            Error::InvalidPath(format!("{} is not under {}", file.display(), source.display()))
        })?;
        let out = dest.join(relative);
        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_at(parent, e))?;
        }
        std::fs::copy(&file, &out).map_err(|e| Error::io_at(&file, e))?;
        copied += 1;
    }
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_port_units() {
        let temp = tempfile::tempdir().unwrap();
        let built = temp.path().join("decompiled");
        let target = temp.path().join("stock/smali_classes4");

        write(&built, "smali/mods/Entry.smali", "invoke Lkotlin/A;\n");
        write(&built, "smali/kotlin/Unit.smali", ".class Lkotlin/Unit;\n");
        write(&built, "smali_classes2/mods/Other.smali", "Lio/grpc/X;\n");
        write(&built, "smali_classes2/com/google/protobuf/Msg.smali", "Lkotlin/B;\n");
        // unit 4 is unreachable because unit 3 is missing
        write(&built, "smali_classes4/mods/Lost.smali", "x\n");

        write(&target, "mods/Stale.smali", "stale\n");
        write(&target, "_doNotTouch/kotlin2/Stale.smali", "stale\n");
        write(&target, "b/Host.smali", "host\n");

        let report = port_units(&SmaliRewriter::from_settings(&Settings::default()), &built, &target, false).unwrap();

        assert_eq!(report.units, 2);
        assert_eq!(report.mods, 2);
        assert_eq!(report.kotlin, 1);
        assert_eq!(report.protobuf, 1);

        assert_eq!(fs::read_to_string(target.join("mods/Entry.smali")).unwrap(), "invoke Lkotlin2/A;\n");
        assert_eq!(fs::read_to_string(target.join("mods/Other.smali")).unwrap(), "Lio/grpc2/X;\n");
        assert_eq!(
            fs::read_to_string(target.join("_doNotTouch/kotlin2/Unit.smali")).unwrap(),
            ".class Lkotlin2/Unit;\n"
        );
        assert_eq!(
            fs::read_to_string(target.join("_doNotTouch/protobuf/Msg.smali")).unwrap(),
            "Lkotlin2/B;\n"
        );

        assert!(!target.join("mods/Stale.smali").exists());
        assert!(!target.join("_doNotTouch/kotlin2/Stale.smali").exists());
        assert!(!target.join("mods/Lost.smali").exists());
        assert!(target.join("b/Host.smali").exists());

        // kotlin is quarantined in the built tree too
        assert!(!built.join("smali/kotlin").exists());
        assert!(built.join("smali/kotlin2/Unit.smali").exists());
    }

    #[test]
    fn test_port_without_units() {
        let temp = tempfile::tempdir().unwrap();
        let report = port_units(
            &SmaliRewriter::from_settings(&Settings::default()),
            &temp.path().join("missing"),
            &temp.path().join("target"),
            true,
        )
        .unwrap();
        assert_eq!(report, PortReport::default());
    }
}
