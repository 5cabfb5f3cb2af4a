// src/pipeline/quick.rs

//! Quick-mode rebuilds
//!
//! A quick rebuild assembles only the mod bytecode unit and swaps it into the
//! package compiled by the last full build. That is only sound while nothing
//! outside the unit changed, which the build fingerprint checks.

use crate::error::{Error, Result};
use crate::tree::BuildFingerprint;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Check that the last full build still describes the target tree
///
/// A missing fingerprint or a changed tree or patch directory means the
/// compiled package no longer matches and a full build is required.
pub fn verify_fingerprint(
    fingerprint_file: &Path,
    target: &Path,
    patch_dir: &Path,
    unit: u32,
    unit_dir: &str,
) -> Result<()> {
    if !fingerprint_file.is_file() {
        return Err(Error::Precondition(format!(
            "Quick mode cannot run, no build fingerprint at {}. Run a full build first.",
            fingerprint_file.display()
        )));
    }
    let recorded = BuildFingerprint::load(fingerprint_file)?;
    let current = BuildFingerprint::compute(target, patch_dir, unit, unit_dir)?;

    if !recorded.matches(&current) {
        debug!(
            "Fingerprint mismatch: recorded tree {} patch {}, current tree {} patch {}",
            recorded.tree_digest, recorded.patch_digest, current.tree_digest, current.patch_digest
        );
        return Err(Error::Precondition(format!(
            "Quick mode cannot run, files outside {} or the patch directory changed since the \
             last full build ({}). Run a full build first.",
            unit_dir,
            recorded.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        )));
    }
    Ok(())
}

/// Replace (or add) one entry of a zip archive in place
///
/// Every other entry is copied without recompression. The new archive is
/// written next to the old one and renamed over it, so a failure leaves the
/// original untouched.
pub fn replace_archive_entry(archive: &Path, entry_name: &str, replacement: &Path) -> Result<()> {
    let parent = archive
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));

    let source = File::open(archive).map_err(|e| Error::io_at(archive, e))?;
    let mut zip = ZipArchive::new(source)?;

    let temp = NamedTempFile::new_in(parent).map_err(|e| Error::io_at(parent, e))?;
    let mut writer = ZipWriter::new(temp);

    let mut kept = 0;
    for i in 0..zip.len() {
        let entry = zip.by_index_raw(i)?;
        if entry.name() == entry_name {
            continue;
        }
        writer.raw_copy_file(entry)?;
        kept += 1;
    }

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    writer.start_file(entry_name, options)?;
    let mut input = File::open(replacement).map_err(|e| Error::io_at(replacement, e))?;
    io::copy(&mut input, &mut writer).map_err(|e| Error::io_at(replacement, e))?;
    writer.flush()?;

    let temp = writer.finish()?;
    temp.persist(archive)
        .map_err(|e| Error::io_at(archive, e.error))?;

    info!(
        "Replaced {} in {} ({} other entries kept)",
        entry_name,
        archive.display(),
        kept
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn make_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, content) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    fn read_entries(path: &Path) -> Vec<(String, String)> {
        let mut zip = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut entry = zip.by_index(i).unwrap();
                let mut content = String::new();
                entry.read_to_string(&mut content).unwrap();
                (entry.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_replace_existing_entry() {
        let temp = tempfile::tempdir().unwrap();
        let apk = temp.path().join("compiled.apk");
        make_zip(&apk, &[
            ("AndroidManifest.xml", "manifest"),
            ("classes4.dex", "old dex"),
            ("res/a.xml", "res"),
        ]);
        let dex = temp.path().join("classes4.dex");
        std::fs::write(&dex, "new dex").unwrap();

        replace_archive_entry(&apk, "classes4.dex", &dex).unwrap();

        let entries = read_entries(&apk);
        assert_eq!(entries.len(), 3);
        assert!(entries.contains(&("AndroidManifest.xml".to_string(), "manifest".to_string())));
        assert!(entries.contains(&("res/a.xml".to_string(), "res".to_string())));
        assert!(entries.contains(&("classes4.dex".to_string(), "new dex".to_string())));
    }

    #[test]
    fn test_add_missing_entry() {
        let temp = tempfile::tempdir().unwrap();
        let apk = temp.path().join("compiled.apk");
        make_zip(&apk, &[("classes.dex", "main")]);
        let dex = temp.path().join("classes4.dex");
        std::fs::write(&dex, "mods").unwrap();

        replace_archive_entry(&apk, "classes4.dex", &dex).unwrap();
        assert_eq!(read_entries(&apk).len(), 2);
    }

    #[test]
    fn test_missing_replacement_leaves_archive() {
        let temp = tempfile::tempdir().unwrap();
        let apk = temp.path().join("compiled.apk");
        make_zip(&apk, &[("classes4.dex", "old dex")]);

        let err = replace_archive_entry(&apk, "classes4.dex", &temp.path().join("missing.dex"));
        assert!(err.is_err());
        assert_eq!(
            read_entries(&apk),
            [("classes4.dex".to_string(), "old dex".to_string())]
        );
    }

    #[test]
    fn test_verify_fingerprint() {
        let temp = tempfile::tempdir().unwrap();
        let target = temp.path().join("stock");
        let patch = temp.path().join("patch");
        let file = temp.path().join("build-fingerprint.json");
        std::fs::create_dir_all(target.join("smali_classes4/mods")).unwrap();
        std::fs::write(target.join("apktool.yml"), "v").unwrap();

        let err = verify_fingerprint(&file, &target, &patch, 4, "smali_classes4").unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));

        BuildFingerprint::compute(&target, &patch, 4, "smali_classes4")
            .unwrap()
            .save(&file)
            .unwrap();
        std::fs::write(target.join("smali_classes4/mods/A.smali"), "changed").unwrap();
        verify_fingerprint(&file, &target, &patch, 4, "smali_classes4").unwrap();

        std::fs::write(target.join("apktool.yml"), "changed").unwrap();
        let err = verify_fingerprint(&file, &target, &patch, 4, "smali_classes4").unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }
}
