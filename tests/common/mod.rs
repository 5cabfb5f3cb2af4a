// tests/common/mod.rs

//! Shared test utilities for integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Write `(relative path, content)` pairs under `root`
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// Every regular file under `root`, keyed by forward-slash relative path
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    for file in apkpatch::walk_files(root).collect_files().unwrap() {
        let relative = file
            .strip_prefix(root)
            .unwrap()
            .to_string_lossy()
            .replace('\\', "/");
        files.insert(relative, fs::read(&file).unwrap());
    }
    files
}

/// Recursive copy of a tree
pub fn copy_tree(from: &Path, to: &Path) {
    for (relative, content) in read_tree(from) {
        let path = to.join(&relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }
}

/// A decompiled stock package, trimmed to the tracked subpaths
pub fn stock_files() -> Vec<(&'static str, &'static str)> {
    vec![
        ("AndroidManifest.xml", "<manifest package=\"com.discord\"/>"),
        ("apktool.yml", "version: 2.10.0\n"),
        ("assets/fonts/ginto.ttf", "font"),
        ("assets/old.bin", "old"),
        ("lib/arm64-v8a/libapp.so", "elf"),
        ("res/values/strings.xml", "<resources><string name=\"app\">Discord</string></resources>"),
        ("res/xml/network_security_config.xml", "<network-security-config/>"),
        ("smali/c.smali", ".class public Lc;\n.super Ljava/lang/Object;\n"),
        ("smali/com/discord/App.smali", ".class public Lcom/discord/App;\n"),
        ("smali_classes2/a/A.smali", ".class public La/A;\n"),
        ("smali_classes4/b/B.smali", ".class public Lb/B;\n"),
        ("smali_classes4/bb/Untracked.smali", ".class public Lbb/Untracked;\n"),
    ]
}
