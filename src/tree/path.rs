// src/tree/path.rs

//! Path sanitization for manifest entries and archive members
//!
//! Deletion manifests live in a git repository and tool archives come from
//! the network, so neither is allowed to name a path outside the tree it is
//! resolved against.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize a relative path from an untrusted source
///
/// Leading slashes and backslashes are stripped, `.` components are dropped
/// and `..` components are rejected.
///
/// # Examples
///
/// ```
/// use apkpatch::tree::path::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("res/values/strings.xml").unwrap(), PathBuf::from("res/values/strings.xml"));
/// assert_eq!(sanitize_path("/smali/a.smali").unwrap(), PathBuf::from("smali/a.smali"));
/// assert!(sanitize_path("../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy().replace('\\', "/");
    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path_str.to_string())),
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::PathTraversal(path_str.to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath("Empty path after sanitization".to_string()));
    }

    Ok(normalized)
}

/// Join an untrusted relative path onto `root`
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let joined = root.join(sanitize_path(path)?);

    if let (Ok(canonical_root), Ok(canonical_joined)) = (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "Path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Path of `file` relative to `root`, forward-slash separated, no leading slash
///
/// This is the form written to deletion manifests.
pub fn manifest_path(root: &Path, file: &Path) -> Result<String> {
    let relative = file.strip_prefix(root).map_err(|_| {
        Error::InvalidPath(format!(
            "{} is not under {}",
            file.display(),
            root.display()
        ))
    })?;

    let joined = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/");

    Ok(joined.trim_start_matches('/').to_string())
}
