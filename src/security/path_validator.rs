//! Path validation for files written into the workspace.
//!
//! Task units name their output files freely; these helpers make sure every
//! destination stays inside the workspace and that names built from cluster
//! object names are safe on disk.

use anyhow::{anyhow, bail, Result};
use std::path::{Component, Path, PathBuf};

/// Normalizes a task output key to a path relative to `base`.
///
/// Relative keys are accepted as long as they consist of normal components.
/// Absolute keys are accepted only when they live under `base` and are then
/// made relative to it.
///
/// # Errors
///
/// - The key contains `..` or a null byte
/// - The key is absolute and outside `base`
/// - The key is empty once `.` components are dropped
pub fn relative_destination(base: &Path, key: &Path) -> Result<PathBuf> {
    if key.to_string_lossy().contains('\0') {
        bail!("Path contains null bytes");
    }

    let candidate = if key.is_absolute() {
        key.strip_prefix(base)
            .map_err(|_| anyhow!("Path escapes workspace: {}", key.display()))?
    } else {
        key
    };

    let mut resolved = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(name) => resolved.push(name),
            Component::CurDir => {}
            Component::ParentDir => {
                bail!("Path traversal attempt detected: path contains '..'");
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(anyhow!("Invalid path component: {:?}", component));
            }
        }
    }

    if resolved.as_os_str().is_empty() {
        bail!("Path does not name a file: {}", key.display());
    }

    Ok(resolved)
}

/// Resolves a task output key to an absolute destination inside `base`.
pub fn resolve_in_workspace(base: &Path, key: &Path) -> Result<PathBuf> {
    Ok(base.join(relative_destination(base, key)?))
}

/// Sanitizes a filename to remove potentially dangerous characters.
///
/// Pod, container and release names end up in file names; this keeps a
/// hostile or unusual name from introducing separators.
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = String::with_capacity(filename.len());

    for ch in filename.chars() {
        match ch {
            '/' | '\\' => sanitized.push('_'),
            '\0' => continue,
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => sanitized.push('_'),
            c if c.is_control() => sanitized.push('_'),
            c => sanitized.push(c),
        }
    }

    // Leading and trailing dots or spaces are dropped; a name made only of
    // them becomes "unnamed"
    let trimmed = sanitized.trim_matches(|c| c == '.' || c == ' ');
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_relative_keys_are_kept() {
        let base = Path::new("/tmp/nic-diag-1");

        assert_eq!(
            relative_destination(base, Path::new("resources/default/pods.json")).unwrap(),
            PathBuf::from("resources/default/pods.json")
        );
        assert_eq!(
            relative_destination(base, Path::new("./k8s/version.json")).unwrap(),
            PathBuf::from("k8s/version.json")
        );
    }

    #[test]
    fn test_absolute_keys_inside_workspace() {
        let base = Path::new("/tmp/nic-diag-1");

        assert_eq!(
            relative_destination(base, Path::new("/tmp/nic-diag-1/logs/ns/a__b.txt")).unwrap(),
            PathBuf::from("logs/ns/a__b.txt")
        );
        assert!(relative_destination(base, Path::new("/etc/passwd")).is_err());
        assert!(relative_destination(base, Path::new("/tmp/nic-diag-10/x")).is_err());
    }

    #[test]
    fn test_traversal_is_rejected() {
        let base = Path::new("/tmp/safe");

        let escape_attempts = vec![
            "../etc/passwd",
            "subdir/../../../etc/passwd",
            "./../..",
            "valid/../../../escape",
        ];

        for attempt in escape_attempts {
            assert!(
                relative_destination(base, Path::new(attempt)).is_err(),
                "Failed to catch escape attempt: {}",
                attempt
            );
        }
    }

    #[test]
    fn test_empty_and_null_keys() {
        let base = Path::new("/tmp/safe");
        assert!(relative_destination(base, Path::new("")).is_err());
        assert!(relative_destination(base, Path::new(".")).is_err());
        assert!(relative_destination(base, Path::new("/tmp/safe")).is_err());
        assert!(relative_destination(base, Path::new("file\0name")).is_err());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("nginx-ingress-7d9f"), "nginx-ingress-7d9f");
        assert_eq!(sanitize_filename("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_filename("pod:container"), "pod_container");
        assert_eq!(sanitize_filename(""), "unnamed");
        assert_eq!(sanitize_filename("..."), "unnamed");
        assert_eq!(sanitize_filename(" . "), "unnamed");
        assert_eq!(sanitize_filename(".hidden."), "hidden");
    }

    proptest! {
        #[test]
        fn prop_normal_components_stay_inside(parts in proptest::collection::vec("[a-z0-9_-]{1,12}", 1..6)) {
            let base = Path::new("/tmp/workspace");
            let key: PathBuf = parts.iter().collect();
            let resolved = resolve_in_workspace(base, &key).unwrap();
            prop_assert!(resolved.starts_with(base));
            prop_assert_eq!(resolved.strip_prefix(base).unwrap(), key.as_path());
        }
    }
}
