//! Content fingerprints for assets and build contexts.
//!
//! A fingerprint is the hex SHA-256 of a file's contents or, for a
//! directory, of every file's relative path and content digest in sorted
//! order. Identical trees always produce identical fingerprints, which is
//! what makes asset object keys content-addressed.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{BundlingError, BundlingResult};

/// Fingerprint a file or directory.
///
/// # Errors
///
/// Returns [`BundlingError::SourceNotFound`] if the path does not exist, or
/// [`BundlingError::Io`] if any entry cannot be read.
pub fn fingerprint_path(path: &Path) -> BundlingResult<String> {
    fingerprint_with_extra(path, None)
}

/// Fingerprint a path together with extra input (e.g. bundling options),
/// so that changing how an asset is built changes its fingerprint too.
///
/// # Errors
///
/// See [`fingerprint_path`].
pub fn fingerprint_with_extra(path: &Path, extra: Option<&str>) -> BundlingResult<String> {
    let metadata = fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BundlingError::SourceNotFound {
                path: path.to_path_buf(),
            }
        } else {
            BundlingError::io(path, e)
        }
    })?;

    let mut hasher = Sha256::new();
    if metadata.is_dir() {
        for relative in list_files(path)? {
            let full = path.join(&relative);
            let contents = fs::read(&full).map_err(|e| BundlingError::io(&full, e))?;
            hasher.update(relative_key(&relative).as_bytes());
            hasher.update([0u8]);
            hasher.update(Sha256::digest(&contents));
        }
    } else {
        let contents = fs::read(path).map_err(|e| BundlingError::io(path, e))?;
        hasher.update(&contents);
    }

    if let Some(extra) = extra {
        hasher.update([0u8]);
        hasher.update(extra.as_bytes());
    }

    Ok(hex::encode(hasher.finalize()))
}

/// All files below `root` as root-relative paths, sorted.
///
/// # Errors
///
/// Returns [`BundlingError::Io`] if a directory cannot be read.
pub fn list_files(root: &Path) -> BundlingResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![PathBuf::new()];

    while let Some(relative_dir) = pending.pop() {
        let dir = root.join(&relative_dir);
        let entries = fs::read_dir(&dir).map_err(|e| BundlingError::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| BundlingError::io(&dir, e))?;
            let relative = relative_dir.join(entry.file_name());
            let file_type = fs::metadata(entry.path())
                .map_err(|e| BundlingError::io(entry.path(), e))?;
            if file_type.is_dir() {
                pending.push(relative);
            } else {
                files.push(relative);
            }
        }
    }

    files.sort_by_key(|p| relative_key(p));
    Ok(files)
}

/// Forward-slash form of a relative path, independent of the host OS.
#[must_use]
pub fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_should_fingerprint_identical_trees_identically() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        for root in [a.path(), b.path()] {
            write(root, "index.html", "<h1>docs</h1>");
            write(root, "css/site.css", "body {}");
        }
        assert_eq!(
            fingerprint_path(a.path()).unwrap(),
            fingerprint_path(b.path()).unwrap()
        );
    }

    #[test]
    fn test_should_change_fingerprint_on_content_or_rename() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "openapi.yaml", "openapi: 3.0.0");
        let before = fingerprint_path(dir.path()).unwrap();

        write(dir.path(), "openapi.yaml", "openapi: 3.0.1");
        let edited = fingerprint_path(dir.path()).unwrap();
        assert_ne!(before, edited);

        fs::rename(dir.path().join("openapi.yaml"), dir.path().join("api.yaml")).unwrap();
        assert_ne!(edited, fingerprint_path(dir.path()).unwrap());
    }

    #[test]
    fn test_should_mix_extra_input_into_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", "a");
        let plain = fingerprint_path(dir.path()).unwrap();
        let with_options = fingerprint_with_extra(dir.path(), Some("{\"user\":\"root\"}")).unwrap();
        assert_ne!(plain, with_options);
        assert_eq!(plain.len(), 64);
    }

    #[test]
    fn test_should_fingerprint_single_file_by_content() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.yaml", "x: 1");
        write(dir.path(), "two.yaml", "x: 1");
        assert_eq!(
            fingerprint_path(&dir.path().join("one.yaml")).unwrap(),
            fingerprint_path(&dir.path().join("two.yaml")).unwrap()
        );
    }

    #[test]
    fn test_should_report_missing_source() {
        let err = fingerprint_path(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, BundlingError::SourceNotFound { .. }));
    }

    #[test]
    fn test_should_list_files_sorted_with_forward_slashes() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.txt", "b");
        write(dir.path(), "a/z.txt", "z");
        write(dir.path(), "a/c/d.txt", "d");
        let keys: Vec<String> = list_files(dir.path())
            .unwrap()
            .iter()
            .map(|p| relative_key(p))
            .collect();
        assert_eq!(keys, vec!["a/c/d.txt", "a/z.txt", "b.txt"]);
    }
}
