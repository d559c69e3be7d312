//! The real-filesystem implementation of [`FileSystem`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::{
    ast::ImageFormat,
    backend::FileSystem,
    error::{RunError, RunResult},
};

/// `FileSystem` backed by `std::fs`.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn normalize(&self, raw: &str) -> PathBuf {
        normalize_lexically(raw)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn size(&self, path: &Path) -> u64 {
        fs::metadata(path).map_or(0, |meta| meta.len())
    }

    fn list_images(&self, dir: &Path) -> RunResult<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|err| RunError::backend(&format!("listing {}", dir.display()), err))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| RunError::backend(&format!("listing {}", dir.display()), err))?;
            let path = entry.path();
            if path.is_file() && has_image_extension(&path) {
                files.push(path);
            }
        }
        // read_dir order is OS-dependent; sort by name so batch runs are
        // reproducible across platforms
        files.sort();
        Ok(files)
    }

    fn create_dir_all(&self, path: &Path) -> RunResult<()> {
        fs::create_dir_all(path).map_err(|err| RunError::backend(&format!("creating {}", path.display()), err))
    }

    fn remove_file(&self, path: &Path) -> RunResult<()> {
        fs::remove_file(path).map_err(|err| RunError::backend(&format!("removing {}", path.display()), err))
    }
}

/// Lexical path normalization: both separator styles are accepted, `.` and
/// resolvable `..` components are collapsed, and the result uses the
/// platform separator. Mirrors `os.path.normpath` for relative and
/// rooted POSIX-style paths.
fn normalize_lexically(raw: &str) -> PathBuf {
    let rooted = raw.starts_with('/') || raw.starts_with('\\');
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if matches!(parts.last(), None | Some(&"..")) {
                    if !rooted {
                        parts.push("..");
                    }
                } else {
                    parts.pop();
                }
            }
            other => parts.push(other),
        }
    }
    let mut joined = String::new();
    if rooted {
        joined.push(std::path::MAIN_SEPARATOR);
    }
    joined.push_str(&parts.join(std::path::MAIN_SEPARATOR_STR));
    if joined.is_empty() {
        joined.push('.');
    }
    PathBuf::from(joined)
}

/// Whether the path carries one of the recognized image extensions,
/// case-insensitively.
pub(crate) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ImageFormat::from_extension(ext).is_some())
}
