use std::path::{Path, PathBuf};

use super::StorageError;

/// A regular file found under an upload root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    /// Forward-slash path relative to the walked root.
    pub relative: String,
}

/// Lists every regular file under `root`, ordered by forward-slash relative path.
pub async fn collect_files(root: &Path) -> Result<Vec<LocalFile>, StorageError> {
    let walk_err = |path: &Path, source| StorageError::Walk {
        path: path.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| walk_err(&dir, e))?;

        while let Some(entry) = entries.next_entry().await.map_err(|e| walk_err(&dir, e))? {
            let path = entry.path();
            let file_type = entry.file_type().await.map_err(|e| walk_err(&path, e))?;

            if file_type.is_dir() {
                pending.push(path);
            } else if file_type.is_file() {
                let relative = relative_key(root, &path)?;
                files.push(LocalFile { path, relative });
            }
        }
    }

    files.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(files)
}

fn relative_key(root: &Path, path: &Path) -> Result<String, StorageError> {
    let invalid = || StorageError::InvalidPath {
        path: path.to_path_buf(),
    };
    let relative = path.strip_prefix(root).map_err(|_| invalid())?;

    let mut parts = Vec::new();
    for component in relative.components() {
        parts.push(component.as_os_str().to_str().ok_or_else(invalid)?);
    }
    Ok(parts.join("/"))
}

/// Joins an object prefix and a relative key with exactly one `/`.
pub fn object_key(prefix: &str, relative: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        relative.to_string()
    } else {
        format!("{prefix}/{relative}")
    }
}
