use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Lists every regular file under `root`, relative to `root`, in
/// deterministic (lexicographic, slash-separated) order, skipping
/// `.DS_Store`. This is the file set the ABI hasher folds into the package
/// ABI, so ordering must never depend on filesystem iteration order.
pub fn list_files_sorted(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.file_name() == ".DS_Store" {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walkdir entries are always under root")
            .to_path_buf();
        files.push(rel);
    }
    files.sort_by(|a, b| to_slash(a).cmp(&to_slash(b)));
    Ok(files)
}

/// Renders a relative path using forward slashes regardless of platform, so
/// ABI hashes are stable across Windows and Unix builders.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
