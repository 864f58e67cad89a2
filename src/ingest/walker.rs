use walkdir::WalkDir;
use std::path::{Path, PathBuf};
use crate::error::{KgError, Result};

/// A Markdown document found under the docs folder
#[derive(Debug, Clone)]
pub struct FileMetadata {
    /// Path relative to the docs folder, always with forward slashes.
    pub relative_path: String,
    pub absolute_path: PathBuf,
    pub file_size: u64,
}

fn is_markdown(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_lowercase();
    matches!(extension.as_str(), "md" | "markdown")
}

/// Recursively discover `.md` and `.markdown` files under `root`,
/// sorted by relative path.
pub fn discover_markdown(root: &Path) -> Result<Vec<FileMetadata>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !path.is_file() || !is_markdown(path) {
            continue;
        }

        let relative_path = path
            .strip_prefix(root)
            .map_err(|_| {
                KgError::Config(format!("Failed to compute relative path for: {}", path.display()))
            })?
            .to_string_lossy()
            .replace('\\', "/");

        files.push(FileMetadata {
            relative_path,
            absolute_path: path.to_path_buf(),
            file_size: entry.metadata().map(|m| m.len()).unwrap_or(0),
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    log::info!("Discovered {} Markdown files in {}", files.len(), root.display());
    Ok(files)
}
