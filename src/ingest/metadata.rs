use sha2::{Digest, Sha256};
use std::path::Path;

use crate::error::Result;
use crate::store::DocumentRecord;

/// SHA-256 of document text, lowercase hex
pub fn compute_content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// SHA-256 of a file's bytes
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Document id for a path relative to the docs folder: the path itself with
/// forward slashes, so ids are stable across platforms.
pub fn document_id_for(relative_path: &str) -> String {
    relative_path.replace('\\', "/")
}

/// Chapter and section for a relative path.
///
/// The chapter is the directory holding the file (`None` at the root), the
/// section is the file name without its extension.
///
/// ```text
/// "第一章/板块构造.md"        → (Some("第一章"), Some("板块构造"))
/// "卷一/第二章/断裂.md"       → (Some("第二章"), Some("断裂"))
/// "前言.md"                   → (None, Some("前言"))
/// ```
pub fn chapter_and_section(relative_path: &str) -> (Option<String>, Option<String>) {
    let normalized = document_id_for(relative_path);
    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();

    let section = segments.last().and_then(|file| {
        let stem = Path::new(file).file_stem()?.to_str()?.trim();
        (!stem.is_empty()).then(|| stem.to_string())
    });
    let chapter = if segments.len() >= 2 {
        Some(segments[segments.len() - 2].trim().to_string()).filter(|c| !c.is_empty())
    } else {
        None
    };

    (chapter, section)
}

/// Store record for a document with the given text.
pub fn document_record(relative_path: &str, content: &str) -> DocumentRecord {
    let (chapter, section) = chapter_and_section(relative_path);
    DocumentRecord {
        document_id: document_id_for(relative_path),
        content_hash: compute_content_hash(content),
        chapter,
        section,
    }
}
