//! Incremental ingestion: skip documents whose content hash is already stored.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::ingest::{compute_file_hash, document_id_for, FileMetadata};
use crate::store::GraphStore;

/// Discovered files grouped by how they compare with the store.
#[derive(Debug, Default)]
pub struct FileClassification {
    /// Not in the store yet.
    pub new_files: Vec<FileMetadata>,
    /// Stored with a different content hash.
    pub modified_files: Vec<FileMetadata>,
    pub unchanged_files: Vec<FileMetadata>,
}

impl FileClassification {
    /// Files that need extraction, new ones first.
    pub fn pending(&self) -> impl Iterator<Item = &FileMetadata> {
        self.new_files.iter().chain(self.modified_files.iter())
    }
}

/// Compare each file's current hash with `existing_hashes` (document id to hash).
///
/// Files that cannot be read are logged and left out of every group.
pub fn classify_files(
    files: &[FileMetadata],
    existing_hashes: &HashMap<String, String>,
) -> Result<FileClassification> {
    let mut classification = FileClassification::default();

    for file in files {
        let current_hash = match compute_file_hash(&file.absolute_path) {
            Ok(hash) => hash,
            Err(e) => {
                log::warn!("Skipping {}: {}", file.relative_path, e);
                continue;
            }
        };
        match existing_hashes.get(&document_id_for(&file.relative_path)) {
            None => classification.new_files.push(file.clone()),
            Some(stored) if stored != &current_hash => classification.modified_files.push(file.clone()),
            Some(_) => classification.unchanged_files.push(file.clone()),
        }
    }

    Ok(classification)
}

/// Stored document ids with no file on disk any more.
pub async fn find_deleted_documents(
    store: &GraphStore,
    existing_files: &HashSet<String>,
) -> Result<Vec<String>> {
    let mut deleted: Vec<String> = store
        .document_hashes()
        .await?
        .into_keys()
        .filter(|id| !existing_files.contains(id))
        .collect();
    deleted.sort();
    Ok(deleted)
}

/// Remove documents and everything extracted from them. Returns how many existed.
pub async fn delete_documents(store: &GraphStore, document_ids: &[String]) -> Result<usize> {
    let mut removed = 0;
    for id in document_ids {
        if store.remove_document(id).await? {
            removed += 1;
        }
    }
    Ok(removed)
}
