pub mod walker;
pub mod metadata;
pub mod incremental;

pub use walker::{FileMetadata, discover_markdown};
pub use incremental::{FileClassification, classify_files, delete_documents, find_deleted_documents};
pub use metadata::{
    chapter_and_section, compute_content_hash, compute_file_hash, document_id_for, document_record,
};

use crate::error::Result;
use crate::graph::{Extractor, KnowledgeGraph};
use crate::store::DocumentRecord;

/// Read one document and extract its graph
///
/// Blocking: reads the file and runs both extraction passes. The returned
/// record carries the hash of the exact text that was extracted.
pub fn extract_document(
    extractor: &Extractor,
    file: &FileMetadata,
) -> Result<(DocumentRecord, KnowledgeGraph)> {
    let content = std::fs::read_to_string(&file.absolute_path)?;
    let document = document_record(&file.relative_path, &content);
    let graph = extractor.build_graph(&content, &document.source_info());
    Ok((document, graph))
}
