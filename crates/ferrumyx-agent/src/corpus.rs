//! Corpus scanning: enumerate UTF-8 text files under the data directory (or
//! a single file in `--single-document` mode) and derive each document's
//! `source_id` from its file stem.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct CorpusDocument {
    pub source_id: String,
    pub path: PathBuf,
}

/// PMC-prefixed stems are used verbatim; others are prefixed `DOC_` with
/// spaces replaced by underscores.
pub fn derive_source_id(stem: &str) -> String {
    if stem.starts_with("PMC") {
        stem.to_string()
    } else {
        format!("DOC_{}", stem.replace(' ', "_"))
    }
}

fn to_document(path: PathBuf) -> Option<CorpusDocument> {
    let stem = path.file_stem()?.to_str()?.to_string();
    Some(CorpusDocument {
        source_id: derive_source_id(&stem),
        path,
    })
}

/// Scan `data_directory` for files, sorted by path for a stable plan order.
pub async fn scan_corpus(data_directory: &Path) -> Result<Vec<CorpusDocument>> {
    let mut entries = tokio::fs::read_dir(data_directory)
        .await
        .with_context(|| format!("failed to read corpus directory {}", data_directory.display()))?;

    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths.into_iter().filter_map(to_document).collect())
}

/// A single document, for `--single-document` mode.
pub fn single_document(path: &str) -> Option<CorpusDocument> {
    to_document(PathBuf::from(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmc_stems_are_used_verbatim() {
        assert_eq!(derive_source_id("PMC1234567"), "PMC1234567");
    }

    #[test]
    fn other_stems_get_doc_prefix_and_underscored_spaces() {
        assert_eq!(derive_source_id("some paper title"), "DOC_some_paper_title");
        assert_eq!(derive_source_id("report"), "DOC_report");
    }

    #[test]
    fn single_document_derives_source_id_from_stem() {
        let doc = single_document("data_corpus/PMC555.txt").unwrap();
        assert_eq!(doc.source_id, "PMC555");
    }
}
