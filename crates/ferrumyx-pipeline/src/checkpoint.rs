//! Checkpoint Store (C12): a single JSON file, rewritten atomically
//! (write-then-rename) after each successful batch.

use ferrumyx_common::error::FerrumyxError;
use ferrumyx_common::models::{Checkpoint, RunStatus};
use std::path::{Path, PathBuf};

pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the checkpoint from disk, if present. Absence is not an error —
    /// the driver starts a fresh run.
    pub async fn load(&self) -> Result<Option<Checkpoint>, FerrumyxError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let checkpoint = serde_json::from_slice(&bytes)?;
                Ok(Some(checkpoint))
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(FerrumyxError::Other(err.into())),
        }
    }

    /// Atomically persist a checkpoint: write to a sibling temp file, then
    /// rename over the real path. A crash mid-write never corrupts the
    /// previous checkpoint.
    pub async fn save(&self, checkpoint: &Checkpoint) -> Result<(), FerrumyxError> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        let tmp_path = self.tmp_path();

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| FerrumyxError::Other(e.into()))?;
        }

        tokio::fs::write(&tmp_path, &bytes).await.map_err(|e| FerrumyxError::Other(e.into()))?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| FerrumyxError::Other(e.into()))?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Mark a document completed: append its `source_id` and reset
/// `last_processed_chunk` for the next document.
pub fn mark_document_completed(checkpoint: &mut Checkpoint, source_id: &str) {
    if !checkpoint.completed_documents.iter().any(|d| d == source_id) {
        checkpoint.completed_documents.push(source_id.to_string());
    }
    checkpoint.last_processed_chunk = -1;
    checkpoint.current_document_index += 1;
    checkpoint.timestamp = chrono::Utc::now();
}

/// Mark the whole run finished.
pub fn mark_run_completed(checkpoint: &mut Checkpoint) {
    checkpoint.status = RunStatus::Completed;
    let now = chrono::Utc::now();
    checkpoint.completion_time = Some(now);
    checkpoint.timestamp = now;
    checkpoint.final_nodes = Some(checkpoint.total_nodes_loaded);
    checkpoint.final_relationships = Some(checkpoint.total_relationships_loaded);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_checkpoint_file_loads_as_none() {
        let path = std::env::temp_dir().join(format!("ferrumyx-checkpoint-missing-{}.json", std::process::id()));
        let store = CheckpointStore::new(&path);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let path = std::env::temp_dir().join(format!("ferrumyx-checkpoint-roundtrip-{}.json", std::process::id()));
        let store = CheckpointStore::new(&path);
        let mut checkpoint = Checkpoint::new(10);
        checkpoint.last_processed_chunk = 3;
        store.save(&checkpoint).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.last_processed_chunk, 3);
        assert_eq!(loaded.total_documents, 10);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[test]
    fn mark_document_completed_appends_and_resets_chunk_cursor() {
        let mut checkpoint = Checkpoint::new(2);
        checkpoint.last_processed_chunk = 7;
        mark_document_completed(&mut checkpoint, "DOC_1");
        assert_eq!(checkpoint.completed_documents, vec!["DOC_1".to_string()]);
        assert_eq!(checkpoint.last_processed_chunk, -1);
        assert_eq!(checkpoint.current_document_index, 1);
    }

    #[test]
    fn mark_document_completed_is_idempotent_for_the_same_document() {
        let mut checkpoint = Checkpoint::new(2);
        mark_document_completed(&mut checkpoint, "DOC_1");
        mark_document_completed(&mut checkpoint, "DOC_1");
        assert_eq!(checkpoint.completed_documents, vec!["DOC_1".to_string()]);
    }

    #[test]
    fn mark_run_completed_sets_terminal_fields() {
        let mut checkpoint = Checkpoint::new(1);
        checkpoint.total_nodes_loaded = 42;
        checkpoint.total_relationships_loaded = 7;
        mark_run_completed(&mut checkpoint);
        assert_eq!(checkpoint.status, RunStatus::Completed);
        assert_eq!(checkpoint.final_nodes, Some(42));
        assert_eq!(checkpoint.final_relationships, Some(7));
        assert!(checkpoint.completion_time.is_some());
    }
}
