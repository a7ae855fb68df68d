//! Batch/JSON Sink (C11): on each successful graph commit, serialize the
//! batch to a per-batch artifact. The artifact is a backup, not the system
//! of record — a write failure is logged and never rolls back the graph
//! commit.

use ferrumyx_common::models::EnrichedBatch;
use serde::Serialize;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct BatchStats {
    node_count: usize,
    relationship_count: usize,
}

#[derive(Serialize)]
struct BatchArtifact<'a> {
    batch_number: u64,
    chunk_range: (usize, usize),
    timestamp: chrono::DateTime<chrono::Utc>,
    processing_time_ms: u128,
    nodes: &'a [ferrumyx_common::models::EnrichedNode],
    relationships: &'a [ferrumyx_common::models::EnrichedRelationship],
    stats: BatchStats,
}

pub struct JsonSink {
    output_dir: PathBuf,
}

impl JsonSink {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    fn batch_path(&self, batch_number: u64) -> PathBuf {
        self.output_dir.join(format!("batch_{batch_number:04}.json"))
    }

    /// Write the per-batch artifact. Never returns an error to the caller —
    /// a write failure is logged and the graph commit it follows stands.
    pub async fn write_batch(
        &self,
        batch_number: u64,
        chunk_range: Range<usize>,
        processing_time: Duration,
        batch: &EnrichedBatch,
    ) {
        if let Err(err) = tokio::fs::create_dir_all(&self.output_dir).await {
            tracing::warn!(error = %err, dir = %self.output_dir.display(), "failed to create sink output directory");
            return;
        }

        let artifact = BatchArtifact {
            batch_number,
            chunk_range: (chunk_range.start, chunk_range.end),
            timestamp: chrono::Utc::now(),
            processing_time_ms: processing_time.as_millis(),
            nodes: &batch.nodes,
            relationships: &batch.relationships,
            stats: BatchStats {
                node_count: batch.nodes.len(),
                relationship_count: batch.relationships.len(),
            },
        };

        let path = self.batch_path(batch_number);
        match serde_json::to_vec_pretty(&artifact) {
            Ok(bytes) => {
                if let Err(err) = tokio::fs::write(&path, bytes).await {
                    tracing::warn!(error = %err, path = %path.display(), "failed to write batch artifact");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize batch artifact");
            }
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_path_is_zero_padded() {
        let sink = JsonSink::new("/tmp/does-not-matter");
        assert_eq!(sink.batch_path(3).file_name().unwrap(), "batch_0003.json");
        assert_eq!(sink.batch_path(12345).file_name().unwrap(), "batch_12345.json");
    }

    #[tokio::test]
    async fn write_batch_creates_output_directory_and_file() {
        let dir = std::env::temp_dir().join(format!("ferrumyx-sink-test-{}", std::process::id()));
        let sink = JsonSink::new(&dir);
        let batch = EnrichedBatch::default();
        sink.write_batch(1, 0..5, Duration::from_millis(42), &batch).await;
        let contents = tokio::fs::read_to_string(sink.batch_path(1)).await.expect("artifact should exist");
        assert!(contents.contains("\"batch_number\": 1"));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
