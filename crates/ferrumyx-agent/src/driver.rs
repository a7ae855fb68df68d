//! Driver (C13): enumerate documents, load context, iterate chunks in
//! fixed-size batches, call the orchestrator, persist via the graph writer
//! and JSON sink, and update the checkpoint. Handles `--resume` and
//! cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ferrumyx_common::error::FerrumyxError;
use ferrumyx_common::models::Checkpoint;
use ferrumyx_pipeline::checkpoint::{mark_document_completed, mark_run_completed, CheckpointStore};
use ferrumyx_pipeline::chunker::{chunk_document, split_header, ChunkerConfig};
use ferrumyx_pipeline::config::PipelineDefaults;
use ferrumyx_pipeline::context::extract_context;
use ferrumyx_pipeline::graph::GraphWriter;
use ferrumyx_pipeline::llm::LlmBackend;
use ferrumyx_pipeline::orchestrator::Orchestrator;
use ferrumyx_pipeline::sink::JsonSink;
use ferrumyx_pipeline::standardizer::MedicalNerClient;
use ferrumyx_pipeline::synonyms::UmlsResolver;

use crate::corpus::CorpusDocument;

pub struct DriverConfig {
    pub batch_size: usize,
    pub test_mode: bool,
    pub checkpoint_path: String,
    pub sink_output_dir: String,
}

pub struct Driver<'a> {
    pub config: DriverConfig,
    pub llm_backend: &'a dyn LlmBackend,
    pub ner_client: Arc<dyn MedicalNerClient>,
    pub umls: &'a UmlsResolver,
    pub embedder: &'a dyn ferrumyx_pipeline::embedder::Embedder,
    pub graph: &'a GraphWriter,
}

/// Installed once; cooperative cancellation checked between chunks.
fn install_cancellation_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let flag_clone = Arc::clone(&flag);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("cancellation requested; finishing in-flight chunk, then checkpointing");
            flag_clone.store(true, Ordering::SeqCst);
        }
    });
    flag
}

impl<'a> Driver<'a> {
    pub async fn run(&self, documents: Vec<CorpusDocument>, resume: bool, start_chunk: Option<usize>) -> Result<(), FerrumyxError> {
        let checkpoint_store = CheckpointStore::new(&self.config.checkpoint_path);
        let sink = JsonSink::new(&self.config.sink_output_dir);
        let cancel = install_cancellation_flag();

        let mut checkpoint = if resume {
            checkpoint_store.load().await?.unwrap_or_else(|| Checkpoint::new(documents.len()))
        } else {
            Checkpoint::new(documents.len())
        };

        let chunk_cap = if self.config.test_mode {
            Some(PipelineDefaults::TEST_MODE_CHUNK_CAP)
        } else {
            None
        };

        let mut batch_number: u64 = 0;

        'documents: for document in &documents {
            if checkpoint.is_document_completed(&document.source_id) {
                continue;
            }

            let raw = tokio::fs::read_to_string(&document.path).await.map_err(|e| FerrumyxError::Other(e.into()))?;
            let (header, body) = split_header(&raw, PipelineDefaults::HEADER_LINES);

            tracing::info!(source_id = %document.source_id, "reading document context");
            let context = extract_context(self.llm_backend, &header, &document.source_id, &document.path.display().to_string()).await;
            self.graph.upsert_source(&context).await?;

            let mut chunks = chunk_document(&body, &ChunkerConfig::default());
            if let Some(cap) = chunk_cap {
                chunks.truncate(cap);
            }

            let resume_from = if checkpoint.current_document_id.as_deref() == Some(document.source_id.as_str()) {
                start_chunk.unwrap_or((checkpoint.last_processed_chunk + 1).max(0) as usize)
            } else {
                start_chunk.unwrap_or(0)
            };
            checkpoint.current_document_id = Some(document.source_id.clone());

            let remaining_chunks = &chunks[resume_from.min(chunks.len())..];

            for batch in remaining_chunks.chunks(self.config.batch_size.max(1)) {
                let start_time = Instant::now();
                let mut enriched_nodes = Vec::new();
                let mut enriched_relationships = Vec::new();

                for chunk in batch {
                    let orchestrator = Orchestrator {
                        llm_backend: self.llm_backend,
                        ner_client: Arc::clone(&self.ner_client),
                        umls: self.umls,
                        embedder: self.embedder,
                        min_confidence: PipelineDefaults::MIN_CONFIDENCE,
                        worker_pool_size: PipelineDefaults::STANDARDIZER_WORKERS,
                    };
                    let batch_result = orchestrator.process_chunk(&chunk.text, &context).await;
                    enriched_nodes.extend(batch_result.nodes);
                    enriched_relationships.extend(batch_result.relationships);
                }

                let enriched = ferrumyx_common::models::EnrichedBatch {
                    nodes: enriched_nodes,
                    relationships: enriched_relationships,
                };

                match self.graph.write_batch(&enriched).await {
                    Ok(()) => {
                        // The checkpoint cursor only advances after the graph commit
                        // succeeds; a failed commit below leaves it untouched so the
                        // next run re-executes this batch.
                        if let Some(last_chunk) = batch.last() {
                            checkpoint.last_processed_chunk = last_chunk.index as i64;
                        }
                        checkpoint.total_nodes_loaded += enriched.nodes.len() as u64;
                        checkpoint.total_relationships_loaded += enriched.relationships.len() as u64;

                        let first_index = batch.first().map(|c| c.index).unwrap_or(0);
                        let last_index = batch.last().map(|c| c.index + 1).unwrap_or(0);
                        sink.write_batch(batch_number, first_index..last_index, start_time.elapsed(), &enriched).await;
                        batch_number += 1;

                        checkpoint_store.save(&checkpoint).await?;
                    }
                    Err(err) => {
                        tracing::error!(error = %err, "graph commit failed; batch will be re-executed on the next run");
                    }
                }

                if cancel.load(Ordering::SeqCst) {
                    checkpoint_store.save(&checkpoint).await?;
                    break 'documents;
                }
            }

            if !cancel.load(Ordering::SeqCst) {
                mark_document_completed(&mut checkpoint, &document.source_id);
                checkpoint.current_document_id = None;
                checkpoint_store.save(&checkpoint).await?;
            }
        }

        if !cancel.load(Ordering::SeqCst) {
            mark_run_completed(&mut checkpoint);
            checkpoint_store.save(&checkpoint).await?;
        }

        Ok(())
    }
}
