//! The enrichment pipeline: chunking, LLM extraction, standardization,
//! synonym resolution, embedding, species policy, orchestration, and
//! persistence (graph writer, JSON sink, checkpoint store).
//!
//! The driver binary (`ferrumyx-agent`) composes these components; this
//! crate contains no `main` and performs no argument parsing.

pub mod checkpoint;
pub mod chunker;
pub mod config;
pub mod context;
pub mod embedder;
pub mod graph;
pub mod llm;
pub mod orchestrator;
pub mod retry;
pub mod sink;
pub mod species;
pub mod standardizer;
pub mod synonyms;

pub use ferrumyx_common::{error, models, vocab};
