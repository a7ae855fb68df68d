//! CLI surface (spec §6, ambient stack §10.4).

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "ferrumyx", about = "Biomedical literature enrichment pipeline")]
pub struct Cli {
    /// Resume from the last checkpoint.
    #[arg(long)]
    pub resume: bool,

    /// Resume within the current document at this chunk index.
    #[arg(long)]
    pub start_chunk: Option<usize>,

    /// Cap the per-document chunk count (default behavior).
    #[arg(long, conflicts_with = "full_run")]
    pub test_mode: bool,

    /// Process every chunk of every document.
    #[arg(long)]
    pub full_run: bool,

    /// Number of chunks committed per batch.
    #[arg(long, default_value_t = ferrumyx_pipeline::config::PipelineDefaults::BATCH_SIZE)]
    pub batch_size: usize,

    /// Corpus directory to scan for documents.
    #[arg(long, default_value = "data_corpus/")]
    pub data_directory: String,

    /// Process exactly one file instead of scanning the corpus directory.
    #[arg(long)]
    pub single_document: Option<String>,

    /// Use a local OpenAI-compatible server (e.g. LM Studio) instead of the hosted LLM.
    #[arg(long, env = "USE_LM_STUDIO")]
    pub use_lm_studio: bool,

    /// Base URL of the local LM Studio server.
    #[arg(long, env = "LM_STUDIO_URL")]
    pub lm_studio_url: Option<String>,
}

impl Cli {
    /// Whether the run is capped to the test-mode chunk limit. `--test-mode`
    /// is the default; `--full-run` removes the cap.
    pub fn is_test_mode(&self) -> bool {
        !self.full_run
    }
}
