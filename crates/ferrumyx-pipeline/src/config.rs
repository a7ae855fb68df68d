//! Environment-driven configuration. Credentials and endpoints are read once
//! at process start (§9 "Global configuration"); a missing required variable
//! is a fatal `Initialization` error raised before any corpus scan or
//! connection pool is built.

use ferrumyx_common::error::FerrumyxError;

fn required(name: &str) -> Result<String, FerrumyxError> {
    std::env::var(name).map_err(|_| {
        FerrumyxError::Initialization(format!("missing required environment variable: {name}"))
    })
}

fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Connection strings for the two Postgres-backed stores.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Graph store: nodes/edges/sources, pgvector embeddings.
    pub graph_database_url: String,
    /// UMLS mirror: `mrconso`.
    pub umls_database_url: String,
}

/// Credentials for the two medical-NER endpoints (C5).
#[derive(Debug, Clone)]
pub struct MedicalNerConfig {
    pub api_key: String,
    pub snomed_url: String,
    pub rxnorm_url: String,
}

/// Credentials for the two LLM backends (C4).
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Hosted chat-completion backend.
    pub hosted_api_key: String,
    pub hosted_base_url: String,
    pub hosted_model: String,
    /// Local OpenAI-compatible server (e.g. LM Studio). Populated only if
    /// the corresponding environment variable / `--lm-studio-url` flag is set.
    pub lm_studio_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub medical_ner: MedicalNerConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Load configuration from the process environment. `.env` (if present)
    /// has already been merged into the environment by the caller via
    /// `dotenvy::dotenv()` before this is invoked.
    pub fn from_env() -> Result<Self, FerrumyxError> {
        let store = StoreConfig {
            graph_database_url: required("DATABASE_URL")?,
            umls_database_url: required("UMLS_DATABASE_URL")?,
        };

        let medical_ner = MedicalNerConfig {
            api_key: required("MEDICAL_NER_API_KEY")?,
            snomed_url: required("MEDICAL_NER_SNOMED_URL")?,
            rxnorm_url: required("MEDICAL_NER_RXNORM_URL")?,
        };

        let llm = LlmConfig {
            hosted_api_key: required("LLM_API_KEY")?,
            hosted_base_url: required("LLM_BASE_URL")?,
            hosted_model: required("LLM_MODEL")?,
            lm_studio_url: optional("LM_STUDIO_URL"),
        };

        Ok(Self {
            store,
            medical_ner,
            llm,
        })
    }
}

/// Non-secret tunables. These are overridden by CLI flags, never by
/// additional environment variables — behavior and secrets are kept on
/// separate configuration surfaces.
#[derive(Debug, Clone)]
pub struct PipelineDefaults;

impl PipelineDefaults {
    pub const HEADER_LINES: usize = 75;
    pub const CHUNK_MAX_TOKENS: usize = 512;
    pub const CHUNK_OVERLAP_TOKENS: usize = 20;
    pub const MIN_CONFIDENCE: f32 = 0.75;
    pub const STANDARDIZER_WORKERS: usize = 4;
    pub const LLM_RETRIES: u32 = 3;
    pub const LLM_INITIAL_DELAY_MS: u64 = 2_000;
    pub const LLM_BACKOFF_FACTOR: f64 = 2.0;
    pub const MEDICAL_NER_RETRIES: u32 = 2;
    pub const MEDICAL_NER_INITIAL_DELAY_MS: u64 = 1_000;
    pub const MEDICAL_NER_BACKOFF_FACTOR: f64 = 2.0;
    pub const MAX_SYNONYMS: usize = 20;
    pub const BATCH_SIZE: usize = 5;
    pub const TEST_MODE_CHUNK_CAP: usize = 10;
    pub const EMBEDDING_DIM: usize = 384;
}
