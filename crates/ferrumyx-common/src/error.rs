use thiserror::Error;

/// Error taxonomy shared by every pipeline component.
///
/// Only [`FerrumyxError::Initialization`] is meant to propagate out of `main`.
/// Every other variant is caught at the component boundary that owns it and
/// converted into the degraded result the component contracts for (an empty
/// chunk, a fallback ontology ID, an empty synonym list, a skipped batch).
#[derive(Debug, Error)]
pub enum FerrumyxError {
    /// Missing credential, unreachable graph store, failed migration — fatal,
    /// raised before any document is processed.
    #[error("initialization failed: {0}")]
    Initialization(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("LLM call failed: {0}")]
    LlmTransient(String),

    #[error("medical-NER call failed: {0}")]
    MedicalNerTransient(String),

    #[error("UMLS query failed: {0}")]
    UmlsQuery(String),

    #[error("graph write failed: {0}")]
    GraphWrite(String),

    #[error("batch sink write failed: {0}")]
    JsonSink(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FerrumyxError>;
