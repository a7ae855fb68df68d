//! Shared data model: the types that flow between components C2 through C13.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Document context (C3 output)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyType {
    ClinicalTrial,
    AnimalStudy,
    InVitro,
    Computational,
    Review,
    CaseReport,
    Other,
}

impl StudyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyType::ClinicalTrial => "clinical trial",
            StudyType::AnimalStudy => "animal study",
            StudyType::InVitro => "in vitro",
            StudyType::Computational => "computational",
            StudyType::Review => "review",
            StudyType::CaseReport => "case report",
            StudyType::Other => "other",
        }
    }

    pub fn from_str_loose(s: &str) -> StudyType {
        match s.trim().to_lowercase().as_str() {
            "clinical trial" | "clinical_trial" => StudyType::ClinicalTrial,
            "animal study" | "animal_study" => StudyType::AnimalStudy,
            "in vitro" | "in_vitro" => StudyType::InVitro,
            "computational" => StudyType::Computational,
            "review" => StudyType::Review,
            "case report" | "case_report" => StudyType::CaseReport,
            _ => StudyType::Other,
        }
    }
}

/// Bibliographic + species metadata produced once per document by the
/// Document Context Extractor (C3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContext {
    pub source_id: String,
    pub title: String,
    pub authors: String,
    pub journal: String,
    pub publication_year: Option<i32>,
    pub doi: Option<String>,
    /// Scientific binomial, `"not specified"`, or `"<binomial> (implied)"`.
    pub primary_species: String,
    pub species_confidence: SpeciesConfidence,
    /// Truncated to 100 chars.
    pub species_evidence: String,
    pub study_type: StudyType,
    pub source_type: String,
    pub source_platform: String,
    pub processing_date: DateTime<Utc>,
    pub document_path: String,
}

impl DocumentContext {
    /// The safe default returned by C3 when the LLM response can't be parsed.
    pub fn fallback(source_id: impl Into<String>, document_path: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            title: "Unknown".to_string(),
            authors: "Unknown".to_string(),
            journal: "Unknown".to_string(),
            publication_year: None,
            doi: None,
            primary_species: "not specified".to_string(),
            species_confidence: SpeciesConfidence::Low,
            species_evidence: String::new(),
            study_type: StudyType::Other,
            source_type: "text".to_string(),
            source_platform: "corpus".to_string(),
            processing_date: Utc::now(),
            document_path: document_path.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw LLM output (C4 output, transient)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipSpeciesConfidence {
    Explicit,
    Inherited,
    Speculative,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawEntity {
    pub entity_name: String,
    pub entity_type: String,
    pub entity_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub species: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRelationship {
    pub source_entity_name: String,
    pub source_entity_type: String,
    pub target_entity_name: String,
    pub target_entity_type: String,
    pub relation_type: String,
    pub relationship_description: String,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub species_confidence: Option<RelationshipSpeciesConfidence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub entities: Vec<RawEntity>,
    pub relationships: Vec<RawRelationship>,
}

// ---------------------------------------------------------------------------
// Enriched, persisted model (C9 output / C10 input)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedNode {
    pub ontology_id: String,
    pub entity_type: String,
    pub standard_name: String,
    pub synonyms: Vec<String>,
    pub description: String,
    pub embedding: Vec<f32>,
    pub species: Option<String>,
    pub species_confidence: Option<SpeciesConfidence>,
    pub source_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedRelationship {
    pub source_ontology_id: String,
    pub target_ontology_id: String,
    pub label: String,
    pub evidence_text: String,
    pub species: Option<String>,
    pub species_confidence: Option<RelationshipSpeciesConfidence>,
    pub source_id_ref: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrichedBatch {
    pub nodes: Vec<EnrichedNode>,
    pub relationships: Vec<EnrichedRelationship>,
}

// ---------------------------------------------------------------------------
// Checkpoint (C12)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub current_document_index: usize,
    pub current_document_id: Option<String>,
    pub total_documents: usize,
    pub completed_documents: Vec<String>,
    /// -1 = none processed yet within the current document.
    pub last_processed_chunk: i64,
    pub total_nodes_loaded: u64,
    pub total_relationships_loaded: u64,
    pub timestamp: DateTime<Utc>,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_nodes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_relationships: Option<u64>,
}

impl Checkpoint {
    pub fn new(total_documents: usize) -> Self {
        Self {
            current_document_index: 0,
            current_document_id: None,
            total_documents,
            completed_documents: Vec::new(),
            last_processed_chunk: -1,
            total_nodes_loaded: 0,
            total_relationships_loaded: 0,
            timestamp: Utc::now(),
            status: RunStatus::InProgress,
            completion_time: None,
            final_nodes: None,
            final_relationships: None,
        }
    }

    pub fn is_document_completed(&self, source_id: &str) -> bool {
        self.completed_documents.iter().any(|d| d == source_id)
    }
}
