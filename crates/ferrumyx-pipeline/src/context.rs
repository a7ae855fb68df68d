//! Document Context Extractor (C3): from the first N header lines, produce
//! bibliographic metadata, primary species, and study type via one LLM call.
//! Never fails past the driver — a parse failure yields the safe default.

use crate::llm::{repair_truncated_json, strip_code_fence, LlmBackend};
use crate::retry::RetryPolicy;
use ferrumyx_common::error::FerrumyxError;
use ferrumyx_common::models::{DocumentContext, SpeciesConfidence, StudyType};
use serde::Deserialize;

const MAX_TOKENS: u32 = 1024;
const TEMPERATURE: f32 = 0.0;

#[derive(Debug, Deserialize)]
struct RawContext {
    title: Option<String>,
    authors: Option<String>,
    journal: Option<String>,
    publication_year: Option<i32>,
    doi: Option<String>,
    primary_species: Option<String>,
    species_confidence: Option<String>,
    species_evidence: Option<String>,
    study_type: Option<String>,
}

fn build_prompt(header: &str) -> String {
    format!(
        "You are a biomedical document triage system. Read the header below (title, authors, \
         journal, abstract) and respond with a single strict JSON object with these keys: \
         \"title\", \"authors\", \"journal\", \"publication_year\" (integer or null), \"doi\" \
         (string or null), \"primary_species\" (scientific binomial, \"not specified\", or \
         \"<binomial> (implied)\"), \"species_confidence\" (\"high\", \"medium\", or \"low\"), \
         \"species_evidence\" (<=100 chars quoting the textual basis), \"study_type\" (one of \
         \"clinical trial\", \"animal study\", \"in vitro\", \"computational\", \"review\", \
         \"case report\", \"other\").\n\n\
         Header:\n{header}\n\n\
         Respond with only the JSON object, no commentary."
    )
}

fn parse_species_confidence(s: Option<&str>) -> SpeciesConfidence {
    match s.map(|v| v.to_lowercase()) {
        Some(ref v) if v == "high" => SpeciesConfidence::High,
        Some(ref v) if v == "medium" => SpeciesConfidence::Medium,
        _ => SpeciesConfidence::Low,
    }
}

fn parse_context_json(raw: &str, source_id: &str, document_path: &str) -> Option<DocumentContext> {
    let stripped = strip_code_fence(raw);
    let parsed: RawContext = serde_json::from_str(stripped)
        .or_else(|_| serde_json::from_str(&repair_truncated_json(stripped)))
        .ok()?;

    Some(DocumentContext {
        source_id: source_id.to_string(),
        title: parsed.title.unwrap_or_else(|| "Unknown".to_string()),
        authors: parsed.authors.unwrap_or_else(|| "Unknown".to_string()),
        journal: parsed.journal.unwrap_or_else(|| "Unknown".to_string()),
        publication_year: parsed.publication_year,
        doi: parsed.doi,
        primary_species: parsed.primary_species.unwrap_or_else(|| "not specified".to_string()),
        species_confidence: parse_species_confidence(parsed.species_confidence.as_deref()),
        species_evidence: parsed
            .species_evidence
            .map(|s| s.chars().take(100).collect())
            .unwrap_or_default(),
        study_type: parsed
            .study_type
            .map(|s| StudyType::from_str_loose(&s))
            .unwrap_or(StudyType::Other),
        source_type: "text".to_string(),
        source_platform: "corpus".to_string(),
        processing_date: chrono::Utc::now(),
        document_path: document_path.to_string(),
    })
}

/// Extract the document context from the header. Retries the LLM call per
/// the LLM retry policy; retry exhaustion or an unparseable response both
/// yield [`DocumentContext::fallback`].
pub async fn extract_context(
    backend: &dyn LlmBackend,
    header: &str,
    source_id: &str,
    document_path: &str,
) -> DocumentContext {
    let prompt = build_prompt(header);
    let policy = RetryPolicy::llm();

    let response = policy
        .run(|_: &FerrumyxError| true, || backend.complete(&prompt, MAX_TOKENS, TEMPERATURE))
        .await;

    let raw = match response {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, source_id, "document context LLM call exhausted retries; using fallback context");
            return DocumentContext::fallback(source_id, document_path);
        }
    };

    parse_context_json(&raw, source_id, document_path).unwrap_or_else(|| {
        tracing::warn!(source_id, "document context response unparseable; using fallback context");
        DocumentContext::fallback(source_id, document_path)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_context() {
        let raw = r#"{
            "title": "TP53 mutations in hepatocellular carcinoma",
            "authors": "Smith J, Doe A",
            "journal": "Nature Oncology",
            "publication_year": 2021,
            "doi": "10.1000/xyz",
            "primary_species": "Homo sapiens",
            "species_confidence": "high",
            "species_evidence": "human liver biopsy samples",
            "study_type": "clinical trial"
        }"#;
        let ctx = parse_context_json(raw, "DOC_1", "/tmp/doc1.txt").unwrap();
        assert_eq!(ctx.title, "TP53 mutations in hepatocellular carcinoma");
        assert_eq!(ctx.primary_species, "Homo sapiens");
        assert_eq!(ctx.species_confidence, SpeciesConfidence::High);
        assert_eq!(ctx.study_type, StudyType::ClinicalTrial);
    }

    #[test]
    fn unparseable_response_returns_none() {
        assert!(parse_context_json("garbage, not json", "DOC_1", "/tmp/doc1.txt").is_none());
    }

    #[test]
    fn fallback_context_has_safe_defaults() {
        let fallback = DocumentContext::fallback("DOC_1", "/tmp/doc1.txt");
        assert_eq!(fallback.primary_species, "not specified");
        assert_eq!(fallback.species_confidence, SpeciesConfidence::Low);
        assert_eq!(fallback.study_type, StudyType::Other);
        assert_eq!(fallback.title, "Unknown");
    }
}
