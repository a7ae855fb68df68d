//! Standardizer (C5): map (entity_name, entity_type) to a canonical
//! `{ontology_id, standard_name}` via dual medical-NER APIs with a
//! confidence gate and a deterministic fallback identifier, fanned out over
//! a bounded worker pool.

use async_trait::async_trait;
use ferrumyx_common::error::FerrumyxError;
use sha1::{Digest, Sha1};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::PipelineDefaults;
use crate::retry::RetryPolicy;

/// A single concept returned by a medical-NER endpoint.
#[derive(Debug, Clone)]
pub struct NerConcept {
    pub code: String,
    pub score: f32,
    pub description: String,
}

/// The two medical-NER endpoints required by C5. A concrete HTTP client
/// implements both against the same account.
#[async_trait]
pub trait MedicalNerClient: Send + Sync {
    async fn lookup_snomed(&self, clinical_sentence: &str) -> Result<Vec<NerConcept>, FerrumyxError>;
    async fn lookup_rxnorm(&self, clinical_sentence: &str) -> Result<Vec<NerConcept>, FerrumyxError>;
}

/// HTTP implementation backed by the two endpoints configured in
/// [`crate::config::MedicalNerConfig`].
pub struct HttpMedicalNerClient {
    snomed_url: String,
    rxnorm_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpMedicalNerClient {
    pub fn new(snomed_url: impl Into<String>, rxnorm_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            snomed_url: snomed_url.into(),
            rxnorm_url: rxnorm_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn call(&self, url: &str, text: &str) -> Result<Vec<NerConcept>, FerrumyxError> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({"text": text}))
            .send()
            .await
            .map_err(|e| FerrumyxError::MedicalNerTransient(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(FerrumyxError::MedicalNerTransient(format!(
                "medical-NER endpoint returned status {}",
                resp.status()
            )));
        }

        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| FerrumyxError::MedicalNerTransient(e.to_string()))?;

        let entities = json["entities"].as_array().cloned().unwrap_or_default();
        let mut concepts = Vec::new();
        for entity in entities {
            for concept in entity["ontologyLinks"].as_array().cloned().unwrap_or_default() {
                concepts.push(NerConcept {
                    code: concept["code"].as_str().unwrap_or_default().to_string(),
                    score: concept["score"].as_f64().unwrap_or(0.0) as f32,
                    description: entity["text"].as_str().unwrap_or_default().to_string(),
                });
            }
        }
        Ok(concepts)
    }
}

#[async_trait]
impl MedicalNerClient for HttpMedicalNerClient {
    async fn lookup_snomed(&self, clinical_sentence: &str) -> Result<Vec<NerConcept>, FerrumyxError> {
        self.call(&self.snomed_url, clinical_sentence).await
    }

    async fn lookup_rxnorm(&self, clinical_sentence: &str) -> Result<Vec<NerConcept>, FerrumyxError> {
        self.call(&self.rxnorm_url, clinical_sentence).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Api {
    Snomed,
    Rxnorm,
}

impl Api {
    fn prefix(self) -> &'static str {
        match self {
            Api::Snomed => "SNOMEDCT",
            Api::Rxnorm => "RXNORM",
        }
    }

    fn other(self) -> Api {
        match self {
            Api::Snomed => Api::Rxnorm,
            Api::Rxnorm => Api::Snomed,
        }
    }
}

/// Primary API selection by node type: Medication -> RxNorm, else SNOMED CT.
fn primary_api(entity_type: &str) -> Api {
    if entity_type == "Medication" {
        Api::Rxnorm
    } else {
        Api::Snomed
    }
}

/// A (small, representative) fallback abbreviation table. The LLM performs
/// primary expansion during extraction (C4); this table only backstops
/// abbreviations that survive into the standardizer unexpanded.
fn abbreviation_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| {
        HashMap::from([
            ("HTN", "hypertension"),
            ("MI", "myocardial infarction"),
            ("DM", "diabetes mellitus"),
            ("COPD", "chronic obstructive pulmonary disease"),
            ("CHF", "congestive heart failure"),
            ("CKD", "chronic kidney disease"),
            ("CVA", "cerebrovascular accident"),
            ("DVT", "deep vein thrombosis"),
            ("PE", "pulmonary embolism"),
            ("RA", "rheumatoid arthritis"),
            ("UTI", "urinary tract infection"),
            ("GERD", "gastroesophageal reflux disease"),
            ("AFib", "atrial fibrillation"),
            ("HF", "heart failure"),
            ("T2DM", "type 2 diabetes mellitus"),
            ("NSCLC", "non-small cell lung cancer"),
            ("HCC", "hepatocellular carcinoma"),
            ("PDAC", "pancreatic ductal adenocarcinoma"),
        ])
    })
}

fn expand_abbreviations(name: &str) -> String {
    match abbreviation_table().get(name) {
        Some(expanded) => expanded.to_string(),
        None => name.to_string(),
    }
}

/// Build the short clinical sentence the medical-NER APIs expect; isolated
/// terms are not submitted.
fn clinical_sentence(entity_type: &str, expanded_name: &str) -> String {
    match entity_type {
        "Disease" => format!("Patient diagnosed with {expanded_name}."),
        "Symptom" => format!("Patient reports {expanded_name}."),
        "Medication" => format!("Patient was prescribed {expanded_name}."),
        "Procedure" => format!("Patient underwent {expanded_name}."),
        "Biomarker" => format!("Laboratory testing showed {expanded_name}."),
        _ => format!("Clinical note mentions {expanded_name}."),
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn normalize_for_hash(name: &str) -> String {
    name.to_lowercase().chars().filter(|c| c.is_alphanumeric()).collect()
}

/// Deterministic fallback ID: `BIOGRAPH:<TYPE>:<first 12 hex of sha1(...)>`.
/// A pure function of (name, type).
pub fn fallback_id(entity_type: &str, name: &str) -> String {
    let normalized = normalize_for_hash(name);
    let mut hasher = Sha1::new();
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();
    let hex = hex_string(&digest)[..12].to_string();
    format!("BIOGRAPH:{}:{}", entity_type.to_uppercase(), hex)
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Result of standardizing one entity.
#[derive(Debug, Clone)]
pub struct StandardInfo {
    pub ontology_id: String,
    pub standard_name: String,
    pub description: String,
}

fn best_concept(concepts: &[NerConcept]) -> Option<&NerConcept> {
    concepts.iter().max_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal))
}

async fn call_api(client: &dyn MedicalNerClient, api: Api, sentence: &str) -> Result<Vec<NerConcept>, FerrumyxError> {
    let policy = RetryPolicy::medical_ner();
    policy
        .run(|_: &FerrumyxError| true, || async {
            match api {
                Api::Snomed => client.lookup_snomed(sentence).await,
                Api::Rxnorm => client.lookup_rxnorm(sentence).await,
            }
        })
        .await
}

/// Standardize one entity per the C5 algorithm (steps 1-6).
pub async fn standardize_entity(
    client: &dyn MedicalNerClient,
    entity_name: &str,
    entity_type: &str,
    min_confidence: f32,
) -> StandardInfo {
    let expanded = expand_abbreviations(entity_name);
    let sentence = clinical_sentence(entity_type, &expanded);
    let primary = primary_api(entity_type);

    for api in [primary, primary.other()] {
        match call_api(client, api, &sentence).await {
            Ok(concepts) => {
                if let Some(best) = best_concept(&concepts) {
                    if best.score >= min_confidence {
                        return StandardInfo {
                            ontology_id: format!("{}:{}", api.prefix(), best.code),
                            standard_name: title_case(&expanded),
                            description: best.description.clone(),
                        };
                    }
                }
            }
            Err(err) => {
                tracing::debug!(entity_name, ?api, error = %err, "medical-NER call exhausted retries");
            }
        }
    }

    tracing::info!(entity_name, entity_type, "standardizer fell through to deterministic fallback ID");
    StandardInfo {
        ontology_id: fallback_id(entity_type, entity_name),
        standard_name: title_case(entity_name),
        description: expanded,
    }
}

/// Standardize a chunk's entity list with a bounded worker pool (default 4).
/// Each worker is independent and isolated — a single entity's failure never
/// blocks the others. Returns a map keyed by (name, type).
pub async fn standardize_batch(
    client: Arc<dyn MedicalNerClient>,
    entities: &[(String, String)],
    min_confidence: f32,
    worker_pool_size: usize,
) -> HashMap<(String, String), StandardInfo> {
    let semaphore = Arc::new(Semaphore::new(worker_pool_size.max(1)));
    let mut set = tokio::task::JoinSet::new();

    for (name, entity_type) in entities.iter().cloned() {
        let client = Arc::clone(&client);
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore not closed");
            let info = standardize_entity(client.as_ref(), &name, &entity_type, min_confidence).await;
            ((name, entity_type), info)
        });
    }

    let mut results = HashMap::with_capacity(entities.len());
    while let Some(joined) = set.join_next().await {
        if let Ok((key, info)) = joined {
            results.insert(key, info);
        }
    }
    results
}

pub const DEFAULT_WORKER_POOL_SIZE: usize = PipelineDefaults::STANDARDIZER_WORKERS;
pub const DEFAULT_MIN_CONFIDENCE: f32 = PipelineDefaults::MIN_CONFIDENCE;

#[cfg(test)]
mod tests {
    use super::*;

    struct MockClient {
        snomed: Vec<NerConcept>,
        rxnorm: Vec<NerConcept>,
    }

    #[async_trait]
    impl MedicalNerClient for MockClient {
        async fn lookup_snomed(&self, _sentence: &str) -> Result<Vec<NerConcept>, FerrumyxError> {
            Ok(self.snomed.clone())
        }
        async fn lookup_rxnorm(&self, _sentence: &str) -> Result<Vec<NerConcept>, FerrumyxError> {
            Ok(self.rxnorm.clone())
        }
    }

    #[test]
    fn fallback_id_is_deterministic() {
        let a = fallback_id("Disease", "zzzfictionalosis");
        let b = fallback_id("Disease", "zzzfictionalosis");
        assert_eq!(a, b);
        assert!(a.starts_with("BIOGRAPH:DISEASE:"));
        assert_eq!(a.len(), "BIOGRAPH:DISEASE:".len() + 12);
    }

    #[test]
    fn fallback_id_ignores_case_and_punctuation() {
        assert_eq!(fallback_id("Disease", "Zzzfictionalosis"), fallback_id("Disease", "zzzfictionalosis"));
        assert_eq!(fallback_id("Disease", "zzz-fictionalosis!"), fallback_id("Disease", "zzzfictionalosis"));
    }

    #[test]
    fn primary_api_routes_medication_to_rxnorm() {
        assert_eq!(primary_api("Medication"), Api::Rxnorm);
        assert_eq!(primary_api("Disease"), Api::Snomed);
    }

    #[tokio::test]
    async fn accepts_high_confidence_primary_concept() {
        let client = MockClient {
            snomed: vec![NerConcept {
                code: "38341003".into(),
                score: 0.92,
                description: "Hypertension".into(),
            }],
            rxnorm: vec![],
        };
        let info = standardize_entity(&client, "hypertension", "Disease", 0.75).await;
        assert_eq!(info.ontology_id, "SNOMEDCT:38341003");
    }

    #[tokio::test]
    async fn falls_through_to_secondary_api_on_low_confidence() {
        let client = MockClient {
            snomed: vec![NerConcept {
                code: "1".into(),
                score: 0.5,
                description: "low confidence".into(),
            }],
            rxnorm: vec![NerConcept {
                code: "5640".into(),
                score: 0.9,
                description: "lisinopril".into(),
            }],
        };
        let info = standardize_entity(&client, "lisinopril", "Medication", 0.75).await;
        assert_eq!(info.ontology_id, "RXNORM:5640");
    }

    #[tokio::test]
    async fn both_apis_failing_yields_fallback_id() {
        let client = MockClient {
            snomed: vec![],
            rxnorm: vec![],
        };
        let info = standardize_entity(&client, "zzzfictionalosis", "Disease", 0.75).await;
        assert_eq!(info.ontology_id, fallback_id("Disease", "zzzfictionalosis"));
        assert_eq!(info.standard_name, "Zzzfictionalosis");
    }

    #[tokio::test]
    async fn batch_standardizes_every_entity_independently() {
        let client: Arc<dyn MedicalNerClient> = Arc::new(MockClient {
            snomed: vec![NerConcept {
                code: "38341003".into(),
                score: 0.95,
                description: "Hypertension".into(),
            }],
            rxnorm: vec![],
        });
        let entities = vec![
            ("hypertension".to_string(), "Disease".to_string()),
            ("fever".to_string(), "Symptom".to_string()),
        ];
        let results = standardize_batch(client, &entities, 0.75, 4).await;
        assert_eq!(results.len(), 2);
    }
}
