//! LLM Extraction Client (C4): invoke the backend with the extraction
//! prompt, parse `{entities, relationships}`, and recover truncated JSON.

use super::backend::LlmBackend;
use crate::retry::RetryPolicy;
use ferrumyx_common::error::FerrumyxError;
use ferrumyx_common::models::{DocumentContext, ExtractionResult};
use ferrumyx_common::vocab::{is_valid_node_type, is_valid_relationship_type, NODE_TYPES, RELATIONSHIP_TYPES, SPECIES_BEARING_TYPES};

const MAX_TOKENS: u32 = 8192;
const TEMPERATURE: f32 = 0.1;

fn build_prompt(chunk_text: &str, context: &DocumentContext) -> String {
    format!(
        "You are a biomedical information extraction system. Extract entities and relationships \
         from the text below into a single strict JSON object with exactly the keys \"entities\" \
         and \"relationships\" (empty arrays are fine).\n\n\
         Expand medical abbreviations to their full terms (e.g. \"MI\" -> \"myocardial infarction\", \
         \"HTN\" -> \"hypertension\").\n\n\
         Allowed entity types: {node_types}.\n\
         Allowed relationship types: {rel_types}.\n\n\
         For entities of type {species_bearing}, include a \"species\" field (scientific binomial). \
         For all other entity types, omit \"species\" entirely.\n\n\
         For every relationship, include \"species\" and \"species_confidence\" (one of \"explicit\", \
         \"inherited\", \"speculative\", \"unknown\"). If the chunk does not name an organism, default \
         species to \"{default_species}\" with species_confidence \"inherited\".\n\n\
         Document primary species: {default_species}\n\n\
         Text:\n{chunk_text}\n\n\
         Respond with only the JSON object, no commentary.",
        node_types = NODE_TYPES.join(", "),
        rel_types = RELATIONSHIP_TYPES.join(", "),
        species_bearing = SPECIES_BEARING_TYPES.join(", "),
        default_species = context.primary_species,
        chunk_text = chunk_text,
    )
}

/// Strip optional ```json fences surrounding a model response.
pub(crate) fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix("```json").or_else(|| trimmed.strip_prefix("```")).unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

/// Append missing closing brackets/braces so a truncated JSON object can be
/// re-parsed. Ignores characters inside string literals.
pub(crate) fn repair_truncated_json(text: &str) -> String {
    let mut stack = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => stack.push('}'),
            '[' => stack.push(']'),
            '}' | ']' => {
                stack.pop();
            }
            _ => {}
        }
    }

    let mut repaired = text.to_string();
    if in_string {
        repaired.push('"');
    }
    while let Some(closer) = stack.pop() {
        repaired.push(closer);
    }
    repaired
}

fn parse_extraction_json(raw: &str) -> Option<ExtractionResult> {
    let stripped = strip_code_fence(raw);
    if let Ok(result) = serde_json::from_str::<ExtractionResult>(stripped) {
        return Some(result);
    }
    let repaired = repair_truncated_json(stripped);
    serde_json::from_str::<ExtractionResult>(&repaired).ok()
}

fn filter_to_vocabulary(mut result: ExtractionResult) -> ExtractionResult {
    result.entities.retain(|e| is_valid_node_type(&e.entity_type));
    result.relationships.retain(|r| {
        is_valid_relationship_type(&r.relation_type)
            && is_valid_node_type(&r.source_entity_type)
            && is_valid_node_type(&r.target_entity_type)
    });
    result
}

/// Run the full C4 contract for one chunk: retry the backend call per the
/// LLM retry policy, then parse with bracket-repair. Never returns an error
/// to the caller — exhaustion or unparseable output both yield an empty
/// result, per §7.
pub async fn extract(
    backend: &dyn LlmBackend,
    chunk_text: &str,
    context: &DocumentContext,
) -> ExtractionResult {
    let prompt = build_prompt(chunk_text, context);
    let policy = RetryPolicy::llm();

    let response = policy
        .run(
            |_: &FerrumyxError| true,
            || backend.complete(&prompt, MAX_TOKENS, TEMPERATURE),
        )
        .await;

    let raw = match response {
        Ok(text) => text,
        Err(err) => {
            tracing::warn!(error = %err, "LLM extraction exhausted retry budget; chunk yields no data");
            return ExtractionResult::default();
        }
    };

    match parse_extraction_json(&raw) {
        Some(result) => filter_to_vocabulary(result),
        None => {
            let preview: String = raw.chars().take(200).collect();
            tracing::warn!(preview = %preview, "LLM output unparseable after bracket-repair; chunk yields no data");
            ExtractionResult::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn repairs_missing_closing_brace() {
        let truncated = r#"{"entities": [{"entity_name": "KRAS", "entity_type": "Gene", "entity_description": "d"}], "relationships": []"#;
        let repaired = repair_truncated_json(truncated);
        let parsed: ExtractionResult = serde_json::from_str(&repaired).expect("repaired JSON should parse");
        assert_eq!(parsed.entities.len(), 1);
    }

    #[test]
    fn well_formed_json_parses_without_repair() {
        let text = r#"{"entities": [], "relationships": []}"#;
        let parsed = parse_extraction_json(text).unwrap();
        assert!(parsed.entities.is_empty());
        assert!(parsed.relationships.is_empty());
    }

    #[test]
    fn entities_outside_vocabulary_are_dropped() {
        let result = ExtractionResult {
            entities: vec![
                ferrumyx_common::models::RawEntity {
                    entity_name: "Spaceship".into(),
                    entity_type: "Spaceship".into(),
                    entity_description: "not real".into(),
                    species: None,
                },
                ferrumyx_common::models::RawEntity {
                    entity_name: "KRAS".into(),
                    entity_type: "Gene".into(),
                    entity_description: "a gene".into(),
                    species: Some("Homo sapiens".into()),
                },
            ],
            relationships: vec![],
        };
        let filtered = filter_to_vocabulary(result);
        assert_eq!(filtered.entities.len(), 1);
        assert_eq!(filtered.entities[0].entity_name, "KRAS");
    }

    #[test]
    fn irrecoverable_garbage_yields_none() {
        assert!(parse_extraction_json("not json at all, no braces here").is_none());
    }
}
