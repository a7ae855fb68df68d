//! Chunk Orchestrator (C9): composes the LLM extractor, species policy,
//! standardizer, synonym resolver, and embedder for one window, and emits
//! the enriched batch the graph writer and JSON sink persist.

use std::collections::HashMap;
use std::sync::Arc;

use ferrumyx_common::models::{DocumentContext, EnrichedBatch, EnrichedNode, EnrichedRelationship, SpeciesConfidence};

use crate::embedder::{summary_string, Embedder};
use crate::llm::{extract, LlmBackend};
use crate::species;
use crate::standardizer::{self, MedicalNerClient, StandardInfo};
use crate::synonyms::{union_with_surface_form, UmlsResolver};

pub struct Orchestrator<'a> {
    pub llm_backend: &'a dyn LlmBackend,
    pub ner_client: Arc<dyn MedicalNerClient>,
    pub umls: &'a UmlsResolver,
    pub embedder: &'a dyn Embedder,
    pub min_confidence: f32,
    pub worker_pool_size: usize,
}

struct NodeAccumulator {
    entity_type: String,
    standard_name: String,
    description: String,
    surface_forms: Vec<String>,
    species: Option<String>,
    species_confidence: Option<SpeciesConfidence>,
}

impl<'a> Orchestrator<'a> {
    /// Run the full C9 algorithm for one chunk.
    pub async fn process_chunk(&self, chunk_text: &str, context: &DocumentContext) -> EnrichedBatch {
        // 1. Invoke C4 with retries.
        let mut extraction = extract(self.llm_backend, chunk_text, context).await;
        if extraction.entities.is_empty() && extraction.relationships.is_empty() {
            return EnrichedBatch::default();
        }

        // 2. Apply C8 to every raw entity.
        for entity in &mut extraction.entities {
            species::apply_to_entity(entity, context);
        }

        // 3. Invoke C5 in parallel over the unique (name, type) pairs.
        let mut unique_pairs: Vec<(String, String)> = Vec::new();
        let mut seen_pairs = std::collections::HashSet::new();
        for entity in &extraction.entities {
            let key = (entity.entity_name.clone(), entity.entity_type.clone());
            if seen_pairs.insert(key.clone()) {
                unique_pairs.push(key);
            }
        }

        let standard_infos: HashMap<(String, String), StandardInfo> = standardizer::standardize_batch(
            Arc::clone(&self.ner_client),
            &unique_pairs,
            self.min_confidence,
            self.worker_pool_size,
        )
        .await;

        for ((name, entity_type), info) in &standard_infos {
            tracing::info!(entity_name = name, entity_type, ontology_id = %info.ontology_id, "standardizer resolution");
        }

        // 4. Compute the final ontology_id per entity; build the endpoint map.
        let mut name_type_to_final_id: HashMap<(String, String), String> = HashMap::new();
        let mut accumulators: HashMap<String, NodeAccumulator> = HashMap::new();
        let mut final_id_order: Vec<String> = Vec::new();

        for entity in &extraction.entities {
            let key = (entity.entity_name.clone(), entity.entity_type.clone());
            let Some(info) = standard_infos.get(&key) else {
                continue;
            };
            let final_id = species::suffix_ontology_id(&info.ontology_id, &entity.entity_type, entity.species.as_deref());
            name_type_to_final_id.insert(key, final_id.clone());

            accumulators
                .entry(final_id.clone())
                .and_modify(|acc| acc.surface_forms.push(entity.entity_name.clone()))
                .or_insert_with(|| {
                    final_id_order.push(final_id.clone());
                    NodeAccumulator {
                        entity_type: entity.entity_type.clone(),
                        standard_name: info.standard_name.clone(),
                        description: info.description.clone(),
                        surface_forms: vec![entity.entity_name.clone()],
                        species: entity.species.clone(),
                        species_confidence: entity.species.as_ref().map(|_| context.species_confidence),
                    }
                });
        }

        // 5. Collect unique final IDs and invoke C6 once, batched.
        let surface_forms_for_resolver: HashMap<String, String> = final_id_order
            .iter()
            .filter_map(|id| accumulators.get(id).and_then(|acc| acc.surface_forms.first()).map(|s| (id.clone(), s.clone())))
            .collect();

        let resolved_synonyms = self.umls.resolve_batch(&final_id_order, &surface_forms_for_resolver).await;

        // 6. Build the EnrichedNode for each unique final ID.
        let mut nodes = Vec::with_capacity(final_id_order.len());
        for final_id in &final_id_order {
            let Some(acc) = accumulators.remove(final_id) else {
                continue;
            };
            let empty = Vec::new();
            let resolver_hits = resolved_synonyms.get(final_id).unwrap_or(&empty);
            let mut synonyms = Vec::new();
            for surface in &acc.surface_forms {
                for candidate in union_with_surface_form(surface, resolver_hits) {
                    if !synonyms.contains(&candidate) {
                        synonyms.push(candidate);
                    }
                }
            }

            let embedding = self.embedder.embed(&summary_string(&acc.standard_name, &acc.description));

            nodes.push(EnrichedNode {
                ontology_id: final_id.clone(),
                entity_type: acc.entity_type,
                standard_name: acc.standard_name,
                synonyms,
                description: acc.description,
                embedding,
                species: acc.species,
                species_confidence: acc.species_confidence,
                source_id: context.source_id.clone(),
            });
        }

        // 7. For each raw relationship, resolve endpoints and emit or drop.
        let mut relationships = Vec::with_capacity(extraction.relationships.len());
        for mut relationship in extraction.relationships {
            species::apply_to_relationship(&mut relationship, context);

            let source_key = (relationship.source_entity_name.clone(), relationship.source_entity_type.clone());
            let target_key = (relationship.target_entity_name.clone(), relationship.target_entity_type.clone());

            let (Some(source_id), Some(target_id)) =
                (name_type_to_final_id.get(&source_key), name_type_to_final_id.get(&target_key))
            else {
                tracing::debug!(
                    source = %relationship.source_entity_name,
                    target = %relationship.target_entity_name,
                    "dropping relationship with unresolved endpoint"
                );
                continue;
            };

            relationships.push(EnrichedRelationship {
                source_ontology_id: source_id.clone(),
                target_ontology_id: target_id.clone(),
                label: relationship.relation_type,
                evidence_text: relationship.relationship_description,
                species: relationship.species,
                species_confidence: relationship.species_confidence,
                source_id_ref: context.source_id.clone(),
            });
        }

        // 8. Return the enriched batch.
        EnrichedBatch { nodes, relationships }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_extraction_returns_empty_batch() {
        let batch = EnrichedBatch::default();
        assert!(batch.nodes.is_empty());
        assert!(batch.relationships.is_empty());
    }
}
