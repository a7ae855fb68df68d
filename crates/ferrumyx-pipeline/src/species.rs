//! Species Policy (C8): classify node types as species-bearing or not;
//! stamp species/confidence on raw entities and relationships; derive
//! species-suffixed identities for species-bearing nodes.

use ferrumyx_common::models::{DocumentContext, RawEntity, RawRelationship, RelationshipSpeciesConfidence};
use ferrumyx_common::vocab::is_species_bearing;

/// Ensure species-bearing entities carry a species (copied from the document
/// context if absent); species-agnostic entities never carry one.
pub fn apply_to_entity(entity: &mut RawEntity, context: &DocumentContext) {
    if is_species_bearing(&entity.entity_type) {
        if entity.species.is_none() {
            entity.species = Some(context.primary_species.clone());
        }
    } else {
        entity.species = None;
    }
}

/// Default unset relationship species to the document's primary species
/// with `inherited` confidence; leave explicit values untouched.
pub fn apply_to_relationship(relationship: &mut RawRelationship, context: &DocumentContext) {
    if relationship.species.is_none() {
        relationship.species = Some(context.primary_species.clone());
        relationship.species_confidence = Some(RelationshipSpeciesConfidence::Inherited);
    } else if relationship.species_confidence.is_none() {
        relationship.species_confidence = Some(RelationshipSpeciesConfidence::Unknown);
    }
}

/// Normalize a binomial for use as an identity suffix: spaces become
/// underscores, parentheses are stripped.
fn normalize_binomial(species: &str) -> String {
    species.chars().filter(|c| *c != '(' && *c != ')').collect::<String>().trim().replace(' ', "_")
}

/// Append the species suffix to a base ontology_id for species-bearing
/// types, unless the suffix is already present. Species-agnostic types and
/// a missing/unspecified species pass the base ID through unchanged.
pub fn suffix_ontology_id(base_id: &str, entity_type: &str, species: Option<&str>) -> String {
    if !is_species_bearing(entity_type) {
        return base_id.to_string();
    }
    let Some(species) = species else {
        return base_id.to_string();
    };
    if species == "not specified" {
        return base_id.to_string();
    }

    let normalized = normalize_binomial(species);
    if normalized.is_empty() || base_id.ends_with(&format!("_{normalized}")) {
        return base_id.to_string();
    }
    format!("{base_id}_{normalized}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrumyx_common::models::SpeciesConfidence;

    fn context() -> DocumentContext {
        DocumentContext {
            source_id: "DOC_1".into(),
            title: "t".into(),
            authors: "a".into(),
            journal: "j".into(),
            publication_year: None,
            doi: None,
            primary_species: "Mus musculus".into(),
            species_confidence: SpeciesConfidence::High,
            species_evidence: String::new(),
            study_type: ferrumyx_common::models::StudyType::Other,
            source_type: "text".into(),
            source_platform: "corpus".into(),
            processing_date: chrono::Utc::now(),
            document_path: "/tmp/doc1.txt".into(),
        }
    }

    fn entity(entity_type: &str, species: Option<&str>) -> RawEntity {
        RawEntity {
            entity_name: "Trp53".into(),
            entity_type: entity_type.into(),
            entity_description: "d".into(),
            species: species.map(String::from),
        }
    }

    #[test]
    fn species_bearing_entity_without_species_inherits_document_species() {
        let mut e = entity("Gene", None);
        apply_to_entity(&mut e, &context());
        assert_eq!(e.species.as_deref(), Some("Mus musculus"));
    }

    #[test]
    fn species_bearing_entity_with_explicit_species_is_unchanged() {
        let mut e = entity("Gene", Some("Homo sapiens"));
        apply_to_entity(&mut e, &context());
        assert_eq!(e.species.as_deref(), Some("Homo sapiens"));
    }

    #[test]
    fn species_agnostic_entity_never_carries_species() {
        let mut e = entity("Disease", Some("Homo sapiens"));
        apply_to_entity(&mut e, &context());
        assert_eq!(e.species, None);
    }

    #[test]
    fn relationship_without_species_inherits_document_species() {
        let mut r = RawRelationship {
            source_entity_name: "a".into(),
            source_entity_type: "Gene".into(),
            target_entity_name: "b".into(),
            target_entity_type: "Disease".into(),
            relation_type: "ASSOCIATED_WITH".into(),
            relationship_description: "d".into(),
            species: None,
            species_confidence: None,
        };
        apply_to_relationship(&mut r, &context());
        assert_eq!(r.species.as_deref(), Some("Mus musculus"));
        assert_eq!(r.species_confidence, Some(RelationshipSpeciesConfidence::Inherited));
    }

    #[test]
    fn suffix_appends_normalized_binomial_for_species_bearing_types() {
        let id = suffix_ontology_id("SNOMEDCT:123", "Gene", Some("Homo sapiens"));
        assert_eq!(id, "SNOMEDCT:123_Homo_sapiens");
    }

    #[test]
    fn suffix_strips_parentheses_and_normalizes_whitespace() {
        let id = suffix_ontology_id("SNOMEDCT:123", "Gene", Some("Mus musculus (implied)"));
        assert_eq!(id, "SNOMEDCT:123_Mus_musculus_implied");
    }

    #[test]
    fn suffix_is_not_doubled_if_already_present() {
        let first = suffix_ontology_id("SNOMEDCT:123", "Gene", Some("Homo sapiens"));
        let second = suffix_ontology_id(&first, "Gene", Some("Homo sapiens"));
        assert_eq!(first, second);
    }

    #[test]
    fn species_agnostic_types_are_never_suffixed() {
        let id = suffix_ontology_id("SNOMEDCT:123", "Disease", Some("Homo sapiens"));
        assert_eq!(id, "SNOMEDCT:123");
    }

    #[test]
    fn unspecified_species_does_not_suffix() {
        let id = suffix_ontology_id("SNOMEDCT:123", "Gene", Some("not specified"));
        assert_eq!(id, "SNOMEDCT:123");
    }
}
