//! The closed node-type and relationship-type vocabulary enforced by the
//! extraction prompt (C4) and relied on by every downstream component.

/// The 19 node types the extraction prompt is allowed to emit.
pub const NODE_TYPES: &[&str] = &[
    "Gene",
    "Protein",
    "Disease",
    "Symptom",
    "Medication",
    "Anatomy",
    "Cell_Type",
    "Pathway",
    "Biomarker",
    "Mutation",
    "Treatment",
    "Procedure",
    "Clinical_Trial",
    "Study",
    "Organization",
    "Person",
    "Chemical",
    "Device",
    "Outcome",
];

/// The relationship types the extraction prompt is allowed to emit.
pub const RELATIONSHIP_TYPES: &[&str] = &[
    "TREATED_BY",
    "CAUSES",
    "ASSOCIATED_WITH",
    "EXPRESSED_IN",
    "INTERACTS_WITH",
    "INHIBITS",
    "ACTIVATES",
    "REGULATES",
    "BIOMARKER_FOR",
    "MUTATED_IN",
    "INDICATES",
    "PRESCRIBED_FOR",
    "PART_OF",
    "STUDIED_IN",
    "CONDUCTED_BY",
    "MEASURED_BY",
    "PRODUCES",
    "METABOLIZES",
    "CONTRAINDICATED_WITH",
    "CO_OCCURS_WITH",
    "DERIVED_FROM",
    "RESULTS_IN",
];

/// Node types whose identity depends on the organism under study.
pub const SPECIES_BEARING_TYPES: &[&str] = &["Gene", "Protein", "Anatomy", "Cell_Type"];

pub fn is_valid_node_type(t: &str) -> bool {
    NODE_TYPES.contains(&t)
}

pub fn is_valid_relationship_type(t: &str) -> bool {
    RELATIONSHIP_TYPES.contains(&t)
}

pub fn is_species_bearing(entity_type: &str) -> bool {
    SPECIES_BEARING_TYPES.contains(&entity_type)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn species_bearing_types_are_a_subset_of_node_types() {
        for t in SPECIES_BEARING_TYPES {
            assert!(is_valid_node_type(t), "{t} must be a declared node type");
        }
    }

    #[test]
    fn gene_is_species_bearing_but_disease_is_not() {
        assert!(is_species_bearing("Gene"));
        assert!(!is_species_bearing("Disease"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(!is_valid_node_type("Spaceship"));
        assert!(!is_valid_relationship_type("TELEPORTS_TO"));
    }
}
