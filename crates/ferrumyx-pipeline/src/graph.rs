//! Graph Writer (C10): idempotent upsert of Source, entity nodes (dynamic
//! labels via an `entity_type` column), `EXTRACTED_FROM` edges, and typed
//! evidence edges, on top of PostgreSQL.

use ferrumyx_common::error::FerrumyxError;
use ferrumyx_common::models::{DocumentContext, EnrichedBatch};
use pgvector::Vector;
use sqlx::PgPool;

/// Postgres-backed graph store. One pool for the process lifetime (spec §5:
/// "one graph-DB connection pool").
pub struct GraphWriter {
    pool: PgPool,
}

impl GraphWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Merge on `source_id`; set all DocumentContext fields. Must precede
    /// any node load from that source.
    pub async fn upsert_source(&self, context: &DocumentContext) -> Result<(), FerrumyxError> {
        sqlx::query(
            r#"
            INSERT INTO sources
                (source_id, title, authors, journal, publication_year, doi,
                 primary_species, species_confidence, species_evidence, study_type,
                 source_type, source_platform, processing_date, document_path)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
            ON CONFLICT (source_id) DO UPDATE SET
                title = EXCLUDED.title,
                authors = EXCLUDED.authors,
                journal = EXCLUDED.journal,
                publication_year = EXCLUDED.publication_year,
                doi = EXCLUDED.doi,
                primary_species = EXCLUDED.primary_species,
                species_confidence = EXCLUDED.species_confidence,
                species_evidence = EXCLUDED.species_evidence,
                study_type = EXCLUDED.study_type,
                source_type = EXCLUDED.source_type,
                source_platform = EXCLUDED.source_platform,
                processing_date = EXCLUDED.processing_date,
                document_path = EXCLUDED.document_path
            "#,
        )
        .bind(&context.source_id)
        .bind(&context.title)
        .bind(&context.authors)
        .bind(&context.journal)
        .bind(context.publication_year)
        .bind(&context.doi)
        .bind(&context.primary_species)
        .bind(serde_json::to_string(&context.species_confidence).unwrap_or_default())
        .bind(&context.species_evidence)
        .bind(context.study_type.as_str())
        .bind(&context.source_type)
        .bind(&context.source_platform)
        .bind(context.processing_date)
        .bind(&context.document_path)
        .execute(&self.pool)
        .await
        .map_err(|e| FerrumyxError::GraphWrite(e.to_string()))?;

        Ok(())
    }

    /// Persist one enriched batch: nodes precede relationships (required by
    /// the endpoint-match contract). Re-running a batch must not create
    /// duplicate nodes, `EXTRACTED_FROM` edges, or typed edges of the same
    /// type between the same endpoints.
    pub async fn write_batch(&self, batch: &EnrichedBatch) -> Result<(), FerrumyxError> {
        let mut tx = self.pool.begin().await.map_err(FerrumyxError::Database)?;

        for node in &batch.nodes {
            let embedding = Vector::from(node.embedding.clone());
            let species_confidence = node.species_confidence.map(|c| serde_json::to_string(&c).unwrap_or_default());

            let node_id: (i64,) = sqlx::query_as(
                r#"
                INSERT INTO nodes (ontology_id, entity_type, standard_name, synonyms, description, embedding, species, species_confidence)
                VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
                ON CONFLICT (ontology_id) DO UPDATE SET
                    standard_name = EXCLUDED.standard_name,
                    synonyms = (SELECT array_agg(DISTINCT x) FROM unnest(nodes.synonyms || EXCLUDED.synonyms) x),
                    description = EXCLUDED.description,
                    embedding = EXCLUDED.embedding,
                    species = COALESCE(EXCLUDED.species, nodes.species),
                    species_confidence = COALESCE(EXCLUDED.species_confidence, nodes.species_confidence),
                    entity_type = nodes.entity_type
                RETURNING id
                "#,
            )
            .bind(&node.ontology_id)
            .bind(&node.entity_type)
            .bind(&node.standard_name)
            .bind(&node.synonyms)
            .bind(&node.description)
            .bind(embedding)
            .bind(&node.species)
            .bind(species_confidence)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| FerrumyxError::GraphWrite(e.to_string()))?;

            let source_row: Option<(i64,)> = sqlx::query_as("SELECT id FROM sources WHERE source_id = $1")
                .bind(&node.source_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| FerrumyxError::GraphWrite(e.to_string()))?;

            match source_row {
                Some((source_row_id,)) => {
                    sqlx::query(
                        r#"
                        INSERT INTO extracted_from_edges (node_id, source_row_id, extraction_date)
                        VALUES ($1, $2, NOW())
                        ON CONFLICT (node_id, source_row_id) DO NOTHING
                        "#,
                    )
                    .bind(node_id.0)
                    .bind(source_row_id)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| FerrumyxError::GraphWrite(e.to_string()))?;
                }
                None => {
                    tracing::warn!(source_id = %node.source_id, ontology_id = %node.ontology_id, "no Source row found for node; EXTRACTED_FROM edge not created");
                }
            }
        }

        for relationship in &batch.relationships {
            let species_confidence = relationship.species_confidence.map(|c| serde_json::to_string(&c).unwrap_or_default());

            sqlx::query(
                r#"
                INSERT INTO edges (source_ontology_id, target_ontology_id, relation_type, evidence_text, species, species_confidence, source_id_ref)
                VALUES ($1,$2,$3,$4,$5,$6,$7)
                ON CONFLICT (source_ontology_id, target_ontology_id, relation_type) DO UPDATE SET
                    evidence_text = EXCLUDED.evidence_text,
                    species = EXCLUDED.species,
                    species_confidence = EXCLUDED.species_confidence,
                    source_id_ref = EXCLUDED.source_id_ref
                "#,
            )
            .bind(&relationship.source_ontology_id)
            .bind(&relationship.target_ontology_id)
            .bind(&relationship.label)
            .bind(&relationship.evidence_text)
            .bind(&relationship.species)
            .bind(species_confidence)
            .bind(&relationship.source_id_ref)
            .execute(&mut *tx)
            .await
            .map_err(|e| FerrumyxError::GraphWrite(e.to_string()))?;
        }

        tx.commit().await.map_err(FerrumyxError::Database)?;
        Ok(())
    }
}
