//! Synonym Resolver (C6): enrich each node with up to
//! [`MAX_SYNONYMS`](crate::config::PipelineDefaults::MAX_SYNONYMS) synonyms
//! from a local UMLS mirror (`mrconso`), batched per chunk by code system.

use ferrumyx_common::error::FerrumyxError;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::config::PipelineDefaults;

const MAX_SYNONYMS: i64 = PipelineDefaults::MAX_SYNONYMS as i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSystem {
    Snomed,
    Rxnorm,
    Biograph,
    Other,
}

fn classify(ontology_id: &str) -> CodeSystem {
    if ontology_id.starts_with("SNOMEDCT:") {
        CodeSystem::Snomed
    } else if ontology_id.starts_with("RXNORM:") {
        CodeSystem::Rxnorm
    } else if ontology_id.starts_with("BIOGRAPH:") {
        CodeSystem::Biograph
    } else {
        CodeSystem::Other
    }
}

fn code_part(ontology_id: &str) -> &str {
    ontology_id.split_once(':').map(|(_, rest)| rest).unwrap_or(ontology_id)
}

/// A UMLS mirror connection. Access is serialized (spec §5: "one UMLS DB
/// connection, single cursor is acceptable").
pub struct UmlsResolver {
    pool: PgPool,
}

impl UmlsResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve synonyms for every unique ontology ID produced by a chunk.
    /// Any failure rolls back its own transaction and yields an empty list
    /// for the affected IDs rather than aborting the chunk.
    pub async fn resolve_batch(
        &self,
        ontology_ids: &[String],
        surface_forms: &HashMap<String, String>,
    ) -> HashMap<String, Vec<String>> {
        let mut results = HashMap::with_capacity(ontology_ids.len());

        let mut snomed = Vec::new();
        let mut rxnorm = Vec::new();
        let mut other = Vec::new();

        for id in ontology_ids {
            match classify(id) {
                CodeSystem::Snomed => snomed.push(id.clone()),
                CodeSystem::Rxnorm => rxnorm.push(id.clone()),
                CodeSystem::Biograph => {
                    results.insert(id.clone(), Vec::new());
                }
                CodeSystem::Other => other.push(id.clone()),
            }
        }

        if !snomed.is_empty() {
            match self.resolve_by_code(&snomed, "SNOMEDCT_US").await {
                Ok(found) => results.extend(found),
                Err(err) => {
                    tracing::warn!(error = %err, "SNOMED synonym batch failed; returning empty for this code system");
                    results.extend(snomed.into_iter().map(|id| (id, Vec::new())));
                }
            }
        }

        if !rxnorm.is_empty() {
            match self.resolve_by_code(&rxnorm, "RXNORM").await {
                Ok(found) => results.extend(found),
                Err(err) => {
                    tracing::warn!(error = %err, "RxNorm synonym batch failed; returning empty for this code system");
                    results.extend(rxnorm.into_iter().map(|id| (id, Vec::new())));
                }
            }
        }

        for id in other {
            let surface = surface_forms.get(&id).map(|s| s.as_str());
            let synonyms = match self.resolve_other(&id, surface).await {
                Ok(found) => found,
                Err(err) => {
                    tracing::warn!(ontology_id = %id, error = %err, "synonym resolution fell back to text search and still failed");
                    Vec::new()
                }
            };
            results.insert(id, synonyms);
        }

        results
    }

    /// Resolve CUIs for a batch of (SAB, code) pairs, then fetch surface
    /// forms for the union of CUIs in one query, grouped back by code.
    async fn resolve_by_code(&self, ids: &[String], sab: &str) -> Result<HashMap<String, Vec<String>>, FerrumyxError> {
        let mut tx = self.pool.begin().await.map_err(FerrumyxError::Database)?;

        let codes: Vec<&str> = ids.iter().map(|id| code_part(id)).collect();

        let cui_rows: Vec<(String, String)> = match sqlx::query_as(
            r#"
            SELECT DISTINCT code, cui
            FROM mrconso
            WHERE sab = $1 AND code = ANY($2) AND suppress = 'N'
            "#,
        )
        .bind(sab)
        .bind(&codes as &[&str])
        .fetch_all(&mut *tx)
        .await
        {
            Ok(rows) => rows,
            Err(err) => {
                tx.rollback().await.ok();
                return Err(FerrumyxError::UmlsQuery(err.to_string()));
            }
        };

        let cuis: Vec<String> = cui_rows.iter().map(|(_, cui)| cui.clone()).collect();
        let code_to_cui: HashMap<&str, &str> = cui_rows.iter().map(|(code, cui)| (code.as_str(), cui.as_str())).collect();

        let term_rows: Vec<(String, String)> = if cuis.is_empty() {
            Vec::new()
        } else {
            match sqlx::query_as(
                r#"
                SELECT cui, str
                FROM mrconso
                WHERE cui = ANY($1) AND lat = 'ENG' AND suppress = 'N'
                ORDER BY (tty = 'PT') DESC, length(str) ASC
                "#,
            )
            .bind(&cuis)
            .fetch_all(&mut *tx)
            .await
            {
                Ok(rows) => rows,
                Err(err) => {
                    tx.rollback().await.ok();
                    return Err(FerrumyxError::UmlsQuery(err.to_string()));
                }
            }
        };

        tx.commit().await.map_err(FerrumyxError::Database)?;

        let mut by_cui: HashMap<&str, Vec<String>> = HashMap::new();
        for (cui, term) in &term_rows {
            by_cui.entry(cui.as_str()).or_default().push(term.clone());
        }

        let mut results = HashMap::with_capacity(ids.len());
        for id in ids {
            let code = code_part(id);
            let synonyms = code_to_cui
                .get(code)
                .and_then(|cui| by_cui.get(*cui))
                .map(|terms| terms.iter().take(MAX_SYNONYMS as usize).cloned().collect())
                .unwrap_or_default();
            results.insert(id.clone(), synonyms);
        }
        Ok(results)
    }

    /// Direct CUI lookup for an unrecognized ontology ID; falls back to text
    /// search against the surface form when that yields nothing.
    async fn resolve_other(&self, ontology_id: &str, surface: Option<&str>) -> Result<Vec<String>, FerrumyxError> {
        let code = code_part(ontology_id);

        let mut tx = self.pool.begin().await.map_err(FerrumyxError::Database)?;

        let direct: Vec<String> = match sqlx::query_scalar(
            r#"
            SELECT str FROM mrconso
            WHERE cui = $1 AND lat = 'ENG' AND suppress = 'N'
            ORDER BY (tty = 'PT') DESC, length(str) ASC
            LIMIT $2
            "#,
        )
        .bind(code)
        .bind(MAX_SYNONYMS)
        .fetch_all(&mut *tx)
        .await
        {
            Ok(rows) => rows,
            Err(err) => {
                tx.rollback().await.ok();
                return Err(FerrumyxError::UmlsQuery(err.to_string()));
            }
        };

        if !direct.is_empty() {
            tx.commit().await.map_err(FerrumyxError::Database)?;
            return Ok(direct);
        }

        let synonyms = match surface {
            Some(surface) => self.text_search(&mut tx, surface).await,
            None => Ok(Vec::new()),
        };

        match synonyms {
            Ok(found) => {
                tx.commit().await.map_err(FerrumyxError::Database)?;
                Ok(found)
            }
            Err(err) => {
                tx.rollback().await.ok();
                Err(err)
            }
        }
    }

    /// Three text-search strategies, first non-empty wins: exact match
    /// ranked by vocabulary priority, then bounded substring match, then
    /// multi-word AND-match on tokens of length > 2.
    async fn text_search(&self, tx: &mut sqlx::PgConnection, surface: &str) -> Result<Vec<String>, FerrumyxError> {
        if let Some(cui) = self
            .exact_match_cui(tx, surface)
            .await
            .map_err(|e| FerrumyxError::UmlsQuery(e.to_string()))?
        {
            return self.top_terms_for_cui(tx, &cui).await.map_err(|e| FerrumyxError::UmlsQuery(e.to_string()));
        }

        if let Some(cui) = self
            .substring_match_cui(tx, surface)
            .await
            .map_err(|e| FerrumyxError::UmlsQuery(e.to_string()))?
        {
            return self.top_terms_for_cui(tx, &cui).await.map_err(|e| FerrumyxError::UmlsQuery(e.to_string()));
        }

        let tokens: Vec<&str> = surface.split_whitespace().filter(|t| t.len() > 2).collect();
        if tokens.len() >= 2 {
            if let Some(cui) = self
                .multi_word_match_cui(tx, &tokens)
                .await
                .map_err(|e| FerrumyxError::UmlsQuery(e.to_string()))?
            {
                return self.top_terms_for_cui(tx, &cui).await.map_err(|e| FerrumyxError::UmlsQuery(e.to_string()));
            }
        }

        Ok(Vec::new())
    }

    async fn exact_match_cui(&self, tx: &mut sqlx::PgConnection, surface: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT cui FROM mrconso
            WHERE lower(str) = lower($1) AND lat = 'ENG' AND suppress = 'N'
            ORDER BY
                CASE sab WHEN 'SNOMEDCT_US' THEN 0 WHEN 'RXNORM' THEN 1 WHEN 'MSH' THEN 2 ELSE 3 END
            LIMIT 1
            "#,
        )
        .bind(surface)
        .fetch_optional(&mut *tx)
        .await
    }

    async fn substring_match_cui(&self, tx: &mut sqlx::PgConnection, surface: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT cui FROM mrconso
            WHERE lower(str) LIKE '%' || lower($1) || '%'
              AND abs(length(str) - length($1)) <= 10
              AND lat = 'ENG' AND suppress = 'N'
            ORDER BY abs(length(str) - length($1)) ASC
            LIMIT 1
            "#,
        )
        .bind(surface)
        .fetch_optional(&mut *tx)
        .await
    }

    async fn multi_word_match_cui(&self, tx: &mut sqlx::PgConnection, tokens: &[&str]) -> Result<Option<String>, sqlx::Error> {
        let predicates: Vec<String> = (1..=tokens.len()).map(|i| format!("lower(str) LIKE ${i}")).collect();
        let sql = format!(
            "SELECT cui FROM mrconso WHERE {} AND lat = 'ENG' AND suppress = 'N' LIMIT 1",
            predicates.join(" AND ")
        );
        let mut query = sqlx::query_scalar(&sql);
        for token in tokens {
            query = query.bind(format!("%{}%", token.to_lowercase()));
        }
        query.fetch_optional(&mut *tx).await
    }

    async fn top_terms_for_cui(&self, tx: &mut sqlx::PgConnection, cui: &str) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT str FROM mrconso
            WHERE cui = $1 AND lat = 'ENG' AND suppress = 'N'
            ORDER BY (tty = 'PT') DESC, length(str) ASC
            LIMIT $2
            "#,
        )
        .bind(cui)
        .bind(MAX_SYNONYMS)
        .fetch_all(&mut *tx)
        .await
    }
}

/// Union the resolver's synonyms with the original surface form and
/// deduplicate, preserving first-seen order. The Orchestrator calls this
/// after C6 returns.
pub fn union_with_surface_form(surface_form: &str, resolved: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for candidate in std::iter::once(surface_form.to_string()).chain(resolved.iter().cloned()) {
        if seen.insert(candidate.clone()) {
            out.push(candidate);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_ontology_ids_by_prefix() {
        assert_eq!(classify("SNOMEDCT:38341003"), CodeSystem::Snomed);
        assert_eq!(classify("RXNORM:5640"), CodeSystem::Rxnorm);
        assert_eq!(classify("BIOGRAPH:DISEASE:abc123"), CodeSystem::Biograph);
        assert_eq!(classify("UNKNOWN:1"), CodeSystem::Other);
    }

    #[test]
    fn code_part_strips_sab_prefix() {
        assert_eq!(code_part("SNOMEDCT:38341003"), "38341003");
        assert_eq!(code_part("BIOGRAPH:DISEASE:abc123"), "DISEASE:abc123");
    }

    #[test]
    fn union_deduplicates_preserving_order() {
        let result = union_with_surface_form("HTN", &["hypertension".to_string(), "HTN".to_string(), "high blood pressure".to_string()]);
        assert_eq!(result, vec!["HTN", "hypertension", "high blood pressure"]);
    }

    #[test]
    fn union_caps_are_left_to_caller() {
        let resolved: Vec<String> = (0..25).map(|i| format!("syn{i}")).collect();
        let result = union_with_surface_form("x", &resolved);
        assert_eq!(result.len(), 26);
    }
}
