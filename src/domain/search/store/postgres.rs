//! PostgreSQL search store: candidate selection over pgvector, parent
//! chain walks and the audit log.

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::PgPool;
use time::Date;

use crate::domain::search::traits::{Result, SearchStore};
use crate::domain::search::types::{
    CandidateRow, HierarchicalContext, ParentChunk, SearchRecord, SearchRequest,
};

/// Search store backed by Postgres + pgvector.
///
/// The candidate query is assembled from a fixed template plus a closed set
/// of optional predicates; every literal goes through a bind parameter.
/// `<=>` is cosine distance, served by the corpus's ANN index when one
/// exists and by a sequential scan otherwise.
#[derive(Clone)]
pub struct PgSearchStore {
    pool: PgPool,
}

impl PgSearchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Builds the candidate-selection SQL for a request.
///
/// Bind order: query embedding, then each present filter in template order
/// (theme, document type, date bounds, corpus, hierarchy level), then the
/// inner and outer limits. The date predicate only applies when both
/// bounds are present; bounds are inclusive.
pub(crate) fn build_candidate_sql(request: &SearchRequest) -> String {
    let mut sql = String::from(
        "WITH ranked AS (\n\
             SELECT\n\
                 c.id AS chunk_id,\n\
                 c.content,\n\
                 c.hierarchy_level,\n\
                 d.id AS document_id,\n\
                 d.title,\n\
                 d.theme,\n\
                 d.document_type,\n\
                 d.publish_date,\n\
                 c.embedding <=> $1 AS distance\n\
             FROM chunks c\n\
             JOIN documents d ON d.id = c.document_id\n\
             WHERE 1 = 1",
    );

    let mut param = 1;
    if request.theme.is_some() {
        param += 1;
        sql.push_str(&format!("\n      AND d.theme = ${param}"));
    }
    if request.document_type.is_some() {
        param += 1;
        sql.push_str(&format!("\n      AND d.document_type = ${param}"));
    }
    if request.start_date.is_some() && request.end_date.is_some() {
        sql.push_str(&format!(
            "\n      AND d.publish_date BETWEEN ${} AND ${}",
            param + 1,
            param + 2
        ));
        param += 2;
    }
    if request.corpus_id.is_some() {
        param += 1;
        sql.push_str(&format!("\n      AND d.corpus_id = ${param}"));
    }
    if request.hierarchy_level.is_some() {
        param += 1;
        sql.push_str(&format!("\n      AND c.hierarchy_level = ${param}"));
    }

    sql.push_str(&format!(
        "\n    ORDER BY distance\n    LIMIT ${}\n)\nSELECT * FROM ranked ORDER BY distance LIMIT ${}",
        param + 1,
        param + 2
    ));
    sql
}

#[derive(sqlx::FromRow)]
struct CandidateDbRow {
    chunk_id: i64,
    content: String,
    hierarchy_level: i32,
    document_id: i64,
    title: String,
    theme: Option<String>,
    document_type: Option<String>,
    publish_date: Option<Date>,
    distance: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct AncestorRow {
    id: i64,
    content: String,
    hierarchy_level: i32,
}

#[async_trait]
impl SearchStore for PgSearchStore {
    async fn fetch_candidates(
        &self,
        request: &SearchRequest,
        embedding: &[f32],
        expanded_limit: i64,
    ) -> Result<Vec<CandidateRow>> {
        let sql = build_candidate_sql(request);

        let mut query =
            sqlx::query_as::<_, CandidateDbRow>(&sql).bind(Vector::from(embedding.to_vec()));
        if let Some(theme) = &request.theme {
            query = query.bind(theme);
        }
        if let Some(document_type) = &request.document_type {
            query = query.bind(document_type);
        }
        if let (Some(start), Some(end)) = (request.start_date, request.end_date) {
            query = query.bind(start).bind(end);
        }
        if let Some(corpus_id) = &request.corpus_id {
            query = query.bind(corpus_id);
        }
        if let Some(level) = request.hierarchy_level {
            query = query.bind(level);
        }

        let rows = query
            .bind(expanded_limit)
            .bind(expanded_limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| CandidateRow {
                chunk_id: row.chunk_id,
                document_id: row.document_id,
                content: row.content,
                hierarchy_level: row.hierarchy_level,
                title: row.title,
                theme: row.theme,
                document_type: row.document_type,
                publish_date: row.publish_date,
                distance: row.distance,
            })
            .collect())
    }

    async fn fetch_parent_chain(&self, chunk_id: i64) -> Result<HierarchicalContext> {
        let ancestors = sqlx::query_as::<_, AncestorRow>(
            r#"
            WITH RECURSIVE ancestors AS (
                SELECT id, content, hierarchy_level, parent_chunk_id, 0 AS depth
                FROM chunks
                WHERE id = $1
                UNION ALL
                SELECT c.id, c.content, c.hierarchy_level, c.parent_chunk_id, a.depth + 1
                FROM chunks c
                JOIN ancestors a ON c.id = a.parent_chunk_id
                WHERE a.depth < 3
            )
            SELECT id, content, hierarchy_level
            FROM ancestors
            WHERE depth > 0
            "#,
        )
        .bind(chunk_id)
        .fetch_all(&self.pool)
        .await?;

        let mut context = HierarchicalContext::default();
        for ancestor in ancestors {
            let parent = ParentChunk {
                id: ancestor.id,
                content: ancestor.content,
                hierarchy_level: ancestor.hierarchy_level,
            };
            match ancestor.hierarchy_level {
                0 => context.level_0 = Some(parent),
                1 => context.level_1 = Some(parent),
                2 => context.level_2 = Some(parent),
                _ => {}
            }
        }
        Ok(context)
    }

    async fn log_search(&self, record: &SearchRecord) -> Result<()> {
        let outcome = sqlx::query(
            r#"
            INSERT INTO search_queries
                (query_text, theme, document_type, corpus_id, results_count, confidence_level, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&record.query_text)
        .bind(&record.theme)
        .bind(&record.document_type)
        .bind(&record.corpus_id)
        .bind(record.results_count)
        .bind(record.confidence_level)
        .bind(&record.user_id)
        .execute(&self.pool)
        .await;

        // The audit log must never fail a search.
        if let Err(e) = outcome {
            tracing::warn!(error = %e, "failed to log search query");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn sql_without_filters_has_two_limits() {
        let sql = build_candidate_sql(&SearchRequest::new("q"));
        assert!(sql.contains("c.embedding <=> $1 AS distance"));
        assert!(sql.contains("LIMIT $2"));
        assert!(sql.contains("LIMIT $3"));
        assert!(!sql.contains("d.theme ="));
    }

    #[test]
    fn sql_with_all_filters_numbers_parameters_in_order() {
        let mut request = SearchRequest::new("q");
        request.theme = Some("RSE".into());
        request.document_type = Some("PDF".into());
        request.start_date = Some(date!(2024 - 01 - 01));
        request.end_date = Some(date!(2024 - 12 - 31));
        request.corpus_id = Some("corpus".into());
        request.hierarchy_level = Some(3);

        let sql = build_candidate_sql(&request);
        assert!(sql.contains("d.theme = $2"));
        assert!(sql.contains("d.document_type = $3"));
        assert!(sql.contains("d.publish_date BETWEEN $4 AND $5"));
        assert!(sql.contains("d.corpus_id = $6"));
        assert!(sql.contains("c.hierarchy_level = $7"));
        assert!(sql.contains("LIMIT $8"));
        assert!(sql.contains("LIMIT $9"));
    }

    #[test]
    fn date_filter_requires_both_bounds() {
        let mut request = SearchRequest::new("q");
        request.start_date = Some(date!(2024 - 01 - 01));
        let sql = build_candidate_sql(&request);
        assert!(!sql.contains("BETWEEN"));
    }

    #[test]
    fn sql_never_interpolates_values() {
        let mut request = SearchRequest::new("q");
        request.theme = Some("'; DROP TABLE documents; --".into());
        request.corpus_id = Some("x' OR '1'='1".into());
        let sql = build_candidate_sql(&request);
        assert!(!sql.contains("DROP TABLE"));
        assert!(!sql.contains("OR '1'"));
    }
}
