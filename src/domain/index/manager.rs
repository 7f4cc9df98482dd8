//! Per-corpus ANN index lifecycle over pgvector.
//!
//! Each corpus gets its own materialized projection (`proj_<corpus>`)
//! holding just its `(chunk_id, embedding)` rows, and an IVFFLAT or HNSW
//! index on top of it. Rebuild cost stays proportional to one corpus and
//! the index parameters can be tuned to its size.

use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::OffsetDateTime;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
    serde::Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    #[default]
    Ivfflat,
    Hnsw,
}

/// Outcome of an index create/drop. `Exists` and `Warning` are idempotent
/// signals, not faults.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IndexOutcome {
    Created {
        index_type: IndexType,
        lists: Option<i32>,
        documents_updated: u64,
        projection: String,
    },
    Dropped {
        message: String,
    },
    Exists {
        message: String,
    },
    Warning {
        message: String,
    },
}

/// Index state of one corpus.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    pub corpus_id: String,
    pub index_exists: bool,
    pub config_exists: bool,
    pub is_indexed: bool,
    pub index_type: Option<String>,
    /// Live chunks currently in the corpus.
    pub chunk_count: i64,
    /// Chunks counted at the last successful build.
    pub indexed_chunks: i64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_indexed: Option<OffsetDateTime>,
}

/// Result of an orphan reclamation pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub status: String,
    pub deleted_count: usize,
    pub cleaned_corpus_ids: Vec<String>,
    pub errors: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Replaces everything outside `[A-Za-z0-9_]` so the corpus id can be
/// embedded in an identifier. Names are stable and derivable.
pub fn sanitize_corpus_id(corpus_id: &str) -> String {
    corpus_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

pub fn projection_name(corpus_id: &str) -> String {
    format!("proj_{}", sanitize_corpus_id(corpus_id))
}

pub fn index_name(corpus_id: &str) -> String {
    format!("idx_vector_{}", sanitize_corpus_id(corpus_id))
}

/// IVFFLAT list count for a corpus of `n` vectors: `round(sqrt(n))`
/// clamped to `[1, 1000]`.
pub fn ivf_lists(chunk_count: i64) -> i32 {
    ((chunk_count.max(0) as f64).sqrt().round() as i64).clamp(1, 1_000) as i32
}

/// Escapes a value as a SQL string literal; DDL statements cannot take
/// bind parameters.
fn sql_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[derive(sqlx::FromRow)]
struct ConfigRow {
    index_type: String,
    is_indexed: bool,
    chunk_count: i64,
    last_indexed: Option<OffsetDateTime>,
}

#[derive(Clone)]
pub struct IndexManager {
    pool: PgPool,
}

impl IndexManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds the ANN index for a corpus.
    ///
    /// Returns `Exists` without side effects when the index is already
    /// there, and `Warning` when the corpus has no chunks. Concurrent
    /// builds on the same corpus serialize on an advisory lock.
    pub async fn create_simple_index(
        &self,
        corpus_id: &str,
        index_type: IndexType,
    ) -> Result<IndexOutcome, IndexError> {
        let projection = projection_name(corpus_id);
        let index = index_name(corpus_id);

        let mut tx = self.pool.begin().await?;
        lock_corpus(&mut tx, corpus_id).await?;

        if index_exists(&mut tx, &index).await? {
            return Ok(IndexOutcome::Exists {
                message: format!("index {index} already present"),
            });
        }

        let chunk_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks c JOIN documents d ON d.id = c.document_id WHERE d.corpus_id = $1",
        )
        .bind(corpus_id)
        .fetch_one(&mut *tx)
        .await?;
        if chunk_count == 0 {
            return Ok(IndexOutcome::Warning {
                message: format!("no chunks for corpus {corpus_id}"),
            });
        }

        let corpus_literal = sql_string_literal(corpus_id);
        sqlx::query(&format!("DROP MATERIALIZED VIEW IF EXISTS {projection}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!(
            "CREATE MATERIALIZED VIEW {projection} AS \
             SELECT c.id, c.embedding \
             FROM chunks c JOIN documents d ON d.id = c.document_id \
             WHERE d.corpus_id = {corpus_literal}"
        ))
        .execute(&mut *tx)
        .await?;

        let (lists, index_ddl) = match index_type {
            IndexType::Ivfflat => {
                let lists = ivf_lists(chunk_count);
                (
                    Some(lists),
                    format!(
                        "CREATE INDEX {index} ON {projection} \
                         USING ivfflat (embedding vector_cosine_ops) WITH (lists = {lists})"
                    ),
                )
            }
            IndexType::Hnsw => {
                let (m, ef_construction) = hnsw_params(&mut tx, corpus_id).await?;
                (
                    None,
                    format!(
                        "CREATE INDEX {index} ON {projection} \
                         USING hnsw (embedding vector_cosine_ops) \
                         WITH (m = {m}, ef_construction = {ef_construction})"
                    ),
                )
            }
        };
        sqlx::query(&index_ddl).execute(&mut *tx).await?;

        sqlx::query(
            r#"
            INSERT INTO index_configs (corpus_id, index_type, is_indexed, chunk_count, last_indexed, ivf_lists)
            VALUES ($1, $2, true, $3, now(), COALESCE($4, 100))
            ON CONFLICT (corpus_id) DO UPDATE SET
                index_type = EXCLUDED.index_type,
                is_indexed = true,
                chunk_count = EXCLUDED.chunk_count,
                last_indexed = now(),
                ivf_lists = COALESCE($4, index_configs.ivf_lists)
            "#,
        )
        .bind(corpus_id)
        .bind(index_type.to_string())
        .bind(chunk_count)
        .bind(lists)
        .execute(&mut *tx)
        .await?;

        let documents_updated =
            sqlx::query("UPDATE documents SET index_needed = false WHERE corpus_id = $1")
                .bind(corpus_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();

        tx.commit().await?;

        tracing::info!(
            corpus_id,
            chunk_count,
            ?lists,
            "vector index created"
        );
        self.refresh_statistics(&projection).await;

        Ok(IndexOutcome::Created {
            index_type,
            lists,
            documents_updated,
            projection,
        })
    }

    /// Drops the index and projection of a corpus; `Warning` when absent.
    pub async fn drop_index(&self, corpus_id: &str) -> Result<IndexOutcome, IndexError> {
        let projection = projection_name(corpus_id);
        let index = index_name(corpus_id);

        let mut tx = self.pool.begin().await?;
        lock_corpus(&mut tx, corpus_id).await?;

        if !index_exists(&mut tx, &index).await? {
            return Ok(IndexOutcome::Warning {
                message: format!("index {index} does not exist"),
            });
        }

        // Dropping the projection takes the index down with it.
        sqlx::query(&format!(
            "DROP MATERIALIZED VIEW IF EXISTS {projection} CASCADE"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE index_configs SET is_indexed = false WHERE corpus_id = $1")
            .bind(corpus_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(IndexOutcome::Dropped {
            message: format!("index {index} and projection {projection} dropped"),
        })
    }

    /// Reports the index state of one corpus.
    pub async fn check_status(&self, corpus_id: &str) -> Result<IndexStatus, IndexError> {
        let index = index_name(corpus_id);

        let index_exists: Option<i32> =
            sqlx::query_scalar("SELECT 1 FROM pg_indexes WHERE indexname = $1")
                .bind(&index)
                .fetch_optional(&self.pool)
                .await?;

        let config: Option<ConfigRow> = sqlx::query_as(
            "SELECT index_type, is_indexed, chunk_count, last_indexed FROM index_configs WHERE corpus_id = $1",
        )
        .bind(corpus_id)
        .fetch_optional(&self.pool)
        .await?;

        let chunk_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chunks c JOIN documents d ON d.id = c.document_id WHERE d.corpus_id = $1",
        )
        .bind(corpus_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(IndexStatus {
            corpus_id: corpus_id.to_string(),
            index_exists: index_exists.is_some(),
            config_exists: config.is_some(),
            is_indexed: config.as_ref().map(|c| c.is_indexed).unwrap_or(false),
            index_type: config.as_ref().map(|c| c.index_type.clone()),
            chunk_count,
            indexed_chunks: config.as_ref().map(|c| c.chunk_count).unwrap_or(0),
            last_indexed: config.and_then(|c| c.last_indexed),
        })
    }

    /// Reports the index state of every known corpus.
    pub async fn check_all(&self) -> Result<Vec<IndexStatus>, IndexError> {
        let corpus_ids: Vec<String> = sqlx::query_scalar(
            "SELECT DISTINCT corpus_id FROM documents WHERE corpus_id IS NOT NULL \
             UNION SELECT corpus_id FROM index_configs \
             ORDER BY 1",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut statuses = Vec::with_capacity(corpus_ids.len());
        for corpus_id in corpus_ids {
            statuses.push(self.check_status(&corpus_id).await?);
        }
        Ok(statuses)
    }

    /// Reclaims IndexConfigs whose corpus has no live documents left,
    /// dropping their projections first. Per-corpus failures are collected
    /// into the report rather than aborting the pass.
    pub async fn clean_orphans(&self) -> Result<CleanupReport, IndexError> {
        let orphan_ids: Vec<String> = sqlx::query_scalar(
            "SELECT ic.corpus_id FROM index_configs ic \
             WHERE NOT EXISTS (SELECT 1 FROM documents d WHERE d.corpus_id = ic.corpus_id) \
             ORDER BY ic.corpus_id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut cleaned_corpus_ids = Vec::new();
        let mut errors = Vec::new();

        for corpus_id in orphan_ids {
            match self.reap_orphan(&corpus_id).await {
                Ok(()) => {
                    tracing::info!(%corpus_id, "orphaned index configuration removed");
                    cleaned_corpus_ids.push(corpus_id);
                }
                Err(e) => {
                    tracing::error!(%corpus_id, error = %e, "failed to clean orphaned index");
                    errors.push(format!("corpus {corpus_id}: {e}"));
                }
            }
        }

        if !cleaned_corpus_ids.is_empty() {
            if let Err(e) = sqlx::query("ANALYZE index_configs").execute(&self.pool).await {
                tracing::warn!(error = %e, "ANALYZE index_configs failed");
            }
        }

        Ok(CleanupReport {
            status: if errors.is_empty() {
                "success".to_string()
            } else {
                "partial_success".to_string()
            },
            deleted_count: cleaned_corpus_ids.len(),
            cleaned_corpus_ids,
            errors,
            timestamp: OffsetDateTime::now_utc(),
        })
    }

    /// One orphan, one short transaction: the sweeper never holds locks
    /// across corpora.
    async fn reap_orphan(&self, corpus_id: &str) -> Result<(), IndexError> {
        let projection = projection_name(corpus_id);

        let mut tx = self.pool.begin().await?;
        lock_corpus(&mut tx, corpus_id).await?;
        sqlx::query(&format!(
            "DROP MATERIALIZED VIEW IF EXISTS {projection} CASCADE"
        ))
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM index_configs WHERE corpus_id = $1")
            .bind(corpus_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn refresh_statistics(&self, projection: &str) {
        for statement in [
            format!("ANALYZE {projection}"),
            "ANALYZE chunks".to_string(),
            "ANALYZE documents".to_string(),
        ] {
            if let Err(e) = sqlx::query(&statement).execute(&self.pool).await {
                tracing::warn!(statement, error = %e, "ANALYZE failed");
            }
        }
    }
}

async fn lock_corpus(
    tx: &mut Transaction<'_, Postgres>,
    corpus_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(corpus_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

async fn index_exists(
    tx: &mut Transaction<'_, Postgres>,
    index: &str,
) -> Result<bool, sqlx::Error> {
    let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM pg_indexes WHERE indexname = $1")
        .bind(index)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(found.is_some())
}

async fn hnsw_params(
    tx: &mut Transaction<'_, Postgres>,
    corpus_id: &str,
) -> Result<(i32, i32), sqlx::Error> {
    let params: Option<(i32, i32)> = sqlx::query_as(
        "SELECT hnsw_m, hnsw_ef_construction FROM index_configs WHERE corpus_id = $1",
    )
    .bind(corpus_id)
    .fetch_optional(&mut **tx)
    .await?;
    Ok(params.unwrap_or((16, 200)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitization_replaces_non_identifier_chars() {
        assert_eq!(
            sanitize_corpus_id("8d5f9b2a-3c41-4e8f-9a70-1b2c3d4e5f60"),
            "8d5f9b2a_3c41_4e8f_9a70_1b2c3d4e5f60"
        );
        assert_eq!(sanitize_corpus_id("abc'; DROP--"), "abc___DROP__");
    }

    #[test]
    fn names_are_stable_and_derivable() {
        assert_eq!(projection_name("a-b"), "proj_a_b");
        assert_eq!(index_name("a-b"), "idx_vector_a_b");
    }

    #[test]
    fn ivf_lists_follows_sqrt_rule() {
        assert_eq!(ivf_lists(121), 11);
        assert_eq!(ivf_lists(1), 1);
        assert_eq!(ivf_lists(2), 1);
        assert_eq!(ivf_lists(100), 10);
        assert_eq!(ivf_lists(10_000_000), 1_000);
    }

    #[test]
    fn string_literal_escapes_quotes() {
        assert_eq!(sql_string_literal("a'b"), "'a''b'");
    }

    #[test]
    fn index_type_round_trips_as_text() {
        use std::str::FromStr;
        assert_eq!(IndexType::Ivfflat.to_string(), "ivfflat");
        assert_eq!(IndexType::Hnsw.to_string(), "hnsw");
        assert_eq!(IndexType::from_str("IVFFLAT").unwrap(), IndexType::Ivfflat);
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = IndexOutcome::Created {
            index_type: IndexType::Ivfflat,
            lists: Some(11),
            documents_updated: 3,
            projection: "proj_x".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "created");
        assert_eq!(json["lists"], 11);

        let warning = IndexOutcome::Warning {
            message: "no chunks".into(),
        };
        assert_eq!(serde_json::to_value(&warning).unwrap()["status"], "warning");
    }
}
