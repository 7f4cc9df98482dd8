//! Transactional persistence of documents and their chunk trees.
//!
//! All write paths run inside one transaction per document: a failed batch
//! rolls the whole document back, and a cancelled ingest never leaves a
//! partially visible document behind.

use pgvector::Vector;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::repo_error::RepositoryError;
use crate::domain::search::Embedder;
use crate::domain::segment::{ChunkDraft, MAX_CHUNK_SIZE};

/// Default number of chunks embedded per batch during ingest.
pub const DEFAULT_EMBED_BATCH: usize = 10;

/// A corpus outgrowing this on an ivfflat index deserves an HNSW warning.
const HNSW_ADVISORY_THRESHOLD: i64 = 300_000;

/// Metadata of a document to create.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub theme: Option<String>,
    pub document_type: Option<String>,
    pub publish_date: Option<Date>,
    pub corpus_id: Option<String>,
}

/// Partial update of a document's metadata; absent fields are untouched.
#[derive(Debug, Clone, Default)]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub theme: Option<String>,
    pub document_type: Option<String>,
    pub publish_date: Option<Date>,
    pub corpus_id: Option<String>,
}

/// A chunk appended to an existing document; the parent reference is a
/// persistent chunk id.
#[derive(Debug, Clone)]
pub struct ChunkAppend {
    pub content: String,
    pub start_char: i32,
    pub end_char: i32,
    pub hierarchy_level: i32,
    pub parent_chunk_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub document_id: i64,
    pub chunk_count: usize,
    pub corpus_id: String,
    pub index_needed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOutcome {
    pub document_id: i64,
    pub corpus_id: Option<String>,
    pub chunks_total: i64,
    pub chunks_added: usize,
    pub index_needed: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub document_id: i64,
    pub chunks_deleted: i64,
    pub remaining_chunks: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: i64,
    pub title: String,
    pub theme: Option<String>,
    pub document_type: Option<String>,
    pub publish_date: Option<Date>,
    pub corpus_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub index_needed: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StoredChunk {
    pub id: i64,
    pub document_id: i64,
    pub content: String,
    pub start_char: i32,
    pub end_char: i32,
    pub hierarchy_level: i32,
    pub parent_chunk_id: Option<i64>,
}

#[derive(Clone)]
pub struct DocumentRepository {
    pool: PgPool,
}

impl DocumentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a document and its chunk stream in one transaction.
    ///
    /// The stream is consumed in batches of `batch_size`; each batch's
    /// texts are embedded together. Positional parent references resolve
    /// through a position→id map, which also enforces that a parent
    /// appears earlier at a strictly lower level. A fresh `corpus_id` is
    /// assigned when the document carries none.
    pub async fn add_document_with_chunks<E, I>(
        &self,
        embedder: &E,
        document: NewDocument,
        drafts: I,
        batch_size: usize,
    ) -> Result<IngestOutcome, RepositoryError>
    where
        E: Embedder + ?Sized,
        I: IntoIterator<Item = ChunkDraft>,
    {
        let batch_size = batch_size.max(1);
        let corpus_id = document
            .corpus_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut tx = self.pool.begin().await?;

        let document_id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO documents (title, theme, document_type, publish_date, corpus_id, index_needed)
            VALUES ($1, $2, $3, $4, $5, false)
            RETURNING id
            "#,
        )
        .bind(&document.title)
        .bind(&document.theme)
        .bind(&document.document_type)
        .bind(document.publish_date)
        .bind(&corpus_id)
        .fetch_one(&mut *tx)
        .await?;

        // Stream position → (chunk id, level), for parent resolution.
        let mut inserted: Vec<(i64, i32)> = Vec::new();
        let mut drafts = drafts.into_iter();
        let mut batch: Vec<ChunkDraft> = Vec::with_capacity(batch_size);
        loop {
            batch.clear();
            while batch.len() < batch_size {
                match drafts.next() {
                    Some(draft) => batch.push(draft),
                    None => break,
                }
            }
            if batch.is_empty() {
                break;
            }
            insert_chunk_batch(&mut tx, embedder, document_id, &batch, &mut inserted).await?;
        }
        let chunk_count = inserted.len();

        let index_needed = chunk_count > 0;
        if index_needed {
            adjust_config_for_added_chunks(&mut tx, &corpus_id, chunk_count as i64).await?;
            sqlx::query("UPDATE documents SET index_needed = true WHERE id = $1")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(document_id, chunk_count, %corpus_id, "document ingested");

        Ok(IngestOutcome {
            document_id,
            chunk_count,
            corpus_id,
            index_needed,
        })
    }

    /// Updates metadata fields present in `patch` and appends `new_chunks`.
    ///
    /// A corpus move rebalances the chunk counters of both IndexConfigs
    /// and flags both sides stale.
    pub async fn update_document<E>(
        &self,
        embedder: &E,
        document_id: i64,
        patch: DocumentPatch,
        new_chunks: Vec<ChunkAppend>,
    ) -> Result<UpdateOutcome, RepositoryError>
    where
        E: Embedder + ?Sized,
    {
        let mut tx = self.pool.begin().await?;

        // Writes serialize per document.
        let old_corpus: Option<String> =
            sqlx::query_scalar("SELECT corpus_id FROM documents WHERE id = $1 FOR UPDATE")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(format!("document {document_id}")))?;

        sqlx::query(
            r#"
            UPDATE documents SET
                title = COALESCE($2, title),
                theme = COALESCE($3, theme),
                document_type = COALESCE($4, document_type),
                publish_date = COALESCE($5, publish_date),
                corpus_id = COALESCE($6, corpus_id)
            WHERE id = $1
            "#,
        )
        .bind(document_id)
        .bind(&patch.title)
        .bind(&patch.theme)
        .bind(&patch.document_type)
        .bind(patch.publish_date)
        .bind(&patch.corpus_id)
        .execute(&mut *tx)
        .await?;

        let new_corpus = patch.corpus_id.clone().or_else(|| old_corpus.clone());

        let chunks_added = new_chunks.len();
        if !new_chunks.is_empty() {
            append_chunks(&mut tx, embedder, document_id, &new_chunks).await?;
        }

        let chunks_total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = $1")
                .bind(document_id)
                .fetch_one(&mut *tx)
                .await?;

        let corpus_moved = new_corpus != old_corpus;
        let mut index_needed = false;

        if corpus_moved {
            // The appended chunks were never counted under the old corpus.
            let moved = chunks_total - chunks_added as i64;
            if let Some(old) = &old_corpus {
                sqlx::query(
                    "UPDATE index_configs SET chunk_count = GREATEST(0, chunk_count - $2), is_indexed = false WHERE corpus_id = $1",
                )
                .bind(old)
                .bind(moved)
                .execute(&mut *tx)
                .await?;
            }
            if let Some(new) = &new_corpus {
                adjust_config_for_added_chunks(&mut tx, new, chunks_total).await?;
            }
            index_needed = true;
        } else if chunks_added > 0 {
            if let Some(corpus) = &new_corpus {
                adjust_config_for_added_chunks(&mut tx, corpus, chunks_added as i64).await?;
            }
            index_needed = true;
        }

        if index_needed {
            sqlx::query("UPDATE documents SET index_needed = true WHERE id = $1")
                .bind(document_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        info!(document_id, chunks_added, "document updated");

        Ok(UpdateOutcome {
            document_id,
            corpus_id: new_corpus,
            chunks_total,
            chunks_added,
            index_needed,
        })
    }

    /// Deletes the listed chunks, or all of the document's when `chunk_ids`
    /// is `None`. Cascade deletions of child chunks are accounted for by
    /// recounting instead of trusting `rows_affected`.
    pub async fn delete_chunks(
        &self,
        document_id: i64,
        chunk_ids: Option<&[i64]>,
    ) -> Result<DeleteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let corpus_id: Option<String> =
            sqlx::query_scalar("SELECT corpus_id FROM documents WHERE id = $1 FOR UPDATE")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(format!("document {document_id}")))?;

        let before: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await?;

        match chunk_ids {
            Some(ids) => {
                sqlx::query("DELETE FROM chunks WHERE document_id = $1 AND id = ANY($2)")
                    .bind(document_id)
                    .bind(ids)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                sqlx::query("DELETE FROM chunks WHERE document_id = $1")
                    .bind(document_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        let after: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = $1")
            .bind(document_id)
            .fetch_one(&mut *tx)
            .await?;
        let deleted = before - after;

        if deleted > 0 {
            if let Some(corpus) = &corpus_id {
                sqlx::query(
                    "UPDATE index_configs SET chunk_count = GREATEST(0, chunk_count - $2) WHERE corpus_id = $1",
                )
                .bind(corpus)
                .bind(deleted)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;

        Ok(DeleteOutcome {
            document_id,
            chunks_deleted: deleted,
            remaining_chunks: after,
        })
    }

    /// Deletes a document; chunks go with it through the cascade.
    pub async fn delete_document(&self, document_id: i64) -> Result<DeleteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let corpus_id: Option<String> =
            sqlx::query_scalar("SELECT corpus_id FROM documents WHERE id = $1 FOR UPDATE")
                .bind(document_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| RepositoryError::NotFound(format!("document {document_id}")))?;

        let chunk_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunks WHERE document_id = $1")
                .bind(document_id)
                .fetch_one(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM documents WHERE id = $1")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        if let Some(corpus) = &corpus_id {
            sqlx::query(
                "UPDATE index_configs SET chunk_count = GREATEST(0, chunk_count - $2) WHERE corpus_id = $1",
            )
            .bind(corpus)
            .bind(chunk_count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(document_id, chunk_count, "document deleted");

        Ok(DeleteOutcome {
            document_id,
            chunks_deleted: chunk_count,
            remaining_chunks: 0,
        })
    }

    pub async fn get_document(&self, document_id: i64) -> Result<StoredDocument, RepositoryError> {
        sqlx::query_as::<_, StoredDocument>(
            r#"
            SELECT id, title, theme, document_type, publish_date, corpus_id, created_at, index_needed
            FROM documents
            WHERE id = $1
            "#,
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| RepositoryError::NotFound(format!("document {document_id}")))
    }

    /// Chunks of a document in insertion order.
    pub async fn list_chunks(&self, document_id: i64) -> Result<Vec<StoredChunk>, RepositoryError> {
        self.get_document(document_id).await?;

        let chunks = sqlx::query_as::<_, StoredChunk>(
            r#"
            SELECT id, document_id, content, start_char, end_char, hierarchy_level, parent_chunk_id
            FROM chunks
            WHERE document_id = $1
            ORDER BY id
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(chunks)
    }
}

async fn insert_chunk_batch<E>(
    tx: &mut Transaction<'_, Postgres>,
    embedder: &E,
    document_id: i64,
    batch: &[ChunkDraft],
    inserted: &mut Vec<(i64, i32)>,
) -> Result<(), RepositoryError>
where
    E: Embedder + ?Sized,
{
    let texts: Vec<&str> = batch.iter().map(|c| c.content.as_str()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    for (draft, embedding) in batch.iter().zip(embeddings) {
        if draft.content.len() > MAX_CHUNK_SIZE {
            return Err(RepositoryError::IntegrityViolation(format!(
                "chunk content of {} bytes exceeds the {MAX_CHUNK_SIZE} byte limit",
                draft.content.len()
            )));
        }
        let parent_chunk_id = match draft.parent_index {
            None => None,
            Some(position) => {
                let (parent_id, parent_level) =
                    inserted.get(position).copied().ok_or_else(|| {
                        RepositoryError::IntegrityViolation(format!(
                            "parent index {position} does not reference an earlier chunk"
                        ))
                    })?;
                if parent_level >= draft.hierarchy_level {
                    return Err(RepositoryError::IntegrityViolation(format!(
                        "parent at level {parent_level} is not below level {}",
                        draft.hierarchy_level
                    )));
                }
                Some(parent_id)
            }
        };

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO chunks (document_id, content, embedding, start_char, end_char, hierarchy_level, parent_chunk_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(document_id)
        .bind(&draft.content)
        .bind(Vector::from(embedding))
        .bind(draft.start_char as i32)
        .bind(draft.end_char as i32)
        .bind(draft.hierarchy_level)
        .bind(parent_chunk_id)
        .fetch_one(&mut **tx)
        .await?;

        inserted.push((id, draft.hierarchy_level));
    }
    Ok(())
}

async fn append_chunks<E>(
    tx: &mut Transaction<'_, Postgres>,
    embedder: &E,
    document_id: i64,
    chunks: &[ChunkAppend],
) -> Result<(), RepositoryError>
where
    E: Embedder + ?Sized,
{
    let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let embeddings = embedder.embed_batch(&texts).await?;

    for (chunk, embedding) in chunks.iter().zip(embeddings) {
        if chunk.content.len() > MAX_CHUNK_SIZE {
            return Err(RepositoryError::IntegrityViolation(format!(
                "chunk content of {} bytes exceeds the {MAX_CHUNK_SIZE} byte limit",
                chunk.content.len()
            )));
        }
        if let Some(parent_id) = chunk.parent_chunk_id {
            let parent: Option<(i64, i32)> = sqlx::query_as(
                "SELECT document_id, hierarchy_level FROM chunks WHERE id = $1",
            )
            .bind(parent_id)
            .fetch_optional(&mut **tx)
            .await?;
            match parent {
                None => {
                    return Err(RepositoryError::IntegrityViolation(format!(
                        "parent chunk {parent_id} does not exist"
                    )))
                }
                Some((parent_document, _)) if parent_document != document_id => {
                    return Err(RepositoryError::IntegrityViolation(format!(
                        "parent chunk {parent_id} belongs to another document"
                    )))
                }
                Some((_, parent_level)) if parent_level >= chunk.hierarchy_level => {
                    return Err(RepositoryError::IntegrityViolation(format!(
                        "parent at level {parent_level} is not below level {}",
                        chunk.hierarchy_level
                    )))
                }
                Some(_) => {}
            }
        }

        sqlx::query(
            r#"
            INSERT INTO chunks (document_id, content, embedding, start_char, end_char, hierarchy_level, parent_chunk_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(document_id)
        .bind(&chunk.content)
        .bind(Vector::from(embedding))
        .bind(chunk.start_char)
        .bind(chunk.end_char)
        .bind(chunk.hierarchy_level)
        .bind(chunk.parent_chunk_id)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Adds `added` chunks to a corpus's IndexConfig, creating it when absent,
/// and flags the index stale.
async fn adjust_config_for_added_chunks(
    tx: &mut Transaction<'_, Postgres>,
    corpus_id: &str,
    added: i64,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r#"
        INSERT INTO index_configs (corpus_id, index_type, is_indexed, chunk_count)
        VALUES ($1, 'ivfflat', false, $2)
        ON CONFLICT (corpus_id) DO UPDATE SET
            chunk_count = index_configs.chunk_count + EXCLUDED.chunk_count,
            is_indexed = false
        "#,
    )
    .bind(corpus_id)
    .bind(added)
    .execute(&mut **tx)
    .await?;

    let config: Option<(String, i64)> =
        sqlx::query_as("SELECT index_type, chunk_count FROM index_configs WHERE corpus_id = $1")
            .bind(corpus_id)
            .fetch_optional(&mut **tx)
            .await?;
    if let Some((index_type, chunk_count)) = config {
        if index_type == "ivfflat" && chunk_count > HNSW_ADVISORY_THRESHOLD {
            warn!(
                corpus_id,
                chunk_count, "corpus has outgrown ivfflat, consider migrating to an hnsw index"
            );
        }
    }
    Ok(())
}
