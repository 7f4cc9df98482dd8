use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use time::Date;
use tracing::instrument;

use crate::{
    app_state::AppState,
    domain::segment::ChunkDraft,
    repositories::{
        ChunkAppend, DeleteOutcome, DocumentPatch, IngestOutcome, NewDocument, StoredChunk,
        StoredDocument, UpdateOutcome, DEFAULT_EMBED_BATCH,
    },
    routes::ApiError,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/documents", post(add_document))
        .route(
            "/documents/{id}",
            get(get_document).put(update_document).delete(delete_document),
        )
        .route(
            "/documents/{id}/chunks",
            get(list_chunks).delete(delete_chunks),
        )
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentBody {
    title: String,
    theme: Option<String>,
    document_type: Option<String>,
    publish_date: Option<Date>,
    corpus_id: Option<String>,
}

impl From<DocumentBody> for NewDocument {
    fn from(body: DocumentBody) -> Self {
        Self {
            title: body.title,
            theme: body.theme,
            document_type: body.document_type,
            publish_date: body.publish_date,
            corpus_id: body.corpus_id,
        }
    }
}

fn default_level() -> i32 {
    3
}

/// A pre-segmented chunk; `parent_index` is the position of the parent in
/// the same list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkBody {
    content: String,
    start_char: Option<usize>,
    end_char: Option<usize>,
    #[serde(default = "default_level")]
    hierarchy_level: i32,
    parent_index: Option<usize>,
}

impl From<ChunkBody> for ChunkDraft {
    fn from(body: ChunkBody) -> Self {
        let end = body.end_char.unwrap_or(body.content.len());
        Self {
            content: body.content,
            start_char: body.start_char.unwrap_or(0),
            end_char: end,
            hierarchy_level: body.hierarchy_level,
            parent_index: body.parent_index,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddDocumentBody {
    document: DocumentBody,
    chunks: Vec<ChunkBody>,
}

#[instrument(name = "POST /database/documents", skip(app_state, body), fields(title = %body.document.title))]
async fn add_document(
    State(app_state): State<AppState>,
    Json(body): Json<AddDocumentBody>,
) -> Result<Json<IngestOutcome>, ApiError> {
    let drafts: Vec<ChunkDraft> = body.chunks.into_iter().map(Into::into).collect();

    let outcome = app_state
        .documents
        .add_document_with_chunks(
            app_state.embedder.as_ref(),
            body.document.into(),
            drafts,
            DEFAULT_EMBED_BATCH,
        )
        .await?;

    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendChunkBody {
    content: String,
    start_char: Option<i32>,
    end_char: Option<i32>,
    #[serde(default = "default_level")]
    hierarchy_level: i32,
    parent_chunk_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateDocumentBody {
    title: Option<String>,
    theme: Option<String>,
    document_type: Option<String>,
    publish_date: Option<Date>,
    corpus_id: Option<String>,
    #[serde(default)]
    new_chunks: Vec<AppendChunkBody>,
}

#[instrument(name = "PUT /database/documents/{id}", skip(app_state, body))]
async fn update_document(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateDocumentBody>,
) -> Result<Json<UpdateOutcome>, ApiError> {
    let patch = DocumentPatch {
        title: body.title,
        theme: body.theme,
        document_type: body.document_type,
        publish_date: body.publish_date,
        corpus_id: body.corpus_id,
    };
    let new_chunks: Vec<ChunkAppend> = body
        .new_chunks
        .into_iter()
        .map(|chunk| {
            let end = chunk.end_char.unwrap_or(chunk.content.len() as i32);
            ChunkAppend {
                content: chunk.content,
                start_char: chunk.start_char.unwrap_or(0),
                end_char: end,
                hierarchy_level: chunk.hierarchy_level,
                parent_chunk_id: chunk.parent_chunk_id,
            }
        })
        .collect();

    let outcome = app_state
        .documents
        .update_document(app_state.embedder.as_ref(), id, patch, new_chunks)
        .await?;

    Ok(Json(outcome))
}

#[instrument(name = "GET /database/documents/{id}", skip(app_state))]
async fn get_document(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<StoredDocument>, ApiError> {
    Ok(Json(app_state.documents.get_document(id).await?))
}

#[instrument(name = "GET /database/documents/{id}/chunks", skip(app_state))]
async fn list_chunks(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<StoredChunk>>, ApiError> {
    Ok(Json(app_state.documents.list_chunks(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeleteChunksBody {
    chunk_ids: Option<Vec<i64>>,
}

#[instrument(name = "DELETE /database/documents/{id}/chunks", skip(app_state, body))]
async fn delete_chunks(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<DeleteChunksBody>>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    let chunk_ids = body.and_then(|Json(b)| b.chunk_ids);
    let outcome = app_state
        .documents
        .delete_chunks(id, chunk_ids.as_deref())
        .await?;
    Ok(Json(outcome))
}

#[instrument(name = "DELETE /database/documents/{id}", skip(app_state))]
async fn delete_document(
    State(app_state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DeleteOutcome>, ApiError> {
    Ok(Json(app_state.documents.delete_document(id).await?))
}
