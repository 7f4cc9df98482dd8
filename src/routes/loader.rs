use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use time::Date;
use tracing::instrument;

use crate::{
    app_state::AppState,
    domain::segment::segment_stream,
    repositories::{IngestOutcome, NewDocument, DEFAULT_EMBED_BATCH},
    routes::ApiError,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/ingest", post(ingest))
}

/// Ingest request: the raw text is given inline or read from a UTF-8 file
/// on the server.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestBody {
    title: String,
    theme: Option<String>,
    document_type: Option<String>,
    publish_date: Option<Date>,
    corpus_id: Option<String>,
    text: Option<String>,
    file_path: Option<String>,
    max_length: Option<usize>,
}

#[instrument(name = "POST /loader/ingest", skip(app_state, body), fields(title = %body.title))]
async fn ingest(
    State(app_state): State<AppState>,
    Json(body): Json<IngestBody>,
) -> Result<Json<IngestOutcome>, ApiError> {
    let text = match (body.text, &body.file_path) {
        (Some(text), _) => text,
        (None, Some(path)) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ApiError::bad_request(format!("cannot read {path}: {e}")))?,
        (None, None) => {
            return Err(ApiError::bad_request("either text or file_path is required"))
        }
    };

    let document = NewDocument {
        title: body.title,
        theme: body.theme,
        document_type: body.document_type,
        publish_date: body.publish_date,
        corpus_id: body.corpus_id,
    };

    let max_length = body.max_length.unwrap_or(app_state.default_max_length);
    let chunks = segment_stream(&text, max_length).map_err(ApiError::from)?;

    let outcome = app_state
        .documents
        .add_document_with_chunks(
            app_state.embedder.as_ref(),
            document,
            chunks,
            DEFAULT_EMBED_BATCH,
        )
        .await?;

    Ok(Json(outcome))
}
