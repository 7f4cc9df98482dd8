use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use crate::{
    app_state::AppState,
    domain::index::{IndexOutcome, IndexStatus, IndexType},
    routes::ApiError,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create-index/{corpus_id}", post(create_index))
        .route("/drop-index/{corpus_id}", delete(drop_index))
        .route("/index-status/{corpus_id}", get(index_status))
        .route("/indexes", get(all_indexes))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateIndexQuery {
    index_type: Option<IndexType>,
}

#[instrument(name = "POST /index/create-index", skip(app_state))]
async fn create_index(
    State(app_state): State<AppState>,
    Path(corpus_id): Path<String>,
    Query(query): Query<CreateIndexQuery>,
) -> Result<Json<IndexOutcome>, ApiError> {
    let outcome = app_state
        .index_manager
        .create_simple_index(&corpus_id, query.index_type.unwrap_or_default())
        .await?;
    Ok(Json(outcome))
}

#[instrument(name = "DELETE /index/drop-index", skip(app_state))]
async fn drop_index(
    State(app_state): State<AppState>,
    Path(corpus_id): Path<String>,
) -> Result<Json<IndexOutcome>, ApiError> {
    Ok(Json(app_state.index_manager.drop_index(&corpus_id).await?))
}

#[instrument(name = "GET /index/index-status", skip(app_state))]
async fn index_status(
    State(app_state): State<AppState>,
    Path(corpus_id): Path<String>,
) -> Result<Json<IndexStatus>, ApiError> {
    Ok(Json(app_state.index_manager.check_status(&corpus_id).await?))
}

#[instrument(name = "GET /index/indexes", skip(app_state))]
async fn all_indexes(
    State(app_state): State<AppState>,
) -> Result<Json<Vec<IndexStatus>>, ApiError> {
    Ok(Json(app_state.index_manager.check_all().await?))
}
