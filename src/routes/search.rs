use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::{
    app_state::AppState,
    domain::search::{SearchRequest, SearchResponse},
    routes::ApiError,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/hybrid_search", post(hybrid_search))
}

#[instrument(name = "POST /search/hybrid_search", skip(app_state, request), fields(query = %request.query))]
async fn hybrid_search(
    State(app_state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
    let response = app_state.search_engine.hybrid_search(&request).await?;
    Ok(Json(response))
}
