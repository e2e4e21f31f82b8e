use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use search_pipeline::OutputRecord;
use tracing::{debug, warn};

use crate::{
    core::{app_state::AppState, request_id::RequestId},
    error_handler::AppResult,
    routes::search_text::search_text_request::SearchTextRequest,
};

/// `POST /api/searchWebcamFromAtlas`: free-text search.
pub async fn search_text_route(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    payload: Result<Json<SearchTextRequest>, JsonRejection>,
) -> AppResult<Json<Vec<OutputRecord>>> {
    let Json(p) = payload.inspect_err(|e| {
        warn!(request_id = %request_id, error = %e, "search_text_route: rejected body");
    })?;

    debug!(request_id = %request_id, query = %p.query, "search_text_route: start");

    let records = state
        .pipeline
        .search_by_text(p.query, p.count.into_string())
        .await
        .inspect_err(|e| warn!(request_id = %request_id, code = e.code(), "search_text_route: failed"))?;

    debug!(request_id = %request_id, hits = records.len(), "search_text_route: success");
    Ok(Json(records))
}
