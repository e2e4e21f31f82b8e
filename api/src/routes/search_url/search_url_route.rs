use std::sync::Arc;

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use search_pipeline::OutputRecord;
use tracing::{debug, warn};

use crate::{
    core::{app_state::AppState, request_id::RequestId},
    error_handler::AppResult,
    routes::search_url::search_url_request::SearchUrlRequest,
};

/// `POST /api/searchWebcamByURL`: search by a remote image.
pub async fn search_url_route(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    payload: Result<Json<SearchUrlRequest>, JsonRejection>,
) -> AppResult<Json<Vec<OutputRecord>>> {
    let Json(p) = payload.inspect_err(|e| {
        warn!(request_id = %request_id, error = %e, "search_url_route: rejected body");
    })?;

    debug!(request_id = %request_id, url = %p.image_url, "search_url_route: start");

    let records = state
        .pipeline
        .search_by_url(p.image_url, p.count.into_string())
        .await
        .inspect_err(|e| warn!(request_id = %request_id, code = e.code(), "search_url_route: failed"))?;

    debug!(request_id = %request_id, hits = records.len(), "search_url_route: success");
    Ok(Json(records))
}
