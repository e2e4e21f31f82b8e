use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
};
use bytes::Bytes;
use search_pipeline::OutputRecord;
use tracing::{debug, warn};

use crate::{
    core::{app_state::AppState, request_id::RequestId},
    error_handler::{AppError, AppResult},
};

/// `POST /api/searchWebcamByImage`: multipart upload with `count` and `image` fields.
pub async fn search_image_route(
    State(state): State<Arc<AppState>>,
    request_id: RequestId,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<Json<Vec<OutputRecord>>> {
    let (image, count) = read_form(multipart?).await.inspect_err(|e| {
        warn!(request_id = %request_id, error = %e, "search_image_route: rejected form");
    })?;

    debug!(request_id = %request_id, bytes = image.len(), "search_image_route: start");

    let records = state
        .pipeline
        .search_by_image(image, count)
        .await
        .inspect_err(|e| warn!(request_id = %request_id, code = e.code(), "search_image_route: failed"))?;

    debug!(request_id = %request_id, hits = records.len(), "search_image_route: success");
    Ok(Json(records))
}

/// Collects the `image` and `count` fields; other fields are ignored.
async fn read_form(mut multipart: Multipart) -> Result<(Bytes, String), AppError> {
    let mut image = None;
    let mut count = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("image") => image = Some(field.bytes().await?),
            Some("count") => count = Some(field.text().await?),
            _ => {}
        }
    }

    let image = image.ok_or_else(|| AppError::BadRequest("missing multipart field `image`".into()))?;
    let count = count.ok_or_else(|| AppError::BadRequest("missing multipart field `count`".into()))?;
    Ok((image, count))
}
