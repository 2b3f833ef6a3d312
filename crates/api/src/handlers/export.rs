//! Handlers for dataset export.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use labelflow_core::export::{self, ExportOptions, ExportStats};

use crate::error::AppResult;
use crate::handlers::run_blocking;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/export/{video_id}?only_approved=true&use_class_id=false
///
/// Returns the archive as an `application/zip` attachment.
pub async fn export_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(options): Query<ExportOptions>,
) -> AppResult<Response> {
    let store = state.store.clone();
    let id = video_id.clone();
    let archive = run_blocking(move || export::build_archive(&store, &id, options)).await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        export::archive_filename(&video_id)
    );
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        archive,
    )
        .into_response())
}

/// GET /api/export/{video_id}/stats
pub async fn export_stats(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<DataResponse<ExportStats>>> {
    let store = state.store.clone();
    let stats = run_blocking(move || export::export_stats(&store, &video_id)).await?;
    Ok(Json(DataResponse { data: stats }))
}
