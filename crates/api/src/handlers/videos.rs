//! Handlers for video upload, listing, deletion, and frame extraction.

use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use labelflow_core::extractor::ExtractedFrame;
use labelflow_core::frame_store::{DeleteInfo, DeletedVideo, FrameSummary, SavedVideo, VideoSummary};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::{optional_json, run_blocking};
use crate::response::DataResponse;
use crate::state::AppState;

/// Sampling interval used when an extract request does not name one.
const DEFAULT_FRAME_INTERVAL_SECS: f64 = 10.0;

/// Frames returned by a listing when `limit` is omitted.
const DEFAULT_FRAME_LIST_LIMIT: usize = 1000;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ExtractRequest {
    /// Seconds between sampled frames.
    pub frame_interval: f64,
    /// Clear existing frames and labels first.
    pub replace_existing: bool,
}

impl Default for ExtractRequest {
    fn default() -> Self {
        Self {
            frame_interval: DEFAULT_FRAME_INTERVAL_SECS,
            replace_existing: false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExtractResponse {
    pub video_id: String,
    pub frames_extracted: usize,
    pub interval_seconds: f64,
    pub replace_existing: bool,
    pub frames: Vec<ExtractedFrame>,
}

#[derive(Debug, Deserialize)]
pub struct FrameListParams {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FrameListResponse {
    pub video_id: String,
    /// Frames on disk, before `limit` is applied.
    pub total: usize,
    pub frames: Vec<FrameSummary>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/videos/upload
///
/// Multipart form: required `file`, optional `folder_name` and `custom_name`.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<DataResponse<SavedVideo>>)> {
    let mut file_data: Option<(String, Vec<u8>)> = None;
    let mut folder_name: Option<String> = None;
    let mut custom_name: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file_data = Some((filename, data.to_vec()));
            }
            "folder_name" | "folder" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                folder_name = Some(text);
            }
            "custom_name" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                custom_name = Some(text);
            }
            _ => {} // ignore unknown fields
        }
    }

    let (filename, data) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;
    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let store = state.store.clone();
    let saved = run_blocking(move || {
        store.save_video(&data, &filename, folder_name.as_deref(), custom_name.as_deref())
    })
    .await?;

    Ok((StatusCode::CREATED, Json(DataResponse { data: saved })))
}

/// GET /api/videos
pub async fn list_videos(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<Vec<VideoSummary>>>> {
    let store = state.store.clone();
    let videos = run_blocking(move || store.list_videos()).await?;
    Ok(Json(DataResponse { data: videos }))
}

/// GET /api/videos/{video_id}
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<DataResponse<VideoSummary>>> {
    let store = state.store.clone();
    let video = run_blocking(move || store.find_video(&video_id)).await?;
    Ok(Json(DataResponse { data: video }))
}

/// GET /api/videos/{video_id}/delete-info
pub async fn delete_info(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<DataResponse<DeleteInfo>>> {
    let store = state.store.clone();
    let info = run_blocking(move || store.delete_info(&video_id)).await?;
    Ok(Json(DataResponse { data: info }))
}

/// DELETE /api/videos/{video_id}
///
/// Idempotent: an unknown id reports zero removed items.
pub async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<DataResponse<DeletedVideo>>> {
    let store = state.store.clone();
    let deleted = run_blocking(move || store.delete_video(&video_id)).await?;
    Ok(Json(DataResponse { data: deleted }))
}

/// POST /api/videos/{video_id}/extract
///
/// Body (optional): `{"frame_interval": 10, "replace_existing": false}`.
pub async fn extract_frames(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    body: Bytes,
) -> AppResult<Json<DataResponse<ExtractResponse>>> {
    let request: ExtractRequest = optional_json(&body)?;
    if !request.frame_interval.is_finite() || request.frame_interval <= 0.0 {
        return Err(AppError::BadRequest(
            "frame_interval must be a positive number of seconds".into(),
        ));
    }

    let store = state.store.clone();
    let id = video_id.clone();
    let ExtractRequest {
        frame_interval,
        replace_existing,
    } = request;
    let frames =
        run_blocking(move || store.extract_frames(&id, frame_interval, replace_existing)).await?;

    Ok(Json(DataResponse {
        data: ExtractResponse {
            video_id,
            frames_extracted: frames.len(),
            interval_seconds: frame_interval,
            replace_existing,
            frames,
        },
    }))
}

/// GET /api/videos/{video_id}/frames?limit=1000
pub async fn list_frames(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    Query(params): Query<FrameListParams>,
) -> AppResult<Json<DataResponse<FrameListResponse>>> {
    let store = state.store.clone();
    let id = video_id.clone();
    let mut frames = run_blocking(move || store.list_frames(&id)).await?;

    let total = frames.len();
    frames.truncate(params.limit.unwrap_or(DEFAULT_FRAME_LIST_LIMIT));

    Ok(Json(DataResponse {
        data: FrameListResponse {
            video_id,
            total,
            frames,
        },
    }))
}
