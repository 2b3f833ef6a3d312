//! Handlers for frame review: detail, image bytes, auto-labeling, label edits,
//! approve and reject.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use labelflow_core::detector::Prediction;
use labelflow_core::error::CoreError;
use labelflow_core::frame_store::FrameStatus;
use labelflow_core::label::{Label, LabelInput};
use labelflow_core::taxonomy::ClassTaxonomy;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::{optional_json, run_blocking};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// A stored label with its class display colour.
#[derive(Debug, Serialize)]
pub struct ColoredLabel {
    #[serde(flatten)]
    pub label: Label,
    pub color: String,
}

/// A fresh detector prediction with its class display colour.
#[derive(Debug, Serialize)]
pub struct ColoredPrediction {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub color: String,
}

#[derive(Debug, Serialize)]
pub struct FrameResponse {
    pub frame_id: String,
    pub video_id: String,
    pub filename: String,
    pub status: FrameStatus,
    pub width: u32,
    pub height: u32,
    pub labels: Vec<ColoredLabel>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AutoLabelRequest {
    pub confidence_threshold: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct AutoLabelResponse {
    pub frame_id: String,
    pub confidence_threshold: f64,
    pub labels_count: usize,
    pub labels: Vec<ColoredPrediction>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLabelsRequest {
    #[serde(default)]
    pub labels: Vec<LabelInput>,
}

#[derive(Debug, Serialize)]
pub struct UpdateLabelsResponse {
    pub frame_id: String,
    pub labels_count: usize,
    pub status: FrameStatus,
}

#[derive(Debug, Serialize)]
pub struct ReviewResponse {
    pub frame_id: String,
    pub status: &'static str,
    pub labels_count: usize,
}

fn colored(taxonomy: &ClassTaxonomy, label: Label) -> ColoredLabel {
    ColoredLabel {
        color: taxonomy.color_of(label.class_id).to_string(),
        label,
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/frames/{video_id}/{frame_id}
pub async fn get_frame(
    State(state): State<AppState>,
    Path((video_id, frame_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<FrameResponse>>> {
    let store = state.store.clone();
    let detail = run_blocking(move || store.get_frame(&video_id, &frame_id)).await?;

    let labels = detail
        .labels
        .into_iter()
        .map(|l| colored(&state.taxonomy, l))
        .collect();

    Ok(Json(DataResponse {
        data: FrameResponse {
            frame_id: detail.frame_id,
            video_id: detail.video_id,
            filename: detail.filename,
            status: detail.status,
            width: detail.width,
            height: detail.height,
            labels,
        },
    }))
}

/// GET /api/frames/{video_id}/{frame_id}/image
pub async fn get_frame_image(
    State(state): State<AppState>,
    Path((video_id, frame_id)): Path<(String, String)>,
) -> AppResult<Response> {
    let store = state.store.clone();
    let data = run_blocking(move || {
        let path = store.frame_image(&video_id, &frame_id)?;
        std::fs::read(path).map_err(CoreError::from)
    })
    .await?;

    Ok((
        [
            (header::CONTENT_TYPE, "image/jpeg"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        data,
    )
        .into_response())
}

/// POST /api/frames/{video_id}/{frame_id}/auto-label
///
/// Body (optional): `{"confidence_threshold": 0.35}`. Runs the detector on
/// the frame and replaces the frame's labels with its predictions.
pub async fn auto_label_frame(
    State(state): State<AppState>,
    Path((video_id, frame_id)): Path<(String, String)>,
    body: Bytes,
) -> AppResult<Json<DataResponse<AutoLabelResponse>>> {
    let request: AutoLabelRequest = optional_json(&body)?;
    let threshold = request
        .confidence_threshold
        .unwrap_or(state.config.default_confidence);
    if !(0.0..=1.0).contains(&threshold) {
        return Err(AppError::BadRequest(
            "confidence_threshold must be between 0 and 1".into(),
        ));
    }

    let store = state.store.clone();
    let labeler = state.labeler.clone();
    let (frame_id, predictions) = run_blocking(move || {
        let detail = store.get_frame(&video_id, &frame_id)?;
        let labeler = labeler.get()?;
        let predictions = labeler.predict(
            &detail.image_path,
            threshold,
            Some((detail.width, detail.height)),
        )?;

        let labels: Vec<Label> = predictions.iter().map(Prediction::to_label).collect();
        store.save_labels(&video_id, &frame_id, &labels)?;
        tracing::info!(
            video_id = %video_id,
            frame_id = %detail.frame_id,
            labels = labels.len(),
            threshold,
            "Frame auto-labeled"
        );
        Ok((detail.frame_id, predictions))
    })
    .await?;

    let labels: Vec<ColoredPrediction> = predictions
        .into_iter()
        .map(|p| ColoredPrediction {
            color: state.taxonomy.color_of(p.class_id).to_string(),
            prediction: p,
        })
        .collect();

    Ok(Json(DataResponse {
        data: AutoLabelResponse {
            frame_id,
            confidence_threshold: threshold,
            labels_count: labels.len(),
            labels,
        },
    }))
}

/// PUT /api/frames/{video_id}/{frame_id}/labels
///
/// Body: `{"labels": [...]}`. An empty list clears the frame back to pending.
pub async fn update_frame_labels(
    State(state): State<AppState>,
    Path((video_id, frame_id)): Path<(String, String)>,
    Json(request): Json<UpdateLabelsRequest>,
) -> AppResult<Json<DataResponse<UpdateLabelsResponse>>> {
    let labels = request
        .labels
        .iter()
        .map(|input| input.resolve(&state.taxonomy))
        .collect::<Result<Vec<_>, _>>()?;

    let store = state.store.clone();
    let id = frame_id.clone();
    let count = run_blocking(move || store.save_labels(&video_id, &id, &labels)).await?;

    Ok(Json(DataResponse {
        data: UpdateLabelsResponse {
            frame_id,
            labels_count: count,
            status: if count > 0 {
                FrameStatus::Approved
            } else {
                FrameStatus::Pending
            },
        },
    }))
}

/// POST /api/frames/{video_id}/{frame_id}/approve
///
/// Approval is the presence of saved labels, so this only confirms that the
/// frame has some.
pub async fn approve_frame(
    State(state): State<AppState>,
    Path((video_id, frame_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<ReviewResponse>>> {
    let store = state.store.clone();
    let detail = run_blocking(move || store.get_frame(&video_id, &frame_id)).await?;

    if !detail.status.is_approved() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "Frame {} has no labels; save labels before approving",
            detail.frame_id
        ))));
    }

    Ok(Json(DataResponse {
        data: ReviewResponse {
            frame_id: detail.frame_id,
            status: "approved",
            labels_count: detail.labels.len(),
        },
    }))
}

/// POST /api/frames/{video_id}/{frame_id}/reject
///
/// Removes the label artifact; succeeds whether or not one existed.
pub async fn reject_frame(
    State(state): State<AppState>,
    Path((video_id, frame_id)): Path<(String, String)>,
) -> AppResult<Json<DataResponse<ReviewResponse>>> {
    let store = state.store.clone();
    let id = frame_id.clone();
    let removed = run_blocking(move || store.delete_label(&video_id, &id)).await?;
    tracing::debug!(frame_id = %frame_id, removed, "Frame rejected");

    Ok(Json(DataResponse {
        data: ReviewResponse {
            frame_id,
            status: "rejected",
            labels_count: 0,
        },
    }))
}
