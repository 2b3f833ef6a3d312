//! Route definitions for frame review.
//!
//! Mounted at `/frames`.
//!
//! ```text
//! GET  /{video_id}/{frame_id}                get_frame
//! GET  /{video_id}/{frame_id}/image          get_frame_image
//! POST /{video_id}/{frame_id}/auto-label     auto_label_frame
//! PUT  /{video_id}/{frame_id}/labels         update_frame_labels
//! POST /{video_id}/{frame_id}/approve        approve_frame
//! POST /{video_id}/{frame_id}/reject         reject_frame
//! ```

use axum::routing::{get, post, put};
use axum::Router;

use crate::handlers::frames;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{video_id}/{frame_id}", get(frames::get_frame))
        .route("/{video_id}/{frame_id}/image", get(frames::get_frame_image))
        .route(
            "/{video_id}/{frame_id}/auto-label",
            post(frames::auto_label_frame),
        )
        .route(
            "/{video_id}/{frame_id}/labels",
            put(frames::update_frame_labels),
        )
        .route("/{video_id}/{frame_id}/approve", post(frames::approve_frame))
        .route("/{video_id}/{frame_id}/reject", post(frames::reject_frame))
}
