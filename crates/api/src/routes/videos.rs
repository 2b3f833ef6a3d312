//! Route definitions for videos.
//!
//! Mounted at `/videos`.
//!
//! ```text
//! GET    /                          list_videos
//! POST   /upload                    upload_video
//! GET    /{video_id}                get_video
//! DELETE /{video_id}                delete_video
//! GET    /{video_id}/delete-info    delete_info
//! POST   /{video_id}/extract        extract_frames
//! GET    /{video_id}/frames         list_frames
//! ```

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::videos;
use crate::state::AppState;

pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/", get(videos::list_videos))
        .route(
            "/upload",
            post(videos::upload_video).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/{video_id}",
            get(videos::get_video).delete(videos::delete_video),
        )
        .route("/{video_id}/delete-info", get(videos::delete_info))
        .route("/{video_id}/extract", post(videos::extract_frames))
        .route("/{video_id}/frames", get(videos::list_frames))
}
