pub mod export;
pub mod frames;
pub mod health;
pub mod videos;

use axum::routing::get;
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /classes                                         taxonomy with colours
/// /model-info                                      detector vocabulary mapping
/// /stats                                           totals across all videos
///
/// /videos                                          list
/// /videos/upload                                   upload (multipart, POST)
/// /videos/{video_id}                               get, delete
/// /videos/{video_id}/delete-info                   cascade preview
/// /videos/{video_id}/extract                       sample frames (POST)
/// /videos/{video_id}/frames                        list frames with status
///
/// /frames/{video_id}/{frame_id}                    frame detail with labels
/// /frames/{video_id}/{frame_id}/image              still image bytes
/// /frames/{video_id}/{frame_id}/auto-label         run detector (POST)
/// /frames/{video_id}/{frame_id}/labels             replace labels (PUT)
/// /frames/{video_id}/{frame_id}/approve            confirm labels (POST)
/// /frames/{video_id}/{frame_id}/reject             delete labels (POST)
///
/// /export/{video_id}                               dataset archive (zip)
/// /export/{video_id}/stats                         approval and class counts
/// ```
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/classes", get(handlers::catalog::list_classes))
        .route("/model-info", get(handlers::catalog::model_info))
        .route("/stats", get(handlers::catalog::global_stats))
        .nest("/videos", videos::router(config.max_upload_bytes))
        .nest("/frames", frames::router())
        .nest("/export", export::router())
}
