//! Route definitions for dataset export.
//!
//! Mounted at `/export`.
//!
//! ```text
//! GET /{video_id}          export_video
//! GET /{video_id}/stats    export_stats
//! ```

use axum::routing::get;
use axum::Router;

use crate::handlers::export;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{video_id}", get(export::export_video))
        .route("/{video_id}/stats", get(export::export_stats))
}
