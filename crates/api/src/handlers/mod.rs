pub mod catalog;
pub mod export;
pub mod frames;
pub mod videos;

use axum::body::Bytes;
use labelflow_core::error::CoreError;
use serde::de::DeserializeOwned;

use crate::error::{AppError, AppResult};

/// Run a blocking core operation on the blocking thread pool.
///
/// Frame store calls touch the filesystem, decode video, or run the detector,
/// so none of them may run on an async worker.
pub(crate) async fn run_blocking<T, F>(op: F) -> AppResult<T>
where
    F: FnOnce() -> Result<T, CoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| AppError::InternalError(format!("Blocking task failed: {e}")))?
        .map_err(AppError::from)
}

/// Parse an optional JSON request body; an empty body yields `T::default()`.
pub(crate) fn optional_json<T>(body: &Bytes) -> AppResult<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("Invalid JSON body: {e}")))
}
