//! Handlers for taxonomy, detector info, and global statistics.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use labelflow_core::detector::ClassMapping;
use labelflow_core::error::CoreError;
use labelflow_core::frame_store::GlobalStats;
use labelflow_core::taxonomy::ClassEntry;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::run_blocking;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_loaded: bool,
    /// Why the detector could not be loaded, when it could not.
    pub load_error: Option<String>,
    pub model_classes: BTreeMap<usize, String>,
    pub project_classes: Vec<String>,
    pub class_mapping: Vec<ClassMapping>,
}

/// GET /api/classes
pub async fn list_classes(State(state): State<AppState>) -> Json<DataResponse<Vec<ClassEntry>>> {
    Json(DataResponse {
        data: state.taxonomy.entries(),
    })
}

/// GET /api/model-info
///
/// Loads the detector if needed. A load failure is reported in the payload
/// rather than as an error status.
pub async fn model_info(State(state): State<AppState>) -> AppResult<Json<DataResponse<ModelInfo>>> {
    let labeler = state.labeler.clone();
    let loaded = run_blocking(move || match labeler.get() {
        Ok(l) => Ok(Ok(l)),
        Err(CoreError::ModelUnavailable(msg)) => Ok(Err(msg)),
        Err(e) => Err(e),
    })
    .await?;

    let project_classes = state.taxonomy.names().map(str::to_string).collect();
    let info = match loaded {
        Ok(labeler) => ModelInfo {
            model_loaded: true,
            load_error: None,
            model_classes: labeler.model_classes().clone(),
            project_classes,
            class_mapping: labeler.class_mapping(),
        },
        Err(msg) => ModelInfo {
            model_loaded: false,
            load_error: Some(msg),
            model_classes: BTreeMap::new(),
            project_classes,
            class_mapping: Vec::new(),
        },
    };

    Ok(Json(DataResponse { data: info }))
}

/// GET /api/stats
pub async fn global_stats(State(state): State<AppState>) -> AppResult<Json<DataResponse<GlobalStats>>> {
    let store = state.store.clone();
    let stats = run_blocking(move || store.global_stats()).await?;
    Ok(Json(DataResponse { data: stats }))
}
