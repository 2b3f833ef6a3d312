use std::sync::Arc;

use labelflow_core::command_detector::CommandDetector;
use labelflow_core::detector::{Detector, LazyAutoLabeler};
use labelflow_core::error::CoreError;
use labelflow_core::ffmpeg::FfmpegBackend;
use labelflow_core::frame_store::FrameStore;
use labelflow_core::media::MediaBackend;
use labelflow_core::storage::DataRoots;
use labelflow_core::taxonomy::ClassTaxonomy;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<FrameStore>,
    /// Detector adapter, loaded on first use.
    pub labeler: Arc<LazyAutoLabeler>,
    pub taxonomy: Arc<ClassTaxonomy>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        taxonomy: Arc<ClassTaxonomy>,
        media: Arc<dyn MediaBackend>,
        labeler: LazyAutoLabeler,
    ) -> Self {
        let roots = DataRoots::from_base(&config.data_dir);
        Self {
            store: Arc::new(FrameStore::new(roots, Arc::clone(&taxonomy), media)),
            labeler: Arc::new(labeler),
            taxonomy,
            config: Arc::new(config),
        }
    }

    /// Production wiring: taxonomy from `TAXONOMY_PATH` or the built-in list,
    /// the FFmpeg media backend, and the command detector when configured.
    ///
    /// Also creates the storage roots.
    pub fn from_config(config: ServerConfig) -> Result<Self, CoreError> {
        let taxonomy = Arc::new(match &config.taxonomy_path {
            Some(path) => ClassTaxonomy::from_json_file(path)?,
            None => ClassTaxonomy::default(),
        });

        DataRoots::from_base(&config.data_dir).ensure()?;

        let media: Arc<dyn MediaBackend> = Arc::new(FfmpegBackend::new(
            &config.ffmpeg_bin,
            &config.ffprobe_bin,
        ));

        let labeler = match config.detector_command.clone() {
            Some(command) => LazyAutoLabeler::new(Arc::clone(&taxonomy), move || {
                CommandDetector::load(&command).map(|d| Box::new(d) as Box<dyn Detector>)
            }),
            None => LazyAutoLabeler::unavailable(
                Arc::clone(&taxonomy),
                "No detector configured (set DETECTOR_COMMAND)",
            ),
        };

        Ok(Self::new(config, taxonomy, media, labeler))
    }
}
