//! Detector adapter: maps a plugged-in detector's vocabulary onto the
//! project taxonomy.
//!
//! Detector and taxonomy vocabularies are ordered independently, so mapping
//! goes strictly through lowercase class names, never numeric ids.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::error::CoreError;
use crate::label::Label;
use crate::taxonomy::ClassTaxonomy;

/// A detection in the detector's own vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    /// Native class id, as reported by the detector.
    pub class_id: usize,
    pub confidence: f64,
    /// Pixel box `[x1, y1, x2, y2]`.
    pub bbox: [f64; 4],
}

/// Object-detection capability.
pub trait Detector: Send + Sync {
    /// Native id → name vocabulary. Read once when the adapter is built.
    fn class_names(&self) -> BTreeMap<usize, String>;

    fn predict(&self, image: &Path) -> Result<Vec<RawDetection>, CoreError>;
}

/// A detection mapped onto the taxonomy with normalized geometry.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub class_id: usize,
    pub class_name: String,
    pub confidence: f64,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl Prediction {
    pub fn to_label(&self) -> Label {
        Label {
            class_id: self.class_id,
            class_name: self.class_name.clone(),
            x_center: self.x_center,
            y_center: self.y_center,
            width: self.width,
            height: self.height,
        }
    }
}

/// How one native class maps onto the taxonomy.
#[derive(Debug, Clone, Serialize)]
pub struct ClassMapping {
    pub model_class_id: usize,
    pub model_class_name: String,
    pub project_class_id: Option<usize>,
    pub project_class_name: Option<String>,
    pub mapped: bool,
}

/// A loaded detector bound to a taxonomy.
pub struct AutoLabeler {
    detector: Box<dyn Detector>,
    taxonomy: Arc<ClassTaxonomy>,
    native_names: BTreeMap<usize, String>,
    /// Native id → taxonomy index, for names present in both vocabularies.
    native_to_project: HashMap<usize, usize>,
}

impl fmt::Debug for AutoLabeler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoLabeler")
            .field("native_names", &self.native_names)
            .field("native_to_project", &self.native_to_project)
            .finish_non_exhaustive()
    }
}

impl AutoLabeler {
    pub fn new(detector: Box<dyn Detector>, taxonomy: Arc<ClassTaxonomy>) -> Self {
        let mut project_by_name: HashMap<String, usize> = HashMap::new();
        for (id, name) in taxonomy.names().enumerate() {
            project_by_name.entry(name.to_lowercase()).or_insert(id);
        }

        let native_names = detector.class_names();
        let native_to_project = native_names
            .iter()
            .filter_map(|(native_id, name)| {
                project_by_name
                    .get(&name.to_lowercase())
                    .map(|project_id| (*native_id, *project_id))
            })
            .collect::<HashMap<_, _>>();

        tracing::info!(
            model_classes = native_names.len(),
            mapped = native_to_project.len(),
            "Detector vocabulary mapped onto taxonomy"
        );

        Self {
            detector,
            taxonomy,
            native_names,
            native_to_project,
        }
    }

    pub fn model_classes(&self) -> &BTreeMap<usize, String> {
        &self.native_names
    }

    fn map_native(&self, native_id: usize) -> Option<usize> {
        self.native_to_project.get(&native_id).copied()
    }

    /// Mapping of every native class, in native id order.
    pub fn class_mapping(&self) -> Vec<ClassMapping> {
        self.native_names
            .iter()
            .map(|(native_id, name)| {
                let project = self.map_native(*native_id);
                ClassMapping {
                    model_class_id: *native_id,
                    model_class_name: name.clone(),
                    project_class_id: project,
                    project_class_name: project.map(|id| self.taxonomy.name_of(id).to_string()),
                    mapped: project.is_some(),
                }
            })
            .collect()
    }

    /// Run the detector on `image` and map the surviving detections.
    ///
    /// Detections below `confidence_threshold` or without a taxonomy match are
    /// dropped. Image dimensions are read from the file when `dims` is `None`.
    pub fn predict(
        &self,
        image: &Path,
        confidence_threshold: f64,
        dims: Option<(u32, u32)>,
    ) -> Result<Vec<Prediction>, CoreError> {
        let (width, height) = match dims {
            Some((w, h)) if w > 0 && h > 0 => (w, h),
            _ => image::image_dimensions(image).map_err(|e| {
                CoreError::ImageUnreadable(format!("{}: {e}", image.display()))
            })?,
        };

        let raw = self.detector.predict(image)?;
        let total = raw.len();
        let predictions: Vec<Prediction> = raw
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .filter_map(|d| self.to_prediction(d, width as f64, height as f64))
            .collect();

        tracing::debug!(
            image = %image.display(),
            detections = total,
            kept = predictions.len(),
            confidence_threshold,
            "Auto-label prediction"
        );
        Ok(predictions)
    }

    fn to_prediction(&self, det: RawDetection, img_w: f64, img_h: f64) -> Option<Prediction> {
        let class_id = self.map_native(det.class_id)?;

        let [x1, y1, x2, y2] = det.bbox;
        let (cx1, cx2) = (x1.clamp(0.0, img_w), x2.clamp(0.0, img_w));
        let (cy1, cy2) = (y1.clamp(0.0, img_h), y2.clamp(0.0, img_h));
        let (box_w, box_h) = (cx2 - cx1, cy2 - cy1);
        if !(box_w > 0.0 && box_h > 0.0) {
            tracing::debug!(bbox = ?det.bbox, "Dropping detection with no area inside the image");
            return None;
        }

        Some(Prediction {
            class_id,
            class_name: self.taxonomy.name_of(class_id).to_string(),
            confidence: det.confidence,
            x_center: (cx1 + box_w / 2.0) / img_w,
            y_center: (cy1 + box_h / 2.0) / img_h,
            width: box_w / img_w,
            height: box_h / img_h,
            x1,
            y1,
            x2,
            y2,
        })
    }
}

type DetectorLoader = Box<dyn Fn() -> Result<Box<dyn Detector>, CoreError> + Send + Sync>;

/// Process-wide, lazily loaded [`AutoLabeler`].
///
/// The first caller runs the loader while holding the slot lock, so
/// concurrent first uses load the detector once. A failed load is not cached.
/// [`is_loaded`](Self::is_loaded) never takes the slot lock and so never
/// waits on a load in progress.
pub struct LazyAutoLabeler {
    taxonomy: Arc<ClassTaxonomy>,
    loader: DetectorLoader,
    slot: Mutex<Option<Arc<AutoLabeler>>>,
    loaded: AtomicBool,
}

impl LazyAutoLabeler {
    pub fn new<F>(taxonomy: Arc<ClassTaxonomy>, loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Detector>, CoreError> + Send + Sync + 'static,
    {
        Self {
            taxonomy,
            loader: Box::new(loader),
            slot: Mutex::new(None),
            loaded: AtomicBool::new(false),
        }
    }

    /// A labeler whose every load attempt fails with `reason`.
    pub fn unavailable(taxonomy: Arc<ClassTaxonomy>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self::new(taxonomy, move || Err(CoreError::ModelUnavailable(reason.clone())))
    }

    pub fn get(&self) -> Result<Arc<AutoLabeler>, CoreError> {
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(labeler) = slot.as_ref() {
            return Ok(Arc::clone(labeler));
        }

        let detector = (self.loader)().map_err(|e| match e {
            CoreError::ModelUnavailable(_) => e,
            other => CoreError::ModelUnavailable(other.to_string()),
        })?;
        let labeler = Arc::new(AutoLabeler::new(detector, Arc::clone(&self.taxonomy)));
        *slot = Some(Arc::clone(&labeler));
        self.loaded.store(true, Ordering::Release);
        tracing::info!("Detector loaded");
        Ok(labeler)
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }
}
