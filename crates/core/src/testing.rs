//! In-memory test doubles for the media and detector seams.
//!
//! Compiled for this crate's unit tests and, through the `test-support`
//! feature, for downstream integration tests.

use std::collections::BTreeMap;
use std::path::Path;

use crate::detector::{Detector, RawDetection};
use crate::error::CoreError;
use crate::media::{DecodedFrame, FrameSource, MediaBackend, VideoInfo};

/// Generates `total` solid-colour frames at a fixed rate.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    fps: f64,
    total: u64,
    width: u32,
    height: u32,
    emitted: u64,
}

impl SyntheticSource {
    pub fn new(fps: f64, total: u64, width: u32, height: u32) -> Self {
        Self {
            fps,
            total,
            width,
            height,
            emitted: 0,
        }
    }
}

impl FrameSource for SyntheticSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, CoreError> {
        if self.emitted >= self.total {
            return Ok(None);
        }
        let shade = (self.emitted % 256) as u8;
        self.emitted += 1;
        Ok(Some(DecodedFrame {
            width: self.width,
            height: self.height,
            rgb: vec![shade; self.width as usize * self.height as usize * 3],
        }))
    }
}

/// [`MediaBackend`] that treats any non-empty file as a video with fixed
/// properties.
///
/// Empty or missing files are reported as unsupported input, which lets
/// tests exercise the "unreadable upload" path.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    pub fps: f64,
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self {
            fps: 10.0,
            total_frames: 30,
            width: 64,
            height: 48,
        }
    }
}

impl SyntheticBackend {
    fn check_readable(path: &Path) -> Result<(), CoreError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(()),
            _ => Err(CoreError::UnsupportedInput(format!(
                "Cannot open video: {}",
                path.display()
            ))),
        }
    }
}

impl MediaBackend for SyntheticBackend {
    fn probe(&self, path: &Path) -> Result<VideoInfo, CoreError> {
        Self::check_readable(path)?;
        Ok(VideoInfo::new(
            self.fps,
            self.total_frames,
            self.width,
            self.height,
        ))
    }

    fn open_frames(&self, path: &Path) -> Result<Box<dyn FrameSource>, CoreError> {
        Self::check_readable(path)?;
        if self.fps <= 0.0 {
            return Err(CoreError::UnsupportedInput("Invalid FPS".into()));
        }
        Ok(Box::new(SyntheticSource::new(
            self.fps,
            self.total_frames,
            self.width,
            self.height,
        )))
    }
}

/// [`Detector`] with a fixed vocabulary that returns the same detections for
/// every image.
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    names: BTreeMap<usize, String>,
    detections: Vec<RawDetection>,
}

impl StaticDetector {
    pub fn new(names: &[(usize, &str)]) -> Self {
        Self {
            names: names
                .iter()
                .map(|(id, name)| (*id, name.to_string()))
                .collect(),
            detections: Vec::new(),
        }
    }

    pub fn with_detections(mut self, detections: Vec<RawDetection>) -> Self {
        self.detections = detections;
        self
    }
}

impl Detector for StaticDetector {
    fn class_names(&self) -> BTreeMap<usize, String> {
        self.names.clone()
    }

    fn predict(&self, _image: &Path) -> Result<Vec<RawDetection>, CoreError> {
        Ok(self.detections.clone())
    }
}
