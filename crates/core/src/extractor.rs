//! Fixed-interval frame sampling.

use std::path::{Path, PathBuf};

use image::{DynamicImage, ImageFormat, RgbImage};
use serde::Serialize;

use crate::error::CoreError;
use crate::media::{DecodedFrame, FrameSource};
use crate::naming::FrameId;

/// One sampled frame written to disk.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractedFrame {
    pub frame_id: String,
    pub sequence: u32,
    /// Seconds from stream start, derived from the decode counter.
    pub timestamp_sec: f64,
    pub filename: String,
    #[serde(skip)]
    pub image_path: PathBuf,
}

/// Number of decoded frames between two samples.
///
/// Always at least one, so a tiny interval keeps every frame.
pub fn frame_step(fps: f64, interval_sec: f64) -> u64 {
    let step = (fps * interval_sec).round();
    if step.is_finite() && step >= 1.0 {
        step as u64
    } else {
        1
    }
}

/// Sample `source` every `interval_sec` seconds and write JPEG stills into
/// `out_dir`.
///
/// Output sequence numbers start at zero and increase only on emission, so
/// the set of frame ids depends only on fps, interval, and stream length.
pub fn extract_frames(
    source: &mut dyn FrameSource,
    video_id: &str,
    out_dir: &Path,
    interval_sec: f64,
) -> Result<Vec<ExtractedFrame>, CoreError> {
    if !interval_sec.is_finite() || interval_sec <= 0.0 {
        return Err(CoreError::Validation(format!(
            "frame interval must be positive, got {interval_sec}"
        )));
    }

    let fps = source.fps();
    if !fps.is_finite() || fps <= 0.0 {
        return Err(CoreError::UnsupportedInput(format!(
            "Invalid FPS for video {video_id}"
        )));
    }

    std::fs::create_dir_all(out_dir)?;

    let step = frame_step(fps, interval_sec);
    let mut decoded: u64 = 0;
    let mut extracted = Vec::new();

    while let Some(frame) = source.next_frame()? {
        if decoded % step == 0 {
            let id = FrameId::new(video_id, extracted.len() as u32);
            let filename = id.image_filename();
            let image_path = out_dir.join(&filename);
            write_jpeg(frame, &image_path)?;

            extracted.push(ExtractedFrame {
                frame_id: id.to_string(),
                sequence: id.sequence(),
                timestamp_sec: decoded as f64 / fps,
                filename,
                image_path,
            });
        }
        decoded += 1;
    }

    tracing::info!(
        video_id,
        decoded,
        step,
        extracted = extracted.len(),
        "Frame extraction finished"
    );
    Ok(extracted)
}

fn write_jpeg(frame: DecodedFrame, path: &Path) -> Result<(), CoreError> {
    let DecodedFrame { width, height, rgb } = frame;
    let buffer = RgbImage::from_raw(width, height, rgb).ok_or_else(|| {
        CoreError::Internal(format!(
            "decoded frame buffer does not match {width}x{height}"
        ))
    })?;
    DynamicImage::ImageRgb8(buffer)
        .save_with_format(path, ImageFormat::Jpeg)
        .map_err(|e| CoreError::Internal(format!("failed to write {}: {e}", path.display())))
}
