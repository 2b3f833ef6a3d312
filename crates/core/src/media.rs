//! Video probing and decoding seams.
//!
//! The frame store never talks to a decoder directly; it goes through a
//! [`MediaBackend`]. Production uses [`crate::ffmpeg::FfmpegBackend`].

use std::path::Path;

use serde::Serialize;

use crate::error::CoreError;

/// Container metadata reported for an uploaded video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoInfo {
    pub fps: f64,
    pub total_frames: u64,
    pub width: u32,
    pub height: u32,
    /// Seconds; zero when the frame rate is unknown.
    pub duration: f64,
}

impl VideoInfo {
    pub fn new(fps: f64, total_frames: u64, width: u32, height: u32) -> Self {
        let duration = if fps > 0.0 {
            total_frames as f64 / fps
        } else {
            0.0
        };
        Self {
            fps,
            total_frames,
            width,
            height,
            duration,
        }
    }
}

/// One decoded picture in packed RGB8.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Sequential decoder over one video stream.
pub trait FrameSource {
    /// Nominal frame rate of the stream.
    fn fps(&self) -> f64;

    /// Next frame in decode order, or `None` at end of stream.
    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, CoreError>;
}

/// Probing and decoding capability for stored video files.
pub trait MediaBackend: Send + Sync {
    /// Read container metadata.
    ///
    /// Fails with [`CoreError::UnsupportedInput`] when the file cannot be
    /// opened as a video.
    fn probe(&self, path: &Path) -> Result<VideoInfo, CoreError>;

    /// Open a sequential frame decoder.
    ///
    /// Fails with [`CoreError::UnsupportedInput`] when the file cannot be
    /// opened or reports a non-positive frame rate.
    fn open_frames(&self, path: &Path) -> Result<Box<dyn FrameSource>, CoreError>;
}
