//! FFmpeg/FFprobe media backend.
//!
//! Metadata comes from `ffprobe -print_format json`; frames are decoded by an
//! `ffmpeg` child process writing packed `rgb24` pictures to its stdout.
//!
//! Some decoder builds cannot open non-ASCII paths. When direct probing of
//! such a path fails, the file is copied to a private scratch file that lives
//! exactly as long as the probe or the frame source using it.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};

use serde::Deserialize;
use tempfile::NamedTempFile;

use crate::error::CoreError;
use crate::media::{DecodedFrame, FrameSource, MediaBackend, VideoInfo};

/// Error type for FFmpeg/FFprobe invocations.
#[derive(Debug, thiserror::Error)]
pub enum FfmpegError {
    #[error("ffprobe/ffmpeg binary not found: {0}")]
    NotFound(io::Error),

    #[error("ffprobe/ffmpeg execution failed (exit code {exit_code:?}): {stderr}")]
    ExecutionFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("failed to parse ffprobe output: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// ffprobe JSON output structures
// ---------------------------------------------------------------------------

/// Top-level ffprobe JSON output (`-print_format json -show_format -show_streams`).
#[derive(Debug, Deserialize)]
pub struct FfprobeOutput {
    #[serde(default)]
    pub streams: Vec<FfprobeStream>,
    #[serde(default)]
    pub format: FfprobeFormat,
}

/// A single stream from ffprobe output.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeStream {
    pub codec_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// e.g. "30/1" or "24000/1001"
    pub r_frame_rate: Option<String>,
    pub avg_frame_rate: Option<String>,
    pub duration: Option<String>,
    pub nb_frames: Option<String>,
}

/// Format-level metadata from ffprobe.
#[derive(Debug, Default, Deserialize)]
pub struct FfprobeFormat {
    pub duration: Option<String>,
    pub format_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// [`MediaBackend`] that shells out to the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_bin: PathBuf,
    ffprobe_bin: PathBuf,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegBackend {
    pub fn new(ffmpeg_bin: impl Into<PathBuf>, ffprobe_bin: impl Into<PathBuf>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
            ffprobe_bin: ffprobe_bin.into(),
        }
    }

    /// Probe `path`, retrying through a scratch copy for non-ASCII paths.
    ///
    /// The returned [`MediaInput`] is the path that actually worked; keep it
    /// alive for as long as the file is needed.
    fn probe_with_fallback(&self, path: &Path) -> Result<(FfprobeOutput, MediaInput), CoreError> {
        if !path.is_file() {
            return Err(CoreError::UnsupportedInput(format!(
                "Cannot open video: {}",
                path.display()
            )));
        }

        match probe_video(&self.ffprobe_bin, path) {
            Ok(probe) => Ok((probe, MediaInput::direct(path))),
            Err(FfmpegError::NotFound(e)) => Err(CoreError::Internal(format!(
                "ffprobe unavailable ({}): {e}",
                self.ffprobe_bin.display()
            ))),
            Err(first) if !is_ascii_path(path) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %first,
                    "Direct probe failed on non-ASCII path, retrying via scratch copy"
                );
                let input = MediaInput::scratch_copy(path)?;
                let probe = probe_video(&self.ffprobe_bin, input.path())
                    .map_err(|e| unreadable(path, &e))?;
                Ok((probe, input))
            }
            Err(e) => Err(unreadable(path, &e)),
        }
    }
}

impl MediaBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> Result<VideoInfo, CoreError> {
        let (probe, _input) = self.probe_with_fallback(path)?;
        if first_video_stream(&probe).is_none() {
            return Err(CoreError::UnsupportedInput(format!(
                "No video stream in {}",
                path.display()
            )));
        }

        let fps = parse_framerate(&probe);
        let (width, height) = parse_resolution(&probe);
        Ok(VideoInfo::new(fps, parse_total_frames(&probe), width, height))
    }

    fn open_frames(&self, path: &Path) -> Result<Box<dyn FrameSource>, CoreError> {
        let (probe, input) = self.probe_with_fallback(path)?;

        let fps = parse_framerate(&probe);
        if fps <= 0.0 {
            return Err(CoreError::UnsupportedInput(format!(
                "Invalid FPS for {}",
                path.display()
            )));
        }
        let (width, height) = parse_resolution(&probe);
        if width == 0 || height == 0 {
            return Err(CoreError::UnsupportedInput(format!(
                "Unknown resolution for {}",
                path.display()
            )));
        }

        let source = FfmpegFrameSource::spawn(&self.ffmpeg_bin, input, fps, width, height)?;
        Ok(Box::new(source))
    }
}

fn unreadable(path: &Path, err: &FfmpegError) -> CoreError {
    CoreError::UnsupportedInput(format!("Cannot open video {}: {err}", path.display()))
}

fn is_ascii_path(path: &Path) -> bool {
    path.to_str().is_some_and(|s| s.is_ascii())
}

// ---------------------------------------------------------------------------
// Scratch-copy input
// ---------------------------------------------------------------------------

/// A readable location for a video, possibly a private scratch copy.
///
/// The scratch file is deleted when this value drops; removal failures are
/// ignored.
#[derive(Debug)]
pub struct MediaInput {
    path: PathBuf,
    scratch: Option<NamedTempFile>,
}

impl MediaInput {
    pub fn direct(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            scratch: None,
        }
    }

    /// Copy `path` into a scratch file that keeps the original extension.
    pub fn scratch_copy(path: &Path) -> Result<Self, CoreError> {
        let suffix = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let scratch = tempfile::Builder::new()
            .prefix("labelflow-")
            .suffix(&suffix)
            .tempfile()?;
        std::fs::copy(path, scratch.path())?;
        Ok(Self {
            path: scratch.path().to_path_buf(),
            scratch: Some(scratch),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }
}

// ---------------------------------------------------------------------------
// Frame source
// ---------------------------------------------------------------------------

/// Sequential `rgb24` frames read from an `ffmpeg` child process.
///
/// The child is killed and reaped on drop, before the input (and any scratch
/// copy) is released.
pub struct FfmpegFrameSource {
    child: Child,
    stdout: ChildStdout,
    fps: f64,
    width: u32,
    height: u32,
    decoded: u64,
    finished: bool,
    _input: MediaInput,
}

impl FfmpegFrameSource {
    fn spawn(
        ffmpeg_bin: &Path,
        input: MediaInput,
        fps: f64,
        width: u32,
        height: u32,
    ) -> Result<Self, CoreError> {
        let mut child = Command::new(ffmpeg_bin)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(input.path())
            .args([
                "-map", "0:v:0", "-vsync", "passthrough", "-f", "rawvideo", "-pix_fmt", "rgb24",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                CoreError::Internal(format!("ffmpeg unavailable ({}): {e}", ffmpeg_bin.display()))
            })?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CoreError::Internal("ffmpeg stdout was not captured".into()))?;

        Ok(Self {
            child,
            stdout,
            fps,
            width,
            height,
            decoded: 0,
            finished: false,
            _input: input,
        })
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl FrameSource for FfmpegFrameSource {
    fn fps(&self) -> f64 {
        self.fps
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>, CoreError> {
        if self.finished {
            return Ok(None);
        }

        let mut rgb = vec![0u8; self.frame_len()];
        let filled = read_full(&mut self.stdout, &mut rgb)?;

        if filled == rgb.len() {
            self.decoded += 1;
            return Ok(Some(DecodedFrame {
                width: self.width,
                height: self.height,
                rgb,
            }));
        }

        self.finished = true;
        if filled > 0 {
            tracing::warn!(
                bytes = filled,
                expected = rgb.len(),
                "Discarding truncated trailing frame"
            );
        }

        let status = self.child.wait()?;
        if !status.success() && self.decoded == 0 {
            return Err(CoreError::UnsupportedInput(format!(
                "ffmpeg could not decode any frame (exit code {:?})",
                status.code()
            )));
        }
        Ok(None)
    }
}

impl Drop for FfmpegFrameSource {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ---------------------------------------------------------------------------
// ffprobe invocation and parsing helpers
// ---------------------------------------------------------------------------

/// Run `ffprobe` on a video file and return the parsed JSON output.
pub fn probe_video(ffprobe_bin: &Path, path: &Path) -> Result<FfprobeOutput, FfmpegError> {
    let output = Command::new(ffprobe_bin)
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(FfmpegError::NotFound)?;

    if !output.status.success() {
        return Err(FfmpegError::ExecutionFailed {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str::<FfprobeOutput>(&stdout)
        .map_err(|e| FfmpegError::ParseError(format!("{e}: {stdout}")))
}

/// Find the first video stream in the ffprobe output.
fn first_video_stream(probe: &FfprobeOutput) -> Option<&FfprobeStream> {
    probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
}

/// Parse the video duration in seconds from ffprobe output.
pub fn parse_duration(probe: &FfprobeOutput) -> f64 {
    // Format-level duration first, then the first video stream.
    let stream_duration = first_video_stream(probe).and_then(|s| s.duration.as_deref());
    [probe.format.duration.as_deref(), stream_duration]
        .into_iter()
        .flatten()
        .find_map(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// Parse the video framerate from ffprobe output.
///
/// Prefers `r_frame_rate`, falling back to `avg_frame_rate`. Both are
/// fractions like `"30/1"` or `"24000/1001"`.
pub fn parse_framerate(probe: &FfprobeOutput) -> f64 {
    let Some(stream) = first_video_stream(probe) else {
        return 0.0;
    };
    [stream.r_frame_rate.as_deref(), stream.avg_frame_rate.as_deref()]
        .into_iter()
        .flatten()
        .map(parse_fraction)
        .find(|fps| *fps > 0.0)
        .unwrap_or(0.0)
}

/// Parse a fraction string like `"30/1"` into a float.
fn parse_fraction(s: &str) -> f64 {
    if let Some((num, den)) = s.split_once('/') {
        let num = num.parse::<f64>().unwrap_or(0.0);
        let den = den.parse::<f64>().unwrap_or(1.0);
        return if den > 0.0 { num / den } else { 0.0 };
    }
    s.parse::<f64>().unwrap_or(0.0)
}

/// Count total frames from ffprobe output.
pub fn parse_total_frames(probe: &FfprobeOutput) -> u64 {
    if let Some(n) = first_video_stream(probe)
        .and_then(|s| s.nb_frames.as_deref())
        .and_then(|nb| nb.parse::<u64>().ok())
    {
        return n;
    }
    // Estimate from duration * framerate.
    let duration = parse_duration(probe);
    let fps = parse_framerate(probe);
    if duration > 0.0 && fps > 0.0 {
        return (duration * fps).round() as u64;
    }
    0
}

/// Find the first video stream's resolution.
pub fn parse_resolution(probe: &FfprobeOutput) -> (u32, u32) {
    first_video_stream(probe)
        .map(|s| (s.width.unwrap_or(0), s.height.unwrap_or(0)))
        .unwrap_or((0, 0))
}
