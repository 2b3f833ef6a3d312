//! Deterministic identity and file naming for videos, frames, and labels.
//!
//! Layout convention:
//!
//! ```text
//! frames/<video_id>/<video_id>_frame_<NNNN>.jpg
//! labels/<video_id>/<video_id>_frame_<NNNN>.txt
//! ```
//!
//! A frame id is `<video_id>_<NNNN>`; the `NNNN` sequence is the extraction
//! output index, zero-padded to at least four digits.

use std::fmt;
use std::path::Path;

use crate::error::CoreError;

/// Maximum length of a sanitized video id.
pub const MAX_VIDEO_ID_LEN: usize = 50;

/// Id used when sanitizing leaves nothing behind.
pub const DEFAULT_VIDEO_ID: &str = "video";

/// Video container extensions accepted for upload and scanning (lowercase).
pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["avi", "mp4", "mov", "mkv", "wmv"];

/// Extension of stored frame stills.
pub const FRAME_EXTENSION: &str = "jpg";

/// Extension of label artifacts.
pub const LABEL_EXTENSION: &str = "txt";

/// Separator between the video id and the sequence in file stems.
const FRAME_STEM_MARKER: &str = "_frame_";

/// Derive a video id from a filename or display name.
///
/// Drops the extension, replaces every character that is not an ASCII
/// alphanumeric or underscore with `_`, collapses repeated underscores, trims
/// them from both ends, and caps the length.
///
/// ```
/// use labelflow_core::naming::video_id_from_filename;
///
/// assert_eq!(video_id_from_filename("My Clip.MP4"), "My_Clip");
/// assert_eq!(video_id_from_filename("über.mp4"), "ber");
/// assert_eq!(video_id_from_filename("???.mp4"), "video");
/// ```
pub fn video_id_from_filename(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut id = String::with_capacity(stem.len());
    for c in stem.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' };
        if c == '_' && id.ends_with('_') {
            continue;
        }
        id.push(c);
    }

    let trimmed: String = id.trim_matches('_').chars().take(MAX_VIDEO_ID_LEN).collect();
    if trimmed.is_empty() {
        DEFAULT_VIDEO_ID.to_string()
    } else {
        trimmed
    }
}

/// Whether `id` is already in sanitized video-id form.
///
/// Ids taken from requests are checked with this before they are joined onto
/// a storage root.
pub fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_VIDEO_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Lowercased extension of `path`, if any.
pub fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
}

/// Whether `path` has a supported video container extension (case-insensitive).
pub fn is_supported_video(path: &Path) -> bool {
    extension_lowercase(path)
        .is_some_and(|ext| SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str()))
}

/// Identity of one extracted frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameId {
    video_id: String,
    sequence: u32,
}

impl FrameId {
    pub fn new(video_id: impl Into<String>, sequence: u32) -> Self {
        Self {
            video_id: video_id.into(),
            sequence,
        }
    }

    /// Parse a frame id belonging to `video_id`.
    ///
    /// Accepts the canonical `<video_id>_<NNNN>` form and the file-stem form
    /// `<video_id>_frame_<NNNN>`.
    pub fn parse(video_id: &str, raw: &str) -> Result<Self, CoreError> {
        let not_found = || CoreError::not_found("Frame", raw);

        let rest = raw
            .strip_prefix(video_id)
            .and_then(|r| r.strip_prefix('_'))
            .ok_or_else(not_found)?;
        let digits = rest.strip_prefix("frame_").unwrap_or(rest);

        if digits.len() < 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(not_found());
        }
        let sequence = digits.parse().map_err(|_| not_found())?;
        Ok(Self::new(video_id, sequence))
    }

    /// Recover a frame id from a stored file stem (`<video_id>_frame_<NNNN>`).
    pub fn from_stem(video_id: &str, stem: &str) -> Option<Self> {
        let (prefix, digits) = stem.rsplit_once(FRAME_STEM_MARKER)?;
        if prefix != video_id || digits.len() < 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(|seq| Self::new(video_id, seq))
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// File stem shared by the frame image and its label artifact.
    pub fn stem(&self) -> String {
        format!("{}{FRAME_STEM_MARKER}{:04}", self.video_id, self.sequence)
    }

    pub fn image_filename(&self) -> String {
        format!("{}.{FRAME_EXTENSION}", self.stem())
    }

    pub fn label_filename(&self) -> String {
        format!("{}.{LABEL_EXTENSION}", self.stem())
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{:04}", self.video_id, self.sequence)
    }
}
