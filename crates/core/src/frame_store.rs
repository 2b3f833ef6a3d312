//! Frame store: videos, frames, and label artifacts on the filesystem.
//!
//! Nothing here is cached. Listings, counts, and statuses come from a scan of
//! the storage roots at call time, so a file added or removed by hand shows
//! up on the next call.
//!
//! There is no locking. Writers to different frames touch different files;
//! two writers to the same label artifact race and the last rename wins.
//! Deleting and extracting the same video concurrently must be serialized by
//! the caller.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::error::CoreError;
use crate::extractor::{self, ExtractedFrame};
use crate::label::{decode_label_bytes, encode_labels, Label};
use crate::media::{MediaBackend, VideoInfo};
use crate::naming::{
    is_supported_video, is_video_id, video_id_from_filename, FrameId, FRAME_EXTENSION,
    LABEL_EXTENSION, SUPPORTED_VIDEO_EXTENSIONS,
};
use crate::storage::{self, DataRoots};
use crate::taxonomy::ClassTaxonomy;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Review status of a frame, derived from its label artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Approved,
    Pending,
}

impl FrameStatus {
    pub fn is_approved(self) -> bool {
        self == Self::Approved
    }
}

/// An uploaded video with live frame and label counts.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSummary {
    pub video_id: String,
    pub filename: String,
    pub folder_name: Option<String>,
    pub size_bytes: u64,
    pub frames_count: usize,
    /// Label artifacts on disk, whatever their content.
    pub labels_count: usize,
    pub approved_count: usize,
    pub pending_count: usize,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Result of storing an upload.
#[derive(Debug, Clone, Serialize)]
pub struct SavedVideo {
    pub video_id: String,
    pub filename: String,
    pub folder_name: Option<String>,
    #[serde(flatten)]
    pub info: VideoInfo,
    #[serde(skip)]
    pub path: PathBuf,
}

/// What a cascade delete removed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeletedVideo {
    pub video_id: String,
    pub video_deleted: bool,
    pub deleted_frames: usize,
    pub deleted_labels: usize,
}

/// What a cascade delete would remove.
#[derive(Debug, Clone, Serialize)]
pub struct DeleteInfo {
    pub video_id: String,
    pub filename: String,
    pub frames_count: usize,
    pub labels_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameSummary {
    pub frame_id: String,
    pub sequence: u32,
    pub filename: String,
    pub status: FrameStatus,
    #[serde(skip)]
    pub image_path: PathBuf,
    /// Set when a label artifact exists, even an empty one.
    #[serde(skip)]
    pub label_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameDetail {
    pub frame_id: String,
    pub video_id: String,
    pub filename: String,
    pub status: FrameStatus,
    /// Current pixel size of the still; zero when the image cannot be read.
    pub width: u32,
    pub height: u32,
    pub labels: Vec<Label>,
    #[serde(skip)]
    pub image_path: PathBuf,
}

/// Totals across every stored video.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalStats {
    pub total_videos: usize,
    pub total_frames: usize,
    pub approved_frames: usize,
    pub pending_frames: usize,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

pub struct FrameStore {
    roots: DataRoots,
    taxonomy: Arc<ClassTaxonomy>,
    media: Arc<dyn MediaBackend>,
}

impl FrameStore {
    pub fn new(
        roots: DataRoots,
        taxonomy: Arc<ClassTaxonomy>,
        media: Arc<dyn MediaBackend>,
    ) -> Self {
        Self {
            roots,
            taxonomy,
            media,
        }
    }

    pub fn roots(&self) -> &DataRoots {
        &self.roots
    }

    pub fn taxonomy(&self) -> &ClassTaxonomy {
        &self.taxonomy
    }

    // -- videos -------------------------------------------------------------

    /// Every supported video under the uploads root, sorted by filename.
    pub fn list_videos(&self) -> Result<Vec<VideoSummary>, CoreError> {
        let mut paths: Vec<PathBuf> = storage::walk_files(&self.roots.uploads)?
            .into_iter()
            .filter(|p| is_supported_video(p))
            .collect();
        paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));

        paths.iter().map(|p| self.summarize(p)).collect()
    }

    fn summarize(&self, path: &Path) -> Result<VideoSummary, CoreError> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let video_id = video_id_from_filename(&filename);

        let folder_name = path
            .parent()
            .and_then(|parent| parent.strip_prefix(&self.roots.uploads).ok())
            .filter(|rel| !rel.as_os_str().is_empty())
            .map(|rel| rel.to_string_lossy().replace('\\', "/"));

        let frames = self.list_frames(&video_id)?;
        let frames_count = frames.len();
        let approved_count = frames.iter().filter(|f| f.status.is_approved()).count();
        let labels_count =
            storage::files_with_extension(&self.roots.labels_dir(&video_id), LABEL_EXTENSION)?
                .len();

        Ok(VideoSummary {
            size_bytes: std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            video_id,
            filename,
            folder_name,
            frames_count,
            labels_count,
            approved_count,
            pending_count: frames_count.saturating_sub(approved_count),
            path: path.to_path_buf(),
        })
    }

    /// The first stored video whose derived id is `video_id`.
    pub fn find_video(&self, video_id: &str) -> Result<VideoSummary, CoreError> {
        if !is_video_id(video_id) {
            return Err(CoreError::not_found("Video", video_id));
        }
        self.list_videos()?
            .into_iter()
            .find(|v| v.video_id == video_id)
            .ok_or_else(|| CoreError::not_found("Video", video_id))
    }

    /// Store an upload and probe it.
    ///
    /// The id comes from `custom_name` when it is non-blank, else from the
    /// filename; a custom name also renames the stored file. An existing
    /// file at the target path is overwritten. An upload that cannot be
    /// probed as a video is removed again.
    pub fn save_video(
        &self,
        bytes: &[u8],
        filename: &str,
        folder: Option<&str>,
        custom_name: Option<&str>,
    ) -> Result<SavedVideo, CoreError> {
        let normalized = filename.replace('\\', "/");
        let base = normalized.rsplit('/').next().unwrap_or_default().trim();
        if base.is_empty() {
            return Err(CoreError::Validation("upload has no filename".into()));
        }
        if !is_supported_video(Path::new(base)) {
            return Err(CoreError::UnsupportedInput(format!(
                "Unsupported format '{base}'. Supported: {}",
                SUPPORTED_VIDEO_EXTENSIONS.join(", ")
            )));
        }

        let (video_id, stored_name) = match custom_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(custom) => {
                let id = video_id_from_filename(custom);
                let ext = Path::new(base)
                    .extension()
                    .map(|e| e.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let name = format!("{id}.{ext}");
                (id, name)
            }
            None => (video_id_from_filename(base), base.to_string()),
        };

        let folder_rel = folder.map(storage::sanitize_folder).transpose()?.flatten();
        let target_dir = match &folder_rel {
            Some(rel) => self.roots.uploads.join(rel),
            None => self.roots.uploads.clone(),
        };
        std::fs::create_dir_all(&target_dir)?;
        let path = target_dir.join(&stored_name);
        std::fs::write(&path, bytes)?;

        let info = match self.media.probe(&path) {
            Ok(info) => info,
            Err(e @ CoreError::UnsupportedInput(_)) => {
                if let Err(cleanup) = std::fs::remove_file(&path) {
                    tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove unreadable upload");
                }
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        tracing::info!(
            video_id = %video_id,
            filename = %stored_name,
            bytes = bytes.len(),
            fps = info.fps,
            total_frames = info.total_frames,
            "Video stored"
        );

        Ok(SavedVideo {
            video_id,
            filename: stored_name,
            folder_name: folder_rel.map(|rel| rel.to_string_lossy().replace('\\', "/")),
            info,
            path,
        })
    }

    /// Remove a video file and all of its frames and labels.
    ///
    /// Deleting an unknown id removes nothing and reports zero counts.
    pub fn delete_video(&self, video_id: &str) -> Result<DeletedVideo, CoreError> {
        let mut deleted = DeletedVideo {
            video_id: video_id.to_string(),
            ..Default::default()
        };
        if !is_video_id(video_id) {
            return Ok(deleted);
        }

        match self.find_video(video_id) {
            Ok(video) => deleted.video_deleted = storage::remove_file_if_exists(&video.path)?,
            Err(CoreError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        deleted.deleted_frames =
            storage::remove_dir_counting(&self.roots.frames_dir(video_id), FRAME_EXTENSION)?;
        deleted.deleted_labels =
            storage::remove_dir_counting(&self.roots.labels_dir(video_id), LABEL_EXTENSION)?;

        tracing::info!(
            video_id,
            video_deleted = deleted.video_deleted,
            frames = deleted.deleted_frames,
            labels = deleted.deleted_labels,
            "Video deleted"
        );
        Ok(deleted)
    }

    pub fn delete_info(&self, video_id: &str) -> Result<DeleteInfo, CoreError> {
        let video = self.find_video(video_id)?;
        Ok(DeleteInfo {
            video_id: video.video_id,
            filename: video.filename,
            frames_count: video.frames_count,
            labels_count: video.labels_count,
        })
    }

    /// Sample a stored video into frame stills.
    ///
    /// Existing frames are kept and same-named stills overwritten unless
    /// `replace_existing` is set, which first clears the video's frames and
    /// labels.
    pub fn extract_frames(
        &self,
        video_id: &str,
        interval_sec: f64,
        replace_existing: bool,
    ) -> Result<Vec<ExtractedFrame>, CoreError> {
        let video = self.find_video(video_id)?;
        let frames_dir = self.roots.frames_dir(video_id);

        if replace_existing {
            let frames = storage::remove_dir_counting(&frames_dir, FRAME_EXTENSION)?;
            let labels =
                storage::remove_dir_counting(&self.roots.labels_dir(video_id), LABEL_EXTENSION)?;
            tracing::info!(video_id, frames, labels, "Cleared previous extraction");
        }

        let mut source = self.media.open_frames(&video.path)?;
        extractor::extract_frames(source.as_mut(), video_id, &frames_dir, interval_sec)
    }

    // -- frames -------------------------------------------------------------

    /// Frames of a video in filename order, with derived status.
    pub fn list_frames(&self, video_id: &str) -> Result<Vec<FrameSummary>, CoreError> {
        if !is_video_id(video_id) {
            return Ok(Vec::new());
        }
        let labels_dir = self.roots.labels_dir(video_id);
        let images = storage::files_with_extension(&self.roots.frames_dir(video_id), FRAME_EXTENSION)?;

        let mut frames = Vec::with_capacity(images.len());
        for image_path in images {
            let stem = image_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let Some(id) = FrameId::from_stem(video_id, &stem) else {
                tracing::debug!(file = %image_path.display(), "Skipping file with foreign name");
                continue;
            };

            let label_path = labels_dir.join(id.label_filename());
            let (status, label_path) = match std::fs::read(&label_path) {
                Ok(content) => (self.status_of(&content), Some(label_path)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => (FrameStatus::Pending, None),
                Err(e) => return Err(e.into()),
            };

            frames.push(FrameSummary {
                frame_id: id.to_string(),
                sequence: id.sequence(),
                filename: id.image_filename(),
                status,
                image_path,
                label_path,
            });
        }
        Ok(frames)
    }

    fn status_of(&self, label_content: &[u8]) -> FrameStatus {
        if decode_label_bytes(label_content, &self.taxonomy).is_empty() {
            FrameStatus::Pending
        } else {
            FrameStatus::Approved
        }
    }

    /// Resolve a request frame id and the paths of its image and label.
    fn locate(&self, video_id: &str, frame_id: &str) -> Result<(FrameId, PathBuf, PathBuf), CoreError> {
        if !is_video_id(video_id) {
            return Err(CoreError::not_found("Video", video_id));
        }
        let id = FrameId::parse(video_id, frame_id)?;
        let image = self.roots.frames_dir(video_id).join(id.image_filename());
        let label = self.roots.labels_dir(video_id).join(id.label_filename());
        Ok((id, image, label))
    }

    /// Locate a frame whose image must exist.
    fn locate_existing(
        &self,
        video_id: &str,
        frame_id: &str,
    ) -> Result<(FrameId, PathBuf, PathBuf), CoreError> {
        let located = self.locate(video_id, frame_id)?;
        if !located.1.is_file() {
            return Err(CoreError::not_found("Frame", frame_id));
        }
        Ok(located)
    }

    pub fn get_frame(&self, video_id: &str, frame_id: &str) -> Result<FrameDetail, CoreError> {
        let (id, image_path, label_path) = self.locate_existing(video_id, frame_id)?;
        let labels = self.read_label_file(&label_path)?;

        let (width, height) = image::image_dimensions(&image_path).unwrap_or_else(|e| {
            tracing::warn!(frame_id = %id, error = %e, "Cannot read frame dimensions");
            (0, 0)
        });

        Ok(FrameDetail {
            frame_id: id.to_string(),
            video_id: video_id.to_string(),
            filename: id.image_filename(),
            status: if labels.is_empty() {
                FrameStatus::Pending
            } else {
                FrameStatus::Approved
            },
            width,
            height,
            labels,
            image_path,
        })
    }

    /// Path of the stored still, for serving its bytes.
    pub fn frame_image(&self, video_id: &str, frame_id: &str) -> Result<PathBuf, CoreError> {
        self.locate_existing(video_id, frame_id)
            .map(|(_, image, _)| image)
    }

    // -- labels -------------------------------------------------------------

    /// Decoded labels of a frame; empty when no artifact exists.
    pub fn read_labels(&self, video_id: &str, frame_id: &str) -> Result<Vec<Label>, CoreError> {
        let (_, _, label_path) = self.locate(video_id, frame_id)?;
        self.read_label_file(&label_path)
    }

    fn read_label_file(&self, path: &Path) -> Result<Vec<Label>, CoreError> {
        match std::fs::read(path) {
            Ok(content) => Ok(decode_label_bytes(&content, &self.taxonomy)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace a frame's label set.
    ///
    /// A non-empty set is written to a sibling temp file and renamed over the
    /// artifact; an empty set removes the artifact. Returns the stored count.
    pub fn save_labels(
        &self,
        video_id: &str,
        frame_id: &str,
        labels: &[Label],
    ) -> Result<usize, CoreError> {
        let (id, _, label_path) = self.locate_existing(video_id, frame_id)?;

        if labels.is_empty() {
            storage::remove_file_if_exists(&label_path)?;
            tracing::debug!(frame_id = %id, "Cleared labels");
            return Ok(0);
        }

        let dir = self.roots.labels_dir(video_id);
        std::fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(encode_labels(labels).as_bytes())?;
        tmp.persist(&label_path).map_err(|e| e.error)?;

        tracing::debug!(frame_id = %id, count = labels.len(), "Saved labels");
        Ok(labels.len())
    }

    /// Remove a frame's label artifact. Returns whether one existed.
    pub fn delete_label(&self, video_id: &str, frame_id: &str) -> Result<bool, CoreError> {
        let label_path = match self.locate(video_id, frame_id) {
            Ok((_, _, label)) => label,
            Err(CoreError::NotFound { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };
        Ok(storage::remove_file_if_exists(&label_path)?)
    }

    // -- stats --------------------------------------------------------------

    pub fn global_stats(&self) -> Result<GlobalStats, CoreError> {
        let videos = self.list_videos()?;
        Ok(GlobalStats {
            total_videos: videos.len(),
            total_frames: videos.iter().map(|v| v.frames_count).sum(),
            approved_frames: videos.iter().map(|v| v.approved_count).sum(),
            pending_frames: videos.iter().map(|v| v.pending_count).sum(),
        })
    }
}
