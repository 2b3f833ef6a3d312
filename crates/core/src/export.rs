//! Dataset archive packaging.
//!
//! Archive layout:
//!
//! ```text
//! classes.txt                  taxonomy names, one per line, index order
//! images/<stem>.jpg
//! labels/<stem>.txt            stored artifact, or re-encoded by class id
//! ```

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use serde::{Deserialize, Serialize};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::CoreError;
use crate::frame_store::{FrameStore, FrameSummary};
use crate::label::{decode_label_bytes, encode_labels_with_ids};

/// Name of the taxonomy manifest inside the archive.
pub const MANIFEST_NAME: &str = "classes.txt";

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExportOptions {
    #[serde(default = "default_only_approved")]
    pub only_approved: bool,
    #[serde(default)]
    pub use_class_id: bool,
}

fn default_only_approved() -> bool {
    true
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            only_approved: true,
            use_class_id: false,
        }
    }
}

/// Download name for a video's archive.
pub fn archive_filename(video_id: &str) -> String {
    format!("{video_id}_labels.zip")
}

/// Build the archive for `video_id` in memory.
///
/// Fails with `NotFound` when the video has no frames at all. With
/// `only_approved` and nothing approved, the archive holds only the manifest.
pub fn build_archive(
    store: &FrameStore,
    video_id: &str,
    options: ExportOptions,
) -> Result<Vec<u8>, CoreError> {
    let frames = frames_of(store, video_id)?;
    let included: Vec<&FrameSummary> = frames
        .iter()
        .filter(|f| !options.only_approved || f.status.is_approved())
        .collect();

    let zip_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

    zip.start_file(MANIFEST_NAME, zip_options)?;
    zip.write_all(store.taxonomy().manifest().as_bytes())?;

    let mut labels_written = 0usize;
    for frame in &included {
        let image = std::fs::read(&frame.image_path)?;
        zip.start_file(format!("images/{}", frame.filename), zip_options)?;
        zip.write_all(&image)?;

        let Some(label_path) = &frame.label_path else {
            continue;
        };
        let stored = std::fs::read(label_path)?;
        let body = if options.use_class_id {
            encode_labels_with_ids(&decode_label_bytes(&stored, store.taxonomy())).into_bytes()
        } else {
            stored
        };
        let label_name = label_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        zip.start_file(format!("labels/{label_name}"), zip_options)?;
        zip.write_all(&body)?;
        labels_written += 1;
    }

    let bytes = zip.finish()?.into_inner();
    tracing::info!(
        video_id,
        frames = included.len(),
        labels = labels_written,
        use_class_id = options.use_class_id,
        bytes = bytes.len(),
        "Export archive built"
    );
    Ok(bytes)
}

/// Approval progress and per-class counts for one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportStats {
    pub video_id: String,
    pub total_frames: usize,
    pub approved_frames: usize,
    pub pending_frames: usize,
    pub exportable_frames: usize,
    /// `approved / total`, in `[0, 1]`.
    pub approval_ratio: f64,
    /// Label count per class name over approved frames.
    pub class_distribution: BTreeMap<String, usize>,
}

pub fn export_stats(store: &FrameStore, video_id: &str) -> Result<ExportStats, CoreError> {
    let frames = frames_of(store, video_id)?;
    let total = frames.len();

    let mut approved = 0usize;
    let mut class_distribution = BTreeMap::new();
    for frame in frames.iter().filter(|f| f.status.is_approved()) {
        approved += 1;
        let Some(label_path) = &frame.label_path else {
            continue;
        };
        let content = std::fs::read(label_path)?;
        for label in decode_label_bytes(&content, store.taxonomy()) {
            *class_distribution.entry(label.class_name).or_insert(0) += 1;
        }
    }

    Ok(ExportStats {
        video_id: video_id.to_string(),
        total_frames: total,
        approved_frames: approved,
        pending_frames: total - approved,
        exportable_frames: approved,
        approval_ratio: if total == 0 {
            0.0
        } else {
            approved as f64 / total as f64
        },
        class_distribution,
    })
}

fn frames_of(store: &FrameStore, video_id: &str) -> Result<Vec<FrameSummary>, CoreError> {
    let frames = store.list_frames(video_id)?;
    if frames.is_empty() {
        return Err(CoreError::not_found("Video frames", video_id));
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::Label;
    use crate::storage::DataRoots;
    use crate::taxonomy::ClassTaxonomy;
    use crate::testing::SyntheticBackend;
    use assert_matches::assert_matches;
    use std::io::Read;
    use std::sync::Arc;

    fn store_with_frames(dir: &std::path::Path) -> FrameStore {
        let roots = DataRoots::from_base(dir);
        roots.ensure().unwrap();
        let store = FrameStore::new(
            roots,
            Arc::new(ClassTaxonomy::default()),
            Arc::new(SyntheticBackend::default()),
        );
        store.save_video(b"data", "clip.mp4", None, None).unwrap();
        store.extract_frames("clip", 1.0, false).unwrap();
        store
            .save_labels(
                "clip",
                "clip_0001",
                &[Label {
                    class_id: 1,
                    class_name: "car".into(),
                    x_center: 0.5,
                    y_center: 0.5,
                    width: 0.2,
                    height: 0.1,
                }],
            )
            .unwrap();
        store
    }

    fn read_entry(archive: &[u8], name: &str) -> String {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut out = String::new();
        zip.by_name(name).unwrap().read_to_string(&mut out).unwrap();
        out
    }

    fn entry_names(archive: &[u8]) -> Vec<String> {
        let zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        let mut names: Vec<String> = zip.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn approved_only_archive() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_frames(dir.path());

        let archive = build_archive(&store, "clip", ExportOptions::default()).unwrap();

        assert_eq!(
            entry_names(&archive),
            vec![
                "classes.txt",
                "images/clip_frame_0001.jpg",
                "labels/clip_frame_0001.txt",
            ]
        );
        assert_eq!(
            read_entry(&archive, "labels/clip_frame_0001.txt"),
            "car 0.500000 0.500000 0.200000 0.100000"
        );
        let manifest = read_entry(&archive, "classes.txt");
        assert_eq!(manifest.lines().next(), Some("person"));
        assert_eq!(manifest.lines().count(), 12);
    }

    #[test]
    fn class_id_mode_reencodes_leading_token() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_frames(dir.path());

        let options = ExportOptions {
            only_approved: true,
            use_class_id: true,
        };
        let archive = build_archive(&store, "clip", options).unwrap();
        assert_eq!(
            read_entry(&archive, "labels/clip_frame_0001.txt"),
            "1 0.500000 0.500000 0.200000 0.100000"
        );
    }

    #[test]
    fn all_frames_archive_includes_pending_images() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_frames(dir.path());

        let options = ExportOptions {
            only_approved: false,
            use_class_id: false,
        };
        let names = entry_names(&build_archive(&store, "clip", options).unwrap());
        assert_eq!(names.iter().filter(|n| n.starts_with("images/")).count(), 3);
        assert_eq!(names.iter().filter(|n| n.starts_with("labels/")).count(), 1);
    }

    #[test]
    fn video_without_frames_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_frames(dir.path());
        assert_matches!(
            build_archive(&store, "nothing", ExportOptions::default()),
            Err(CoreError::NotFound { .. })
        );
        assert_matches!(export_stats(&store, "nothing"), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn stats_count_classes_over_approved_frames() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_frames(dir.path());

        let stats = export_stats(&store, "clip").unwrap();
        assert_eq!(stats.total_frames, 3);
        assert_eq!(stats.approved_frames, 1);
        assert_eq!(stats.pending_frames, 2);
        assert_eq!(stats.exportable_frames, 1);
        assert!((stats.approval_ratio - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.class_distribution.get("car"), Some(&1));
    }
}
