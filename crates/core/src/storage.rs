//! Storage roots and directory-scan helpers.
//!
//! There is no index or database: every count and listing is a fresh scan of
//! these directories, so external edits are visible immediately.

use std::io;
use std::path::{Component, Path, PathBuf};

use crate::error::CoreError;

/// Directory holding uploaded video files (optionally nested in folders).
pub const UPLOADS_DIR: &str = "uploads";

/// Directory holding one subdirectory of frame stills per video.
pub const FRAMES_DIR: &str = "frames";

/// Directory holding one subdirectory of label artifacts per video.
pub const LABELS_DIR: &str = "labels";

/// The three storage roots under a common data directory.
#[derive(Debug, Clone)]
pub struct DataRoots {
    pub uploads: PathBuf,
    pub frames: PathBuf,
    pub labels: PathBuf,
}

impl DataRoots {
    pub fn from_base(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            uploads: base.join(UPLOADS_DIR),
            frames: base.join(FRAMES_DIR),
            labels: base.join(LABELS_DIR),
        }
    }

    /// Create all roots if they do not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        for dir in [&self.uploads, &self.frames, &self.labels] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn frames_dir(&self, video_id: &str) -> PathBuf {
        self.frames.join(video_id)
    }

    pub fn labels_dir(&self, video_id: &str) -> PathBuf {
        self.labels.join(video_id)
    }
}

/// Validate an upload folder name and turn it into a relative path.
///
/// Only plain path components are accepted; anything that could escape the
/// uploads root is rejected.
pub fn sanitize_folder(folder: &str) -> Result<Option<PathBuf>, CoreError> {
    let normalized = folder.trim().replace('\\', "/");
    if normalized.is_empty() {
        return Ok(None);
    }

    let mut out = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            _ => {
                return Err(CoreError::Validation(format!(
                    "invalid folder name '{folder}'"
                )))
            }
        }
    }

    Ok((!out.as_os_str().is_empty()).then_some(out))
}

/// Recursively collect every regular file under `root`.
///
/// A missing root yields an empty list.
pub fn walk_files(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }

    Ok(files)
}

/// Files directly inside `dir` with extension `ext`, sorted by filename.
///
/// A missing directory yields an empty list.
pub fn files_with_extension(dir: &Path, ext: &str) -> io::Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && path.extension().is_some_and(|e| e == ext) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Remove a directory tree, returning how many `ext` files it held.
///
/// Removing a missing directory is a no-op returning zero.
pub fn remove_dir_counting(dir: &Path, ext: &str) -> io::Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }
    let count = files_with_extension(dir, ext)?.len();
    std::fs::remove_dir_all(dir)?;
    Ok(count)
}

/// Remove a file, treating "already gone" as success.
///
/// Returns whether a file was actually removed.
pub fn remove_file_if_exists(path: &Path) -> io::Result<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
