//! [`Detector`] backed by an external command.
//!
//! Protocol, one process per call:
//!
//! - `<cmd> --classes` prints `{"names": {"<id>": "<name>", ...}}`.
//! - `<cmd> <image>` prints `[{"class": <id>, "confidence": <f>, "box": [x1, y1, x2, y2]}, ...]`
//!   with pixel coordinates.
//!
//! Anything the command writes to stderr is included in the error on a
//! non-zero exit.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Instant;

use serde::Deserialize;

use crate::detector::{Detector, RawDetection};
use crate::error::CoreError;

/// Maximum stderr bytes quoted in an error message.
const MAX_STDERR_IN_ERROR: usize = 2048;

#[derive(Debug, Deserialize)]
struct ClassesReply {
    names: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct DetectionReply {
    class: usize,
    confidence: f64,
    #[serde(rename = "box")]
    bbox: [f64; 4],
}

#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
    names: BTreeMap<usize, String>,
}

impl CommandDetector {
    /// Split `command_line` on whitespace and read the detector vocabulary.
    pub fn load(command_line: &str) -> Result<Self, CoreError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| CoreError::ModelUnavailable("detector command is empty".into()))?;
        let args: Vec<String> = parts.collect();

        let mut detector = Self {
            program,
            args,
            names: BTreeMap::new(),
        };

        let stdout = detector.run("--classes")?;
        let reply: ClassesReply = serde_json::from_slice(&stdout).map_err(|e| {
            CoreError::ModelUnavailable(format!("invalid class list from detector: {e}"))
        })?;

        for (id, name) in reply.names {
            let id = id.trim().parse::<usize>().map_err(|_| {
                CoreError::ModelUnavailable(format!("non-numeric detector class id '{id}'"))
            })?;
            detector.names.insert(id, name);
        }

        tracing::info!(
            program = %detector.program,
            classes = detector.names.len(),
            "Command detector loaded"
        );
        Ok(detector)
    }

    fn run(&self, last_arg: impl AsRef<OsStr>) -> Result<Vec<u8>, CoreError> {
        let start = Instant::now();
        let output: Output = Command::new(&self.program)
            .args(&self.args)
            .arg(last_arg)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                CoreError::ModelUnavailable(format!("failed to run '{}': {e}", self.program))
            })?;

        tracing::debug!(
            program = %self.program,
            exit_code = ?output.status.code(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Detector command finished"
        );

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr: String = stderr.chars().take(MAX_STDERR_IN_ERROR).collect();
            return Err(CoreError::Internal(format!(
                "detector exited with {:?}: {}",
                output.status.code(),
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl Detector for CommandDetector {
    fn class_names(&self) -> BTreeMap<usize, String> {
        self.names.clone()
    }

    fn predict(&self, image: &Path) -> Result<Vec<RawDetection>, CoreError> {
        let stdout = self.run(image)?;
        let replies: Vec<DetectionReply> = serde_json::from_slice(&stdout)
            .map_err(|e| CoreError::Internal(format!("invalid detector output: {e}")))?;

        Ok(replies
            .into_iter()
            .map(|r| RawDetection {
                class_id: r.class,
                confidence: r.confidence,
                bbox: r.bbox,
            })
            .collect())
    }
}
