use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `600`). Extraction of a long
    /// video runs inside a single request.
    pub request_timeout_secs: u64,
    /// Root holding `uploads/`, `frames/` and `labels/` (default: `data`).
    pub data_dir: PathBuf,
    /// Optional JSON taxonomy replacing the built-in class list.
    pub taxonomy_path: Option<PathBuf>,
    /// External detector command line. Auto-labeling is unavailable when unset.
    pub detector_command: Option<String>,
    /// Confidence threshold used when an auto-label request omits one.
    pub default_confidence: f64,
    /// Maximum accepted upload body size in bytes.
    pub max_upload_bytes: usize,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `600`                      |
    /// | `DATA_DIR`             | `data`                     |
    /// | `TAXONOMY_PATH`        | unset                      |
    /// | `DETECTOR_COMMAND`     | unset                      |
    /// | `DEFAULT_CONFIDENCE`   | `0.35`                     |
    /// | `MAX_UPLOAD_BYTES`     | `4294967296`               |
    /// | `FFMPEG_BIN`           | `ffmpeg`                   |
    /// | `FFPROBE_BIN`          | `ffprobe`                  |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let data_dir = PathBuf::from(std::env::var("DATA_DIR").unwrap_or_else(|_| "data".into()));

        let taxonomy_path = non_empty_var("TAXONOMY_PATH").map(PathBuf::from);
        let detector_command = non_empty_var("DETECTOR_COMMAND");

        let default_confidence: f64 = std::env::var("DEFAULT_CONFIDENCE")
            .unwrap_or_else(|_| "0.35".into())
            .parse()
            .expect("DEFAULT_CONFIDENCE must be a valid f64");
        assert!(
            (0.0..=1.0).contains(&default_confidence),
            "DEFAULT_CONFIDENCE must be between 0 and 1"
        );

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| "4294967296".into())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let ffmpeg_bin = std::env::var("FFMPEG_BIN").unwrap_or_else(|_| "ffmpeg".into());
        let ffprobe_bin = std::env::var("FFPROBE_BIN").unwrap_or_else(|_| "ffprobe".into());

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            data_dir,
            taxonomy_path,
            detector_command,
            default_confidence,
            max_upload_bytes,
            ffmpeg_bin,
            ffprobe_bin,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
