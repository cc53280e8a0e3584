//! TOML configuration file loading
//!
//! Supports `~/.config/maitri/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct MaitriConfigFile {
    /// Gateway server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Upstream completion service configuration
    #[serde(default)]
    pub upstream: UpstreamFileConfig,

    /// Assistant front end configuration
    #[serde(default)]
    pub assistant: AssistantFileConfig,
}

/// Gateway server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Port to listen on
    pub port: Option<u16>,

    /// Requests per minute allowed across the gateway (unset = unlimited)
    pub rate_limit_rpm: Option<u32>,
}

/// Upstream chat-completion configuration
#[derive(Debug, Default, Deserialize)]
pub struct UpstreamFileConfig {
    /// Base URL of the OpenAI-compatible API (e.g. `https://openrouter.ai/api/v1`)
    pub url: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// API key (prefer `OPENROUTER_API_KEY`)
    pub api_key: Option<String>,

    /// `HTTP-Referer` header sent upstream
    pub referer: Option<String>,

    /// `X-Title` header sent upstream
    pub title: Option<String>,

    /// Request timeout in seconds (unset = transport default)
    pub timeout_secs: Option<u64>,
}

/// Assistant front end configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// Base URL of the gateway
    pub gateway_url: Option<String>,

    /// Activation phrase
    pub wake_phrase: Option<String>,

    /// Identity used when no face matches
    pub default_identity: Option<String>,

    /// Face sampling cadence in milliseconds
    pub sample_interval_ms: Option<u64>,

    /// Maximum descriptor distance for a face match
    pub match_threshold: Option<f32>,

    /// Speech engine poll interval in milliseconds
    pub speech_poll_ms: Option<u64>,

    /// Consecutive idle reads before playback counts as finished
    pub speech_idle_reads: Option<u32>,

    /// Delay before the report panel closes after a successful submit
    pub report_dismiss_ms: Option<u64>,

    /// Path to labeled face descriptors (JSON)
    pub face_references: Option<String>,

    /// Path to a JSON-lines face detection log to replay
    pub face_log: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `MaitriConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> MaitriConfigFile {
    config_file_path().map_or_else(MaitriConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> MaitriConfigFile {
    if !path.exists() {
        return MaitriConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                MaitriConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            MaitriConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/maitri/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("maitri").join("config.toml"))
}
