//! Configuration management for the MAITRI gateway and assistant
//!
//! Values resolve as environment > TOML file > default.

pub mod file;

use std::path::PathBuf;
use std::time::Duration;

use self::file::MaitriConfigFile;
use crate::{Error, Result};

/// Default gateway port
pub const DEFAULT_PORT: u16 = 3000;

/// Default upstream base URL (OpenAI-compatible)
pub const DEFAULT_UPSTREAM_URL: &str = "https://openrouter.ai/api/v1";

/// Default completion model
pub const DEFAULT_MODEL: &str = "nvidia/nemotron-nano-9b-v2:free";

/// Default activation phrase
pub const DEFAULT_WAKE_PHRASE: &str = "hey maitri";

/// Identity used when nobody is recognized
pub const DEFAULT_IDENTITY: &str = "Crew Member";

/// MAITRI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway server configuration
    pub server: ServerConfig,

    /// Upstream completion service configuration
    pub upstream: UpstreamConfig,

    /// Assistant front end configuration
    pub assistant: AssistantConfig,
}

/// Gateway server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Global requests-per-minute budget; `None` disables rate limiting
    pub rate_limit_rpm: Option<u32>,
}

/// Upstream chat-completion configuration
#[derive(Clone)]
pub struct UpstreamConfig {
    /// Base URL, without the `/chat/completions` suffix
    pub url: String,

    /// Model identifier
    pub model: String,

    /// Bearer token for the upstream API
    pub api_key: Option<String>,

    /// `HTTP-Referer` header
    pub referer: String,

    /// `X-Title` header
    pub title: String,

    /// Request timeout; `None` leaves the transport default in place
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("url", &self.url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("referer", &self.referer)
            .field("title", &self.title)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Assistant front end configuration
#[derive(Debug, Clone)]
pub struct AssistantConfig {
    /// Base URL of the gateway
    pub gateway_url: String,

    /// Activation phrase (lowercase)
    pub wake_phrase: String,

    /// Identity used when no face matches
    pub default_identity: String,

    /// Face sampling cadence
    pub sample_interval: Duration,

    /// Maximum descriptor distance for a face match
    pub match_threshold: f32,

    /// Speech engine poll interval
    pub speech_poll: Duration,

    /// Consecutive idle reads before playback counts as finished
    pub speech_idle_reads: u32,

    /// Delay before the report panel closes after a successful submit
    pub report_dismiss: Duration,

    /// Labeled face descriptors (JSON)
    pub face_references: Option<PathBuf>,

    /// JSON-lines face detection log to replay
    pub face_log: Option<PathBuf>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            gateway_url: format!("http://localhost:{DEFAULT_PORT}"),
            wake_phrase: DEFAULT_WAKE_PHRASE.to_string(),
            default_identity: DEFAULT_IDENTITY.to_string(),
            sample_interval: Duration::from_millis(500),
            match_threshold: 0.6,
            speech_poll: Duration::from_millis(250),
            speech_idle_reads: 2,
            report_dismiss: Duration::from_secs(2),
            face_references: None,
            face_log: None,
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the standard config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        // .env is optional; a missing file is not an error
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!(error = %e, "no .env file loaded");
        }

        let fc = file::load_config_file();
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Resolve configuration from an environment lookup and a parsed config file
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn from_sources<F>(env: F, fc: MaitriConfigFile) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match env("MAITRI_PORT").or_else(|| env("PORT")) {
            Some(raw) => raw
                .parse()
                .map_err(|_| Error::Config(format!("invalid port: {raw}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };

        let rate_limit_rpm = match env("MAITRI_RATE_LIMIT_RPM") {
            Some(raw) => Some(
                raw.parse()
                    .map_err(|_| Error::Config(format!("invalid rate limit: {raw}")))?,
            ),
            None => fc.server.rate_limit_rpm,
        };

        let timeout_secs = match env("MAITRI_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|_| Error::Config(format!("invalid upstream timeout: {raw}")))?,
            ),
            None => fc.upstream.timeout_secs,
        };

        let upstream = UpstreamConfig {
            url: env("MAITRI_UPSTREAM_URL")
                .or(fc.upstream.url)
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: env("MAITRI_MODEL")
                .or(fc.upstream.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key: env("OPENROUTER_API_KEY")
                .or(fc.upstream.api_key)
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            referer: fc
                .upstream
                .referer
                .unwrap_or_else(|| "http://localhost".to_string()),
            title: fc
                .upstream
                .title
                .unwrap_or_else(|| "MAITRI AI Assistant".to_string()),
            timeout: timeout_secs.map(Duration::from_secs),
        };

        let defaults = AssistantConfig::default();
        let af = fc.assistant;

        let match_threshold = af.match_threshold.unwrap_or(defaults.match_threshold);
        if !(match_threshold > 0.0 && match_threshold.is_finite()) {
            return Err(Error::Config(format!(
                "match threshold must be positive, got {match_threshold}"
            )));
        }

        for (key, value) in [
            ("sample_interval_ms", af.sample_interval_ms),
            ("speech_poll_ms", af.speech_poll_ms),
        ] {
            if value == Some(0) {
                return Err(Error::Config(format!("{key} must be at least 1")));
            }
        }

        let wake_phrase = env("MAITRI_WAKE_PHRASE")
            .or(af.wake_phrase)
            .unwrap_or(defaults.wake_phrase)
            .trim()
            .to_lowercase();
        if wake_phrase.is_empty() {
            return Err(Error::Config("wake phrase cannot be empty".to_string()));
        }

        let assistant = AssistantConfig {
            gateway_url: env("MAITRI_GATEWAY_URL")
                .or(af.gateway_url)
                .unwrap_or(defaults.gateway_url)
                .trim_end_matches('/')
                .to_string(),
            wake_phrase,
            default_identity: af.default_identity.unwrap_or(defaults.default_identity),
            sample_interval: af
                .sample_interval_ms
                .map_or(defaults.sample_interval, Duration::from_millis),
            match_threshold,
            speech_poll: af
                .speech_poll_ms
                .map_or(defaults.speech_poll, Duration::from_millis),
            speech_idle_reads: af
                .speech_idle_reads
                .unwrap_or(defaults.speech_idle_reads)
                .max(1),
            report_dismiss: af
                .report_dismiss_ms
                .map_or(defaults.report_dismiss, Duration::from_millis),
            face_references: env("MAITRI_FACE_REFERENCES")
                .or(af.face_references)
                .map(PathBuf::from),
            face_log: env("MAITRI_FACE_LOG").or(af.face_log).map(PathBuf::from),
        };

        Ok(Self {
            server: ServerConfig {
                port,
                rate_limit_rpm,
            },
            upstream,
            assistant,
        })
    }
}
