//! Face sampling: identity and emotion tracking
//!
//! Detection itself is an external capability behind [`FaceSensor`]. Both
//! trackers consume the same sample per tick.

mod emotion;
mod identity;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

pub use emotion::{EmotionTracker, primary_emotion};
pub use identity::{FaceMatcher, IdentityTracker, LabeledDescriptors, MatchResult};

use crate::session::EmotionLabel;
use crate::{Error, Result};

/// One detection result for the current video frame
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FaceSample {
    /// Per-category expression confidences
    #[serde(default)]
    pub expressions: HashMap<EmotionLabel, f32>,

    /// Face embedding, when the recognition net produced one
    #[serde(default)]
    pub descriptor: Option<Vec<f32>>,
}

/// Face detection capability over the live camera frame
#[async_trait]
pub trait FaceSensor: Send + Sync {
    /// Detect a single face in the current frame; `Ok(None)` when nobody is in view
    async fn sample(&self) -> Result<Option<FaceSample>>;
}

/// Replays a recorded detection log, one entry per sample, looping at the end
///
/// Each non-empty line is either `null` (no face) or a JSON [`FaceSample`].
pub struct ReplayFaceSensor {
    frames: Vec<Option<FaceSample>>,
    cursor: AtomicUsize,
}

impl ReplayFaceSensor {
    /// Parse a detection log
    ///
    /// # Errors
    ///
    /// Returns error if a line is not valid JSON or the log is empty
    pub fn parse(log: &str) -> Result<Self> {
        let frames = log
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(serde_json::from_str::<Option<FaceSample>>)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if frames.is_empty() {
            return Err(Error::Vision("face log contains no samples".to_string()));
        }

        Ok(Self {
            frames,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Load a detection log from disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed
    pub fn from_path(path: &Path) -> Result<Self> {
        let log = std::fs::read_to_string(path)?;
        let sensor = Self::parse(&log)?;
        tracing::info!(path = %path.display(), frames = sensor.frames.len(), "loaded face log");
        Ok(sensor)
    }
}

#[async_trait]
impl FaceSensor for ReplayFaceSensor {
    async fn sample(&self) -> Result<Option<FaceSample>> {
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.frames.len();
        Ok(self.frames[index].clone())
    }
}
