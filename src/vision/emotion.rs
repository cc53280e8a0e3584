//! Primary emotion selection

use std::collections::HashMap;

use super::FaceSample;
use crate::session::{EmotionLabel, SessionState};

/// Pick the category with the highest confidence
///
/// Walks [`EmotionLabel::ALL`] with a strictly-greater comparison starting from
/// `neutral` at 0, so ties go to the earlier label and all-zero (or empty)
/// scores stay `neutral`.
#[must_use]
pub fn primary_emotion(expressions: &HashMap<EmotionLabel, f32>) -> (EmotionLabel, f32) {
    let mut best = (EmotionLabel::Neutral, 0.0_f32);
    for label in EmotionLabel::ALL {
        let Some(&confidence) = expressions.get(&label) else {
            continue;
        };
        if confidence > best.1 {
            best = (label, confidence);
        }
    }
    best
}

/// Keeps `SessionState`'s emotion fields in step with face samples
#[derive(Debug, Default, Clone, Copy)]
pub struct EmotionTracker;

impl EmotionTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Apply one sample (`None` = no face in view)
    pub fn observe(self, state: &mut SessionState, sample: Option<&FaceSample>) {
        match sample {
            Some(sample) => {
                let (emotion, confidence) = primary_emotion(&sample.expressions);
                state.face_present = true;
                state.active_emotion = emotion;
                state.active_confidence = confidence.clamp(0.0, 1.0);
                tracing::trace!(%emotion, confidence, "emotion sampled");
            }
            None => {
                state.face_present = false;
                state.active_emotion = EmotionLabel::Neutral;
                state.active_confidence = 0.0;
            }
        }
    }
}
