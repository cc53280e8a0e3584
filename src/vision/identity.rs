//! Face identity resolution against labeled reference descriptors

use std::path::Path;

use serde::Deserialize;

use super::FaceSample;
use crate::session::SessionState;
use crate::{Error, Result};

/// Reference descriptors for one known person
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabeledDescriptors {
    pub label: String,
    pub descriptors: Vec<Vec<f32>>,
}

/// Outcome of matching a descriptor against the reference set
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Matched label, `None` when nothing is within the threshold
    pub label: Option<String>,
    /// Distance to the closest label
    pub distance: f32,
}

/// Nearest-label matcher over face descriptors
///
/// A label's distance is the mean Euclidean distance between the query and each
/// of its descriptors. The closest label matches only if that distance is
/// strictly below the threshold.
#[derive(Debug, Clone)]
pub struct FaceMatcher {
    references: Vec<LabeledDescriptors>,
    threshold: f32,
}

impl FaceMatcher {
    /// Build a matcher
    ///
    /// # Errors
    ///
    /// Returns error if the reference set is empty, a label has no descriptors,
    /// or descriptor lengths disagree
    pub fn new(references: Vec<LabeledDescriptors>, threshold: f32) -> Result<Self> {
        let mut width = None;
        for reference in &references {
            if reference.descriptors.is_empty() {
                return Err(Error::Vision(format!(
                    "reference '{}' has no descriptors",
                    reference.label
                )));
            }
            for descriptor in &reference.descriptors {
                match width {
                    None => width = Some(descriptor.len()),
                    Some(w) if w != descriptor.len() => {
                        return Err(Error::Vision(format!(
                            "descriptor length mismatch for '{}': expected {w}, got {}",
                            reference.label,
                            descriptor.len()
                        )));
                    }
                    Some(_) => {}
                }
            }
        }

        if references.is_empty() {
            return Err(Error::Vision("no reference faces".to_string()));
        }

        Ok(Self {
            references,
            threshold,
        })
    }

    /// Load references from a JSON array of `{label, descriptors}`
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or validated
    pub fn from_path(path: &Path, threshold: f32) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let references: Vec<LabeledDescriptors> = serde_json::from_str(&raw)?;
        let matcher = Self::new(references, threshold)?;
        tracing::info!(
            path = %path.display(),
            labels = matcher.references.len(),
            "loaded face references"
        );
        Ok(matcher)
    }

    /// Find the closest label for a descriptor
    #[must_use]
    pub fn best_match(&self, descriptor: &[f32]) -> MatchResult {
        let closest = self
            .references
            .iter()
            .map(|reference| (reference, mean_distance(descriptor, &reference.descriptors)))
            .min_by(|a, b| a.1.total_cmp(&b.1));

        match closest {
            Some((reference, distance)) if distance < self.threshold => MatchResult {
                label: Some(reference.label.clone()),
                distance,
            },
            Some((_, distance)) => MatchResult {
                label: None,
                distance,
            },
            None => MatchResult {
                label: None,
                distance: f32::INFINITY,
            },
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_distance(query: &[f32], descriptors: &[Vec<f32>]) -> f32 {
    let total: f32 = descriptors.iter().map(|d| euclidean(query, d)).sum();
    total / descriptors.len() as f32
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Keeps `SessionState::identified_user` in step with face samples
#[derive(Debug, Clone)]
pub struct IdentityTracker {
    matcher: Option<FaceMatcher>,
    default_identity: String,
}

impl IdentityTracker {
    #[must_use]
    pub fn new(matcher: Option<FaceMatcher>, default_identity: impl Into<String>) -> Self {
        Self {
            matcher,
            default_identity: default_identity.into(),
        }
    }

    /// Whether a reference set is loaded
    #[must_use]
    pub const fn has_references(&self) -> bool {
        self.matcher.is_some()
    }

    /// Apply one sample (`None` = no face in view)
    ///
    /// A face without a descriptor, or with no reference set loaded, leaves
    /// the current identity as it is.
    pub fn observe(&self, state: &mut SessionState, sample: Option<&FaceSample>) {
        let Some(sample) = sample else {
            state.identified_user.clone_from(&self.default_identity);
            return;
        };

        let (Some(matcher), Some(descriptor)) = (&self.matcher, sample.descriptor.as_deref())
        else {
            return;
        };

        let result = matcher.best_match(descriptor);
        let resolved = result.label.as_deref().unwrap_or(&self.default_identity);
        if state.identified_user != resolved {
            tracing::debug!(
                user = resolved,
                distance = result.distance,
                "identity changed"
            );
            resolved.clone_into(&mut state.identified_user);
        }
    }
}
