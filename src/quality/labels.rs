//! Categorical label → numeric score normalization.

use super::{MethodOutput, Registry, ScoreValue};
use std::collections::BTreeMap;
use thiserror::Error;

/// Score given to a label that is not in the mapping. Unknown labels count
/// as bad recordings, not as failed computations.
pub const UNMAPPED_LABEL_SCORE: f64 = 0.0;

pub const GOOD: &str = "Good";
pub const MEDIUM: &str = "Medium";
pub const BAD: &str = "Bad";
pub const UNKNOWN: &str = "Unknown";

#[derive(Error, Debug, PartialEq)]
pub enum LabelError {
    #[error("label '{label}' has score {value}, expected a value in [0, 1]")]
    OutOfRange { label: String, value: f64 },
    #[error("{family}/{method} can emit '{label}', which has no score")]
    Uncovered {
        family: String,
        method: String,
        label: String,
    },
}

/// Immutable label → score table, built once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMapping {
    scores: BTreeMap<String, f64>,
}

impl Default for LabelMapping {
    fn default() -> Self {
        let scores = [(GOOD, 1.0), (MEDIUM, 0.5), (BAD, 0.0), (UNKNOWN, 0.0)]
            .into_iter()
            .map(|(l, s)| (l.to_string(), s))
            .collect();
        Self { scores }
    }
}

impl LabelMapping {
    /// Default table extended (or overridden) by configured entries.
    pub fn with_overrides(overrides: &BTreeMap<String, f64>) -> Result<Self, LabelError> {
        let mut mapping = Self::default();
        for (label, &value) in overrides {
            if !(value.is_finite() && (0.0..=1.0).contains(&value)) {
                return Err(LabelError::OutOfRange {
                    label: label.clone(),
                    value,
                });
            }
            mapping.scores.insert(label.clone(), value);
        }
        Ok(mapping)
    }

    /// Check every label the registry can emit has an entry.
    pub fn validate(&self, registry: &Registry) -> Result<(), LabelError> {
        for family in registry.families() {
            for method in &family.methods {
                if let Some(label) = method.labels().iter().find(|l| !self.scores.contains_key(**l)) {
                    return Err(LabelError::Uncovered {
                        family: family.name.clone(),
                        method: method.name().to_string(),
                        label: label.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn score(&self, label: &str) -> f64 {
        self.scores
            .get(label)
            .copied()
            .unwrap_or(UNMAPPED_LABEL_SCORE)
    }

    /// Total normalization: numbers pass through, labels are looked up,
    /// anything unrepresentable becomes Missing.
    pub fn normalize(&self, value: ScoreValue) -> ScoreValue {
        match value {
            ScoreValue::Numeric(v) if v.is_finite() => ScoreValue::Numeric(v),
            ScoreValue::Numeric(_) => ScoreValue::Missing,
            ScoreValue::Label(l) => ScoreValue::Numeric(self.score(&l)),
            ScoreValue::Missing => ScoreValue::Missing,
        }
    }

    /// Reduce a method's output to one normalized value: the mean of the
    /// numbers, or the mean of the mapped labels.
    pub fn aggregate(&self, output: MethodOutput) -> ScoreValue {
        let values: Vec<f64> = match output {
            MethodOutput::Numeric(v) => v,
            MethodOutput::Labels(labels) => labels.iter().map(|l| self.score(l)).collect(),
        };
        if values.is_empty() {
            return ScoreValue::Missing;
        }
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        self.normalize(ScoreValue::Numeric(mean))
    }
}
