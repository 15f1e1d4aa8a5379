use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::types::Label;

/// Outcome of a single test-set prediction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionRecord {
    pub true_label: f64,
    pub predicted_label: f64,
}

impl PredictionRecord {
    pub fn new(true_label: f64, predicted_label: f64) -> Self {
        Self { true_label, predicted_label }
    }
}

/// 2x2 confusion counts for one fold.
///
/// `wrong_as1` counts class-0 samples predicted as 1; `wrong_as0` counts
/// class-1 samples predicted as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub correct0: u64,
    pub correct1: u64,
    pub wrong_as1: u64,
    pub wrong_as0: u64,
}

/// Per-class precision and recall derived from a confusion matrix
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision0: f64,
    pub recall0: f64,
    pub precision1: f64,
    pub recall1: f64,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate<I>(records: I) -> Result<Self, EvalError>
    where
        I: IntoIterator<Item = PredictionRecord>,
    {
        let mut matrix = Self::new();
        for record in records {
            matrix.record(record)?;
        }
        Ok(matrix)
    }

    /// Count one prediction; both labels must be exactly 0.0 or 1.0
    pub fn record(&mut self, record: PredictionRecord) -> Result<(), EvalError> {
        let truth = Label::try_from(record.true_label)?;
        let predicted = Label::try_from(record.predicted_label)?;

        match (truth, predicted) {
            (Label::Zero, Label::Zero) => self.correct0 += 1,
            (Label::Zero, Label::One) => self.wrong_as1 += 1,
            (Label::One, Label::One) => self.correct1 += 1,
            (Label::One, Label::Zero) => self.wrong_as0 += 1,
        }
        Ok(())
    }

    pub fn total(&self) -> u64 {
        self.correct0 + self.correct1 + self.wrong_as1 + self.wrong_as0
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.correct0 + self.correct1, self.total())
    }

    pub fn metrics(&self) -> ClassMetrics {
        ClassMetrics {
            precision0: ratio(self.correct0, self.correct0 + self.wrong_as0),
            recall0: ratio(self.correct0, self.correct0 + self.wrong_as1),
            precision1: ratio(self.correct1, self.correct1 + self.wrong_as1),
            recall1: ratio(self.correct1, self.correct1 + self.wrong_as0),
        }
    }
}

/// Division with an explicit 0.0 for an empty denominator
fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
