use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::EvalError;
use crate::types::Dataset;

/// A fitted classifier. Owned by the fold that produced it.
pub trait Model: Send {
    /// Number of features the model was fitted on
    fn n_features(&self) -> usize;

    /// Predict a label in {0.0, 1.0} for one feature vector
    fn predict(&self, features: &[f64]) -> Result<f64, EvalError>;

    fn check_dimensions(&self, features: &[f64]) -> Result<(), EvalError> {
        if features.len() != self.n_features() {
            return Err(EvalError::PredictionError {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        Ok(())
    }
}

/// Pluggable training algorithm.
///
/// Given the same train set and config, the returned model must make the same
/// predictions.
#[cfg_attr(test, mockall::automock)]
pub trait Trainer: Send + Sync {
    fn name(&self) -> &str;

    fn fit(&self, train: &Dataset, config: &TrainerConfig) -> Result<Box<dyn Model>, EvalError>;
}

/// Shared flag used to abort long-running fits
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Hyperparameters handed to `Trainer::fit`
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Layer widths: first = input feature count, last = output class count
    pub layers: Vec<usize>,
    pub batch_size: usize,
    pub max_iter: usize,
    /// Weight-initialisation seed, independent of the fold seed
    pub seed: u64,
    pub learning_rate: f64,
    pub tolerance: f64,
    pub time_limit: Option<Duration>,
    pub cancel: CancelToken,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            layers: vec![8, 28, 25, 2],
            batch_size: 128,
            max_iter: 150,
            seed: 1234,
            learning_rate: 0.5,
            tolerance: 1e-6,
            time_limit: None,
            cancel: CancelToken::new(),
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = self.topology_errors();
        errors.extend(self.hyperparameter_errors());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn topology_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.layers.len() < 2 {
            errors.push("layers must list at least input and output widths".to_string());
        }
        if self.layers.iter().any(|&w| w == 0) {
            errors.push("layer widths must be > 0".to_string());
        }
        if self.layers.last().is_some_and(|&w| w != 2) {
            errors.push("output layer width must be 2 for binary classification".to_string());
        }
        errors
    }

    pub fn hyperparameter_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.batch_size == 0 {
            errors.push("batch_size must be > 0".to_string());
        }
        if self.max_iter == 0 {
            errors.push("max_iter must be > 0".to_string());
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            errors.push("learning_rate must be a positive number".to_string());
        }
        if self.tolerance < 0.0 {
            errors.push("tolerance must be >= 0".to_string());
        }
        errors
    }

    /// Start a stopwatch that trainers poll between iterations
    pub fn budget(&self) -> TrainingBudget {
        TrainingBudget {
            started: Instant::now(),
            time_limit: self.time_limit,
            cancel: self.cancel.clone(),
        }
    }
}

/// Cancellation and time-limit check for a single fit
pub struct TrainingBudget {
    started: Instant,
    time_limit: Option<Duration>,
    cancel: CancelToken,
}

impl TrainingBudget {
    pub fn check(&self, iteration: usize) -> Result<(), EvalError> {
        if self.cancel.is_cancelled() {
            return Err(EvalError::TrainingFailure(format!(
                "cancelled at iteration {}",
                iteration
            )));
        }
        if let Some(limit) = self.time_limit {
            if self.started.elapsed() > limit {
                return Err(EvalError::TrainingFailure(format!(
                    "time limit of {:.1}s exceeded at iteration {}",
                    limit.as_secs_f64(),
                    iteration
                )));
            }
        }
        Ok(())
    }
}

/// Labels of a train set as class indices, rejecting anything outside {0, 1}
pub fn class_indices(train: &Dataset) -> Result<Vec<usize>, EvalError> {
    train
        .iter()
        .map(|s| s.class().map(|label| label.index()))
        .collect()
}
