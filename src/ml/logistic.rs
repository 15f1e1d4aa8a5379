use ndarray::{Array1, Array2, Axis};
use tracing::{debug, info};

use crate::error::EvalError;
use crate::types::Dataset;

use super::trainer::{class_indices, Model, Trainer, TrainerConfig};

/// L2 penalty applied to the coefficients
const LAMBDA: f64 = 0.01;

/// Logistic regression coefficients plus the z-score statistics they were fitted on
#[derive(Debug, Clone)]
pub struct LogisticModel {
    coefficients: Vec<f64>,
    intercept: f64,
    feature_means: Vec<f64>,
    feature_stds: Vec<f64>,
    threshold: f64,
}

/// Logistic regression trained by batch gradient descent
#[derive(Debug, Clone)]
pub struct LogisticRegressionTrainer {
    threshold: f64,
}

impl Default for LogisticRegressionTrainer {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

impl LogisticRegressionTrainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit_logistic(&self, train: &Dataset, config: &TrainerConfig) -> Result<LogisticModel, EvalError> {
        let n = train.len();
        if n == 0 {
            return Err(EvalError::TrainingFailure("empty training set".to_string()));
        }
        let labels: Vec<f64> = class_indices(train)?.into_iter().map(|c| c as f64).collect();

        let num_features = train.n_features();
        let mut features = Array2::<f64>::zeros((n, num_features));
        for (i, sample) in train.iter().enumerate() {
            for (j, &val) in sample.features.iter().enumerate() {
                features[[i, j]] = val;
            }
        }

        // Compute feature means and stds for normalization
        let means = features
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(num_features));
        let stds = features.std_axis(Axis(0), 0.0);

        let mut normalized = features.clone();
        for j in 0..num_features {
            let std = stds[j];
            for i in 0..n {
                normalized[[i, j]] = if std > 1e-10 {
                    (features[[i, j]] - means[j]) / std
                } else {
                    0.0
                };
            }
        }

        let (coefficients, intercept) = self.gradient_descent(&normalized, &labels, config)?;

        let model = LogisticModel {
            coefficients,
            intercept,
            feature_means: means.to_vec(),
            feature_stds: stds.to_vec(),
            threshold: self.threshold,
        };

        let correct = train
            .iter()
            .zip(&labels)
            .filter(|(s, label)| {
                let predicted = if model.probability(&s.features) >= self.threshold { 1.0 } else { 0.0 };
                predicted == **label
            })
            .count();
        info!(
            "Logistic model trained: {} samples, {:.1}% training accuracy",
            n,
            correct as f64 / n as f64 * 100.0
        );

        Ok(model)
    }

    /// Fit logistic regression via gradient descent with L2 regularization
    fn gradient_descent(
        &self,
        features: &Array2<f64>,
        labels: &[f64],
        config: &TrainerConfig,
    ) -> Result<(Vec<f64>, f64), EvalError> {
        let n = features.nrows();
        let num_features = features.ncols();
        let budget = config.budget();

        let mut coefficients = vec![0.0; num_features];
        let mut intercept = 0.0;

        for iter in 0..config.max_iter {
            budget.check(iter)?;

            let mut grad_coef = vec![0.0; num_features];
            let mut grad_intercept = 0.0;

            for i in 0..n {
                let mut z = intercept;
                for j in 0..num_features {
                    z += coefficients[j] * features[[i, j]];
                }
                let error = sigmoid(z) - labels[i];

                grad_intercept += error;
                for j in 0..num_features {
                    grad_coef[j] += error * features[[i, j]];
                }
            }

            intercept -= config.learning_rate * grad_intercept / n as f64;
            for j in 0..num_features {
                coefficients[j] -= config.learning_rate * (grad_coef[j] / n as f64 + LAMBDA * coefficients[j]);
            }

            if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                return Err(EvalError::TrainingFailure(format!(
                    "coefficients diverged at iteration {}",
                    iter
                )));
            }
        }

        debug!("Logistic regression finished {} iterations", config.max_iter);
        Ok((coefficients, intercept))
    }
}

impl Trainer for LogisticRegressionTrainer {
    fn name(&self) -> &str {
        "logistic"
    }

    fn fit(&self, train: &Dataset, config: &TrainerConfig) -> Result<Box<dyn Model>, EvalError> {
        Ok(Box::new(self.fit_logistic(train, config)?))
    }
}

impl LogisticModel {
    /// Probability of class 1, normalizing with the stored means/stds
    fn probability(&self, features: &[f64]) -> f64 {
        let mut z = self.intercept;
        for (j, &x) in features.iter().enumerate() {
            let std = self.feature_stds[j];
            let normalized = if std > 1e-10 {
                (x - self.feature_means[j]) / std
            } else {
                0.0
            };
            z += self.coefficients[j] * normalized;
        }
        sigmoid(z)
    }

    pub fn predict_probability(&self, features: &[f64]) -> Result<f64, EvalError> {
        self.check_dimensions(features)?;
        Ok(self.probability(features))
    }
}

impl Model for LogisticModel {
    fn n_features(&self) -> usize {
        self.coefficients.len()
    }

    fn predict(&self, features: &[f64]) -> Result<f64, EvalError> {
        let prob = self.predict_probability(features)?;
        Ok(if prob >= self.threshold { 1.0 } else { 0.0 })
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
