use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::distributions::{Distribution, Uniform};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::EvalError;
use crate::types::Dataset;

use super::trainer::{class_indices, Model, Trainer, TrainerConfig};

/// Feed-forward network trainer: sigmoid hidden layers, softmax output,
/// mini-batch gradient descent on cross-entropy.
#[derive(Debug, Clone, Default)]
pub struct MultilayerPerceptronTrainer;

impl MultilayerPerceptronTrainer {
    pub fn new() -> Self {
        Self
    }
}

/// Fitted network weights, one (weights, bias) pair per layer transition
#[derive(Debug, Clone)]
pub struct MultilayerPerceptronModel {
    weights: Vec<Array2<f64>>,
    biases: Vec<Array1<f64>>,
}

impl Trainer for MultilayerPerceptronTrainer {
    fn name(&self) -> &str {
        "mlp"
    }

    fn fit(&self, train: &Dataset, config: &TrainerConfig) -> Result<Box<dyn Model>, EvalError> {
        let model = self.fit_network(train, config)?;
        Ok(Box::new(model))
    }
}

impl MultilayerPerceptronTrainer {
    pub fn fit_network(
        &self,
        train: &Dataset,
        config: &TrainerConfig,
    ) -> Result<MultilayerPerceptronModel, EvalError> {
        let layers = &config.layers;
        if train.is_empty() {
            return Err(EvalError::TrainingFailure("empty training set".to_string()));
        }
        if layers.len() < 2 || layers.iter().any(|&w| w == 0) {
            return Err(EvalError::TrainingFailure(format!("invalid topology {:?}", layers)));
        }
        if layers[0] != train.n_features() {
            return Err(EvalError::TrainingFailure(format!(
                "input layer width {} does not match feature count {}",
                layers[0],
                train.n_features()
            )));
        }
        if layers[layers.len() - 1] != 2 {
            return Err(EvalError::TrainingFailure(format!(
                "output layer width must be 2, got {}",
                layers[layers.len() - 1]
            )));
        }
        if config.batch_size == 0 {
            return Err(EvalError::TrainingFailure("batch size must be > 0".to_string()));
        }

        let classes = class_indices(train)?;
        let n = train.len();
        let d = train.n_features();
        if let Some(row) = train.iter().position(|s| s.features.len() != d) {
            return Err(EvalError::TrainingFailure(format!(
                "sample {} has {} features, expected {}",
                row,
                train.samples()[row].features.len(),
                d
            )));
        }

        let x = Array2::from_shape_fn((n, d), |(i, j)| train.samples()[i].features[j]);
        let y = Array2::from_shape_fn((n, 2), |(i, c)| if classes[i] == c { 1.0 } else { 0.0 });

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
        let mut weights = Vec::with_capacity(layers.len() - 1);
        let mut biases = Vec::with_capacity(layers.len() - 1);
        for pair in layers.windows(2) {
            let (fan_in, fan_out) = (pair[0], pair[1]);
            let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
            let dist = Uniform::new_inclusive(-limit, limit);
            weights.push(Array2::from_shape_fn((fan_in, fan_out), |_| dist.sample(&mut rng)));
            biases.push(Array1::zeros(fan_out));
        }

        let budget = config.budget();
        let mut order: Vec<usize> = (0..n).collect();
        let mut prev_loss = f64::INFINITY;
        let mut loss = f64::INFINITY;
        let mut epochs = 0;

        for epoch in 0..config.max_iter {
            budget.check(epoch)?;
            order.shuffle(&mut rng);

            for batch in order.chunks(config.batch_size) {
                let xb = x.select(Axis(0), batch);
                let yb = y.select(Axis(0), batch);
                let activations = forward(&weights, &biases, xb);
                backward(&mut weights, &mut biases, &activations, &yb, config.learning_rate);
            }

            let activations = forward(&weights, &biases, x.clone());
            loss = cross_entropy(&activations[activations.len() - 1], &y);
            epochs = epoch + 1;
            if !loss.is_finite() {
                return Err(EvalError::TrainingFailure(format!(
                    "loss diverged at iteration {}",
                    epoch
                )));
            }
            if (prev_loss - loss).abs() < config.tolerance {
                debug!("MLP converged after {} epochs (loss {:.6})", epochs, loss);
                break;
            }
            prev_loss = loss;
        }

        debug!("MLP trained: {} samples, {} epochs, loss {:.6}", n, epochs, loss);

        Ok(MultilayerPerceptronModel { weights, biases })
    }
}

impl MultilayerPerceptronModel {
    /// Class probabilities for one feature vector
    pub fn probabilities(&self, features: &[f64]) -> Result<Array1<f64>, EvalError> {
        self.check_dimensions(features)?;
        let last = self.weights.len() - 1;
        let mut a = ArrayView1::from(features).to_owned();
        for (l, (w, b)) in self.weights.iter().zip(&self.biases).enumerate() {
            let z = a.dot(w) + b;
            a = if l < last {
                z.mapv(sigmoid)
            } else {
                softmax(z)
            };
        }
        Ok(a)
    }
}

impl Model for MultilayerPerceptronModel {
    fn n_features(&self) -> usize {
        self.weights[0].nrows()
    }

    fn predict(&self, features: &[f64]) -> Result<f64, EvalError> {
        let probs = self.probabilities(features)?;
        Ok(if probs[1] > probs[0] { 1.0 } else { 0.0 })
    }
}

/// Activations of every layer, input first
fn forward(weights: &[Array2<f64>], biases: &[Array1<f64>], input: Array2<f64>) -> Vec<Array2<f64>> {
    let last = weights.len() - 1;
    let mut activations = Vec::with_capacity(weights.len() + 1);
    activations.push(input);
    for (l, (w, b)) in weights.iter().zip(biases).enumerate() {
        let z = activations[l].dot(w) + b;
        let a = if l < last {
            z.mapv(sigmoid)
        } else {
            let mut z = z;
            for mut row in z.rows_mut() {
                let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
                row.mapv_inplace(|v| (v - max).exp());
                let sum = row.sum();
                row.mapv_inplace(|v| v / sum);
            }
            z
        };
        activations.push(a);
    }
    activations
}

fn backward(
    weights: &mut [Array2<f64>],
    biases: &mut [Array1<f64>],
    activations: &[Array2<f64>],
    targets: &Array2<f64>,
    learning_rate: f64,
) {
    let batch = targets.nrows() as f64;
    let mut delta = (&activations[activations.len() - 1] - targets) / batch;

    for l in (0..weights.len()).rev() {
        let grad_w = activations[l].t().dot(&delta);
        let grad_b = delta.sum_axis(Axis(0));
        if l > 0 {
            let a = &activations[l];
            delta = delta.dot(&weights[l].t()) * &a.mapv(|v| v * (1.0 - v));
        }
        weights[l].scaled_add(-learning_rate, &grad_w);
        biases[l].scaled_add(-learning_rate, &grad_b);
    }
}

fn cross_entropy(output: &Array2<f64>, targets: &Array2<f64>) -> f64 {
    let n = targets.nrows() as f64;
    let total: f64 = output
        .iter()
        .zip(targets.iter())
        .map(|(&p, &t)| if t > 0.0 { -t * p.max(1e-12).ln() } else { 0.0 })
        .sum();
    total / n
}

fn softmax(z: Array1<f64>) -> Array1<f64> {
    let max = z.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
    let exp = z.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
