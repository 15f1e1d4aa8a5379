use crate::error::EvalError;
use crate::types::{Dataset, Label};

use super::trainer::{class_indices, Model, Trainer, TrainerConfig};

/// Always predicts the most frequent training label (ties go to class 0)
#[derive(Debug, Clone, Default)]
pub struct MajorityClassTrainer;

#[derive(Debug, Clone)]
pub struct ConstantModel {
    label: Label,
    n_features: usize,
}

impl ConstantModel {
    pub fn new(label: Label, n_features: usize) -> Self {
        Self { label, n_features }
    }
}

impl Model for ConstantModel {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict(&self, features: &[f64]) -> Result<f64, EvalError> {
        self.check_dimensions(features)?;
        Ok(self.label.as_f64())
    }
}

impl Trainer for MajorityClassTrainer {
    fn name(&self) -> &str {
        "majority"
    }

    fn fit(&self, train: &Dataset, _config: &TrainerConfig) -> Result<Box<dyn Model>, EvalError> {
        if train.is_empty() {
            return Err(EvalError::TrainingFailure("empty training set".to_string()));
        }
        let classes = class_indices(train)?;
        let ones = classes.iter().filter(|&&c| c == 1).count();
        let label = if ones * 2 > classes.len() { Label::One } else { Label::Zero };
        Ok(Box::new(ConstantModel::new(label, train.n_features())))
    }
}
