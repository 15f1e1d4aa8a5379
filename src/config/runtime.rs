use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ml::{CancelToken, TrainerConfig, TrainerKind};

/// How fold reports are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Effective settings for one cross-validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Force the dense feature width instead of inferring it from the file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_features: Option<usize>,
    pub folds: usize,
    pub seed: u64,
    /// 1 = strictly sequential
    pub workers: usize,
    pub format: OutputFormat,
    pub trainer: TrainerSettings,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            source: None,
            num_features: None,
            folds: 10,
            seed: 12345,
            workers: 1,
            format: OutputFormat::Text,
            trainer: TrainerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerSettings {
    pub kind: TrainerKind,
    pub layers: Vec<usize>,
    pub batch_size: usize,
    pub max_iter: usize,
    pub seed: u64,
    pub learning_rate: f64,
    pub tolerance: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<u64>,
}

impl Default for TrainerSettings {
    fn default() -> Self {
        let defaults = TrainerConfig::default();
        Self {
            kind: TrainerKind::Mlp,
            layers: defaults.layers,
            batch_size: defaults.batch_size,
            max_iter: defaults.max_iter,
            seed: defaults.seed,
            learning_rate: defaults.learning_rate,
            tolerance: defaults.tolerance,
            time_limit_secs: None,
        }
    }
}

impl TrainerSettings {
    pub fn to_trainer_config(&self, cancel: CancelToken) -> TrainerConfig {
        TrainerConfig {
            layers: self.layers.clone(),
            batch_size: self.batch_size,
            max_iter: self.max_iter,
            seed: self.seed,
            learning_rate: self.learning_rate,
            tolerance: self.tolerance,
            time_limit: self.time_limit_secs.map(Duration::from_secs),
            cancel,
        }
    }
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.folds < 2 {
            errors.push("folds must be >= 2".to_string());
        }
        if self.workers == 0 {
            errors.push("workers must be > 0".to_string());
        }
        if self.num_features == Some(0) {
            errors.push("num_features must be > 0 when set".to_string());
        }

        let trainer = self.trainer.to_trainer_config(CancelToken::new());
        // only the network consumes the topology
        match self.trainer.kind {
            TrainerKind::Mlp => {
                if let Err(trainer_errors) = trainer.validate() {
                    errors.extend(trainer_errors);
                }
            }
            _ => errors.extend(trainer.hyperparameter_errors()),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
