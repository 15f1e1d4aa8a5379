pub mod trainer;
pub mod mlp;
pub mod logistic;
pub mod baseline;

use serde::{Deserialize, Serialize};

pub use trainer::{CancelToken, Trainer, TrainerConfig};
pub use mlp::MultilayerPerceptronTrainer;
pub use logistic::LogisticRegressionTrainer;
pub use baseline::MajorityClassTrainer;

/// Trainer selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TrainerKind {
    #[default]
    Mlp,
    Logistic,
    Majority,
}

impl TrainerKind {
    pub fn as_str(&self) -> &str {
        match self {
            TrainerKind::Mlp => "mlp",
            TrainerKind::Logistic => "logistic",
            TrainerKind::Majority => "majority",
        }
    }

    pub fn build(&self) -> Box<dyn Trainer> {
        match self {
            TrainerKind::Mlp => Box::new(MultilayerPerceptronTrainer::new()),
            TrainerKind::Logistic => Box::new(LogisticRegressionTrainer::new()),
            TrainerKind::Majority => Box::new(MajorityClassTrainer),
        }
    }
}

impl std::fmt::Display for TrainerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trainer_kind_names() {
        for kind in [TrainerKind::Mlp, TrainerKind::Logistic, TrainerKind::Majority] {
            assert_eq!(kind.build().name(), kind.as_str());
        }
        assert_eq!(TrainerKind::default(), TrainerKind::Mlp);
    }
}
