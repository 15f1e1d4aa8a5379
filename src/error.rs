use thiserror::Error;

/// Failures raised while partitioning, training or scoring a fold
#[derive(Error, Debug)]
pub enum EvalError {
    #[error("invalid fold count: {folds} folds requested for {samples} samples (need 2 <= k <= samples)")]
    InvalidFoldCount { folds: usize, samples: usize },

    #[error("unsupported label {value}: only 0.0 and 1.0 are valid")]
    UnsupportedLabel { value: f64 },

    #[error("prediction error: model expects {expected} features, got {actual}")]
    PredictionError { expected: usize, actual: usize },

    #[error("training failure: {0}")]
    TrainingFailure(String),

    #[error("fold {} failed: {source}", .fold + 1)]
    FoldFailed {
        /// Zero-based; rendered one-based to match the fold reports
        fold: usize,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    pub fn in_fold(self, fold: usize) -> Self {
        match self {
            EvalError::FoldFailed { .. } => self,
            other => EvalError::FoldFailed { fold, source: Box::new(other) },
        }
    }

    /// Zero-based index of the failing fold, if the error is fold-scoped
    pub fn fold(&self) -> Option<usize> {
        match self {
            EvalError::FoldFailed { fold, .. } => Some(*fold),
            _ => None,
        }
    }

    /// Underlying cause, unwrapping the fold context
    pub fn root(&self) -> &EvalError {
        match self {
            EvalError::FoldFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_wrapping_is_idempotent() {
        let err = EvalError::TrainingFailure("diverged".to_string()).in_fold(3).in_fold(7);
        assert_eq!(err.fold(), Some(3));
        assert!(matches!(err.root(), EvalError::TrainingFailure(_)));
    }

    #[test]
    fn test_messages_name_fold_and_cause() {
        let err = EvalError::UnsupportedLabel { value: 2.0 }.in_fold(1);
        let msg = err.to_string();
        assert!(msg.starts_with("fold 2 failed"));
        assert!(msg.contains("unsupported label 2"));
    }
}
