use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::confusion::{ClassMetrics, ConfusionMatrix};

const RULE: &str = "************";

/// Evaluation of a single fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldReport {
    /// Zero-based fold index
    pub fold: usize,
    pub folds: usize,
    pub train_size: usize,
    pub test_size: usize,
    pub matrix: ConfusionMatrix,
    pub metrics: ClassMetrics,
    pub elapsed_ms: u64,
}

impl FoldReport {
    pub fn new(
        fold: usize,
        folds: usize,
        train_size: usize,
        test_size: usize,
        matrix: ConfusionMatrix,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            fold,
            folds,
            train_size,
            test_size,
            metrics: matrix.metrics(),
            matrix,
            elapsed_ms,
        }
    }

    /// Pretty print the fold block to stdout
    pub fn print_summary(&self) {
        println!("{}", self);
    }
}

impl std::fmt::Display for FoldReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let m = &self.matrix;
        writeln!(f, "{}", RULE)?;
        writeln!(
            f,
            "Fold {}/{} (train: {}, test: {})",
            self.fold + 1,
            self.folds,
            self.train_size,
            self.test_size
        )?;
        writeln!(f, "{}      {}", m.correct0, m.wrong_as1)?;
        writeln!(f, "{}      {}", m.wrong_as0, m.correct1)?;
        writeln!(f, "Class 0 precision: {:.4}", self.metrics.precision0)?;
        writeln!(f, "Class 0 recall: {:.4}", self.metrics.recall0)?;
        writeln!(f, "Class 1 precision: {:.4}", self.metrics.precision1)?;
        writeln!(f, "Class 1 recall: {:.4}", self.metrics.recall1)?;
        write!(f, "{}", RULE)
    }
}

/// Whole cross-validation run, used for JSON output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: String,
    pub trainer: String,
    pub seed: u64,
    pub folds: Vec<FoldReport>,
}

impl RunReport {
    pub fn new(run_id: Uuid, started_at: DateTime<Utc>, source: String, trainer: String, seed: u64) -> Self {
        Self {
            run_id,
            started_at,
            finished_at: started_at,
            source,
            trainer,
            seed,
            folds: Vec::new(),
        }
    }

    pub fn finish(mut self, folds: Vec<FoldReport>) -> Self {
        self.folds = folds;
        self.finished_at = Utc::now();
        self
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> FoldReport {
        let matrix = ConfusionMatrix { correct0: 1, correct1: 0, wrong_as1: 0, wrong_as0: 1 };
        FoldReport::new(0, 5, 8, 2, matrix, 12)
    }

    #[test]
    fn test_text_block_layout() {
        let text = report().to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "************",
                "Fold 1/5 (train: 8, test: 2)",
                "1      0",
                "1      0",
                "Class 0 precision: 0.5000",
                "Class 0 recall: 1.0000",
                "Class 1 precision: 0.0000",
                "Class 1 recall: 0.0000",
                "************",
            ]
        );
    }

    #[test]
    fn test_run_report_json() {
        let started = Utc::now();
        let run = RunReport::new(Uuid::new_v4(), started, "data.txt".to_string(), "mlp".to_string(), 12345)
            .finish(vec![report()]);
        assert!(run.finished_at >= started);

        let json = run.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["folds"][0]["matrix"]["wrong_as0"], 1);
        assert_eq!(value["folds"][0]["metrics"]["precision0"], 0.5);
        assert_eq!(value["seed"], 12345);
    }
}
