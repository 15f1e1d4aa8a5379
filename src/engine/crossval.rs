use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, info_span, warn};

use crate::error::EvalError;
use crate::ml::{Trainer, TrainerConfig};
use crate::types::Dataset;

use super::confusion::{ConfusionMatrix, PredictionRecord};
use super::partition::{Fold, FoldPartitioner};
use super::results::FoldReport;

/// Runs k-fold cross-validation: partition, fit once per fold, score the
/// held-out samples, report one confusion matrix per fold.
///
/// Any fold failure aborts the whole run; partial results are not returned.
#[derive(Debug, Clone, Copy)]
pub struct CrossValidator {
    partitioner: FoldPartitioner,
}

impl CrossValidator {
    pub fn new(folds: usize, seed: u64) -> Self {
        Self {
            partitioner: FoldPartitioner::new(folds, seed),
        }
    }

    pub fn run(
        &self,
        dataset: &Dataset,
        trainer: &dyn Trainer,
        config: &TrainerConfig,
    ) -> Result<Vec<FoldReport>, EvalError> {
        self.run_with(dataset, trainer, config, |_| {})
    }

    /// Sequential run; `on_fold` sees each report as soon as its fold completes
    pub fn run_with<F>(
        &self,
        dataset: &Dataset,
        trainer: &dyn Trainer,
        config: &TrainerConfig,
        mut on_fold: F,
    ) -> Result<Vec<FoldReport>, EvalError>
    where
        F: FnMut(&FoldReport),
    {
        let folds = self.partitioner.partition(dataset)?;
        let k = folds.len();
        info!(
            "Cross-validation: {} samples, {} folds, seed {}",
            dataset.len(),
            k,
            self.partitioner.seed()
        );

        let mut reports = Vec::with_capacity(k);
        for fold in &folds {
            let report = evaluate_fold(fold, k, trainer, config).map_err(|e| {
                error!("Fold {}/{} failed: {}", fold.index + 1, k, e);
                e.in_fold(fold.index)
            })?;
            on_fold(&report);
            reports.push(report);
        }

        Ok(reports)
    }

    /// Evaluate folds on blocking worker threads, at most `workers` at once
    /// and never more than the machine's available parallelism.
    ///
    /// Reports are delivered in fold order regardless of completion order. The
    /// first failure (in fold order) cancels the in-flight fits through the
    /// config's cancel token.
    pub async fn run_parallel<F>(
        &self,
        dataset: &Dataset,
        trainer: Arc<dyn Trainer>,
        config: TrainerConfig,
        workers: usize,
        mut on_fold: F,
    ) -> Result<Vec<FoldReport>, EvalError>
    where
        F: FnMut(&FoldReport),
    {
        let folds = self.partitioner.partition(dataset)?;
        let k = folds.len();
        let cores = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        if workers > cores {
            warn!("{} workers requested but only {} cores available", workers, cores);
        }
        let workers = workers.min(cores).clamp(1, k);
        info!(
            "Cross-validation: {} samples, {} folds, seed {}, {} workers",
            dataset.len(),
            k,
            self.partitioner.seed(),
            workers
        );

        let cancel = config.cancel.clone();
        let jobs = folds.into_iter().map(|fold| {
            let trainer = Arc::clone(&trainer);
            let config = config.clone();
            async move {
                let index = fold.index;
                tokio::task::spawn_blocking(move || evaluate_fold(&fold, k, trainer.as_ref(), &config))
                    .await
                    .map_err(|e| EvalError::TrainingFailure(format!("fold worker aborted: {}", e)))
                    .and_then(|result| result)
                    .map_err(|e| e.in_fold(index))
            }
        });
        let mut results = stream::iter(jobs).buffered(workers);

        let mut reports = Vec::with_capacity(k);
        while let Some(result) = results.next().await {
            match result {
                Ok(report) => {
                    on_fold(&report);
                    reports.push(report);
                }
                Err(e) => {
                    let fold = e.fold().map_or(0, |i| i + 1);
                    error!("Fold {}/{} failed, aborting: {}", fold, k, e.root());
                    cancel.cancel();
                    return Err(e);
                }
            }
        }

        Ok(reports)
    }
}

/// Fit on the fold's train set and score every test sample in order
pub fn evaluate_fold(
    fold: &Fold,
    folds: usize,
    trainer: &dyn Trainer,
    config: &TrainerConfig,
) -> Result<FoldReport, EvalError> {
    let _span = info_span!("fold", index = fold.index).entered();
    let started = Instant::now();
    debug!("Test indices: {:?}", fold.test_indices);

    let model = trainer.fit(&fold.train, config)?;

    let records = fold
        .test
        .iter()
        .map(|sample| {
            model
                .predict(&sample.features)
                .map(|predicted| PredictionRecord::new(sample.label, predicted))
        })
        .collect::<Result<Vec<_>, _>>()?;
    let matrix = ConfusionMatrix::accumulate(records)?;

    let report = FoldReport::new(
        fold.index,
        folds,
        fold.train.len(),
        fold.test.len(),
        matrix,
        started.elapsed().as_millis() as u64,
    );
    info!(
        "Fold {}/{}: train={} test={} acc={:.2}% p0={:.4} r0={:.4} p1={:.4} r1={:.4}",
        fold.index + 1,
        folds,
        report.train_size,
        report.test_size,
        matrix.accuracy() * 100.0,
        report.metrics.precision0,
        report.metrics.recall0,
        report.metrics.precision1,
        report.metrics.recall1
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::trainer::MockTrainer;
    use crate::ml::baseline::ConstantModel;
    use crate::ml::trainer::Model;
    use crate::ml::MajorityClassTrainer;
    use crate::types::{Label, Sample};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// 10 samples, five of each class, one feature
    fn balanced() -> Dataset {
        (0..10)
            .map(|i| Sample::new(if i < 5 { 0.0 } else { 1.0 }, vec![i as f64]))
            .collect()
    }

    struct FixedOutput(f64);

    impl Model for FixedOutput {
        fn n_features(&self) -> usize {
            1
        }

        fn predict(&self, features: &[f64]) -> Result<f64, EvalError> {
            self.check_dimensions(features)?;
            Ok(self.0)
        }
    }

    fn always_zero() -> Result<Box<dyn Model>, EvalError> {
        Ok(Box::new(ConstantModel::new(Label::Zero, 1)) as Box<dyn Model>)
    }

    #[test]
    fn test_always_zero_trainer_over_five_folds() {
        let mut trainer = MockTrainer::new();
        trainer
            .expect_fit()
            .withf(|train, _| train.len() == 8)
            .times(5)
            .returning(|_, _| always_zero());

        let reports = CrossValidator::new(5, 12345)
            .run(&balanced(), &trainer, &TrainerConfig::default())
            .unwrap();

        assert_eq!(reports.len(), 5);
        for (i, r) in reports.iter().enumerate() {
            assert_eq!(r.fold, i);
            assert_eq!(r.test_size, 2);
            assert_eq!(r.matrix.total(), r.test_size as u64);
            assert_eq!(r.matrix.correct1, 0);
            assert_eq!(r.matrix.wrong_as1, 0);
            assert_eq!(r.metrics.precision1, 0.0);
            assert_eq!(r.metrics.recall1, 0.0);
        }
        let correct0: u64 = reports.iter().map(|r| r.matrix.correct0).sum();
        let wrong_as0: u64 = reports.iter().map(|r| r.matrix.wrong_as0).sum();
        assert_eq!(correct0, 5);
        assert_eq!(wrong_as0, 5);
    }

    #[test]
    fn test_always_zero_per_fold_matrices() {
        // test buckets for seed 12345: [2,4] [5,6] [1,8] [3,9] [0,7]
        let mut trainer = MockTrainer::new();
        trainer.expect_fit().times(5).returning(|_, _| always_zero());

        let reports = CrossValidator::new(5, 12345)
            .run(&balanced(), &trainer, &TrainerConfig::default())
            .unwrap();

        let mixed = ConfusionMatrix { correct0: 1, wrong_as0: 1, ..ConfusionMatrix::default() };
        let expected = [
            ConfusionMatrix { correct0: 2, ..ConfusionMatrix::default() },
            ConfusionMatrix { wrong_as0: 2, ..ConfusionMatrix::default() },
            mixed,
            mixed,
            mixed,
        ];
        let matrices: Vec<ConfusionMatrix> = reports.iter().map(|r| r.matrix).collect();
        assert_eq!(matrices, expected);

        let precision0: Vec<f64> = reports.iter().map(|r| r.metrics.precision0).collect();
        assert_eq!(precision0, vec![1.0, 0.0, 0.5, 0.5, 0.5]);
        let recall0: Vec<f64> = reports.iter().map(|r| r.metrics.recall0).collect();
        assert_eq!(recall0, vec![1.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_invalid_fold_count_rejected_before_training() {
        for k in [1, 11] {
            let mut trainer = MockTrainer::new();
            trainer.expect_fit().never();
            let err = CrossValidator::new(k, 12345)
                .run(&balanced(), &trainer, &TrainerConfig::default())
                .unwrap_err();
            assert!(matches!(err, EvalError::InvalidFoldCount { folds, samples: 10 } if folds == k));
        }
    }

    #[test]
    fn test_unsupported_prediction_aborts_run() {
        let mut trainer = MockTrainer::new();
        trainer
            .expect_fit()
            .times(1)
            .returning(|_, _| Ok(Box::new(FixedOutput(2.0)) as Box<dyn Model>));

        let mut seen = 0;
        let err = CrossValidator::new(5, 12345)
            .run_with(&balanced(), &trainer, &TrainerConfig::default(), |_| seen += 1)
            .unwrap_err();

        assert_eq!(seen, 0);
        assert_eq!(err.fold(), Some(0));
        assert!(matches!(err.root(), EvalError::UnsupportedLabel { value } if *value == 2.0));
    }

    #[test]
    fn test_training_failure_names_fold() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut trainer = MockTrainer::new();
        trainer.expect_fit().times(2).returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                always_zero()
            } else {
                Err(EvalError::TrainingFailure("did not converge".to_string()))
            }
        });

        let mut completed = Vec::new();
        let err = CrossValidator::new(5, 12345)
            .run_with(&balanced(), &trainer, &TrainerConfig::default(), |r| completed.push(r.fold))
            .unwrap_err();

        assert_eq!(completed, vec![0]);
        assert_eq!(err.fold(), Some(1));
        assert!(err.to_string().contains("did not converge"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_dimension_mismatch_fails_fold() {
        let mut trainer = MockTrainer::new();
        trainer
            .expect_fit()
            .times(1)
            .returning(|_, _| Ok(Box::new(ConstantModel::new(Label::One, 3)) as Box<dyn Model>));

        let err = CrossValidator::new(2, 1)
            .run(&balanced(), &trainer, &TrainerConfig::default())
            .unwrap_err();
        assert!(matches!(
            err.root(),
            EvalError::PredictionError { expected: 3, actual: 1 }
        ));
    }

    #[test]
    fn test_true_label_outside_domain_fails() {
        let data: Dataset = (0..4).map(|i| Sample::new(i as f64, vec![0.0])).collect();
        let mut trainer = MockTrainer::new();
        trainer.expect_fit().returning(|_, _| always_zero());

        let err = CrossValidator::new(2, 3)
            .run(&data, &trainer, &TrainerConfig::default())
            .unwrap_err();
        assert!(matches!(err.root(), EvalError::UnsupportedLabel { .. }));
    }

    #[test]
    fn test_runs_are_reproducible() {
        let data: Dataset = (0..40)
            .map(|i| Sample::new((i % 3 == 0) as u8 as f64, vec![i as f64]))
            .collect();
        let cv = CrossValidator::new(4, 2024);
        let a = cv.run(&data, &MajorityClassTrainer, &TrainerConfig::default()).unwrap();
        let b = cv.run(&data, &MajorityClassTrainer, &TrainerConfig::default()).unwrap();
        let a: Vec<ConfusionMatrix> = a.iter().map(|f| f.matrix).collect();
        let b: Vec<ConfusionMatrix> = b.iter().map(|f| f.matrix).collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_parallel_matches_sequential_order() {
        let data: Dataset = (0..30)
            .map(|i| Sample::new((i % 4 == 0) as u8 as f64, vec![i as f64]))
            .collect();
        let cv = CrossValidator::new(6, 77);
        let config = TrainerConfig::default();

        let sequential = cv.run(&data, &MajorityClassTrainer, &config).unwrap();

        let mut order = Vec::new();
        let parallel = cv
            .run_parallel(&data, Arc::new(MajorityClassTrainer), config, 3, |r| order.push(r.fold))
            .await
            .unwrap();

        assert_eq!(order, (0..6).collect::<Vec<_>>());
        for (s, p) in sequential.iter().zip(&parallel) {
            assert_eq!(s.fold, p.fold);
            assert_eq!(s.matrix, p.matrix);
        }
    }

    /// Fold 0 is the slowest to fit and fold 2 fails outright
    struct StaggeredTrainer {
        buckets: Vec<Vec<usize>>,
    }

    impl Trainer for StaggeredTrainer {
        fn name(&self) -> &str {
            "staggered"
        }

        fn fit(&self, train: &Dataset, _config: &TrainerConfig) -> Result<Box<dyn Model>, EvalError> {
            // the fold is the one whose test bucket is missing from the train set
            let fold = self
                .buckets
                .iter()
                .position(|b| !train.iter().any(|s| s.features[0] == b[0] as f64))
                .unwrap();
            match fold {
                0 => std::thread::sleep(Duration::from_millis(200)),
                2 => return Err(EvalError::TrainingFailure("diverged".to_string())),
                _ => std::thread::sleep(Duration::from_millis(5)),
            }
            always_zero()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_reports_follow_fold_order() {
        let trainer = StaggeredTrainer {
            buckets: FoldPartitioner::new(5, 12345).assign(10).unwrap(),
        };
        let config = TrainerConfig::default();
        let cancel = config.cancel.clone();

        let mut order = Vec::new();
        let err = CrossValidator::new(5, 12345)
            .run_parallel(&balanced(), Arc::new(trainer), config, 5, |r| order.push(r.fold))
            .await
            .unwrap_err();

        assert_eq!(order, vec![0, 1]);
        assert_eq!(err.fold(), Some(2));
        assert!(matches!(err.root(), EvalError::TrainingFailure(msg) if msg == "diverged"));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_parallel_failure_cancels_run() {
        let mut trainer = MockTrainer::new();
        trainer
            .expect_fit()
            .returning(|_, _| Err(EvalError::TrainingFailure("boom".to_string())));

        let config = TrainerConfig::default();
        let cancel = config.cancel.clone();
        let err = CrossValidator::new(5, 12345)
            .run_parallel(&balanced(), Arc::new(trainer), config, 2, |_| {})
            .await
            .unwrap_err();

        assert_eq!(err.fold(), Some(0));
        assert!(cancel.is_cancelled());
    }

    #[test]
    fn test_parallel_rejects_bad_fold_count() {
        let result = tokio_test::block_on(CrossValidator::new(1, 0).run_parallel(
            &balanced(),
            Arc::new(MajorityClassTrainer),
            TrainerConfig::default(),
            4,
            |_| {},
        ));
        assert!(matches!(result, Err(EvalError::InvalidFoldCount { .. })));
    }
}
