use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::EvalError;
use crate::types::Dataset;

/// One train/test split of the source dataset
#[derive(Debug, Clone)]
pub struct Fold {
    pub index: usize,
    pub train: Dataset,
    pub test: Dataset,
    /// Positions of the test samples in the source dataset, ascending
    pub test_indices: Vec<usize>,
}

/// Deterministic k-fold splitter.
///
/// Indices are shuffled with a ChaCha8 stream seeded from `seed`, then cut
/// into `folds` contiguous buckets whose sizes differ by at most one (the
/// first `n % folds` buckets take the extra sample). Each bucket is sorted so
/// that train and test sets keep the source order.
#[derive(Debug, Clone, Copy)]
pub struct FoldPartitioner {
    folds: usize,
    seed: u64,
}

impl FoldPartitioner {
    pub fn new(folds: usize, seed: u64) -> Self {
        Self { folds, seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn validate(&self, n_samples: usize) -> Result<(), EvalError> {
        if self.folds < 2 || self.folds > n_samples {
            return Err(EvalError::InvalidFoldCount {
                folds: self.folds,
                samples: n_samples,
            });
        }
        Ok(())
    }

    /// Test buckets for `n_samples` indices, one per fold
    pub fn assign(&self, n_samples: usize) -> Result<Vec<Vec<usize>>, EvalError> {
        self.validate(n_samples)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        indices.shuffle(&mut rng);

        let base = n_samples / self.folds;
        let remainder = n_samples % self.folds;

        let mut buckets = Vec::with_capacity(self.folds);
        let mut start = 0;
        for i in 0..self.folds {
            let size = base + usize::from(i < remainder);
            let mut bucket = indices[start..start + size].to_vec();
            bucket.sort_unstable();
            buckets.push(bucket);
            start += size;
        }

        Ok(buckets)
    }

    pub fn partition(&self, dataset: &Dataset) -> Result<Vec<Fold>, EvalError> {
        let buckets = self.assign(dataset.len())?;

        // fold id of every sample, used to build the complementary train sets
        let mut owner = vec![0usize; dataset.len()];
        for (fold, bucket) in buckets.iter().enumerate() {
            for &i in bucket {
                owner[i] = fold;
            }
        }

        let folds = buckets
            .into_iter()
            .enumerate()
            .map(|(index, test_indices)| {
                let train_indices: Vec<usize> = (0..dataset.len()).filter(|&i| owner[i] != index).collect();
                debug!(
                    "Fold {}: {} train / {} test samples",
                    index,
                    train_indices.len(),
                    test_indices.len()
                );
                Fold {
                    index,
                    train: dataset.subset(&train_indices),
                    test: dataset.subset(&test_indices),
                    test_indices,
                }
            })
            .collect();

        Ok(folds)
    }
}
