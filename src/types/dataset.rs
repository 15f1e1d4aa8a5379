use std::sync::Arc;

use super::Sample;

/// Immutable, ordered collection of samples.
///
/// Cloning is cheap: clones share the same backing storage, so a dataset can
/// be handed to every fold worker without copying.
#[derive(Debug, Clone)]
pub struct Dataset {
    samples: Arc<[Sample]>,
    n_features: usize,
}

/// Label distribution of a dataset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub zeros: usize,
    pub ones: usize,
    pub other: usize,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        let n_features = samples.iter().map(Sample::dimension).max().unwrap_or(0);
        Self {
            samples: samples.into(),
            n_features,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Width of the widest feature vector
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    /// New dataset holding the samples at `indices`, in that order.
    ///
    /// Panics if any index is out of bounds.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        let samples: Vec<Sample> = indices.iter().map(|&i| self.samples[i].clone()).collect();
        Dataset {
            samples: samples.into(),
            n_features: self.n_features,
        }
    }

    pub fn class_counts(&self) -> ClassCounts {
        self.samples.iter().fold(ClassCounts::default(), |mut acc, s| {
            if s.label == 0.0 {
                acc.zeros += 1;
            } else if s.label == 1.0 {
                acc.ones += 1;
            } else {
                acc.other += 1;
            }
            acc
        })
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Sample> for Dataset {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Dataset::new(iter.into_iter().collect())
    }
}
