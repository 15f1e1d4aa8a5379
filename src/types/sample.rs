use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// One labeled feature vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub label: f64,
    pub features: Vec<f64>,
}

impl Sample {
    pub fn new(label: f64, features: Vec<f64>) -> Self {
        Self { label, features }
    }

    pub fn dimension(&self) -> usize {
        self.features.len()
    }

    pub fn class(&self) -> Result<Label, EvalError> {
        Label::try_from(self.label)
    }
}

/// Binary class label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Zero,
    One,
}

impl Label {
    pub fn as_f64(&self) -> f64 {
        match self {
            Label::Zero => 0.0,
            Label::One => 1.0,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Label::Zero => 0,
            Label::One => 1,
        }
    }
}

impl TryFrom<f64> for Label {
    type Error = EvalError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if value == 0.0 {
            Ok(Label::Zero)
        } else if value == 1.0 {
            Ok(Label::One)
        } else {
            Err(EvalError::UnsupportedLabel { value })
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index())
    }
}
