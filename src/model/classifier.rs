//! Linear classifier loaded from safetensors weights.
//!
//! The classifier artifact (`classifier.safetensors`) holds one dense layer:
//!
//! ```text
//! linear.weight  [n_classes, n_features]  f32
//! linear.bias    [n_classes]              f32
//! ```
//!
//! Header metadata describes what the rows mean: `classes` is a
//! comma-separated list of class labels in row order (default `safe,sqli`),
//! and `probability` is `softmax` for models with a probability head or
//! `none` for margin-only models, which report no confidence.

use std::collections::HashMap;
use std::path::Path;

use ndarray::{Array1, Array2};
use safetensors::SafeTensors;

use super::vectorizer::Features;
use crate::error::{Result, ShieldError};

/// How class scores turn into a confidence value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Probability {
    /// Softmax over scores; confidence is the winning class probability.
    Softmax,
    /// No probability head; confidence is absent.
    None,
}

/// A pre-trained linear classifier over sparse features.
#[derive(Debug, Clone)]
pub struct LinearClassifier {
    weight: Array2<f32>,
    bias: Array1<f32>,
    classes: Vec<String>,
    probability: Probability,
}

impl LinearClassifier {
    /// Build a classifier from its parts, validating shape agreement.
    pub fn new(
        weight: Array2<f32>,
        bias: Array1<f32>,
        classes: Vec<String>,
        probability: Probability,
    ) -> Result<Self> {
        if weight.nrows() < 2 {
            return Err(ShieldError::ModelUnavailable(format!(
                "classifier needs at least 2 classes, got {}",
                weight.nrows()
            )));
        }
        if bias.len() != weight.nrows() {
            return Err(ShieldError::ModelUnavailable(format!(
                "bias length {} does not match {} classes",
                bias.len(),
                weight.nrows()
            )));
        }
        if classes.len() != weight.nrows() {
            return Err(ShieldError::ModelUnavailable(format!(
                "{} class labels for {} weight rows",
                classes.len(),
                weight.nrows()
            )));
        }
        Ok(Self {
            weight,
            bias,
            classes,
            probability,
        })
    }

    /// Load and validate a classifier artifact from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path).map_err(|e| {
            ShieldError::ModelUnavailable(format!(
                "failed to read classifier artifact {}: {e}",
                path.display()
            ))
        })?;

        let (_, header) = SafeTensors::read_metadata(&data).map_err(|e| {
            ShieldError::ModelUnavailable(format!("invalid safetensors header: {e}"))
        })?;
        let extra: HashMap<String, String> = header.metadata().clone().unwrap_or_default();

        let classes: Vec<String> = extra
            .get("classes")
            .map(|raw| raw.split(',').map(|c| c.trim().to_string()).collect())
            .unwrap_or_else(|| vec!["safe".to_string(), "sqli".to_string()]);

        let probability = match extra.get("probability").map(String::as_str) {
            None | Some("softmax") => Probability::Softmax,
            Some("none") => Probability::None,
            Some(other) => {
                return Err(ShieldError::ModelUnavailable(format!(
                    "unknown probability head '{other}'"
                )));
            },
        };

        let tensors = SafeTensors::deserialize(&data).map_err(|e| {
            ShieldError::ModelUnavailable(format!("failed to parse safetensors: {e}"))
        })?;

        let weight = load_tensor_2d(&tensors, "linear.weight")?;
        let bias = load_tensor_1d(&tensors, "linear.bias")?;

        Self::new(weight, bias, classes, probability)
    }

    /// Width of the feature space this classifier expects.
    pub fn n_features(&self) -> usize {
        self.weight.ncols()
    }

    /// Class labels in weight-row order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Predict the winning class label and, when the model has a
    /// probability head, the winning class probability.
    pub fn predict(&self, features: &Features) -> Result<(&str, Option<f32>)> {
        let scores = self.scores(features)?;

        let mut best = 0;
        for (class, &score) in scores.iter().enumerate() {
            if score > scores[best] {
                best = class;
            }
        }

        let confidence = match self.probability {
            Probability::Softmax => Some(softmax(&scores)[best]),
            Probability::None => None,
        };

        Ok((&self.classes[best], confidence))
    }

    /// Raw per-class decision scores (`Wx + b`).
    pub fn scores(&self, features: &Features) -> Result<Array1<f32>> {
        let mut scores = self.bias.clone();
        for (col, value) in features.iter() {
            if col >= self.weight.ncols() {
                return Err(ShieldError::Inference(format!(
                    "feature column {col} out of range ({} columns)",
                    self.weight.ncols()
                )));
            }
            for class in 0..self.weight.nrows() {
                scores[class] += self.weight[[class, col]] * value;
            }
        }

        if scores.iter().any(|s| !s.is_finite()) {
            return Err(ShieldError::Inference(
                "non-finite class score".to_string(),
            ));
        }
        Ok(scores)
    }
}

/// Softmax over class scores.
fn softmax(x: &Array1<f32>) -> Array1<f32> {
    let max = x.fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let exp = x.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    exp / sum
}

fn load_tensor_1d(tensors: &SafeTensors, name: &str) -> Result<Array1<f32>> {
    let view = tensors
        .tensor(name)
        .map_err(|e| ShieldError::ModelUnavailable(format!("tensor '{name}' not found: {e}")))?;

    if view.shape().len() != 1 {
        return Err(ShieldError::ModelUnavailable(format!(
            "expected 1D tensor for '{name}', got {:?}",
            view.shape()
        )));
    }

    Ok(Array1::from_vec(tensor_data_f32(name, &view)?))
}

fn load_tensor_2d(tensors: &SafeTensors, name: &str) -> Result<Array2<f32>> {
    let view = tensors
        .tensor(name)
        .map_err(|e| ShieldError::ModelUnavailable(format!("tensor '{name}' not found: {e}")))?;

    let shape = view.shape();
    if shape.len() != 2 {
        return Err(ShieldError::ModelUnavailable(format!(
            "expected 2D tensor for '{name}', got {shape:?}"
        )));
    }

    let data = tensor_data_f32(name, &view)?;
    Array2::from_shape_vec((shape[0], shape[1]), data)
        .map_err(|e| ShieldError::ModelUnavailable(format!("shape mismatch for '{name}': {e}")))
}

fn tensor_data_f32(name: &str, view: &safetensors::tensor::TensorView<'_>) -> Result<Vec<f32>> {
    if view.dtype() != safetensors::Dtype::F32 {
        return Err(ShieldError::ModelUnavailable(format!(
            "tensor '{name}' must be f32, got {:?}",
            view.dtype()
        )));
    }
    Ok(view
        .data()
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}
