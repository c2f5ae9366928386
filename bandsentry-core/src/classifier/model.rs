//! JSON scoring artifacts produced by the (external) training step.
//!
//! Two artifact kinds, selected by the `type` tag:
//!
//! ```json
//! { "type": "logistic", "weights": [0.0, -2.1, 4.0, 12.5], "bias": -0.3 }
//! { "type": "forest", "trees": [ { "nodes": [
//!     { "split": { "feature": 1, "threshold": 0.95, "left": 1, "right": 2 } },
//!     { "leaf": { "probability": 0.2 } },
//!     { "leaf": { "probability": 0.8 } } ] } ] }
//! ```
//!
//! Tree children must point forward (`left`/`right` > own index), which rules
//! out cycles and keeps traversal bounded by the node count.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{FeatureVector, ScoringArtifact, FEATURE_COUNT};

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse artifact: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid artifact: {0}")]
    Invalid(String),
}

/// One node of a binary decision tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go `left` when `features[feature] <= threshold`, else `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { probability: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, tree_index: usize) -> Result<(), ArtifactError> {
        if self.nodes.is_empty() {
            return Err(ArtifactError::Invalid(format!("tree {tree_index} has no nodes")));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(ArtifactError::Invalid(format!(
                            "tree {tree_index} node {i}: feature {feature} out of range"
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ArtifactError::Invalid(format!(
                            "tree {tree_index} node {i}: non-finite threshold"
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(ArtifactError::Invalid(format!(
                                "tree {tree_index} node {i}: child {child} must point forward within the tree"
                            )));
                        }
                    }
                }
                TreeNode::Leaf { probability } => {
                    if !(0.0..=1.0).contains(probability) {
                        return Err(ArtifactError::Invalid(format!(
                            "tree {tree_index} node {i}: leaf probability {probability} outside [0, 1]"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Walk from the root to a leaf. Assumes `validate` passed.
    pub fn predict(&self, features: &FeatureVector) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = features.get(*feature).unwrap_or(f64::NAN);
                    index = if value <= *threshold { *left } else { *right };
                }
                Some(TreeNode::Leaf { probability }) => return *probability,
                None => return f64::NAN,
            }
        }
    }
}

/// A trained scoring model loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoringModel {
    /// sigmoid(weights · features + bias)
    Logistic {
        weights: [f64; FEATURE_COUNT],
        bias: f64,
    },
    /// Mean leaf probability across trees.
    Forest { trees: Vec<DecisionTree> },
}

impl ScoringModel {
    pub fn from_path(path: &Path) -> Result<Self, ArtifactError> {
        let text = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ArtifactError> {
        let model: Self = serde_json::from_str(text)?;
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        match self {
            Self::Logistic { weights, bias } => {
                if weights.iter().chain(std::iter::once(bias)).any(|w| !w.is_finite()) {
                    return Err(ArtifactError::Invalid(
                        "logistic weights and bias must be finite".into(),
                    ));
                }
                Ok(())
            }
            Self::Forest { trees } => {
                if trees.is_empty() {
                    return Err(ArtifactError::Invalid("forest has no trees".into()));
                }
                trees
                    .iter()
                    .enumerate()
                    .try_for_each(|(i, tree)| tree.validate(i))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Logistic { .. } => "logistic",
            Self::Forest { .. } => "forest",
        }
    }
}

impl ScoringArtifact for ScoringModel {
    fn name(&self) -> &str {
        self.kind()
    }

    fn score(&self, features: &FeatureVector) -> f64 {
        match self {
            Self::Logistic { weights, bias } => {
                let z = weights
                    .iter()
                    .zip(features.0.iter())
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
                    + bias;
                1.0 / (1.0 + (-z).exp())
            }
            Self::Forest { trees } => {
                let sum: f64 = trees.iter().map(|t| t.predict(features)).sum();
                sum / trees.len() as f64
            }
        }
    }
}
