//! The trained classifier and the types that cross its boundary.
//!
//! The detector never trains a model. It loads an exported tree ensemble once
//! at startup and only reads it afterwards, so a loaded [`ForestModel`] can be
//! shared between threads behind an `Arc`.

use crate::error::{DetectorError, Result};
use crate::features::{FeatureName, FeatureVector, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const PROBABILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Legitimate,
    Phishing,
}

impl Label {
    /// Class index used by the training schema (0 = legitimate, 1 = phishing).
    pub fn class_index(self) -> u8 {
        match self {
            Label::Legitimate => 0,
            Label::Phishing => 1,
        }
    }

    pub fn from_class_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Label::Legitimate),
            1 => Ok(Label::Phishing),
            other => Err(DetectorError::InvalidClassifierOutput(format!(
                "unknown class index {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Legitimate => f.write_str("Legitimate"),
            Label::Phishing => f.write_str("Phishing"),
        }
    }
}

/// `[P(legitimate), P(phishing)]`, validated to be a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassProbabilities {
    legitimate: f64,
    phishing: f64,
}

impl ClassProbabilities {
    pub fn new(legitimate: f64, phishing: f64) -> Result<Self> {
        for (name, p) in [("legitimate", legitimate), ("phishing", phishing)] {
            if !p.is_finite() || !(0.0..=1.0).contains(&p) {
                return Err(DetectorError::InvalidClassifierOutput(format!(
                    "P({}) = {} is not a probability",
                    name, p
                )));
            }
        }
        if (legitimate + phishing - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(DetectorError::InvalidClassifierOutput(format!(
                "probabilities sum to {}, expected 1",
                legitimate + phishing
            )));
        }
        Ok(Self {
            legitimate,
            phishing,
        })
    }

    pub fn from_slice(values: &[f64]) -> Result<Self> {
        match values {
            [legitimate, phishing] => Self::new(*legitimate, *phishing),
            _ => Err(DetectorError::InvalidClassifierOutput(format!(
                "expected 2 class probabilities, got {}",
                values.len()
            ))),
        }
    }

    pub fn legitimate(&self) -> f64 {
        self.legitimate
    }

    pub fn phishing(&self) -> f64 {
        self.phishing
    }

    pub fn of(&self, label: Label) -> f64 {
        match label {
            Label::Legitimate => self.legitimate,
            Label::Phishing => self.phishing,
        }
    }

    /// Most likely label; ties go to the first class.
    pub fn argmax(&self) -> Label {
        if self.phishing > self.legitimate {
            Label::Phishing
        } else {
            Label::Legitimate
        }
    }
}

/// One non-negative weight per feature, fixed after training.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportances {
    weights: [f64; FEATURE_COUNT],
}

impl FeatureImportances {
    pub fn from_slice(weights: &[f64]) -> Result<Self> {
        let weights: [f64; FEATURE_COUNT] = weights.try_into().map_err(|_| {
            DetectorError::InvalidClassifierOutput(format!(
                "expected {} feature importances, got {}",
                FEATURE_COUNT,
                weights.len()
            ))
        })?;
        if let Some((i, w)) = weights
            .iter()
            .enumerate()
            .find(|(_, w)| !w.is_finite() || **w < 0.0)
        {
            return Err(DetectorError::InvalidClassifierOutput(format!(
                "importance of {} is {}",
                FeatureName::ALL[i],
                w
            )));
        }
        Ok(Self { weights })
    }

    pub fn get(&self, name: FeatureName) -> f64 {
        self.weights[name.index()]
    }

    pub fn weights(&self) -> &[f64; FEATURE_COUNT] {
        &self.weights
    }
}

/// Capability the detector needs from a trained model.
pub trait Classifier: Send + Sync {
    fn predict(&self, vector: &FeatureVector) -> Label;
    fn predict_probability(&self, vector: &FeatureVector) -> ClassProbabilities;
    fn feature_importance(&self) -> &FeatureImportances;
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Class weights `[legitimate, phishing]` of the training samples in this leaf.
        value: [f64; 2],
    },
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, tree_index: usize) -> Result<()> {
        let invalid =
            |msg: String| DetectorError::InvalidModel(format!("tree {}: {}", tree_index, msg));

        if self.nodes.is_empty() {
            return Err(invalid("no nodes".to_string()));
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
                        return Err(invalid(format!("node {} splits on feature {}", i, feature)));
                    }
                    if !threshold.is_finite() {
                        return Err(invalid(format!("node {} has threshold {}", i, threshold)));
                    }
                    for child in [*left, *right] {
                        // Children after parents keeps every walk finite.
                        if child <= i || child >= self.nodes.len() {
                            return Err(invalid(format!("node {} has child {}", i, child)));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    let total = value[0] + value[1];
                    if value.iter().any(|v| !v.is_finite() || *v < 0.0) || total <= 0.0 {
                        return Err(invalid(format!("leaf {} has weights {:?}", i, value)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Normalised class distribution of the leaf reached by `features`.
    fn leaf_distribution(&self, features: &[f64; FEATURE_COUNT]) -> [f64; 2] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { value } => {
                    let total = value[0] + value[1];
                    return [value[0] / total, value[1] / total];
                }
            }
        }
    }
}

/// On-disk form of an exported random forest.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ForestDocument {
    pub feature_names: Vec<String>,
    pub feature_importances: Vec<f64>,
    pub trees: Vec<DecisionTree>,
}

/// A random forest evaluated the way it was trained: class probability is the
/// mean of the per-tree leaf distributions.
#[derive(Debug, Clone)]
pub struct ForestModel {
    trees: Vec<DecisionTree>,
    importances: FeatureImportances,
}

impl ForestModel {
    pub fn from_document(document: ForestDocument) -> Result<Self> {
        let expected: Vec<&str> = FeatureName::ALL.iter().map(|n| n.as_str()).collect();
        if document.feature_names != expected {
            return Err(DetectorError::InvalidModel(format!(
                "feature schema mismatch: expected {:?}, got {:?}",
                expected, document.feature_names
            )));
        }

        let importances = FeatureImportances::from_slice(&document.feature_importances)
            .map_err(|e| DetectorError::InvalidModel(e.to_string()))?;

        if document.trees.is_empty() {
            return Err(DetectorError::InvalidModel("model has no trees".to_string()));
        }
        for (i, tree) in document.trees.iter().enumerate() {
            tree.validate(i)?;
        }

        Ok(Self {
            trees: document.trees,
            importances,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let document: ForestDocument = serde_json::from_str(json)
            .map_err(|e| DetectorError::InvalidModel(format!("malformed model JSON: {}", e)))?;
        Self::from_document(document)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| DetectorError::ModelLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let model = Self::from_json(&content)?;
        log::info!(
            "Loaded model from {} ({} trees)",
            path.display(),
            model.tree_count()
        );
        Ok(model)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ForestModel {
    fn predict(&self, vector: &FeatureVector) -> Label {
        self.predict_probability(vector).argmax()
    }

    fn predict_probability(&self, vector: &FeatureVector) -> ClassProbabilities {
        let features = vector.as_f64();
        let mut sums = [0.0f64; 2];
        for tree in &self.trees {
            let dist = tree.leaf_distribution(&features);
            sums[0] += dist[0];
            sums[1] += dist[1];
        }
        let n = self.trees.len() as f64;
        let phishing = (sums[1] / n).clamp(0.0, 1.0);
        ClassProbabilities {
            legitimate: 1.0 - phishing,
            phishing,
        }
    }

    fn feature_importance(&self) -> &FeatureImportances {
        &self.importances
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn feature_names_json() -> String {
        serde_json::to_string(
            &FeatureName::ALL
                .iter()
                .map(|n| n.as_str())
                .collect::<Vec<_>>(),
        )
        .unwrap()
    }

    /// Two stumps: one on urgent_words, one on url_shortener.
    pub(crate) fn sample_model_json() -> String {
        format!(
            r#"{{
                "feature_names": {},
                "feature_importances": [0.3, 0.05, 0.1, 0.1, 0.02, 0.2, 0.03, 0.02, 0.05, 0.02, 0.03, 0.02, 0.02, 0.03, 0.01],
                "trees": [
                    {{ "nodes": [
                        {{ "feature": 0, "threshold": 0.5, "left": 1, "right": 2 }},
                        {{ "value": [80.0, 20.0] }},
                        {{ "value": [10.0, 90.0] }}
                    ] }},
                    {{ "nodes": [
                        {{ "feature": 5, "threshold": 0.5, "left": 1, "right": 2 }},
                        {{ "value": [7.0, 3.0] }},
                        {{ "value": [1.0, 9.0] }}
                    ] }}
                ]
            }}"#,
            feature_names_json()
        )
    }

    #[test]
    fn test_class_probabilities_validation() {
        assert!(ClassProbabilities::new(0.42, 0.58).is_ok());
        assert!(ClassProbabilities::new(0.5, 0.6).is_err());
        assert!(ClassProbabilities::new(-0.1, 1.1).is_err());
        assert!(ClassProbabilities::new(f64::NAN, 1.0).is_err());
        assert!(ClassProbabilities::from_slice(&[0.1, 0.2, 0.7]).is_err());

        let p = ClassProbabilities::from_slice(&[0.1, 0.9]).unwrap();
        assert_eq!(p.of(Label::Phishing), 0.9);
        assert_eq!(p.argmax(), Label::Phishing);
        assert_eq!(
            ClassProbabilities::new(0.5, 0.5).unwrap().argmax(),
            Label::Legitimate
        );
    }

    #[test]
    fn test_feature_importances_validation() {
        assert!(FeatureImportances::from_slice(&[0.1; 14]).is_err());
        assert!(FeatureImportances::from_slice(&[0.1; 16]).is_err());

        let mut weights = [1.0 / 15.0; 15];
        assert!(FeatureImportances::from_slice(&weights).is_ok());
        weights[3] = -0.01;
        let err = FeatureImportances::from_slice(&weights).unwrap_err();
        assert!(err.to_string().contains("suspicious_links"));
    }

    #[test]
    fn test_label_class_index() {
        assert_eq!(Label::from_class_index(0).unwrap(), Label::Legitimate);
        assert_eq!(Label::from_class_index(1).unwrap(), Label::Phishing);
        assert!(matches!(
            Label::from_class_index(2),
            Err(DetectorError::InvalidClassifierOutput(_))
        ));
        assert_eq!(Label::Phishing.class_index(), 1);
    }

    #[test]
    fn test_forest_prediction() {
        let model = ForestModel::from_json(&sample_model_json()).unwrap();
        assert_eq!(model.tree_count(), 2);

        let clean = FeatureVector::default();
        let p = model.predict_probability(&clean);
        // mean of 0.2 and 0.3
        assert!((p.phishing() - 0.25).abs() < 1e-9);
        assert_eq!(model.predict(&clean), Label::Legitimate);

        let mut values = [0u8; FEATURE_COUNT];
        values[FeatureName::UrgentWords.index()] = 1;
        values[FeatureName::UrlShortener.index()] = 1;
        let phishy = FeatureVector::from_values(values).unwrap();
        let p = model.predict_probability(&phishy);
        assert!((p.phishing() - 0.9).abs() < 1e-9);
        assert!((p.legitimate() + p.phishing() - 1.0).abs() < 1e-9);
        assert_eq!(model.predict(&phishy), Label::Phishing);

        assert_eq!(model.feature_importance().get(FeatureName::UrgentWords), 0.3);
    }

    #[test]
    fn test_forest_rejects_schema_mismatch() {
        let json = sample_model_json().replace("\"has_html\"", "\"html\"");
        let err = ForestModel::from_json(&json).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidModel(_)));
    }

    #[test]
    fn test_forest_rejects_backward_child() {
        let json = format!(
            r#"{{ "feature_names": {}, "feature_importances": [{}],
                 "trees": [{{ "nodes": [
                    {{ "feature": 0, "threshold": 0.5, "left": 0, "right": 1 }},
                    {{ "value": [1.0, 1.0] }}
                 ] }}] }}"#,
            feature_names_json(),
            vec!["0.0"; 15].join(",")
        );
        assert!(matches!(
            ForestModel::from_json(&json),
            Err(DetectorError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_forest_rejects_empty_and_bad_leaves() {
        let zeros = vec!["0.0"; 15].join(",");
        let no_trees = format!(
            r#"{{ "feature_names": {}, "feature_importances": [{}], "trees": [] }}"#,
            feature_names_json(),
            zeros
        );
        assert!(ForestModel::from_json(&no_trees).is_err());

        let empty_leaf = format!(
            r#"{{ "feature_names": {}, "feature_importances": [{}],
                 "trees": [{{ "nodes": [{{ "value": [0.0, 0.0] }}] }}] }}"#,
            feature_names_json(),
            zeros
        );
        assert!(ForestModel::from_json(&empty_leaf).is_err());

        assert!(ForestModel::from_json("not json").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_model_json().as_bytes()).unwrap();
        let model = ForestModel::load(file.path()).unwrap();
        assert_eq!(model.tree_count(), 2);
    }

    #[test]
    fn test_load_missing_file_is_model_load_error() {
        let err = ForestModel::load("/nonexistent/phishing_detector.json").unwrap_err();
        assert!(matches!(err, DetectorError::ModelLoad { .. }));
    }
}
