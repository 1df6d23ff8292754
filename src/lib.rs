pub mod batch;
pub mod classifier;
pub mod config;
pub mod decision;
pub mod detector;
pub mod error;
pub mod features;

pub use classifier::{ClassProbabilities, Classifier, FeatureImportances, ForestModel, Label};
pub use config::Config;
pub use decision::{DecisionConfig, DecisionPolicy, Indicator, RiskTier, Verdict};
pub use detector::{Analysis, PhishingDetector};
pub use error::{DetectorError, Result};
pub use features::{extract, FeatureExtractor, FeatureName, FeatureVector, FEATURE_COUNT};
