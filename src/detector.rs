use crate::classifier::{Classifier, ForestModel};
use crate::config::Config;
use crate::decision::{DecisionPolicy, Verdict};
use crate::error::Result;
use crate::features::{FeatureExtractor, FeatureVector};
use serde::Serialize;
use std::sync::Arc;

/// Feature vector and verdict for one email.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Analysis {
    pub vector: FeatureVector,
    pub verdict: Verdict,
}

/// Extracts, classifies and decides. The classifier is loaded once and only
/// read afterwards, so one detector can serve many threads.
#[derive(Clone)]
pub struct PhishingDetector {
    extractor: FeatureExtractor,
    classifier: Arc<dyn Classifier>,
    policy: DecisionPolicy,
}

impl PhishingDetector {
    pub fn new(classifier: Arc<dyn Classifier>, policy: DecisionPolicy) -> Self {
        Self {
            extractor: FeatureExtractor::new(),
            classifier,
            policy,
        }
    }

    /// Load the model named in the configuration. A missing model is fatal.
    pub fn from_config(config: &Config) -> Result<Self> {
        let model = ForestModel::load(&config.model_path)?;
        Ok(Self::new(
            Arc::new(model),
            DecisionPolicy::new(config.decision.clone()),
        ))
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn extract(&self, text: &str) -> FeatureVector {
        self.extractor.extract(text)
    }

    pub fn decide(&self, vector: &FeatureVector) -> Verdict {
        let predicted = self.classifier.predict(vector);
        let probabilities = self.classifier.predict_probability(vector);
        self.policy.decide(
            vector,
            predicted,
            &probabilities,
            self.classifier.feature_importance(),
        )
    }

    pub fn analyze(&self, text: &str) -> Analysis {
        let vector = self.extract(text);
        let verdict = self.decide(&vector);
        log::debug!(
            "Verdict: {} at {:.1}% ({})",
            verdict.label,
            verdict.confidence,
            verdict.risk_tier
        );
        Analysis { vector, verdict }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::classifier::{ClassProbabilities, FeatureImportances, Label};
    use crate::decision::RiskTier;
    use crate::features::{FeatureName, FEATURE_COUNT};

    /// Classifier with a fixed answer, for exercising the policy end to end.
    pub(crate) struct StubClassifier {
        pub label: Label,
        pub probabilities: ClassProbabilities,
        pub importances: FeatureImportances,
    }

    impl StubClassifier {
        pub(crate) fn new(label: Label, legitimate: f64, phishing: f64) -> Self {
            Self {
                label,
                probabilities: ClassProbabilities::new(legitimate, phishing).unwrap(),
                importances: FeatureImportances::from_slice(&[1.0 / 15.0; FEATURE_COUNT])
                    .unwrap(),
            }
        }
    }

    impl Classifier for StubClassifier {
        fn predict(&self, _vector: &FeatureVector) -> Label {
            self.label
        }

        fn predict_probability(&self, _vector: &FeatureVector) -> ClassProbabilities {
            self.probabilities
        }

        fn feature_importance(&self) -> &FeatureImportances {
            &self.importances
        }
    }

    #[test]
    fn test_long_email_override_end_to_end() {
        let detector = PhishingDetector::new(
            Arc::new(StubClassifier::new(Label::Phishing, 0.42, 0.58)),
            DecisionPolicy::default(),
        );
        let text = "Minutes from the planning meeting are below. ".repeat(30);
        let analysis = detector.analyze(&text[..1300]);

        assert_eq!(analysis.vector.get(FeatureName::BodyLength), 10);
        assert_eq!(analysis.verdict.label, Label::Legitimate);
        assert!((analysis.verdict.confidence - 42.0).abs() < 1e-9);
        assert_eq!(analysis.verdict.risk_tier, RiskTier::None);
    }

    #[test]
    fn test_with_forest_model() {
        let model =
            ForestModel::from_json(&crate::classifier::tests::sample_model_json()).unwrap();
        let detector = PhishingDetector::new(Arc::new(model), DecisionPolicy::default());

        let analysis = detector.analyze("URGENT: verify now http://bit.ly/x");
        assert_eq!(analysis.verdict.label, Label::Phishing);
        assert_eq!(analysis.verdict.risk_tier, RiskTier::High);
        assert_eq!(
            analysis.verdict.top_indicators[0].feature,
            FeatureName::UrgentWords
        );

        let analysis = detector.analyze("See you at lunch tomorrow.");
        assert_eq!(analysis.verdict.label, Label::Legitimate);
        assert!((analysis.verdict.confidence - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_detector_is_shareable_across_threads() {
        let detector = PhishingDetector::new(
            Arc::new(StubClassifier::new(Label::Phishing, 0.1, 0.9)),
            DecisionPolicy::default(),
        );
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let detector = detector.clone();
                std::thread::spawn(move || detector.analyze("act now!!!").verdict.label)
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Label::Phishing);
        }
    }

    #[test]
    fn test_from_config_missing_model() {
        let config = Config {
            model_path: "/nonexistent/model.json".to_string(),
            ..Config::default()
        };
        assert!(PhishingDetector::from_config(&config).is_err());
    }
}
