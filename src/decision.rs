//! Decision Policy
//!
//! Turns the classifier's raw output into a final verdict: label, confidence,
//! risk tier and the indicators that contributed most. Includes the
//! false-alarm override that downgrades weak phishing predictions on long
//! emails with no other signal.

use crate::classifier::{ClassProbabilities, FeatureImportances, Label};
use crate::features::{FeatureName, FeatureVector};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Features that on their own justify showing indicators to the user.
pub const REAL_INDICATORS: [FeatureName; 6] = [
    FeatureName::UrgentWords,
    FeatureName::ThreatWords,
    FeatureName::SuspiciousLinks,
    FeatureName::UrlShortener,
    FeatureName::SuspiciousTld,
    FeatureName::PersonalInfoRequest,
];

/// Upper bound on the indicators reported with a verdict.
pub const MAX_INDICATORS: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DecisionConfig {
    /// Phishing predictions below this confidence (percent) can be overridden.
    pub override_confidence: f64,
    pub high_risk_above: f64,
    pub medium_risk_above: f64,
    /// At most [`MAX_INDICATORS`]; larger values are clamped.
    pub max_indicators: usize,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            override_confidence: 65.0,
            high_risk_above: 80.0,
            medium_risk_above: 60.0,
            max_indicators: MAX_INDICATORS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTier {
    High,
    Medium,
    Low,
    None,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskTier::High => "HIGH RISK",
            RiskTier::Medium => "MEDIUM RISK",
            RiskTier::Low => "LOW RISK",
            RiskTier::None => "NONE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Indicator {
    pub feature: FeatureName,
    /// Classifier importance of the feature, in percent.
    pub importance_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub label: Label,
    /// Confidence in `label`, in percent.
    pub confidence: f64,
    pub risk_tier: RiskTier,
    pub top_indicators: Vec<Indicator>,
    /// Set when a low-confidence phishing prediction was downgraded.
    pub false_alarm_override: bool,
}

pub fn has_real_indicators(vector: &FeatureVector) -> bool {
    REAL_INDICATORS.iter().any(|&name| vector.get(name) > 0)
}

pub fn only_body_length(vector: &FeatureVector) -> bool {
    vector.active_count() == 1 && vector.get(FeatureName::BodyLength) > 0
}

#[derive(Debug, Clone, Default)]
pub struct DecisionPolicy {
    config: DecisionConfig,
}

impl DecisionPolicy {
    pub fn new(config: DecisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Make the final decision for one email. Total over all inputs.
    pub fn decide(
        &self,
        vector: &FeatureVector,
        predicted: Label,
        probabilities: &ClassProbabilities,
        importances: &FeatureImportances,
    ) -> Verdict {
        let real_indicators = has_real_indicators(vector);

        let (label, confidence, risk_tier, false_alarm_override) = match predicted {
            Label::Phishing => {
                let confidence = probabilities.phishing() * 100.0;
                if only_body_length(vector)
                    && confidence < self.config.override_confidence
                    && !real_indicators
                {
                    log::debug!(
                        "Overriding phishing prediction at {:.1}%: body length is the only signal",
                        confidence
                    );
                    (
                        Label::Legitimate,
                        probabilities.legitimate() * 100.0,
                        RiskTier::None,
                        true,
                    )
                } else {
                    (
                        Label::Phishing,
                        confidence,
                        self.risk_tier(confidence),
                        false,
                    )
                }
            }
            Label::Legitimate => (
                Label::Legitimate,
                probabilities.legitimate() * 100.0,
                RiskTier::None,
                false,
            ),
        };

        let top_indicators = if real_indicators {
            self.top_indicators(vector, importances)
        } else {
            Vec::new()
        };

        Verdict {
            label,
            confidence,
            risk_tier,
            top_indicators,
            false_alarm_override,
        }
    }

    fn risk_tier(&self, confidence: f64) -> RiskTier {
        if confidence > self.config.high_risk_above {
            RiskTier::High
        } else if confidence > self.config.medium_risk_above {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    /// Present features ranked by importance; ties keep training order.
    fn top_indicators(
        &self,
        vector: &FeatureVector,
        importances: &FeatureImportances,
    ) -> Vec<Indicator> {
        let mut candidates: Vec<(FeatureName, f64)> = vector
            .active()
            .map(|(name, _)| (name, importances.get(name)))
            .filter(|(_, weight)| *weight > 0.0)
            .collect();
        candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        candidates
            .into_iter()
            .take(self.config.max_indicators.min(MAX_INDICATORS))
            .map(|(feature, weight)| Indicator {
                feature,
                importance_percent: weight * 100.0,
            })
            .collect()
    }
}
