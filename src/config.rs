use crate::decision::{DecisionConfig, MAX_INDICATORS};
use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_MODEL_PATH: &str = "models/phishing_detector.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model_path: String,
    pub decision: DecisionConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Worker threads for batch scoring; `None` uses one per core.
    pub threads: Option<usize>,
    /// Per-item failures logged individually before going quiet.
    pub max_reported_errors: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            decision: DecisionConfig::default(),
            batch: BatchConfig::default(),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threads: None,
            max_reported_errors: 5,
        }
    }
}

impl Config {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Config =
            serde_yaml::from_str(content).map_err(|e| DetectorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::warn!(
                "Configuration file not found: {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| DetectorError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.decision;
        for (name, value) in [
            ("override_confidence", d.override_confidence),
            ("high_risk_above", d.high_risk_above),
            ("medium_risk_above", d.medium_risk_above),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(DetectorError::Config(format!(
                    "decision.{} must be a percentage, got {}",
                    name, value
                )));
            }
        }
        if d.medium_risk_above > d.high_risk_above {
            return Err(DetectorError::Config(
                "decision.medium_risk_above exceeds decision.high_risk_above".to_string(),
            ));
        }
        if !(1..=MAX_INDICATORS).contains(&d.max_indicators) {
            return Err(DetectorError::Config(format!(
                "decision.max_indicators must be between 1 and {}, got {}",
                MAX_INDICATORS, d.max_indicators
            )));
        }
        if self.batch.threads == Some(0) {
            return Err(DetectorError::Config(
                "batch.threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.model_path, DEFAULT_MODEL_PATH);
        assert_eq!(config.decision.override_confidence, 65.0);
        assert_eq!(config.decision.high_risk_above, 80.0);
        assert_eq!(config.decision.medium_risk_above, 60.0);
        assert_eq!(config.decision.max_indicators, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = Config::from_yaml(
            r#"
model_path: "/var/lib/phish-detector/model.json"
decision:
  override_confidence: 70.0
"#,
        )
        .unwrap();
        assert_eq!(config.model_path, "/var/lib/phish-detector/model.json");
        assert_eq!(config.decision.override_confidence, 70.0);
        assert_eq!(config.decision.high_risk_above, 80.0);
        assert_eq!(config.batch.max_reported_errors, 5);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Config::from_yaml("model_path: [unclosed").is_err());
        assert!(Config::from_yaml("socket_path: /tmp/x").is_err());
        assert!(Config::from_yaml("decision:\n  high_risk_above: 150.0").is_err());
        assert!(Config::from_yaml("batch:\n  threads: 0").is_err());
        assert!(Config::from_yaml("decision:\n  max_indicators: 10").is_err());
        assert!(Config::from_yaml("decision:\n  max_indicators: 0").is_err());
    }

    #[test]
    fn test_unknown_nested_keys_rejected() {
        assert!(Config::from_yaml("decision:\n  override_confidance: 50.0").is_err());
        assert!(Config::from_yaml("batch:\n  thread: 4").is_err());
    }

    #[test]
    fn test_yaml_round_trip_through_file() {
        let mut config = Config::default();
        config.batch.threads = Some(2);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_yaml().unwrap().as_bytes()).unwrap();

        assert_eq!(Config::load(file.path()).unwrap(), config);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/phish-detector.yaml").unwrap();
        assert_eq!(config, Config::default());
    }
}
