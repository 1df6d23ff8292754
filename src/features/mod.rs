//! Email feature extraction.
//!
//! Turns raw email text into a fixed-order vector of 15 phishing signals.
//! Every detector is an independent pure function over [`EmailText`]; the
//! order of [`FeatureName::ALL`] is the order the classifier was trained on.

pub mod content;
pub mod keywords;
pub mod link_analyzer;

use crate::error::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of signals in a [`FeatureVector`].
pub const FEATURE_COUNT: usize = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureName {
    UrgentWords,
    GenericGreeting,
    ThreatWords,
    SuspiciousLinks,
    IpAddressUrl,
    UrlShortener,
    SuspiciousTld,
    MisspelledDomain,
    PersonalInfoRequest,
    SpellingMistakes,
    ExcessivePunctuation,
    DollarSigns,
    AttachmentMention,
    BodyLength,
    HasHtml,
}

impl FeatureName {
    pub const ALL: [FeatureName; FEATURE_COUNT] = [
        FeatureName::UrgentWords,
        FeatureName::GenericGreeting,
        FeatureName::ThreatWords,
        FeatureName::SuspiciousLinks,
        FeatureName::IpAddressUrl,
        FeatureName::UrlShortener,
        FeatureName::SuspiciousTld,
        FeatureName::MisspelledDomain,
        FeatureName::PersonalInfoRequest,
        FeatureName::SpellingMistakes,
        FeatureName::ExcessivePunctuation,
        FeatureName::DollarSigns,
        FeatureName::AttachmentMention,
        FeatureName::BodyLength,
        FeatureName::HasHtml,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureName::UrgentWords => "urgent_words",
            FeatureName::GenericGreeting => "generic_greeting",
            FeatureName::ThreatWords => "threat_words",
            FeatureName::SuspiciousLinks => "suspicious_links",
            FeatureName::IpAddressUrl => "ip_address_url",
            FeatureName::UrlShortener => "url_shortener",
            FeatureName::SuspiciousTld => "suspicious_tld",
            FeatureName::MisspelledDomain => "misspelled_domain",
            FeatureName::PersonalInfoRequest => "personal_info_request",
            FeatureName::SpellingMistakes => "spelling_mistakes",
            FeatureName::ExcessivePunctuation => "excessive_punctuation",
            FeatureName::DollarSigns => "dollar_signs",
            FeatureName::AttachmentMention => "attachment_mention",
            FeatureName::BodyLength => "body_length",
            FeatureName::HasHtml => "has_html",
        }
    }

    /// Largest value the feature can take. Flags are capped at 1.
    pub fn max_value(self) -> u8 {
        match self {
            FeatureName::SuspiciousLinks => link_analyzer::MAX_SUSPICIOUS_LINKS,
            FeatureName::SpellingMistakes => content::MAX_SPELLING_MISTAKES,
            FeatureName::DollarSigns => content::MAX_CURRENCY_SYMBOLS,
            FeatureName::BodyLength => content::MAX_BODY_LENGTH_BUCKET,
            _ => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<FeatureName> {
        Self::ALL.get(index).copied()
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The 15 signals of one email, in training order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FeatureVector {
    values: [u8; FEATURE_COUNT],
}

impl FeatureVector {
    /// Build a vector from raw values, rejecting anything outside a feature's range.
    pub fn from_values(values: [u8; FEATURE_COUNT]) -> Result<Self> {
        for (name, &value) in FeatureName::ALL.iter().zip(values.iter()) {
            if value > name.max_value() {
                return Err(DetectorError::InvalidClassifierOutput(format!(
                    "{} = {} exceeds maximum {}",
                    name,
                    value,
                    name.max_value()
                )));
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, name: FeatureName) -> u8 {
        self.values[name.index()]
    }

    pub fn values(&self) -> &[u8; FEATURE_COUNT] {
        &self.values
    }

    /// Features that are present in this email, in training order.
    pub fn active(&self) -> impl Iterator<Item = (FeatureName, u8)> + '_ {
        FeatureName::ALL
            .iter()
            .zip(self.values.iter())
            .filter(|(_, &value)| value > 0)
            .map(|(&name, &value)| (name, value))
    }

    pub fn active_count(&self) -> usize {
        self.values.iter().filter(|&&v| v > 0).count()
    }

    pub fn is_zero(&self) -> bool {
        self.active_count() == 0
    }

    pub fn as_f64(&self) -> [f64; FEATURE_COUNT] {
        self.values.map(f64::from)
    }
}

/// Email text prepared once for every detector.
#[derive(Debug, Clone)]
pub struct EmailText<'a> {
    raw: &'a str,
    lower: String,
    char_len: usize,
}

impl<'a> EmailText<'a> {
    pub fn new(raw: &'a str) -> Self {
        Self {
            raw,
            lower: raw.to_lowercase(),
            char_len: raw.chars().count(),
        }
    }

    pub fn raw(&self) -> &str {
        self.raw
    }

    pub fn lower(&self) -> &str {
        &self.lower
    }

    /// Length in characters, not bytes.
    pub fn char_len(&self) -> usize {
        self.char_len
    }

    pub fn contains_any(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.lower.contains(needle))
    }
}

type Detector = fn(&EmailText) -> u8;

const DETECTORS: [(FeatureName, Detector); FEATURE_COUNT] = [
    (FeatureName::UrgentWords, keywords::urgent_words),
    (FeatureName::GenericGreeting, keywords::generic_greeting),
    (FeatureName::ThreatWords, keywords::threat_words),
    (FeatureName::SuspiciousLinks, link_analyzer::suspicious_links),
    (FeatureName::IpAddressUrl, link_analyzer::ip_address_url),
    (FeatureName::UrlShortener, link_analyzer::url_shortener),
    (FeatureName::SuspiciousTld, link_analyzer::suspicious_tld),
    (FeatureName::MisspelledDomain, keywords::misspelled_domain),
    (FeatureName::PersonalInfoRequest, keywords::personal_info_request),
    (FeatureName::SpellingMistakes, content::spelling_mistakes),
    (FeatureName::ExcessivePunctuation, content::excessive_punctuation),
    (FeatureName::DollarSigns, content::dollar_signs),
    (FeatureName::AttachmentMention, content::attachment_mention),
    (FeatureName::BodyLength, content::body_length),
    (FeatureName::HasHtml, content::has_html),
];

/// Converts email text into a [`FeatureVector`]. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> FeatureVector {
        let email = EmailText::new(text);
        let mut values = [0u8; FEATURE_COUNT];

        for (slot, (name, detector)) in values.iter_mut().zip(DETECTORS.iter()) {
            *slot = detector(&email).min(name.max_value());
        }

        let vector = FeatureVector { values };
        log::debug!(
            "Extracted {} active features from {} chars",
            vector.active_count(),
            email.char_len()
        );
        vector
    }

    /// Missing text is analysed as empty text.
    pub fn extract_opt(&self, text: Option<&str>) -> FeatureVector {
        self.extract(text.unwrap_or(""))
    }

    /// Bytes in an unknown encoding are decoded lossily before analysis.
    pub fn extract_bytes(&self, bytes: &[u8]) -> FeatureVector {
        self.extract(&String::from_utf8_lossy(bytes))
    }
}

/// Shorthand for `FeatureExtractor::new().extract(text)`.
pub fn extract(text: &str) -> FeatureVector {
    FeatureExtractor::new().extract(text)
}
