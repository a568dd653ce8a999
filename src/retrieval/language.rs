//! Language policy: which languages the corpus serves and how a request
//! language is chosen from detection results.

use crate::config::LanguageConfig;
use crate::documents::normalize_language;

/// Output of an upstream language detector.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedLanguage {
    pub code: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
}

#[derive(Debug, Clone)]
pub struct LanguagePolicy {
    default: String,
    supported: Vec<String>,
    threshold: f32,
}

impl Default for LanguagePolicy {
    fn default() -> Self {
        Self::from_config(&LanguageConfig::default())
    }
}

impl LanguagePolicy {
    pub fn from_config(config: &LanguageConfig) -> Self {
        Self {
            default: normalize_language(&config.default),
            supported: config.supported.iter().map(|c| normalize_language(c)).collect(),
            threshold: config.detection_confidence_threshold,
        }
    }

    pub fn default_language(&self) -> &str {
        &self.default
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn is_supported(&self, code: &str) -> bool {
        let code = normalize_language(code);
        self.supported.iter().any(|s| *s == code)
    }

    pub fn is_default(&self, code: &str) -> bool {
        normalize_language(code) == self.default
    }

    /// Pick the language to retrieve in.
    ///
    /// A supported detection at or above the confidence threshold wins; then a
    /// supported UI language; then the default.
    pub fn resolve_requested_language(
        &self,
        detected: Option<&DetectedLanguage>,
        ui_language: Option<&str>,
    ) -> String {
        if let Some(d) = detected {
            if d.confidence >= self.threshold && self.is_supported(&d.code) {
                return normalize_language(&d.code);
            }
            tracing::debug!(
                target: "retrieval",
                "detection {} ({:.2}) below threshold {:.2} or unsupported",
                d.code,
                d.confidence,
                self.threshold
            );
        }

        match ui_language {
            Some(ui) if self.is_supported(ui) => normalize_language(ui),
            _ => self.default.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detected(code: &str, confidence: f32) -> DetectedLanguage {
        DetectedLanguage {
            code: code.to_string(),
            confidence,
        }
    }

    #[test]
    fn test_confident_detection_wins() {
        let policy = LanguagePolicy::default();
        assert_eq!(
            policy.resolve_requested_language(Some(&detected("ur", 0.9)), Some("ja")),
            "ur"
        );
    }

    #[test]
    fn test_low_confidence_uses_ui_language() {
        let policy = LanguagePolicy::default();
        assert_eq!(
            policy.resolve_requested_language(Some(&detected("ur", 0.3)), Some("ja")),
            "ja"
        );
    }

    #[test]
    fn test_falls_back_to_default() {
        let policy = LanguagePolicy::default();
        assert_eq!(
            policy.resolve_requested_language(Some(&detected("fr", 0.99)), Some("de")),
            "en"
        );
        assert_eq!(policy.resolve_requested_language(None, None), "en");
    }

    #[test]
    fn test_threshold_is_configurable() {
        let policy = LanguagePolicy::from_config(&LanguageConfig {
            detection_confidence_threshold: 0.2,
            ..Default::default()
        });
        assert_eq!(
            policy.resolve_requested_language(Some(&detected("ur", 0.3)), None),
            "ur"
        );
    }
}
