//! Traits detected by the vision analysis step.
//!
//! Features are never normalised into their own table; they are embedded as a
//! JSON array on the character row.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Maximum number of features kept from one analysis.
pub const MAX_FEATURES: usize = 12;

/// Allowed range for [`AiFeature::exaggeration`].
pub const EXAGGERATION_RANGE: (f32, f32) = (1.0, 3.0);

/// One detected trait, e.g. `{ name: "eyebrows", value: "thick and arched" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiFeature {
    pub name: String,
    pub value: String,
    /// Model confidence in `0.0..=1.0`.
    #[serde(default = "default_confidence")]
    pub confidence: f32,
    /// How strongly to exaggerate the trait, `1.0..=3.0`.
    #[serde(default = "default_exaggeration")]
    pub exaggeration: f32,
}

fn default_confidence() -> f32 {
    0.5
}

fn default_exaggeration() -> f32 {
    1.5
}

impl AiFeature {
    /// Ranking weight used when only a few features fit in a prompt.
    pub fn weight(&self) -> f32 {
        self.confidence * self.exaggeration
    }

    fn clamped(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.value = self.value.trim().to_string();
        self.confidence = if self.confidence.is_finite() {
            self.confidence.clamp(0.0, 1.0)
        } else {
            default_confidence()
        };
        self.exaggeration = if self.exaggeration.is_finite() {
            self.exaggeration
                .clamp(EXAGGERATION_RANGE.0, EXAGGERATION_RANGE.1)
        } else {
            default_exaggeration()
        };
        self
    }
}

/// Parsed result of the vision analysis call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureAnalysis {
    #[serde(default)]
    pub features: Vec<AiFeature>,
    #[serde(default)]
    pub roast: String,
    #[serde(default)]
    pub summary: String,
}

impl FeatureAnalysis {
    /// Parse the model's text output.
    ///
    /// Accepts bare JSON or JSON wrapped in a Markdown code fence. Feature
    /// values are clamped into range, blank features dropped, and the list
    /// truncated to [`MAX_FEATURES`]. An analysis with neither features nor a
    /// roast is rejected.
    pub fn parse(text: &str) -> Result<Self, CoreError> {
        let body = strip_code_fence(text);
        let raw: FeatureAnalysis = serde_json::from_str(body)
            .map_err(|e| CoreError::Validation(format!("Malformed analysis JSON: {e}")))?;

        let features: Vec<AiFeature> = raw
            .features
            .into_iter()
            .map(AiFeature::clamped)
            .filter(|f| !f.name.is_empty() && !f.value.is_empty())
            .take(MAX_FEATURES)
            .collect();
        let roast = raw.roast.trim().to_string();

        if features.is_empty() && roast.is_empty() {
            return Err(CoreError::Validation(
                "Analysis returned no features and no roast".into(),
            ));
        }

        Ok(Self {
            features,
            roast,
            summary: raw.summary.trim().to_string(),
        })
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the optional language tag on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_bare_json() {
        let text = r#"{"features":[{"name":"nose","value":"long","confidence":0.9,"exaggeration":2.5}],"roast":"Nice nose","summary":"A person"}"#;
        let analysis = FeatureAnalysis::parse(text).unwrap();
        assert_eq!(analysis.features.len(), 1);
        assert_eq!(analysis.roast, "Nice nose");
    }

    #[test]
    fn parses_fenced_json() {
        let text = "```json\n{\"features\":[],\"roast\":\"You look like a screensaver\"}\n```";
        let analysis = FeatureAnalysis::parse(text).unwrap();
        assert!(analysis.features.is_empty());
        assert_eq!(analysis.roast, "You look like a screensaver");
    }

    #[test]
    fn clamps_out_of_range_values() {
        let text = r#"{"features":[{"name":"chin","value":"pointy","confidence":4,"exaggeration":0.1}],"roast":"x"}"#;
        let analysis = FeatureAnalysis::parse(text).unwrap();
        let f = &analysis.features[0];
        assert_eq!(f.confidence, 1.0);
        assert_eq!(f.exaggeration, 1.0);
    }

    #[test]
    fn drops_blank_features_and_truncates() {
        let mut features: Vec<serde_json::Value> = (0..20)
            .map(|i| serde_json::json!({"name": format!("f{i}"), "value": "v"}))
            .collect();
        features.push(serde_json::json!({"name": " ", "value": "v"}));
        let text = serde_json::json!({"features": features, "roast": "r"}).to_string();
        let analysis = FeatureAnalysis::parse(&text).unwrap();
        assert_eq!(analysis.features.len(), MAX_FEATURES);
        assert!(analysis.features.iter().all(|f| !f.name.is_empty()));
    }

    #[test]
    fn rejects_empty_analysis() {
        assert_matches!(
            FeatureAnalysis::parse(r#"{"features":[],"roast":"  "}"#),
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            FeatureAnalysis::parse("I cannot help with that."),
            Err(CoreError::Validation(_))
        );
    }
}
