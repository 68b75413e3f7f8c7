//! Prompt construction for the analysis and image-generation calls.
//!
//! Each generation attempt uses a [`PromptVariant`] chosen from its attempt
//! number. Later variants move the description away from literal facial
//! details and towards a stylised toy rendition, which gets past most
//! content-policy refusals that the first wording triggers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::features::AiFeature;

/// Maximum number of features worked into a generation prompt.
pub const MAX_PROMPT_FEATURES: usize = 6;

/// Instructions sent with the uploaded photo to the vision model.
pub const ANALYSIS_PROMPT: &str = "You are a good-natured comedy roast writer. Look at the person \
in this photo and list their most distinctive, caricature-worthy visual traits. Respond with JSON \
only, shaped as {\"features\": [{\"name\": string, \"value\": string, \"confidence\": number \
between 0 and 1, \"exaggeration\": number between 1 and 3}], \"roast\": string, \"summary\": \
string}. The roast is one playful sentence, never cruel, never about race, religion, disability \
or body weight.";

// ---------------------------------------------------------------------------
// CharacterStyle
// ---------------------------------------------------------------------------

/// Visual style of the generated character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CharacterStyle {
    #[default]
    ActionFigure,
    Bobblehead,
    Claymation,
    Plushie,
}

impl CharacterStyle {
    pub const ALL: [CharacterStyle; 4] = [
        CharacterStyle::ActionFigure,
        CharacterStyle::Bobblehead,
        CharacterStyle::Claymation,
        CharacterStyle::Plushie,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CharacterStyle::ActionFigure => "action_figure",
            CharacterStyle::Bobblehead => "bobblehead",
            CharacterStyle::Claymation => "claymation",
            CharacterStyle::Plushie => "plushie",
        }
    }

    /// Human-readable label with its article, used in OG titles.
    pub fn label_with_article(self) -> &'static str {
        match self {
            CharacterStyle::ActionFigure => "an Action Figure",
            CharacterStyle::Bobblehead => "a Bobblehead",
            CharacterStyle::Claymation => "a Claymation",
            CharacterStyle::Plushie => "a Plushie",
        }
    }

    fn scene(self) -> &'static str {
        match self {
            CharacterStyle::ActionFigure => {
                "a collectible action figure sealed in a retail blister pack, with a printed \
                 cardboard backing and small accessories beside it"
            }
            CharacterStyle::Bobblehead => {
                "a glossy bobblehead figurine with an oversized head on a small round base"
            }
            CharacterStyle::Claymation => {
                "a handmade claymation puppet on a miniature stop-motion set"
            }
            CharacterStyle::Plushie => "a soft stitched plush toy sitting on a shelf",
        }
    }
}

impl fmt::Display for CharacterStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CharacterStyle {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        CharacterStyle::ALL
            .into_iter()
            .find(|style| style.as_str() == normalized)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Invalid style '{s}'. Must be one of: {}",
                    CharacterStyle::ALL.map(CharacterStyle::as_str).join(", ")
                ))
            })
    }
}

// ---------------------------------------------------------------------------
// PromptVariant
// ---------------------------------------------------------------------------

/// Escalating wording used by successive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptVariant {
    Standard,
    Softened,
    Stylized,
    Abstract,
    Minimal,
}

impl PromptVariant {
    const LADDER: [PromptVariant; 5] = [
        PromptVariant::Standard,
        PromptVariant::Softened,
        PromptVariant::Stylized,
        PromptVariant::Abstract,
        PromptVariant::Minimal,
    ];

    /// Variant for a 1-based attempt number. The last variant repeats.
    pub fn for_attempt(attempt: u32) -> Self {
        let index = (attempt.max(1) - 1) as usize;
        Self::LADDER[index.min(Self::LADDER.len() - 1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PromptVariant::Standard => "standard",
            PromptVariant::Softened => "softened",
            PromptVariant::Stylized => "stylized",
            PromptVariant::Abstract => "abstract",
            PromptVariant::Minimal => "minimal",
        }
    }

    /// How many features this variant works into the prompt.
    pub fn feature_budget(self) -> usize {
        match self {
            PromptVariant::Standard | PromptVariant::Softened => MAX_PROMPT_FEATURES,
            PromptVariant::Stylized => 4,
            PromptVariant::Abstract => 2,
            PromptVariant::Minimal => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Prompt building
// ---------------------------------------------------------------------------

/// Build the image-generation prompt for one attempt.
///
/// Features are ordered by `confidence * exaggeration` so the most
/// recognisable traits survive the per-variant feature budget.
pub fn build_generation_prompt(
    style: CharacterStyle,
    features: &[AiFeature],
    roast: Option<&str>,
    variant: PromptVariant,
) -> String {
    let mut ranked: Vec<&AiFeature> = features.iter().collect();
    ranked.sort_by(|a, b| b.weight().total_cmp(&a.weight()));

    let traits: Vec<String> = ranked
        .into_iter()
        .take(variant.feature_budget())
        .map(|f| describe_feature(f, variant))
        .collect();

    let mut prompt = match variant {
        PromptVariant::Standard => format!(
            "Turn the person in the reference photo into {}. Keep their likeness recognisable \
             and playfully exaggerate their signature traits",
            style.scene()
        ),
        PromptVariant::Softened => format!(
            "Create a friendly, family-safe caricature of the person in the reference photo as {}. \
             Gently exaggerate their most recognisable traits",
            style.scene()
        ),
        PromptVariant::Stylized => format!(
            "Design a cartoon toy character inspired by the reference photo, rendered as {}. \
             Use bright colours and a cheerful expression",
            style.scene()
        ),
        PromptVariant::Abstract => format!(
            "Design an original cartoon toy character, rendered as {}, loosely inspired by the \
             colours and hairstyle in the reference photo",
            style.scene()
        ),
        PromptVariant::Minimal => format!(
            "A cheerful original cartoon toy character rendered as {}, studio lighting, product \
             photography",
            style.scene()
        ),
    };

    if !traits.is_empty() {
        prompt.push_str(": ");
        prompt.push_str(&traits.join("; "));
    }
    prompt.push('.');

    if let Some(roast) = roast.map(str::trim).filter(|r| !r.is_empty()) {
        if matches!(variant, PromptVariant::Standard | PromptVariant::Softened) {
            prompt.push_str(&format!(
                " The packaging tagline reads: \"{}\".",
                truncate_chars(roast, 80)
            ));
        }
    }

    prompt
}

fn describe_feature(feature: &AiFeature, variant: PromptVariant) -> String {
    let intensity = match variant {
        PromptVariant::Standard if feature.exaggeration >= 2.5 => "hugely exaggerated",
        PromptVariant::Standard if feature.exaggeration >= 1.5 => "exaggerated",
        PromptVariant::Standard => "subtle",
        _ => "playful",
    };
    format!("{intensity} {} ({})", feature.name, feature.value)
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
