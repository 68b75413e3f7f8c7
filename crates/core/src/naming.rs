//! Slug and object-storage key conventions.
//!
//! Slugs look like `action-figure-wet-owl-energy-k3x9q2`: the style, the
//! first few words of a hint (usually the roast), and a random suffix that
//! keeps them unique without a lookup.

use std::sync::LazyLock;

use rand::Rng;
use regex::Regex;

use crate::types::DbId;

/// Length of the random slug suffix.
pub const SLUG_SUFFIX_LEN: usize = 6;

/// Maximum number of hint words kept in a slug.
pub const SLUG_MAX_WORDS: usize = 5;

static NON_SLUG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[^a-z0-9]+").expect("static regex is valid"));

/// Lowercase, ASCII-only, dash-separated form of `text`.
pub fn slugify(text: &str) -> String {
    let lower = text.to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lower, "-")
        .trim_matches('-')
        .to_string()
}

/// Build a character slug from the style and an optional hint.
///
/// # Examples
///
/// ```
/// use roastme_core::naming::character_slug_with_suffix;
///
/// assert_eq!(
///     character_slug_with_suffix("action_figure", Some("Wet owl energy!"), "ab12cd"),
///     "action-figure-wet-owl-energy-ab12cd"
/// );
/// ```
pub fn character_slug_with_suffix(style: &str, hint: Option<&str>, suffix: &str) -> String {
    let mut parts = vec![slugify(style)];
    if let Some(hint) = hint {
        let words: Vec<String> = slugify(hint)
            .split('-')
            .filter(|w| !w.is_empty())
            .take(SLUG_MAX_WORDS)
            .map(str::to_string)
            .collect();
        if !words.is_empty() {
            parts.push(words.join("-"));
        }
    }
    parts.push(suffix.to_lowercase());
    parts.retain(|p| !p.is_empty());
    parts.join("-")
}

/// Build a character slug with a fresh random suffix.
pub fn character_slug(style: &str, hint: Option<&str>) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(SLUG_SUFFIX_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    character_slug_with_suffix(style, hint, &suffix)
}

/// File extension for a stored image MIME type.
pub fn extension_for_mime(mime: &str) -> &'static str {
    match mime {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}

/// Storage key for an uploaded source photo.
pub fn upload_key(user_id: DbId, upload_token: &uuid::Uuid, mime: &str) -> String {
    format!(
        "uploads/{user_id}/{upload_token}.{}",
        extension_for_mime(mime)
    )
}

/// Storage key for a generated rendition.
///
/// The attempt number is part of the key so a retried character never serves
/// a cached image from an earlier attempt.
pub fn rendition_key(character_id: DbId, attempt: u32, rendition: &str, ext: &str) -> String {
    format!("characters/{character_id}/attempt-{attempt}/{rendition}.{ext}")
}

/// Storage key for a character's composed OG image.
pub fn og_image_key(character_id: DbId) -> String {
    format!("characters/{character_id}/og.png")
}
