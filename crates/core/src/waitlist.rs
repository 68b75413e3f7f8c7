//! Waitlist signup validation.

use validator::ValidateEmail;

use crate::error::CoreError;

/// Longest accepted `source` tag.
pub const MAX_SOURCE_LEN: usize = 64;

/// Trim and lowercase an email, rejecting anything that is not an address.
pub fn normalize_email(raw: &str) -> Result<String, CoreError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        return Err(CoreError::Validation("email must not be empty".into()));
    }
    if !email.validate_email() {
        return Err(CoreError::Validation(format!(
            "'{}' is not a valid email address",
            raw.trim()
        )));
    }
    Ok(email)
}

/// Normalise the optional signup source tag (e.g. `"landing"`, `"gallery"`).
pub fn normalize_source(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.chars().take(MAX_SOURCE_LEN).collect())
}
