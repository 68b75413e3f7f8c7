//! User-facing descriptions of failures.
//!
//! A static lookup table turns raw error messages (and optional HTTP status
//! codes) into something the UI can show in a toast: a title, a friendly
//! message, whether retrying makes sense, and how long to wait first.

use serde::Serialize;

/// Display-ready description of a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserFacingError {
    pub code: &'static str,
    pub title: &'static str,
    pub message: &'static str,
    pub recoverable: bool,
    /// Suggested wait before retrying, when recoverable.
    pub retry_after_secs: Option<u32>,
}

struct Rule {
    needles: &'static [&'static str],
    statuses: &'static [u16],
    error: UserFacingError,
}

const RULES: &[Rule] = &[
    Rule {
        needles: &["insufficient credits", "no credits", "payment required"],
        statuses: &[402],
        error: UserFacingError {
            code: "OUT_OF_CREDITS",
            title: "Out of credits",
            message: "You've used all your credits. Grab a credit pack to roast again.",
            recoverable: false,
            retry_after_secs: None,
        },
    },
    Rule {
        needles: &["rate limit", "rate_limit", "too many requests", "quota"],
        statuses: &[429],
        error: UserFacingError {
            code: "RATE_LIMITED",
            title: "The roast oven is packed",
            message: "Lots of people are getting roasted right now. Try again in a minute.",
            recoverable: true,
            retry_after_secs: Some(60),
        },
    },
    Rule {
        needles: &["content policy", "content_policy", "safety", "moderation"],
        statuses: &[],
        error: UserFacingError {
            code: "CONTENT_REJECTED",
            title: "That one was too spicy",
            message: "The image service refused this photo. Try a different, well-lit selfie.",
            recoverable: true,
            retry_after_secs: Some(0),
        },
    },
    Rule {
        needles: &["timeout", "timed out", "deadline"],
        statuses: &[408, 504],
        error: UserFacingError {
            code: "TIMEOUT",
            title: "That took too long",
            message: "The image service didn't answer in time. Give it another go.",
            recoverable: true,
            retry_after_secs: Some(10),
        },
    },
    Rule {
        needles: &[
            "unsupported image",
            "unsupported file",
            "invalid image",
            "image too small",
            "file too large",
        ],
        statuses: &[413, 415],
        error: UserFacingError {
            code: "BAD_IMAGE",
            title: "We couldn't use that photo",
            message: "Upload a JPEG, PNG or WebP photo under 10 MB showing one face.",
            recoverable: false,
            retry_after_secs: None,
        },
    },
    Rule {
        needles: &[
            "internal server error",
            "bad gateway",
            "service unavailable",
            "overloaded",
        ],
        statuses: &[500, 502, 503],
        error: UserFacingError {
            code: "PROVIDER_DOWN",
            title: "The image service is having a moment",
            message: "Something broke on the AI side. Please retry shortly.",
            recoverable: true,
            retry_after_secs: Some(30),
        },
    },
];

const FALLBACK: UserFacingError = UserFacingError {
    code: "UNKNOWN",
    title: "Something went wrong",
    message: "We couldn't finish your character. Please try again.",
    recoverable: true,
    retry_after_secs: Some(5),
};

/// Look up the user-facing description for a raw error.
///
/// A matching HTTP status wins over message matching.
pub fn describe_error(message: &str, status: Option<u16>) -> UserFacingError {
    if let Some(status) = status {
        if let Some(rule) = RULES.iter().find(|r| r.statuses.contains(&status)) {
            return rule.error.clone();
        }
    }
    let lower = message.to_lowercase();
    RULES
        .iter()
        .find(|r| r.needles.iter().any(|n| lower.contains(n)))
        .map(|r| r.error.clone())
        .unwrap_or(FALLBACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_takes_priority() {
        let e = describe_error("timeout while waiting", Some(429));
        assert_eq!(e.code, "RATE_LIMITED");
    }

    #[test]
    fn message_matching_is_case_insensitive() {
        let e = describe_error("Request TIMED OUT after 180s", None);
        assert_eq!(e.code, "TIMEOUT");
        assert!(e.recoverable);
    }

    #[test]
    fn credit_errors_are_not_recoverable() {
        let e = describe_error("Payment required: insufficient credits", None);
        assert_eq!(e.code, "OUT_OF_CREDITS");
        assert!(!e.recoverable);
        assert_eq!(e.retry_after_secs, None);
    }

    #[test]
    fn unknown_errors_fall_back() {
        assert_eq!(describe_error("???", None), FALLBACK);
        assert_eq!(describe_error("???", Some(418)), FALLBACK);
    }
}
