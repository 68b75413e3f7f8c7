//! Retry policy for the AI generation loop.
//!
//! Provider errors arrive as free-form strings (HTTP status plus response
//! body), so classification is a case-insensitive substring match. Each class
//! has its own base delay and cap; the delay doubles per attempt.

use std::time::Duration;

use serde::Serialize;

use crate::generation::DEFAULT_MAX_ATTEMPTS;

/// Broad category of a failed provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimit,
    Timeout,
    ServerError,
    ContentPolicy,
    Fatal,
    Unknown,
}

/// Checked in order; the first class with a matching needle wins.
///
/// Content-policy rejections come back as `invalid_request_error` bodies, so
/// they are matched before the fatal needles.
const PATTERNS: &[(ErrorClass, &[&str])] = &[
    (
        ErrorClass::ContentPolicy,
        &[
            "content policy",
            "content_policy",
            "safety",
            "moderation",
        ],
    ),
    (
        ErrorClass::Fatal,
        &[
            "(401)",
            "(403)",
            "invalid api key",
            "incorrect api key",
            "invalid_api_key",
            "invalid_request_error",
            "unsupported image",
        ],
    ),
    (
        ErrorClass::RateLimit,
        &[
            "rate limit",
            "rate_limit",
            "429",
            "too many requests",
            "quota",
        ],
    ),
    (
        ErrorClass::Timeout,
        &["timeout", "timed out", "deadline", "etimedout"],
    ),
    (
        ErrorClass::ServerError,
        &[
            "500",
            "502",
            "503",
            "504",
            "internal server error",
            "bad gateway",
            "service unavailable",
            "overloaded",
        ],
    ),
];

impl ErrorClass {
    /// Classify an error message.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        PATTERNS
            .iter()
            .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
            .map(|(class, _)| *class)
            .unwrap_or(ErrorClass::Unknown)
    }

    /// Whether another attempt can succeed.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorClass::Fatal)
    }

    /// `(base, cap)` delay for this class.
    fn delays(self) -> (Duration, Duration) {
        match self {
            ErrorClass::RateLimit => (Duration::from_secs(5), Duration::from_secs(30)),
            ErrorClass::Timeout => (Duration::from_secs(2), Duration::from_secs(10)),
            ErrorClass::ServerError => (Duration::from_secs(2), Duration::from_secs(15)),
            ErrorClass::ContentPolicy | ErrorClass::Unknown => {
                (Duration::from_secs(1), Duration::from_secs(5))
            }
            ErrorClass::Fatal => (Duration::ZERO, Duration::ZERO),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::RateLimit => "rate_limit",
            ErrorClass::Timeout => "timeout",
            ErrorClass::ServerError => "server_error",
            ErrorClass::ContentPolicy => "content_policy",
            ErrorClass::Fatal => "fatal",
            ErrorClass::Unknown => "unknown",
        }
    }
}

/// Backoff delay before the attempt following `attempt` (1-based) failed
/// with `class`: `min(base * 2^(attempt-1), cap)`.
pub fn backoff_delay(class: ErrorClass, attempt: u32) -> Duration {
    let (base, cap) = class.delays();
    let exponent = attempt.max(1).saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exponent).min(cap)
}

/// Per-run retry limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed within one run (initial or user-triggered retry).
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// What the runner should do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the given delay, then try again.
    RetryAfter(Duration),
    /// Stop and record the failure.
    GiveUp,
}

impl RetryPolicy {
    /// Decide after the `run_attempt`-th attempt of this run failed.
    pub fn decide(&self, message: &str, run_attempt: u32) -> RetryDecision {
        let class = ErrorClass::classify(message);
        if !class.is_retryable() || run_attempt >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::RetryAfter(backoff_delay(class, run_attempt))
        }
    }
}
