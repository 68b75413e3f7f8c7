//! Character generation lifecycle.
//!
//! A character's progress through the two-step AI pipeline (feature analysis,
//! then image generation) is persisted as the `generation_params` JSON blob
//! on the `characters` row. This module owns the status enum, the allowed
//! transitions, and the bookkeeping (attempt counter, last error, history)
//! that travels with it.
//!
//! ```text
//! pending -> generating -> completed
//!                      \-> failed -> retrying -> completed
//!                                            \-> retry_failed
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::prompt::{CharacterStyle, PromptVariant};
use crate::types::Timestamp;

/// Maximum number of entries kept in [`GenerationParams::history`].
pub const MAX_HISTORY_ENTRIES: usize = 32;

/// Default number of generation attempts per run.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

// ---------------------------------------------------------------------------
// GenerationStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a character generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStatus {
    Pending,
    Generating,
    Retrying,
    Completed,
    Failed,
    RetryFailed,
}

impl GenerationStatus {
    pub const ALL: [GenerationStatus; 6] = [
        GenerationStatus::Pending,
        GenerationStatus::Generating,
        GenerationStatus::Retrying,
        GenerationStatus::Completed,
        GenerationStatus::Failed,
        GenerationStatus::RetryFailed,
    ];

    /// String form stored in `generation_params->>'status'`.
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStatus::Pending => "pending",
            GenerationStatus::Generating => "generating",
            GenerationStatus::Retrying => "retrying",
            GenerationStatus::Completed => "completed",
            GenerationStatus::Failed => "failed",
            GenerationStatus::RetryFailed => "retry_failed",
        }
    }

    /// `true` once no further automatic progress will happen.
    ///
    /// `failed` counts as terminal for the runner even though a user may
    /// still trigger a retry from it.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            GenerationStatus::Completed | GenerationStatus::Failed | GenerationStatus::RetryFailed
        )
    }

    /// `true` while a runner is (or should be) working on the character.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            GenerationStatus::Generating | GenerationStatus::Retrying
        )
    }

    /// Whether `self -> next` is an allowed transition.
    pub fn can_transition_to(self, next: GenerationStatus) -> bool {
        use GenerationStatus::*;
        matches!(
            (self, next),
            (Pending, Generating)
                | (Generating, Completed)
                | (Generating, Failed)
                | (Failed, Retrying)
                | (Retrying, Completed)
                | (Retrying, RetryFailed)
        )
    }

    /// The status a run ends in when it gives up, given the status it ran in.
    pub fn exhausted_status(self) -> Option<GenerationStatus> {
        match self {
            GenerationStatus::Generating => Some(GenerationStatus::Failed),
            GenerationStatus::Retrying => Some(GenerationStatus::RetryFailed),
            _ => None,
        }
    }
}

impl fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GenerationStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GenerationStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown generation status '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// GenerationParams
// ---------------------------------------------------------------------------

/// One recorded status change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub status: GenerationStatus,
    pub attempt: u32,
    pub at: Timestamp,
}

/// The `generation_params` JSON blob stored on every character row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub style: CharacterStyle,
    /// Roast line produced by the analysis step.
    #[serde(default)]
    pub roast: Option<String>,
    pub status: GenerationStatus,
    /// Total generation attempts over the character's lifetime.
    #[serde(default)]
    pub attempt: u32,
    /// Last error message recorded by the runner.
    #[serde(default)]
    pub error: Option<String>,
    /// Prompt variant used by the most recent attempt.
    #[serde(default)]
    pub prompt_variant: Option<PromptVariant>,
    /// Storage key of the full-size image from the completed attempt.
    #[serde(default)]
    pub model_key: Option<String>,
    #[serde(default)]
    pub history: Vec<StatusChange>,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub finished_at: Option<Timestamp>,
}

impl GenerationParams {
    /// Fresh parameters for a newly uploaded character.
    pub fn new(style: CharacterStyle, now: Timestamp) -> Self {
        Self {
            style,
            roast: None,
            status: GenerationStatus::Pending,
            attempt: 0,
            error: None,
            prompt_variant: None,
            model_key: None,
            history: vec![StatusChange {
                status: GenerationStatus::Pending,
                attempt: 0,
                at: now,
            }],
            started_at: None,
            finished_at: None,
        }
    }

    /// Move to `next`, recording the change in the history.
    ///
    /// Fails with [`CoreError::Conflict`] if the transition is not allowed.
    pub fn transition(&mut self, next: GenerationStatus, now: Timestamp) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "Cannot move generation from '{}' to '{}'",
                self.status, next
            )));
        }

        self.status = next;
        match next {
            GenerationStatus::Generating | GenerationStatus::Retrying => {
                self.started_at = Some(now);
                self.finished_at = None;
            }
            GenerationStatus::Completed => {
                self.error = None;
                self.finished_at = Some(now);
            }
            GenerationStatus::Failed | GenerationStatus::RetryFailed => {
                self.finished_at = Some(now);
            }
            GenerationStatus::Pending => {}
        }

        self.history.push(StatusChange {
            status: next,
            attempt: self.attempt,
            at: now,
        });
        if self.history.len() > MAX_HISTORY_ENTRIES {
            let excess = self.history.len() - MAX_HISTORY_ENTRIES;
            self.history.drain(..excess);
        }
        Ok(())
    }

    /// Start a new attempt: bump the counter and pick the prompt variant.
    ///
    /// Returns the new attempt number (1-based).
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt = self.attempt.saturating_add(1);
        self.prompt_variant = Some(PromptVariant::for_attempt(self.attempt));
        self.attempt
    }

    /// Record the error of the latest attempt without changing status.
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }
}

/// Check that a recorded history only follows allowed transitions and that
/// the attempt counter never decreases.
pub fn validate_history(history: &[StatusChange]) -> Result<(), CoreError> {
    for pair in history.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if !prev.status.can_transition_to(next.status) {
            return Err(CoreError::Validation(format!(
                "Illegal transition '{}' -> '{}'",
                prev.status, next.status
            )));
        }
        if next.attempt < prev.attempt {
            return Err(CoreError::Validation(format!(
                "Attempt counter decreased from {} to {}",
                prev.attempt, next.attempt
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn params() -> GenerationParams {
        GenerationParams::new(CharacterStyle::ActionFigure, Utc::now())
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in GenerationStatus::ALL {
            assert_eq!(status.as_str().parse::<GenerationStatus>().unwrap(), status);
        }
        assert!("stuck".parse::<GenerationStatus>().is_err());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&GenerationStatus::RetryFailed).unwrap();
        assert_eq!(json, "\"retry_failed\"");
    }

    #[test]
    fn allowed_transitions_follow_lifecycle() {
        use GenerationStatus::*;
        let allowed = [
            (Pending, Generating),
            (Generating, Completed),
            (Generating, Failed),
            (Failed, Retrying),
            (Retrying, Completed),
            (Retrying, RetryFailed),
        ];
        for from in GenerationStatus::ALL {
            for to in GenerationStatus::ALL {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn completed_never_goes_back() {
        for next in GenerationStatus::ALL {
            assert!(!GenerationStatus::Completed.can_transition_to(next));
        }
    }

    #[test]
    fn exhausted_status_depends_on_run_kind() {
        assert_eq!(
            GenerationStatus::Generating.exhausted_status(),
            Some(GenerationStatus::Failed)
        );
        assert_eq!(
            GenerationStatus::Retrying.exhausted_status(),
            Some(GenerationStatus::RetryFailed)
        );
        assert_eq!(GenerationStatus::Failed.exhausted_status(), None);
    }

    #[test]
    fn new_params_start_pending_with_history() {
        let p = params();
        assert_eq!(p.status, GenerationStatus::Pending);
        assert_eq!(p.attempt, 0);
        assert_eq!(p.history.len(), 1);
    }

    #[test]
    fn transition_rejects_skipping_states() {
        let mut p = params();
        let err = p.transition(GenerationStatus::Completed, Utc::now());
        assert_matches!(err, Err(CoreError::Conflict(_)));
        assert_eq!(p.status, GenerationStatus::Pending);
    }

    #[test]
    fn full_retry_path_is_recorded() {
        let mut p = params();
        let now = Utc::now();
        p.transition(GenerationStatus::Generating, now).unwrap();
        p.begin_attempt();
        p.record_error("boom");
        p.transition(GenerationStatus::Failed, now).unwrap();
        p.transition(GenerationStatus::Retrying, now).unwrap();
        p.begin_attempt();
        p.transition(GenerationStatus::Completed, now).unwrap();

        assert_eq!(p.attempt, 2);
        assert!(p.error.is_none(), "completion clears the last error");
        assert!(p.finished_at.is_some());
        validate_history(&p.history).unwrap();
        let statuses: Vec<_> = p.history.iter().map(|h| h.status).collect();
        assert_eq!(
            statuses,
            vec![
                GenerationStatus::Pending,
                GenerationStatus::Generating,
                GenerationStatus::Failed,
                GenerationStatus::Retrying,
                GenerationStatus::Completed,
            ]
        );
    }

    #[test]
    fn begin_attempt_escalates_prompt_variant() {
        let mut p = params();
        assert_eq!(p.begin_attempt(), 1);
        assert_eq!(p.prompt_variant, Some(PromptVariant::Standard));
        assert_eq!(p.begin_attempt(), 2);
        assert_eq!(p.prompt_variant, Some(PromptVariant::Softened));
    }

    #[test]
    fn history_is_capped() {
        let mut p = params();
        let now = Utc::now();
        p.transition(GenerationStatus::Generating, now).unwrap();
        p.transition(GenerationStatus::Failed, now).unwrap();
        for _ in 0..40 {
            p.history.push(StatusChange {
                status: GenerationStatus::Failed,
                attempt: p.attempt,
                at: now,
            });
        }
        p.transition(GenerationStatus::Retrying, now).unwrap();
        assert_eq!(p.history.len(), MAX_HISTORY_ENTRIES);
        assert_eq!(
            p.history.last().map(|h| h.status),
            Some(GenerationStatus::Retrying)
        );
    }

    #[test]
    fn validate_history_rejects_decreasing_attempts() {
        let now = Utc::now();
        let history = vec![
            StatusChange {
                status: GenerationStatus::Failed,
                attempt: 3,
                at: now,
            },
            StatusChange {
                status: GenerationStatus::Retrying,
                attempt: 2,
                at: now,
            },
        ];
        assert_matches!(validate_history(&history), Err(CoreError::Validation(_)));
    }

    #[test]
    fn params_deserialize_with_missing_optional_fields() {
        let json = serde_json::json!({ "style": "action_figure", "status": "generating" });
        let p: GenerationParams = serde_json::from_value(json).unwrap();
        assert_eq!(p.status, GenerationStatus::Generating);
        assert_eq!(p.attempt, 0);
        assert!(p.history.is_empty());
    }
}
