use std::time::Duration;

use roastme_core::generation::DEFAULT_MAX_ATTEMPTS;

/// Default age after which an active generation is considered abandoned.
pub const DEFAULT_STALE_MINUTES: i64 = 15;

/// How often the stale-generation sweeper runs.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Generation pipeline configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Attempts allowed per run (initial run or user retry).
    pub max_attempts: u32,
    /// Active generations untouched for this long are failed by the sweeper.
    pub stale_after: chrono::Duration,
    pub sweep_interval: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            stale_after: chrono::Duration::minutes(DEFAULT_STALE_MINUTES),
            sweep_interval: SWEEP_INTERVAL,
        }
    }
}

impl GenerationConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                    | Default |
    /// |----------------------------|---------|
    /// | `GENERATION_MAX_ATTEMPTS`  | `5`     |
    /// | `STALE_GENERATION_MINUTES` | `15`    |
    pub fn from_env() -> Self {
        let max_attempts: u32 = std::env::var("GENERATION_MAX_ATTEMPTS")
            .unwrap_or_else(|_| DEFAULT_MAX_ATTEMPTS.to_string())
            .parse()
            .expect("GENERATION_MAX_ATTEMPTS must be a valid u32");
        assert!(max_attempts >= 1, "GENERATION_MAX_ATTEMPTS must be at least 1");

        let stale_minutes: i64 = std::env::var("STALE_GENERATION_MINUTES")
            .unwrap_or_else(|_| DEFAULT_STALE_MINUTES.to_string())
            .parse()
            .expect("STALE_GENERATION_MINUTES must be a valid i64");

        Self {
            max_attempts,
            stale_after: chrono::Duration::minutes(stale_minutes),
            sweep_interval: SWEEP_INTERVAL,
        }
    }
}
