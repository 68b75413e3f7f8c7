//! Shared query parameter types for API handlers.

use roastme_core::pagination::{clamp_limit, clamp_offset, DEFAULT_GALLERY_LIMIT, MAX_GALLERY_LIMIT};
use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PaginationParams {
    /// `(limit, offset)` clamped to `1..=48` (default 24) and `>= 0`.
    pub fn clamped(&self) -> (i64, i64) {
        (
            clamp_limit(self.limit, DEFAULT_GALLERY_LIMIT, MAX_GALLERY_LIMIT),
            clamp_offset(self.offset),
        )
    }
}
