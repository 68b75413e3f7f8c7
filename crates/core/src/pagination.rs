//! Limit/offset clamping for paginated listings.

/// Default page size for the public gallery.
pub const DEFAULT_GALLERY_LIMIT: i64 = 24;

/// Largest page size a client may request.
pub const MAX_GALLERY_LIMIT: i64 = 48;

/// Clamp a user-provided limit to `1..=max`, using `default` when absent.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(clamp_limit(None, 24, 48), 24);
        assert_eq!(clamp_limit(Some(0), 24, 48), 1);
        assert_eq!(clamp_limit(Some(500), 24, 48), 48);
    }

    #[test]
    fn negative_offset_becomes_zero() {
        assert_eq!(clamp_offset(Some(-3)), 0);
        assert_eq!(clamp_offset(Some(10)), 10);
        assert_eq!(clamp_offset(None), 0);
    }
}
