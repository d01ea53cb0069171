//! Concurrency limits shared by the resolution and download phases.

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default worker count for both phases.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// True when `value` is within `MIN_CONCURRENCY..=MAX_CONCURRENCY`.
#[must_use]
pub fn is_valid_concurrency(value: usize) -> bool {
    (MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concurrency_bounds() {
        assert!(!is_valid_concurrency(0));
        assert!(is_valid_concurrency(1));
        assert!(is_valid_concurrency(DEFAULT_CONCURRENCY));
        assert!(is_valid_concurrency(100));
        assert!(!is_valid_concurrency(101));
    }
}
