//! Iteration caps for template resolution
//!
//! Placeholder substitution and variable fixed-point passes are bounded so
//! that cyclic or malformed templates terminate with a best-effort value.

/// Bounds applied to every resolution loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveLimits {
    /// Whole-string rescans performed by the resolver
    pub max_resolve_depth: usize,

    /// Fixed-point passes over the variable environment (run twice per template)
    pub fixed_point_passes: usize,

    /// Number of indexed `ratingN` variables eligible for shorthand expansion
    pub shorthand_ratings: usize,

    /// Longest string (in bytes) a substitution may grow a value to
    pub max_resolved_len: usize,
}

impl Default for ResolveLimits {
    fn default() -> Self {
        Self {
            max_resolve_depth: 10,
            fixed_point_passes: 5,
            shorthand_ratings: 3,
            max_resolved_len: 64 * 1024,
        }
    }
}

impl ResolveLimits {
    /// Tight bounds, useful to exercise cap behaviour in tests
    pub fn strict() -> Self {
        Self {
            max_resolve_depth: 2,
            fixed_point_passes: 1,
            shorthand_ratings: 1,
            max_resolved_len: 1024,
        }
    }

    /// Generous bounds for deeply chained template libraries
    pub fn relaxed() -> Self {
        Self {
            max_resolve_depth: 50,
            fixed_point_passes: 20,
            shorthand_ratings: 9,
            max_resolved_len: 1024 * 1024,
        }
    }
}
