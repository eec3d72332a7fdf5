//! Assertion utilities for testing.
//!
//! This module provides helper functions for making assertions in tests,
//! particularly for floating-point comparisons.

use graticule::Envelope;

/// Default epsilon for floating-point comparisons
pub const DEFAULT_EPSILON: f64 = 1e-9;

/// Assert that two floating-point values are approximately equal.
///
/// # Arguments
///
/// * `actual` - The actual value
/// * `expected` - The expected value
/// * `epsilon` - The maximum allowed difference (default: 1e-9)
///
/// # Panics
///
/// Panics if the absolute difference between `actual` and `expected` is greater than `epsilon`.
pub fn assert_approx_eq(actual: f64, expected: f64, epsilon: Option<f64>) {
    let epsilon = epsilon.unwrap_or(DEFAULT_EPSILON);
    let diff = (actual - expected).abs();

    assert!(
        diff <= epsilon,
        "Values not approximately equal: actual = {}, expected = {}, diff = {}, epsilon = {}",
        actual,
        expected,
        diff,
        epsilon
    );
}

/// Assert that an envelope matches the expected per-dimension bounds.
///
/// # Arguments
///
/// * `actual` - The envelope under test
/// * `lower` - Expected lower bounds
/// * `upper` - Expected upper bounds
///
/// # Panics
///
/// Panics if the dimension counts differ or any bound is off by more than
/// the default epsilon.
pub fn assert_envelope_eq(actual: &Envelope, lower: &[f64], upper: &[f64]) {
    assert_eq!(
        actual.dimension(),
        lower.len(),
        "Envelope dimension mismatch: actual = {}, expected = {}",
        actual.dimension(),
        lower.len()
    );
    for d in 0..lower.len() {
        assert_approx_eq(actual.lower(d), lower[d], None);
        assert_approx_eq(actual.upper(d), upper[d], None);
    }
}
