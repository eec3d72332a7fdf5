//! Common test utilities for graticule.
//!
//! This module provides shared utilities for testing grid derivations.

// Re-export all common test utilities
pub mod assertions;
pub mod grids;
