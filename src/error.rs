//! Error types for grid-geometry derivation.
//!
//! This module defines a comprehensive error enum that covers all failure
//! modes of the derivation engine. Errors are raised synchronously from the
//! call that triggered them; the computation is deterministic, so nothing is
//! retried and no partial result is ever returned on failure.

use thiserror::Error;

/// The main error type for graticule operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// The region of interest does not intersect the grid domain.
    ///
    /// This is the recoverable case: a caller iterating over tiles can catch
    /// it and skip the tile.
    #[error("disjoint extent in dimension {dimension}: {message}")]
    DisjointExtent { dimension: usize, message: String },

    /// Malformed configuration or argument values.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// Two objects that must agree in dimension count do not.
    #[error("mismatched dimensions: expected {expected}, got {actual}")]
    MismatchedDimension { expected: usize, actual: usize },

    /// An operation was invoked in a lifecycle state that forbids it,
    /// e.g. configuring a derivation after it has been resolved.
    #[error("illegal state: {message}")]
    IllegalState { message: String },

    /// A coordinate could not be transformed.
    #[error("transform error: {message}")]
    Transform { message: String },

    /// No coordinate operation path exists between two reference systems.
    ///
    /// The CRS names use dedicated fields: thiserror reserves `source` for
    /// error chaining.
    #[error("no operation from '{source_crs}' to '{target_crs}': {message}")]
    Factory {
        source_crs: String,
        target_crs: String,
        message: String,
    },

    /// A transform could not be decomposed along the requested dimensions.
    #[error("transform is not separable: {message}")]
    NotSeparable { message: String },

    /// A grid geometry does not define the component required by the request.
    #[error("incomplete grid geometry: {message}")]
    IncompleteGeometry { message: String },
}

/// Convenience type alias for Results with GridError
pub type Result<T> = std::result::Result<T, GridError>;

impl GridError {
    /// Shorthand for an [`GridError::InvalidArgument`] with a formatted message.
    pub fn invalid(message: impl Into<String>) -> Self {
        GridError::InvalidArgument {
            message: message.into(),
        }
    }

    /// True if the error is the recoverable "no overlap" case.
    pub fn is_disjoint(&self) -> bool {
        matches!(self, GridError::DisjointExtent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disjoint_is_recoverable() {
        let err = GridError::DisjointExtent {
            dimension: 0,
            message: "no overlap".to_string(),
        };
        assert!(err.is_disjoint());
        assert!(!GridError::invalid("bad").is_disjoint());
    }

    #[test]
    fn test_error_display() {
        let err = GridError::MismatchedDimension {
            expected: 2,
            actual: 3,
        };
        assert_eq!(err.to_string(), "mismatched dimensions: expected 2, got 3");
    }

    #[test]
    fn test_factory_error_display() {
        let err = GridError::Factory {
            source_crs: "local A".to_string(),
            target_crs: "local B".to_string(),
            message: "no axis match".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no operation from 'local A' to 'local B': no axis match"
        );
    }
}
