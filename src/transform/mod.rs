//! Coordinate transforms as composable units.
//!
//! This module provides the [`MathTransform`] trait and its concrete
//! implementations: affine matrices, interpolated sample-table axes, and
//! per-axis-block compounds. Transforms expose dimension restriction
//! ([`MathTransform::separate`]) that fails explicitly when a transform
//! cannot be decomposed along the requested dimensions.

pub mod compound;
pub mod factory;
pub mod interpolated;
pub mod linear;

use std::fmt;
use std::sync::Arc;

use crate::error::{GridError, Result};

pub use compound::{CompoundTransform, ConcatenatedTransform};
pub use factory::{CoordinateOperation, DefaultTransformFactory, TransformFactory};
pub use interpolated::InterpolatedTransform;
pub use linear::LinearTransform;

/// A function mapping coordinate tuples between two spaces.
pub trait MathTransform: fmt::Debug + Send + Sync {
    /// Number of input ordinates.
    fn source_dimensions(&self) -> usize;

    /// Number of output ordinates.
    fn target_dimensions(&self) -> usize;

    /// Transform one coordinate tuple.
    fn transform(&self, coordinates: &[f64]) -> Result<Vec<f64>>;

    /// The inverse transform, if it exists.
    fn inverse(&self) -> Result<Arc<dyn MathTransform>>;

    /// Restrict this transform to the given source dimensions (sorted,
    /// unique). Fails with [`GridError::NotSeparable`] when the transform
    /// cannot be decomposed along those dimensions.
    fn separate(&self, keep: &[usize]) -> Result<Arc<dyn MathTransform>>;

    /// The equivalent affine transform, if this transform is linear.
    fn to_linear(&self) -> Option<LinearTransform> {
        None
    }

    /// True if this transform maps every coordinate to itself.
    fn is_identity(&self) -> bool {
        false
    }
}

/// Concatenate two transforms: `first` is applied before `second`.
///
/// Linear pairs collapse to a single matrix.
pub fn concatenate(
    first: Arc<dyn MathTransform>,
    second: Arc<dyn MathTransform>,
) -> Result<Arc<dyn MathTransform>> {
    if first.target_dimensions() != second.source_dimensions() {
        return Err(GridError::MismatchedDimension {
            expected: first.target_dimensions(),
            actual: second.source_dimensions(),
        });
    }
    if first.is_identity() {
        return Ok(second);
    }
    if second.is_identity() {
        return Ok(first);
    }
    if let (Some(a), Some(b)) = (first.to_linear(), second.to_linear()) {
        return Ok(Arc::new(b.concat(&a)?));
    }
    Ok(Arc::new(ConcatenatedTransform::new(first, second)))
}

/// Restrict a transform to a subset of its source dimensions.
///
/// This is the sub-transform isolation service used when a grid-to-CRS
/// transform is non-linear: the caller keeps only the dimensions it has
/// constraints for. Fails with [`GridError::NotSeparable`] when no
/// decomposition exists.
pub fn separate(
    transform: &Arc<dyn MathTransform>,
    keep: &[usize],
) -> Result<Arc<dyn MathTransform>> {
    let last = match keep.last() {
        Some(&last) => last,
        None => return Err(GridError::invalid("at least one dimension must be kept")),
    };
    for pair in keep.windows(2) {
        if pair[0] >= pair[1] {
            return Err(GridError::invalid(
                "dimensions to keep must be sorted and unique",
            ));
        }
    }
    if last >= transform.source_dimensions() {
        return Err(GridError::invalid(format!(
            "dimension {} out of range for a transform with {} source dimensions",
            last,
            transform.source_dimensions()
        )));
    }
    if keep.len() == transform.source_dimensions() {
        return Ok(Arc::clone(transform));
    }
    transform.separate(keep)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concatenate_collapses_linear_pair() {
        let a: Arc<dyn MathTransform> =
            Arc::new(LinearTransform::scale_translate(&[2.0, 2.0], &[0.0, 0.0]));
        let b: Arc<dyn MathTransform> =
            Arc::new(LinearTransform::scale_translate(&[1.0, 1.0], &[5.0, -5.0]));
        let c = concatenate(a, b).unwrap();
        let linear = c.to_linear().expect("linear pair should collapse");
        let out = linear.transform(&[1.0, 2.0]).unwrap();
        assert_eq!(out, vec![7.0, -1.0]);
    }

    #[test]
    fn test_concatenate_skips_identity() {
        let id: Arc<dyn MathTransform> = Arc::new(LinearTransform::identity(2));
        let t: Arc<dyn MathTransform> =
            Arc::new(LinearTransform::scale_translate(&[3.0, 3.0], &[1.0, 1.0]));
        let c = concatenate(id, Arc::clone(&t)).unwrap();
        assert!(Arc::ptr_eq(&c, &t));
    }

    #[test]
    fn test_separate_validates_arguments() {
        let t: Arc<dyn MathTransform> = Arc::new(LinearTransform::identity(3));
        assert!(separate(&t, &[]).is_err());
        assert!(separate(&t, &[1, 0]).is_err());
        assert!(separate(&t, &[3]).is_err());
        // keeping everything returns the same object
        let same = separate(&t, &[0, 1, 2]).unwrap();
        assert!(Arc::ptr_eq(&same, &t));
    }
}
