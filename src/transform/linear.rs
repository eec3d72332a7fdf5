//! Affine transforms backed by homogeneous matrices.

use std::sync::Arc;

use super::MathTransform;
use crate::error::{GridError, Result};

/// An affine transform stored as a homogeneous matrix.
///
/// The matrix has `target + 1` rows and `source + 1` columns in row-major
/// order; the last row is always `[0, ..., 0, 1]` and the last column holds
/// the translation terms. Matrices here are tiny (grids rarely exceed four
/// or five dimensions), so all the linear algebra is done locally.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearTransform {
    rows: usize,
    cols: usize,
    elements: Vec<f64>,
}

impl LinearTransform {
    /// The identity transform in `dimension` dimensions.
    pub fn identity(dimension: usize) -> Self {
        let mut t = Self::zeroed(dimension, dimension);
        for d in 0..=dimension {
            *t.element_mut(d, d) = 1.0;
        }
        t
    }

    /// A diagonal transform: `y_d = x_d * scale_d + offset_d`.
    pub fn scale_translate(scales: &[f64], offsets: &[f64]) -> Self {
        debug_assert_eq!(scales.len(), offsets.len());
        let n = scales.len();
        let mut t = Self::zeroed(n, n);
        for d in 0..n {
            *t.element_mut(d, d) = scales[d];
            *t.element_mut(d, n) = offsets[d];
        }
        *t.element_mut(n, n) = 1.0;
        t
    }

    /// A pure translation by the same amount in every dimension.
    pub fn uniform_translation(dimension: usize, offset: f64) -> Self {
        let scales = vec![1.0; dimension];
        let offsets = vec![offset; dimension];
        Self::scale_translate(&scales, &offsets)
    }

    /// Build a transform from an explicit homogeneous matrix in row-major
    /// order, `(target + 1) x (source + 1)` elements.
    pub fn from_matrix(target: usize, source: usize, elements: &[f64]) -> Result<Self> {
        let expected = (target + 1) * (source + 1);
        if elements.len() != expected {
            return Err(GridError::invalid(format!(
                "expected {} matrix elements, got {}",
                expected,
                elements.len()
            )));
        }
        let t = Self {
            rows: target,
            cols: source,
            elements: elements.to_vec(),
        };
        for c in 0..source {
            if t.element(target, c) != 0.0 {
                return Err(GridError::invalid("last matrix row must be [0, ..., 0, 1]"));
            }
        }
        if t.element(target, source) != 1.0 {
            return Err(GridError::invalid("last matrix row must be [0, ..., 0, 1]"));
        }
        Ok(t)
    }

    fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            elements: vec![0.0; (rows + 1) * (cols + 1)],
        }
    }

    /// Matrix element at (row, column), including the homogeneous border.
    pub fn element(&self, row: usize, col: usize) -> f64 {
        self.elements[row * (self.cols + 1) + col]
    }

    fn element_mut(&mut self, row: usize, col: usize) -> &mut f64 {
        &mut self.elements[row * (self.cols + 1) + col]
    }

    /// Apply this transform to one coordinate tuple.
    pub fn transform(&self, coordinates: &[f64]) -> Result<Vec<f64>> {
        if coordinates.len() != self.cols {
            return Err(GridError::MismatchedDimension {
                expected: self.cols,
                actual: coordinates.len(),
            });
        }
        let mut out = Vec::with_capacity(self.rows);
        for r in 0..self.rows {
            let mut v = self.element(r, self.cols);
            for (c, &x) in coordinates.iter().enumerate() {
                let m = self.element(r, c);
                if m != 0.0 {
                    // keeps NaN ordinates from polluting independent rows
                    v += m * x;
                }
            }
            out.push(v);
        }
        Ok(out)
    }

    /// Matrix product `self * other`, i.e. the transform applying `other`
    /// first and `self` second.
    pub fn concat(&self, other: &LinearTransform) -> Result<LinearTransform> {
        if other.rows != self.cols {
            return Err(GridError::MismatchedDimension {
                expected: self.cols,
                actual: other.rows,
            });
        }
        let mut out = Self::zeroed(self.rows, other.cols);
        for r in 0..=self.rows {
            for c in 0..=other.cols {
                let mut v = 0.0;
                for k in 0..=self.cols {
                    v += self.element(r, k) * other.element(k, c);
                }
                *out.element_mut(r, c) = v;
            }
        }
        Ok(out)
    }

    /// Invert this transform by Gauss-Jordan elimination with partial
    /// pivoting. Only square transforms are invertible.
    pub fn inverted(&self) -> Result<LinearTransform> {
        if self.rows != self.cols {
            return Err(GridError::Transform {
                message: format!(
                    "cannot invert a non-square transform ({} -> {})",
                    self.cols, self.rows
                ),
            });
        }
        let n = self.rows + 1;
        let mut work: Vec<f64> = self.elements.clone();
        let mut inverse = LinearTransform::identity(self.rows);
        for col in 0..n {
            // pivot selection
            let pivot_row = (col..n)
                .max_by(|&a, &b| {
                    work[a * n + col]
                        .abs()
                        .partial_cmp(&work[b * n + col].abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(col);
            let pivot = work[pivot_row * n + col];
            if pivot.abs() < 1e-12 {
                return Err(GridError::Transform {
                    message: "transform matrix is singular".to_string(),
                });
            }
            if pivot_row != col {
                for k in 0..n {
                    work.swap(pivot_row * n + k, col * n + k);
                    inverse.elements.swap(pivot_row * n + k, col * n + k);
                }
            }
            for k in 0..n {
                work[col * n + k] /= pivot;
                inverse.elements[col * n + k] /= pivot;
            }
            for r in 0..n {
                if r != col {
                    let factor = work[r * n + col];
                    if factor != 0.0 {
                        for k in 0..n {
                            work[r * n + k] -= factor * work[col * n + k];
                            inverse.elements[r * n + k] -= factor * inverse.elements[col * n + k];
                        }
                    }
                }
            }
        }
        Ok(inverse)
    }

    /// Restrict to the given source dimensions.
    ///
    /// A target row survives if all its non-zero coefficients lie on kept
    /// source dimensions; the restriction exists only if exactly `keep.len()`
    /// rows survive.
    pub fn select_dimensions(&self, keep: &[usize]) -> Result<LinearTransform> {
        let mut kept_rows = Vec::new();
        for r in 0..self.rows {
            let mut uses_kept = false;
            let mut uses_dropped = false;
            for c in 0..self.cols {
                if self.element(r, c) != 0.0 {
                    if keep.contains(&c) {
                        uses_kept = true;
                    } else {
                        uses_dropped = true;
                    }
                }
            }
            if uses_kept && uses_dropped {
                return Err(GridError::NotSeparable {
                    message: format!("target dimension {} mixes kept and dropped source dimensions", r),
                });
            }
            if uses_kept {
                kept_rows.push(r);
            }
        }
        if kept_rows.len() != keep.len() {
            return Err(GridError::NotSeparable {
                message: format!(
                    "{} source dimensions map to {} target dimensions",
                    keep.len(),
                    kept_rows.len()
                ),
            });
        }
        let mut out = Self::zeroed(kept_rows.len(), keep.len());
        for (ri, &r) in kept_rows.iter().enumerate() {
            for (ci, &c) in keep.iter().enumerate() {
                *out.element_mut(ri, ci) = self.element(r, c);
            }
            *out.element_mut(ri, keep.len()) = self.element(r, self.cols);
        }
        *out.element_mut(kept_rows.len(), keep.len()) = 1.0;
        Ok(out)
    }

    /// Magnitude of the scale in each target dimension (the norm of each
    /// matrix row without its translation term). This is the resolution of
    /// a grid-to-CRS transform.
    pub fn scales(&self) -> Vec<f64> {
        (0..self.rows)
            .map(|r| {
                (0..self.cols)
                    .map(|c| self.element(r, c).powi(2))
                    .sum::<f64>()
                    .sqrt()
            })
            .collect()
    }
}

impl MathTransform for LinearTransform {
    fn source_dimensions(&self) -> usize {
        self.cols
    }

    fn target_dimensions(&self) -> usize {
        self.rows
    }

    fn transform(&self, coordinates: &[f64]) -> Result<Vec<f64>> {
        LinearTransform::transform(self, coordinates)
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>> {
        Ok(Arc::new(self.inverted()?))
    }

    fn separate(&self, keep: &[usize]) -> Result<Arc<dyn MathTransform>> {
        Ok(Arc::new(self.select_dimensions(keep)?))
    }

    fn to_linear(&self) -> Option<LinearTransform> {
        Some(self.clone())
    }

    fn is_identity(&self) -> bool {
        self.rows == self.cols
            && (0..=self.rows).all(|r| {
                (0..=self.cols).all(|c| {
                    let expected = if r == c { 1.0 } else { 0.0 };
                    self.element(r, c) == expected
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_identity() {
        let id = LinearTransform::identity(3);
        assert!(MathTransform::is_identity(&id));
        let out = id.transform(&[1.0, -2.0, 3.5]).unwrap();
        assert_eq!(out, vec![1.0, -2.0, 3.5]);
    }

    #[test]
    fn test_scale_translate() {
        let t = LinearTransform::scale_translate(&[1.0, -1.0], &[80.0, 90.0]);
        let out = t.transform(&[5.0, 10.0]).unwrap();
        assert_eq!(out, vec![85.0, 80.0]);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = LinearTransform::scale_translate(&[2.0, 0.5], &[10.0, -3.0]);
        let inv = t.inverted().unwrap();
        let out = inv.transform(&t.transform(&[7.0, 9.0]).unwrap()).unwrap();
        assert!((out[0] - 7.0).abs() < 1e-12);
        assert!((out[1] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_with_rotation() {
        // 90 degree rotation plus translation
        let t = LinearTransform::from_matrix(
            2,
            2,
            &[
                0.0, -1.0, 4.0, //
                1.0, 0.0, -2.0, //
                0.0, 0.0, 1.0,
            ],
        )
        .unwrap();
        let inv = t.inverted().unwrap();
        let fwd = t.transform(&[3.0, 5.0]).unwrap();
        let back = inv.transform(&fwd).unwrap();
        assert!((back[0] - 3.0).abs() < 1e-12);
        assert!((back[1] - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_singular_matrix_fails() {
        let t = LinearTransform::scale_translate(&[1.0, 0.0], &[0.0, 0.0]);
        assert!(matches!(t.inverted(), Err(GridError::Transform { .. })));
    }

    #[test]
    fn test_concat() {
        let scale = LinearTransform::scale_translate(&[2.0, 3.0], &[0.0, 0.0]);
        let shift = LinearTransform::scale_translate(&[1.0, 1.0], &[1.0, -1.0]);
        // apply scale first, then shift
        let both = shift.concat(&scale).unwrap();
        let out = both.transform(&[1.0, 1.0]).unwrap();
        assert_eq!(out, vec![3.0, 2.0]);
    }

    #[test]
    fn test_select_dimensions_diagonal() {
        let t = LinearTransform::scale_translate(&[2.0, 3.0, 4.0], &[1.0, 2.0, 3.0]);
        let sub = t.select_dimensions(&[0, 2]).unwrap();
        assert_eq!(sub.source_dimensions(), 2);
        let out = sub.transform(&[1.0, 1.0]).unwrap();
        assert_eq!(out, vec![3.0, 7.0]);
    }

    #[test]
    fn test_select_dimensions_not_separable() {
        // x and y are coupled by rotation, so dropping y must fail
        let t = LinearTransform::from_matrix(
            2,
            2,
            &[
                0.7, -0.7, 0.0, //
                0.7, 0.7, 0.0, //
                0.0, 0.0, 1.0,
            ],
        )
        .unwrap();
        assert!(matches!(
            t.select_dimensions(&[0]),
            Err(GridError::NotSeparable { .. })
        ));
    }

    #[test]
    fn test_scales() {
        let t = LinearTransform::scale_translate(&[2.0, -0.5], &[100.0, 200.0]);
        let scales = t.scales();
        assert!((scales[0] - 2.0).abs() < 1e-12);
        assert!((scales[1] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_nan_passthrough_on_independent_rows() {
        let t = LinearTransform::scale_translate(&[2.0, 3.0], &[0.0, 0.0]);
        let out = t.transform(&[f64::NAN, 1.0]).unwrap();
        assert!(out[0].is_nan());
        assert_eq!(out[1], 3.0);
    }
}
