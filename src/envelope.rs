//! Floating-point envelopes and direct positions.
//!
//! An [`Envelope`] is an n-dimensional box of f64 ranges optionally bound to
//! a CRS. On a wraparound axis (e.g. longitude) a range with `min > max`
//! means the box crosses the period boundary. `NaN` bounds denote an
//! unconstrained dimension.

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{GridError, Result};

/// An n-dimensional floating-point bounding box.
///
/// Individual setters mutate in place; component boundaries are expected to
/// pass clones around, so sharing is logically copy-on-write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    lower: Vec<f64>,
    upper: Vec<f64>,
    crs: Option<Crs>,
}

impl Envelope {
    /// Create an envelope from per-dimension bounds.
    ///
    /// An inverted range (`lower > upper`) is accepted only on an axis whose
    /// CRS declares a wraparound period; it means the range crosses the
    /// period boundary.
    pub fn new(lower: &[f64], upper: &[f64], crs: Option<Crs>) -> Result<Self> {
        if lower.len() != upper.len() {
            return Err(GridError::MismatchedDimension {
                expected: lower.len(),
                actual: upper.len(),
            });
        }
        if lower.is_empty() {
            return Err(GridError::invalid("envelope must have at least one dimension"));
        }
        if let Some(crs) = &crs {
            if crs.dimension() != lower.len() {
                return Err(GridError::MismatchedDimension {
                    expected: crs.dimension(),
                    actual: lower.len(),
                });
            }
        }
        let envelope = Self {
            lower: lower.to_vec(),
            upper: upper.to_vec(),
            crs,
        };
        for d in 0..envelope.dimension() {
            let (lo, hi) = (envelope.lower[d], envelope.upper[d]);
            if lo > hi && envelope.period(d).is_none() {
                return Err(GridError::invalid(format!(
                    "invalid range [{}, {}] in non-periodic dimension {}",
                    lo, hi, d
                )));
            }
        }
        Ok(envelope)
    }

    /// A 2D envelope without CRS.
    pub fn new_2d(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        Self::new(&[min_x, min_y], &[max_x, max_y], None)
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    /// Lower bound of the given dimension.
    pub fn lower(&self, dim: usize) -> f64 {
        self.lower[dim]
    }

    /// Upper bound of the given dimension.
    pub fn upper(&self, dim: usize) -> f64 {
        self.upper[dim]
    }

    /// The CRS this envelope is bound to, if any.
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// Bind this envelope to a CRS (or unbind with `None`).
    pub fn set_crs(&mut self, crs: Option<Crs>) {
        self.crs = crs;
    }

    /// Replace the range of one dimension in place.
    pub fn set_range(&mut self, dim: usize, lower: f64, upper: f64) {
        self.lower[dim] = lower;
        self.upper[dim] = upper;
    }

    /// Wraparound period of the given axis, if the CRS declares one.
    pub fn period(&self, dim: usize) -> Option<f64> {
        self.crs.as_ref().and_then(|crs| crs.period(dim))
    }

    /// True if the range of the given dimension crosses the period boundary.
    pub fn is_wrapped(&self, dim: usize) -> bool {
        self.lower[dim] > self.upper[dim] && self.period(dim).is_some()
    }

    /// Length of the range in the given dimension.
    ///
    /// For a wrapped range the period is added, so the span is the real
    /// coverage. `NaN` if either bound is unconstrained.
    pub fn span(&self, dim: usize) -> f64 {
        let raw = self.upper[dim] - self.lower[dim];
        if self.is_wrapped(dim) {
            raw + self.period(dim).unwrap_or(0.0)
        } else {
            raw
        }
    }

    /// Middle coordinate of the range in the given dimension.
    pub fn median(&self, dim: usize) -> f64 {
        self.lower[dim] + self.span(dim) / 2.0
    }

    /// Componentwise intersection with another envelope of the same
    /// dimension count.
    ///
    /// Wraparound must have been resolved beforehand (see the
    /// [`wraparound`](crate::wraparound) module): ranges are compared as
    /// plain intervals. An unconstrained (`NaN`) bound takes the other
    /// envelope's bound. Any empty dimension fails with
    /// [`GridError::DisjointExtent`].
    pub fn intersect(&self, other: &Envelope) -> Result<Envelope> {
        if other.dimension() != self.dimension() {
            return Err(GridError::MismatchedDimension {
                expected: self.dimension(),
                actual: other.dimension(),
            });
        }
        let mut lower = Vec::with_capacity(self.dimension());
        let mut upper = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            let lo = max_ignoring_nan(self.lower[d], other.lower[d]);
            let hi = min_ignoring_nan(self.upper[d], other.upper[d]);
            if lo > hi {
                return Err(GridError::DisjointExtent {
                    dimension: d,
                    message: format!(
                        "[{}, {}] does not intersect [{}, {}]",
                        self.lower[d], self.upper[d], other.lower[d], other.upper[d]
                    ),
                });
            }
            lower.push(lo);
            upper.push(hi);
        }
        Ok(Envelope {
            lower,
            upper,
            crs: self.crs.clone(),
        })
    }

    /// True if `other` lies inside this envelope within the tolerance,
    /// dimension by dimension. Unconstrained bounds contain everything.
    pub fn contains(&self, other: &Envelope, tolerance: f64) -> bool {
        if other.dimension() != self.dimension() {
            return false;
        }
        (0..self.dimension()).all(|d| {
            let lo_ok = self.lower[d].is_nan()
                || other.lower[d].is_nan()
                || other.lower[d] >= self.lower[d] - tolerance;
            let hi_ok = self.upper[d].is_nan()
                || other.upper[d].is_nan()
                || other.upper[d] <= self.upper[d] + tolerance;
            lo_ok && hi_ok
        })
    }
}

fn max_ignoring_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        b
    } else if b.is_nan() {
        a
    } else {
        a.max(b)
    }
}

fn min_ignoring_nan(a: f64, b: f64) -> f64 {
    if a.is_nan() {
        b
    } else if b.is_nan() {
        a
    } else {
        a.min(b)
    }
}

/// A single coordinate tuple, optionally bound to a CRS.
///
/// `NaN` ordinates mean "this dimension is not addressed", which slicing
/// uses to leave grid dimensions unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectPosition {
    coordinates: Vec<f64>,
    crs: Option<Crs>,
}

impl DirectPosition {
    /// Create a position from its ordinates.
    pub fn new(coordinates: &[f64], crs: Option<Crs>) -> Result<Self> {
        if coordinates.is_empty() {
            return Err(GridError::invalid("position must have at least one ordinate"));
        }
        if let Some(crs) = &crs {
            if crs.dimension() != coordinates.len() {
                return Err(GridError::MismatchedDimension {
                    expected: crs.dimension(),
                    actual: coordinates.len(),
                });
            }
        }
        Ok(Self {
            coordinates: coordinates.to_vec(),
            crs,
        })
    }

    /// Number of ordinates.
    pub fn dimension(&self) -> usize {
        self.coordinates.len()
    }

    /// Ordinate in the given dimension.
    pub fn coordinate(&self, dim: usize) -> f64 {
        self.coordinates[dim]
    }

    /// All ordinates.
    pub fn coordinates(&self) -> &[f64] {
        &self.coordinates
    }

    /// The CRS this position is expressed in, if any.
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }
}
