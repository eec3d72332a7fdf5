//! Integer index extents of raster grids.
//!
//! A [`GridExtent`] is an immutable n-dimensional box of cell indices with
//! inclusive `[low, high]` bounds per dimension. Every transformation
//! (intersection, subsampling, slicing) produces a new instance.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GridError, Result};

/// Semantic tag attached to each grid dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    /// Easting / column index
    Column,
    /// Northing / row index
    Row,
    /// Height or depth index
    Vertical,
    /// Temporal index
    Time,
    /// Any other dimension
    Other,
}

/// An immutable n-dimensional integer index box.
///
/// Bounds are inclusive on both sides: a dimension with `low == high` spans
/// exactly one cell. The invariant `low <= high` holds for every dimension of
/// a constructed extent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridExtent {
    types: Vec<DimensionType>,
    low: Vec<i64>,
    high: Vec<i64>,
}

/// Floor division, rounding toward negative infinity.
pub(crate) fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

/// Non-negative remainder matching [`floor_div`].
pub(crate) fn floor_mod(a: i64, b: i64) -> i64 {
    a - floor_div(a, b) * b
}

impl GridExtent {
    /// Create a new extent from per-dimension bounds.
    ///
    /// Fails with [`GridError::InvalidArgument`] if any dimension has
    /// `low > high`, and with [`GridError::MismatchedDimension`] if the
    /// slices disagree in length.
    pub fn new(types: &[DimensionType], low: &[i64], high: &[i64]) -> Result<Self> {
        if low.len() != high.len() || low.len() != types.len() {
            return Err(GridError::MismatchedDimension {
                expected: types.len(),
                actual: low.len().max(high.len()),
            });
        }
        if low.is_empty() {
            return Err(GridError::invalid("grid extent must have at least one dimension"));
        }
        for (d, (&lo, &hi)) in low.iter().zip(high.iter()).enumerate() {
            if lo > hi {
                return Err(GridError::invalid(format!(
                    "invalid range [{}, {}] in dimension {}",
                    lo, hi, d
                )));
            }
        }
        Ok(Self {
            types: types.to_vec(),
            low: low.to_vec(),
            high: high.to_vec(),
        })
    }

    /// Create a 2D extent with column/row dimension types.
    pub fn new_2d(low_x: i64, low_y: i64, high_x: i64, high_y: i64) -> Result<Self> {
        Self::new(
            &[DimensionType::Column, DimensionType::Row],
            &[low_x, low_y],
            &[high_x, high_y],
        )
    }

    /// Number of dimensions of this extent.
    pub fn dimension(&self) -> usize {
        self.low.len()
    }

    /// Inclusive lower bound in the given dimension.
    pub fn low(&self, dim: usize) -> i64 {
        self.low[dim]
    }

    /// Inclusive upper bound in the given dimension.
    pub fn high(&self, dim: usize) -> i64 {
        self.high[dim]
    }

    /// All lower bounds.
    pub fn lows(&self) -> &[i64] {
        &self.low
    }

    /// All upper bounds.
    pub fn highs(&self) -> &[i64] {
        &self.high
    }

    /// Number of cells along the given dimension.
    pub fn size(&self, dim: usize) -> u64 {
        (self.high[dim] - self.low[dim] + 1) as u64
    }

    /// Dimension type tag of the given dimension.
    pub fn axis_type(&self, dim: usize) -> DimensionType {
        self.types[dim]
    }

    /// All dimension type tags.
    pub fn axis_types(&self) -> &[DimensionType] {
        &self.types
    }

    /// True if the given cell index tuple lies inside this extent.
    pub fn contains(&self, indices: &[i64]) -> bool {
        indices.len() == self.dimension()
            && indices
                .iter()
                .enumerate()
                .all(|(d, &i)| i >= self.low[d] && i <= self.high[d])
    }

    /// Componentwise intersection with another extent.
    ///
    /// Fails with [`GridError::DisjointExtent`] as soon as any dimension
    /// becomes empty; no partial result is returned.
    pub fn intersect(&self, other: &GridExtent) -> Result<GridExtent> {
        if other.dimension() != self.dimension() {
            return Err(GridError::MismatchedDimension {
                expected: self.dimension(),
                actual: other.dimension(),
            });
        }
        let mut low = Vec::with_capacity(self.dimension());
        let mut high = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            let lo = self.low[d].max(other.low[d]);
            let hi = self.high[d].min(other.high[d]);
            if lo > hi {
                return Err(GridError::DisjointExtent {
                    dimension: d,
                    message: format!(
                        "[{}, {}] does not intersect [{}, {}]",
                        self.low[d], self.high[d], other.low[d], other.high[d]
                    ),
                });
            }
            low.push(lo);
            high.push(hi);
        }
        Ok(GridExtent {
            types: self.types.clone(),
            low,
            high,
        })
    }

    /// Remap this extent to a coarser grid.
    ///
    /// Each bound is divided (flooring) by the subsampling factor after
    /// removal of the alignment offset: a cell at original index `i` maps to
    /// coarse index `floor((i - offset) / factor)`. Factors must be >= 1 and
    /// offsets must satisfy `0 <= offset < factor`.
    pub fn subsample(&self, factors: &[u64], offsets: &[i64]) -> Result<GridExtent> {
        if factors.len() != self.dimension() || offsets.len() != self.dimension() {
            return Err(GridError::MismatchedDimension {
                expected: self.dimension(),
                actual: factors.len().min(offsets.len()),
            });
        }
        let mut low = Vec::with_capacity(self.dimension());
        let mut high = Vec::with_capacity(self.dimension());
        for d in 0..self.dimension() {
            let f = factors[d];
            if f == 0 {
                return Err(GridError::invalid(format!(
                    "subsampling factor must be >= 1 in dimension {}",
                    d
                )));
            }
            let off = offsets[d];
            if off < 0 || off as u64 >= f {
                return Err(GridError::invalid(format!(
                    "subsampling offset {} out of range [0, {}) in dimension {}",
                    off, f, d
                )));
            }
            let f = f as i64;
            low.push(floor_div(self.low[d] - off, f));
            high.push(floor_div(self.high[d] - off, f));
        }
        Ok(GridExtent {
            types: self.types.clone(),
            low,
            high,
        })
    }

    /// Return a copy with the given dimension replaced by `[low, high]`.
    ///
    /// Used for collapsing a dimension to a single cell when slicing.
    pub fn with_range(&self, dim: usize, low: i64, high: i64) -> Result<GridExtent> {
        if dim >= self.dimension() {
            return Err(GridError::invalid(format!(
                "dimension {} out of range for a {}-dimensional extent",
                dim,
                self.dimension()
            )));
        }
        if low > high {
            return Err(GridError::invalid(format!(
                "invalid range [{}, {}] in dimension {}",
                low, high, dim
            )));
        }
        let mut copy = self.clone();
        copy.low[dim] = low;
        copy.high[dim] = high;
        Ok(copy)
    }

    /// Expand every dimension symmetrically by the given cell counts.
    ///
    /// A margin longer than the extent's dimension count is truncated; a
    /// shorter one leaves the remaining dimensions unchanged.
    pub(crate) fn expand(&self, margin: &[i64]) -> GridExtent {
        let mut copy = self.clone();
        for (d, &m) in margin.iter().enumerate().take(self.dimension()) {
            copy.low[d] -= m;
            copy.high[d] += m;
        }
        copy
    }
}

impl fmt::Display for GridExtent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for d in 0..self.dimension() {
            if d > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}..{}", self.low[d], self.high[d])?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_floor_div_mod() {
        assert_eq!(floor_div(7, 2), 3);
        assert_eq!(floor_div(-7, 2), -4);
        assert_eq!(floor_mod(7, 2), 1);
        assert_eq!(floor_mod(-7, 2), 1);
    }

    #[test]
    fn test_new_rejects_inverted_range() {
        let err = GridExtent::new_2d(5, 0, 4, 10).unwrap_err();
        assert!(matches!(err, GridError::InvalidArgument { .. }));
    }

    #[test]
    fn test_size_and_contains() {
        let extent = GridExtent::new_2d(0, -90, 10, 90).unwrap();
        assert_eq!(extent.size(0), 11);
        assert_eq!(extent.size(1), 181);
        assert!(extent.contains(&[10, 90]));
        assert!(!extent.contains(&[11, 0]));
    }

    #[test]
    fn test_intersect() {
        let a = GridExtent::new_2d(0, 0, 9, 19).unwrap();
        let b = GridExtent::new_2d(5, 10, 30, 40).unwrap();
        let i = a.intersect(&b).unwrap();
        assert_eq!(i, GridExtent::new_2d(5, 10, 9, 19).unwrap());
    }

    #[test]
    fn test_intersect_disjoint() {
        let a = GridExtent::new_2d(0, 0, 9, 19).unwrap();
        let b = GridExtent::new_2d(30, 5, 40, 15).unwrap();
        let err = a.intersect(&b).unwrap_err();
        match err {
            GridError::DisjointExtent { dimension, .. } => assert_eq!(dimension, 0),
            other => panic!("expected DisjointExtent, got {:?}", other),
        }
    }

    #[test]
    fn test_intersect_dimension_mismatch() {
        let a = GridExtent::new_2d(0, 0, 9, 19).unwrap();
        let b = GridExtent::new(&[DimensionType::Column], &[0], &[9]).unwrap();
        assert!(matches!(
            a.intersect(&b),
            Err(GridError::MismatchedDimension { .. })
        ));
    }

    #[test]
    fn test_subsample() {
        let extent = GridExtent::new_2d(4, 7, 21, 30).unwrap();
        let coarse = extent.subsample(&[2, 3], &[0, 1]).unwrap();
        assert_eq!(coarse, GridExtent::new_2d(2, 2, 10, 9).unwrap());
    }

    #[test]
    fn test_subsample_negative_low() {
        let extent = GridExtent::new_2d(-7, 0, 8, 0).unwrap();
        let coarse = extent.subsample(&[4, 1], &[0, 0]).unwrap();
        // floor division keeps the lattice consistent across zero
        assert_eq!(coarse.low(0), -2);
        assert_eq!(coarse.high(0), 2);
    }

    #[test]
    fn test_subsample_rejects_bad_offset() {
        let extent = GridExtent::new_2d(0, 0, 9, 9).unwrap();
        assert!(extent.subsample(&[2, 2], &[2, 0]).is_err());
        assert!(extent.subsample(&[0, 1], &[0, 0]).is_err());
    }

    #[test]
    fn test_with_range_collapse() {
        let extent = GridExtent::new_2d(0, 0, 9, 19).unwrap();
        let sliced = extent.with_range(1, 19, 19).unwrap();
        assert_eq!(sliced.low(1), 19);
        assert_eq!(sliced.high(1), 19);
        assert_eq!(sliced.size(1), 1);
        // original untouched
        assert_eq!(extent.high(1), 19);
        assert_eq!(extent.low(1), 0);
    }

    #[test]
    fn test_display() {
        let extent = GridExtent::new_2d(0, -90, 10, 90).unwrap();
        assert_eq!(extent.to_string(), "[0..10, -90..90]");
    }

    #[test]
    fn test_serde_round_trip() {
        let extent = GridExtent::new_2d(0, -90, 10, 90).unwrap();
        let json = serde_json::to_string(&extent).unwrap();
        let back: GridExtent = serde_json::from_str(&json).unwrap();
        assert_eq!(extent, back);
    }
}
