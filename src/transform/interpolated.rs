//! One-dimensional transforms defined by a table of samples.
//!
//! This is the non-linear grid-to-CRS case: an axis whose coordinate values
//! are given at every grid index (e.g. irregular time steps or stretched
//! vertical levels). Forward evaluation interpolates linearly between
//! samples; the inverse locates the bracketing pair by binary search.

use std::sync::Arc;

use super::{LinearTransform, MathTransform};
use crate::error::{GridError, Result};

/// A 1-D transform mapping grid index `i` to `samples[i]`, with linear
/// interpolation between samples and linear extrapolation past the ends.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpolatedTransform {
    samples: Arc<Vec<f64>>,
    inverted: bool,
}

impl InterpolatedTransform {
    /// Create from a strictly increasing sample table (at least two values).
    pub fn new(samples: Vec<f64>) -> Result<Self> {
        if samples.len() < 2 {
            return Err(GridError::invalid(
                "interpolated transform needs at least two samples",
            ));
        }
        for pair in samples.windows(2) {
            if !(pair[1] > pair[0]) {
                return Err(GridError::invalid(
                    "interpolated transform samples must be strictly increasing",
                ));
            }
        }
        Ok(Self {
            samples: Arc::new(samples),
            inverted: false,
        })
    }

    fn forward(&self, index: f64) -> f64 {
        let n = self.samples.len();
        // clamp the segment, not the coordinate: ends extrapolate linearly
        let i = (index.floor() as i64).clamp(0, n as i64 - 2) as usize;
        let fraction = index - i as f64;
        self.samples[i] + fraction * (self.samples[i + 1] - self.samples[i])
    }

    fn backward(&self, value: f64) -> f64 {
        let samples = &self.samples;
        let n = samples.len();
        let i = match samples.binary_search_by(|s| s.total_cmp(&value)) {
            Ok(exact) => return exact as f64,
            Err(insertion) => insertion.clamp(1, n - 1) - 1,
        };
        i as f64 + (value - samples[i]) / (samples[i + 1] - samples[i])
    }
}

impl MathTransform for InterpolatedTransform {
    fn source_dimensions(&self) -> usize {
        1
    }

    fn target_dimensions(&self) -> usize {
        1
    }

    fn transform(&self, coordinates: &[f64]) -> Result<Vec<f64>> {
        if coordinates.len() != 1 {
            return Err(GridError::MismatchedDimension {
                expected: 1,
                actual: coordinates.len(),
            });
        }
        let x = coordinates[0];
        if x.is_nan() {
            return Ok(vec![f64::NAN]);
        }
        Ok(vec![if self.inverted {
            self.backward(x)
        } else {
            self.forward(x)
        }])
    }

    fn inverse(&self) -> Result<Arc<dyn MathTransform>> {
        Ok(Arc::new(Self {
            samples: Arc::clone(&self.samples),
            inverted: !self.inverted,
        }))
    }

    fn separate(&self, keep: &[usize]) -> Result<Arc<dyn MathTransform>> {
        if keep == [0] {
            Ok(Arc::new(self.clone()))
        } else {
            Err(GridError::NotSeparable {
                message: "interpolated transform has a single dimension".to_string(),
            })
        }
    }

    fn to_linear(&self) -> Option<LinearTransform> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_monotonic_samples() {
        assert!(InterpolatedTransform::new(vec![0.0, 2.0, 1.0]).is_err());
        assert!(InterpolatedTransform::new(vec![0.0]).is_err());
    }

    #[test]
    fn test_forward_interpolation() {
        let t = InterpolatedTransform::new(vec![0.0, 10.0, 30.0, 70.0]).unwrap();
        assert_eq!(t.transform(&[0.0]).unwrap()[0], 0.0);
        assert_eq!(t.transform(&[1.5]).unwrap()[0], 20.0);
        assert_eq!(t.transform(&[3.0]).unwrap()[0], 70.0);
    }

    #[test]
    fn test_extrapolation_uses_end_slopes() {
        let t = InterpolatedTransform::new(vec![0.0, 10.0, 30.0]).unwrap();
        assert_eq!(t.transform(&[-1.0]).unwrap()[0], -10.0);
        assert_eq!(t.transform(&[3.0]).unwrap()[0], 50.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = InterpolatedTransform::new(vec![0.0, 10.0, 30.0, 70.0]).unwrap();
        let inv = t.inverse().unwrap();
        for index in [0.0, 0.25, 1.0, 1.5, 2.75, 3.0] {
            let value = t.transform(&[index]).unwrap()[0];
            let back = inv.transform(&[value]).unwrap()[0];
            assert!((back - index).abs() < 1e-12, "index {}", index);
        }
    }

    #[test]
    fn test_not_linear() {
        let t = InterpolatedTransform::new(vec![0.0, 10.0, 30.0]).unwrap();
        assert!(t.to_linear().is_none());
    }
}
