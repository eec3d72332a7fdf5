//! Grid geometries: the composite of extent, grid-to-CRS transform, CRS,
//! envelope and resolution.
//!
//! A [`GridGeometry`] is immutable and safe for unsynchronized concurrent
//! reads. Each component is independently "defined or not"; at least one
//! must be known. Derivations (see [`GridDerivation`](crate::derivation))
//! always yield a new instance.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::crs::Crs;
use crate::envelope::Envelope;
use crate::error::{GridError, Result};
use crate::extent::GridExtent;
use crate::transform::{concatenate, LinearTransform, MathTransform};

/// Convention for where within a cell a grid-to-CRS transform evaluates
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Anchor {
    /// Integer indices map to the lower corner of each cell.
    CellCorner,
    /// Integer indices map to the center of each cell.
    CellCenter,
}

/// The independently-defined components of a [`GridGeometry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridComponent {
    Extent,
    GridToCrs,
    Crs,
    Envelope,
    Resolution,
}

/// Immutable description of the placement of a raster grid in a CRS.
#[derive(Debug, Clone)]
pub struct GridGeometry {
    extent: Option<GridExtent>,
    corner_to_crs: Option<Arc<dyn MathTransform>>,
    crs: Option<Crs>,
    envelope: Option<Envelope>,
    resolution: Option<Vec<f64>>,
}

impl GridGeometry {
    /// Create a complete geometry from an extent, an anchored grid-to-CRS
    /// transform, and an optional CRS.
    ///
    /// The envelope and resolution are computed from the other components.
    pub fn new(
        extent: GridExtent,
        anchor: Anchor,
        grid_to_crs: Arc<dyn MathTransform>,
        crs: Option<Crs>,
    ) -> Result<Self> {
        let n = extent.dimension();
        if grid_to_crs.source_dimensions() != n {
            return Err(GridError::MismatchedDimension {
                expected: n,
                actual: grid_to_crs.source_dimensions(),
            });
        }
        if let Some(crs) = &crs {
            if crs.dimension() != grid_to_crs.target_dimensions() {
                return Err(GridError::MismatchedDimension {
                    expected: grid_to_crs.target_dimensions(),
                    actual: crs.dimension(),
                });
            }
        }
        let corner_to_crs = match anchor {
            Anchor::CellCorner => grid_to_crs,
            Anchor::CellCenter => {
                // t_corner(i) = t_center(i - 1/2)
                let half = Arc::new(LinearTransform::uniform_translation(n, -0.5));
                concatenate(half, grid_to_crs)?
            }
        };
        let envelope = compute_envelope(&extent, &corner_to_crs, crs.as_ref())?;
        let resolution = compute_resolution(&extent, &corner_to_crs)?;
        Ok(Self {
            extent: Some(extent),
            corner_to_crs: Some(corner_to_crs),
            crs,
            envelope: Some(envelope),
            resolution: Some(resolution),
        })
    }

    /// Create a geometry known only by its envelope (no integer extent and
    /// no grid-to-CRS transform).
    pub fn from_envelope(envelope: Envelope) -> Result<Self> {
        let crs = envelope.crs().cloned();
        Ok(Self {
            extent: None,
            corner_to_crs: None,
            crs,
            envelope: Some(envelope),
            resolution: None,
        })
    }

    /// Create a geometry known only by its extent (no transform, no CRS).
    pub fn from_extent(extent: GridExtent) -> Result<Self> {
        Ok(Self {
            extent: Some(extent),
            corner_to_crs: None,
            crs: None,
            envelope: None,
            resolution: None,
        })
    }

    pub(crate) fn assemble(
        extent: Option<GridExtent>,
        corner_to_crs: Option<Arc<dyn MathTransform>>,
        crs: Option<Crs>,
        envelope: Option<Envelope>,
        resolution: Option<Vec<f64>>,
    ) -> Result<Self> {
        if extent.is_none() && corner_to_crs.is_none() && envelope.is_none() && crs.is_none() {
            return Err(GridError::IncompleteGeometry {
                message: "at least one component must be defined".to_string(),
            });
        }
        Ok(Self {
            extent,
            corner_to_crs,
            crs,
            envelope,
            resolution,
        })
    }

    /// True if the given component carries a value.
    pub fn is_defined(&self, component: GridComponent) -> bool {
        match component {
            GridComponent::Extent => self.extent.is_some(),
            GridComponent::GridToCrs => self.corner_to_crs.is_some(),
            GridComponent::Crs => self.crs.is_some(),
            GridComponent::Envelope => self.envelope.is_some(),
            GridComponent::Resolution => self.resolution.is_some(),
        }
    }

    /// Number of grid dimensions (from the extent, the transform, or the
    /// envelope, whichever is defined).
    pub fn dimension(&self) -> usize {
        if let Some(extent) = &self.extent {
            extent.dimension()
        } else if let Some(t) = &self.corner_to_crs {
            t.source_dimensions()
        } else if let Some(envelope) = &self.envelope {
            envelope.dimension()
        } else {
            0
        }
    }

    /// The grid extent, if defined.
    pub fn extent(&self) -> Option<&GridExtent> {
        self.extent.as_ref()
    }

    /// The grid extent, failing with [`GridError::IncompleteGeometry`] when
    /// undefined.
    pub fn extent_checked(&self) -> Result<&GridExtent> {
        self.extent.as_ref().ok_or_else(|| GridError::IncompleteGeometry {
            message: "grid extent is not defined".to_string(),
        })
    }

    /// The grid-to-CRS transform for the requested anchor.
    pub fn grid_to_crs(&self, anchor: Anchor) -> Result<Arc<dyn MathTransform>> {
        let corner = self.corner_to_crs.as_ref().ok_or_else(|| {
            GridError::IncompleteGeometry {
                message: "grid-to-CRS transform is not defined".to_string(),
            }
        })?;
        match anchor {
            Anchor::CellCorner => Ok(Arc::clone(corner)),
            Anchor::CellCenter => {
                // t_center(i) = t_corner(i + 1/2)
                let n = corner.source_dimensions();
                let half = Arc::new(LinearTransform::uniform_translation(n, 0.5));
                concatenate(half, Arc::clone(corner))
            }
        }
    }

    /// The CRS, if defined.
    pub fn crs(&self) -> Option<&Crs> {
        self.crs.as_ref()
    }

    /// The geographic/projected envelope, if defined.
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// The envelope, failing when undefined.
    pub fn envelope_checked(&self) -> Result<&Envelope> {
        self.envelope.as_ref().ok_or_else(|| GridError::IncompleteGeometry {
            message: "envelope is not defined".to_string(),
        })
    }

    /// Per-axis resolution (CRS units per cell), if defined.
    pub fn resolution(&self) -> Option<&[f64]> {
        self.resolution.as_deref()
    }

    /// Start a derivation request against this geometry.
    pub fn derive(&self) -> crate::derivation::GridDerivation<'_> {
        crate::derivation::GridDerivation::new(self)
    }
}

impl PartialEq for GridGeometry {
    fn eq(&self, other: &Self) -> bool {
        if self.extent != other.extent
            || self.crs != other.crs
            || self.envelope != other.envelope
            || self.resolution != other.resolution
        {
            return false;
        }
        match (&self.corner_to_crs, &other.corner_to_crs) {
            (None, None) => true,
            (Some(a), Some(b)) => match (a.to_linear(), b.to_linear()) {
                (Some(la), Some(lb)) => la == lb,
                _ => Arc::ptr_eq(a, b),
            },
            _ => false,
        }
    }
}

/// Map the `[low, high + 1]` corner box of an extent through the corner
/// transform, taking the componentwise min/max over all box corners.
fn compute_envelope(
    extent: &GridExtent,
    corner_to_crs: &Arc<dyn MathTransform>,
    crs: Option<&Crs>,
) -> Result<Envelope> {
    let n = extent.dimension();
    let m = corner_to_crs.target_dimensions();
    let mut lower = vec![f64::INFINITY; m];
    let mut upper = vec![f64::NEG_INFINITY; m];
    for corner in 0..(1u64 << n) {
        let point: Vec<f64> = (0..n)
            .map(|d| {
                if corner & (1 << d) == 0 {
                    extent.low(d) as f64
                } else {
                    (extent.high(d) + 1) as f64
                }
            })
            .collect();
        let mapped = corner_to_crs.transform(&point)?;
        for (d, &v) in mapped.iter().enumerate() {
            if v < lower[d] {
                lower[d] = v;
            }
            if v > upper[d] {
                upper[d] = v;
            }
        }
    }
    Envelope::new(&lower, &upper, crs.cloned())
}

/// Per-axis resolution: linear transforms expose their scale magnitudes
/// directly, non-linear ones are estimated by a centered difference (one
/// cell wide) at the extent center, which measures the local step instead
/// of straddling into the next segment.
fn compute_resolution(
    extent: &GridExtent,
    corner_to_crs: &Arc<dyn MathTransform>,
) -> Result<Vec<f64>> {
    if let Some(linear) = corner_to_crs.to_linear() {
        return Ok(linear.scales());
    }
    let n = extent.dimension();
    let center: Vec<f64> = (0..n)
        .map(|d| (extent.low(d) as f64 + extent.high(d) as f64 + 1.0) / 2.0)
        .collect();
    let mut resolution = Vec::with_capacity(n);
    for d in 0..n {
        let mut before = center.clone();
        let mut after = center.clone();
        before[d] -= 0.5;
        after[d] += 0.5;
        let a = corner_to_crs.transform(&before)?;
        let b = corner_to_crs.transform(&after)?;
        let len = b
            .iter()
            .zip(a.iter())
            .map(|(p, q)| (p - q).powi(2))
            .sum::<f64>()
            .sqrt();
        resolution.push(len);
    }
    Ok(resolution)
}
