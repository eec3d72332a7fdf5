//! Derivation of a new grid geometry from a base geometry.
//!
//! A [`GridDerivation`] is a per-request builder: it borrows a base
//! [`GridGeometry`], accepts configuration (margin, chunk size, maximum
//! subsampling, clipping and rounding modes) in any order, then resolves a
//! region of interest with `subgrid*` or `slice` and assembles the derived
//! geometry with [`build`](GridDerivation::build).
//!
//! The lifecycle is a two-state machine: **Configuring** until the first
//! `subgrid*`/`slice` call, then **Resolved**. Configuration calls are
//! rejected once resolved; `build` may be called repeatedly and returns
//! equal geometries each time.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::crs::{CoordinateSystem, Crs};
use crate::envelope::{DirectPosition, Envelope};
use crate::error::{GridError, Result};
use crate::extent::{floor_div, floor_mod, GridExtent};
use crate::geometry::{Anchor, GridGeometry};
use crate::transform::{
    separate, DefaultTransformFactory, LinearTransform, MathTransform, TransformFactory,
};
use crate::wraparound;

/// Tolerance absorbing floating-point noise when rounding envelope bounds
/// to cell indices.
const EPS: f64 = 1e-9;

/// Whether the derived extent may extend beyond the base domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridClipping {
    /// The region of interest must intersect the base domain and the result
    /// is clipped to it.
    #[default]
    Strict,
    /// The result may extend beyond the base domain, typically together
    /// with a margin.
    BorderExpansion,
}

/// Rounding applied when converting floating envelope bounds to integer
/// cell indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GridRounding {
    /// Round each bound to the nearest cell boundary.
    #[default]
    Nearest,
    /// Cover the envelope entirely (floor the lower bound, ceil the upper).
    Enclosing,
    /// Keep only cells fully inside the envelope.
    Contained,
}

#[derive(Debug)]
struct Resolved {
    extent: Option<GridExtent>,
    subsampling: Vec<u64>,
    offsets: Vec<i64>,
    envelope: Option<Envelope>,
    resolution: Option<Vec<f64>>,
}

/// Builder for deriving a grid geometry restricted to a region of interest.
///
/// Single-owner, single-request state: not meant to be shared across
/// threads or reused for a different request once resolved.
#[derive(Debug)]
pub struct GridDerivation<'a> {
    base: &'a GridGeometry,
    factory: Box<dyn TransformFactory>,
    clipping: GridClipping,
    rounding: GridRounding,
    margin: Option<Vec<i64>>,
    chunk_size: Option<Vec<u64>>,
    max_subsampling: Option<Vec<u64>>,
    resolved: Option<Resolved>,
}

impl<'a> GridDerivation<'a> {
    /// Start a derivation against the given base geometry.
    pub fn new(base: &'a GridGeometry) -> Self {
        Self {
            base,
            factory: Box::new(DefaultTransformFactory),
            clipping: GridClipping::default(),
            rounding: GridRounding::default(),
            margin: None,
            chunk_size: None,
            max_subsampling: None,
            resolved: None,
        }
    }

    fn ensure_configuring(&self, operation: &str) -> Result<()> {
        if self.resolved.is_some() {
            return Err(GridError::IllegalState {
                message: format!("{} rejected: derivation is already resolved", operation),
            });
        }
        Ok(())
    }

    /// Replace the coordinate-transform collaborator.
    pub fn transform_factory(&mut self, factory: Box<dyn TransformFactory>) -> Result<&mut Self> {
        self.ensure_configuring("transform_factory")?;
        self.factory = factory;
        Ok(self)
    }

    /// Set the clipping mode.
    pub fn clipping(&mut self, mode: GridClipping) -> Result<&mut Self> {
        self.ensure_configuring("clipping")?;
        self.clipping = mode;
        Ok(self)
    }

    /// Set the rounding mode.
    pub fn rounding(&mut self, mode: GridRounding) -> Result<&mut Self> {
        self.ensure_configuring("rounding")?;
        self.rounding = mode;
        Ok(self)
    }

    /// Expand the resolved region by the given number of cells per
    /// dimension (in units of the derived, possibly subsampled grid).
    pub fn margin(&mut self, cell_counts: &[i64]) -> Result<&mut Self> {
        self.ensure_configuring("margin")?;
        if cell_counts.iter().any(|&m| m <= 0) {
            return Err(GridError::invalid("margin cell counts must be positive"));
        }
        self.margin = Some(cell_counts.to_vec());
        Ok(self)
    }

    /// Force subsampling factors and extent alignment to integer multiples
    /// of the given tile sizes.
    pub fn chunk_size(&mut self, sizes: &[u64]) -> Result<&mut Self> {
        self.ensure_configuring("chunk_size")?;
        if sizes.iter().any(|&c| c == 0) {
            return Err(GridError::invalid("chunk sizes must be positive"));
        }
        self.chunk_size = Some(sizes.to_vec());
        Ok(self)
    }

    /// Upper bound on the subsampling factor per dimension.
    pub fn maximum_subsampling(&mut self, maximums: &[u64]) -> Result<&mut Self> {
        self.ensure_configuring("maximum_subsampling")?;
        if maximums.iter().any(|&m| m == 0) {
            return Err(GridError::invalid("maximum subsampling must be positive"));
        }
        self.max_subsampling = Some(maximums.to_vec());
        Ok(self)
    }

    /// Subsampling factors of the resolved request, if resolved.
    pub fn subsampling(&self) -> Option<&[u64]> {
        self.resolved.as_ref().map(|r| r.subsampling.as_slice())
    }

    /// Residual alignment offsets of the resolved request, if resolved.
    pub fn subsampling_offsets(&self) -> Option<&[i64]> {
        self.resolved.as_ref().map(|r| r.offsets.as_slice())
    }

    /// Restrict the base geometry to the given area of interest, optionally
    /// requesting a coarser target resolution (CRS units per cell).
    ///
    /// Extra AOI dimensions beyond the grid are ignored; missing AOI
    /// dimensions leave the corresponding grid dimension unconstrained.
    pub fn subgrid(
        &mut self,
        area_of_interest: &Envelope,
        resolution: Option<&[f64]>,
    ) -> Result<&mut Self> {
        self.ensure_configuring("subgrid")?;
        let domain = self.base.envelope_checked()?;

        // 1. bring the AOI into the grid's CRS
        let aoi = self.reproject(area_of_interest)?;

        // 2. periodic axes: shift the AOI onto the domain's frame
        let aoi = wraparound::resolve(&aoi, domain)?;

        // 3. intersect in CRS space; any empty dimension is fatal
        let clipped = wraparound::unwrap_domain(domain).intersect(&aoi)?;

        if self.base.extent().is_none() {
            // envelope-only base: nothing to round, expose the request as-is
            let resolved = Resolved {
                extent: None,
                subsampling: vec![1; domain.dimension()],
                offsets: vec![0; domain.dimension()],
                envelope: Some(clipped),
                resolution: resolution.map(|r| r.to_vec()),
            };
            debug!(envelope = ?resolved.envelope, "resolved envelope-only subgrid");
            self.resolved = Some(resolved);
            return Ok(self);
        }

        // 4. map the intersection to grid-index space and round
        let base_extent = self.base.extent_checked()?;
        let corner = self.base.grid_to_crs(Anchor::CellCorner)?;
        let extent = self.envelope_to_extent(&corner, &clipped, base_extent)?;

        self.resolve_extent(extent, resolution)
    }

    /// Run the derivation pipeline against another grid's geometry.
    pub fn subgrid_geometry(&mut self, other: &GridGeometry) -> Result<&mut Self> {
        self.ensure_configuring("subgrid_geometry")?;
        if other.envelope().is_some() && self.base.envelope().is_some() {
            let envelope = other.envelope_checked()?.clone();
            return self.subgrid(&envelope, other.resolution());
        }
        self.subgrid_extent(other.extent_checked()?)
    }

    /// Run the derivation pipeline directly against another grid's extent.
    pub fn subgrid_extent(&mut self, other: &GridExtent) -> Result<&mut Self> {
        self.ensure_configuring("subgrid_extent")?;
        let base_extent = self.base.extent_checked()?;
        let extent = base_extent.intersect(other)?;
        self.resolve_extent(extent, None)
    }

    /// Collapse dimensions addressed by `position` to a single cell.
    ///
    /// Ordinates that are `NaN` (or beyond the position's dimension count)
    /// leave the corresponding grid dimension unchanged.
    pub fn slice(&mut self, position: &DirectPosition) -> Result<&mut Self> {
        self.ensure_configuring("slice")?;
        let base_extent = self.base.extent_checked()?;
        let corner = self.base.grid_to_crs(Anchor::CellCorner)?;
        let n = base_extent.dimension();

        // CRS/unit reconciliation, then periodic-axis shifts
        let coords = self.reproject_position(position)?;
        let coords = self.shift_into_domain(coords)?;

        let finite: Vec<usize> = (0..n)
            .filter(|&d| coords.get(d).is_some_and(|c| c.is_finite()))
            .collect();
        if finite.is_empty() {
            return Err(GridError::invalid(
                "slice position does not address any grid dimension",
            ));
        }

        let grid_coords = self.to_grid_coordinates(&corner, &coords, &finite)?;
        let mut extent = base_extent.clone();
        for (&d, &c) in finite.iter().zip(grid_coords.iter()) {
            let mut index = (c + EPS).floor() as i64;
            // a position exactly on the exclusive upper cell boundary
            // belongs to the last cell
            if index == base_extent.high(d) + 1 && c <= (base_extent.high(d) + 1) as f64 + EPS {
                index = base_extent.high(d);
            }
            if index < base_extent.low(d) || index > base_extent.high(d) {
                return Err(GridError::DisjointExtent {
                    dimension: d,
                    message: format!(
                        "slice index {} outside extent [{}, {}]",
                        index,
                        base_extent.low(d),
                        base_extent.high(d)
                    ),
                });
            }
            extent = extent.with_range(d, index, index)?;
        }
        debug!(extent = %extent, "resolved slice");
        self.resolved = Some(Resolved {
            extent: Some(extent),
            subsampling: vec![1; n],
            offsets: vec![0; n],
            envelope: None,
            resolution: None,
        });
        Ok(self)
    }

    /// Assemble the derived grid geometry from the resolved state.
    ///
    /// Idempotent: repeated calls return equal geometries.
    pub fn build(&self) -> Result<GridGeometry> {
        let resolved = self.resolved.as_ref().ok_or_else(|| GridError::IllegalState {
            message: "build requires a resolved derivation (call subgrid or slice first)"
                .to_string(),
        })?;

        // envelope-only base
        let Some(extent) = &resolved.extent else {
            let envelope = resolved.envelope.clone().ok_or_else(|| {
                GridError::IncompleteGeometry {
                    message: "resolved state has neither extent nor envelope".to_string(),
                }
            })?;
            let crs = envelope.crs().cloned();
            return GridGeometry::assemble(
                None,
                None,
                crs,
                Some(envelope),
                resolved.resolution.clone(),
            );
        };

        // extent-only base: no transform is computable, expose subsampling
        // as resolution only
        if self.base.grid_to_crs(Anchor::CellCorner).is_err() {
            let resolution = resolved
                .resolution
                .clone()
                .or_else(|| {
                    if resolved.subsampling.iter().any(|&s| s != 1) {
                        Some(resolved.subsampling.iter().map(|&s| s as f64).collect())
                    } else {
                        None
                    }
                });
            return GridGeometry::assemble(
                Some(extent.clone()),
                None,
                None,
                None,
                resolution,
            );
        }

        let corner = self.base.grid_to_crs(Anchor::CellCorner)?;
        if resolved.subsampling.iter().all(|&s| s == 1) {
            return GridGeometry::new(
                extent.clone(),
                Anchor::CellCorner,
                corner,
                self.base.crs().cloned(),
            );
        }
        let derived_extent = extent.subsample(&resolved.subsampling, &resolved.offsets)?;
        // derived index j maps to base index j * factor + offset
        let scales: Vec<f64> = resolved.subsampling.iter().map(|&s| s as f64).collect();
        let offsets: Vec<f64> = resolved.offsets.iter().map(|&o| o as f64).collect();
        let lattice: Arc<dyn MathTransform> =
            Arc::new(LinearTransform::scale_translate(&scales, &offsets));
        let derived_corner = crate::transform::concatenate(lattice, corner)?;
        GridGeometry::new(
            derived_extent,
            Anchor::CellCorner,
            derived_corner,
            self.base.crs().cloned(),
        )
    }

    // --- internals -----------------------------------------------------

    fn reproject(&self, aoi: &Envelope) -> Result<Envelope> {
        let (Some(source), Some(target)) = (aoi.crs(), self.base.crs()) else {
            return Ok(aoi.clone());
        };
        if source == target {
            return Ok(aoi.clone());
        }
        let m = aoi.dimension().min(target.dimension());
        let source = truncated_crs(source, m)?;
        let lower: Vec<f64> = (0..m).map(|d| aoi.lower(d)).collect();
        let upper: Vec<f64> = (0..m).map(|d| aoi.upper(d)).collect();
        let operation = self.factory.find_operation(&source, target)?;
        let (lower, upper) = map_box(operation.math_transform(), &lower, &upper)?;
        Envelope::new(&lower, &upper, Some(target.clone()))
    }

    fn reproject_position(&self, position: &DirectPosition) -> Result<Vec<f64>> {
        let coords = position.coordinates().to_vec();
        let (Some(source), Some(target)) = (position.crs(), self.base.crs()) else {
            return Ok(coords);
        };
        if source == target {
            return Ok(coords);
        }
        let m = coords.len().min(target.dimension());
        let source = truncated_crs(source, m)?;
        let operation = self.factory.find_operation(&source, target)?;
        operation.math_transform().transform(&coords[..m])
    }

    /// Shift finite ordinates on periodic axes into the domain envelope's
    /// linear frame, mirroring what [`wraparound::resolve`] does for boxes.
    fn shift_into_domain(&self, mut coords: Vec<f64>) -> Result<Vec<f64>> {
        let Some(domain) = self.base.envelope() else {
            return Ok(coords);
        };
        let domain = wraparound::unwrap_domain(domain);
        for d in 0..coords.len().min(domain.dimension()) {
            let c = coords[d];
            if !c.is_finite() {
                continue;
            }
            if let Some(period) = domain.period(d) {
                let (d0, d1) = (domain.lower(d), domain.upper(d));
                if c < d0 - EPS || c > d1 + EPS {
                    for shift in [period, -period] {
                        let moved = c + shift;
                        if moved >= d0 - EPS && moved <= d1 + EPS {
                            trace!(dimension = d, shift, "wraparound shift applied to position");
                            coords[d] = moved;
                            break;
                        }
                    }
                }
            }
        }
        Ok(coords)
    }

    /// Convert CRS-space coordinates of the `finite` dimensions to
    /// grid-index (cell corner) space.
    fn to_grid_coordinates(
        &self,
        corner: &Arc<dyn MathTransform>,
        coords: &[f64],
        finite: &[usize],
    ) -> Result<Vec<f64>> {
        let n = corner.source_dimensions();
        let out = if finite.len() == n && coords.len() >= n {
            let mapped = corner.inverse()?.transform(&coords[..n])?;
            finite.iter().map(|&d| mapped[d]).collect()
        } else {
            // isolate the sub-transform over the addressed dimensions; a
            // transform coupling addressed and unaddressed axes is rejected
            // as not separable
            let sub = separate(corner, finite)?;
            let selected: Vec<f64> = finite.iter().map(|&d| coords[d]).collect();
            sub.inverse()?.transform(&selected)?
        };
        for (i, &c) in out.iter().enumerate() {
            if !c.is_finite() {
                return Err(GridError::Transform {
                    message: format!(
                        "grid coordinate is not finite in dimension {}",
                        finite[i]
                    ),
                });
            }
        }
        Ok(out)
    }

    /// Map an intersection envelope to grid-index space and round it to an
    /// integer extent per the configured rounding mode.
    fn envelope_to_extent(
        &self,
        corner: &Arc<dyn MathTransform>,
        clipped: &Envelope,
        base_extent: &GridExtent,
    ) -> Result<GridExtent> {
        let n = base_extent.dimension();
        let finite: Vec<usize> = (0..clipped.dimension().min(n))
            .filter(|&d| clipped.lower(d).is_finite() && clipped.upper(d).is_finite())
            .collect();

        let lower: Vec<f64> = (0..n)
            .map(|d| if d < clipped.dimension() { clipped.lower(d) } else { f64::NAN })
            .collect();
        let upper: Vec<f64> = (0..n)
            .map(|d| if d < clipped.dimension() { clipped.upper(d) } else { f64::NAN })
            .collect();

        let (grid_lower, grid_upper) = if finite.len() == n {
            let inverse = corner.inverse()?;
            map_box(&inverse, &lower, &upper)?
        } else {
            // unconstrained dimensions present: isolate the constrained
            // sub-transform; a transform coupling constrained and
            // unconstrained axes is rejected as not separable
            let sub = separate(corner, &finite)?;
            let inverse = sub.inverse()?;
            let sel_lower: Vec<f64> = finite.iter().map(|&d| lower[d]).collect();
            let sel_upper: Vec<f64> = finite.iter().map(|&d| upper[d]).collect();
            let (sub_lower, sub_upper) = map_box(&inverse, &sel_lower, &sel_upper)?;
            let mut full_lower = vec![f64::NAN; n];
            let mut full_upper = vec![f64::NAN; n];
            for (i, &d) in finite.iter().enumerate() {
                full_lower[d] = sub_lower[i];
                full_upper[d] = sub_upper[i];
            }
            (full_lower, full_upper)
        };

        let mut low = Vec::with_capacity(n);
        let mut high = Vec::with_capacity(n);
        for d in 0..n {
            if !finite.contains(&d) {
                // unconstrained dimension keeps the base range
                low.push(base_extent.low(d));
                high.push(base_extent.high(d));
                continue;
            }
            let (l, u) = (grid_lower[d], grid_upper[d]);
            if !l.is_finite() || !u.is_finite() {
                return Err(GridError::Transform {
                    message: format!("grid coordinates are not finite in dimension {}", d),
                });
            }
            let (lo, mut hi) = match self.rounding {
                GridRounding::Nearest => ((l + 0.5 - EPS).floor(), (u + 0.5 - EPS).floor() - 1.0),
                GridRounding::Enclosing => ((l + EPS).floor(), (u - EPS).ceil() - 1.0),
                GridRounding::Contained => ((l - EPS).ceil(), (u + EPS).floor() - 1.0),
            };
            if hi < lo {
                // degenerate interval: keep the single cell under it
                hi = lo;
            }
            let (mut lo, mut hi) = (lo as i64, hi as i64);
            // clip to the base domain; the envelope intersection already
            // guaranteed an overlap
            lo = lo.max(base_extent.low(d));
            hi = hi.min(base_extent.high(d));
            if lo > hi {
                return Err(GridError::DisjointExtent {
                    dimension: d,
                    message: "rounded extent fell outside the base domain".to_string(),
                });
            }
            low.push(lo);
            high.push(hi);
        }
        GridExtent::new(base_extent.axis_types(), &low, &high)
    }

    /// Common tail of the `subgrid*` pipeline: subsampling decision, margin,
    /// chunk alignment, clipping, and freezing of the resolved state.
    fn resolve_extent(
        &mut self,
        mut extent: GridExtent,
        resolution: Option<&[f64]>,
    ) -> Result<&mut Self> {
        let base_extent = self.base.extent_checked()?;
        let n = base_extent.dimension();

        // subsampling = max(1, floor(requested / base)) clamped and aligned
        let mut subsampling = vec![1u64; n];
        if let Some(requested) = resolution {
            let base_resolution = self.base.resolution().ok_or_else(|| {
                GridError::IncompleteGeometry {
                    message: "base resolution is required to honor a resolution request"
                        .to_string(),
                }
            })?;
            for d in 0..n.min(requested.len()) {
                if requested[d].is_finite() && base_resolution[d] > 0.0 {
                    let ideal = (requested[d] / base_resolution[d] + EPS).floor();
                    subsampling[d] = (ideal.max(1.0)) as u64;
                }
            }
        }
        for d in 0..n {
            if let Some(maximums) = &self.max_subsampling {
                if d < maximums.len() {
                    subsampling[d] = subsampling[d].min(maximums[d]);
                }
            }
            if let Some(chunks) = &self.chunk_size {
                if d < chunks.len() {
                    subsampling[d] = chunk_compatible(subsampling[d], chunks[d]);
                }
            }
        }

        // margin is given in derived cells, so it scales with subsampling
        if let Some(margin) = &self.margin {
            let scaled: Vec<i64> = margin
                .iter()
                .enumerate()
                .map(|(d, &m)| m.saturating_mul(subsampling.get(d).copied().unwrap_or(1) as i64))
                .collect();
            extent = extent.expand(&scaled);
            if self.clipping == GridClipping::Strict {
                extent = extent.intersect(base_extent)?;
            }
        }

        // chunk alignment of the extent, anchored at the base extent origin
        if let Some(chunks) = &self.chunk_size {
            let mut low: Vec<i64> = extent.lows().to_vec();
            let mut high: Vec<i64> = extent.highs().to_vec();
            for d in 0..n.min(chunks.len()) {
                let tile = (chunks[d] * subsampling[d]) as i64;
                let origin = base_extent.low(d);
                low[d] = origin + floor_div(low[d] - origin, tile) * tile;
                high[d] = origin + (floor_div(high[d] - origin, tile) + 1) * tile - 1;
            }
            extent = GridExtent::new(extent.axis_types(), &low, &high)?;
            if self.clipping == GridClipping::Strict {
                extent = extent.intersect(base_extent)?;
            }
        }

        let offsets: Vec<i64> = (0..n)
            .map(|d| floor_mod(extent.low(d), subsampling[d] as i64))
            .collect();

        debug!(
            extent = %extent,
            subsampling = ?subsampling,
            offsets = ?offsets,
            "resolved subgrid"
        );
        self.resolved = Some(Resolved {
            extent: Some(extent),
            subsampling,
            offsets,
            envelope: None,
            resolution: resolution.map(|r| r.to_vec()),
        });
        Ok(self)
    }
}

/// Largest chunk-compatible factor not exceeding `factor`: a multiple of
/// the chunk size when possible, otherwise its largest divisor.
fn chunk_compatible(factor: u64, chunk: u64) -> u64 {
    if factor >= chunk {
        factor - factor % chunk
    } else {
        (1..=factor).rev().find(|d| chunk % d == 0).unwrap_or(1)
    }
}

/// Restrict a CRS to its first `dimension` axes. Trailing extra dimensions
/// of an area of interest or slice position are ignored, so its CRS must be
/// cut down to match before asking the factory for an operation.
fn truncated_crs(crs: &Crs, dimension: usize) -> Result<Crs> {
    if crs.dimension() <= dimension {
        return Ok(crs.clone());
    }
    let axes = crs.cs().axes()[..dimension].to_vec();
    Ok(Crs::new(
        crs.name(),
        CoordinateSystem::new(crs.cs().kind(), axes)?,
    ))
}

/// Map an axis-aligned box through a transform by taking the componentwise
/// min/max over all its corners. `NaN` bounds pass through untouched on
/// transforms whose rows treat them independently.
fn map_box(
    transform: &Arc<dyn MathTransform>,
    lower: &[f64],
    upper: &[f64],
) -> Result<(Vec<f64>, Vec<f64>)> {
    let n = transform.source_dimensions();
    let m = transform.target_dimensions();
    let mut out_lower = vec![f64::INFINITY; m];
    let mut out_upper = vec![f64::NEG_INFINITY; m];
    for corner in 0..(1u64 << n) {
        let point: Vec<f64> = (0..n)
            .map(|d| if corner & (1 << d) == 0 { lower[d] } else { upper[d] })
            .collect();
        let mapped = transform.transform(&point)?;
        for (d, &v) in mapped.iter().enumerate() {
            if v.is_nan() {
                out_lower[d] = f64::NAN;
                out_upper[d] = f64::NAN;
            } else {
                if v < out_lower[d] {
                    out_lower[d] = v;
                }
                if v > out_upper[d] {
                    out_upper[d] = v;
                }
            }
        }
    }
    Ok((out_lower, out_upper))
}
