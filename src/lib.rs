//! # graticule
//!
//! A grid-geometry derivation engine for raster coverages.
//!
//! This library describes where a raster grid sits in a coordinate reference
//! system and derives new grid geometries restricted to a region of interest,
//! with subsampling, margins, chunk alignment and dimension slicing.
//!
//! ## Key Features
//!
//! - **Integer grid extents**: n-dimensional inclusive index boxes with
//!   intersection, subsampling and slicing
//! - **Composable coordinate transforms**: affine matrices, interpolated
//!   sample tables, per-axis-block compounds, and dimension separation
//! - **Antimeridian-aware derivation**: regions of interest expressed whole
//!   periods away from the grid domain are reconciled automatically
//! - **Two-state derivation builder**: configure, resolve once, build
//!   repeatedly
//!
//! ## Architecture
//!
//! - **Geometry Layer**: [`GridExtent`], [`Envelope`] and [`GridGeometry`]
//!   describe grids and their placement
//! - **Transform Layer**: [`MathTransform`] implementations map grid indices
//!   to CRS coordinates and back
//! - **Derivation Layer**: [`GridDerivation`] resolves a region of interest
//!   against a base geometry and assembles the derived grid

pub mod crs;
pub mod derivation;
pub mod envelope;
pub mod error;
pub mod extent;
pub mod geometry;
pub mod logging;
pub mod transform;
pub mod wraparound;

pub use crs::{AxesConvention, AxisDirection, CoordinateSystem, Crs, CsAxis, CsKind};
pub use derivation::{GridClipping, GridDerivation, GridRounding};
pub use envelope::{DirectPosition, Envelope};
pub use error::{GridError, Result};
pub use extent::{DimensionType, GridExtent};
pub use geometry::{Anchor, GridComponent, GridGeometry};
pub use logging::{init_tracing, log_error, log_operation_end, log_operation_start, log_timed_operation};
pub use transform::{
    concatenate, separate, CompoundTransform, ConcatenatedTransform, CoordinateOperation,
    DefaultTransformFactory, InterpolatedTransform, LinearTransform, MathTransform,
    TransformFactory,
};
