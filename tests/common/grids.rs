//! Grid geometry fixtures with known placements.
//!
//! These fixtures are shared by the derivation integration tests; each one
//! documents the envelope it spans so expected values in the tests can be
//! checked by hand.

use std::sync::Arc;

use graticule::{Anchor, Crs, GridExtent, GridGeometry, LinearTransform, MathTransform};

/// A geographic grid of 11 x 181 one-degree cells.
///
/// Cell corner transform: `lon = 80 + x`, `lat = y`. The envelope spans
/// `[80, 91] x [-90, 91]` on WGS 84, so the grid sits next to the
/// antimeridian-free part of the globe but its longitudes still wrap with a
/// 360 degree period.
pub fn geographic_grid() -> GridGeometry {
    let extent = GridExtent::new_2d(0, -90, 10, 90).unwrap();
    let transform: Arc<dyn MathTransform> =
        Arc::new(LinearTransform::scale_translate(&[1.0, 1.0], &[80.0, 0.0]));
    GridGeometry::new(extent, Anchor::CellCorner, transform, Some(Crs::wgs84())).unwrap()
}

/// A coarse grid of 10 x 20 cells, two degrees per cell.
///
/// Cell corner transform: `lon = 2x`, `lat = 2y`. The envelope spans
/// `[0, 20] x [0, 40]` on WGS 84.
pub fn coarse_grid() -> GridGeometry {
    let extent = GridExtent::new_2d(0, 0, 9, 19).unwrap();
    let transform: Arc<dyn MathTransform> =
        Arc::new(LinearTransform::scale_translate(&[2.0, 2.0], &[0.0, 0.0]));
    GridGeometry::new(extent, Anchor::CellCorner, transform, Some(Crs::wgs84())).unwrap()
}

/// A large tiled grid of 1024 x 1024 unit cells on an engineering CRS.
///
/// Identity placement: cell `(i, j)` covers `[i, i+1] x [j, j+1]`. Used by
/// the chunk-alignment and subsampling tests.
pub fn tiled_grid() -> GridGeometry {
    let extent = GridExtent::new_2d(0, 0, 1023, 1023).unwrap();
    let transform: Arc<dyn MathTransform> = Arc::new(LinearTransform::identity(2));
    GridGeometry::new(
        extent,
        Anchor::CellCorner,
        transform,
        Some(Crs::engineering("tile space", 2).unwrap()),
    )
    .unwrap()
}
