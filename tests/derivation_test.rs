//! Integration tests for grid derivation
//!
//! These tests verify the full derivation pipeline end-to-end: area-of-
//! interest reconciliation, extent rounding, subsampling, chunk alignment,
//! slicing and assembly of the derived geometry.

mod common;

use common::assertions::{assert_approx_eq, assert_envelope_eq};
use common::grids;

use graticule::{
    Anchor, AxisDirection, CoordinateSystem, Crs, CsAxis, CsKind, DirectPosition, Envelope,
    GridComponent, GridError, GridExtent, GridGeometry, GridRounding,
};

#[test]
fn test_subgrid_enclosing_covers_intersection() {
    let base = grids::geographic_grid();
    let aoi = Envelope::new_2d(82.3, -10.7, 87.8, 10.2).unwrap();

    let mut derivation = base.derive();
    derivation.rounding(GridRounding::Enclosing).unwrap();
    derivation.subgrid(&aoi, None).unwrap();
    let derived = derivation.build().unwrap();

    let extent = derived.extent().unwrap();
    assert_eq!((extent.low(0), extent.high(0)), (2, 7));
    assert_eq!((extent.low(1), extent.high(1)), (-11, 10));
    // the derived cells stay inside the base grid
    assert!(base.extent().unwrap().intersect(extent).is_ok());
    assert_eq!(base.extent().unwrap().intersect(extent).unwrap(), *extent);

    // the derived envelope covers the whole requested intersection
    let intersection = base.envelope().unwrap().intersect(&aoi).unwrap();
    assert!(derived.envelope().unwrap().contains(&intersection, 1e-9));
}

#[test]
fn test_build_is_idempotent() {
    let base = grids::geographic_grid();
    let aoi = Envelope::new_2d(82.0, -10.0, 88.0, 10.0).unwrap();

    let mut derivation = base.derive();
    derivation.subgrid(&aoi, None).unwrap();
    let first = derivation.build().unwrap();
    let second = derivation.build().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_subsampled_cells_align_with_base_grid() {
    let base = grids::geographic_grid();
    let aoi = Envelope::new_2d(80.0, -90.0, 91.0, 91.0).unwrap();

    let mut derivation = base.derive();
    derivation.subgrid(&aoi, Some(&[2.0, 3.0])).unwrap();
    assert_eq!(derivation.subsampling().unwrap(), &[2, 3]);
    assert_eq!(derivation.subsampling_offsets().unwrap(), &[0, 0]);

    let derived = derivation.build().unwrap();
    let extent = derived.extent().unwrap();
    assert_eq!((extent.low(0), extent.high(0)), (0, 5));
    assert_eq!((extent.low(1), extent.high(1)), (-30, 30));
    assert_eq!(derived.resolution().unwrap(), &[2.0, 3.0]);

    // derived cell (i, j) must start where base cell (2i, 3j) starts
    let derived_corner = derived.grid_to_crs(Anchor::CellCorner).unwrap();
    let base_corner = base.grid_to_crs(Anchor::CellCorner).unwrap();
    let a = derived_corner.transform(&[1.0, 1.0]).unwrap();
    let b = base_corner.transform(&[2.0, 3.0]).unwrap();
    assert_approx_eq(a[0], b[0], None);
    assert_approx_eq(a[1], b[1], None);
}

#[test]
fn test_chunk_and_maximum_subsampling_combine() {
    let base = grids::tiled_grid();
    let aoi = Envelope::new_2d(0.0, 0.0, 1024.0, 1024.0).unwrap();

    let mut derivation = base.derive();
    derivation.chunk_size(&[16, 16]).unwrap();
    derivation.maximum_subsampling(&[20, 2]).unwrap();
    derivation.subgrid(&aoi, Some(&[22.0, 5.0])).unwrap();

    // x: 22 capped to 20, then rounded down to the chunk multiple 16
    // y: 5 capped to 2, which divides the chunk size
    assert_eq!(derivation.subsampling().unwrap(), &[16, 2]);

    let derived = derivation.build().unwrap();
    let extent = derived.extent().unwrap();
    // both extents stay aligned with the 16-cell tiling
    assert_eq!(extent.size(0), 64);
    assert_eq!(extent.size(1), 512);
    assert_eq!(extent.size(0) % 16, 0);
    assert_eq!(extent.size(1) % 16, 0);
}

#[test]
fn test_derivation_is_periodicity_invariant() {
    let base = grids::geographic_grid();
    // the same region of the globe expressed zero, minus one and plus one
    // whole turns away
    let candidates = [
        Envelope::new_2d(70.0, -70.0, 90.0, 60.0).unwrap(),
        Envelope::new_2d(-290.0, -70.0, -270.0, 60.0).unwrap(),
        Envelope::new_2d(430.0, -70.0, 450.0, 60.0).unwrap(),
    ];

    let mut results = Vec::new();
    for aoi in &candidates {
        let mut derivation = base.derive();
        derivation.subgrid(aoi, None).unwrap();
        results.push(derivation.build().unwrap());
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(results[0], results[2]);

    let extent = results[0].extent().unwrap();
    assert_eq!((extent.low(0), extent.high(0)), (0, 9));
    assert_eq!((extent.low(1), extent.high(1)), (-70, 59));
    assert_envelope_eq(results[0].envelope().unwrap(), &[80.0, -70.0], &[90.0, 60.0]);
}

#[test]
fn test_wrapped_aoi_crossing_the_antimeridian() {
    let base = grids::geographic_grid();
    // lon [85, -170] crosses the antimeridian; only [85, 91] overlaps the grid
    let aoi = Envelope::new(&[85.0, -10.0], &[-170.0, 10.0], Some(Crs::wgs84())).unwrap();

    let mut derivation = base.derive();
    derivation.subgrid(&aoi, None).unwrap();
    let extent = derivation.build().unwrap().extent().unwrap().clone();
    assert_eq!((extent.low(0), extent.high(0)), (5, 10));
    assert_eq!((extent.low(1), extent.high(1)), (-10, 9));
}

#[test]
fn test_disjoint_aoi_reports_offending_dimension() {
    let base = grids::coarse_grid();
    let aoi = Envelope::new_2d(60.0, 15.0, 85.0, 30.0).unwrap();

    let mut derivation = base.derive();
    let err = derivation.subgrid(&aoi, None).unwrap_err();
    assert!(err.is_disjoint());
    match err {
        GridError::DisjointExtent { dimension, .. } => assert_eq!(dimension, 0),
        other => panic!("expected DisjointExtent, got {:?}", other),
    }
}

#[test]
fn test_slice_at_exclusive_upper_boundary() {
    let base = grids::geographic_grid();
    // lon 91 is the exclusive upper corner of the last column of cells
    let position = DirectPosition::new(&[91.0, f64::NAN], None).unwrap();

    let mut derivation = base.derive();
    derivation.slice(&position).unwrap();
    let extent = derivation.build().unwrap().extent().unwrap().clone();
    assert_eq!((extent.low(0), extent.high(0)), (10, 10));
    assert_eq!((extent.low(1), extent.high(1)), (-90, 90));
}

#[test]
fn test_subgrid_geometry_takes_envelope_and_resolution() {
    let base = grids::geographic_grid();
    // a coarser target grid: 3 x 10 two-degree cells over [82, 88] x [-10, 10]
    let target = GridGeometry::new(
        GridExtent::new_2d(0, 0, 2, 9).unwrap(),
        Anchor::CellCorner,
        std::sync::Arc::new(graticule::LinearTransform::scale_translate(
            &[2.0, 2.0],
            &[82.0, -10.0],
        )),
        Some(Crs::wgs84()),
    )
    .unwrap();

    let mut derivation = base.derive();
    derivation.subgrid_geometry(&target).unwrap();
    assert_eq!(derivation.subsampling().unwrap(), &[2, 2]);

    let derived = derivation.build().unwrap();
    let extent = derived.extent().unwrap();
    assert_eq!((extent.low(0), extent.high(0)), (1, 3));
    assert_eq!((extent.low(1), extent.high(1)), (-5, 4));
    assert_eq!(derived.resolution().unwrap(), &[2.0, 2.0]);
}

#[test]
fn test_subgrid_extent_intersects_directly() {
    let base = grids::geographic_grid();
    let other = GridExtent::new_2d(5, 0, 30, 200).unwrap();

    let mut derivation = base.derive();
    derivation.subgrid_extent(&other).unwrap();
    let derived = derivation.build().unwrap();
    let extent = derived.extent().unwrap();
    assert_eq!((extent.low(0), extent.high(0)), (5, 10));
    assert_eq!((extent.low(1), extent.high(1)), (0, 90));
    assert_envelope_eq(derived.envelope().unwrap(), &[85.0, 0.0], &[91.0, 91.0]);
}

#[test]
fn test_envelope_only_base_passes_request_through() {
    let domain = Envelope::new(&[0.0, 0.0], &[20.0, 40.0], Some(Crs::wgs84())).unwrap();
    let base = GridGeometry::from_envelope(domain).unwrap();
    let aoi = Envelope::new_2d(5.0, 10.0, 15.0, 30.0).unwrap();

    let mut derivation = base.derive();
    derivation.subgrid(&aoi, Some(&[0.5, 0.5])).unwrap();
    let derived = derivation.build().unwrap();

    assert!(!derived.is_defined(GridComponent::Extent));
    assert!(!derived.is_defined(GridComponent::GridToCrs));
    assert_envelope_eq(derived.envelope().unwrap(), &[5.0, 10.0], &[15.0, 30.0]);
    assert_eq!(derived.resolution().unwrap(), &[0.5, 0.5]);
}

#[test]
fn test_aoi_in_swapped_axis_order_is_reprojected() {
    let base = grids::geographic_grid();
    let lat_lon = Crs::new(
        "WGS 84 (lat/lon)",
        CoordinateSystem::new(
            CsKind::Ellipsoidal,
            vec![CsAxis::latitude(), CsAxis::longitude()],
        )
        .unwrap(),
    );
    // the same box as [82, 88] x [-10, 10], expressed in (lat, lon) order
    let aoi = Envelope::new(&[-10.0, 82.0], &[10.0, 88.0], Some(lat_lon)).unwrap();

    let mut derivation = base.derive();
    derivation.subgrid(&aoi, None).unwrap();
    let extent = derivation.build().unwrap().extent().unwrap().clone();
    assert_eq!((extent.low(0), extent.high(0)), (2, 7));
    assert_eq!((extent.low(1), extent.high(1)), (-10, 9));
}

#[test]
fn test_extra_aoi_dimensions_ignored_when_reprojecting() {
    let base = grids::geographic_grid();
    let lat_lon_height = Crs::new(
        "WGS 84 + height",
        CoordinateSystem::new(
            CsKind::Ellipsoidal,
            vec![
                CsAxis::latitude(),
                CsAxis::longitude(),
                CsAxis::linear("h", AxisDirection::Up),
            ],
        )
        .unwrap(),
    );
    // the swapped-axis box again, with a trailing height range the 2-D grid
    // has no counterpart for
    let aoi = Envelope::new(
        &[-10.0, 82.0, 0.0],
        &[10.0, 88.0, 100.0],
        Some(lat_lon_height),
    )
    .unwrap();

    let mut derivation = base.derive();
    derivation.subgrid(&aoi, None).unwrap();
    let extent = derivation.build().unwrap().extent().unwrap().clone();
    assert_eq!((extent.low(0), extent.high(0)), (2, 7));
    assert_eq!((extent.low(1), extent.high(1)), (-10, 9));
}
