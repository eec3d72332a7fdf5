//! Coordinate operation lookup between reference systems.
//!
//! The [`TransformFactory`] trait is the seam through which a full
//! coordinate-operation engine plugs in. The built-in
//! [`DefaultTransformFactory`] resolves the structural cases only: identity,
//! axis reordering and direction flips, and unit rescaling between
//! coordinate systems of the same kind. Ranges differing by a whole period
//! (e.g. longitudes [0, 360] vs [-180, 180]) need no operation here; they
//! are reconciled downstream by wraparound resolution.

use std::fmt;
use std::sync::Arc;

use super::{LinearTransform, MathTransform};
use crate::crs::Crs;
use crate::error::{GridError, Result};

/// A resolved operation between two reference systems.
#[derive(Debug, Clone)]
pub struct CoordinateOperation {
    source: Crs,
    target: Crs,
    math: Arc<dyn MathTransform>,
}

impl CoordinateOperation {
    /// Create an operation from its parts.
    pub fn new(source: Crs, target: Crs, math: Arc<dyn MathTransform>) -> Self {
        Self { source, target, math }
    }

    /// Source CRS.
    pub fn source(&self) -> &Crs {
        &self.source
    }

    /// Target CRS.
    pub fn target(&self) -> &Crs {
        &self.target
    }

    /// The coordinate transform realizing this operation.
    pub fn math_transform(&self) -> &Arc<dyn MathTransform> {
        &self.math
    }
}

/// Supplier of coordinate operations between CRSs.
pub trait TransformFactory: fmt::Debug {
    /// Find an operation from `source` to `target`, failing with
    /// [`GridError::Factory`] when no path exists.
    fn find_operation(&self, source: &Crs, target: &Crs) -> Result<CoordinateOperation>;
}

/// The built-in structural factory.
#[derive(Debug, Default, Clone)]
pub struct DefaultTransformFactory;

impl TransformFactory for DefaultTransformFactory {
    fn find_operation(&self, source: &Crs, target: &Crs) -> Result<CoordinateOperation> {
        if source == target {
            let identity: Arc<dyn MathTransform> =
                Arc::new(LinearTransform::identity(source.dimension()));
            return Ok(CoordinateOperation::new(source.clone(), target.clone(), identity));
        }
        if source.cs().kind() != target.cs().kind() {
            return Err(no_path(source, target, "coordinate-system kinds differ"));
        }
        if source.dimension() != target.dimension() {
            return Err(no_path(source, target, "dimension counts differ"));
        }
        let n = source.dimension();
        // match every target axis to the unique source axis pointing the
        // same (absolute) way
        let mut elements = vec![0.0; (n + 1) * (n + 1)];
        let mut used = vec![false; n];
        for (t, target_axis) in target.cs().axes().iter().enumerate() {
            let wanted = target_axis.direction.absolute();
            let mut found = None;
            for (s, source_axis) in source.cs().axes().iter().enumerate() {
                if used[s] || source_axis.direction.absolute() != wanted {
                    continue;
                }
                if found.is_some() {
                    return Err(no_path(source, target, "ambiguous axis correspondence"));
                }
                found = Some(s);
            }
            let s = found.ok_or_else(|| {
                no_path(
                    source,
                    target,
                    &format!("no source axis matches target axis '{}'", target_axis.abbreviation),
                )
            })?;
            used[s] = true;
            let source_axis = source.cs().axis(s);
            let mut factor = source_axis.unit_scale / target_axis.unit_scale;
            if source_axis.direction.is_opposite() != target_axis.direction.is_opposite() {
                factor = -factor;
            }
            elements[t * (n + 1) + s] = factor;
        }
        elements[n * (n + 1) + n] = 1.0;
        let math: Arc<dyn MathTransform> =
            Arc::new(LinearTransform::from_matrix(n, n, &elements)?);
        Ok(CoordinateOperation::new(source.clone(), target.clone(), math))
    }
}

fn no_path(source: &Crs, target: &Crs, message: &str) -> GridError {
    GridError::Factory {
        source_crs: source.name().to_string(),
        target_crs: target.name().to_string(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::{AxisDirection, CoordinateSystem, CsAxis, CsKind};

    fn lat_lon_crs() -> Crs {
        let cs = CoordinateSystem::new(
            CsKind::Ellipsoidal,
            vec![CsAxis::latitude(), CsAxis::longitude()],
        )
        .unwrap();
        Crs::new("WGS 84 (lat/lon)", cs)
    }

    #[test]
    fn test_identity_operation() {
        let factory = DefaultTransformFactory;
        let op = factory.find_operation(&Crs::wgs84(), &Crs::wgs84()).unwrap();
        assert!(op.math_transform().is_identity());
    }

    #[test]
    fn test_axis_swap() {
        let factory = DefaultTransformFactory;
        let op = factory.find_operation(&lat_lon_crs(), &Crs::wgs84()).unwrap();
        let out = op.math_transform().transform(&[45.0, 120.0]).unwrap();
        // (lat, lon) -> (lon, lat)
        assert_eq!(out, vec![120.0, 45.0]);
    }

    #[test]
    fn test_direction_flip_and_unit_scale() {
        let south_km = Crs::new(
            "south-up km",
            CoordinateSystem::new(
                CsKind::Cartesian,
                vec![
                    CsAxis {
                        abbreviation: "x".to_string(),
                        direction: AxisDirection::East,
                        unit_scale: 1000.0,
                        range: None,
                        period: None,
                    },
                    CsAxis {
                        abbreviation: "y".to_string(),
                        direction: AxisDirection::South,
                        unit_scale: 1000.0,
                        range: None,
                        period: None,
                    },
                ],
            )
            .unwrap(),
        );
        let north_m = Crs::engineering("north-up m", 2).unwrap();
        let factory = DefaultTransformFactory;
        let op = factory.find_operation(&south_km, &north_m).unwrap();
        let out = op.math_transform().transform(&[1.0, 2.0]).unwrap();
        assert_eq!(out, vec![1000.0, -2000.0]);
    }

    #[test]
    fn test_no_path_between_kinds() {
        let factory = DefaultTransformFactory;
        let err = factory
            .find_operation(&Crs::wgs84(), &Crs::engineering("local", 2).unwrap())
            .unwrap_err();
        assert!(matches!(err, GridError::Factory { .. }));
    }
}
