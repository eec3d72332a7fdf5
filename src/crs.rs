//! Coordinate reference system model.
//!
//! This is deliberately a flat value model: a [`CoordinateSystem`] carries a
//! [`CsKind`] tag and its axes, and a static lookup table maps each kind to
//! the predicate its axes must satisfy. There is no class hierarchy and no
//! virtual dispatch.
//!
//! A [`Crs`] additionally owns a small per-instance cache of variants derived
//! for an [`AxesConvention`], so the first caller computes a derived CRS and
//! later callers (including callers asking for a different convention that
//! yields an equal result) share the same instance.

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{GridError, Result};

/// Direction of a coordinate-system axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisDirection {
    East,
    West,
    North,
    South,
    Up,
    Down,
    Future,
    Past,
    Other,
}

impl AxisDirection {
    /// The direction with positive sign on the same axis, e.g. `West -> East`.
    pub fn absolute(self) -> AxisDirection {
        match self {
            AxisDirection::West => AxisDirection::East,
            AxisDirection::South => AxisDirection::North,
            AxisDirection::Down => AxisDirection::Up,
            AxisDirection::Past => AxisDirection::Future,
            other => other,
        }
    }

    /// True if this direction is the negative of its [`absolute`](Self::absolute) form.
    pub fn is_opposite(self) -> bool {
        self != self.absolute()
    }
}

/// One axis of a coordinate system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsAxis {
    /// Axis abbreviation, e.g. "lon", "x", "t".
    pub abbreviation: String,
    /// Direction of increasing coordinate values.
    pub direction: AxisDirection,
    /// Scale factor from this axis' unit to the base unit of its kind
    /// (degrees for ellipsoidal axes, metres for cartesian/vertical ones).
    pub unit_scale: f64,
    /// Valid coordinate range, if bounded.
    pub range: Option<(f64, f64)>,
    /// Full-turn period for wraparound axes (e.g. 360 for longitude),
    /// in axis units.
    pub period: Option<f64>,
}

impl CsAxis {
    /// A longitude axis in degrees, range [-180, 180], period 360.
    pub fn longitude() -> Self {
        CsAxis {
            abbreviation: "lon".to_string(),
            direction: AxisDirection::East,
            unit_scale: 1.0,
            range: Some((-180.0, 180.0)),
            period: Some(360.0),
        }
    }

    /// A latitude axis in degrees, range [-90, 90].
    pub fn latitude() -> Self {
        CsAxis {
            abbreviation: "lat".to_string(),
            direction: AxisDirection::North,
            unit_scale: 1.0,
            range: Some((-90.0, 90.0)),
            period: None,
        }
    }

    /// A linear axis with the given abbreviation and direction, in metres.
    pub fn linear(abbreviation: &str, direction: AxisDirection) -> Self {
        CsAxis {
            abbreviation: abbreviation.to_string(),
            direction,
            unit_scale: 1.0,
            range: None,
            period: None,
        }
    }
}

/// Kind tag of a coordinate system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsKind {
    /// Geodetic longitude/latitude (optionally ellipsoidal height)
    Ellipsoidal,
    /// Orthogonal linear axes
    Cartesian,
    /// Single height/depth axis
    Vertical,
    /// Single time axis
    Temporal,
}

type AxisPredicate = fn(&CsAxis) -> bool;

/// Allowed-direction/unit predicate per coordinate-system kind.
static AXIS_RULES: Lazy<HashMap<CsKind, AxisPredicate>> = Lazy::new(|| {
    let mut rules: HashMap<CsKind, AxisPredicate> = HashMap::new();
    rules.insert(CsKind::Ellipsoidal, |axis| {
        matches!(
            axis.direction.absolute(),
            AxisDirection::East | AxisDirection::North | AxisDirection::Up
        ) && axis.unit_scale > 0.0
    });
    rules.insert(CsKind::Cartesian, |axis| {
        axis.direction != AxisDirection::Future
            && axis.direction != AxisDirection::Past
            && axis.unit_scale > 0.0
    });
    rules.insert(CsKind::Vertical, |axis| {
        matches!(axis.direction, AxisDirection::Up | AxisDirection::Down) && axis.unit_scale > 0.0
    });
    rules.insert(CsKind::Temporal, |axis| {
        matches!(axis.direction, AxisDirection::Future | AxisDirection::Past)
            && axis.unit_scale > 0.0
    });
    rules
});

/// A coordinate system: a kind tag plus its axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinateSystem {
    kind: CsKind,
    axes: Vec<CsAxis>,
}

impl CoordinateSystem {
    /// Create a coordinate system, validating every axis against the
    /// kind's predicate.
    pub fn new(kind: CsKind, axes: Vec<CsAxis>) -> Result<Self> {
        if axes.is_empty() {
            return Err(GridError::invalid("coordinate system must have at least one axis"));
        }
        let rule = AXIS_RULES
            .get(&kind)
            .ok_or_else(|| GridError::invalid(format!("unknown coordinate-system kind {:?}", kind)))?;
        for axis in &axes {
            if !rule(axis) {
                return Err(GridError::invalid(format!(
                    "axis '{}' ({:?}) is not allowed in a {:?} coordinate system",
                    axis.abbreviation, axis.direction, kind
                )));
            }
        }
        Ok(Self { kind, axes })
    }

    /// Kind tag.
    pub fn kind(&self) -> CsKind {
        self.kind
    }

    /// Number of axes.
    pub fn dimension(&self) -> usize {
        self.axes.len()
    }

    /// Axis at the given index.
    pub fn axis(&self, dim: usize) -> &CsAxis {
        &self.axes[dim]
    }

    /// All axes.
    pub fn axes(&self) -> &[CsAxis] {
        &self.axes
    }
}

/// Conventions for which a derived CRS variant can be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxesConvention {
    /// Axes reordered/flipped to (east, north, up, future) order with
    /// positive directions.
    RightHanded,
    /// Right-handed plus base units (scale 1) on every axis.
    Normalized,
    /// Wraparound axes shifted to a positive range, e.g. longitude [0, 360].
    PositiveRange,
}

impl AxesConvention {
    pub(crate) const COUNT: usize = 3;

    pub(crate) fn index(self) -> usize {
        match self {
            AxesConvention::RightHanded => 0,
            AxesConvention::Normalized => 1,
            AxesConvention::PositiveRange => 2,
        }
    }
}

type ConventionCache = [Option<Arc<Crs>>; AxesConvention::COUNT];

/// A coordinate reference system: a name bound to a [`CoordinateSystem`].
#[derive(Debug, Serialize, Deserialize)]
pub struct Crs {
    name: String,
    cs: CoordinateSystem,
    #[serde(skip)]
    derived: Arc<Mutex<ConventionCache>>,
}

impl Clone for Crs {
    fn clone(&self) -> Self {
        // clones are the same logical instance and share the cache
        Crs {
            name: self.name.clone(),
            cs: self.cs.clone(),
            derived: Arc::clone(&self.derived),
        }
    }
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.cs == other.cs
    }
}

impl Crs {
    /// Create a CRS from a name and a validated coordinate system.
    pub fn new(name: impl Into<String>, cs: CoordinateSystem) -> Self {
        Crs {
            name: name.into(),
            cs,
            derived: Arc::new(Mutex::new(Default::default())),
        }
    }

    /// The WGS 84 geographic CRS with (longitude, latitude) axis order.
    pub fn wgs84() -> Self {
        // built directly: both axes satisfy the ellipsoidal predicate
        let cs = CoordinateSystem {
            kind: CsKind::Ellipsoidal,
            axes: vec![CsAxis::longitude(), CsAxis::latitude()],
        };
        Crs::new("WGS 84", cs)
    }

    /// An engineering (local cartesian) CRS with the given number of axes.
    pub fn engineering(name: impl Into<String>, dimension: usize) -> Result<Self> {
        let directions = [
            AxisDirection::East,
            AxisDirection::North,
            AxisDirection::Up,
            AxisDirection::Other,
        ];
        let axes = (0..dimension)
            .map(|d| {
                CsAxis::linear(
                    &format!("x{}", d),
                    *directions.get(d).unwrap_or(&AxisDirection::Other),
                )
            })
            .collect();
        Ok(Crs::new(name, CoordinateSystem::new(CsKind::Cartesian, axes)?))
    }

    /// CRS name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying coordinate system.
    pub fn cs(&self) -> &CoordinateSystem {
        &self.cs
    }

    /// Number of dimensions.
    pub fn dimension(&self) -> usize {
        self.cs.dimension()
    }

    /// Wraparound period of the given axis in axis units, if periodic.
    pub fn period(&self, dim: usize) -> Option<f64> {
        if dim < self.cs.dimension() {
            self.cs.axis(dim).period
        } else {
            None
        }
    }

    /// Return this CRS adapted to the given axes convention.
    ///
    /// Results are memoized per instance: the first caller computes, later
    /// callers reuse. After each fill an equality pass runs over the cache so
    /// conventions yielding equal results share one instance.
    pub fn for_convention(&self, convention: AxesConvention) -> Arc<Crs> {
        let mut cache = self.derived.lock();
        if let Some(hit) = &cache[convention.index()] {
            return Arc::clone(hit);
        }
        let candidate = self.apply_convention(convention);
        let shared = cache
            .iter()
            .flatten()
            .find(|cached| ***cached == candidate)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(candidate));
        cache[convention.index()] = Some(Arc::clone(&shared));
        shared
    }

    fn apply_convention(&self, convention: AxesConvention) -> Crs {
        let mut axes = self.cs.axes.clone();
        match convention {
            AxesConvention::RightHanded | AxesConvention::Normalized => {
                for axis in &mut axes {
                    axis.direction = axis.direction.absolute();
                    if convention == AxesConvention::Normalized {
                        axis.unit_scale = 1.0;
                    }
                }
                // (north, east) axis order becomes (east, north)
                if axes.len() >= 2
                    && axes[0].direction == AxisDirection::North
                    && axes[1].direction == AxisDirection::East
                {
                    axes.swap(0, 1);
                }
            }
            AxesConvention::PositiveRange => {
                for axis in &mut axes {
                    if let Some(period) = axis.period {
                        axis.range = Some((0.0, period));
                    }
                }
            }
        }
        Crs {
            name: self.name.clone(),
            cs: CoordinateSystem {
                kind: self.cs.kind,
                axes,
            },
            derived: Arc::new(Mutex::new(Default::default())),
        }
    }
}
