//! Periodic-axis (antimeridian) range reconciliation.
//!
//! Values one full period apart on a wraparound axis denote the same
//! location, so a region of interest may be expressed a whole number of
//! periods away from the grid domain, and either range may straddle the
//! period boundary. This module shifts the region of interest into the
//! domain's frame before any interval comparison takes place.

use tracing::trace;

use crate::envelope::Envelope;
use crate::error::Result;

/// Length of the overlap between two closed intervals, negative when they
/// are apart.
fn overlap(a0: f64, a1: f64, b0: f64, b1: f64) -> f64 {
    a1.min(b1) - a0.max(b0)
}

/// Shift the region of interest onto the domain's periodic frame.
///
/// The result has the domain's dimension count and CRS: extra AOI dimensions
/// are dropped, missing ones become unconstrained (`NaN`). For every axis
/// with a wraparound period, both ranges are first unwrapped to a linear
/// frame (a straddling range `[low > high]` becomes `[low, high + period]`,
/// which joins the two boundary segments back into one contiguous interval),
/// then the candidate shifts `{0, +period, -period}` are applied to the AOI
/// range and the one with the largest overlap wins; ties prefer no shift.
///
/// An axis where no candidate yields any overlap is left unshifted — the
/// subsequent interval intersection reports it as the disjoint dimension.
pub fn resolve(aoi: &Envelope, domain: &Envelope) -> Result<Envelope> {
    let n = domain.dimension();
    let mut lower = vec![f64::NAN; n];
    let mut upper = vec![f64::NAN; n];
    for d in 0..n.min(aoi.dimension()) {
        let mut a0 = aoi.lower(d);
        let mut a1 = aoi.upper(d);
        if a0.is_nan() || a1.is_nan() {
            lower[d] = a0;
            upper[d] = a1;
            continue;
        }
        if let Some(period) = domain.period(d) {
            // unwrap straddling ranges into a contiguous linear interval
            if a0 > a1 {
                a1 += period;
            }
            let d0 = domain.lower(d);
            let mut d1 = domain.upper(d);
            if d0 > d1 {
                d1 += period;
            }
            if !(d0.is_nan() || d1.is_nan()) {
                let mut best_shift = 0.0;
                let mut best_overlap = f64::NEG_INFINITY;
                for shift in [0.0, period, -period] {
                    let o = overlap(a0 + shift, a1 + shift, d0, d1);
                    if o > best_overlap {
                        best_overlap = o;
                        best_shift = shift;
                    }
                }
                if best_overlap > 0.0 && best_shift != 0.0 {
                    trace!(
                        dimension = d,
                        shift = best_shift,
                        "wraparound shift applied to region of interest"
                    );
                    a0 += best_shift;
                    a1 += best_shift;
                }
                // when no candidate overlaps the range stays unshifted and
                // the subsequent intersection reports this dimension as
                // disjoint
            }
        }
        lower[d] = a0;
        upper[d] = a1;
    }
    let mut resolved = Envelope::new(&lower, &upper, None)?;
    resolved.set_crs(domain.crs().cloned());
    Ok(resolved)
}

/// Unwrap a domain envelope into its linear frame: a straddling range
/// `[low > high]` becomes `[low, high + period]`. Ranges produced by
/// [`resolve`] compare correctly against the result with plain interval
/// arithmetic.
pub fn unwrap_domain(domain: &Envelope) -> Envelope {
    let mut out = domain.clone();
    for d in 0..domain.dimension() {
        if domain.is_wrapped(d) {
            let period = domain.period(d).unwrap_or(0.0);
            out.set_range(d, domain.lower(d), domain.upper(d) + period);
        }
    }
    out
}
