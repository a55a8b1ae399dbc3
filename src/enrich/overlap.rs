//! Basin / service-area overlap fractions.

use geo::{Area, BooleanOps, MultiPolygon};
use tracing::{debug, warn};

use crate::models::{Basin, BasinOverlap, ServiceArea};
use crate::projection::{reproject, Crs};

/// Projected CRS used for area math
pub const AREA_CRS: Crs = Crs::WashingtonNorth;

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Union all service-area parts into one geometry in `crs`
pub fn union_service_area(service_area: &ServiceArea, crs: Crs) -> MultiPolygon<f64> {
    let mut parts = service_area
        .parts
        .iter()
        .map(|part| reproject(part, Crs::Wgs84, crs));

    let Some(first) = parts.next() else {
        return MultiPolygon::new(vec![]);
    };
    parts.fold(first, |acc, part| acc.union(&part))
}

/// Compute area figures for every basin against the unioned service area.
///
/// Output order matches `basins`. A zero-area basin gets a fraction of 0.
pub fn compute_overlaps(basins: &[Basin], service_area: &ServiceArea) -> Vec<BasinOverlap> {
    let union = union_service_area(service_area, AREA_CRS);
    debug!(
        "Service area union: {} polygon(s), {:.0} sq ft",
        union.0.len(),
        union.unsigned_area()
    );

    basins
        .iter()
        .map(|basin| {
            let projected = reproject(&basin.geometry, Crs::Wgs84, AREA_CRS);
            let basin_area = projected.unsigned_area();
            let intersect_area = projected.intersection(&union).unsigned_area();

            let intersect_frac = if basin_area > 0.0 {
                round2((intersect_area / basin_area).clamp(0.0, 1.0))
            } else {
                warn!("Basin {} has zero area", basin.id);
                0.0
            };

            BasinOverlap {
                basin: basin.clone(),
                intersect_area,
                basin_area,
                intersect_frac,
            }
        })
        .collect()
}
