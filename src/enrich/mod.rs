//! Spatial enrichment of sites against watershed basins.
//!
//! 1. Join each site to every basin its point intersects.
//! 2. Compute each basin's overlap fraction with the service area.
//! 3. Keep basins at or above the threshold that contain at least one site.
//! 4. Flag each site by membership in a kept basin and carry its fraction.

mod index;
mod overlap;

use geo::Intersects;
use tracing::info;

pub use index::BasinIndex;
pub use overlap::{compute_overlaps, round2, union_service_area, AREA_CRS};

use crate::models::{Basin, BasinOverlap, ServiceArea, Site};

/// Result of enriching a site set
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    /// Basins that passed both filters
    pub basins: Vec<BasinOverlap>,
    /// Joined and flagged site rows
    pub sites: Vec<Site>,
}

/// Spatial left join of sites to basins.
///
/// A site inside several basins yields one row per basin, ordered by basin
/// id. A site inside none keeps a single row with no basin.
pub fn assign_basins(sites: Vec<Site>, basins: &[Basin]) -> Vec<Site> {
    let index = BasinIndex::build(basins.iter().map(|b| &b.geometry));
    let mut joined = Vec::with_capacity(sites.len());
    let mut fan_out = 0usize;

    for site in sites {
        let mut hits: Vec<&Basin> = index
            .lookup(&site.point())
            .into_iter()
            .map(|slot| &basins[slot])
            .collect();
        hits.sort_by_key(|b| b.id);

        match hits.as_slice() {
            [] => joined.push(Site {
                basin: None,
                basin_id: None,
                ..site
            }),
            [only] => joined.push(Site {
                basin: only.name.clone(),
                basin_id: Some(only.id),
                ..site
            }),
            many => {
                fan_out += many.len() - 1;
                for basin in many {
                    joined.push(Site {
                        basin: basin.name.clone(),
                        basin_id: Some(basin.id),
                        ..site.clone()
                    });
                }
            }
        }
    }

    if fan_out > 0 {
        info!("{} extra rows from sites inside overlapping basins", fan_out);
    }
    joined
}

/// Keep basins whose fraction meets the threshold and that contain a site
pub fn filter_basins(
    overlaps: Vec<BasinOverlap>,
    threshold: f64,
    sites: &[Site],
) -> Vec<BasinOverlap> {
    overlaps
        .into_iter()
        .filter(|o| o.intersect_frac >= threshold)
        .filter(|o| sites.iter().any(|s| o.basin.geometry.intersects(&s.point())))
        .collect()
}

/// Set the service-area flag and overlap fraction on each site row.
///
/// When a site lies in several kept basins, the largest fraction wins and
/// ties go to the lowest basin id.
pub fn flag_sites(sites: &mut [Site], kept: &[BasinOverlap]) {
    let index = BasinIndex::build(kept.iter().map(|o| &o.basin.geometry));

    for site in sites.iter_mut() {
        let best = best_basin(index.lookup(&site.point()).into_iter().map(|slot| &kept[slot]));
        site.in_service_area = best.is_some();
        site.intersect_frac = best.map(|o| o.intersect_frac);
    }
}

/// Largest fraction first, then lowest basin id
fn best_basin<'a>(candidates: impl Iterator<Item = &'a BasinOverlap>) -> Option<&'a BasinOverlap> {
    candidates.max_by(|a, b| {
        a.intersect_frac
            .total_cmp(&b.intersect_frac)
            .then_with(|| b.basin.id.cmp(&a.basin.id))
    })
}

/// Filter basins to the service area and flag sites accordingly.
///
/// `sites` are expected to have been through [`assign_basins`].
pub fn service_area_basins(
    mut sites: Vec<Site>,
    basins: &[Basin],
    service_area: &ServiceArea,
    threshold: f64,
) -> Enrichment {
    let overlaps = compute_overlaps(basins, service_area);
    let kept = filter_basins(overlaps, threshold, &sites);
    flag_sites(&mut sites, &kept);

    info!(
        "{} of {} basins kept at overlap >= {:.2}; {} of {} site rows in service area",
        kept.len(),
        basins.len(),
        threshold,
        sites.iter().filter(|s| s.in_service_area).count(),
        sites.len()
    );

    Enrichment { basins: kept, sites }
}

/// Run the full enrichment: basin join, then service-area filtering
pub fn enrich(
    sites: Vec<Site>,
    basins: &[Basin],
    service_area: &ServiceArea,
    threshold: f64,
) -> Enrichment {
    let joined = assign_basins(sites, basins);
    service_area_basins(joined, basins, service_area, threshold)
}
