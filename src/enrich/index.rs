//! Spatial index for basin lookups by point.

use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rstar::{RTree, RTreeObject, AABB};
use tracing::debug;

/// Bounding box of one indexed polygon, keyed by its slot in the input
#[derive(Clone)]
struct IndexedPolygon {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedPolygon {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// R-tree over polygon bounding boxes with exact intersection refinement
pub struct BasinIndex<'a> {
    tree: RTree<IndexedPolygon>,
    geometries: Vec<&'a MultiPolygon<f64>>,
}

impl<'a> BasinIndex<'a> {
    /// Build from geometries; slot numbers follow iteration order
    pub fn build(geometries: impl IntoIterator<Item = &'a MultiPolygon<f64>>) -> Self {
        let geometries: Vec<&'a MultiPolygon<f64>> = geometries.into_iter().collect();

        let indexed: Vec<IndexedPolygon> = geometries
            .iter()
            .enumerate()
            .filter_map(|(slot, geometry)| {
                let rect = geometry.bounding_rect()?;
                Some(IndexedPolygon {
                    slot,
                    envelope: AABB::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                })
            })
            .collect();

        let tree = RTree::bulk_load(indexed);
        debug!("Basin index built with {} entries", tree.size());

        Self { tree, geometries }
    }

    /// Slots of all polygons intersecting the point, ascending.
    ///
    /// Points on a polygon boundary count as intersecting.
    pub fn lookup(&self, point: &Point<f64>) -> Vec<usize> {
        let query_envelope = AABB::from_point([point.x(), point.y()]);

        let mut slots: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&query_envelope)
            .filter(|ip| self.geometries[ip.slot].intersects(point))
            .map(|ip| ip.slot)
            .collect();
        slots.sort_unstable();
        slots
    }
}
