//! Watershed basin and service area polygons.

use geo::{BoundingRect, MultiPolygon, Rect};
use serde_json::{Map, Value};

/// A single watershed basin polygon with metadata
#[derive(Debug, Clone, PartialEq)]
pub struct Basin {
    /// Primary key (`OBJECTID` in the source layer)
    pub id: i64,
    /// Basin name (`STUDY_UNIT` in the source layer)
    pub name: Option<String>,
    /// WGS84 geometry
    pub geometry: MultiPolygon<f64>,
    /// Remaining source attributes, carried through to the cache and map
    pub properties: Map<String, Value>,
}

impl Basin {
    pub fn new(id: i64, name: Option<String>, geometry: MultiPolygon<f64>) -> Self {
        Self {
            id,
            name,
            geometry,
            properties: Map::new(),
        }
    }
}

/// A basin that passed the overlap filter, with its area figures.
///
/// Areas are in square US survey feet (EPSG:2285); `basin.geometry` stays WGS84.
#[derive(Debug, Clone, PartialEq)]
pub struct BasinOverlap {
    pub basin: Basin,
    pub intersect_area: f64,
    pub basin_area: f64,
    /// `intersect_area / basin_area`, rounded to 2 decimals, in [0, 1]
    pub intersect_frac: f64,
}

/// The operating agency's jurisdiction, one entry per source feature
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServiceArea {
    pub parts: Vec<MultiPolygon<f64>>,
}

impl ServiceArea {
    pub fn new(parts: Vec<MultiPolygon<f64>>) -> Self {
        Self { parts }
    }

    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|mp| mp.0.is_empty())
    }

    /// Combined bounding box of all parts
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.parts
            .iter()
            .filter_map(|mp| mp.bounding_rect())
            .reduce(|a, b| {
                Rect::new(
                    (a.min().x.min(b.min().x), a.min().y.min(b.min().y)),
                    (a.max().x.max(b.max().x), a.max().y.max(b.max().y)),
                )
            })
    }
}
