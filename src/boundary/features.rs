//! GeoJSON polygon feature reading and writing.

use std::fs;
use std::path::Path;

use geo::{Geometry, MultiPolygon};
use geojson::{feature, Feature, FeatureCollection, GeoJson, JsonObject, Value};
use serde_json::Map;
use tracing::debug;

use crate::error::BoundaryLoadError;
use crate::projection::{reproject, Crs};

/// A polygonal feature reprojected to WGS84
#[derive(Debug, Clone)]
pub struct PolygonFeature {
    pub id: Option<feature::Id>,
    pub geometry: MultiPolygon<f64>,
    pub properties: JsonObject,
}

/// Read polygon features from a GeoJSON file
pub fn read_polygon_features(path: &Path) -> Result<Vec<PolygonFeature>, BoundaryLoadError> {
    let text = fs::read_to_string(path).map_err(|source| BoundaryLoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_polygon_features(&text, path)
}

/// Parse polygon features from GeoJSON text.
///
/// Non-polygonal features are skipped. A legacy `crs` member is honoured when
/// it names a supported CRS; otherwise RFC 7946 WGS84 is assumed.
pub fn parse_polygon_features(
    text: &str,
    path: &Path,
) -> Result<Vec<PolygonFeature>, BoundaryLoadError> {
    let parse_err = |reason: String| BoundaryLoadError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let geojson: GeoJson = text.parse().map_err(|e: geojson::Error| parse_err(e.to_string()))?;

    let (features, foreign_members) = match geojson {
        GeoJson::FeatureCollection(fc) => (fc.features, fc.foreign_members),
        GeoJson::Feature(f) => (vec![f], None),
        GeoJson::Geometry(g) => (vec![Feature::from(g)], None),
    };

    let crs = match declared_crs(foreign_members.as_ref()) {
        None => Crs::Wgs84,
        Some(name) => Crs::from_name(&name).ok_or_else(|| BoundaryLoadError::UnsupportedCrs {
            path: path.to_path_buf(),
            crs: name,
        })?,
    };

    let mut out = Vec::with_capacity(features.len());
    for (idx, feature) in features.into_iter().enumerate() {
        let Some(geometry) = feature.geometry else {
            debug!("Feature {} in {} has no geometry", idx, path.display());
            continue;
        };
        let geometry = Geometry::<f64>::try_from(geometry.value)
            .map_err(|e| parse_err(format!("feature {}: {}", idx, e)))?;

        let Some(polygons) = into_multi_polygon(geometry) else {
            debug!("Skipping non-polygon feature {} in {}", idx, path.display());
            continue;
        };

        out.push(PolygonFeature {
            id: feature.id,
            geometry: reproject(&polygons, crs, Crs::Wgs84),
            properties: feature.properties.unwrap_or_default(),
        });
    }

    Ok(out)
}

fn declared_crs(foreign_members: Option<&JsonObject>) -> Option<String> {
    foreign_members?
        .get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(str::to_string)
}

fn into_multi_polygon(geometry: Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geometry {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
        Geometry::MultiPolygon(mp) => Some(mp),
        Geometry::GeometryCollection(gc) => {
            let polygons: Vec<_> = gc
                .into_iter()
                .filter_map(into_multi_polygon)
                .flat_map(|mp| mp.0)
                .collect();
            (!polygons.is_empty()).then(|| MultiPolygon::new(polygons))
        }
        _ => None,
    }
}

/// Build a GeoJSON feature from a WGS84 multipolygon
pub fn polygon_feature(
    id: Option<feature::Id>,
    geometry: &MultiPolygon<f64>,
    properties: Map<String, serde_json::Value>,
) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(Value::from(geometry))),
        id,
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn feature_collection(features: Vec<Feature>) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
