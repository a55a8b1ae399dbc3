//! Map layer construction.

use geo::Rect;
use geojson::{feature, FeatureCollection};
use serde_json::{Map, Value};

use super::MapKind;
use crate::boundary::{feature_collection, polygon_feature};
use crate::models::{BasinOverlap, Parameter, ServiceArea, Site};

/// Rough centre of King County, used when there is nothing to centre on
const DEFAULT_CENTER: (f64, f64) = (47.47, -121.84);
const DEFAULT_ZOOM: u8 = 10;

/// Program layers on the ISP map, with their colours
pub const ISP_PROGRAMS: &[(&str, &str)] = &[
    ("Sites Supporting ISP, WQBE and WQI", "#F58427"),
    ("Sites Supporting WQI and other programs", "#D5C12A"),
    ("SWM Funded ISP Site", "#23AFA5"),
];

const STREAM_GAGE_COLOR: &str = "#00A5E2";
const RAIN_GAGE_COLOR: &str = "#66c597";
const BASIN_FILL: &str = "#20B2AA";

/// Marker colour for a monitored parameter
pub fn parameter_color(parameter: &Parameter) -> &'static str {
    match parameter {
        Parameter::Discharge => "#00A5E3",
        Parameter::WaterTemperature => "#E77577",
        Parameter::Precipitation => "#8DD7BF",
        Parameter::Other(_) | Parameter::Unset => "gray",
    }
}

/// Leaflet path style for a polygon layer
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonStyle {
    pub color: &'static str,
    pub fill_color: &'static str,
    pub weight: u32,
    pub fill_opacity: f64,
    pub dash_array: Option<&'static str>,
}

/// A GeoJSON overlay
#[derive(Debug, Clone)]
pub struct PolygonLayer {
    pub name: String,
    pub tooltip: String,
    pub show: bool,
    pub style: PolygonStyle,
    pub features: FeatureCollection,
}

/// A group of circle markers sharing one colour
#[derive(Debug, Clone)]
pub struct SiteLayer<'a> {
    pub name: String,
    pub color: &'static str,
    pub radius: u32,
    pub show: bool,
    pub sites: Vec<&'a Site>,
}

/// Everything needed to write one map page
#[derive(Debug, Clone)]
pub struct MapDocument<'a> {
    pub kind: MapKind,
    pub title: String,
    /// (lat, lon)
    pub center: (f64, f64),
    pub zoom: u8,
    pub polygon_layers: Vec<PolygonLayer>,
    pub site_layers: Vec<SiteLayer<'a>>,
    /// Legend colour for the service-area outline
    pub outline_color: &'static str,
}

/// Build the layers for one map kind.
///
/// Inputs are read-only; partitions with no sites produce no layer.
pub fn build_map<'a>(
    kind: MapKind,
    sites: &'a [Site],
    service_area: &ServiceArea,
    basins: &[BasinOverlap],
) -> MapDocument<'a> {
    let site_bounds = site_bounds(sites);
    let (center, outline_color) = match kind {
        MapKind::Service => (
            center_of(service_area.bounds().or(site_bounds)),
            "#FFBF65",
        ),
        MapKind::Isp | MapKind::Parameter => (
            center_of(site_bounds.or(service_area.bounds())),
            "#efcb91",
        ),
    };

    let mut polygon_layers = Vec::new();
    if !service_area.is_empty() {
        polygon_layers.push(service_area_layer(service_area, outline_color));
    }
    if kind == MapKind::Service && !basins.is_empty() {
        polygon_layers.push(basin_layer(basins));
    }

    let site_layers = match kind {
        MapKind::Service => service_site_layers(sites),
        MapKind::Isp => isp_site_layers(sites),
        MapKind::Parameter => parameter_site_layers(sites),
    };

    MapDocument {
        kind,
        title: kind.title().to_string(),
        center,
        zoom: DEFAULT_ZOOM,
        polygon_layers,
        site_layers: site_layers
            .into_iter()
            .filter(|layer| !layer.sites.is_empty())
            .collect(),
        outline_color,
    }
}

fn site_bounds(sites: &[Site]) -> Option<Rect<f64>> {
    let first = sites.first()?;
    let (mut min_x, mut min_y) = (first.longitude, first.latitude);
    let (mut max_x, mut max_y) = (min_x, min_y);
    for site in sites {
        min_x = min_x.min(site.longitude);
        min_y = min_y.min(site.latitude);
        max_x = max_x.max(site.longitude);
        max_y = max_y.max(site.latitude);
    }
    Some(Rect::new((min_x, min_y), (max_x, max_y)))
}

fn center_of(bounds: Option<Rect<f64>>) -> (f64, f64) {
    bounds
        .map(|r| {
            let c = r.center();
            (c.y, c.x)
        })
        .unwrap_or(DEFAULT_CENTER)
}

fn service_area_layer(service_area: &ServiceArea, color: &'static str) -> PolygonLayer {
    let features = service_area
        .parts
        .iter()
        .map(|part| polygon_feature(None, part, Map::new()))
        .collect();

    PolygonLayer {
        name: "WTD Service Area".to_string(),
        tooltip: "WTD Service Area Boundary".to_string(),
        show: true,
        style: PolygonStyle {
            color,
            fill_color: "transparent",
            weight: 3,
            fill_opacity: 0.0,
            dash_array: Some("10, 5"),
        },
        features: feature_collection(features),
    }
}

fn basin_layer(basins: &[BasinOverlap]) -> PolygonLayer {
    let features = basins
        .iter()
        .map(|o| {
            let mut properties = o.basin.properties.clone();
            properties.insert(
                "basin".to_string(),
                o.basin.name.clone().map(Value::String).unwrap_or(Value::Null),
            );
            properties.insert("intersect_frac".to_string(), Value::from(o.intersect_frac));
            polygon_feature(
                Some(feature::Id::Number(o.basin.id.into())),
                &o.basin.geometry,
                properties,
            )
        })
        .collect();

    PolygonLayer {
        name: "WTD Basins".to_string(),
        tooltip: "WTD Basins".to_string(),
        show: false,
        style: PolygonStyle {
            color: "black",
            fill_color: BASIN_FILL,
            weight: 1,
            fill_opacity: 0.5,
            dash_array: None,
        },
        features: feature_collection(features),
    }
}

fn site_layer<'a>(
    name: &str,
    color: &'static str,
    radius: u32,
    sites: impl Iterator<Item = &'a Site>,
) -> SiteLayer<'a> {
    SiteLayer {
        name: name.to_string(),
        color,
        radius,
        show: true,
        sites: sites.collect(),
    }
}

/// Agency-operated sites, split into stream (discharge) and rain gages
fn service_site_layers(sites: &[Site]) -> Vec<SiteLayer<'_>> {
    let operated = || {
        sites
            .iter()
            .filter(|s| s.wtd_vs_swm.as_deref() == Some("WTD"))
    };
    vec![
        site_layer(
            "Stream Gage Sites",
            STREAM_GAGE_COLOR,
            6,
            operated().filter(|s| s.parameter == Parameter::Discharge),
        ),
        site_layer(
            "Rain Gage Sites",
            RAIN_GAGE_COLOR,
            6,
            operated().filter(|s| s.parameter != Parameter::Discharge),
        ),
    ]
}

fn isp_site_layers(sites: &[Site]) -> Vec<SiteLayer<'_>> {
    ISP_PROGRAMS
        .iter()
        .map(|&(program, color)| {
            site_layer(
                program,
                color,
                5,
                sites
                    .iter()
                    .filter(move |s| s.program.as_deref() == Some(program)),
            )
        })
        .collect()
}

fn parameter_site_layers(sites: &[Site]) -> Vec<SiteLayer<'_>> {
    let known = [
        ("Discharge", Parameter::Discharge),
        ("Water Temperature", Parameter::WaterTemperature),
        ("Precipitation", Parameter::Precipitation),
    ];

    let mut layers: Vec<SiteLayer<'_>> = known
        .iter()
        .map(|(name, parameter)| {
            site_layer(
                name,
                parameter_color(parameter),
                6,
                sites.iter().filter(|s| s.parameter == *parameter),
            )
        })
        .collect();

    layers.push(site_layer(
        "Other Parameters",
        parameter_color(&Parameter::Unset),
        6,
        sites.iter().filter(|s| {
            matches!(s.parameter, Parameter::Other(_) | Parameter::Unset)
        }),
    ));
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Basin;
    use geo::{polygon, MultiPolygon};

    fn site(code: &str, parameter: Parameter, operator: &str, program: Option<&str>) -> Site {
        let mut s = Site::new(code, -122.0, 47.5);
        s.parameter = parameter;
        s.wtd_vs_swm = Some(operator.to_string());
        s.program = program.map(str::to_string);
        s
    }

    fn area() -> ServiceArea {
        ServiceArea::new(vec![MultiPolygon::new(vec![polygon![
            (x: -122.4, y: 47.2), (x: -121.6, y: 47.2), (x: -121.6, y: 47.8), (x: -122.4, y: 47.2)
        ]])])
    }

    fn layer_names(doc: &MapDocument<'_>) -> Vec<String> {
        doc.site_layers.iter().map(|l| l.name.clone()).collect()
    }

    #[test]
    fn test_service_map_partitions() {
        let sites = vec![
            site("a", Parameter::Discharge, "WTD", None),
            site("b", Parameter::Precipitation, "WTD", None),
            site("c", Parameter::Discharge, "SWM", None),
        ];
        let doc = build_map(MapKind::Service, &sites, &area(), &[]);
        assert_eq!(layer_names(&doc), vec!["Stream Gage Sites", "Rain Gage Sites"]);
        assert_eq!(doc.site_layers[0].sites.len(), 1);
        assert_eq!(doc.site_layers[0].sites[0].site, "a");
        assert_eq!(doc.site_layers[1].sites[0].site, "b");
        // Centred on the service area bounds
        assert!((doc.center.0 - 47.5).abs() < 1e-9);
        assert!((doc.center.1 + 122.0).abs() < 1e-9);
    }

    #[test]
    fn test_isp_map_skips_empty_programs_and_basins() {
        let sites = vec![
            site("a", Parameter::Discharge, "WTD", Some("SWM Funded ISP Site")),
            site("b", Parameter::Discharge, "WTD", Some("Other")),
        ];
        let basins = vec![BasinOverlap {
            basin: Basin::new(1, None, area().parts[0].clone()),
            intersect_area: 1.0,
            basin_area: 1.0,
            intersect_frac: 1.0,
        }];
        let doc = build_map(MapKind::Isp, &sites, &area(), &basins);
        assert_eq!(layer_names(&doc), vec!["SWM Funded ISP Site"]);
        assert_eq!(doc.site_layers[0].color, "#23AFA5");
        assert_eq!(doc.polygon_layers.len(), 1);
        assert_eq!(doc.polygon_layers[0].name, "WTD Service Area");
    }

    #[test]
    fn test_service_map_includes_hidden_basins() {
        let basins = vec![BasinOverlap {
            basin: Basin::new(1, Some("Bear Creek".into()), area().parts[0].clone()),
            intersect_area: 1.0,
            basin_area: 1.0,
            intersect_frac: 1.0,
        }];
        let doc = build_map(MapKind::Service, &[], &area(), &basins);
        let basin_layer = &doc.polygon_layers[1];
        assert!(!basin_layer.show);
        let props = basin_layer.features.features[0].properties.as_ref().unwrap();
        assert_eq!(props["basin"], "Bear Creek");
        assert_eq!(props["intersect_frac"], 1.0);
        assert!(doc.site_layers.is_empty());
    }

    #[test]
    fn test_parameter_colors() {
        assert_eq!(parameter_color(&Parameter::Discharge), "#00A5E3");
        assert_eq!(parameter_color(&Parameter::WaterTemperature), "#E77577");
        assert_eq!(parameter_color(&Parameter::Precipitation), "#8DD7BF");
        assert_eq!(parameter_color(&Parameter::Other("x".into())), "gray");

        let sites = vec![
            site("a", Parameter::Other("stage".into()), "WTD", None),
            site("b", Parameter::Unset, "WTD", None),
        ];
        let doc = build_map(MapKind::Parameter, &sites, &ServiceArea::default(), &[]);
        assert_eq!(layer_names(&doc), vec!["Other Parameters"]);
        assert_eq!(doc.site_layers[0].sites.len(), 2);
        assert!(doc.polygon_layers.is_empty());
    }

    #[test]
    fn test_empty_inputs_use_default_center() {
        let doc = build_map(MapKind::Isp, &[], &ServiceArea::default(), &[]);
        assert_eq!(doc.center, DEFAULT_CENTER);
    }
}
