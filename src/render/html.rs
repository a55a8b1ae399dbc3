//! Leaflet HTML output.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::info;

use super::{MapDocument, PolygonLayer, SiteLayer};
use crate::models::Site;

const LEAFLET_VERSION: &str = "1.9.4";

const BASE_LAYERS: &[(&str, &str, &str)] = &[
    (
        "Simple Carto",
        "https://{s}.basemaps.cartocdn.com/light_all/{z}/{x}/{y}{r}.png",
        "&copy; OpenStreetMap contributors &copy; CARTO",
    ),
    (
        "Street Map",
        "https://tile.openstreetmap.org/{z}/{x}/{y}.png",
        "&copy; OpenStreetMap contributors",
    ),
    (
        "Satellite",
        "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
        "Esri",
    ),
];

/// Escape text for use inside HTML element content or attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// JSON that is safe to embed inside a `<script>` element
fn script_json(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

fn popup_html(site: &Site) -> String {
    let field = |v: &Option<String>| escape_html(v.as_deref().unwrap_or("N/A"));
    format!(
        "<b>Site: {}</b><br>Site Name: {}<br>Parameter: {}<br>WRIA: {}<br>Program: {}<br>Notes: {}",
        escape_html(&site.site),
        field(&site.site_name),
        escape_html(&site.parameter.to_string()),
        field(&site.wria),
        field(&site.program),
        escape_html(site.notes.as_deref().unwrap_or("")),
    )
}

fn polygon_layer_js(out: &mut String, layer: &PolygonLayer) -> Result<()> {
    let style = json!({
        "color": layer.style.color,
        "fillColor": layer.style.fill_color,
        "weight": layer.style.weight,
        "fillOpacity": layer.style.fill_opacity,
        "dashArray": layer.style.dash_array,
    });
    let features = serde_json::to_value(&layer.features)?;

    writeln!(
        out,
        "  addOverlay({}, L.geoJSON({}, {{style: function () {{ return {}; }}}}).bindTooltip({}), {});",
        script_json(&json!(layer.name)),
        script_json(&features),
        script_json(&style),
        script_json(&json!(layer.tooltip)),
        layer.show
    )?;
    Ok(())
}

fn site_layer_js(out: &mut String, layer: &SiteLayer<'_>) -> Result<()> {
    let markers: Vec<serde_json::Value> = layer
        .sites
        .iter()
        .map(|s| {
            let tooltip = format!("{} {}", s.site, s.site_name.as_deref().unwrap_or(""));
            json!({
                "lat": s.latitude,
                "lon": s.longitude,
                "popup": popup_html(s),
                "tooltip": tooltip.trim_end(),
            })
        })
        .collect();

    writeln!(
        out,
        "  addOverlay({}, siteLayer({}, {}, {}), {});",
        script_json(&json!(layer.name)),
        script_json(&serde_json::Value::Array(markers)),
        script_json(&json!(layer.color)),
        layer.radius,
        layer.show
    )?;
    Ok(())
}

fn legend_html(doc: &MapDocument<'_>) -> Result<String> {
    let mut out = String::new();
    write!(
        out,
        "<div id=\"map-legend\" class=\"legend\"><h4>{}</h4>",
        escape_html(&doc.title)
    )?;
    for layer in &doc.site_layers {
        write!(
            out,
            "<div><span class=\"dot\" style=\"background-color: {};\"></span>{}</div>",
            layer.color,
            escape_html(&layer.name)
        )?;
    }
    if doc
        .polygon_layers
        .iter()
        .any(|l| l.name == "WTD Service Area")
    {
        write!(
            out,
            "<hr><div><span class=\"dash\" style=\"border-top-color: {};\"></span>WTD Service Area</div>",
            doc.outline_color
        )?;
    }
    out.push_str("</div>");
    Ok(out)
}

/// Render a map document as a standalone Leaflet page
pub fn render_html(doc: &MapDocument<'_>) -> Result<String> {
    let mut script = String::new();

    writeln!(
        script,
        "  var map = L.map('map', {{zoomControl: true, scrollWheelZoom: true, doubleClickZoom: true}}).setView([{}, {}], {});",
        doc.center.0, doc.center.1, doc.zoom
    )?;
    script.push_str("  var baseLayers = {};\n");
    for (idx, (name, url, attribution)) in BASE_LAYERS.iter().enumerate() {
        writeln!(
            script,
            "  baseLayers[{}] = L.tileLayer({}, {{attribution: {}}}){};",
            script_json(&json!(name)),
            script_json(&json!(url)),
            script_json(&json!(attribution)),
            if idx == 0 { ".addTo(map)" } else { "" }
        )?;
    }
    script.push_str(
        "  var overlays = {};\n\
         \x20 function addOverlay(name, layer, show) { overlays[name] = layer; if (show) { layer.addTo(map); } }\n\
         \x20 function siteLayer(markers, color, radius) {\n\
         \x20   return L.layerGroup(markers.map(function (m) {\n\
         \x20     return L.circleMarker([m.lat, m.lon], {radius: radius, color: color, fillColor: color, fillOpacity: 1, weight: 0})\n\
         \x20       .bindPopup(m.popup, {maxWidth: 300}).bindTooltip(m.tooltip);\n\
         \x20   }));\n\
         \x20 }\n",
    );

    for layer in &doc.polygon_layers {
        polygon_layer_js(&mut script, layer)?;
    }
    for layer in &doc.site_layers {
        site_layer_js(&mut script, layer)?;
    }
    script.push_str("  L.control.layers(baseLayers, overlays, {collapsed: false}).addTo(map);\n");

    let mut html = String::new();
    write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1.0">
<title>{title}</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@{v}/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@{v}/dist/leaflet.js"></script>
<style>
html, body, #map {{ height: 100%; width: 100%; margin: 0; padding: 0; }}
.legend {{ position: fixed; bottom: 10px; left: 10px; width: 250px; background-color: white;
  opacity: 0.9; border: 2px solid grey; border-radius: 5px; padding: 10px; font-size: 14px;
  z-index: 9999; box-shadow: 2px 2px 6px rgba(0,0,0,0.3); }}
.legend h4 {{ margin: 0 0 10px 0; font-size: 16px; }}
.legend div {{ margin: 5px 0; }}
.legend .dot {{ display: inline-block; width: 12px; height: 12px; border-radius: 50%; margin-right: 8px; }}
.legend .dash {{ display: inline-block; width: 20px; height: 0; border-top: 3px dashed; margin-right: 8px; vertical-align: middle; }}
.legend hr {{ border: none; border-top: 3px solid #74737A; margin: 5px 0; }}
</style>
</head>
<body>
<div id="map"></div>
{legend}
<script>
{script}</script>
</body>
</html>
"#,
        title = escape_html(&doc.title),
        v = LEAFLET_VERSION,
        legend = legend_html(doc)?,
        script = script,
    )?;

    Ok(html)
}

/// Render and write a map page, creating the parent directory
pub fn write_map(doc: &MapDocument<'_>, path: &Path) -> Result<()> {
    let html = render_html(doc)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, html).with_context(|| format!("Failed to write {}", path.display()))?;
    info!("Wrote {} map to {}", doc.kind, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Parameter, ServiceArea};
    use crate::render::{build_map, MapKind};
    use geo::{polygon, MultiPolygon};

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"A&B's"</b>"#),
            "&lt;b&gt;&quot;A&amp;B&#39;s&quot;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_script_json_cannot_close_script() {
        let value = json!("</script><script>alert(1)</script>");
        assert!(!script_json(&value).contains("</script>"));
    }

    #[test]
    fn test_render_contains_layers_and_popups() {
        let mut site = Site::new("03G", -122.2, 47.7);
        site.site_name = Some("Juanita <Creek>".to_string());
        site.parameter = Parameter::Discharge;
        site.wtd_vs_swm = Some("WTD".to_string());
        let sites = vec![site];

        let doc = build_map(MapKind::Service, &sites, &ServiceArea::default(), &[]);
        let html = render_html(&doc).unwrap();

        assert!(html.contains("Stream Gage Sites"));
        assert!(html.contains("#00A5E2"));
        assert!(html.contains("Juanita &lt;Creek&gt;"));
        assert!(html.contains("L.control.layers"));
        assert!(html.contains("</head>"));
        assert!(!html.contains("Rain Gage Sites"));
    }

    #[test]
    fn test_legend_lists_layers_and_outline() {
        let mut site = Site::new("31N", -122.0, 47.5);
        site.parameter = Parameter::Precipitation;
        site.wtd_vs_swm = Some("WTD".to_string());
        let sites = vec![site];
        let area = ServiceArea::new(vec![MultiPolygon::new(vec![polygon![
            (x: -122.4, y: 47.2), (x: -121.6, y: 47.2), (x: -121.6, y: 47.8), (x: -122.4, y: 47.2)
        ]])]);

        let doc = build_map(MapKind::Service, &sites, &area, &[]);
        let legend = legend_html(&doc).unwrap();
        assert!(legend.starts_with("<div id=\"map-legend\" class=\"legend\"><h4>"));
        assert!(legend.contains("background-color: #66c597;\"></span>Rain Gage Sites</div>"));
        assert!(!legend.contains("Stream Gage Sites"));
        assert!(legend.contains("border-top-color: #FFBF65;"));
        assert!(legend.ends_with("WTD Service Area</div></div>"));

        let doc = build_map(MapKind::Service, &sites, &ServiceArea::default(), &[]);
        assert!(!legend_html(&doc).unwrap().contains("dash"));
    }

    #[test]
    fn test_write_map_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("isp_map.html");
        let doc = build_map(MapKind::Isp, &[], &ServiceArea::default(), &[]);
        write_map(&doc, &path).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("<!DOCTYPE html>"));
    }
}
