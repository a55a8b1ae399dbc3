//! Map rendering.
//!
//! Builds layered map documents from enrichment output and writes them as
//! Leaflet HTML pages, with optional static PNG/PDF captures.

mod html;
mod layers;
mod snapshot;

use serde::Deserialize;

pub use html::{escape_html, render_html, write_map};
pub use layers::{
    build_map, parameter_color, MapDocument, PolygonLayer, PolygonStyle, SiteLayer,
    ISP_PROGRAMS,
};
pub use snapshot::{capture, static_variant, SnapshotPaths};

/// Which map to produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MapKind {
    /// Gage sites operated by the agency, with the kept basins
    Service,
    /// Sites grouped by supporting program
    Isp,
    /// All sites coloured by monitored parameter
    Parameter,
}

impl MapKind {
    /// Output file stem, e.g. `wtd_map`
    pub fn file_stem(&self) -> &'static str {
        match self {
            MapKind::Service => "wtd_map",
            MapKind::Isp => "isp_map",
            MapKind::Parameter => "parameter_map",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            MapKind::Service => "WTD Sites",
            MapKind::Isp => "ISP Sites",
            MapKind::Parameter => "Sites by Parameter",
        }
    }
}

impl std::fmt::Display for MapKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MapKind::Service => write!(f, "service"),
            MapKind::Isp => write!(f, "isp"),
            MapKind::Parameter => write!(f, "parameter"),
        }
    }
}
