//! Monitoring site record.

use geo::Point;

/// Monitored parameter of a site.
///
/// Upstream labels outside the known mapping are kept verbatim in `Other`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Parameter {
    Discharge,
    WaterTemperature,
    Precipitation,
    Other(String),
    #[default]
    Unset,
}

impl Parameter {
    /// Normalize a raw `GAGETAG` label
    pub fn from_label(raw: &str) -> Self {
        match raw.trim() {
            "" => Parameter::Unset,
            "Stream Gauge(Recording with Discharge)" | "discharge" => Parameter::Discharge,
            "Water Temperature Recorder" | "water_temperature" => Parameter::WaterTemperature,
            "Precipitation Gauge(Recording)" | "precipitation" => Parameter::Precipitation,
            // Passed through untrimmed so the upstream label is reported as-is
            _ => Parameter::Other(raw.to_string()),
        }
    }

    /// Canonical label, `None` when unset
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::Discharge => Some("discharge"),
            Parameter::WaterTemperature => Some("water_temperature"),
            Parameter::Precipitation => Some("precipitation"),
            Parameter::Other(label) => Some(label.as_str()),
            Parameter::Unset => None,
        }
    }
}

impl std::fmt::Display for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().unwrap_or("N/A"))
    }
}

/// A monitoring site with validated WGS84 coordinates.
///
/// The last four fields are assigned by enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct Site {
    /// Site code (`SITE_CODE`)
    pub site: String,
    pub site_name: Option<String>,
    pub parameter: Parameter,
    pub longitude: f64,
    pub latitude: f64,

    /// Watershed resource inventory area code
    pub wria: Option<String>,
    /// Funding / monitoring program
    pub program: Option<String>,
    pub notes: Option<String>,
    pub yearly_hours: Option<String>,
    pub km_verified: Option<String>,
    pub km_notes: Option<String>,
    pub annual_equipment_cost: Option<String>,
    /// ISO date when the source cell was a date
    pub date_installed: Option<String>,
    /// Operating agency tag ("WTD" or "SWM")
    pub wtd_vs_swm: Option<String>,

    /// Name of the basin joined to this row
    pub basin: Option<String>,
    pub basin_id: Option<i64>,
    pub in_service_area: bool,
    pub intersect_frac: Option<f64>,
}

impl Site {
    pub fn new(site: impl Into<String>, longitude: f64, latitude: f64) -> Self {
        Self {
            site: site.into(),
            site_name: None,
            parameter: Parameter::Unset,
            longitude,
            latitude,
            wria: None,
            program: None,
            notes: None,
            yearly_hours: None,
            km_verified: None,
            km_notes: None,
            annual_equipment_cost: None,
            date_installed: None,
            wtd_vs_swm: None,
            basin: None,
            basin_id: None,
            in_service_area: false,
            intersect_frac: None,
        }
    }

    /// Point geometry (x = longitude, y = latitude)
    pub fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}
