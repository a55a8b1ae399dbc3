//! Run configuration.
//!
//! Every field has a default so a config file only needs the values it
//! changes; the `prepare` binary applies CLI overrides on top.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;
use crate::render::MapKind;

/// King County Open Data watershed layer, all fields, GeoJSON output
pub const DEFAULT_BASIN_URL: &str = "https://gisdata.kingcounty.gov/arcgis/rest/services/OpenDataPortal/enviro___base/MapServer/237/query";

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub basins: BasinConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    /// Site workbook (.xlsx) or CSV export
    pub input: PathBuf,
    pub service_area: PathBuf,
    pub basin_cache: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("data/WTD_LTM_Gages.xlsx"),
            service_area: PathBuf::from("gis/WTD_service_area.geojson"),
            basin_cache: PathBuf::from("gis/watersheds.geojson"),
            output_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct BasinConfig {
    pub url: String,
    /// Minimum fraction of a basin's area inside the service area
    pub overlap_threshold: f64,
}

impl Default for BasinConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_BASIN_URL.to_string(),
            overlap_threshold: 0.10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderConfig {
    pub maps: Vec<MapKind>,
    pub window_width: u32,
    pub window_height: u32,
    /// Capture PNG/PDF snapshots with a headless browser
    pub snapshot: bool,
    pub browser: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            maps: vec![MapKind::Service, MapKind::Isp],
            window_width: 729,
            window_height: 943,
            snapshot: true,
            browser: "chromium".to_string(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = self.basins.overlap_threshold;
        if !t.is_finite() || !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::Invalid(format!(
                "overlap_threshold must be within [0, 1], got {}",
                t
            )));
        }
        if self.render.window_width == 0 || self.render.window_height == 0 {
            return Err(ConfigError::Invalid(
                "map window size must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of an artifact inside the output directory
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.paths.output_dir.join(file_name)
    }
}
