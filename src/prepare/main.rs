//! Site preparation pipeline.
//!
//! Loads the monitoring site table, joins it to watershed basins, flags
//! sites inside the service area, and writes maps plus an enriched CSV.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use wtd_sites::boundary::{load_service_area, BasinLoad, BasinProvider};
use wtd_sites::enrich::{assign_basins, service_area_basins};
use wtd_sites::export::{write_sites_csv, EXPORT_FILE_NAME};
use wtd_sites::render::{build_map, capture, write_map, MapKind, SnapshotPaths};
use wtd_sites::sites::load_sites;
use wtd_sites::Config;

#[derive(Parser, Debug)]
#[command(name = "prepare")]
#[command(about = "Enrich monitoring sites with basin and service-area membership")]
struct Args {
    /// TOML config file; every value has a default
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Site workbook (.xlsx) or CSV export
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Service area boundary (GeoJSON)
    #[arg(long)]
    service_area: Option<PathBuf>,

    /// Watershed cache file, downloaded when missing
    #[arg(long)]
    basin_cache: Option<PathBuf>,

    /// Watershed feature service query URL
    #[arg(long)]
    basin_url: Option<String>,

    /// Directory for maps and the enriched CSV
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Minimum basin overlap fraction with the service area
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Maps to render
    #[arg(long, value_enum, value_delimiter = ',')]
    maps: Option<Vec<MapKind>>,

    /// Snapshot window width in pixels
    #[arg(long)]
    window_width: Option<u32>,

    /// Snapshot window height in pixels
    #[arg(long)]
    window_height: Option<u32>,

    /// Headless browser used for PNG/PDF snapshots
    #[arg(long)]
    browser: Option<String>,

    /// Skip PNG/PDF snapshots
    #[arg(long)]
    no_snapshot: bool,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load_from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(v) = self.input {
            config.paths.input = v;
        }
        if let Some(v) = self.service_area {
            config.paths.service_area = v;
        }
        if let Some(v) = self.basin_cache {
            config.paths.basin_cache = v;
        }
        if let Some(v) = self.output_dir {
            config.paths.output_dir = v;
        }
        if let Some(v) = self.basin_url {
            config.basins.url = v;
        }
        if let Some(v) = self.threshold {
            config.basins.overlap_threshold = v;
        }
        if let Some(v) = self.maps {
            config.render.maps = v;
        }
        if let Some(v) = self.window_width {
            config.render.window_width = v;
        }
        if let Some(v) = self.window_height {
            config.render.window_height = v;
        }
        if let Some(v) = self.browser {
            config.render.browser = v;
        }
        if self.no_snapshot {
            config.render.snapshot = false;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Args::parse().into_config()?;
    run(&config)
}

fn run(config: &Config) -> Result<()> {
    let sites = load_sites(&config.paths.input)
        .with_context(|| format!("Failed to load sites from {}", config.paths.input.display()))?;

    let service_area = load_service_area(&config.paths.service_area).with_context(|| {
        format!(
            "Failed to load service area from {}",
            config.paths.service_area.display()
        )
    })?;

    let basins = BasinProvider::new(&config.paths.basin_cache, &config.basins.url)
        .load()
        .context("Failed to load watershed basins")?;
    if let BasinLoad::Unavailable(_) = &basins {
        warn!("Continuing without basins; no site will be flagged");
    }
    let basins = basins.into_basins();

    let joined = assign_basins(sites, &basins);
    let enrichment = service_area_basins(
        joined,
        &basins,
        &service_area,
        config.basins.overlap_threshold,
    );

    let mut rendered = Vec::with_capacity(config.render.maps.len());
    for kind in &config.render.maps {
        let paths = SnapshotPaths::for_stem(&config.paths.output_dir, kind.file_stem());
        let doc = build_map(*kind, &enrichment.sites, &service_area, &enrichment.basins);
        write_map(&doc, &paths.html)?;
        rendered.push(paths);
    }

    write_sites_csv(&enrichment.sites, &config.output_path(EXPORT_FILE_NAME))?;

    if config.render.snapshot {
        let window = (config.render.window_width, config.render.window_height);
        for paths in &rendered {
            if let Err(e) = capture(&config.render.browser, paths, window) {
                warn!("Snapshot of {} failed: {:#}", paths.html.display(), e);
            }
        }
    }

    info!(
        "Processed {} site rows, {} in service area; retained {} basins",
        enrichment.sites.len(),
        enrichment.sites.iter().filter(|s| s.in_service_area).count(),
        enrichment.basins.len()
    );
    Ok(())
}
