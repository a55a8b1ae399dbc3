//! CSV export of enriched site rows.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::models::Site;

/// File name of the enriched site table inside the output directory
pub const EXPORT_FILE_NAME: &str = "WTD_LTM_Gages_Modified.csv";

/// Output columns, in order
pub const EXPORT_COLUMNS: &[&str] = &[
    "site",
    "site_name",
    "parameter",
    "date installed",
    "latitude",
    "longitude",
    "WRIA",
    "basin",
    "WTD Service Area",
    "Intersect_Frac",
    "program",
    "notes",
    "Yearly Hours",
    "KM verified",
    "KM notes",
    "annual equipment cost",
    "WTD vs SWM",
];

fn text(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn flag(value: bool) -> String {
    let label = if value { "True" } else { "False" };
    label.to_string()
}

fn record(site: &Site) -> Vec<String> {
    vec![
        site.site.clone(),
        text(&site.site_name),
        site.parameter.as_str().unwrap_or_default().to_string(),
        text(&site.date_installed),
        site.latitude.to_string(),
        site.longitude.to_string(),
        text(&site.wria),
        text(&site.basin),
        flag(site.in_service_area),
        site.intersect_frac
            .map(|f| format!("{:.2}", f))
            .unwrap_or_default(),
        text(&site.program),
        text(&site.notes),
        text(&site.yearly_hours),
        text(&site.km_verified),
        text(&site.km_notes),
        text(&site.annual_equipment_cost),
        text(&site.wtd_vs_swm),
    ]
}

/// Write site rows as CSV to any writer
pub fn write_sites<W: Write>(sites: &[Site], writer: W) -> Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(EXPORT_COLUMNS)?;
    for site in sites {
        out.write_record(record(site))?;
    }
    out.flush()?;
    Ok(())
}

/// Write site rows to `path`, creating the parent directory
pub fn write_sites_csv(sites: &[Site], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file = fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_sites(sites, file).with_context(|| format!("Failed to write {}", path.display()))?;

    info!("Wrote {} site rows to {}", sites.len(), path.display());
    Ok(())
}
