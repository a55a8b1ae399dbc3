//! Site loader.
//!
//! Reads the monitoring-site workbook (first sheet) or a CSV export of it,
//! renames source columns to canonical names, keeps a fixed allow-list and
//! drops rows without usable coordinates.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{Duration, NaiveDate};
use csv::ReaderBuilder;
use hashbrown::HashMap;
use tracing::{debug, info, warn};

use crate::error::SiteLoadError;
use crate::models::{Parameter, Site};

/// Source header → canonical field name
const COLUMN_RENAMES: &[(&str, &str)] = &[
    ("SITE_CODE", "site"),
    ("SITE_NAME", "site_name"),
    ("DATE_INSTA", "date installed"),
    ("LAT", "latitude"),
    ("LON", "longitude"),
    ("GAGETAG", "parameter"),
    ("Program supporting", "program"),
    ("ISP site notes", "notes"),
];

/// The cost header carries a long explanatory note after this prefix
const EQUIPMENT_COST_PREFIX: &str = "Annual equipment cost";

/// Columns that survive loading, in output order
pub const SITE_COLUMNS: &[&str] = &[
    "site",
    "site_name",
    "parameter",
    "latitude",
    "longitude",
    "WRIA",
    "program",
    "notes",
    "Yearly Hours",
    "KM verified",
    "KM notes",
    "annual equipment cost",
    "date installed",
    "WTD vs SWM",
];

/// A raw cell from the site table
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(NaiveDate),
}

impl Cell {
    /// Render as a passthrough string, `None` for empty cells
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.is_empty() => None,
            Cell::Text(s) => Some(s.clone()),
            Cell::Number(n) => Some(format_number(*n)),
            Cell::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
            Cell::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
        }
    }

    /// Numeric value; text cells are parsed
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Float(f) => Cell::Number(*f),
            Data::Int(i) => Cell::Number(*i as f64),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTime(dt) => match excel_serial_to_date(dt.as_f64()) {
                Some(date) => Cell::Date(date),
                None => Cell::Number(dt.as_f64()),
            },
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Convert an Excel serial day number (1900 date system) to a date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::try_days(serial.floor() as i64)?)
}

/// Header row plus data rows, as read from the source file
#[derive(Debug, Clone, Default)]
pub struct SiteTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SiteTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self { headers, rows }
    }

    /// Read a workbook or CSV file, chosen by extension
    pub fn read(path: &Path) -> Result<Self, SiteLoadError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => Self::read_workbook(path),
            Some("csv") => Self::read_csv(path),
            _ => Err(SiteLoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    fn read_workbook(path: &Path) -> Result<Self, SiteLoadError> {
        let workbook_err = |reason: String| SiteLoadError::Workbook {
            path: path.to_path_buf(),
            reason,
        };

        let mut workbook = open_workbook_auto(path).map_err(|e| workbook_err(e.to_string()))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| SiteLoadError::EmptySheet(path.to_path_buf()))?
            .map_err(|e| workbook_err(e.to_string()))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .ok_or_else(|| SiteLoadError::EmptySheet(path.to_path_buf()))?
            .iter()
            .map(|d| Cell::from(d).as_text().unwrap_or_default())
            .collect();

        let rows = rows
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();

        Ok(Self { headers, rows })
    }

    fn read_csv(path: &Path) -> Result<Self, SiteLoadError> {
        let csv_err = |source: csv::Error| SiteLoadError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(path)
            .map_err(csv_err)?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(str::to_string)
            .collect();
        if headers.is_empty() {
            return Err(SiteLoadError::EmptySheet(path.to_path_buf()));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            rows.push(
                record
                    .iter()
                    .map(|v| {
                        if v.is_empty() {
                            Cell::Empty
                        } else {
                            Cell::Text(v.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(Self { headers, rows })
    }
}

/// Map a trimmed source header to its canonical name
fn canonical_name(header: &str) -> &str {
    let header = header.trim();
    if header.starts_with(EQUIPMENT_COST_PREFIX) {
        return "annual equipment cost";
    }
    COLUMN_RENAMES
        .iter()
        .find(|(from, _)| *from == header)
        .map(|(_, to)| *to)
        .unwrap_or(header)
}

/// Load sites from a workbook or CSV file
pub fn load_sites(path: &Path) -> Result<Vec<Site>, SiteLoadError> {
    info!("Loading sites from {}", path.display());
    let table = SiteTable::read(path)?;
    sites_from_table(table, path)
}

/// Convert a raw table into sites.
///
/// The last row is a footer in the source workbook and is always dropped.
pub fn sites_from_table(mut table: SiteTable, source: &Path) -> Result<Vec<Site>, SiteLoadError> {
    table.rows.pop();

    // canonical column -> source index, first occurrence wins
    let mut columns: HashMap<&'static str, usize> = HashMap::new();
    for (idx, header) in table.headers.iter().enumerate() {
        let name = canonical_name(header);
        if let Some(&allowed) = SITE_COLUMNS.iter().find(|c| **c == name) {
            columns.entry(allowed).or_insert(idx);
        } else {
            debug!("Discarding column '{}'", header.trim());
        }
    }

    let missing: Vec<String> = ["latitude", "longitude"]
        .iter()
        .filter(|c| !columns.contains_key(*c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SiteLoadError::Schema { missing });
    }

    let total_rows = table.rows.len();
    let mut sites = Vec::with_capacity(total_rows);

    for (row_idx, row) in table.rows.iter().enumerate() {
        let view = RowView {
            row,
            columns: &columns,
        };
        let text = |name: &str| view.cell(name).as_text();

        let (Some(lon), Some(lat)) = (
            coordinate(view.cell("longitude"), row_idx, "longitude"),
            coordinate(view.cell("latitude"), row_idx, "latitude"),
        ) else {
            continue;
        };

        if !(-180.0..=180.0).contains(&lon) || !(-90.0..=90.0).contains(&lat) {
            warn!(
                "Row {}: coordinates ({}, {}) are outside the WGS84 range",
                row_idx + 2,
                lon,
                lat
            );
        }

        let mut site = Site::new(text("site").unwrap_or_default(), lon, lat);
        site.site_name = text("site_name");
        site.parameter = text("parameter")
            .map(|p| Parameter::from_label(&p))
            .unwrap_or_default();
        site.wria = text("WRIA");
        site.program = text("program");
        site.notes = text("notes");
        site.yearly_hours = text("Yearly Hours");
        site.km_verified = text("KM verified");
        site.km_notes = text("KM notes");
        site.annual_equipment_cost = text("annual equipment cost");
        site.date_installed = text("date installed");
        site.wtd_vs_swm = text("WTD vs SWM");

        sites.push(site);
    }

    info!(
        "Loaded {} sites from {} ({} rows without coordinates dropped)",
        sites.len(),
        source.display(),
        total_rows - sites.len()
    );

    Ok(sites)
}

static EMPTY_CELL: Cell = Cell::Empty;

/// One data row addressed by canonical column name
struct RowView<'a> {
    row: &'a [Cell],
    columns: &'a HashMap<&'static str, usize>,
}

impl<'a> RowView<'a> {
    fn cell(&self, name: &str) -> &'a Cell {
        self.columns
            .get(name)
            .and_then(|&idx| self.row.get(idx))
            .unwrap_or(&EMPTY_CELL)
    }
}

fn coordinate(cell: &Cell, row_idx: usize, column: &str) -> Option<f64> {
    if cell.is_empty() {
        return None;
    }
    match cell.as_f64().filter(|v| v.is_finite()) {
        Some(v) => Some(v),
        None => {
            // +2: header row and 1-based numbering
            warn!("Row {}: unreadable {} {:?}", row_idx + 2, column, cell);
            None
        }
    }
}
