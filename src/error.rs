//! Error taxonomy for the site preparation pipeline.
//!
//! Schema and boundary failures abort a run. Basin fetch failures are
//! recoverable and surface through [`crate::boundary::BasinLoad::Unavailable`].

use std::path::PathBuf;

use thiserror::Error;

/// Failures while reading the site workbook
#[derive(Debug, Error)]
pub enum SiteLoadError {
    /// Required coordinate columns are missing after renaming
    #[error("site table is missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("failed to read workbook {path}: {reason}")]
    Workbook { path: PathBuf, reason: String },

    #[error("failed to read CSV {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{0} has no header row")]
    EmptySheet(PathBuf),

    #[error("unsupported site table format: {0}")]
    UnsupportedFormat(PathBuf),
}

/// Failures while loading local boundary polygons
#[derive(Debug, Error)]
pub enum BoundaryLoadError {
    #[error("failed to read boundary file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse boundary file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("boundary file {path} uses unsupported CRS {crs}")]
    UnsupportedCrs { path: PathBuf, crs: String },

    #[error("boundary file {0} contains no polygons")]
    Empty(PathBuf),
}

/// Failures while fetching or caching the remote basin layer
#[derive(Debug, Error)]
pub enum BasinFetchError {
    #[error("basin request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid basin service URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("basin service returned HTTP {0}")]
    Status(u16),

    #[error("failed to parse basin response: {0}")]
    Parse(String),

    #[error("failed to write basin cache {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Invalid or unreadable run configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
