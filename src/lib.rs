//! wtd-sites - monitoring site preparation for the wastewater treatment service area
//!
//! This library provides the site loader, boundary providers, spatial
//! enrichment, map rendering and CSV export used by the `prepare` binary.

pub mod boundary;
pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod models;
pub mod projection;
pub mod render;
pub mod sites;

pub use config::Config;
pub use enrich::{enrich, Enrichment};
pub use models::{Basin, BasinOverlap, Parameter, ServiceArea, Site};
