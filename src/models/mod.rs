//! Core data models for the site enrichment pipeline.

pub mod basin;
pub mod site;

pub use basin::{Basin, BasinOverlap, ServiceArea};
pub use site::{Parameter, Site};
