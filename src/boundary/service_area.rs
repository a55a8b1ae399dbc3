//! Service area boundary loading.

use std::path::Path;

use tracing::info;

use super::read_polygon_features;
use crate::error::BoundaryLoadError;
use crate::models::ServiceArea;

/// Load the service area from a local GeoJSON file.
///
/// Any failure here is fatal for a run; there is no fallback source.
pub fn load_service_area(path: &Path) -> Result<ServiceArea, BoundaryLoadError> {
    info!("Loading service area from {}", path.display());

    let features = read_polygon_features(path)?;
    let area = ServiceArea::new(features.into_iter().map(|f| f.geometry).collect());

    if area.is_empty() {
        return Err(BoundaryLoadError::Empty(path.to_path_buf()));
    }

    info!("Service area has {} part(s)", area.parts.len());
    Ok(area)
}
