//! Boundary provider.
//!
//! Supplies the service-area polygons from a local file and the basin layer
//! from a local cache or the remote open-data service.

mod basins;
mod features;
mod service_area;

pub use basins::{basins_from_features, BasinLoad, BasinProvider};
pub use features::{
    feature_collection, parse_polygon_features, polygon_feature, read_polygon_features,
    PolygonFeature,
};
pub use service_area::load_service_area;
