//! Geometry types and the pure checks run on user-drawn shapes.
//!
//! Shapes travel over the wire as GeoJSON (`types`); checks and measurements
//! convert them to `geo` primitives first.

/// Geodesic length and area helpers.
pub mod measure;

/// GeoJSON-shaped geometry, features and collections.
pub mod types;

/// Split line and edited polygon acceptance rules.
pub mod validation;

pub use measure::{area_hectares, line_length_meters};
pub use types::{Bounds, Feature, FeatureCollection, Geometry, Position, RecordId};
pub use validation::{
    SplitCrossing, SplitLineRejection, validate_edited_polygon, validate_split_line,
};
