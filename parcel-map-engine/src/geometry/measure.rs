use constants::validation::SQUARE_METERS_PER_HECTARE;
use geo::{GeodesicArea, HaversineLength, LineString, Polygon};

/// Great-circle length of a line in metres.
pub fn line_length_meters(line: &LineString<f64>) -> f64 {
    line.haversine_length()
}

/// Geodesic area of a polygon in hectares, holes excluded.
pub fn area_hectares(polygon: &Polygon<f64>) -> f64 {
    polygon.geodesic_area_unsigned() / SQUARE_METERS_PER_HECTARE
}
