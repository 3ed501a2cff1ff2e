use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// `[longitude, latitude]` in WGS84, GeoJSON order.
pub type Position = [f64; 2];

/// Identifier of a backend record. The backend mixes integer and string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Number(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl RecordId {
    /// Read an id out of a loose JSON value (number or string).
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Number),
            Value::String(s) if !s.is_empty() => Some(Self::Text(s.clone())),
            _ => None,
        }
    }
}

/// GeoJSON geometry subset the engine works with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: Position },
    LineString { coordinates: Vec<Position> },
    Polygon { coordinates: Vec<Vec<Position>> },
}

impl Geometry {
    pub fn polygon(outer: Vec<Position>) -> Self {
        Self::Polygon {
            coordinates: vec![outer],
        }
    }

    pub fn line(coordinates: Vec<Position>) -> Self {
        Self::LineString { coordinates }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Point { .. } => "Point",
            Self::LineString { .. } => "LineString",
            Self::Polygon { .. } => "Polygon",
        }
    }

    /// Outer ring of a polygon geometry.
    pub fn outer_ring(&self) -> Option<&[Position]> {
        match self {
            Self::Polygon { coordinates } => coordinates.first().map(Vec::as_slice),
            _ => None,
        }
    }

    pub fn to_geo_polygon(&self) -> Option<geo::Polygon<f64>> {
        let Self::Polygon { coordinates } = self else {
            return None;
        };
        let mut rings = coordinates.iter().map(|ring| to_line_string(ring));
        let exterior = rings.next()?;
        Some(geo::Polygon::new(exterior, rings.collect()))
    }

    pub fn to_geo_line(&self) -> Option<geo::LineString<f64>> {
        match self {
            Self::LineString { coordinates } => Some(to_line_string(coordinates)),
            _ => None,
        }
    }

    pub fn to_geo_point(&self) -> Option<geo::Point<f64>> {
        match self {
            Self::Point { coordinates } => Some(geo::Point::new(coordinates[0], coordinates[1])),
            _ => None,
        }
    }
}

fn to_line_string(positions: &[Position]) -> geo::LineString<f64> {
    geo::LineString::from(
        positions
            .iter()
            .map(|[x, y]| geo::Coord { x: *x, y: *y })
            .collect::<Vec<_>>(),
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureType {
    #[default]
    Feature,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionType {
    #[default]
    FeatureCollection,
}

/// GeoJSON feature with free-form properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default)]
    pub kind: FeatureType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub geometry: Geometry,
    #[serde(default, deserialize_with = "nullable_properties")]
    pub properties: Map<String, Value>,
}

impl Feature {
    pub fn new(geometry: Geometry) -> Self {
        Self {
            kind: FeatureType::Feature,
            id: None,
            geometry,
            properties: Map::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<RecordId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// Record id, taken from the feature id or from an `id` property.
    pub fn record_id(&self) -> Option<RecordId> {
        self.id
            .clone()
            .or_else(|| self.properties.get("id").and_then(RecordId::from_value))
    }

    pub fn string_property(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn number_property(&self, key: &str) -> Option<f64> {
        match self.properties.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

fn nullable_properties<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type", default)]
    pub kind: CollectionType,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>) -> Self {
        Self {
            kind: CollectionType::FeatureCollection,
            features,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn find(&self, id: &RecordId) -> Option<&Feature> {
        self.features
            .iter()
            .find(|f| f.record_id().as_ref() == Some(id))
    }
}

/// Viewport bounds in degrees, as an object with `west`, `south`, `east`
/// and `north` keys.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_use_named_edges() {
        let bounds: Bounds = serde_json::from_value(serde_json::json!({
            "west": 7.9, "south": 49.9, "east": 8.1, "north": 50.1
        }))
        .unwrap();
        assert_eq!(bounds.east, 8.1);
        assert!(serde_json::from_value::<Bounds>(serde_json::json!([7.9, 49.9, 8.1, 50.1])).is_err());
    }

    #[test]
    fn feature_accepts_null_properties_and_property_id() {
        let feature: Feature = serde_json::from_str(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[8.0,50.0]},"properties":null}"#,
        )
        .unwrap();
        assert!(feature.properties.is_empty());
        assert_eq!(feature.record_id(), None);

        let feature: Feature = serde_json::from_str(
            r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[8.0,50.0]},"properties":{"id":"b7"}}"#,
        )
        .unwrap();
        assert_eq!(feature.record_id(), Some(RecordId::from("b7")));
    }

    #[test]
    fn polygon_converts_with_holes() {
        let geometry = Geometry::Polygon {
            coordinates: vec![
                vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0], [0.0, 0.0]],
                vec![[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 1.0]],
            ],
        };
        let polygon = geometry.to_geo_polygon().unwrap();
        assert_eq!(polygon.exterior().0.len(), 5);
        assert_eq!(polygon.interiors().len(), 1);
        assert!(geometry.to_geo_line().is_none());
    }
}
