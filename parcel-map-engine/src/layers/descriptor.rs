use crate::geometry::{Feature, FeatureCollection, Geometry};
use crate::model::records::keys;
use crate::surface::{LayerSpec, RenderKind};
use constants::layers::{
    FILL_SUFFIX, LABEL_PROPERTY, LABEL_SUFFIX, LAND_RECORDS_SOURCE, OUTLINE_SUFFIX,
    PARCELS_SOURCE, RISK_POINTS_SOURCE, SPATIAL_AREAS_SOURCE, SPLIT_INTERCEPT_LAYER,
    SPLIT_INTERCEPT_SOURCE,
};
use constants::render_settings::{
    LAND_RECORD_PAINT, LayerPaint, PARCEL_PAINT, RISK_POINT_PAINT, RISK_POINT_RADIUS,
    SPATIAL_AREA_PAINT,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Thematic layers in stacking order, bottom first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ThematicLayer {
    LandRecords,
    SpatialAreas,
    Parcels,
    RiskPoints,
}

/// Stacking rank of the split intercept layer, above every thematic layer.
const INTERCEPT_RANK: u8 = 4;

impl ThematicLayer {
    pub const ALL: [ThematicLayer; 4] = [
        Self::LandRecords,
        Self::SpatialAreas,
        Self::Parcels,
        Self::RiskPoints,
    ];

    /// Accepts both the snake case wire names and renderer source ids.
    pub fn from_string(s: &str) -> Option<Self> {
        match s {
            "land_records" | LAND_RECORDS_SOURCE => Some(Self::LandRecords),
            "spatial_areas" | SPATIAL_AREAS_SOURCE => Some(Self::SpatialAreas),
            PARCELS_SOURCE => Some(Self::Parcels),
            "risk_points" | RISK_POINTS_SOURCE => Some(Self::RiskPoints),
            _ => None,
        }
    }

    pub fn source_id(&self) -> &'static str {
        match self {
            Self::LandRecords => LAND_RECORDS_SOURCE,
            Self::SpatialAreas => SPATIAL_AREAS_SOURCE,
            Self::Parcels => PARCELS_SOURCE,
            Self::RiskPoints => RISK_POINTS_SOURCE,
        }
    }

    /// Layer carrying click and hover handlers. For risk points this is the circle layer.
    pub fn fill_layer_id(&self) -> String {
        format!("{}{}", self.source_id(), FILL_SUFFIX)
    }

    pub fn outline_layer_id(&self) -> String {
        format!("{}{}", self.source_id(), OUTLINE_SUFFIX)
    }

    pub fn label_layer_id(&self) -> String {
        format!("{}{}", self.source_id(), LABEL_SUFFIX)
    }

    /// Renderer layers owned by this thematic layer, bottom first.
    pub fn layer_ids(&self) -> Vec<String> {
        match self {
            Self::RiskPoints => vec![self.fill_layer_id(), self.label_layer_id()],
            _ => vec![
                self.fill_layer_id(),
                self.outline_layer_id(),
                self.label_layer_id(),
            ],
        }
    }

    /// Thematic layer that owns a renderer layer id.
    pub fn from_layer_id(layer_id: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|layer| layer.layer_ids().iter().any(|id| id == layer_id))
    }

    pub fn rank(&self) -> u8 {
        *self as u8
    }

    pub fn paint(&self) -> &'static LayerPaint {
        match self {
            Self::LandRecords => &LAND_RECORD_PAINT,
            Self::SpatialAreas => &SPATIAL_AREA_PAINT,
            Self::Parcels => &PARCEL_PAINT,
            Self::RiskPoints => &RISK_POINT_PAINT,
        }
    }

    fn label_property(&self) -> &'static str {
        match self {
            Self::RiskPoints => keys::LABEL,
            Self::LandRecords => keys::REFERENCE,
            _ => LABEL_PROPERTY,
        }
    }
}

/// Stacking rank of any renderer layer the engine manages. Foreign layers
/// (basemap, drawing tool) have no rank.
pub fn stack_rank(layer_id: &str) -> Option<u8> {
    if layer_id == SPLIT_INTERCEPT_LAYER {
        return Some(INTERCEPT_RANK);
    }
    ThematicLayer::from_layer_id(layer_id).map(|layer| layer.rank())
}

/// Rank used when inserting the split intercept.
pub fn intercept_rank() -> u8 {
    INTERCEPT_RANK
}

/// Desired state of one thematic layer. Survives style reloads and is the
/// only input used to reattach it.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerDescriptor {
    pub layer: ThematicLayer,
    pub data: FeatureCollection,
    pub visible: bool,
    pub opacity: f32,
    /// Set once data has been delivered; unloaded layers are never attached.
    pub loaded: bool,
}

impl LayerDescriptor {
    pub fn new(layer: ThematicLayer) -> Self {
        Self {
            layer,
            data: FeatureCollection::default(),
            visible: true,
            opacity: layer.paint().default_opacity,
            loaded: false,
        }
    }

    fn layout(&self) -> Map<String, Value> {
        let mut layout = Map::new();
        layout.insert(
            "visibility".to_string(),
            Value::from(if self.visible { "visible" } else { "none" }),
        );
        layout
    }

    /// Renderer layers to add, bottom first.
    pub fn layer_specs(&self) -> Vec<LayerSpec> {
        let layer = self.layer;
        let paint = layer.paint();
        let source = layer.source_id().to_string();

        let mut label_layout = self.layout();
        label_layout.insert(
            "text-field".to_string(),
            json!(["get", layer.label_property()]),
        );
        label_layout.insert("text-size".to_string(), json!(12));
        let label = LayerSpec {
            id: layer.label_layer_id(),
            kind: RenderKind::Symbol,
            source: source.clone(),
            paint: object(json!({ "text-color": paint.label_colour })),
            layout: label_layout,
        };

        if layer == ThematicLayer::RiskPoints {
            let circle = LayerSpec {
                id: layer.fill_layer_id(),
                kind: RenderKind::Circle,
                source,
                paint: object(json!({
                    "circle-color": paint.fill_colour,
                    "circle-radius": RISK_POINT_RADIUS,
                    "circle-stroke-color": paint.outline_colour,
                    "circle-stroke-width": paint.outline_width,
                    "circle-opacity": self.opacity,
                })),
                layout: self.layout(),
            };
            return vec![circle, label];
        }

        let fill = LayerSpec {
            id: layer.fill_layer_id(),
            kind: RenderKind::Fill,
            source: source.clone(),
            paint: object(json!({
                "fill-color": paint.fill_colour,
                "fill-opacity": self.opacity,
            })),
            layout: self.layout(),
        };
        let outline = LayerSpec {
            id: layer.outline_layer_id(),
            kind: RenderKind::Line,
            source,
            paint: object(json!({
                "line-color": paint.outline_colour,
                "line-width": paint.outline_width,
            })),
            layout: self.layout(),
        };
        vec![fill, outline, label]
    }

    /// Paint properties that carry the layer opacity, as `(layer id, property)`.
    pub fn opacity_properties(&self) -> Vec<(String, &'static str)> {
        match self.layer {
            ThematicLayer::RiskPoints => {
                vec![(self.layer.fill_layer_id(), "circle-opacity")]
            }
            _ => vec![(self.layer.fill_layer_id(), "fill-opacity")],
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Full-world polygon feeding the split intercept layer.
pub fn intercept_source() -> FeatureCollection {
    FeatureCollection::new(vec![Feature::new(Geometry::polygon(vec![
        [-180.0, -85.0],
        [180.0, -85.0],
        [180.0, 85.0],
        [-180.0, 85.0],
        [-180.0, -85.0],
    ]))])
}

/// Transparent fill that still answers rendered-feature queries.
pub fn intercept_spec() -> LayerSpec {
    LayerSpec {
        id: SPLIT_INTERCEPT_LAYER.to_string(),
        kind: RenderKind::Fill,
        source: SPLIT_INTERCEPT_SOURCE.to_string(),
        paint: object(json!({ "fill-color": "#000000", "fill-opacity": 0.0 })),
        layout: Map::new(),
    }
}
