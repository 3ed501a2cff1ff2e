/// Paint defaults handed to the map renderer. Colours are CSS hex strings.
pub struct LayerPaint {
    pub fill_colour: &'static str,
    pub outline_colour: &'static str,
    pub outline_width: f32,
    pub label_colour: &'static str,
    pub default_opacity: f32,
}

pub const PARCEL_PAINT: LayerPaint = LayerPaint {
    fill_colour: "#7b2d8e",
    outline_colour: "#4a1656",
    outline_width: 2.0,
    label_colour: "#ffffff",
    default_opacity: 0.45,
};

pub const SPATIAL_AREA_PAINT: LayerPaint = LayerPaint {
    fill_colour: "#2e8b57",
    outline_colour: "#1d5c39",
    outline_width: 1.5,
    label_colour: "#f0fff0",
    default_opacity: 0.35,
};

pub const LAND_RECORD_PAINT: LayerPaint = LayerPaint {
    fill_colour: "#c8a165",
    outline_colour: "#8a6a35",
    outline_width: 1.0,
    label_colour: "#3b2a10",
    default_opacity: 0.25,
};

pub const RISK_POINT_PAINT: LayerPaint = LayerPaint {
    fill_colour: "#e53935",
    outline_colour: "#ffffff",
    outline_width: 1.0,
    label_colour: "#e53935",
    default_opacity: 0.9,
};

/// Radius of risk point circles in pixels.
pub const RISK_POINT_RADIUS: f32 = 6.0;
