/// Renderer source ids, one per thematic layer.
pub const PARCELS_SOURCE: &str = "parcels";
pub const SPATIAL_AREAS_SOURCE: &str = "spatial-areas";
pub const LAND_RECORDS_SOURCE: &str = "land-records";
pub const RISK_POINTS_SOURCE: &str = "risk-points";

/// Suffixes appended to a source id to name its renderer layers.
pub const FILL_SUFFIX: &str = "-fill";
pub const OUTLINE_SUFFIX: &str = "-outline";
pub const LABEL_SUFFIX: &str = "-label";

/// Invisible full-world layer that swallows pointer input while a split line is drawn.
pub const SPLIT_INTERCEPT_SOURCE: &str = "split-intercept";
pub const SPLIT_INTERCEPT_LAYER: &str = "split-intercept-fill";

/// Land records are only fetched at or above this zoom level.
pub const LAND_RECORD_MIN_ZOOM: f64 = 14.0;

/// Feature property used for labels.
pub const LABEL_PROPERTY: &str = "name";
