//! Seam between the engine and the map renderer running in the host page.
//!
//! The engine never touches the renderer directly. Everything it needs (sources,
//! layers, stacking, handler bindings, feature queries) goes through
//! [`MapSurface`]. On `wasm32` the implementation forwards to a JS bridge object
//! wrapping the MapLibre map; native builds and tests use [`RecordingSurface`],
//! which keeps the same state in memory.
//!
//! ## Style lifecycle
//!
//! Renderers rebuild their style asynchronously. While the style is loading,
//! mutating calls fail with [`SurfaceError::StyleNotReady`]; callers are expected
//! to retry through the layer synchronizer's readiness gate rather than fail.

#[cfg(target_arch = "wasm32")]
pub mod maplibre;

pub mod recording;

use crate::geometry::{Feature, FeatureCollection, Position};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use recording::RecordingSurface;

/// Opaque id of a handler bound on the renderer.
pub type HandlerId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    #[error("style is not done loading")]
    StyleNotReady,

    #[error("renderer rejected {operation}: {message}")]
    Renderer {
        operation: &'static str,
        message: String,
    },
}

/// Pointer events a layer handler can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerEventKind {
    Click,
    Hover,
}

/// Renderer layer types used by the thematic layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderKind {
    Fill,
    Line,
    Symbol,
    Circle,
}

/// Declarative renderer layer, serialized in MapLibre's layer shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RenderKind,
    pub source: String,
    #[serde(default)]
    pub paint: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub layout: serde_json::Map<String, serde_json::Value>,
}

impl LayerSpec {
    pub fn is_visible(&self) -> bool {
        self.layout.get("visibility").and_then(|v| v.as_str()) != Some("none")
    }
}

/// Where a pointer or touch landed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerLocation {
    /// Screen position in CSS pixels relative to the map container.
    pub point: [f32; 2],
    pub lng_lat: Position,
}

/// Feature returned by a rendered-feature query, tagged with the layer it was drawn by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedFeature {
    pub layer_id: String,
    pub feature: Feature,
}

/// Operations the engine needs from the map renderer.
pub trait MapSurface {
    fn is_style_loaded(&self) -> bool;

    fn has_source(&self, id: &str) -> bool;

    fn has_layer(&self, id: &str) -> bool;

    /// Renderer layer ids, bottom to top.
    fn layer_ids(&self) -> Vec<String>;

    fn add_source(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError>;

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError>;

    /// Add a layer below `before`, or on top when `before` is `None`.
    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError>;

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn set_visibility(&mut self, layer_id: &str, visible: bool) -> Result<(), SurfaceError>;

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), SurfaceError>;

    fn bind(&mut self, layer_id: &str, kind: LayerEventKind) -> HandlerId;

    fn unbind(&mut self, handler: HandlerId);

    /// Features under `location` across `layer_ids`, topmost first.
    fn query_rendered_features(
        &self,
        location: &PointerLocation,
        layer_ids: &[String],
    ) -> Vec<RenderedFeature>;

    fn set_double_click_zoom(&mut self, enabled: bool);
}

/// Non-send resource owning the active surface.
pub struct MapSurfaceHandle(pub Box<dyn MapSurface>);

impl MapSurfaceHandle {
    pub fn new(surface: impl MapSurface + 'static) -> Self {
        Self(Box::new(surface))
    }

    pub fn surface(&self) -> &dyn MapSurface {
        self.0.as_ref()
    }

    pub fn surface_mut(&mut self) -> &mut dyn MapSurface {
        self.0.as_mut()
    }
}

/// Surface for the current target: the JS bridge on `wasm32`, in-memory elsewhere.
pub fn platform_surface() -> MapSurfaceHandle {
    #[cfg(target_arch = "wasm32")]
    {
        match maplibre::MapLibreSurface::from_window() {
            Some(surface) => return MapSurfaceHandle::new(surface),
            None => bevy::log::warn!(
                "No map bridge on window, falling back to an in-memory surface"
            ),
        }
    }

    MapSurfaceHandle::new(RecordingSurface::loaded())
}
