use super::{
    HandlerId, LayerEventKind, LayerSpec, MapSurface, PointerLocation, RenderedFeature,
    SurfaceError,
};
use crate::geometry::FeatureCollection;
use bevy::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Name of the bridge object the host page installs on `window`.
const BRIDGE_GLOBAL: &str = "parcelMapBridge";

#[wasm_bindgen]
extern "C" {
    /// Thin JS wrapper around the MapLibre map instance. Structured values
    /// cross the boundary as JSON strings.
    pub type MapBridge;

    #[wasm_bindgen(method, js_name = isStyleLoaded)]
    fn is_style_loaded(this: &MapBridge) -> bool;

    #[wasm_bindgen(method, js_name = hasSource)]
    fn has_source(this: &MapBridge, id: &str) -> bool;

    #[wasm_bindgen(method, js_name = hasLayer)]
    fn has_layer(this: &MapBridge, id: &str) -> bool;

    #[wasm_bindgen(method, js_name = layerIds)]
    fn layer_ids(this: &MapBridge) -> String;

    #[wasm_bindgen(method, catch, js_name = addSource)]
    fn add_source(this: &MapBridge, id: &str, data: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = removeSource)]
    fn remove_source(this: &MapBridge, id: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = addLayer)]
    fn add_layer(this: &MapBridge, spec: &str, before: Option<String>) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = removeLayer)]
    fn remove_layer(this: &MapBridge, id: &str) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setVisibility)]
    fn set_visibility(this: &MapBridge, layer_id: &str, visible: bool) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = setPaintProperty)]
    fn set_paint_property(
        this: &MapBridge,
        layer_id: &str,
        name: &str,
        value: &str,
    ) -> Result<(), JsValue>;

    /// Returns a handler id; the bridge forwards the event as a `pointer_click`
    /// or hover RPC tagged with the layer id.
    #[wasm_bindgen(method)]
    fn bind(this: &MapBridge, layer_id: &str, kind: &str) -> f64;

    #[wasm_bindgen(method)]
    fn unbind(this: &MapBridge, handler: f64);

    #[wasm_bindgen(method, js_name = queryRenderedFeatures)]
    fn query_rendered_features(this: &MapBridge, location: &str, layer_ids: &str) -> String;

    #[wasm_bindgen(method, js_name = setDoubleClickZoom)]
    fn set_double_click_zoom(this: &MapBridge, enabled: bool);
}

/// [`MapSurface`] backed by the host page's MapLibre bridge.
pub struct MapLibreSurface {
    bridge: MapBridge,
}

impl MapLibreSurface {
    /// Look up the bridge object on `window`.
    pub fn from_window() -> Option<Self> {
        let window = web_sys::window()?;
        let value = js_sys::Reflect::get(&window, &JsValue::from_str(BRIDGE_GLOBAL)).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
        Some(Self {
            bridge: value.unchecked_into(),
        })
    }
}

fn js_error(operation: &'static str, value: JsValue) -> SurfaceError {
    let message = value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{value:?}"));

    if message.contains("Style is not done loading") {
        SurfaceError::StyleNotReady
    } else {
        SurfaceError::Renderer { operation, message }
    }
}

fn to_json<T: serde::Serialize>(operation: &'static str, value: &T) -> Result<String, SurfaceError> {
    serde_json::to_string(value).map_err(|e| SurfaceError::Renderer {
        operation,
        message: e.to_string(),
    })
}

impl MapSurface for MapLibreSurface {
    fn is_style_loaded(&self) -> bool {
        self.bridge.is_style_loaded()
    }

    fn has_source(&self, id: &str) -> bool {
        self.bridge.has_source(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.bridge.has_layer(id)
    }

    fn layer_ids(&self) -> Vec<String> {
        serde_json::from_str(&self.bridge.layer_ids()).unwrap_or_default()
    }

    fn add_source(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        let data = to_json("add_source", data)?;
        self.bridge
            .add_source(id, &data)
            .map_err(|e| js_error("add_source", e))
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.bridge
            .remove_source(id)
            .map_err(|e| js_error("remove_source", e))
    }

    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        let spec = to_json("add_layer", spec)?;
        self.bridge
            .add_layer(&spec, before.map(str::to_string))
            .map_err(|e| js_error("add_layer", e))
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.bridge
            .remove_layer(id)
            .map_err(|e| js_error("remove_layer", e))
    }

    fn set_visibility(&mut self, layer_id: &str, visible: bool) -> Result<(), SurfaceError> {
        self.bridge
            .set_visibility(layer_id, visible)
            .map_err(|e| js_error("set_visibility", e))
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), SurfaceError> {
        let value = to_json("set_paint_property", &value)?;
        self.bridge
            .set_paint_property(layer_id, name, &value)
            .map_err(|e| js_error("set_paint_property", e))
    }

    fn bind(&mut self, layer_id: &str, kind: LayerEventKind) -> HandlerId {
        let kind = match kind {
            LayerEventKind::Click => "click",
            LayerEventKind::Hover => "hover",
        };
        self.bridge.bind(layer_id, kind) as HandlerId
    }

    fn unbind(&mut self, handler: HandlerId) {
        self.bridge.unbind(handler as f64);
    }

    fn query_rendered_features(
        &self,
        location: &PointerLocation,
        layer_ids: &[String],
    ) -> Vec<RenderedFeature> {
        let (Ok(location), Ok(layer_ids)) = (
            serde_json::to_string(location),
            serde_json::to_string(layer_ids),
        ) else {
            return Vec::new();
        };

        let raw = self.bridge.query_rendered_features(&location, &layer_ids);
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Discarding malformed rendered-feature query result: {}", e);
            Vec::new()
        })
    }

    fn set_double_click_zoom(&mut self, enabled: bool) {
        self.bridge.set_double_click_zoom(enabled);
    }
}
