use super::{
    HandlerId, LayerEventKind, LayerSpec, MapSurface, PointerLocation, RenderedFeature,
    SurfaceError,
};
use crate::geometry::{FeatureCollection, Geometry};
use geo::Contains;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

/// Point features are hit within this distance of the pointer (degrees).
const POINT_HIT_TOLERANCE: f64 = 1e-4;

/// Calls kept in a [`RecordingSurface`] log before the oldest are dropped.
pub const CALL_HISTORY_LIMIT: usize = 256;

/// Calls made against a [`RecordingSurface`], in order.
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    AddSource(String),
    RemoveSource(String),
    AddLayer { id: String, before: Option<String> },
    RemoveLayer(String),
    SetVisibility(String, bool),
    SetPaint(String, String),
    Bind(String, LayerEventKind),
    Unbind(HandlerId),
    Query(Vec<String>),
    DoubleClickZoom(bool),
}

#[derive(Debug)]
struct SurfaceState {
    style_loaded: bool,
    sources: BTreeMap<String, FeatureCollection>,
    layers: Vec<LayerSpec>,
    bindings: BTreeMap<HandlerId, (String, LayerEventKind)>,
    next_handler: HandlerId,
    double_click_zoom: bool,
    calls: VecDeque<SurfaceCall>,
}

/// In-memory renderer with MapLibre's observable behaviour: sources and layers
/// vanish on a style reload while bound handlers survive it.
///
/// Clones share state, so a test can keep one clone for inspection while the
/// engine owns another.
#[derive(Debug, Clone)]
pub struct RecordingSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl Default for RecordingSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingSurface {
    /// Surface whose style has not loaded yet.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SurfaceState {
                style_loaded: false,
                sources: BTreeMap::new(),
                layers: Vec::new(),
                bindings: BTreeMap::new(),
                next_handler: 1,
                double_click_zoom: true,
                calls: VecDeque::new(),
            })),
        }
    }

    /// Surface with a loaded style.
    pub fn loaded() -> Self {
        let surface = Self::new();
        surface.set_style_loaded(true);
        surface
    }

    pub fn set_style_loaded(&self, loaded: bool) {
        self.state.borrow_mut().style_loaded = loaded;
    }

    /// Drop every source and layer and mark the style as loading.
    pub fn begin_style_reload(&self) {
        let mut state = self.state.borrow_mut();
        state.style_loaded = false;
        state.sources.clear();
        state.layers.clear();
    }

    pub fn source(&self, id: &str) -> Option<FeatureCollection> {
        self.state.borrow().sources.get(id).cloned()
    }

    pub fn layer(&self, id: &str) -> Option<LayerSpec> {
        self.state
            .borrow()
            .layers
            .iter()
            .find(|l| l.id == id)
            .cloned()
    }

    /// Number of live handlers of `kind` on `layer_id`.
    pub fn binding_count(&self, layer_id: &str, kind: LayerEventKind) -> usize {
        self.state
            .borrow()
            .bindings
            .values()
            .filter(|(id, k)| id == layer_id && *k == kind)
            .count()
    }

    pub fn double_click_zoom(&self) -> bool {
        self.state.borrow().double_click_zoom
    }

    /// The most recent [`CALL_HISTORY_LIMIT`] calls, oldest first.
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state.borrow().calls.iter().cloned().collect()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    fn record(&self, call: SurfaceCall) {
        let mut state = self.state.borrow_mut();
        if state.calls.len() == CALL_HISTORY_LIMIT {
            state.calls.pop_front();
        }
        state.calls.push_back(call);
    }

    fn require_style(&self) -> Result<(), SurfaceError> {
        if self.state.borrow().style_loaded {
            Ok(())
        } else {
            Err(SurfaceError::StyleNotReady)
        }
    }
}

fn renderer_error(operation: &'static str, message: impl Into<String>) -> SurfaceError {
    SurfaceError::Renderer {
        operation,
        message: message.into(),
    }
}

fn hits(geometry: &Geometry, location: &PointerLocation) -> bool {
    let point = geo::Point::new(location.lng_lat[0], location.lng_lat[1]);
    match geometry {
        Geometry::Polygon { .. } => geometry
            .to_geo_polygon()
            .is_some_and(|polygon| polygon.contains(&point)),
        Geometry::Point { coordinates } => {
            (coordinates[0] - point.x()).abs() < POINT_HIT_TOLERANCE
                && (coordinates[1] - point.y()).abs() < POINT_HIT_TOLERANCE
        }
        Geometry::LineString { .. } => false,
    }
}

impl MapSurface for RecordingSurface {
    fn is_style_loaded(&self) -> bool {
        self.state.borrow().style_loaded
    }

    fn has_source(&self, id: &str) -> bool {
        self.state.borrow().sources.contains_key(id)
    }

    fn has_layer(&self, id: &str) -> bool {
        self.state.borrow().layers.iter().any(|l| l.id == id)
    }

    fn layer_ids(&self) -> Vec<String> {
        self.state
            .borrow()
            .layers
            .iter()
            .map(|l| l.id.clone())
            .collect()
    }

    fn add_source(&mut self, id: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        self.require_style()?;
        if self.has_source(id) {
            return Err(renderer_error("add_source", format!("source {id} already exists")));
        }
        self.state
            .borrow_mut()
            .sources
            .insert(id.to_string(), data.clone());
        self.record(SurfaceCall::AddSource(id.to_string()));
        Ok(())
    }

    fn remove_source(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.require_style()?;
        if self.state.borrow().layers.iter().any(|l| l.source == id) {
            return Err(renderer_error("remove_source", format!("source {id} is in use")));
        }
        self.state.borrow_mut().sources.remove(id);
        self.record(SurfaceCall::RemoveSource(id.to_string()));
        Ok(())
    }

    fn add_layer(&mut self, spec: &LayerSpec, before: Option<&str>) -> Result<(), SurfaceError> {
        self.require_style()?;
        if !self.has_source(&spec.source) {
            return Err(renderer_error(
                "add_layer",
                format!("source {} does not exist", spec.source),
            ));
        }
        if self.has_layer(&spec.id) {
            return Err(renderer_error("add_layer", format!("layer {} already exists", spec.id)));
        }

        let index = match before {
            Some(before_id) => self
                .state
                .borrow()
                .layers
                .iter()
                .position(|l| l.id == before_id)
                .ok_or_else(|| {
                    renderer_error("add_layer", format!("layer {before_id} does not exist"))
                })?,
            None => self.state.borrow().layers.len(),
        };

        self.state.borrow_mut().layers.insert(index, spec.clone());
        self.record(SurfaceCall::AddLayer {
            id: spec.id.clone(),
            before: before.map(str::to_string),
        });
        Ok(())
    }

    fn remove_layer(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.require_style()?;
        self.state.borrow_mut().layers.retain(|l| l.id != id);
        self.record(SurfaceCall::RemoveLayer(id.to_string()));
        Ok(())
    }

    fn set_visibility(&mut self, layer_id: &str, visible: bool) -> Result<(), SurfaceError> {
        self.require_style()?;
        {
            let mut state = self.state.borrow_mut();
            let layer = state
                .layers
                .iter_mut()
                .find(|l| l.id == layer_id)
                .ok_or_else(|| {
                    renderer_error("set_visibility", format!("layer {layer_id} does not exist"))
                })?;
            layer.layout.insert(
                "visibility".to_string(),
                serde_json::Value::from(if visible { "visible" } else { "none" }),
            );
        }
        self.record(SurfaceCall::SetVisibility(layer_id.to_string(), visible));
        Ok(())
    }

    fn set_paint_property(
        &mut self,
        layer_id: &str,
        name: &str,
        value: serde_json::Value,
    ) -> Result<(), SurfaceError> {
        self.require_style()?;
        {
            let mut state = self.state.borrow_mut();
            let layer = state
                .layers
                .iter_mut()
                .find(|l| l.id == layer_id)
                .ok_or_else(|| {
                    renderer_error("set_paint_property", format!("layer {layer_id} does not exist"))
                })?;
            layer.paint.insert(name.to_string(), value);
        }
        self.record(SurfaceCall::SetPaint(layer_id.to_string(), name.to_string()));
        Ok(())
    }

    fn bind(&mut self, layer_id: &str, kind: LayerEventKind) -> HandlerId {
        let handler = {
            let mut state = self.state.borrow_mut();
            let handler = state.next_handler;
            state.next_handler += 1;
            state
                .bindings
                .insert(handler, (layer_id.to_string(), kind));
            handler
        };
        self.record(SurfaceCall::Bind(layer_id.to_string(), kind));
        handler
    }

    fn unbind(&mut self, handler: HandlerId) {
        self.state.borrow_mut().bindings.remove(&handler);
        self.record(SurfaceCall::Unbind(handler));
    }

    fn query_rendered_features(
        &self,
        location: &PointerLocation,
        layer_ids: &[String],
    ) -> Vec<RenderedFeature> {
        self.record(SurfaceCall::Query(layer_ids.to_vec()));

        let state = self.state.borrow();
        let mut found = Vec::new();
        for layer in state.layers.iter().rev() {
            if !layer_ids.contains(&layer.id) || !layer.is_visible() {
                continue;
            }
            let Some(source) = state.sources.get(&layer.source) else {
                continue;
            };
            for feature in &source.features {
                if hits(&feature.geometry, location) {
                    found.push(RenderedFeature {
                        layer_id: layer.id.clone(),
                        feature: feature.clone(),
                    });
                }
            }
        }
        found
    }

    fn set_double_click_zoom(&mut self, enabled: bool) {
        self.state.borrow_mut().double_click_zoom = enabled;
        self.record(SurfaceCall::DoubleClickZoom(enabled));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_log_is_bounded() {
        let mut surface = RecordingSurface::new();
        for n in 0..CALL_HISTORY_LIMIT + 1 {
            surface.set_double_click_zoom(n % 2 == 0);
        }
        let calls = surface.calls();
        assert_eq!(calls.len(), CALL_HISTORY_LIMIT);
        assert_eq!(calls[0], SurfaceCall::DoubleClickZoom(false));
        assert_eq!(calls.last(), Some(&SurfaceCall::DoubleClickZoom(true)));

        surface.clear_calls();
        assert!(surface.calls().is_empty());
    }
}
