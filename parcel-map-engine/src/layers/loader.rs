use super::descriptor::ThematicLayer;
use crate::backend::BackendRequest;
use crate::engine::core::settings::EngineSettings;
use crate::geometry::Bounds;
use bevy::prelude::*;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ViewportChange {
    bounds: Bounds,
    zoom: f64,
    at: Duration,
}

/// What to do with the land-record layer once the viewport settled.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewportAction {
    Fetch(BackendRequest),
    /// Zoomed out below the land-record threshold: show nothing.
    Clear,
}

/// Tracks outstanding layer fetches and debounces viewport-driven reloads.
///
/// At most one list request per layer is in flight; a trigger that arrives
/// meanwhile is dropped. Completed fetches are always applied.
#[derive(Resource, Debug)]
pub struct LayerDataLoader {
    in_flight: HashSet<ThematicLayer>,
    pending_viewport: Option<ViewportChange>,
    viewport: Option<(Bounds, f64)>,
    debounce: Duration,
    min_zoom: f64,
}

impl FromWorld for LayerDataLoader {
    fn from_world(world: &mut World) -> Self {
        let settings = world
            .get_resource::<EngineSettings>()
            .cloned()
            .unwrap_or_default();
        Self::new(settings.viewport_debounce(), settings.land_record_min_zoom)
    }
}

impl LayerDataLoader {
    pub fn new(debounce: Duration, min_zoom: f64) -> Self {
        Self {
            in_flight: HashSet::new(),
            pending_viewport: None,
            viewport: None,
            debounce,
            min_zoom,
        }
    }

    pub fn configure(&mut self, debounce: Duration, min_zoom: f64) {
        self.debounce = debounce;
        self.min_zoom = min_zoom;
    }

    /// Start a fetch for `layer` unless one is already outstanding.
    pub fn begin_load(&mut self, layer: ThematicLayer) -> Option<BackendRequest> {
        if self.in_flight.contains(&layer) {
            debug!("{:?} fetch already in flight, dropping trigger", layer);
            return None;
        }

        let viewport = self
            .viewport
            .filter(|(_, zoom)| *zoom >= self.min_zoom)
            .map(|(bounds, _)| (bounds, self.min_zoom));
        let request = BackendRequest::list(layer, viewport)?;
        self.in_flight.insert(layer);
        Some(request)
    }

    pub fn finish_load(&mut self, layer: ThematicLayer) {
        self.in_flight.remove(&layer);
    }

    pub fn is_in_flight(&self, layer: ThematicLayer) -> bool {
        self.in_flight.contains(&layer)
    }

    /// Record a move or zoom end; restarts the quiet period.
    pub fn viewport_changed(&mut self, bounds: Bounds, zoom: f64, now: Duration) {
        self.pending_viewport = Some(ViewportChange {
            bounds,
            zoom,
            at: now,
        });
    }

    /// Resolve the latest viewport once it has been quiet for the debounce period.
    pub fn poll_viewport(&mut self, now: Duration) -> Option<ViewportAction> {
        let change = self.pending_viewport?;
        if now.saturating_sub(change.at) < self.debounce {
            return None;
        }
        self.pending_viewport = None;
        self.viewport = Some((change.bounds, change.zoom));

        if change.zoom < self.min_zoom {
            return Some(ViewportAction::Clear);
        }
        self.begin_load(ThematicLayer::LandRecords)
            .map(ViewportAction::Fetch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn land_records_need_a_viewport() {
        let mut loader = LayerDataLoader::new(Duration::from_millis(1000), 14.0);
        assert_eq!(loader.begin_load(ThematicLayer::LandRecords), None);
        assert!(!loader.is_in_flight(ThematicLayer::LandRecords));
        assert_eq!(
            loader.begin_load(ThematicLayer::Parcels),
            Some(BackendRequest::ListParcels)
        );
    }
}
