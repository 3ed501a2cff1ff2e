//! Thematic layer lifecycle.
//!
//! Four thematic layers (land records, spatial areas, parcels, risk points)
//! are drawn by the host's map renderer from independent feature sources. The
//! renderer may throw its whole style away at any time (basemap switch) and
//! rebuilds it asynchronously, while layer data arrives from backend fetches
//! that complete in any order.
//!
//! ## Flow
//!
//! ```text
//! ReloadLayerEvent / viewport debounce
//!   └─> LayerDataLoader::begin_load ──> backend_request
//! BackendCompletion (list_*)
//!   └─> LayerSynchronizer::set_data
//!       └─> ReadinessGate::when_ready ──> attach (source, fill/outline/label, handlers)
//! style_loaded
//!   └─> LayerSynchronizer::on_style_loaded ──> reattach every loaded layer
//! ```

/// Owned pointer handler registrations.
pub mod binding;

/// Thematic layer ids, stacking ranks and renderer layer specs.
pub mod descriptor;

/// In-flight guards and viewport debounce for layer fetches.
pub mod loader;

/// Bounded style-ready polling with deferral to the style-loaded notification.
pub mod readiness;

/// Reconciles desired layer state with the renderer.
pub mod synchronizer;

pub use binding::LayerHandlerBinding;
pub use descriptor::{LayerDescriptor, ThematicLayer};
pub use loader::{LayerDataLoader, ViewportAction};
pub use readiness::{GateState, ReadinessGate};
pub use synchronizer::{LayerSynchronizer, SyncJob};

use crate::backend::{BackendClient, BackendCompletion};
use crate::engine::core::app_setup::EngineSet;
use crate::engine::status::StatusLine;
use crate::geometry::{Bounds, FeatureCollection};
use crate::surface::MapSurfaceHandle;
use bevy::prelude::*;

/// Renderer finished loading a style.
#[derive(Event, Debug, Clone, Copy)]
pub struct StyleLoadedEvent;

/// Refetch a layer from the backend.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadLayerEvent {
    pub layer: ThematicLayer,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerControl {
    Visibility(bool),
    Opacity(f32),
}

/// Host toggled visibility or opacity of a layer.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct LayerControlEvent {
    pub layer: ThematicLayer,
    pub change: LayerControl,
}

/// Map move or zoom ended.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct ViewportChangedEvent {
    pub bounds: Bounds,
    pub zoom: f64,
}

pub struct LayerSyncPlugin;

impl Plugin for LayerSyncPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LayerSynchronizer>()
            .init_resource::<LayerDataLoader>()
            .add_event::<StyleLoadedEvent>()
            .add_event::<ReloadLayerEvent>()
            .add_event::<LayerControlEvent>()
            .add_event::<ViewportChangedEvent>()
            .add_systems(Startup, request_initial_layers)
            .add_systems(
                Update,
                (
                    track_viewport_changes,
                    apply_layer_data,
                    handle_reload_requests,
                )
                    .chain()
                    .in_set(EngineSet::Workflow),
            )
            .add_systems(
                Update,
                (
                    handle_style_loaded,
                    tick_layer_sync,
                    handle_layer_controls,
                    poll_viewport_debounce,
                )
                    .chain()
                    .in_set(EngineSet::Sync),
            );
    }
}

/// Parcels, spatial areas and risk points load at startup; land records wait
/// for the first viewport.
fn request_initial_layers(mut reloads: EventWriter<ReloadLayerEvent>) {
    for layer in [
        ThematicLayer::Parcels,
        ThematicLayer::SpatialAreas,
        ThematicLayer::RiskPoints,
    ] {
        reloads.write(ReloadLayerEvent { layer });
    }
}

fn handle_reload_requests(
    mut reloads: EventReader<ReloadLayerEvent>,
    mut loader: ResMut<LayerDataLoader>,
    mut client: ResMut<BackendClient>,
) {
    for reload in reloads.read() {
        if let Some(request) = loader.begin_load(reload.layer) {
            client.issue(request);
        }
    }
}

fn track_viewport_changes(
    mut changes: EventReader<ViewportChangedEvent>,
    mut loader: ResMut<LayerDataLoader>,
    time: Res<Time>,
) {
    for change in changes.read() {
        loader.viewport_changed(change.bounds, change.zoom, time.elapsed());
    }
}

fn poll_viewport_debounce(
    mut loader: ResMut<LayerDataLoader>,
    mut client: ResMut<BackendClient>,
    mut sync: ResMut<LayerSynchronizer>,
    mut surface: NonSendMut<MapSurfaceHandle>,
    time: Res<Time>,
) {
    match loader.poll_viewport(time.elapsed()) {
        Some(ViewportAction::Fetch(request)) => {
            client.issue(request);
        }
        Some(ViewportAction::Clear) => {
            debug!("Zoomed out below land record threshold, clearing layer");
            sync.set_data(
                ThematicLayer::LandRecords,
                FeatureCollection::default(),
                surface.surface_mut(),
                time.elapsed(),
            );
        }
        None => {}
    }
}

fn apply_layer_data(
    mut completions: EventReader<BackendCompletion>,
    mut loader: ResMut<LayerDataLoader>,
    mut sync: ResMut<LayerSynchronizer>,
    mut surface: NonSendMut<MapSurfaceHandle>,
    mut status: ResMut<StatusLine>,
    time: Res<Time>,
) {
    for completion in completions.read() {
        let Some(layer) = completion.request.listed_layer() else {
            continue;
        };
        loader.finish_load(layer);

        match completion.parse::<FeatureCollection>() {
            Ok(data) => {
                info!("Loaded {} feature(s) into {:?}", data.len(), layer);
                sync.set_data(layer, data, surface.surface_mut(), time.elapsed());
            }
            Err(error) => {
                status.error(format!("Could not load {}: {}", layer.source_id(), error));
            }
        }
    }
}

fn handle_style_loaded(
    mut events: EventReader<StyleLoadedEvent>,
    mut sync: ResMut<LayerSynchronizer>,
    mut surface: NonSendMut<MapSurfaceHandle>,
    time: Res<Time>,
) {
    if events.read().count() == 0 {
        return;
    }
    sync.on_style_loaded(surface.surface_mut(), time.elapsed());
}

fn tick_layer_sync(
    mut sync: ResMut<LayerSynchronizer>,
    mut surface: NonSendMut<MapSurfaceHandle>,
    time: Res<Time>,
) {
    sync.tick(surface.surface_mut(), time.elapsed());
}

fn handle_layer_controls(
    mut controls: EventReader<LayerControlEvent>,
    mut sync: ResMut<LayerSynchronizer>,
    mut surface: NonSendMut<MapSurfaceHandle>,
    time: Res<Time>,
) {
    for control in controls.read() {
        match control.change {
            LayerControl::Visibility(visible) => {
                sync.set_visibility(control.layer, visible, surface.surface_mut(), time.elapsed())
            }
            LayerControl::Opacity(opacity) => {
                sync.set_opacity(control.layer, opacity, surface.surface_mut(), time.elapsed())
            }
        }
    }
}
