//! Pointer and touch routing.
//!
//! Stacked layers mean one click can land on a parcel, the spatial area under
//! it and a land record below both. The router queries every interactive layer
//! once, then lets the current mode decide what the click means.

/// Hit grouping, mode-aware click resolution and duplicate suppression.
pub mod router;

/// Tap and long-press heuristics for touch screens.
pub mod touch;

pub use router::{HitSet, InteractionRouter, RoutedAction, route};
pub use touch::{TouchOutcome, TouchTracker};

use crate::engine::core::app_setup::EngineSet;
use crate::layers::LayerSynchronizer;
use crate::popup::PopupRequestEvent;
use crate::surface::{MapSurfaceHandle, PointerLocation};
use crate::tools::mode_controller::ModeController;
use crate::tools::split::SplitTargetSelectedEvent;
use bevy::prelude::*;

/// Click (or tap) on the map.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PointerClickEvent {
    /// Shared by every per-layer delivery of one physical click.
    pub event_id: Option<u64>,
    pub location: PointerLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Start,
    Move,
    End,
}

#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub location: PointerLocation,
}

pub struct InteractionPlugin;

impl Plugin for InteractionPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<InteractionRouter>()
            .init_resource::<TouchTracker>()
            .add_event::<PointerClickEvent>()
            .add_event::<TouchEvent>()
            .add_systems(
                Update,
                (track_touches, detect_long_press, route_pointer_clicks)
                    .chain()
                    .in_set(EngineSet::Route),
            );
    }
}

fn track_touches(
    mut touches: EventReader<TouchEvent>,
    mut tracker: ResMut<TouchTracker>,
    mut clicks: EventWriter<PointerClickEvent>,
    time: Res<Time>,
) {
    for touch in touches.read() {
        match touch.phase {
            TouchPhase::Start => tracker.start(touch.location, time.elapsed()),
            TouchPhase::Move => tracker.moved(touch.location),
            TouchPhase::End => match tracker.end(touch.location, time.elapsed()) {
                TouchOutcome::Tap(location) => {
                    clicks.write(PointerClickEvent {
                        event_id: None,
                        location,
                    });
                }
                outcome => debug!("Touch ended without tap: {:?}", outcome),
            },
        }
    }
}

fn detect_long_press(mut tracker: ResMut<TouchTracker>, time: Res<Time>) {
    if let Some(location) = tracker.tick(time.elapsed()) {
        debug!("Long press at {:?}", location.lng_lat);
    }
}

pub fn route_pointer_clicks(
    mut clicks: EventReader<PointerClickEvent>,
    mut router: ResMut<InteractionRouter>,
    controller: Res<ModeController>,
    sync: Res<LayerSynchronizer>,
    surface: NonSend<MapSurfaceHandle>,
    mut split_targets: EventWriter<SplitTargetSelectedEvent>,
    mut popups: EventWriter<PopupRequestEvent>,
) {
    for click in clicks.read() {
        if let Some(event_id) = click.event_id {
            if !router.accept(event_id) {
                continue;
            }
        }

        let layer_ids = sync.interactive_layer_ids(surface.surface());
        if layer_ids.is_empty() {
            continue;
        }
        let hits = HitSet::from_rendered(
            surface
                .surface()
                .query_rendered_features(&click.location, &layer_ids),
        );

        match route(controller.mode(), &hits) {
            RoutedAction::SelectSplitTarget(parcel) => {
                split_targets.write(SplitTargetSelectedEvent { parcel });
            }
            RoutedAction::OpenPopup { layer, feature } => {
                popups.write(PopupRequestEvent {
                    layer,
                    feature,
                    lng_lat: click.location.lng_lat,
                });
            }
            RoutedAction::Suppressed => {
                debug!("Click consumed by {} mode", controller.mode());
            }
            RoutedAction::Miss => {}
        }
    }
}
