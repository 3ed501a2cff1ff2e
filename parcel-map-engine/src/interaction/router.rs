use crate::geometry::Feature;
use crate::layers::ThematicLayer;
use crate::model::Parcel;
use crate::surface::RenderedFeature;
use crate::tools::mode_controller::MapMode;
use bevy::prelude::*;
use constants::layers::SPLIT_INTERCEPT_LAYER;
use std::collections::{BTreeMap, VecDeque};

/// Popup priority, most specific first.
const POPUP_PRIORITY: [ThematicLayer; 4] = [
    ThematicLayer::Parcels,
    ThematicLayer::SpatialAreas,
    ThematicLayer::LandRecords,
    ThematicLayer::RiskPoints,
];

/// Remembered pointer event ids, for dropping per-layer duplicates.
const SEEN_EVENT_CAPACITY: usize = 64;

/// Features under one pointer position, grouped by thematic layer (topmost first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HitSet {
    by_layer: BTreeMap<ThematicLayer, Vec<Feature>>,
    intercepted: bool,
}

impl HitSet {
    pub fn from_rendered(features: Vec<RenderedFeature>) -> Self {
        let mut hits = Self::default();
        for rendered in features {
            if rendered.layer_id == SPLIT_INTERCEPT_LAYER {
                hits.intercepted = true;
                continue;
            }
            if let Some(layer) = ThematicLayer::from_layer_id(&rendered.layer_id) {
                hits.by_layer.entry(layer).or_default().push(rendered.feature);
            }
        }
        hits
    }

    pub fn first(&self, layer: ThematicLayer) -> Option<&Feature> {
        self.by_layer.get(&layer).and_then(|features| features.first())
    }

    pub fn is_intercepted(&self) -> bool {
        self.intercepted
    }

    pub fn is_empty(&self) -> bool {
        self.by_layer.values().all(Vec::is_empty)
    }
}

/// What a click resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum RoutedAction {
    SelectSplitTarget(Parcel),
    OpenPopup {
        layer: ThematicLayer,
        feature: Feature,
    },
    /// The active mode owns pointer input.
    Suppressed,
    Miss,
}

/// Resolve a click in `mode` to one action.
pub fn route(mode: MapMode, hits: &HitSet) -> RoutedAction {
    match mode {
        MapMode::SelectingSplitTarget => hits
            .first(ThematicLayer::Parcels)
            .and_then(Parcel::from_feature)
            .map_or(RoutedAction::Miss, RoutedAction::SelectSplitTarget),
        // Drawing tools consume clicks in these modes.
        MapMode::DrawingSplitLine | MapMode::DrawingArea | MapMode::EditingVertices => {
            RoutedAction::Suppressed
        }
        MapMode::Idle if hits.is_intercepted() => RoutedAction::Suppressed,
        MapMode::Idle => POPUP_PRIORITY
            .into_iter()
            .find_map(|layer| {
                hits.first(layer).map(|feature| RoutedAction::OpenPopup {
                    layer,
                    feature: feature.clone(),
                })
            })
            .unwrap_or(RoutedAction::Miss),
    }
}

/// Drops repeated deliveries of one pointer event. The renderer reports a
/// click once per bound layer under the pointer.
#[derive(Resource, Debug, Default)]
pub struct InteractionRouter {
    seen: VecDeque<u64>,
}

impl InteractionRouter {
    /// True the first time `event_id` is seen.
    pub fn accept(&mut self, event_id: u64) -> bool {
        if self.seen.contains(&event_id) {
            return false;
        }
        if self.seen.len() == SEEN_EVENT_CAPACITY {
            self.seen.pop_front();
        }
        self.seen.push_back(event_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Geometry;

    fn rendered(layer_id: &str, id: i64) -> RenderedFeature {
        RenderedFeature {
            layer_id: layer_id.to_string(),
            feature: Feature::new(Geometry::polygon(vec![])).with_id(id),
        }
    }

    #[test]
    fn parcel_wins_over_lower_priority_layers() {
        let hits = HitSet::from_rendered(vec![
            rendered("risk-points-fill", 1),
            rendered("parcels-fill", 2),
            rendered("land-records-fill", 3),
        ]);
        match route(MapMode::Idle, &hits) {
            RoutedAction::OpenPopup { layer, feature } => {
                assert_eq!(layer, ThematicLayer::Parcels);
                assert_eq!(feature.record_id(), Some(2_i64.into()));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn target_selection_ignores_everything_but_parcels() {
        let hits = HitSet::from_rendered(vec![rendered("spatial-areas-fill", 5)]);
        assert_eq!(route(MapMode::SelectingSplitTarget, &hits), RoutedAction::Miss);
        assert_eq!(route(MapMode::DrawingSplitLine, &hits), RoutedAction::Suppressed);
    }

    #[test]
    fn duplicate_event_ids_are_accepted_once() {
        let mut router = InteractionRouter::default();
        assert!(router.accept(10));
        assert!(!router.accept(10));
        assert!(router.accept(11));
    }
}
