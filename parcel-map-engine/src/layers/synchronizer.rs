use super::binding::LayerHandlerBinding;
use super::descriptor::{
    LayerDescriptor, ThematicLayer, intercept_rank, intercept_source, intercept_spec, stack_rank,
};
use super::readiness::ReadinessGate;
use crate::engine::core::settings::EngineSettings;
use crate::geometry::FeatureCollection;
use crate::surface::{LayerEventKind, MapSurface, SurfaceError};
use bevy::prelude::*;
use constants::layers::{SPLIT_INTERCEPT_LAYER, SPLIT_INTERCEPT_SOURCE};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Unit of renderer work that needs a loaded style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncJob {
    /// Replace the source and layers of a thematic layer from its descriptor.
    Attach(ThematicLayer),
    /// Add or remove the split intercept to match the armed flag.
    Intercept,
}

/// Keeps the renderer's sources, layers and handlers consistent with the
/// desired state of every thematic layer.
///
/// Desired state lives in [`LayerDescriptor`]s and is never discarded, so a
/// style reload only has to replay it. All renderer calls go through the
/// readiness gate; a call that races a style reload is requeued.
#[derive(Resource)]
pub struct LayerSynchronizer {
    descriptors: BTreeMap<ThematicLayer, LayerDescriptor>,
    gate: ReadinessGate<SyncJob>,
    bindings: HashMap<(String, LayerEventKind), LayerHandlerBinding>,
    intercept_armed: bool,
}

impl FromWorld for LayerSynchronizer {
    fn from_world(world: &mut World) -> Self {
        let settings = world
            .get_resource::<EngineSettings>()
            .cloned()
            .unwrap_or_default();
        Self::new(settings.style_poll_attempts, settings.style_poll_interval())
    }
}

impl LayerSynchronizer {
    pub fn new(max_polls: u32, poll_interval: Duration) -> Self {
        Self {
            descriptors: ThematicLayer::ALL
                .into_iter()
                .map(|layer| (layer, LayerDescriptor::new(layer)))
                .collect(),
            gate: ReadinessGate::new(max_polls, poll_interval),
            bindings: HashMap::new(),
            intercept_armed: false,
        }
    }

    pub fn configure(&mut self, max_polls: u32, poll_interval: Duration) {
        self.gate.configure(max_polls, poll_interval);
    }

    pub fn descriptor(&self, layer: ThematicLayer) -> Option<&LayerDescriptor> {
        self.descriptors.get(&layer)
    }

    pub fn data(&self, layer: ThematicLayer) -> Option<&FeatureCollection> {
        self.descriptors.get(&layer).map(|d| &d.data)
    }

    pub fn gate(&self) -> &ReadinessGate<SyncJob> {
        &self.gate
    }

    pub fn is_intercept_armed(&self) -> bool {
        self.intercept_armed
    }

    /// Replace the desired data of a layer and (re)attach it.
    pub fn set_data(
        &mut self,
        layer: ThematicLayer,
        data: FeatureCollection,
        surface: &mut dyn MapSurface,
        now: Duration,
    ) {
        if let Some(descriptor) = self.descriptors.get_mut(&layer) {
            descriptor.data = data;
            descriptor.loaded = true;
        }
        self.request(SyncJob::Attach(layer), surface, now);
    }

    pub fn set_visibility(
        &mut self,
        layer: ThematicLayer,
        visible: bool,
        surface: &mut dyn MapSurface,
        now: Duration,
    ) {
        let Some(descriptor) = self.descriptors.get_mut(&layer) else {
            return;
        };
        descriptor.visible = visible;
        if !descriptor.loaded {
            return;
        }

        let ids = layer.layer_ids();
        let applied = surface.is_style_loaded()
            && ids.iter().all(|id| surface.has_layer(id))
            && ids
                .iter()
                .all(|id| surface.set_visibility(id, visible).is_ok());
        if !applied {
            self.request(SyncJob::Attach(layer), surface, now);
        }
    }

    pub fn set_opacity(
        &mut self,
        layer: ThematicLayer,
        opacity: f32,
        surface: &mut dyn MapSurface,
        now: Duration,
    ) {
        let Some(descriptor) = self.descriptors.get_mut(&layer) else {
            return;
        };
        descriptor.opacity = opacity.clamp(0.0, 1.0);
        if !descriptor.loaded {
            return;
        }

        let properties = descriptor.opacity_properties();
        let value = Value::from(descriptor.opacity);
        let applied = surface.is_style_loaded()
            && properties.iter().all(|(id, property)| {
                surface.has_layer(id)
                    && surface
                        .set_paint_property(id, property, value.clone())
                        .is_ok()
            });
        if !applied {
            self.request(SyncJob::Attach(layer), surface, now);
        }
    }

    /// Arm or disarm the full-world intercept used while a split line is drawn.
    pub fn arm_intercept(&mut self, armed: bool, surface: &mut dyn MapSurface, now: Duration) {
        if self.intercept_armed == armed {
            return;
        }
        self.intercept_armed = armed;
        self.request(SyncJob::Intercept, surface, now);
    }

    /// Drive the readiness poll loop.
    pub fn tick(&mut self, surface: &mut dyn MapSurface, now: Duration) {
        let jobs = self.gate.poll(now, || surface.is_style_loaded());
        self.run_all(jobs, surface, now);
    }

    /// Replay every loaded layer (and the intercept when armed) after the
    /// renderer finished loading a style. No data is refetched.
    pub fn on_style_loaded(&mut self, surface: &mut dyn MapSurface, now: Duration) {
        let mut jobs = self.gate.style_loaded();
        for descriptor in self.descriptors.values().filter(|d| d.loaded) {
            let job = SyncJob::Attach(descriptor.layer);
            if !jobs.contains(&job) {
                jobs.push(job);
            }
        }
        if self.intercept_armed && !jobs.contains(&SyncJob::Intercept) {
            jobs.push(SyncJob::Intercept);
        }
        self.run_all(jobs, surface, now);
    }

    /// Click targets present on the renderer, for rendered-feature queries.
    pub fn interactive_layer_ids(&self, surface: &dyn MapSurface) -> Vec<String> {
        let mut ids: Vec<String> = ThematicLayer::ALL
            .iter()
            .map(ThematicLayer::fill_layer_id)
            .filter(|id| surface.has_layer(id))
            .collect();
        if surface.has_layer(SPLIT_INTERCEPT_LAYER) {
            ids.push(SPLIT_INTERCEPT_LAYER.to_string());
        }
        ids
    }

    fn request(&mut self, job: SyncJob, surface: &mut dyn MapSurface, now: Duration) {
        let jobs = self.gate.when_ready(job, now, surface.is_style_loaded());
        self.run_all(jobs, surface, now);
    }

    fn run_all(&mut self, jobs: Vec<SyncJob>, surface: &mut dyn MapSurface, now: Duration) {
        // Bottom layers first so higher ranks find their anchors in place.
        let mut jobs = jobs;
        jobs.sort_by_key(|job| match job {
            SyncJob::Attach(layer) => layer.rank(),
            SyncJob::Intercept => intercept_rank(),
        });

        for job in jobs {
            let result = match job {
                SyncJob::Attach(layer) => self.attach(layer, surface),
                SyncJob::Intercept => self.sync_intercept(surface),
            };
            match result {
                Ok(()) => {}
                Err(SurfaceError::StyleNotReady) => {
                    debug!("Style reload raced {:?}, requeueing", job);
                    self.gate.when_ready(job, now, false);
                }
                Err(e) => warn!("Layer sync {:?} failed: {}", job, e),
            }
        }
    }

    fn attach(
        &mut self,
        layer: ThematicLayer,
        surface: &mut dyn MapSurface,
    ) -> Result<(), SurfaceError> {
        let Some(descriptor) = self.descriptors.get(&layer) else {
            return Ok(());
        };
        let specs = descriptor.layer_specs();
        let feature_count = descriptor.data.len();
        let source = layer.source_id();

        for id in layer.layer_ids().iter().rev() {
            if surface.has_layer(id) {
                surface.remove_layer(id)?;
            }
        }
        if surface.has_source(source) {
            surface.remove_source(source)?;
        }
        surface.add_source(source, &descriptor.data)?;

        let before = anchor_below_higher_rank(surface, layer.rank());
        for spec in &specs {
            surface.add_layer(spec, before.as_deref())?;
        }

        let target = layer.fill_layer_id();
        self.rebind(&target, LayerEventKind::Click, surface);
        self.rebind(&target, LayerEventKind::Hover, surface);
        debug!("Attached {} with {} feature(s)", source, feature_count);
        Ok(())
    }

    fn sync_intercept(&mut self, surface: &mut dyn MapSurface) -> Result<(), SurfaceError> {
        if surface.has_layer(SPLIT_INTERCEPT_LAYER) {
            surface.remove_layer(SPLIT_INTERCEPT_LAYER)?;
        }
        if surface.has_source(SPLIT_INTERCEPT_SOURCE) {
            surface.remove_source(SPLIT_INTERCEPT_SOURCE)?;
        }

        if !self.intercept_armed {
            if let Some(mut binding) = self
                .bindings
                .remove(&(SPLIT_INTERCEPT_LAYER.to_string(), LayerEventKind::Click))
            {
                binding.release(surface);
            }
            return Ok(());
        }

        surface.add_source(SPLIT_INTERCEPT_SOURCE, &intercept_source())?;
        surface.add_layer(&intercept_spec(), None)?;
        self.rebind(SPLIT_INTERCEPT_LAYER, LayerEventKind::Click, surface);
        Ok(())
    }

    fn rebind(&mut self, layer_id: &str, kind: LayerEventKind, surface: &mut dyn MapSurface) {
        self.bindings
            .entry((layer_id.to_string(), kind))
            .or_insert_with(|| LayerHandlerBinding::new(layer_id, kind))
            .rebind(surface);
    }
}

/// Lowest present layer that ranks above `rank`; new layers go right below it.
fn anchor_below_higher_rank(surface: &dyn MapSurface, rank: u8) -> Option<String> {
    surface
        .layer_ids()
        .into_iter()
        .find(|id| stack_rank(id).is_some_and(|r| r > rank))
}
