use crate::surface::{HandlerId, LayerEventKind, MapSurface};

/// Owned registration of one pointer handler on one renderer layer.
///
/// Renderer handlers outlive style reloads while the layers they were bound
/// to do not, so every reattach rebinds. `rebind` always unbinds the previous
/// handler first; a layer never ends up with two live handlers of one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerHandlerBinding {
    layer_id: String,
    kind: LayerEventKind,
    handler: Option<HandlerId>,
}

impl LayerHandlerBinding {
    pub fn new(layer_id: impl Into<String>, kind: LayerEventKind) -> Self {
        Self {
            layer_id: layer_id.into(),
            kind,
            handler: None,
        }
    }

    pub fn rebind(&mut self, surface: &mut dyn MapSurface) -> HandlerId {
        self.release(surface);
        let handler = surface.bind(&self.layer_id, self.kind);
        self.handler = Some(handler);
        handler
    }

    pub fn release(&mut self, surface: &mut dyn MapSurface) {
        if let Some(handler) = self.handler.take() {
            surface.unbind(handler);
        }
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn kind(&self) -> LayerEventKind {
        self.kind
    }

    pub fn is_bound(&self) -> bool {
        self.handler.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RecordingSurface;

    #[test]
    fn rebinding_replaces_the_previous_handler() {
        let recording = RecordingSurface::loaded();
        let mut surface = recording.clone();
        let mut binding = LayerHandlerBinding::new("parcels-fill", LayerEventKind::Click);

        let first = binding.rebind(&mut surface);
        let second = binding.rebind(&mut surface);
        assert_ne!(first, second);
        assert_eq!(recording.binding_count("parcels-fill", LayerEventKind::Click), 1);

        binding.release(&mut surface);
        assert!(!binding.is_bound());
        assert_eq!(recording.binding_count("parcels-fill", LayerEventKind::Click), 0);
    }
}
