use super::actions::{PopupAction, PopupTarget};
use bevy::prelude::*;
use std::collections::HashMap;
use std::time::Duration;

pub type PopupId = u64;

/// Action bound to one popup button.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupCommand {
    pub popup: PopupId,
    pub action: PopupAction,
    pub target: PopupTarget,
}

/// Short-lived command table behind popup buttons.
///
/// Buttons only carry an opaque handle; the command itself stays here until
/// its popup closes. Handles look like `split_parcels_3_15200_41`
/// (action, layer, popup, milliseconds since start, sequence). They are built
/// from engine values only, never from record data, so they are safe to
/// embed in inline script.
#[derive(Resource, Debug, Default)]
pub struct CommandRegistry {
    next_popup: PopupId,
    next_sequence: u64,
    open: Option<PopupId>,
    commands: HashMap<String, PopupCommand>,
    scopes: HashMap<PopupId, Vec<String>>,
}

impl CommandRegistry {
    /// Start a popup scope. Any popup still open is closed first; its id is returned.
    pub fn open_scope(&mut self) -> (PopupId, Option<PopupId>) {
        let previous = self.close_open();
        self.next_popup += 1;
        let popup = self.next_popup;
        self.scopes.insert(popup, Vec::new());
        self.open = Some(popup);
        (popup, previous)
    }

    pub fn register(
        &mut self,
        popup: PopupId,
        action: PopupAction,
        target: &PopupTarget,
        now: Duration,
    ) -> String {
        self.next_sequence += 1;
        let handle = format!(
            "{}_{}_{}_{}_{}",
            action,
            target.layer().source_id(),
            popup,
            now.as_millis(),
            self.next_sequence
        );
        self.commands.insert(
            handle.clone(),
            PopupCommand {
                popup,
                action,
                target: target.clone(),
            },
        );
        self.scopes.entry(popup).or_default().push(handle.clone());
        handle
    }

    pub fn resolve(&self, handle: &str) -> Option<&PopupCommand> {
        self.commands.get(handle)
    }

    /// Dispose every handle of `popup`. Returns how many were removed.
    pub fn close_scope(&mut self, popup: PopupId) -> usize {
        if self.open == Some(popup) {
            self.open = None;
        }
        let Some(handles) = self.scopes.remove(&popup) else {
            return 0;
        };
        for handle in &handles {
            self.commands.remove(handle);
        }
        handles.len()
    }

    pub fn close_open(&mut self) -> Option<PopupId> {
        let popup = self.open?;
        let removed = self.close_scope(popup);
        debug!("Closed popup {} ({} commands)", popup, removed);
        Some(popup)
    }

    pub fn open_popup(&self) -> Option<PopupId> {
        self.open
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Feature, Geometry};
    use crate::layers::ThematicLayer;

    fn target() -> PopupTarget {
        let feature = Feature::new(Geometry::polygon(vec![])).with_id(12_i64);
        PopupTarget::from_feature(ThematicLayer::Parcels, &feature).unwrap()
    }

    #[test]
    fn handles_are_unique_and_scoped() {
        let mut registry = CommandRegistry::default();
        let (popup, previous) = registry.open_scope();
        assert_eq!(previous, None);

        let now = Duration::from_millis(15_200);
        let first = registry.register(popup, PopupAction::Split, &target(), now);
        let second = registry.register(popup, PopupAction::Split, &target(), now);
        assert_ne!(first, second);
        assert!(first.starts_with("split_parcels_1_15200_"));
        assert_eq!(registry.resolve(&first).map(|c| c.action), Some(PopupAction::Split));

        assert_eq!(registry.close_scope(popup), 2);
        assert!(registry.resolve(&first).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn opening_a_popup_disposes_the_previous_one() {
        let mut registry = CommandRegistry::default();
        let (first, _) = registry.open_scope();
        let stale = registry.register(first, PopupAction::EditDetails, &target(), Duration::ZERO);

        let (second, previous) = registry.open_scope();
        assert_eq!(previous, Some(first));
        assert_eq!(registry.open_popup(), Some(second));
        assert!(registry.resolve(&stale).is_none());
    }
}
