use super::split::SplitExecutor;
use crate::engine::session::ViewerSession;
use crate::engine::status::StatusLine;
use crate::geometry::{Geometry, RecordId, validate_edited_polygon};
use crate::layers::{LayerSynchronizer, ThematicLayer};
use crate::model::Parcel;
use crate::rpc::web_rpc::WebRpcInterface;
use crate::surface::MapSurfaceHandle;
use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Interactive mode of the map. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapMode {
    #[default]
    Idle,
    DrawingArea,
    SelectingSplitTarget,
    DrawingSplitLine,
    EditingVertices,
}

impl MapMode {
    pub const ALL: [MapMode; 5] = [
        Self::Idle,
        Self::DrawingArea,
        Self::SelectingSplitTarget,
        Self::DrawingSplitLine,
        Self::EditingVertices,
    ];

    pub fn from_string(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|mode| mode.as_str() == s)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::DrawingArea => "drawing-area",
            Self::SelectingSplitTarget => "selecting-split-target",
            Self::DrawingSplitLine => "drawing-split-line",
            Self::EditingVertices => "editing-vertices",
        }
    }

    pub fn is_split(&self) -> bool {
        matches!(self, Self::SelectingSplitTarget | Self::DrawingSplitLine)
    }

    /// Drawing tool the host should enable, if any.
    pub fn draw_tool(&self) -> Option<&'static str> {
        match self {
            Self::DrawingArea => Some("draw_polygon"),
            Self::DrawingSplitLine => Some("draw_line_string"),
            Self::EditingVertices => Some("direct_select"),
            Self::Idle | Self::SelectingSplitTarget => None,
        }
    }
}

impl fmt::Display for MapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModeError {
    #[error("cannot start {requested} while {active} is active")]
    Conflict { active: MapMode, requested: MapMode },

    #[error("{0} is entered through its workflow, not directly")]
    NotDirectlyEnterable(MapMode),

    #[error("{operation} needs {expected}, but the map is in {actual}")]
    WrongMode {
        operation: &'static str,
        expected: MapMode,
        actual: MapMode,
    },

    #[error("signed-in company required for {0}")]
    NotPermitted(MapMode),

    #[error("inconsistent editing state: {0}")]
    InvariantViolation(&'static str),
}

/// Record whose boundary is being edited.
#[derive(Debug, Clone, PartialEq)]
pub struct EditTarget {
    pub layer: ThematicLayer,
    pub id: RecordId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VertexEditSession {
    pub target: EditTarget,
    pub original: Geometry,
    pub current: Geometry,
    pub save_enabled: bool,
}

/// Parcel picked for splitting and the line drawn across it, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitCandidate {
    pub target: Parcel,
    pub line: Option<Geometry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeChange {
    pub previous: MapMode,
    pub current: MapMode,
}

impl ModeChange {
    pub fn changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Single source of truth for interactive state.
///
/// Every handler reads this resource when it runs, never a captured copy.
/// Entering an interactive mode clears the draft state of every other mode.
#[derive(Resource, Debug, Default)]
pub struct ModeController {
    mode: MapMode,
    draft_area: Option<Geometry>,
    split: Option<SplitCandidate>,
    edit: Option<VertexEditSession>,
}

impl ModeController {
    pub fn mode(&self) -> MapMode {
        self.mode
    }

    pub fn draft_area(&self) -> Option<&Geometry> {
        self.draft_area.as_ref()
    }

    pub fn split_candidate(&self) -> Option<&SplitCandidate> {
        self.split.as_ref()
    }

    pub fn split_target(&self) -> Option<&Parcel> {
        self.split.as_ref().map(|c| &c.target)
    }

    pub fn split_line(&self) -> Option<&Geometry> {
        self.split.as_ref().and_then(|c| c.line.as_ref())
    }

    pub fn edit_session(&self) -> Option<&VertexEditSession> {
        self.edit.as_ref()
    }

    /// Mode request from the host or a popup, with the viewer's permissions applied.
    pub fn request_mode(
        &mut self,
        next: MapMode,
        viewer: &ViewerSession,
    ) -> Result<ModeChange, ModeError> {
        if next != MapMode::Idle && !viewer.can_edit() {
            return Err(ModeError::NotPermitted(next));
        }
        self.set_mode(next)
    }

    pub fn set_mode(&mut self, next: MapMode) -> Result<ModeChange, ModeError> {
        match next {
            MapMode::Idle => Ok(self.cancel()),
            MapMode::DrawingSplitLine | MapMode::EditingVertices => {
                Err(ModeError::NotDirectlyEnterable(next))
            }
            MapMode::DrawingArea if self.mode.is_split() => Err(ModeError::Conflict {
                active: self.mode,
                requested: next,
            }),
            _ if next == self.mode => Ok(ModeChange {
                previous: self.mode,
                current: self.mode,
            }),
            _ => {
                self.clear_drafts();
                Ok(self.switch(next))
            }
        }
    }

    /// Back to idle from anywhere, discarding every draft.
    pub fn cancel(&mut self) -> ModeChange {
        self.clear_drafts();
        self.switch(MapMode::Idle)
    }

    pub fn select_split_target(&mut self, parcel: Parcel) -> Result<ModeChange, ModeError> {
        self.require("select split target", MapMode::SelectingSplitTarget)?;
        self.split = Some(SplitCandidate {
            target: parcel,
            line: None,
        });
        Ok(self.switch(MapMode::DrawingSplitLine))
    }

    /// Store the drawn split line. Kept even when validation later refuses it.
    pub fn set_split_line(&mut self, line: Geometry) -> Result<&SplitCandidate, ModeError> {
        self.require("draw split line", MapMode::DrawingSplitLine)?;
        let candidate = self
            .split
            .as_mut()
            .ok_or(ModeError::InvariantViolation("split line without a target"))?;
        candidate.line = Some(line);
        Ok(&*candidate)
    }

    pub fn clear_split_line(&mut self) {
        if let Some(candidate) = self.split.as_mut() {
            candidate.line = None;
        }
    }

    pub fn set_draft_area(&mut self, polygon: Geometry) -> Result<(), ModeError> {
        self.require("draw area", MapMode::DrawingArea)?;
        self.draft_area = Some(polygon);
        Ok(())
    }

    pub fn clear_draft_area(&mut self) {
        self.draft_area = None;
    }

    pub fn begin_vertex_edit(
        &mut self,
        target: EditTarget,
        geometry: Geometry,
    ) -> Result<ModeChange, ModeError> {
        let ring = geometry
            .outer_ring()
            .ok_or(ModeError::InvariantViolation("vertex edit target is not a polygon"))?;
        let save_enabled = validate_edited_polygon(ring);

        self.clear_drafts();
        self.edit = Some(VertexEditSession {
            target,
            original: geometry.clone(),
            current: geometry,
            save_enabled,
        });
        Ok(self.switch(MapMode::EditingVertices))
    }

    /// Replace the edited geometry; returns whether saving is allowed.
    pub fn update_edit(&mut self, geometry: Geometry) -> Result<bool, ModeError> {
        self.require("edit vertices", MapMode::EditingVertices)?;
        let session = self
            .edit
            .as_mut()
            .ok_or(ModeError::InvariantViolation("vertex edit without a session"))?;
        session.save_enabled = geometry.outer_ring().is_some_and(validate_edited_polygon);
        session.current = geometry;
        Ok(session.save_enabled)
    }

    fn require(&self, operation: &'static str, expected: MapMode) -> Result<(), ModeError> {
        if self.mode == expected {
            Ok(())
        } else {
            Err(ModeError::WrongMode {
                operation,
                expected,
                actual: self.mode,
            })
        }
    }

    fn clear_drafts(&mut self) {
        self.draft_area = None;
        self.split = None;
        self.edit = None;
    }

    fn switch(&mut self, next: MapMode) -> ModeChange {
        let previous = std::mem::replace(&mut self.mode, next);
        if previous != next {
            info!("Mode {} -> {}", previous, next);
        }
        ModeChange {
            previous,
            current: next,
        }
    }
}

/// Where a mode request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeRequestSource {
    Rpc,
    Popup,
}

/// Mode switch or cancel. Both travel in one stream so they apply in the
/// order the host sent them.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeCommandEvent {
    Set {
        mode: MapMode,
        source: ModeRequestSource,
    },
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeEventKind {
    Created,
    Updated,
    Deleted,
}

/// Shape reported by the host's drawing tool.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct ShapeEvent {
    pub kind: ShapeEventKind,
    pub geometry: Option<Geometry>,
}

pub fn handle_mode_commands(
    mut commands: EventReader<ModeCommandEvent>,
    mut controller: ResMut<ModeController>,
    mut executor: ResMut<SplitExecutor>,
    viewer: Res<ViewerSession>,
    mut status: ResMut<StatusLine>,
) {
    for command in commands.read() {
        let (mode, source) = match *command {
            ModeCommandEvent::Cancel => {
                controller.cancel();
                executor.reset();
                continue;
            }
            ModeCommandEvent::Set { mode, source } => (mode, source),
        };

        match controller.request_mode(mode, &viewer) {
            Ok(change) if change.changed() => {
                debug!("Mode change via {:?}: {:?}", source, change);
                if change.current == MapMode::SelectingSplitTarget {
                    status.info("select the parcel to split");
                }
            }
            Ok(_) => {}
            Err(error) => {
                warn!("Mode request {} refused: {}", mode, error);
                status.error(error.to_string());
            }
        }
    }
}

/// Apply renderer side effects of the current mode and tell the host about it.
pub fn apply_mode_side_effects(
    mut last_mode: Local<Option<MapMode>>,
    controller: Res<ModeController>,
    mut sync: ResMut<LayerSynchronizer>,
    mut surface: NonSendMut<MapSurfaceHandle>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    time: Res<Time>,
) {
    let mode = controller.mode();
    if *last_mode == Some(mode) {
        return;
    }
    let previous = last_mode.replace(mode).unwrap_or_default();

    // Double click finishes a line while splitting; it must not zoom.
    surface.surface_mut().set_double_click_zoom(!mode.is_split());
    sync.arm_intercept(
        mode == MapMode::DrawingSplitLine,
        surface.surface_mut(),
        time.elapsed(),
    );

    rpc_interface.send_notification(
        "mode_changed",
        serde_json::json!({
            "mode": mode,
            "previous": previous,
            "draw_tool": mode.draw_tool(),
            "split_target": controller.split_target().map(|p| serde_json::json!({
                "id": p.id,
                "name": p.name,
            })),
        }),
    );
}
