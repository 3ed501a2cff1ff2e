//! Interactive editing workflows.
//!
//! Drawing, splitting and boundary editing are mutually exclusive. The
//! `ModeController` resource holds the active mode and every piece of draft
//! state, and each workflow reads it when its systems run.
//!
//! ## Modes
//!
//! ```text
//! idle ──set_mode──> drawing-area ──submit ok──> idle
//!   │
//!   ├──set_mode──> selecting-split-target ──parcel click──> drawing-split-line
//!   │                                                         │
//!   │                               line drawn, confirmed ────┴──> split_parcel ──> idle
//!   │
//!   └──popup "edit boundary"──> editing-vertices ──save ok──> idle
//! ```
//!
//! `cancel` returns to idle from anywhere. Drawing an area while a split is
//! in progress is refused; the split must be cancelled first.
//!
//! ## Shape events
//!
//! The host's drawing tool reports `shape_created`, `shape_updated` and
//! `shape_deleted`. Each workflow only consumes them in its own mode.

/// Creation of parcels and spatial areas from a drawn polygon.
pub mod draw_area;

/// Mode state machine and the draft state of every workflow.
pub mod mode_controller;

/// Parcel split: target selection, line validation, confirmation, backend call.
pub mod split;

/// Boundary editing with a save gate on the edited ring.
pub mod vertex_edit;

use crate::engine::core::app_setup::EngineSet;
use bevy::prelude::*;
use draw_area::{
    DraftAreaWorkflow, DraftSubmitEvent, apply_draft_results, handle_draft_shapes,
    handle_draft_submissions,
};
use mode_controller::{
    ModeCommandEvent, ModeController, ShapeEvent, apply_mode_side_effects, handle_mode_commands,
};
use split::{
    SplitDecisionEvent, SplitExecutor, SplitTargetSelectedEvent, apply_split_results,
    handle_split_decisions, handle_split_shapes, handle_split_target_selection,
};
use vertex_edit::{
    BeginVertexEditEvent, EditSaveEvent, VertexEditWorkflow, apply_edit_results,
    handle_begin_vertex_edit, handle_edit_saves, handle_edit_shapes,
};

pub struct EditingToolsPlugin;

impl Plugin for EditingToolsPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ModeController>()
            .init_resource::<SplitExecutor>()
            .init_resource::<DraftAreaWorkflow>()
            .init_resource::<VertexEditWorkflow>()
            .add_event::<ModeCommandEvent>()
            .add_event::<ShapeEvent>()
            .add_event::<SplitTargetSelectedEvent>()
            .add_event::<SplitDecisionEvent>()
            .add_event::<DraftSubmitEvent>()
            .add_event::<BeginVertexEditEvent>()
            .add_event::<EditSaveEvent>()
            .add_systems(
                Update,
                (
                    // Mode commands first so later handlers see the new mode.
                    handle_mode_commands,
                    (handle_split_target_selection, handle_begin_vertex_edit),
                    (handle_split_shapes, handle_draft_shapes, handle_edit_shapes),
                    (handle_split_decisions, handle_draft_submissions, handle_edit_saves),
                    (apply_split_results, apply_draft_results, apply_edit_results),
                )
                    .chain()
                    .in_set(EngineSet::Workflow),
            )
            .add_systems(Update, apply_mode_side_effects.in_set(EngineSet::Sync));
    }
}
