//! Feature popups and the commands behind their buttons.
//!
//! A routed click opens a popup: the viewer's actions are registered in the
//! `CommandRegistry`, the HTML goes to the host with a `popup_open`
//! notification, and a button press comes back as `popup_invoke` with the
//! handle. Handles die with their popup.

/// Which actions a viewer gets for a record.
pub mod actions;

/// Popup HTML.
pub mod content;

/// Handle table scoped per popup.
pub mod registry;

pub use actions::{PopupAction, PopupTarget, build_actions};
pub use registry::{CommandRegistry, PopupCommand, PopupId};

use crate::backend::{AssignResponse, BackendClient, BackendCompletion, BackendRequest, RequestId};
use crate::engine::core::app_setup::EngineSet;
use crate::engine::session::ViewerSession;
use crate::engine::status::StatusLine;
use crate::geometry::{Feature, Position};
use crate::layers::{ReloadLayerEvent, ThematicLayer};
use crate::model::{CompanyId, LandRecordAssignment};
use crate::rpc::web_rpc::WebRpcInterface;
use crate::tools::mode_controller::{EditTarget, MapMode, ModeCommandEvent, ModeRequestSource};
use crate::tools::split::{SplitError, SplitExecutor, SplitTargetSelectedEvent};
use crate::tools::vertex_edit::BeginVertexEditEvent;
use bevy::prelude::*;
use std::collections::HashMap;

/// Open a popup for a routed click.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct PopupRequestEvent {
    pub layer: ThematicLayer,
    pub feature: Feature,
    pub lng_lat: Position,
}

/// A popup button was pressed.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct PopupInvokeEvent {
    pub handle: String,
    /// Company picked by the host for assign/reassign.
    pub company_id: Option<CompanyId>,
}

/// The host closed a popup.
#[derive(Event, Debug, Clone, Copy, PartialEq)]
pub struct PopupClosedEvent {
    pub popup: PopupId,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingAssignment {
    layer: ThematicLayer,
    removal: bool,
}

/// Assignment requests issued from popups, awaiting their response.
#[derive(Resource, Debug, Default)]
pub struct AssignmentTracker {
    pending: HashMap<RequestId, PendingAssignment>,
}

impl AssignmentTracker {
    pub fn is_pending(&self, request_id: RequestId) -> bool {
        self.pending.contains_key(&request_id)
    }
}

pub struct PopupPlugin;

impl Plugin for PopupPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<CommandRegistry>()
            .init_resource::<AssignmentTracker>()
            .add_event::<PopupRequestEvent>()
            .add_event::<PopupInvokeEvent>()
            .add_event::<PopupClosedEvent>()
            .add_systems(
                Update,
                (handle_popup_closed, open_popups, handle_popup_invokes)
                    .chain()
                    .after(crate::interaction::route_pointer_clicks)
                    .in_set(EngineSet::Route),
            )
            .add_systems(Update, apply_assignment_results.in_set(EngineSet::Workflow));
    }
}

fn handle_popup_closed(
    mut closed: EventReader<PopupClosedEvent>,
    mut registry: ResMut<CommandRegistry>,
) {
    for event in closed.read() {
        let removed = registry.close_scope(event.popup);
        debug!("Popup {} closed by host, {} commands disposed", event.popup, removed);
    }
}

fn open_popups(
    mut requests: EventReader<PopupRequestEvent>,
    mut registry: ResMut<CommandRegistry>,
    viewer: Res<ViewerSession>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    time: Res<Time>,
) {
    for request in requests.read() {
        let Some(target) = PopupTarget::from_feature(request.layer, &request.feature) else {
            warn!("Clicked {} feature has no id, no popup", request.layer.source_id());
            continue;
        };

        let (popup, previous) = registry.open_scope();
        if let Some(previous) = previous {
            rpc_interface.send_notification("popup_close", serde_json::json!({ "popup_id": previous }));
        }

        let actions: Vec<(PopupAction, String)> = build_actions(&viewer, &target)
            .into_iter()
            .map(|action| {
                let handle = registry.register(popup, action, &target, time.elapsed());
                (action, handle)
            })
            .collect();

        rpc_interface.send_notification(
            "popup_open",
            serde_json::json!({
                "popup_id": popup,
                "lng_lat": request.lng_lat,
                "layer": request.layer,
                "feature_id": target.id(),
                "html": content::render_popup(&target, &actions),
                "actions": actions
                    .iter()
                    .map(|(action, handle)| serde_json::json!({
                        "action": action,
                        "label": action.label(),
                        "handle": handle,
                        "needs_company": action.needs_company(),
                    }))
                    .collect::<Vec<_>>(),
            }),
        );
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_popup_invokes(
    mut invokes: EventReader<PopupInvokeEvent>,
    mut registry: ResMut<CommandRegistry>,
    mut tracker: ResMut<AssignmentTracker>,
    mut client: ResMut<BackendClient>,
    mut status: ResMut<StatusLine>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    split_executor: Res<SplitExecutor>,
    mut mode_commands: EventWriter<ModeCommandEvent>,
    mut split_targets: EventWriter<SplitTargetSelectedEvent>,
    mut vertex_edits: EventWriter<BeginVertexEditEvent>,
) {
    for invoke in invokes.read() {
        let Some(command) = registry.resolve(&invoke.handle).cloned() else {
            warn!("Ignoring popup command {}: popup already closed", invoke.handle);
            continue;
        };

        let target = &command.target;
        match command.action {
            PopupAction::EditDetails => rpc_interface.send_notification(
                "edit_details_requested",
                serde_json::json!({ "layer": target.layer(), "id": target.id() }),
            ),
            PopupAction::Split => {
                if split_executor.is_processing() {
                    status.error(SplitError::Busy.to_string());
                    continue;
                }
                if let PopupTarget::Parcel(parcel) = target {
                    mode_commands.write(ModeCommandEvent::Set {
                        mode: MapMode::SelectingSplitTarget,
                        source: ModeRequestSource::Popup,
                    });
                    split_targets.write(SplitTargetSelectedEvent {
                        parcel: parcel.clone(),
                    });
                }
            }
            PopupAction::EditBoundary => {
                if let Some(geometry) = target.geometry() {
                    vertex_edits.write(BeginVertexEditEvent {
                        target: EditTarget {
                            layer: target.layer(),
                            id: target.id().clone(),
                            name: target.title().to_string(),
                        },
                        geometry: geometry.clone(),
                    });
                }
            }
            PopupAction::Assign | PopupAction::Reassign => {
                let Some(company_id) = invoke.company_id.clone() else {
                    status.error("choose a company to assign");
                    continue;
                };
                let request = match target {
                    PopupTarget::LandRecord(record) => BackendRequest::AssignLandRecord {
                        id: record.id.clone(),
                        assignment: LandRecordAssignment {
                            company_id,
                            note: None,
                        },
                    },
                    _ => BackendRequest::AssignParcel {
                        id: target.id().clone(),
                        company_id,
                    },
                };
                let request_id = client.issue(request);
                tracker.pending.insert(
                    request_id,
                    PendingAssignment {
                        layer: target.layer(),
                        removal: false,
                    },
                );
            }
            PopupAction::RemoveAssignment => {
                let Some(company_id) = target.owner().cloned() else {
                    status.error(format!("{} is not assigned", target.title()));
                    continue;
                };
                let request_id = client.issue(BackendRequest::RemoveAssignment {
                    id: target.id().clone(),
                    company_id,
                    layer: target.layer(),
                });
                tracker.pending.insert(
                    request_id,
                    PendingAssignment {
                        layer: target.layer(),
                        removal: true,
                    },
                );
            }
        }

        // Every action leaves the popup.
        registry.close_scope(command.popup);
        rpc_interface.send_notification("popup_close", serde_json::json!({ "popup_id": command.popup }));
    }
}

fn apply_assignment_results(
    mut completions: EventReader<BackendCompletion>,
    mut tracker: ResMut<AssignmentTracker>,
    mut status: ResMut<StatusLine>,
    mut reloads: EventWriter<ReloadLayerEvent>,
) {
    for completion in completions.read() {
        let Some(pending) = tracker.pending.remove(&completion.request_id) else {
            continue;
        };

        match completion.parse::<AssignResponse>() {
            Ok(_) if pending.removal => status.info("assignment removed"),
            Ok(response) => status.info(format!(
                "assigned to {}",
                response.company_name.as_deref().unwrap_or("company")
            )),
            Err(error) => {
                status.error(format!("assignment failed: {}", error));
                continue;
            }
        }
        reloads.write(ReloadLayerEvent {
            layer: pending.layer,
        });
    }
}
