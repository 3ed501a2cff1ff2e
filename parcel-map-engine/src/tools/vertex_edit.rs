use super::mode_controller::{EditTarget, MapMode, ModeController, ModeError, ShapeEvent, ShapeEventKind};
use crate::backend::{
    BackendClient, BackendCompletion, BackendError, BackendRequest, GeometryUpdateResponse,
    RequestId,
};
use crate::engine::status::StatusLine;
use crate::geometry::{Geometry, area_hectares};
use crate::layers::{ReloadLayerEvent, ThematicLayer};
use crate::rpc::web_rpc::WebRpcInterface;
use bevy::prelude::*;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("boundary needs at least three corners")]
    InvalidRing,

    #[error("{0} boundaries cannot be edited")]
    NotEditable(&'static str),

    #[error("the previous boundary is still being saved")]
    Busy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EditOutcome {
    pub target: EditTarget,
    pub area_hectares: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingSave {
    request_id: RequestId,
    target: EditTarget,
    geometry: Geometry,
}

/// Boundary editing of parcels and spatial areas by dragging vertices.
#[derive(Resource, Debug, Default)]
pub struct VertexEditWorkflow {
    pending: Option<PendingSave>,
}

impl VertexEditWorkflow {
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn begin(
        &self,
        controller: &mut ModeController,
        target: EditTarget,
        geometry: Geometry,
    ) -> Result<bool, EditError> {
        if !matches!(
            target.layer,
            ThematicLayer::Parcels | ThematicLayer::SpatialAreas
        ) {
            return Err(EditError::NotEditable(target.layer.source_id()));
        }
        controller.begin_vertex_edit(target, geometry)?;
        Ok(controller
            .edit_session()
            .is_some_and(|session| session.save_enabled))
    }

    pub fn save(
        &mut self,
        controller: &ModeController,
        client: &mut BackendClient,
    ) -> Result<RequestId, EditError> {
        if self.is_pending() {
            return Err(EditError::Busy);
        }
        let session = controller.edit_session().ok_or(ModeError::WrongMode {
            operation: "save boundary",
            expected: MapMode::EditingVertices,
            actual: controller.mode(),
        })?;
        if !session.save_enabled {
            return Err(EditError::InvalidRing);
        }

        let target = session.target.clone();
        let geometry = session.current.clone();
        let request = match target.layer {
            ThematicLayer::SpatialAreas => BackendRequest::UpdateSpatialAreaGeometry {
                id: target.id.clone(),
                geometry: geometry.clone(),
            },
            ThematicLayer::Parcels => BackendRequest::UpdateParcelGeometry {
                id: target.id.clone(),
                geometry: geometry.clone(),
            },
            other => return Err(EditError::NotEditable(other.source_id())),
        };

        let request_id = client.issue(request);
        self.pending = Some(PendingSave {
            request_id,
            target,
            geometry,
        });
        Ok(request_id)
    }

    /// Apply the update result. The backend's area wins over the local estimate.
    pub fn resolve(
        &mut self,
        completion: &BackendCompletion,
        controller: &mut ModeController,
    ) -> Option<Result<EditOutcome, BackendError>> {
        if self.pending.as_ref()?.request_id != completion.request_id {
            return None;
        }
        let pending = self.pending.take()?;

        let result = completion
            .parse::<GeometryUpdateResponse>()
            .map(|response| EditOutcome {
                area_hectares: response.area_hectares().or_else(|| {
                    pending.geometry.to_geo_polygon().map(|p| area_hectares(&p))
                }),
                target: pending.target,
            });

        let keep_session = matches!(&result, Err(error) if error.is_validation());
        if !keep_session && controller.mode() == MapMode::EditingVertices {
            controller.cancel();
        }
        Some(result)
    }
}

/// Start editing a record's boundary (popup action).
#[derive(Event, Debug, Clone, PartialEq)]
pub struct BeginVertexEditEvent {
    pub target: EditTarget,
    pub geometry: Geometry,
}

/// Save the edited boundary.
#[derive(Event, Debug, Clone, Copy, Default)]
pub struct EditSaveEvent;

pub fn handle_begin_vertex_edit(
    mut events: EventReader<BeginVertexEditEvent>,
    workflow: Res<VertexEditWorkflow>,
    mut controller: ResMut<ModeController>,
    mut status: ResMut<StatusLine>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for event in events.read() {
        match workflow.begin(&mut controller, event.target.clone(), event.geometry.clone()) {
            Ok(save_enabled) => {
                status.info(format!("editing {}, drag the corners", event.target.name));
                rpc_interface.send_notification(
                    "save_enabled",
                    serde_json::json!({ "enabled": save_enabled }),
                );
            }
            Err(error) => status.error(error.to_string()),
        }
    }
}

pub fn handle_edit_shapes(
    mut shapes: EventReader<ShapeEvent>,
    mut controller: ResMut<ModeController>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for shape in shapes.read() {
        if controller.mode() != MapMode::EditingVertices || shape.kind != ShapeEventKind::Updated {
            continue;
        }
        let Some(geometry) = shape.geometry.clone() else {
            continue;
        };

        match controller.update_edit(geometry) {
            Ok(save_enabled) => rpc_interface.send_notification(
                "save_enabled",
                serde_json::json!({ "enabled": save_enabled }),
            ),
            Err(error) => warn!("Vertex update ignored: {}", error),
        }
    }
}

pub fn handle_edit_saves(
    mut saves: EventReader<EditSaveEvent>,
    mut workflow: ResMut<VertexEditWorkflow>,
    controller: Res<ModeController>,
    mut client: ResMut<BackendClient>,
    mut status: ResMut<StatusLine>,
) {
    for _ in saves.read() {
        match workflow.save(&controller, &mut client) {
            Ok(_) => status.info("saving boundary"),
            Err(error) => status.error(error.to_string()),
        }
    }
}

pub fn apply_edit_results(
    mut completions: EventReader<BackendCompletion>,
    mut workflow: ResMut<VertexEditWorkflow>,
    mut controller: ResMut<ModeController>,
    mut status: ResMut<StatusLine>,
    mut reloads: EventWriter<ReloadLayerEvent>,
) {
    for completion in completions.read() {
        match workflow.resolve(completion, &mut controller) {
            Some(Ok(outcome)) => {
                match outcome.area_hectares {
                    Some(area) => status.info(format!(
                        "{} saved, {:.2} ha",
                        outcome.target.name, area
                    )),
                    None => status.info(format!("{} saved", outcome.target.name)),
                }
                reloads.write(ReloadLayerEvent {
                    layer: outcome.target.layer,
                });
            }
            Some(Err(error)) => status.error(format!("could not save boundary: {}", error)),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RecordId;
    use serde_json::json;

    fn target() -> EditTarget {
        EditTarget {
            layer: ThematicLayer::Parcels,
            id: RecordId::Number(3),
            name: "Hillside".to_string(),
        }
    }

    fn square() -> Geometry {
        Geometry::polygon(vec![
            [8.0, 50.0],
            [8.0014, 50.0],
            [8.0014, 50.0009],
            [8.0, 50.0009],
            [8.0, 50.0],
        ])
    }

    #[test]
    fn save_is_gated_by_the_current_ring() {
        let mut controller = ModeController::default();
        let mut workflow = VertexEditWorkflow::default();
        let mut client = BackendClient::default();

        assert_eq!(workflow.begin(&mut controller, target(), square()), Ok(true));
        controller
            .update_edit(Geometry::polygon(vec![[8.0, 50.0], [8.1, 50.0], [8.0, 50.0]]))
            .unwrap();
        assert_eq!(
            workflow.save(&controller, &mut client),
            Err(EditError::InvalidRing)
        );

        controller.update_edit(square()).unwrap();
        let id = workflow.save(&controller, &mut client).unwrap();
        let done = BackendCompletion {
            request_id: id,
            request: BackendRequest::ListParcels,
            result: Ok(json!({"area": "1.02"})),
        };
        let outcome = workflow.resolve(&done, &mut controller).unwrap().unwrap();
        assert_eq!(outcome.area_hectares, Some(1.02));
        assert_eq!(controller.mode(), MapMode::Idle);
    }

    #[test]
    fn risk_points_are_not_editable() {
        let mut controller = ModeController::default();
        let workflow = VertexEditWorkflow::default();
        let mut risk = target();
        risk.layer = ThematicLayer::RiskPoints;
        assert!(matches!(
            workflow.begin(&mut controller, risk, square()),
            Err(EditError::NotEditable(_))
        ));
        assert_eq!(controller.mode(), MapMode::Idle);
    }
}
