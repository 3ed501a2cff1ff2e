use super::mode_controller::{MapMode, ModeController, ModeError, ShapeEvent, ShapeEventKind};
use crate::backend::{BackendClient, BackendCompletion, BackendError, BackendRequest, RequestId};
use crate::engine::status::StatusLine;
use crate::geometry::{Geometry, area_hectares, validate_edited_polygon};
use crate::layers::{ReloadLayerEvent, ThematicLayer};
use crate::model::{ParcelAttributes, SpatialAreaAttributes};
use crate::rpc::web_rpc::WebRpcInterface;
use bevy::prelude::*;
use serde::Deserialize;
use thiserror::Error;

/// Attributes entered for a drawn area, deciding what it becomes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DraftSubmission {
    Parcel(ParcelAttributes),
    SpatialArea(SpatialAreaAttributes),
}

impl DraftSubmission {
    pub fn layer(&self) -> ThematicLayer {
        match self {
            Self::Parcel(_) => ThematicLayer::Parcels,
            Self::SpatialArea(_) => ThematicLayer::SpatialAreas,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Parcel(attributes) => &attributes.name,
            Self::SpatialArea(attributes) => &attributes.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DraftError {
    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error("draw an area first")]
    NoDraft,

    #[error("area needs at least three corners")]
    InvalidRing,

    #[error("name is required")]
    EmptyName,

    #[error("the previous area is still being saved")]
    Busy,
}

/// Creation of parcels and spatial areas from a drawn polygon.
#[derive(Resource, Debug, Default)]
pub struct DraftAreaWorkflow {
    pending: Option<(RequestId, ThematicLayer)>,
}

impl DraftAreaWorkflow {
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Track the drawing tool's polygon. Returns its area in hectares while one exists.
    pub fn shape_changed(
        &self,
        controller: &mut ModeController,
        kind: ShapeEventKind,
        geometry: Option<Geometry>,
    ) -> Result<Option<f64>, ModeError> {
        match (kind, geometry) {
            (ShapeEventKind::Deleted, _) | (_, None) => {
                controller.clear_draft_area();
                Ok(None)
            }
            (_, Some(geometry)) => {
                let area = geometry.to_geo_polygon().map(|p| area_hectares(&p));
                controller.set_draft_area(geometry)?;
                Ok(area)
            }
        }
    }

    pub fn submit(
        &mut self,
        controller: &ModeController,
        client: &mut BackendClient,
        submission: DraftSubmission,
    ) -> Result<RequestId, DraftError> {
        if controller.mode() != MapMode::DrawingArea {
            return Err(ModeError::WrongMode {
                operation: "submit area",
                expected: MapMode::DrawingArea,
                actual: controller.mode(),
            }
            .into());
        }
        if self.is_pending() {
            return Err(DraftError::Busy);
        }

        let draft = controller.draft_area().ok_or(DraftError::NoDraft)?;
        if !draft.outer_ring().is_some_and(validate_edited_polygon) {
            return Err(DraftError::InvalidRing);
        }
        if submission.name().trim().is_empty() {
            return Err(DraftError::EmptyName);
        }

        let layer = submission.layer();
        let geometry = draft.clone();
        let request = match submission {
            DraftSubmission::Parcel(attributes) => BackendRequest::CreateParcel {
                attributes,
                geometry,
            },
            DraftSubmission::SpatialArea(attributes) => BackendRequest::CreateSpatialArea {
                attributes,
                geometry,
            },
        };
        let request_id = client.issue(request);
        self.pending = Some((request_id, layer));
        Ok(request_id)
    }

    /// Apply the create result. Success ends drawing; a refused draft is kept
    /// for correction while any other failure drops it.
    pub fn resolve(
        &mut self,
        completion: &BackendCompletion,
        controller: &mut ModeController,
    ) -> Option<Result<ThematicLayer, BackendError>> {
        let (request_id, layer) = self.pending?;
        if request_id != completion.request_id {
            return None;
        }
        self.pending = None;

        match &completion.result {
            Ok(_) => {
                if controller.mode() == MapMode::DrawingArea {
                    controller.cancel();
                }
                Some(Ok(layer))
            }
            Err(error) => {
                if !error.is_validation() {
                    controller.clear_draft_area();
                }
                Some(Err(error.clone()))
            }
        }
    }
}

#[derive(Event, Debug, Clone, PartialEq)]
pub struct DraftSubmitEvent {
    pub submission: DraftSubmission,
}

pub fn handle_draft_shapes(
    mut shapes: EventReader<ShapeEvent>,
    workflow: Res<DraftAreaWorkflow>,
    mut controller: ResMut<ModeController>,
    mut status: ResMut<StatusLine>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for shape in shapes.read() {
        if controller.mode() != MapMode::DrawingArea {
            continue;
        }

        match workflow.shape_changed(&mut controller, shape.kind, shape.geometry.clone()) {
            Ok(area) => {
                if let Some(area) = area {
                    status.info(format!("area {:.2} ha", area));
                }
                rpc_interface.send_notification(
                    "draft_updated",
                    serde_json::json!({
                        "kind": "area",
                        "geometry": controller.draft_area(),
                        "area_hectares": area,
                    }),
                );
            }
            Err(error) => warn!("Draft shape ignored: {}", error),
        }
    }
}

pub fn handle_draft_submissions(
    mut submissions: EventReader<DraftSubmitEvent>,
    mut workflow: ResMut<DraftAreaWorkflow>,
    controller: Res<ModeController>,
    mut client: ResMut<BackendClient>,
    mut status: ResMut<StatusLine>,
) {
    for event in submissions.read() {
        match workflow.submit(&controller, &mut client, event.submission.clone()) {
            Ok(_) => status.info("saving area"),
            Err(error) => status.error(error.to_string()),
        }
    }
}

pub fn apply_draft_results(
    mut completions: EventReader<BackendCompletion>,
    mut workflow: ResMut<DraftAreaWorkflow>,
    mut controller: ResMut<ModeController>,
    mut status: ResMut<StatusLine>,
    mut reloads: EventWriter<ReloadLayerEvent>,
) {
    for completion in completions.read() {
        match workflow.resolve(completion, &mut controller) {
            Some(Ok(layer)) => {
                status.info("area saved");
                reloads.write(ReloadLayerEvent { layer });
            }
            Some(Err(error)) => status.error(format!("could not save area: {}", error)),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn triangle() -> Geometry {
        Geometry::polygon(vec![[8.0, 50.0], [8.001, 50.0], [8.0, 50.001], [8.0, 50.0]])
    }

    #[test]
    fn submission_needs_drawing_mode_and_draft() {
        let idle = ModeController::default();
        let mut workflow = DraftAreaWorkflow::default();
        let mut client = BackendClient::default();
        let submission: DraftSubmission =
            serde_json::from_value(json!({"kind": "parcel", "name": "East"})).unwrap();

        assert!(matches!(
            workflow.submit(&idle, &mut client, submission.clone()),
            Err(DraftError::Mode(_))
        ));

        let mut controller = ModeController::default();
        controller.set_mode(MapMode::DrawingArea).unwrap();
        assert_eq!(
            workflow.submit(&controller, &mut client, submission.clone()),
            Err(DraftError::NoDraft)
        );

        controller.set_draft_area(triangle()).unwrap();
        assert!(workflow.submit(&controller, &mut client, submission).is_ok());
        assert!(workflow.is_pending());
    }

    #[test]
    fn network_failure_drops_draft_but_validation_keeps_it() {
        let mut controller = ModeController::default();
        controller.set_mode(MapMode::DrawingArea).unwrap();
        controller.set_draft_area(triangle()).unwrap();

        let mut workflow = DraftAreaWorkflow::default();
        let mut client = BackendClient::default();
        let submission = DraftSubmission::Parcel(ParcelAttributes {
            name: "East".to_string(),
            variety: None,
        });

        let id = workflow
            .submit(&controller, &mut client, submission.clone())
            .unwrap();
        let refused = BackendCompletion {
            request_id: id,
            request: BackendRequest::ListParcels,
            result: Err(BackendError::from_status(422, &json!({"detail": "overlaps"}))),
        };
        assert!(matches!(
            workflow.resolve(&refused, &mut controller),
            Some(Err(_))
        ));
        assert!(controller.draft_area().is_some());

        let id = workflow.submit(&controller, &mut client, submission).unwrap();
        let offline = BackendCompletion {
            request_id: id,
            request: BackendRequest::ListParcels,
            result: Err(BackendError::from_status(0, &serde_json::Value::Null)),
        };
        workflow.resolve(&offline, &mut controller);
        assert!(controller.draft_area().is_none());
        assert_eq!(controller.mode(), MapMode::DrawingArea);
    }
}
