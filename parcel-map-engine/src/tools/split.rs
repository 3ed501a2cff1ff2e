use super::mode_controller::{MapMode, ModeChange, ModeController, ModeError, ShapeEvent, ShapeEventKind};
use crate::backend::{BackendClient, BackendCompletion, BackendError, BackendRequest, RequestId, SplitResponse};
use crate::engine::status::StatusLine;
use crate::geometry::{Feature, Geometry, RecordId, SplitLineRejection, validate_split_line};
use crate::layers::{ReloadLayerEvent, ThematicLayer};
use crate::model::Parcel;
use crate::rpc::web_rpc::WebRpcInterface;
use bevy::prelude::*;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SplitError {
    #[error("a split is already being processed")]
    Busy,

    #[error(transparent)]
    Mode(#[from] ModeError),

    #[error(transparent)]
    Rejected(#[from] SplitLineRejection),

    #[error("expected a line, got a {0}")]
    UnexpectedShape(&'static str),

    #[error("no split line is waiting for confirmation")]
    NothingToConfirm,

    #[error("split failed: {0}")]
    Backend(#[from] BackendError),

    #[error("split failed: backend returned {0} parcel(s)")]
    TooFewParts(usize),
}

impl SplitError {
    /// Errors after which the split state cannot be trusted.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Mode(ModeError::InvariantViolation(_)))
    }
}

/// Question put to the user before a split is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationPrompt {
    pub parcel_id: RecordId,
    pub parcel_name: String,
    pub length_meters: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutcome {
    pub parcel_id: RecordId,
    pub parts: usize,
}

/// Drives a split from a drawn line to the backend result.
///
/// Target and line live in the [`ModeController`]; the executor only tracks
/// whether a validated line awaits confirmation and which request is in flight.
#[derive(Resource, Debug, Default)]
pub struct SplitExecutor {
    awaiting_confirmation: bool,
    processing: Option<(RequestId, RecordId)>,
}

impl SplitExecutor {
    pub fn is_processing(&self) -> bool {
        self.processing.is_some()
    }

    pub fn is_awaiting_confirmation(&self) -> bool {
        self.awaiting_confirmation
    }

    pub fn select_target(
        &self,
        controller: &mut ModeController,
        parcel: Parcel,
    ) -> Result<ModeChange, SplitError> {
        if self.is_processing() {
            return Err(SplitError::Busy);
        }
        Ok(controller.select_split_target(parcel)?)
    }

    /// Validate a completed line. A refused line stays as the draft so the
    /// user can redraw it.
    pub fn line_drawn(
        &mut self,
        controller: &mut ModeController,
        line: Geometry,
    ) -> Result<ConfirmationPrompt, SplitError> {
        if self.is_processing() {
            return Err(SplitError::Busy);
        }
        let Some(geo_line) = line.to_geo_line() else {
            return Err(SplitError::UnexpectedShape(line.kind()));
        };

        self.awaiting_confirmation = false;
        let candidate = controller.set_split_line(line)?;
        let polygon = candidate
            .target
            .geometry
            .to_geo_polygon()
            .ok_or(ModeError::InvariantViolation("split target has no polygon"))?;
        let crossing = validate_split_line(&polygon, &geo_line)?;

        self.awaiting_confirmation = true;
        let parcel = &candidate.target;
        Ok(ConfirmationPrompt {
            parcel_id: parcel.id.clone(),
            parcel_name: parcel.name.clone(),
            length_meters: crossing.length_meters,
            message: format!("Split \"{}\" into two parcels along this line?", parcel.name),
        })
    }

    /// Apply the user's answer. Returns the request id when a split was sent,
    /// `None` when the line was declined.
    pub fn decide(
        &mut self,
        controller: &mut ModeController,
        client: &mut BackendClient,
        accepted: bool,
    ) -> Result<Option<RequestId>, SplitError> {
        if self.is_processing() {
            return Err(SplitError::Busy);
        }
        if !self.awaiting_confirmation {
            return Err(SplitError::NothingToConfirm);
        }
        self.awaiting_confirmation = false;

        let candidate = controller
            .split_candidate()
            .ok_or(ModeError::InvariantViolation("confirmation without a split target"))?;
        let line = candidate
            .line
            .clone()
            .ok_or(ModeError::InvariantViolation("confirmation without a split line"))?;

        if !accepted {
            controller.clear_split_line();
            return Ok(None);
        }

        let parcel_id = candidate.target.id.clone();
        let request_id = client.issue(BackendRequest::SplitParcel {
            id: parcel_id.clone(),
            line: Feature::new(line),
        });
        self.processing = Some((request_id, parcel_id));
        Ok(Some(request_id))
    }

    /// Consume the backend answer to the split in flight. `None` when the
    /// completion belongs to another request.
    pub fn resolve(
        &mut self,
        completion: &BackendCompletion,
    ) -> Option<Result<SplitOutcome, SplitError>> {
        let (request_id, _) = self.processing.as_ref()?;
        if *request_id != completion.request_id {
            return None;
        }
        let (_, parcel_id) = self.processing.take()?;

        let result = completion
            .parse::<SplitResponse>()
            .map_err(SplitError::from)
            .and_then(|response| match response.new_parcels.len() {
                parts if parts >= 2 => Ok(SplitOutcome { parcel_id, parts }),
                parts => Err(SplitError::TooFewParts(parts)),
            });
        Some(result)
    }

    /// Forget a pending confirmation. A split in flight still completes.
    pub fn reset(&mut self) {
        self.awaiting_confirmation = false;
    }
}

/// Parcel clicked while selecting a split target.
#[derive(Event, Debug, Clone, PartialEq)]
pub struct SplitTargetSelectedEvent {
    pub parcel: Parcel,
}

/// User answered the split confirmation.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitDecisionEvent {
    pub accepted: bool,
}

pub fn handle_split_target_selection(
    mut selections: EventReader<SplitTargetSelectedEvent>,
    executor: Res<SplitExecutor>,
    mut controller: ResMut<ModeController>,
    mut status: ResMut<StatusLine>,
) {
    for selection in selections.read() {
        match executor.select_target(&mut controller, selection.parcel.clone()) {
            Ok(_) => status.info(format!(
                "draw a line across {}, double click to finish",
                selection.parcel.name
            )),
            Err(SplitError::Busy) => {
                // Nothing to select while the previous split runs.
                if controller.mode() == MapMode::SelectingSplitTarget {
                    controller.cancel();
                }
                status.error(SplitError::Busy.to_string());
            }
            Err(error) => status.error(error.to_string()),
        }
    }
}

pub fn handle_split_shapes(
    mut shapes: EventReader<ShapeEvent>,
    mut executor: ResMut<SplitExecutor>,
    mut controller: ResMut<ModeController>,
    mut status: ResMut<StatusLine>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for shape in shapes.read() {
        if controller.mode() != MapMode::DrawingSplitLine {
            continue;
        }

        let geometry = match (shape.kind, &shape.geometry) {
            (ShapeEventKind::Deleted, _) | (_, None) => {
                controller.clear_split_line();
                executor.reset();
                continue;
            }
            (_, Some(geometry)) => geometry.clone(),
        };

        match executor.line_drawn(&mut controller, geometry) {
            Ok(prompt) => match serde_json::to_value(&prompt) {
                Ok(params) => rpc_interface.send_notification("confirm_split_request", params),
                Err(e) => error!("Failed to serialize split prompt: {}", e),
            },
            Err(error) if error.is_invariant_violation() => {
                error!("Split aborted: {}", error);
                executor.reset();
                controller.cancel();
                status.error(error.to_string());
            }
            Err(error) => status.error(error.to_string()),
        }
    }
}

pub fn handle_split_decisions(
    mut decisions: EventReader<SplitDecisionEvent>,
    mut executor: ResMut<SplitExecutor>,
    mut controller: ResMut<ModeController>,
    mut client: ResMut<BackendClient>,
    mut status: ResMut<StatusLine>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for decision in decisions.read() {
        match executor.decide(&mut controller, &mut client, decision.accepted) {
            Ok(Some(_)) => {
                if let Some(parcel) = controller.split_target() {
                    status.info(format!("splitting {}", parcel.name));
                }
            }
            Ok(None) => {
                rpc_interface.send_notification(
                    "draft_updated",
                    serde_json::json!({ "kind": "split_line", "geometry": null }),
                );
                status.info("split declined, draw a new line");
            }
            Err(error) if error.is_invariant_violation() => {
                error!("Split aborted: {}", error);
                controller.cancel();
                status.error(error.to_string());
            }
            Err(error) => warn!("Split decision ignored: {}", error),
        }
    }
}

pub fn apply_split_results(
    mut completions: EventReader<BackendCompletion>,
    mut executor: ResMut<SplitExecutor>,
    mut controller: ResMut<ModeController>,
    mut status: ResMut<StatusLine>,
    mut reloads: EventWriter<ReloadLayerEvent>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for completion in completions.read() {
        let Some(result) = executor.resolve(completion) else {
            continue;
        };

        // The user may have cancelled meanwhile; only a split mode is left.
        if controller.mode().is_split() {
            controller.cancel();
        }

        match result {
            Ok(outcome) => {
                status.info(format!("split into {} parts", outcome.parts));
                rpc_interface.send_notification(
                    "split_completed",
                    serde_json::json!({
                        "parcel_id": outcome.parcel_id,
                        "parts": outcome.parts,
                    }),
                );
                reloads.write(ReloadLayerEvent {
                    layer: ThematicLayer::Parcels,
                });
            }
            Err(error) => status.error(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirming_without_a_line_is_refused() {
        let mut executor = SplitExecutor::default();
        let mut controller = ModeController::default();
        let mut client = BackendClient::default();
        assert_eq!(
            executor.decide(&mut controller, &mut client, true),
            Err(SplitError::NothingToConfirm)
        );
        assert_eq!(client.pending_count(), 0);
    }

    #[test]
    fn foreign_completions_are_ignored() {
        let mut executor = SplitExecutor::default();
        let completion = BackendCompletion {
            request_id: 9,
            request: BackendRequest::ListParcels,
            result: Ok(serde_json::Value::Null),
        };
        assert_eq!(executor.resolve(&completion), None);
    }
}
