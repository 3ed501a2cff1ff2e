//! Bridge to the backend HTTP API.
//!
//! The engine does not speak HTTP. Requests leave as `backend_request`
//! notifications tagged with a request id; the host performs the call and
//! answers with a `backend_response` RPC carrying the same id. Responses are
//! matched to their request here and re-emitted as [`BackendCompletion`]
//! events that workflows read.

pub mod client;
pub mod error;

pub use client::{
    AssignResponse, BackendClient, BackendCompletion, BackendRequest, BackendResponseEvent,
    GeometryUpdateResponse, OutgoingRequest, RequestId, SplitResponse,
};
pub use error::BackendError;

use crate::engine::core::app_setup::EngineSet;
use crate::rpc::web_rpc::WebRpcInterface;
use bevy::prelude::*;

pub struct BackendPlugin;

impl Plugin for BackendPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<BackendClient>()
            .add_event::<BackendResponseEvent>()
            .add_event::<BackendCompletion>()
            .add_systems(Update, dispatch_backend_responses.in_set(EngineSet::Route))
            .add_systems(Update, flush_backend_requests.in_set(EngineSet::Output));
    }
}

fn dispatch_backend_responses(
    mut responses: EventReader<BackendResponseEvent>,
    mut client: ResMut<BackendClient>,
    mut completions: EventWriter<BackendCompletion>,
) {
    for response in responses.read() {
        let Some(request) = client.complete(response.request_id) else {
            warn!(
                "Dropping backend response for unknown request {}",
                response.request_id
            );
            continue;
        };

        let completion = BackendCompletion::from_response(request, response);
        if let Err(error) = &completion.result {
            warn!(
                "Backend {} failed: {}",
                completion.request.operation(),
                error
            );
        }
        completions.write(completion);
    }
}

fn flush_backend_requests(
    mut client: ResMut<BackendClient>,
    mut rpc_interface: ResMut<WebRpcInterface>,
) {
    for request in client.drain_outbox() {
        match serde_json::to_value(&request) {
            Ok(params) => rpc_interface.send_notification("backend_request", params),
            Err(e) => error!("Failed to serialize backend request: {}", e),
        }
    }
}
