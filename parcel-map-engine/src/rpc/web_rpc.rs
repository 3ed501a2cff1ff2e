use crate::backend::{BackendClient, BackendResponseEvent};
use crate::engine::core::settings::{EngineSettings, SettingsOverrides};
use crate::engine::session::{ViewerRole, ViewerSession};
use crate::engine::status::StatusLine;
use crate::geometry::{Bounds, Geometry};
use crate::interaction::{PointerClickEvent, TouchEvent, TouchPhase};
use crate::layers::{
    LayerControl, LayerControlEvent, LayerSynchronizer, ReloadLayerEvent, StyleLoadedEvent,
    ThematicLayer, ViewportChangedEvent,
};
use crate::model::CompanyId;
use crate::popup::{CommandRegistry, PopupClosedEvent, PopupId, PopupInvokeEvent};
use crate::surface::PointerLocation;
use crate::tools::draw_area::{DraftSubmission, DraftSubmitEvent};
use crate::tools::mode_controller::{
    MapMode, ModeCommandEvent, ModeController, ModeRequestSource, ShapeEvent,
    ShapeEventKind,
};
use crate::tools::split::SplitDecisionEvent;
use crate::tools::vertex_edit::EditSaveEvent;
use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::{JsCast, JsValue};

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
use web_sys::{MessageEvent, window};

/// JSON-RPC 2.0 request structure. Requests without an id are notifications.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 response structure.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub result: Option<Value>,
    pub error: Option<RpcError>,
    pub id: Option<Value>,
}

/// JSON-RPC 2.0 notification structure for one-way communication.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
}

/// JSON-RPC 2.0 error object.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Error)]
#[error("{message} ({code})")]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    pub data: Option<Value>,
}

/// Standard RPC error codes and constructors.
impl RpcError {
    pub fn invalid_request(message: &str) -> Self {
        Self {
            code: -32600,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: "Method not found".to_string(),
            data: Some(json!({ "method": method })),
        }
    }

    pub fn invalid_params(message: &str) -> Self {
        Self {
            code: -32602,
            message: message.to_string(),
            data: None,
        }
    }

    pub fn internal_error(message: &str) -> Self {
        Self {
            code: -32603,
            message: message.to_string(),
            data: None,
        }
    }
}

/// Resource managing bidirectional RPC communication with the host page.
#[derive(Resource, Default)]
pub struct WebRpcInterface {
    outgoing_notifications: Vec<RpcNotification>,
    outgoing_responses: Vec<RpcResponse>,
}

impl WebRpcInterface {
    /// Send notification to the host without expecting a response.
    pub fn send_notification(&mut self, method: &str, params: Value) {
        self.outgoing_notifications.push(RpcNotification {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        });
    }

    fn queue_response(&mut self, response: RpcResponse) {
        self.outgoing_responses.push(response);
    }
}

/// Raw messages waiting to be handled. Filled by the `message` listener on
/// `wasm32`, by [`MessageQueue::push`] elsewhere.
#[derive(Resource, Clone, Default)]
pub struct MessageQueue(Arc<Mutex<Vec<String>>>);

impl MessageQueue {
    pub fn push(&self, message: impl Into<String>) {
        if let Ok(mut queue) = self.0.lock() {
            queue.push(message.into());
        }
    }

    fn take(&self) -> Vec<String> {
        self.0
            .lock()
            .map(|mut queue| std::mem::take(&mut *queue))
            .unwrap_or_default()
    }
}

/// Messages kept by [`DeliveredMessages`] before the oldest are dropped.
pub const DELIVERED_HISTORY_LIMIT: usize = 512;

/// Messages that left the engine. Only filled on native builds, where there
/// is no parent window to post to. Holds the most recent
/// [`DELIVERED_HISTORY_LIMIT`] messages.
#[derive(Resource, Debug, Default)]
pub struct DeliveredMessages {
    messages: VecDeque<Value>,
}

impl DeliveredMessages {
    pub fn push(&mut self, message: Value) {
        if self.messages.len() == DELIVERED_HISTORY_LIMIT {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    pub fn take(&mut self) -> Vec<Value> {
        self.messages.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Params of every delivered notification named `method`.
    pub fn notifications(&self, method: &str) -> Vec<&Value> {
        self.messages
            .iter()
            .filter(|message| message.get("method").and_then(Value::as_str) == Some(method))
            .filter_map(|message| message.get("params"))
            .collect()
    }

    /// The response carrying `id`.
    pub fn response(&self, id: &Value) -> Option<&Value> {
        self.messages
            .iter()
            .find(|message| message.get("method").is_none() && message.get("id") == Some(id))
    }
}

/// Plugin establishing the postMessage RPC layer between engine and host page.
pub struct WebRpcPlugin;

impl Plugin for WebRpcPlugin {
    fn build(&self, app: &mut App) {
        use crate::engine::core::app_setup::EngineSet;

        app.init_resource::<WebRpcInterface>()
            .init_resource::<MessageQueue>()
            .init_resource::<DeliveredMessages>()
            .add_event::<IncomingRpcMessage>()
            .add_systems(
                Update,
                (process_incoming_messages, handle_rpc_messages)
                    .chain()
                    .in_set(EngineSet::Input),
            )
            .add_systems(Update, send_outgoing_messages.in_set(EngineSet::Flush));

        #[cfg(target_arch = "wasm32")]
        app.add_systems(Startup, setup_message_listener);
    }
}

#[cfg(target_arch = "wasm32")]
fn setup_message_listener(message_queue: Res<MessageQueue>) {
    let queue = message_queue.clone();

    let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
        if let Ok(data) = event.data().dyn_into::<js_sys::JsString>() {
            let message_str: String = data.into();
            if message_str.contains("jsonrpc") {
                queue.push(message_str);
            }
        }
    }) as Box<dyn FnMut(MessageEvent)>);

    match window() {
        Some(window) => {
            if let Err(e) =
                window.add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            {
                error!("Failed to register message listener: {:?}", e);
            }
        }
        None => error!("Window object not available"),
    }

    // Ownership moves to JS; the listener lives as long as the page.
    closure.forget();
}

/// Event representing an incoming RPC message from the host.
#[derive(Event)]
struct IncomingRpcMessage {
    content: String,
}

fn process_incoming_messages(
    message_queue: Res<MessageQueue>,
    mut message_events: EventWriter<IncomingRpcMessage>,
) {
    for message_str in message_queue.take() {
        message_events.write(IncomingRpcMessage {
            content: message_str,
        });
    }
}

/// Everything RPC methods read or write.
#[derive(SystemParam)]
pub struct RpcContext<'w> {
    controller: Res<'w, ModeController>,
    status: Res<'w, StatusLine>,
    sync: Res<'w, LayerSynchronizer>,
    client: Res<'w, BackendClient>,
    viewer: ResMut<'w, ViewerSession>,
    settings: ResMut<'w, EngineSettings>,
    registry: ResMut<'w, CommandRegistry>,
    mode_commands: EventWriter<'w, ModeCommandEvent>,
    shapes: EventWriter<'w, ShapeEvent>,
    style_loaded: EventWriter<'w, StyleLoadedEvent>,
    clicks: EventWriter<'w, PointerClickEvent>,
    touches: EventWriter<'w, TouchEvent>,
    viewport: EventWriter<'w, ViewportChangedEvent>,
    backend_responses: EventWriter<'w, BackendResponseEvent>,
    split_decisions: EventWriter<'w, SplitDecisionEvent>,
    popup_invokes: EventWriter<'w, PopupInvokeEvent>,
    popup_closes: EventWriter<'w, PopupClosedEvent>,
    drafts: EventWriter<'w, DraftSubmitEvent>,
    edit_saves: EventWriter<'w, EditSaveEvent>,
    layer_controls: EventWriter<'w, LayerControlEvent>,
    reloads: EventWriter<'w, ReloadLayerEvent>,
}

fn handle_rpc_messages(
    mut events: EventReader<IncomingRpcMessage>,
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut context: RpcContext,
) {
    for event in events.read() {
        match serde_json::from_str::<RpcRequest>(&event.content) {
            Ok(request) => {
                debug!("Processing method: {}", request.method);
                if let Some(response) = handle_rpc_request(&request, &mut context, &mut rpc_interface)
                {
                    rpc_interface.queue_response(response);
                }
            }
            Err(parse_error) => {
                warn!("Unparseable RPC message: {}", parse_error);
                // Answer only when the caller can correlate the error.
                let id = serde_json::from_str::<Value>(&event.content)
                    .ok()
                    .and_then(|value| value.get("id").cloned())
                    .filter(|id| !id.is_null());
                if let Some(id) = id {
                    rpc_interface.queue_response(create_error_response(
                        id,
                        RpcError::invalid_request(&parse_error.to_string()),
                    ));
                }
            }
        }
    }
}

/// Run one RPC method. Requests with an id get a response; notifications only log failures.
fn handle_rpc_request(
    request: &RpcRequest,
    context: &mut RpcContext,
    rpc_interface: &mut WebRpcInterface,
) -> Option<RpcResponse> {
    let params = &request.params;
    let result = match request.method.as_str() {
        "set_mode" => handle_set_mode(params, context),
        "cancel" => {
            context.mode_commands.write(ModeCommandEvent::Cancel);
            Ok(json!({ "success": true }))
        }
        "set_viewer" => handle_set_viewer(params, context, rpc_interface),
        "configure" => handle_configure(params, context),
        "shape_created" => handle_shape(params, ShapeEventKind::Created, context),
        "shape_updated" => handle_shape(params, ShapeEventKind::Updated, context),
        "shape_deleted" => handle_shape(params, ShapeEventKind::Deleted, context),
        "style_loaded" => {
            context.style_loaded.write(StyleLoadedEvent);
            Ok(json!({ "success": true }))
        }
        "pointer_click" => handle_pointer_click(params, context),
        "touch_start" => handle_touch(params, TouchPhase::Start, context),
        "touch_move" => handle_touch(params, TouchPhase::Move, context),
        "touch_end" => handle_touch(params, TouchPhase::End, context),
        "viewport_changed" => handle_viewport_changed(params, context),
        "backend_response" => handle_backend_response(params, context),
        "confirm_split" => handle_confirm_split(params, context),
        "popup_invoke" => handle_popup_invoke(params, context),
        "popup_closed" => handle_popup_closed(params, context),
        "submit_draft" => handle_submit_draft(params, context),
        "save_edit" => {
            context.edit_saves.write(EditSaveEvent);
            Ok(json!({ "success": true }))
        }
        "set_layer_visibility" => handle_layer_visibility(params, context),
        "set_layer_opacity" => handle_layer_opacity(params, context),
        "reload_layer" => handle_reload_layer(params, context),
        "get_state" => Ok(handle_get_state(context)),
        _ => Err(RpcError::method_not_found(&request.method)),
    };

    let Some(id) = request.id.clone() else {
        if let Err(error) = result {
            warn!("RPC notification {} failed: {}", request.method, error);
        }
        return None;
    };

    match result {
        Ok(result_value) => Some(RpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(result_value),
            error: None,
            id: Some(id),
        }),
        Err(error) => {
            warn!("RPC {} failed: {}", request.method, error);
            Some(create_error_response(id, error))
        }
    }
}

fn parse_params<T: DeserializeOwned>(params: &Value, expected: &str) -> Result<T, RpcError> {
    serde_json::from_value::<T>(params.clone()).map_err(|e| RpcError {
        data: Some(json!({ "detail": e.to_string() })),
        ..RpcError::invalid_params(expected)
    })
}

fn parse_layer(name: &str) -> Result<ThematicLayer, RpcError> {
    ThematicLayer::from_string(name)
        .ok_or_else(|| RpcError::invalid_params(&format!("Unknown layer: {}", name)))
}

fn handle_set_mode(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct SetModeParams {
        mode: String,
    }

    let mode_params: SetModeParams = parse_params(params, "Expected 'mode' parameter")?;
    let mode = MapMode::from_string(&mode_params.mode)
        .ok_or_else(|| RpcError::invalid_params(&format!("Unknown mode: {}", mode_params.mode)))?;

    context.mode_commands.write(ModeCommandEvent::Set {
        mode,
        source: ModeRequestSource::Rpc,
    });
    info!("Mode request dispatched: {}", mode);

    Ok(json!({ "success": true, "requested_mode": mode.as_str() }))
}

fn handle_set_viewer(
    params: &Value,
    context: &mut RpcContext,
    rpc_interface: &mut WebRpcInterface,
) -> Result<Value, RpcError> {
    let role: ViewerRole = parse_params(params, "Expected a viewer role")?;
    if context.viewer.role != role {
        info!("Viewer changed to {:?}", role);
        context.viewer.role = role;

        // Popup actions were built for the previous viewer.
        if let Some(popup) = context.registry.close_open() {
            rpc_interface.send_notification("popup_close", json!({ "popup_id": popup }));
        }
        if !context.viewer.can_edit() && context.controller.mode() != MapMode::Idle {
            context.mode_commands.write(ModeCommandEvent::Cancel);
        }
    }

    Ok(json!({ "success": true, "can_edit": context.viewer.can_edit() }))
}

fn handle_configure(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    let overrides: SettingsOverrides = parse_params(params, "Unknown or malformed setting")?;
    let mut updated = context.settings.clone();
    overrides.apply(&mut updated);
    if updated != *context.settings {
        *context.settings = updated;
    }
    serde_json::to_value(&*context.settings).map_err(|e| RpcError::internal_error(&e.to_string()))
}

fn handle_shape(
    params: &Value,
    kind: ShapeEventKind,
    context: &mut RpcContext,
) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ShapeParams {
        #[serde(default)]
        geometry: Option<Geometry>,
    }

    let shape: ShapeParams = if params.is_null() {
        ShapeParams { geometry: None }
    } else {
        parse_params(params, "Expected a GeoJSON 'geometry'")?
    };
    if kind != ShapeEventKind::Deleted && shape.geometry.is_none() {
        return Err(RpcError::invalid_params("Expected a GeoJSON 'geometry'"));
    }

    context.shapes.write(ShapeEvent {
        kind,
        geometry: shape.geometry,
    });
    Ok(json!({ "success": true }))
}

fn handle_pointer_click(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ClickParams {
        #[serde(default)]
        event_id: Option<u64>,
        #[serde(flatten)]
        location: PointerLocation,
    }

    let click: ClickParams = parse_params(params, "Expected 'point' and 'lng_lat'")?;
    context.clicks.write(PointerClickEvent {
        event_id: click.event_id,
        location: click.location,
    });
    Ok(json!({ "success": true }))
}

fn handle_touch(
    params: &Value,
    phase: TouchPhase,
    context: &mut RpcContext,
) -> Result<Value, RpcError> {
    let location: PointerLocation = parse_params(params, "Expected 'point' and 'lng_lat'")?;
    context.touches.write(TouchEvent { phase, location });
    Ok(json!({ "success": true }))
}

fn handle_viewport_changed(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ViewportParams {
        bounds: Bounds,
        zoom: f64,
    }

    let viewport: ViewportParams = parse_params(params, "Expected 'bounds' and 'zoom'")?;
    context.viewport.write(ViewportChangedEvent {
        bounds: viewport.bounds,
        zoom: viewport.zoom,
    });
    Ok(json!({ "success": true }))
}

fn handle_backend_response(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    let response: BackendResponseEvent =
        parse_params(params, "Expected 'request_id', 'status' and 'body'")?;
    let known = context.client.is_pending(response.request_id);
    context.backend_responses.write(response);
    Ok(json!({ "success": true, "known_request": known }))
}

fn handle_confirm_split(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ConfirmParams {
        accepted: bool,
    }

    let confirm: ConfirmParams = parse_params(params, "Expected 'accepted' parameter")?;
    context.split_decisions.write(SplitDecisionEvent {
        accepted: confirm.accepted,
    });
    Ok(json!({ "success": true }))
}

fn handle_popup_invoke(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct InvokeParams {
        handle: String,
        #[serde(default)]
        company_id: Option<CompanyId>,
    }

    let invoke: InvokeParams = parse_params(params, "Expected 'handle' parameter")?;
    let live = context.registry.resolve(&invoke.handle).is_some();
    context.popup_invokes.write(PopupInvokeEvent {
        handle: invoke.handle,
        company_id: invoke.company_id,
    });
    Ok(json!({ "success": live }))
}

fn handle_popup_closed(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ClosedParams {
        popup_id: PopupId,
    }

    let closed: ClosedParams = parse_params(params, "Expected 'popup_id' parameter")?;
    context.popup_closes.write(PopupClosedEvent {
        popup: closed.popup_id,
    });
    Ok(json!({ "success": true }))
}

fn handle_submit_draft(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    let submission: DraftSubmission =
        parse_params(params, "Expected parcel or spatial area attributes")?;
    context.drafts.write(DraftSubmitEvent { submission });
    Ok(json!({ "success": true }))
}

fn handle_layer_visibility(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct VisibilityParams {
        layer: String,
        visible: bool,
    }

    let visibility: VisibilityParams = parse_params(params, "Expected 'layer' and 'visible'")?;
    let layer = parse_layer(&visibility.layer)?;
    context.layer_controls.write(LayerControlEvent {
        layer,
        change: LayerControl::Visibility(visibility.visible),
    });
    Ok(json!({ "success": true }))
}

fn handle_layer_opacity(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct OpacityParams {
        layer: String,
        opacity: f32,
    }

    let opacity: OpacityParams = parse_params(params, "Expected 'layer' and 'opacity'")?;
    let layer = parse_layer(&opacity.layer)?;
    if !(0.0..=1.0).contains(&opacity.opacity) {
        return Err(RpcError::invalid_params("Opacity must be between 0 and 1"));
    }
    context.layer_controls.write(LayerControlEvent {
        layer,
        change: LayerControl::Opacity(opacity.opacity),
    });
    Ok(json!({ "success": true }))
}

fn handle_reload_layer(params: &Value, context: &mut RpcContext) -> Result<Value, RpcError> {
    #[derive(Deserialize)]
    struct ReloadParams {
        layer: String,
    }

    let reload: ReloadParams = parse_params(params, "Expected 'layer' parameter")?;
    let layer = parse_layer(&reload.layer)?;
    context.reloads.write(ReloadLayerEvent { layer });
    Ok(json!({ "success": true }))
}

fn handle_get_state(context: &RpcContext) -> Value {
    let mode = context.controller.mode();
    let layers: Vec<Value> = ThematicLayer::ALL
        .into_iter()
        .filter_map(|layer| context.sync.descriptor(layer))
        .map(|descriptor| {
            json!({
                "layer": descriptor.layer,
                "loaded": descriptor.loaded,
                "visible": descriptor.visible,
                "opacity": descriptor.opacity,
                "features": descriptor.data.len(),
            })
        })
        .collect();

    json!({
        "mode": mode.as_str(),
        "draw_tool": mode.draw_tool(),
        "split_target": context.controller.split_target().map(|parcel| json!({
            "id": parcel.id,
            "name": parcel.name,
        })),
        "has_draft": context.controller.draft_area().is_some(),
        "status": context.status.current(),
        "viewer": context.viewer.role,
        "layers": layers,
        "style_deferred": context.sync.gate().is_deferred(),
        "pending_requests": context.client.pending_count(),
    })
}

/// Create standardized error response.
fn create_error_response(id: Value, error: RpcError) -> RpcResponse {
    RpcResponse {
        jsonrpc: "2.0".to_string(),
        result: None,
        error: Some(error),
        id: Some(id),
    }
}

/// Send queued notifications and responses to the host.
fn send_outgoing_messages(
    mut rpc_interface: ResMut<WebRpcInterface>,
    mut delivered: ResMut<DeliveredMessages>,
) {
    let notifications: Vec<RpcNotification> =
        rpc_interface.outgoing_notifications.drain(..).collect();
    let responses: Vec<RpcResponse> = rpc_interface.outgoing_responses.drain(..).collect();

    // Notifications first so a response never overtakes the state it reports.
    for notification in &notifications {
        send_message_to_parent(notification, &mut delivered);
    }
    for response in &responses {
        send_message_to_parent(response, &mut delivered);
    }
}

/// Send serialized message to the parent window.
fn send_message_to_parent<T: Serialize>(message: &T, delivered: &mut DeliveredMessages) {
    #[cfg(target_arch = "wasm32")]
    {
        let _ = delivered;
        match serde_json::to_string(message) {
            Ok(json) => {
                if let Some(window) = window() {
                    if let Some(parent) = window.parent().ok().flatten() {
                        if let Err(e) = parent.post_message(&JsValue::from_str(&json), "*") {
                            error!("Failed to send message to parent: {:?}", e);
                        }
                    } else {
                        warn!("No parent window available for message transmission");
                    }
                } else {
                    error!("Window object not available");
                }
            }
            Err(e) => {
                error!("Failed to serialize message: {}", e);
            }
        }
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        match serde_json::to_value(message) {
            Ok(value) => delivered.push(value),
            Err(e) => error!("Failed to serialize message: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivered_history_keeps_the_newest_messages() {
        let mut delivered = DeliveredMessages::default();
        for n in 0..DELIVERED_HISTORY_LIMIT + 10 {
            delivered.push(json!({ "jsonrpc": "2.0", "method": "status", "params": { "n": n } }));
        }
        assert_eq!(delivered.len(), DELIVERED_HISTORY_LIMIT);

        let statuses = delivered.notifications("status");
        assert_eq!(statuses[0]["n"], json!(10));
        assert_eq!(delivered.take().len(), DELIVERED_HISTORY_LIMIT);
        assert!(delivered.is_empty());
    }
}
