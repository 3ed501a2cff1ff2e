use bevy::prelude::*;
use parcel_map_engine::ParcelMapPlugin;
use parcel_map_engine::rpc::web_rpc::{DeliveredMessages, MessageQueue};
use parcel_map_engine::surface::{MapSurface, MapSurfaceHandle, RecordingSurface};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::time::Duration;

// ── Harness ──

/// Engine app driven over the RPC bridge, with a shared in-memory renderer.
struct Harness {
    app: App,
    surface: RecordingSurface,
    next_id: i64,
}

impl Harness {
    fn new() -> Self {
        Self::with_surface(RecordingSurface::loaded())
    }

    fn with_surface(surface: RecordingSurface) -> Self {
        let mut app = App::new();
        app.insert_resource(Time::<()>::default())
            .insert_non_send_resource(MapSurfaceHandle::new(surface.clone()))
            .add_plugins(ParcelMapPlugin);
        Self {
            app,
            surface,
            next_id: 0,
        }
    }

    fn push(&mut self, message: Value) {
        self.app
            .world()
            .resource::<MessageQueue>()
            .push(message.to_string());
    }

    /// Queue a request with a fresh id and return the id.
    fn request(&mut self, method: &str, params: Value) -> Value {
        self.next_id += 1;
        let id = json!(self.next_id);
        self.push(json!({ "jsonrpc": "2.0", "method": method, "params": params, "id": id }));
        id
    }

    fn notify(&mut self, method: &str, params: Value) {
        self.push(json!({ "jsonrpc": "2.0", "method": method, "params": params }));
    }

    fn advance(&mut self, by: Duration) {
        self.app.world_mut().resource_mut::<Time>().advance_by(by);
    }

    /// Run one frame and collect everything the engine sent.
    fn step(&mut self) -> Outbox {
        self.app.update();
        Outbox(
            self.app
                .world_mut()
                .resource_mut::<DeliveredMessages>()
                .take(),
        )
    }

    fn respond(&mut self, request_id: u64, status: u16, body: Value) {
        self.notify(
            "backend_response",
            json!({ "request_id": request_id, "status": status, "body": body }),
        );
    }

    /// Startup frame plus the parcel list answered with Block 7.
    fn boot_with_block_7(&mut self) -> Outbox {
        let startup = self.step();
        let list = startup.backend_request("list_parcels");
        let request_id = list["request_id"].as_u64().unwrap();
        self.respond(request_id, 200, parcels_body());
        self.step()
    }
}

struct Outbox(Vec<Value>);

impl Outbox {
    fn notifications(&self, method: &str) -> Vec<&Value> {
        self.0
            .iter()
            .filter(|m| m["method"] == method)
            .map(|m| &m["params"])
            .collect()
    }

    fn notification(&self, method: &str) -> &Value {
        let found = self.notifications(method);
        assert_eq!(found.len(), 1, "expected one {method} notification in {:#?}", self.0);
        found[0]
    }

    fn backend_request(&self, operation: &str) -> &Value {
        self.notifications("backend_request")
            .into_iter()
            .find(|params| params["operation"] == operation)
            .unwrap_or_else(|| panic!("no {operation} request in {:#?}", self.0))
    }

    fn response(&self, id: &Value) -> &Value {
        self.0
            .iter()
            .find(|m| m.get("method").is_none() && &m["id"] == id)
            .unwrap_or_else(|| panic!("no response {id} in {:#?}", self.0))
    }

    fn statuses(&self) -> Vec<&str> {
        self.notifications("status")
            .into_iter()
            .filter_map(|params| params["message"].as_str())
            .collect()
    }
}

fn parcels_body() -> Value {
    json!({
        "type": "FeatureCollection",
        "features": [{
            "type": "Feature",
            "id": 7,
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [8.0, 50.0], [8.0004, 50.0], [8.0004, 50.0003], [8.0, 50.0003], [8.0, 50.0]
                ]]
            },
            "properties": { "name": "Block 7", "company_id": 4, "area": 0.09 }
        }]
    })
}

fn inside_block_7() -> Value {
    json!({ "point": [120.0, 80.0], "lng_lat": [8.0002, 50.00015] })
}

fn member_of_4() -> Value {
    json!({ "role": "company_member", "company_id": 4 })
}

/// Select Block 7, draw a 50 m line across it and confirm. Returns the
/// `split_parcel` request id.
fn confirm_block_7_split(harness: &mut Harness) -> u64 {
    harness.notify("set_mode", json!({ "mode": "selecting-split-target" }));
    harness.step();
    harness.notify("pointer_click", inside_block_7());
    harness.step();
    harness.notify(
        "shape_created",
        json!({ "geometry": {
            "type": "LineString",
            "coordinates": [[7.99985, 50.00015], [8.00055, 50.00015]]
        }}),
    );
    harness.step();
    harness.notify("confirm_split", json!({ "accepted": true }));
    let outbox = harness.step();
    outbox.backend_request("split_parcel")["request_id"]
        .as_u64()
        .unwrap()
}

fn action_handle<'a>(popup: &'a Value, action: &str) -> &'a str {
    popup["actions"]
        .as_array()
        .and_then(|actions| actions.iter().find(|a| a["action"] == action))
        .and_then(|a| a["handle"].as_str())
        .unwrap_or_else(|| panic!("popup has no {action} action: {popup:#}"))
}

// ── Startup ──

#[test]
fn startup_requests_every_eager_layer() {
    let mut harness = Harness::new();
    let outbox = harness.step();

    let operations: Vec<&str> = outbox
        .notifications("backend_request")
        .into_iter()
        .filter_map(|params| params["operation"].as_str())
        .collect();
    assert_eq!(
        operations,
        vec!["list_parcels", "list_spatial_areas", "list_risk_points"]
    );
    assert_eq!(outbox.notification("mode_changed")["mode"], "idle");
}

#[test]
fn listed_parcels_reach_the_renderer() {
    let mut harness = Harness::new();
    harness.boot_with_block_7();

    let source = harness.surface.source("parcels").unwrap();
    assert_eq!(source.len(), 1);
    assert!(harness.surface.has_layer("parcels-fill"));
    assert!(!harness.surface.has_source("land-records"));
}

// ── Split workflow ──

#[test]
fn block_7_is_split_end_to_end() {
    let mut harness = Harness::new();
    harness.request("set_viewer", member_of_4());
    harness.boot_with_block_7();

    // Click opens a popup with the owner's actions.
    harness.notify("pointer_click", inside_block_7());
    let outbox = harness.step();
    let popup = outbox.notification("popup_open");
    assert_eq!(popup["layer"], "parcels");
    assert_eq!(popup["feature_id"], 7);
    let actions: Vec<&str> = popup["actions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["action"].as_str())
        .collect();
    assert_eq!(actions, vec!["edit_details", "split", "edit_boundary"]);
    let split = action_handle(popup, "split").to_string();
    assert!(popup["html"].as_str().unwrap().contains(&split));

    // "Split parcel" goes straight to line drawing on Block 7.
    let invoke = harness.request("popup_invoke", json!({ "handle": split }));
    let outbox = harness.step();
    assert_eq!(outbox.response(&invoke)["result"]["success"], true);
    let mode = outbox.notification("mode_changed");
    assert_eq!(mode["mode"], "drawing-split-line");
    assert_eq!(mode["draw_tool"], "draw_line_string");
    assert_eq!(mode["split_target"]["name"], "Block 7");
    assert_eq!(outbox.notifications("popup_close").len(), 1);
    assert!(harness.surface.has_layer("split-intercept-fill"));
    assert!(!harness.surface.double_click_zoom());

    // The handle died with its popup.
    let stale = harness.request("popup_invoke", json!({ "handle": split }));
    let outbox = harness.step();
    assert_eq!(outbox.response(&stale)["result"]["success"], false);

    // A 50 m line across the parcel asks for confirmation.
    harness.notify(
        "shape_created",
        json!({ "geometry": {
            "type": "LineString",
            "coordinates": [[7.99985, 50.00015], [8.00055, 50.00015]]
        }}),
    );
    let outbox = harness.step();
    let prompt = outbox.notification("confirm_split_request");
    assert_eq!(prompt["parcel_name"], "Block 7");
    assert_eq!(
        prompt["message"],
        "Split \"Block 7\" into two parcels along this line?"
    );

    harness.notify("confirm_split", json!({ "accepted": true }));
    let outbox = harness.step();
    let split_request = outbox.backend_request("split_parcel");
    assert_eq!(split_request["id"], 7);
    assert_eq!(split_request["line"]["geometry"]["type"], "LineString");
    assert!(outbox.statuses().contains(&"splitting Block 7"));
    let split_id = split_request["request_id"].as_u64().unwrap();

    harness.respond(
        split_id,
        200,
        json!({ "new_parcels": [{ "id": 71 }, { "id": 72 }] }),
    );
    let mut outbox = harness.step();
    assert!(outbox.statuses().contains(&"split into 2 parts"));
    assert_eq!(outbox.notification("split_completed")["parts"], 2);
    assert_eq!(outbox.notification("mode_changed")["mode"], "idle");
    assert!(!harness.surface.has_layer("split-intercept-fill"));
    assert!(harness.surface.double_click_zoom());

    // Parcels are refetched; the reload may land in the following frame.
    if outbox.notifications("backend_request").is_empty() {
        outbox = harness.step();
    }
    outbox.backend_request("list_parcels");
}

#[test]
fn short_split_line_is_refused_and_can_be_redrawn() {
    let mut harness = Harness::new();
    harness.request("set_viewer", member_of_4());
    harness.boot_with_block_7();

    harness.request("set_mode", json!({ "mode": "selecting-split-target" }));
    let outbox = harness.step();
    assert_eq!(outbox.notification("mode_changed")["mode"], "selecting-split-target");
    assert!(outbox.statuses().contains(&"select the parcel to split"));

    harness.notify("pointer_click", inside_block_7());
    let outbox = harness.step();
    assert!(outbox.notifications("popup_open").is_empty());
    assert_eq!(outbox.notification("mode_changed")["mode"], "drawing-split-line");

    harness.notify(
        "shape_created",
        json!({ "geometry": {
            "type": "LineString",
            "coordinates": [[8.0001, 50.00015], [8.0002, 50.00015]]
        }}),
    );
    let outbox = harness.step();
    assert!(outbox.notifications("confirm_split_request").is_empty());
    assert!(outbox.statuses().contains(&"line too short"));

    // Still drawing; cancel leaves cleanly.
    let state = harness.request("get_state", Value::Null);
    let outbox = harness.step();
    assert_eq!(outbox.response(&state)["result"]["mode"], "drawing-split-line");

    harness.notify("cancel", Value::Null);
    let outbox = harness.step();
    assert_eq!(outbox.notification("mode_changed")["mode"], "idle");
    assert!(!harness.surface.has_layer("split-intercept-fill"));
}

#[test]
fn failed_split_returns_to_idle_with_the_backend_detail() {
    let mut harness = Harness::new();
    harness.request("set_viewer", member_of_4());
    harness.boot_with_block_7();
    let split_id = confirm_block_7_split(&mut harness);

    harness.respond(split_id, 500, json!({ "detail": "geometry engine down" }));
    let outbox = harness.step();
    assert!(
        outbox
            .statuses()
            .contains(&"split failed: server error (500): geometry engine down")
    );
    assert_eq!(outbox.notification("mode_changed")["mode"], "idle");
    assert!(outbox.notifications("split_completed").is_empty());
    assert!(outbox.notifications("backend_request").is_empty());
    assert!(!harness.surface.has_layer("split-intercept-fill"));
    assert!(harness.surface.double_click_zoom());

    // Target and line are gone, and nothing is refetched.
    let state = harness.request("get_state", Value::Null);
    let outbox = harness.step();
    let state = &outbox.response(&state)["result"];
    assert_eq!(state["mode"], "idle");
    assert_eq!(state["split_target"], Value::Null);
    assert!(outbox.notifications("backend_request").is_empty());
}

#[test]
fn new_split_waits_for_the_one_in_flight() {
    let mut harness = Harness::new();
    harness.request("set_viewer", member_of_4());
    harness.boot_with_block_7();
    let split_id = confirm_block_7_split(&mut harness);

    // Leave split mode while the backend is still working.
    harness.notify("cancel", Value::Null);
    assert_eq!(harness.step().notification("mode_changed")["mode"], "idle");

    harness.notify("pointer_click", inside_block_7());
    let outbox = harness.step();
    let split = action_handle(outbox.notification("popup_open"), "split").to_string();

    harness.request("popup_invoke", json!({ "handle": split }));
    let outbox = harness.step();
    assert!(outbox.statuses().contains(&"a split is already being processed"));
    assert!(outbox.notifications("mode_changed").is_empty());
    assert!(!harness.surface.has_layer("split-intercept-fill"));

    // Picking a target by hand is refused too and falls back to idle.
    harness.notify("set_mode", json!({ "mode": "selecting-split-target" }));
    harness.step();
    harness.notify("pointer_click", inside_block_7());
    let outbox = harness.step();
    assert!(outbox.statuses().contains(&"a split is already being processed"));
    assert_eq!(outbox.notification("mode_changed")["mode"], "idle");

    // The first split still lands.
    harness.respond(
        split_id,
        200,
        json!({ "new_parcels": [{ "id": 71 }, { "id": 72 }] }),
    );
    let outbox = harness.step();
    assert!(outbox.statuses().contains(&"split into 2 parts"));
    assert_eq!(outbox.notification("split_completed")["parts"], 2);
}

// ── Mode commands ──

#[test]
fn mode_commands_apply_in_arrival_order() {
    let mut harness = Harness::new();
    harness.request("set_viewer", member_of_4());
    harness.boot_with_block_7();

    // Arm then Escape in the same frame ends idle.
    harness.notify("set_mode", json!({ "mode": "drawing-area" }));
    harness.notify("cancel", Value::Null);
    let outbox = harness.step();
    assert!(outbox.notifications("mode_changed").is_empty());
    let state = harness.request("get_state", Value::Null);
    assert_eq!(harness.step().response(&state)["result"]["mode"], "idle");

    // The reverse order leaves the mode armed.
    harness.notify("cancel", Value::Null);
    harness.notify("set_mode", json!({ "mode": "drawing-area" }));
    assert_eq!(
        harness.step().notification("mode_changed")["mode"],
        "drawing-area"
    );
}

// ── Guests ──

#[test]
fn guests_browse_read_only() {
    let mut harness = Harness::new();
    harness.boot_with_block_7();

    harness.notify("pointer_click", inside_block_7());
    let outbox = harness.step();
    let popup = outbox.notification("popup_open");
    assert_eq!(popup["actions"], json!([]));
    assert!(popup["html"].as_str().unwrap().contains("Block 7"));

    harness.request("set_mode", json!({ "mode": "drawing-area" }));
    let outbox = harness.step();
    assert!(outbox.notifications("mode_changed").is_empty());
    assert!(
        outbox
            .statuses()
            .contains(&"signed-in company required for drawing-area")
    );
}

#[test]
fn changing_viewer_closes_the_open_popup() {
    let mut harness = Harness::new();
    harness.boot_with_block_7();
    harness.notify("pointer_click", inside_block_7());
    let popup_id = harness.step().notification("popup_open")["popup_id"].clone();

    harness.request("set_viewer", member_of_4());
    let outbox = harness.step();
    assert_eq!(outbox.notification("popup_close")["popup_id"], popup_id);

    harness.notify("pointer_click", inside_block_7());
    let outbox = harness.step();
    assert_eq!(
        outbox.notification("popup_open")["actions"]
            .as_array()
            .map(Vec::len),
        Some(3)
    );
}

// ── RPC errors ──

#[test]
fn protocol_errors_are_reported_to_callers_only() {
    let mut harness = Harness::new();
    harness.step();

    let unknown = harness.request("fly_to", json!({}));
    let bad_opacity = harness.request(
        "set_layer_opacity",
        json!({ "layer": "parcels", "opacity": 1.5 }),
    );
    let bad_layer = harness.request("reload_layer", json!({ "layer": "vineyards" }));
    harness.notify("fly_to", json!({}));
    harness.push(json!({ "jsonrpc": "2.0", "id": "broken" }));
    let outbox = harness.step();

    let error = &outbox.response(&unknown)["error"];
    assert_eq!(error["code"], -32601);
    assert_eq!(error["data"]["method"], "fly_to");
    assert_eq!(outbox.response(&bad_opacity)["error"]["code"], -32602);
    assert_eq!(outbox.response(&bad_layer)["error"]["code"], -32602);
    assert_eq!(outbox.response(&json!("broken"))["error"]["code"], -32600);

    // Three requests and the malformed message; the notification gets nothing.
    let responses = outbox.0.iter().filter(|m| m.get("method").is_none()).count();
    assert_eq!(responses, 4);
}

#[test]
fn unknown_backend_responses_are_dropped() {
    let mut harness = Harness::new();
    harness.step();
    let id = harness.request(
        "backend_response",
        json!({ "request_id": 999, "status": 200, "body": {} }),
    );
    let outbox = harness.step();
    assert_eq!(outbox.response(&id)["result"]["known_request"], false);
    assert!(outbox.notifications("status").is_empty());
}

// ── Style lifecycle ──

#[test]
fn layers_wait_for_a_late_style() {
    let mut harness = Harness::with_surface(RecordingSurface::new());
    harness.boot_with_block_7();
    assert!(!harness.surface.has_source("parcels"));

    for _ in 0..8 {
        harness.advance(Duration::from_millis(200));
        harness.step();
    }
    let state = harness.request("get_state", Value::Null);
    let outbox = harness.step();
    let result = &outbox.response(&state)["result"];
    assert_eq!(result["style_deferred"], true);
    assert_eq!(result["layers"][2]["layer"], "parcels");
    assert_eq!(result["layers"][2]["loaded"], true);
    assert_eq!(result["layers"][2]["features"], 1);
    assert!(!harness.surface.has_source("parcels"));

    harness.surface.set_style_loaded(true);
    harness.notify("style_loaded", Value::Null);
    harness.step();
    assert!(harness.surface.has_source("parcels"));
    assert!(harness.surface.has_layer("parcels-label"));
}

#[test]
fn style_reload_restores_layers_without_refetching() {
    let mut harness = Harness::new();
    harness.boot_with_block_7();

    harness.surface.begin_style_reload();
    harness.surface.set_style_loaded(true);
    harness.notify("style_loaded", Value::Null);
    let outbox = harness.step();

    assert!(harness.surface.has_layer("parcels-fill"));
    assert!(outbox.notifications("backend_request").is_empty());
}

// ── Touch ──

#[test]
fn tap_opens_a_popup_and_long_press_does_not() {
    let mut harness = Harness::new();
    harness.boot_with_block_7();

    harness.notify("touch_start", inside_block_7());
    harness.step();
    harness.advance(Duration::from_millis(120));
    harness.notify("touch_end", inside_block_7());
    let outbox = harness.step();
    assert_eq!(outbox.notifications("popup_open").len(), 1);

    harness.notify("touch_start", inside_block_7());
    harness.step();
    harness.advance(Duration::from_millis(700));
    harness.step();
    harness.notify("touch_end", inside_block_7());
    let outbox = harness.step();
    assert!(outbox.notifications("popup_open").is_empty());
}

#[test]
fn dragging_finger_is_not_a_tap() {
    let mut harness = Harness::new();
    harness.boot_with_block_7();

    harness.notify("touch_start", inside_block_7());
    harness.notify(
        "touch_move",
        json!({ "point": [160.0, 80.0], "lng_lat": [8.0003, 50.00015] }),
    );
    harness.step();
    harness.notify("touch_end", inside_block_7());
    let outbox = harness.step();
    assert!(outbox.notifications("popup_open").is_empty());
}

// ── Layer controls ──

#[test]
fn visibility_and_opacity_reach_the_renderer() {
    let mut harness = Harness::new();
    harness.boot_with_block_7();

    harness.request(
        "set_layer_visibility",
        json!({ "layer": "parcels", "visible": false }),
    );
    harness.request(
        "set_layer_opacity",
        json!({ "layer": "parcels", "opacity": 0.25 }),
    );
    harness.step();

    let fill = harness.surface.layer("parcels-fill").unwrap();
    assert!(!fill.is_visible());
    assert_eq!(fill.paint["fill-opacity"], json!(0.25));

    let state = harness.request("get_state", Value::Null);
    let outbox = harness.step();
    let parcels = &outbox.response(&state)["result"]["layers"][2];
    assert_eq!(parcels["visible"], false);
    assert_eq!(parcels["opacity"], json!(0.25));
}
