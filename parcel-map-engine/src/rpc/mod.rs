//! JSON-RPC 2.0 bridge to the host page.
//!
//! The engine runs in its own wasm module next to (or inside an iframe of)
//! the page that owns the MapLibre map. Everything crosses as postMessage
//! strings:
//!
//! ```text
//! Host page                                   Engine
//!    │ ── request / notification ──────────────> │ MessageQueue
//!    │                                           ├─ handle_rpc_messages -> events
//!    │ <──────────────────── response (with id) ─┤
//!    │ <──────────────────── notification ───────┤ WebRpcInterface
//! ```
//!
//! ## Methods
//!
//! ### Renderer events
//! - `style_loaded`, `pointer_click`, `touch_start`, `touch_move`, `touch_end`,
//!   `viewport_changed`
//! - `shape_created`, `shape_updated`, `shape_deleted` from the drawing tool
//!
//! ### Host controls
//! - `set_mode`, `cancel`, `set_viewer`, `configure`
//! - `confirm_split`, `submit_draft`, `save_edit`
//! - `popup_invoke`, `popup_closed`
//! - `set_layer_visibility`, `set_layer_opacity`, `reload_layer`
//! - `get_state`
//!
//! ### Backend
//! - `backend_response` answers a `backend_request` notification
//!
//! ## Notifications
//!
//! `mode_changed`, `status`, `confirm_split_request`, `popup_open`,
//! `popup_close`, `save_enabled`, `draft_updated`, `backend_request`,
//! `split_completed`, `edit_details_requested`.
//!
//! Messages without an id are processed like requests but never answered.
//!
//! ## Error codes
//! - `-32600`: Invalid request
//! - `-32601`: Method not found
//! - `-32602`: Invalid params
//! - `-32603`: Internal error

pub mod web_rpc;
