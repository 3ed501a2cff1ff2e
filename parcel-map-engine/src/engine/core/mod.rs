//! Application assembly and tunables.

/// Plugin wiring, system ordering and the runnable app.
///
/// Builds a headless bevy app: no window or renderer, the host page draws
/// the map and talks to the engine over postMessage.
pub mod app_setup;

/// `EngineSettings` with defaults from the `constants` crate.
pub mod settings;
