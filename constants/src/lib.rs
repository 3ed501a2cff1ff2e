//! Shared compile-time defaults for the parcel map engine.
//!
//! Values here are the fallbacks used by `EngineSettings`; anything that a
//! deployment may want to tune is also exposed there.

pub mod interaction;
pub mod layers;
pub mod render_settings;
pub mod timing;
pub mod validation;
pub mod zone;
