//! Interactive parcel map engine.
//!
//! Keeps vineyard parcels, spatial areas, land records and risk points in
//! sync with a MapLibre map owned by the host page, and runs the editing
//! workflows (draw, split, boundary edit, assignment) on top of it.

pub mod backend;
pub mod engine;
pub mod geometry;
pub mod interaction;
pub mod layers;
pub mod model;
pub mod popup;
pub mod rpc;
pub mod surface;
pub mod tools;

pub use engine::core::app_setup::{EngineSet, ParcelMapPlugin, create_app};
