pub mod core;

/// Who is viewing the map and what they may change.
pub mod session;

/// User-facing status text.
pub mod status;
