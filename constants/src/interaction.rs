use std::time::Duration;

/// Touches shorter than this may count as taps.
pub const TAP_MAX_DURATION: Duration = Duration::from_millis(500);

/// Start-to-end movement (CSS pixels) below which a touch may count as a tap.
pub const TAP_MAX_MOVEMENT_PX: f32 = 10.0;

/// A touch still held after this long becomes a long press.
pub const LONG_PRESS_DELAY: Duration = Duration::from_millis(500);
