use std::time::Duration;

/// Number of style-ready polls before deferring to the style-loaded notification.
pub const STYLE_POLL_ATTEMPTS: u32 = 5;

/// Delay between two style-ready polls.
pub const STYLE_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Quiet period after the last viewport move/zoom before land records are refetched.
pub const VIEWPORT_RELOAD_DEBOUNCE: Duration = Duration::from_millis(1000);
