use bevy::prelude::*;
use constants::interaction::{LONG_PRESS_DELAY, TAP_MAX_DURATION, TAP_MAX_MOVEMENT_PX};
use constants::layers::LAND_RECORD_MIN_ZOOM;
use constants::timing::{STYLE_POLL_ATTEMPTS, STYLE_POLL_INTERVAL, VIEWPORT_RELOAD_DEBOUNCE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const DEFAULT_LOG_FILTER: &str = "info,parcel_map_engine=debug";

/// Tunable engine parameters. Defaults come from the `constants` crate.
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    pub style_poll_attempts: u32,
    pub style_poll_interval_ms: u64,
    pub viewport_debounce_ms: u64,
    pub land_record_min_zoom: f64,
    pub tap_max_duration_ms: u64,
    pub tap_max_movement_px: f32,
    pub long_press_ms: u64,
    pub log_filter: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            style_poll_attempts: STYLE_POLL_ATTEMPTS,
            style_poll_interval_ms: STYLE_POLL_INTERVAL.as_millis() as u64,
            viewport_debounce_ms: VIEWPORT_RELOAD_DEBOUNCE.as_millis() as u64,
            land_record_min_zoom: LAND_RECORD_MIN_ZOOM,
            tap_max_duration_ms: TAP_MAX_DURATION.as_millis() as u64,
            tap_max_movement_px: TAP_MAX_MOVEMENT_PX,
            long_press_ms: LONG_PRESS_DELAY.as_millis() as u64,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl EngineSettings {
    /// Defaults overridden by `PARCEL_MAP_*` environment variables (native builds).
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            style_poll_attempts: env_or("PARCEL_MAP_STYLE_POLL_ATTEMPTS", defaults.style_poll_attempts),
            style_poll_interval_ms: env_or(
                "PARCEL_MAP_STYLE_POLL_INTERVAL_MS",
                defaults.style_poll_interval_ms,
            ),
            viewport_debounce_ms: env_or(
                "PARCEL_MAP_VIEWPORT_DEBOUNCE_MS",
                defaults.viewport_debounce_ms,
            ),
            land_record_min_zoom: env_or(
                "PARCEL_MAP_LAND_RECORD_MIN_ZOOM",
                defaults.land_record_min_zoom,
            ),
            tap_max_duration_ms: env_or("PARCEL_MAP_TAP_MAX_MS", defaults.tap_max_duration_ms),
            tap_max_movement_px: env_or("PARCEL_MAP_TAP_MAX_PX", defaults.tap_max_movement_px),
            long_press_ms: env_or("PARCEL_MAP_LONG_PRESS_MS", defaults.long_press_ms),
            log_filter: std::env::var("PARCEL_MAP_LOG").unwrap_or(defaults.log_filter),
        }
    }

    pub fn style_poll_interval(&self) -> Duration {
        Duration::from_millis(self.style_poll_interval_ms)
    }

    pub fn viewport_debounce(&self) -> Duration {
        Duration::from_millis(self.viewport_debounce_ms)
    }

    pub fn tap_max_duration(&self) -> Duration {
        Duration::from_millis(self.tap_max_duration_ms)
    }

    pub fn long_press_delay(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Partial settings accepted by the `configure` RPC.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsOverrides {
    pub style_poll_attempts: Option<u32>,
    pub style_poll_interval_ms: Option<u64>,
    pub viewport_debounce_ms: Option<u64>,
    pub land_record_min_zoom: Option<f64>,
    pub tap_max_duration_ms: Option<u64>,
    pub tap_max_movement_px: Option<f32>,
    pub long_press_ms: Option<u64>,
}

impl SettingsOverrides {
    pub fn apply(&self, settings: &mut EngineSettings) {
        macro_rules! apply {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    settings.$field = value;
                })*
            };
        }
        apply!(
            style_poll_attempts,
            style_poll_interval_ms,
            viewport_debounce_ms,
            land_record_min_zoom,
            tap_max_duration_ms,
            tap_max_movement_px,
            long_press_ms
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_touch_given_fields() {
        let mut settings = EngineSettings::default();
        let overrides: SettingsOverrides =
            serde_json::from_str(r#"{"style_poll_attempts": 2, "viewport_debounce_ms": 250}"#)
                .unwrap();
        overrides.apply(&mut settings);
        assert_eq!(settings.style_poll_attempts, 2);
        assert_eq!(settings.viewport_debounce(), Duration::from_millis(250));
        assert_eq!(settings.land_record_min_zoom, LAND_RECORD_MIN_ZOOM);
    }

    #[test]
    fn unknown_override_is_rejected() {
        assert!(serde_json::from_str::<SettingsOverrides>(r#"{"colour": "red"}"#).is_err());
    }
}
