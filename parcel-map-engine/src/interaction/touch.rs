use crate::engine::core::settings::EngineSettings;
use crate::surface::PointerLocation;
use bevy::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveTouch {
    start: PointerLocation,
    started_at: Duration,
    max_movement: f32,
    long_press: bool,
}

/// Result of a finished touch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TouchOutcome {
    Tap(PointerLocation),
    LongPress(PointerLocation),
    /// Moved or held too long to be a tap.
    Gesture,
    /// End without a matching start.
    Unmatched,
}

/// Tap and long-press detection for a single touch point.
#[derive(Resource, Debug)]
pub struct TouchTracker {
    active: Option<ActiveTouch>,
    max_duration: Duration,
    max_movement_px: f32,
    long_press_delay: Duration,
}

impl FromWorld for TouchTracker {
    fn from_world(world: &mut World) -> Self {
        let settings = world
            .get_resource::<EngineSettings>()
            .cloned()
            .unwrap_or_default();
        Self::new(
            settings.tap_max_duration(),
            settings.tap_max_movement_px,
            settings.long_press_delay(),
        )
    }
}

impl TouchTracker {
    pub fn new(max_duration: Duration, max_movement_px: f32, long_press_delay: Duration) -> Self {
        Self {
            active: None,
            max_duration,
            max_movement_px,
            long_press_delay,
        }
    }

    pub fn configure(&mut self, max_duration: Duration, max_movement_px: f32, long_press_delay: Duration) {
        self.max_duration = max_duration;
        self.max_movement_px = max_movement_px;
        self.long_press_delay = long_press_delay;
    }

    pub fn start(&mut self, location: PointerLocation, now: Duration) {
        self.active = Some(ActiveTouch {
            start: location,
            started_at: now,
            max_movement: 0.0,
            long_press: false,
        });
    }

    pub fn moved(&mut self, location: PointerLocation) {
        if let Some(touch) = self.active.as_mut() {
            touch.max_movement = touch.max_movement.max(distance(&touch.start, &location));
        }
    }

    /// Mark a still-held touch as a long press once the delay elapsed.
    /// Returns the touch location the first time it fires.
    pub fn tick(&mut self, now: Duration) -> Option<PointerLocation> {
        let touch = self.active.as_mut()?;
        if touch.long_press
            || touch.max_movement >= self.max_movement_px
            || now.saturating_sub(touch.started_at) < self.long_press_delay
        {
            return None;
        }
        touch.long_press = true;
        Some(touch.start)
    }

    pub fn end(&mut self, location: PointerLocation, now: Duration) -> TouchOutcome {
        let Some(touch) = self.active.take() else {
            return TouchOutcome::Unmatched;
        };
        if touch.long_press {
            return TouchOutcome::LongPress(touch.start);
        }

        let movement = touch.max_movement.max(distance(&touch.start, &location));
        let duration = now.saturating_sub(touch.started_at);
        if duration < self.max_duration && movement < self.max_movement_px {
            TouchOutcome::Tap(touch.start)
        } else {
            TouchOutcome::Gesture
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

fn distance(a: &PointerLocation, b: &PointerLocation) -> f32 {
    let dx = a.point[0] - b.point[0];
    let dy = a.point[1] - b.point[1];
    (dx * dx + dy * dy).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(x: f32, y: f32) -> PointerLocation {
        PointerLocation {
            point: [x, y],
            lng_lat: [8.0, 50.0],
        }
    }

    fn tracker() -> TouchTracker {
        TouchTracker::new(
            Duration::from_millis(500),
            10.0,
            Duration::from_millis(500),
        )
    }

    #[test]
    fn short_still_touch_is_a_tap() {
        let mut touches = tracker();
        touches.start(at(100.0, 100.0), Duration::ZERO);
        touches.moved(at(103.0, 104.0));
        assert_eq!(
            touches.end(at(103.0, 104.0), Duration::from_millis(200)),
            TouchOutcome::Tap(at(100.0, 100.0))
        );
    }

    #[test]
    fn movement_or_duration_breaks_a_tap() {
        let mut touches = tracker();
        touches.start(at(0.0, 0.0), Duration::ZERO);
        touches.moved(at(30.0, 0.0));
        touches.moved(at(1.0, 0.0));
        assert_eq!(
            touches.end(at(1.0, 0.0), Duration::from_millis(100)),
            TouchOutcome::Gesture
        );
    }

    #[test]
    fn held_touch_becomes_long_press() {
        let mut touches = tracker();
        touches.start(at(5.0, 5.0), Duration::ZERO);
        assert_eq!(touches.tick(Duration::from_millis(499)), None);
        assert_eq!(touches.tick(Duration::from_millis(500)), Some(at(5.0, 5.0)));
        assert_eq!(touches.tick(Duration::from_millis(600)), None);
        assert_eq!(
            touches.end(at(5.0, 5.0), Duration::from_millis(650)),
            TouchOutcome::LongPress(at(5.0, 5.0))
        );
        assert_eq!(
            touches.end(at(5.0, 5.0), Duration::from_millis(700)),
            TouchOutcome::Unmatched
        );
    }
}
