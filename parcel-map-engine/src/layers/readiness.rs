use bevy::prelude::*;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing waiting.
    Idle,
    /// Polling the style-ready predicate; `attempts` polls have failed so far.
    Polling { attempts: u32, next_poll: Duration },
    /// Polls exhausted; waiting for the renderer's style-loaded notification.
    Deferred,
}

/// Holds jobs that need a loaded renderer style.
///
/// A job handed to [`ReadinessGate::when_ready`] runs immediately when the
/// style is ready. Otherwise the predicate is polled a bounded number of times
/// and, if still unready, the jobs wait for [`ReadinessGate::style_loaded`].
/// Nothing is ever dropped or reported as an error; equal jobs are coalesced.
#[derive(Debug, Clone)]
pub struct ReadinessGate<J> {
    pending: Vec<J>,
    state: GateState,
    max_polls: u32,
    interval: Duration,
}

impl<J: PartialEq> ReadinessGate<J> {
    pub fn new(max_polls: u32, interval: Duration) -> Self {
        Self {
            pending: Vec::new(),
            state: GateState::Idle,
            max_polls,
            interval,
        }
    }

    pub fn configure(&mut self, max_polls: u32, interval: Duration) {
        self.max_polls = max_polls;
        self.interval = interval;
    }

    /// Queue `job`; returns every queued job when `ready` is true.
    pub fn when_ready(&mut self, job: J, now: Duration, ready: bool) -> Vec<J> {
        if !self.pending.contains(&job) {
            self.pending.push(job);
        }

        if ready {
            return self.drain();
        }

        if self.state == GateState::Idle {
            self.state = self.next_poll_state(0, now);
        }
        Vec::new()
    }

    /// Advance the poll loop. Returns the queued jobs once `ready` reports true.
    pub fn poll(&mut self, now: Duration, ready: impl FnOnce() -> bool) -> Vec<J> {
        let GateState::Polling {
            attempts,
            next_poll,
        } = self.state
        else {
            return Vec::new();
        };

        if now < next_poll {
            return Vec::new();
        }

        if ready() {
            return self.drain();
        }

        let attempts = attempts + 1;
        if attempts >= self.max_polls {
            debug!(
                "Style still loading after {} polls, deferring {} job(s) to style load",
                attempts,
                self.pending.len()
            );
            self.state = GateState::Deferred;
        } else {
            self.state = self.next_poll_state(attempts, now);
        }
        Vec::new()
    }

    /// Renderer reported a loaded style: release everything.
    pub fn style_loaded(&mut self) -> Vec<J> {
        self.drain()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_deferred(&self) -> bool {
        self.state == GateState::Deferred
    }

    pub fn pending(&self) -> &[J] {
        &self.pending
    }

    fn next_poll_state(&self, attempts: u32, now: Duration) -> GateState {
        if self.max_polls == 0 {
            GateState::Deferred
        } else {
            GateState::Polling {
                attempts,
                next_poll: now + self.interval,
            }
        }
    }

    fn drain(&mut self) -> Vec<J> {
        self.state = GateState::Idle;
        std::mem::take(&mut self.pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_millis(200);

    #[test]
    fn ready_style_runs_job_at_once() {
        let mut gate = ReadinessGate::new(5, INTERVAL);
        assert_eq!(gate.when_ready("a", Duration::ZERO, true), vec!["a"]);
        assert_eq!(gate.state(), GateState::Idle);
    }

    #[test]
    fn polls_are_bounded_then_deferred() {
        let mut gate = ReadinessGate::new(5, INTERVAL);
        assert!(gate.when_ready("a", Duration::ZERO, false).is_empty());
        assert!(gate.when_ready("a", Duration::ZERO, false).is_empty());
        assert_eq!(gate.pending(), &["a"]);

        let mut polls = 0;
        for step in 1..=10u32 {
            let now = INTERVAL * step;
            gate.poll(now, || {
                polls += 1;
                false
            });
        }
        assert_eq!(polls, 5);
        assert!(gate.is_deferred());
        assert_eq!(gate.style_loaded(), vec!["a"]);
        assert!(gate.pending().is_empty());
    }

    #[test]
    fn poll_releases_jobs_when_style_becomes_ready() {
        let mut gate = ReadinessGate::new(5, INTERVAL);
        gate.when_ready(1, Duration::ZERO, false);
        gate.when_ready(2, Duration::from_millis(50), false);
        assert!(gate.poll(Duration::from_millis(100), || true).is_empty());
        assert_eq!(gate.poll(INTERVAL, || true), vec![1, 2]);
    }
}
