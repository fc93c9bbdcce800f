//! Leading + trailing edge throttle for processing cycles
//!
//! [`Throttle`] never sleeps or spawns. Its owner reports triggers with
//! [`Throttle::trigger`], waits until [`Throttle::deadline`], then asks
//! [`Throttle::poll`] whether a cycle should run. This keeps the timing policy
//! testable with plain instants and lets either a cooperative host loop or the
//! [worker](crate::worker) drive it.

use std::time::Duration;

use tokio::time::Instant;

/// Current throttle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleState {
    /// No cycle pending and no suppression window open
    Idle,
    /// A leading-edge cycle is due at `at`
    Leading {
        /// When the leading cycle becomes due
        at: Instant,
    },
    /// A cycle ran recently; triggers until `until` are coalesced
    Cooling {
        /// End of the suppression window
        until: Instant,
        /// A trigger arrived during suppression
        trailing: bool,
    },
}

/// Rate limiter coalescing bursts of triggers into leading + trailing runs
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    state: ThrottleState,
}

impl Throttle {
    /// Create an idle throttle
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: ThrottleState::Idle,
        }
    }

    /// Configured interval
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Current phase
    pub fn state(&self) -> ThrottleState {
        self.state
    }

    /// Record a trigger at `now`
    pub fn trigger(&mut self, now: Instant) {
        self.state = match self.state {
            ThrottleState::Idle => ThrottleState::Leading { at: now },
            ThrottleState::Leading { at } => ThrottleState::Leading { at },
            ThrottleState::Cooling { until, .. } if now >= until => {
                ThrottleState::Leading { at: now }
            }
            ThrottleState::Cooling { until, .. } => ThrottleState::Cooling {
                until,
                trailing: true,
            },
        };
    }

    /// When the next cycle is due, if one is pending
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            ThrottleState::Leading { at } => Some(at),
            ThrottleState::Cooling {
                until,
                trailing: true,
            } => Some(until),
            _ => None,
        }
    }

    /// Check whether a cycle is due at `now`; if so the suppression window restarts
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.state {
            ThrottleState::Leading { at } if now >= at => {
                self.cool_down(now);
                true
            }
            ThrottleState::Cooling {
                until,
                trailing: true,
            } if now >= until => {
                self.cool_down(now);
                true
            }
            ThrottleState::Cooling {
                until,
                trailing: false,
            } if now >= until => {
                self.state = ThrottleState::Idle;
                false
            }
            _ => false,
        }
    }

    /// A cycle ran outside the throttle (flush); any pending run is satisfied
    pub fn on_flush(&mut self, now: Instant) {
        self.cool_down(now);
    }

    fn cool_down(&mut self, now: Instant) {
        self.state = ThrottleState::Cooling {
            until: now + self.interval,
            trailing: false,
        };
    }
}
