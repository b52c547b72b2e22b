//! Focus and startup-grace gating for player-facing events.
use crate::state::Timestamp;

/// Opens once the engine has been running for the grace window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarningGate {
    session_start: Option<Timestamp>,
    grace_ms: u64,
}

impl WarningGate {
    #[must_use]
    pub const fn new(grace_ms: u64) -> Self {
        Self {
            session_start: None,
            grace_ms,
        }
    }

    /// Record the first timestamp the engine sees.
    pub fn observe(&mut self, now: Timestamp) {
        if self.session_start.is_none() {
            self.session_start = Some(now);
        }
    }

    #[must_use]
    pub const fn session_start(&self) -> Option<Timestamp> {
        self.session_start
    }

    #[must_use]
    pub fn grace_elapsed(&self, now: Timestamp) -> bool {
        self.session_start
            .is_some_and(|start| now.saturating_sub(start) >= self.grace_ms)
    }

    /// Whether an event for an entity may be surfaced right now.
    #[must_use]
    pub fn is_open(&self, now: Timestamp, has_focus: bool) -> bool {
        has_focus && self.grace_elapsed(now)
    }
}
