//! Cross-container move guard.
//!
//! While a dragged item hovers over the seam between two containers, the
//! hover target can flip on every pointer event and the item would bounce
//! between them. The guard keeps a short-lived lock on the last accepted
//! container move: until the lock expires, the exact inverse move is
//! refused. Every other move is accepted and replaces the lock.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::entity::ContainerId;

/// Default cooldown before a move may be reversed
pub const DEFAULT_COOLDOWN_MS: u64 = 50;

/// An accepted container move and the instant its lock expires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerMove {
    pub at: Instant,
    pub from: Option<ContainerId>,
    pub to: Option<ContainerId>,
    expires_at: Instant,
}

impl ContainerMove {
    fn is_inverse_of(&self, from: Option<&str>, to: Option<&str>) -> bool {
        self.from.as_deref() == to && self.to.as_deref() == from
    }
}

/// Outcome of asking the guard for permission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Accepted,
    /// The move reverses the previous one inside the cooldown window
    Vetoed,
}

#[derive(Debug, Clone)]
pub struct MoveGuard {
    cooldown: Duration,
    last: Option<ContainerMove>,
}

impl Default for MoveGuard {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_COOLDOWN_MS))
    }
}

impl MoveGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Last accepted move, if any
    pub fn last(&self) -> Option<&ContainerMove> {
        self.last.as_ref()
    }

    pub fn check(&mut self, from: Option<&str>, to: Option<&str>) -> GuardDecision {
        self.check_at(from, to, Instant::now())
    }

    /// Decide on a move requested at `now`; accepted moves are recorded.
    pub fn check_at(&mut self, from: Option<&str>, to: Option<&str>, now: Instant) -> GuardDecision {
        if let Some(last) = &self.last {
            if now < last.expires_at && last.is_inverse_of(from, to) {
                debug!(?from, ?to, "container move vetoed inside cooldown");
                return GuardDecision::Vetoed;
            }
        }

        self.last = Some(ContainerMove {
            at: now,
            from: from.map(str::to_string),
            to: to.map(str::to_string),
            expires_at: now + self.cooldown,
        });
        GuardDecision::Accepted
    }

    /// Forget the last move (end of a drag gesture)
    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_within_cooldown_is_vetoed() {
        let mut guard = MoveGuard::new(Duration::from_millis(50));
        let t0 = Instant::now();

        assert_eq!(guard.check_at(Some("X"), Some("Y"), t0), GuardDecision::Accepted);
        assert_eq!(
            guard.check_at(Some("Y"), Some("X"), t0 + Duration::from_millis(10)),
            GuardDecision::Vetoed
        );
        // The veto does not replace the recorded move.
        assert_eq!(guard.last().unwrap().to.as_deref(), Some("Y"));
    }

    #[test]
    fn inverse_after_cooldown_is_accepted() {
        let mut guard = MoveGuard::new(Duration::from_millis(50));
        let t0 = Instant::now();

        guard.check_at(Some("X"), Some("Y"), t0);
        assert_eq!(
            guard.check_at(Some("Y"), Some("X"), t0 + Duration::from_millis(50)),
            GuardDecision::Accepted
        );
    }

    #[test]
    fn unrelated_moves_are_accepted_and_recorded() {
        let mut guard = MoveGuard::default();
        let t0 = Instant::now();

        guard.check_at(Some("X"), Some("Y"), t0);
        assert_eq!(
            guard.check_at(Some("Y"), Some("Z"), t0 + Duration::from_millis(1)),
            GuardDecision::Accepted
        );
        // Y->Z replaced X->Y, so reversing the first move is allowed.
        assert_eq!(
            guard.check_at(Some("Y"), Some("X"), t0 + Duration::from_millis(2)),
            GuardDecision::Accepted
        );
        assert_eq!(
            guard.check_at(Some("X"), Some("Y"), t0 + Duration::from_millis(3)),
            GuardDecision::Vetoed
        );
    }

    #[test]
    fn reset_clears_the_lock() {
        let mut guard = MoveGuard::default();
        let t0 = Instant::now();
        guard.check_at(Some("X"), Some("Y"), t0);
        guard.reset();
        assert_eq!(guard.check_at(Some("Y"), Some("X"), t0), GuardDecision::Accepted);
    }
}
