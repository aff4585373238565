//! [`ActuationGate`] – cooldown gate between a verdict and the actuator.
//!
//! An obstacle stays inside the detection boxes for several poll cycles.
//! Without a gate every one of those cycles would jump again.  The gate
//! fires on its first request and afterwards only once `cooldown` has
//! elapsed since the last time it fired.
//!
//! # Example
//!
//! ```
//! use std::time::{Duration, Instant};
//! use dinobot_kernel::actuation_gate::ActuationGate;
//!
//! let cooldown = Duration::from_millis(300);
//! let t0 = Instant::now();
//! let mut gate = ActuationGate::new();
//!
//! assert!(gate.try_fire(t0, cooldown));
//! assert!(!gate.try_fire(t0 + Duration::from_millis(200), cooldown));
//! assert!(gate.try_fire(t0 + Duration::from_millis(350), cooldown));
//! ```

use std::time::{Duration, Instant};

/// Observable state of an [`ActuationGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Never fired.
    Idle,
    /// Fired at least once; `last_fire` is the most recent firing.
    Armed { last_fire: Instant },
}

/// Timed gate turning a positive verdict into at most one action per
/// cooldown window.
#[derive(Debug, Clone, Default)]
pub struct ActuationGate {
    last_fire: Option<Instant>,
}

impl ActuationGate {
    /// Create a gate in the [`GateState::Idle`] state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request one action at `now`.
    ///
    /// Returns `true` and records `now` when the gate has never fired or at
    /// least `cooldown` has elapsed since the last firing.  Returns `false`
    /// otherwise, which is the normal outcome while an obstacle stays in view.
    ///
    /// A `now` earlier than the last firing counts as zero elapsed time.
    pub fn try_fire(&mut self, now: Instant, cooldown: Duration) -> bool {
        if let Some(last) = self.last_fire
            && now.saturating_duration_since(last) < cooldown
        {
            return false;
        }
        self.last_fire = Some(now);
        true
    }

    pub fn state(&self) -> GateState {
        match self.last_fire {
            None => GateState::Idle,
            Some(last_fire) => GateState::Armed { last_fire },
        }
    }

    /// Time of the most recent firing, if any.
    pub fn last_fire(&self) -> Option<Instant> {
        self.last_fire
    }

    /// Return to [`GateState::Idle`].
    pub fn reset(&mut self) {
        self.last_fire = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn first_call_always_fires() {
        let t0 = Instant::now();
        let mut gate = ActuationGate::new();
        assert_eq!(gate.state(), GateState::Idle);
        // Even an absurd cooldown cannot suppress the very first action.
        assert!(gate.try_fire(t0, Duration::from_secs(3600)));
        assert_eq!(gate.state(), GateState::Armed { last_fire: t0 });
    }

    #[test]
    fn cooldown_scenario_zero_two_three_fifty() {
        let t0 = Instant::now();
        let cooldown = ms(300);
        let mut gate = ActuationGate::new();
        assert!(gate.try_fire(t0, cooldown));
        assert!(!gate.try_fire(t0 + ms(200), cooldown));
        assert!(gate.try_fire(t0 + ms(350), cooldown));
        assert_eq!(gate.last_fire(), Some(t0 + ms(350)));
    }

    #[test]
    fn suppressed_request_does_not_move_the_window() {
        let t0 = Instant::now();
        let cooldown = ms(300);
        let mut gate = ActuationGate::new();
        assert!(gate.try_fire(t0, cooldown));
        assert!(!gate.try_fire(t0 + ms(250), cooldown));
        // Measured from t0, not from the suppressed request at 250 ms.
        assert!(gate.try_fire(t0 + ms(300), cooldown));
    }

    #[test]
    fn exactly_cooldown_apart_fires() {
        let t0 = Instant::now();
        let mut gate = ActuationGate::new();
        assert!(gate.try_fire(t0, ms(300)));
        assert!(gate.try_fire(t0 + ms(300), ms(300)));
    }

    #[test]
    fn zero_cooldown_fires_every_time() {
        let t0 = Instant::now();
        let mut gate = ActuationGate::new();
        for _ in 0..5 {
            assert!(gate.try_fire(t0, Duration::ZERO));
        }
    }

    #[test]
    fn earlier_timestamp_is_suppressed() {
        let t0 = Instant::now();
        let mut gate = ActuationGate::new();
        assert!(gate.try_fire(t0 + ms(1000), ms(300)));
        assert!(!gate.try_fire(t0, ms(300)));
    }

    #[test]
    fn reset_returns_to_idle() {
        let t0 = Instant::now();
        let mut gate = ActuationGate::new();
        gate.try_fire(t0, ms(300));
        gate.reset();
        assert_eq!(gate.state(), GateState::Idle);
        assert!(gate.try_fire(t0 + ms(1), ms(300)));
    }

    #[test]
    fn never_fires_twice_within_cooldown_over_long_sequence() {
        // Deterministic pseudo-random walk of request times.
        let t0 = Instant::now();
        let cooldown = ms(300);
        let mut gate = ActuationGate::new();
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        let mut offset = 0u64;
        let mut fired = Vec::new();
        for _ in 0..10_000 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            offset += seed % 120;
            let now = t0 + ms(offset);
            if gate.try_fire(now, cooldown) {
                fired.push(now);
            }
        }
        assert!(fired.len() > 1);
        for pair in fired.windows(2) {
            assert!(pair[1] - pair[0] >= cooldown);
        }
    }
}
