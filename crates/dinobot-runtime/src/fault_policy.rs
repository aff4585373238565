//! [`CaptureGuard`] – what to do when the screen cannot be captured.
//!
//! A single failed capture abandons the current cycle and the next cycle
//! simply tries again.  A display that stays unavailable must not leave the
//! loop spinning silently, so the guard counts consecutive failures and
//! applies the configured [`CaptureFaultPolicy`].
//!
//! # Example
//!
//! ```rust
//! use dinobot_runtime::fault_policy::{CaptureFaultPolicy, CaptureGuard, FaultDecision};
//! use dinobot_types::DinoError;
//!
//! let mut guard = CaptureGuard::new(CaptureFaultPolicy::Skip { max_consecutive_failures: 2 });
//! let err = || DinoError::Capture { region: "near".into(), details: "gone".into() };
//!
//! assert_eq!(guard.record_failure(err()), FaultDecision::Skip);
//! assert!(matches!(guard.record_failure(err()), FaultDecision::Abort(_)));
//! ```

use std::time::Duration;

use dinobot_types::DinoError;
use serde::{Deserialize, Serialize};

/// Configured reaction to capture failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum CaptureFaultPolicy {
    /// Skip the cycle and retry on the next one.  After
    /// `max_consecutive_failures` failures in a row the loop stops
    /// (0 = never stop).
    Skip { max_consecutive_failures: u32 },
    /// Like [`Skip`][Self::Skip], but every consecutive failure adds a
    /// doubling delay, starting at `initial_backoff_ms` and capped at
    /// `max_backoff_ms`, on top of the poll interval.
    Backoff {
        max_consecutive_failures: u32,
        initial_backoff_ms: u64,
        max_backoff_ms: u64,
    },
    /// The first failure stops the loop.
    FailFast,
}

impl Default for CaptureFaultPolicy {
    fn default() -> Self {
        CaptureFaultPolicy::Skip {
            max_consecutive_failures: 50,
        }
    }
}

/// Outcome of one recorded failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FaultDecision {
    /// Abandon the cycle; continue on the normal cadence.
    Skip,
    /// Abandon the cycle and wait this much longer than usual.
    Backoff(Duration),
    /// Stop the loop with this error.
    Abort(DinoError),
}

/// Consecutive-failure counter applying a [`CaptureFaultPolicy`].
#[derive(Debug, Clone)]
pub struct CaptureGuard {
    policy: CaptureFaultPolicy,
    consecutive: u32,
}

impl CaptureGuard {
    pub fn new(policy: CaptureFaultPolicy) -> Self {
        Self {
            policy,
            consecutive: 0,
        }
    }

    pub fn policy(&self) -> CaptureFaultPolicy {
        self.policy
    }

    /// Number of failures since the last successful capture.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive
    }

    /// A capture succeeded; the failure streak is over.
    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    /// Record a failed capture and decide what the loop does next.
    pub fn record_failure(&mut self, error: DinoError) -> FaultDecision {
        self.consecutive = self.consecutive.saturating_add(1);
        match self.policy {
            CaptureFaultPolicy::FailFast => FaultDecision::Abort(error),
            CaptureFaultPolicy::Skip {
                max_consecutive_failures,
            } => match self.limit_reached(max_consecutive_failures, &error) {
                Some(fatal) => FaultDecision::Abort(fatal),
                None => FaultDecision::Skip,
            },
            CaptureFaultPolicy::Backoff {
                max_consecutive_failures,
                initial_backoff_ms,
                max_backoff_ms,
            } => match self.limit_reached(max_consecutive_failures, &error) {
                Some(fatal) => FaultDecision::Abort(fatal),
                None => {
                    let shift = (self.consecutive - 1).min(32);
                    let delay = initial_backoff_ms
                        .saturating_mul(1u64 << shift)
                        .min(max_backoff_ms);
                    FaultDecision::Backoff(Duration::from_millis(delay))
                }
            },
        }
    }

    fn limit_reached(&self, max: u32, error: &DinoError) -> Option<DinoError> {
        (max > 0 && self.consecutive >= max).then(|| DinoError::RepeatedCaptureFailure {
            consecutive: self.consecutive,
            last_error: error.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn capture_error() -> DinoError {
        DinoError::Capture {
            region: "near".to_string(),
            details: "permission denied".to_string(),
        }
    }

    #[test]
    fn skip_policy_tolerates_failures_below_limit() {
        let mut guard = CaptureGuard::new(CaptureFaultPolicy::Skip {
            max_consecutive_failures: 3,
        });
        assert_eq!(guard.record_failure(capture_error()), FaultDecision::Skip);
        assert_eq!(guard.record_failure(capture_error()), FaultDecision::Skip);
        assert_eq!(guard.consecutive_failures(), 2);
    }

    #[test]
    fn skip_policy_aborts_at_limit_with_last_error() {
        let mut guard = CaptureGuard::new(CaptureFaultPolicy::Skip {
            max_consecutive_failures: 2,
        });
        guard.record_failure(capture_error());
        match guard.record_failure(capture_error()) {
            FaultDecision::Abort(DinoError::RepeatedCaptureFailure {
                consecutive,
                last_error,
            }) => {
                assert_eq!(consecutive, 2);
                assert!(last_error.contains("permission denied"));
            }
            other => panic!("expected abort, got {other:?}"),
        }
    }

    #[test]
    fn success_resets_the_streak() {
        let mut guard = CaptureGuard::new(CaptureFaultPolicy::Skip {
            max_consecutive_failures: 2,
        });
        guard.record_failure(capture_error());
        guard.record_success();
        assert_eq!(guard.consecutive_failures(), 0);
        assert_eq!(guard.record_failure(capture_error()), FaultDecision::Skip);
    }

    #[test]
    fn zero_limit_never_aborts() {
        let mut guard = CaptureGuard::new(CaptureFaultPolicy::Skip {
            max_consecutive_failures: 0,
        });
        for _ in 0..1_000 {
            assert_eq!(guard.record_failure(capture_error()), FaultDecision::Skip);
        }
    }

    #[test]
    fn fail_fast_aborts_on_first_failure_with_original_error() {
        let mut guard = CaptureGuard::new(CaptureFaultPolicy::FailFast);
        assert_eq!(
            guard.record_failure(capture_error()),
            FaultDecision::Abort(capture_error())
        );
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let mut guard = CaptureGuard::new(CaptureFaultPolicy::Backoff {
            max_consecutive_failures: 0,
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
        });
        let delays: Vec<FaultDecision> = (0..5)
            .map(|_| guard.record_failure(capture_error()))
            .collect();
        let ms = |n| FaultDecision::Backoff(Duration::from_millis(n));
        assert_eq!(delays, vec![ms(10), ms(20), ms(40), ms(50), ms(50)]);
    }

    #[test]
    fn backoff_still_honours_limit() {
        let mut guard = CaptureGuard::new(CaptureFaultPolicy::Backoff {
            max_consecutive_failures: 1,
            initial_backoff_ms: 10,
            max_backoff_ms: 50,
        });
        assert!(matches!(
            guard.record_failure(capture_error()),
            FaultDecision::Abort(DinoError::RepeatedCaptureFailure { .. })
        ));
    }

    #[test]
    fn policy_deserialises_from_tagged_json() {
        let policy: CaptureFaultPolicy = serde_json::from_str(
            r#"{"mode":"backoff","max_consecutive_failures":5,"initial_backoff_ms":20,"max_backoff_ms":500}"#,
        )
        .unwrap();
        assert_eq!(
            policy,
            CaptureFaultPolicy::Backoff {
                max_consecutive_failures: 5,
                initial_backoff_ms: 20,
                max_backoff_ms: 500,
            }
        );
        let fail_fast: CaptureFaultPolicy = serde_json::from_str(r#"{"mode":"fail_fast"}"#).unwrap();
        assert_eq!(fail_fast, CaptureFaultPolicy::FailFast);
    }
}
