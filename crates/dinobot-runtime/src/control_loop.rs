//! [`ControlLoop`] – the capture → classify → gate → act → observe cycle.
//!
//! Each [`tick`][ControlLoop::tick]:
//!
//! 1. **Count** – increment `frame_count`.
//! 2. **Capture** – grab the near and far boxes through the
//!    [`RegionSampler`].  A failure abandons the cycle and is handed to the
//!    [`CaptureGuard`], which decides between skipping, backing off, and
//!    stopping.
//! 3. **Classify** – the [`ObstacleClassifier`] folds both frames into one
//!    [`CombinedVerdict`].
//! 4. **Gate & act** – on a positive verdict the [`ActuationGate`] is asked
//!    for permission; when it fires the [`JumpActuator`] jumps and
//!    `action_count` is incremented.
//! 5. **Observe** – the report goes to every [`CycleObserver`] when the
//!    [`ReportCadence`] selects it, and a [`DebugSnapshot`] to the optional
//!    [`DebugSink`] when one is due.
//!
//! [`run`][ControlLoop::run] repeats `tick` with a fixed sleep of
//! `poll_interval` between cycles until the [`StopSignal`] is raised.
//! Everything runs on the calling thread; the debug sink is the only
//! collaborator with a thread of its own.
//!
//! # Example
//!
//! ```rust
//! use std::time::Instant;
//! use dinobot_hal::sim::{RecordingActuator, ScriptedSampler};
//! use dinobot_runtime::control_loop::{ControlLoop, ControlLoopConfig};
//!
//! let config = ControlLoopConfig::default();
//! let near = config.layout.near;
//! let sampler = ScriptedSampler::new().then_dark(near, 400);
//! let actuator = RecordingActuator::new();
//! let jumps = actuator.log();
//!
//! let mut bot = ControlLoop::new(config, Box::new(sampler), Box::new(actuator)).unwrap();
//! let outcome = bot.tick(Instant::now()).unwrap();
//! assert!(outcome.jumped());
//! assert_eq!(jumps.lock().unwrap().len(), 1);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dinobot_hal::{JumpActuator, RegionSampler};
use dinobot_kernel::{ActuationGate, LayoutVerifier, ObstacleClassifier};
use dinobot_types::{
    ActuationState, CombinedVerdict, CycleReport, DetectionLayout, DinoError, Frame, Region,
    RunSummary, Thresholds,
};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::debug_render::{DebugSink, DebugSnapshot};
use crate::fault_policy::{CaptureFaultPolicy, CaptureGuard, FaultDecision};
use crate::observer::{CycleObserver, ReportCadence};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Granularity at which a sleeping loop notices a stop request.
const STOP_POLL_SLICE: Duration = Duration::from_millis(5);

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration bundle for [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlLoopConfig {
    pub layout: DetectionLayout,
    pub thresholds: Thresholds,
    /// Minimum time between two jumps.
    pub cooldown: Duration,
    /// Fixed sleep between cycles.
    pub poll_interval: Duration,
    pub fault_policy: CaptureFaultPolicy,
    pub cadence: ReportCadence,
}

impl Default for ControlLoopConfig {
    fn default() -> Self {
        Self {
            layout: DetectionLayout {
                game: Region::new(593, 246, 729, 162),
                near: Region::new(743, 366, 50, 60),
                far: Region::new(823, 366, 50, 60),
            },
            thresholds: Thresholds {
                dark_threshold: 150,
                trigger_count: 300,
            },
            cooldown: Duration::from_millis(300),
            poll_interval: Duration::from_millis(10),
            fault_policy: CaptureFaultPolicy::default(),
            cadence: ReportCadence::default(),
        }
    }
}

impl ControlLoopConfig {
    /// Check geometry and timing before a loop is built.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Configuration`] naming the first violated
    /// precondition.
    pub fn validate(&self) -> Result<(), DinoError> {
        LayoutVerifier::standard(self.thresholds).verify(&self.layout)?;
        if self.poll_interval.is_zero() {
            return Err(DinoError::Configuration {
                subject: "poll_interval".to_string(),
                details: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// StopSignal
// ─────────────────────────────────────────────────────────────────────────────

/// Cancellation flag shared between the loop and a signal handler.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop.  The loop finishes its current cycle first.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleep for `duration`, waking early on a stop request.  Returns `true`
    /// when the full duration elapsed.
    ///
    /// A duration past the clock's range sleeps until the next stop request.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now().checked_add(duration);
        loop {
            if self.is_stopped() {
                return false;
            }
            let remaining = match deadline {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => STOP_POLL_SLICE,
            };
            if remaining.is_zero() {
                return true;
            }
            std::thread::sleep(remaining.min(STOP_POLL_SLICE));
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CycleOutcome
// ─────────────────────────────────────────────────────────────────────────────

/// Result of one non-fatal cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Both frames were captured and classified.
    Decided {
        verdict: CombinedVerdict,
        jumped: bool,
    },
    /// A capture failed; the cycle was abandoned.
    Skipped {
        error: DinoError,
        /// Extra delay requested by the fault policy.
        backoff: Duration,
    },
}

impl CycleOutcome {
    pub fn jumped(&self) -> bool {
        matches!(self, CycleOutcome::Decided { jumped: true, .. })
    }

    pub fn verdict(&self) -> Option<&CombinedVerdict> {
        match self {
            CycleOutcome::Decided { verdict, .. } => Some(verdict),
            CycleOutcome::Skipped { .. } => None,
        }
    }

    fn backoff(&self) -> Duration {
        match self {
            CycleOutcome::Skipped { backoff, .. } => *backoff,
            CycleOutcome::Decided { .. } => Duration::ZERO,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ControlLoop
// ─────────────────────────────────────────────────────────────────────────────

/// Owns the sampler, actuator, decision components, and counters for one run.
pub struct ControlLoop {
    config: ControlLoopConfig,
    run_id: Uuid,
    sampler: Box<dyn RegionSampler>,
    actuator: Box<dyn JumpActuator>,
    classifier: ObstacleClassifier,
    gate: ActuationGate,
    guard: CaptureGuard,
    state: ActuationState,
    observers: Vec<Box<dyn CycleObserver>>,
    debug_sink: Option<DebugSink>,
    started: Option<Instant>,
}

impl ControlLoop {
    /// Validate `config` and assemble a loop around the given drivers.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Configuration`] if `config` fails validation.
    pub fn new(
        config: ControlLoopConfig,
        sampler: Box<dyn RegionSampler>,
        actuator: Box<dyn JumpActuator>,
    ) -> Result<Self, DinoError> {
        config.validate()?;
        let classifier =
            ObstacleClassifier::new(config.thresholds, config.layout.near, config.layout.far);
        let guard = CaptureGuard::new(config.fault_policy);
        Ok(Self {
            config,
            run_id: Uuid::new_v4(),
            sampler,
            actuator,
            classifier,
            gate: ActuationGate::new(),
            guard,
            state: ActuationState::default(),
            observers: Vec::new(),
            debug_sink: None,
            started: None,
        })
    }

    /// Attach an observer.
    pub fn with_observer(mut self, observer: Box<dyn CycleObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Attach a debug image sink.
    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &ControlLoopConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Snapshot of the counters.
    pub fn state(&self) -> ActuationState {
        self.state
    }

    pub fn debug_folder(&self) -> Option<&std::path::Path> {
        self.debug_sink.as_ref().map(DebugSink::folder)
    }

    /// Jump once through the gate without a verdict, e.g. to start the game.
    /// Counts as an action and starts the cooldown.
    pub fn prime(&mut self, now: Instant) -> bool {
        self.actuate(now)
    }

    /// Run one cycle at time `now`.
    ///
    /// # Errors
    ///
    /// Returns the fatal error that must stop the loop: a capture failure the
    /// fault policy refuses to absorb, or a frame that does not match its
    /// configured box.
    pub fn tick(&mut self, now: Instant) -> Result<CycleOutcome, DinoError> {
        self.state.frame_count += 1;
        let frame_count = self.state.frame_count;

        let (near, far) = match self.capture_pair() {
            Ok(frames) => {
                self.guard.record_success();
                frames
            }
            Err(e) => {
                warn!(frame = frame_count, error = %e, "capture failed; cycle skipped");
                return match self.guard.record_failure(e.clone()) {
                    FaultDecision::Skip => Ok(CycleOutcome::Skipped {
                        error: e,
                        backoff: Duration::ZERO,
                    }),
                    FaultDecision::Backoff(backoff) => {
                        Ok(CycleOutcome::Skipped { error: e, backoff })
                    }
                    FaultDecision::Abort(fatal) => {
                        error!(error = %fatal, "capture fault policy stopped the loop");
                        Err(fatal)
                    }
                };
            }
        };

        let verdict = self.classifier.classify(&near, &far)?;
        debug!(
            frame = frame_count,
            near_dark = verdict.near.dark_pixels,
            far_dark = verdict.far.dark_pixels,
            obstacle = verdict.obstacle_detected,
            "cycle classified"
        );

        let jumped = verdict.obstacle_detected && self.actuate(now);

        let report = CycleReport {
            timestamp: chrono::Utc::now(),
            frame_count,
            action_count: self.state.action_count,
            verdict,
            jumped,
        };
        if self
            .config
            .cadence
            .is_due(frame_count, verdict.obstacle_detected)
        {
            for observer in &mut self.observers {
                observer.observe(&report);
            }
        }
        if jumped {
            for observer in &mut self.observers {
                observer.on_jump(self.state.action_count);
            }
        }
        self.emit_debug_snapshot(&report, near, far);

        Ok(CycleOutcome::Decided { verdict, jumped })
    }

    /// Cycle until `stop` is raised, sleeping `poll_interval` between cycles.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal error from [`tick`][Self::tick].  The
    /// counters stay readable through [`summary`][Self::summary].
    pub fn run(&mut self, stop: &StopSignal) -> Result<RunSummary, DinoError> {
        let span = info_span!("control_loop", run_id = %self.run_id);
        let _enter = span.enter();

        self.started.get_or_insert_with(Instant::now);
        info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            cooldown_ms = self.config.cooldown.as_millis() as u64,
            "control loop started"
        );

        while !stop.is_stopped() {
            let outcome = self.tick(Instant::now())?;
            stop.sleep(self.config.poll_interval.saturating_add(outcome.backoff()));
        }

        let summary = self.summary();
        info!(
            frames = summary.frames,
            jumps = summary.actions,
            "control loop stopped"
        );
        Ok(summary)
    }

    /// Cumulative statistics so far.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            frames: self.state.frame_count,
            actions: self.state.action_count,
            poll_interval: self.config.poll_interval,
            wall_time: self.started.map(|s| s.elapsed()).unwrap_or_default(),
        }
    }

    // -------------------------------------------------------------------------
    // Private helpers
    // -------------------------------------------------------------------------

    fn capture_pair(&mut self) -> Result<(Frame, Frame), DinoError> {
        let near = self.sampler.capture(&self.config.layout.near)?;
        let far = self.sampler.capture(&self.config.layout.far)?;
        Ok((near, far))
    }

    /// Ask the gate and jump when it fires.  A jump the actuator fails to
    /// dispatch is logged and not counted.
    fn actuate(&mut self, now: Instant) -> bool {
        if !self.gate.try_fire(now, self.config.cooldown) {
            return false;
        }
        match self.actuator.jump() {
            Ok(()) => {
                self.state.action_count += 1;
                self.state.last_action_at = Some(now);
                info!(
                    jump = self.state.action_count,
                    actuator = self.actuator.id(),
                    "jump dispatched"
                );
                true
            }
            Err(e) => {
                warn!(error = %e, "jump could not be dispatched");
                false
            }
        }
    }

    fn emit_debug_snapshot(&mut self, report: &CycleReport, near: Frame, far: Frame) {
        let Some(sink) = &self.debug_sink else {
            return;
        };
        if !sink.is_due(report.frame_count) {
            return;
        }
        match self.sampler.grab(&self.config.layout.game) {
            Ok(game) => {
                sink.submit(DebugSnapshot {
                    layout: self.config.layout,
                    report: report.clone(),
                    game,
                    near,
                    far,
                });
            }
            Err(e) => warn!(error = %e, "game capture for debug image failed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
