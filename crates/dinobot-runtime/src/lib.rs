//! `dinobot-runtime` – the polling loop and everything wrapped around it.
//!
//! # Modules
//!
//! - [`control_loop`] – [`ControlLoop`][control_loop::ControlLoop]: drives
//!   capture → classify → gate → act cycles at a fixed poll interval until a
//!   [`StopSignal`][control_loop::StopSignal] is raised.
//! - [`fault_policy`] – [`CaptureGuard`][fault_policy::CaptureGuard]: counts
//!   consecutive capture failures and decides between skipping, backing off,
//!   and stopping.
//! - [`observer`] – the [`CycleObserver`][observer::CycleObserver] hook and
//!   the [`ReportCadence`][observer::ReportCadence] that selects which cycles
//!   observers see.
//! - [`debug_render`] – annotated PNG snapshots, text rasterised with
//!   `cosmic-text`, written off the loop thread by a
//!   [`DebugSink`][debug_render::DebugSink].
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console or
//!   JSON logs, with optional OTLP span export.

pub mod control_loop;
pub mod debug_render;
pub mod fault_policy;
pub mod observer;
pub mod telemetry;

pub use control_loop::{ControlLoop, ControlLoopConfig, CycleOutcome, StopSignal};
pub use debug_render::{DebugSink, DebugSnapshot, SnapshotWriter, TextPainter};
pub use fault_policy::{CaptureFaultPolicy, CaptureGuard, FaultDecision};
pub use observer::{CycleObserver, ReportCadence, TracingObserver};
pub use telemetry::{TracerProviderGuard, init_tracing};
