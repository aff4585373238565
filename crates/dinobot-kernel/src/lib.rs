//! `dinobot-kernel` – Detection & Decision
//!
//! The pure half of the bot.  Nothing here touches the screen, the keyboard,
//! or the clock; every function takes its inputs explicitly so the decision
//! logic can be tested with synthetic frames and timestamps.
//!
//! # Modules
//!
//! - [`classifier`] – [`ObstacleClassifier`][classifier::ObstacleClassifier]:
//!   dark-pixel thresholding of the near and far detection frames into a
//!   single [`CombinedVerdict`][dinobot_types::CombinedVerdict].
//! - [`actuation_gate`] – [`ActuationGate`][actuation_gate::ActuationGate]:
//!   the cooldown state machine that turns a positive verdict into at most
//!   one jump per cooldown window.
//! - [`layout_verifier`] – [`LayoutVerifier`][layout_verifier::LayoutVerifier]:
//!   a rule engine that rejects malformed detection geometry before the
//!   control loop is allowed to start.

pub mod actuation_gate;
pub mod classifier;
pub mod layout_verifier;

pub use actuation_gate::{ActuationGate, GateState};
pub use classifier::{ObstacleClassifier, analyze_region, classify};
pub use layout_verifier::{
    DisjointBoxesRule, LayoutRule, LayoutVerifier, PositiveSizeRule, ReachableTriggerRule,
    WithinGameRule,
};
