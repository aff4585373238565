//! `dinobot-hal` – Screen and Input Hardware Abstraction
//!
//! The only crate that touches the desktop.  Everything above it talks to
//! two traits, so the live drivers can be swapped for simulated ones in tests.
//!
//! # Modules
//!
//! - [`sampler`] – [`RegionSampler`][sampler::RegionSampler]: captures a
//!   screen rectangle as a grayscale [`Frame`][dinobot_types::Frame].
//! - [`actuator`] – [`JumpActuator`][actuator::JumpActuator]: emits the single
//!   discrete "jump" input.
//! - [`screen`] – [`ScreenSampler`][screen::ScreenSampler]: live capture via
//!   `xcap`.
//! - [`keyboard`] – [`KeyboardActuator`][keyboard::KeyboardActuator]: live
//!   space-bar presses via `enigo`.
//! - [`sim`] – scripted samplers and recording actuators for headless runs.

pub mod actuator;
pub mod keyboard;
pub mod sampler;
pub mod screen;
pub mod sim;

pub use actuator::JumpActuator;
pub use keyboard::KeyboardActuator;
pub use sampler::{RegionSampler, frame_from_rgba, rec601_luma};
pub use screen::ScreenSampler;
