//! In-process simulated drivers for headless testing.
//!
//! [`ScriptedSampler`] replays a per-region script of captures (a number of
//! dark pixels, or a failure) and falls back to a clear background once a
//! region's script runs out.  [`RecordingActuator`] records every jump so
//! tests can assert on timing after the actuator has been moved into a
//! control loop.
//!
//! # Example
//!
//! ```rust
//! use dinobot_hal::sim::ScriptedSampler;
//! use dinobot_hal::RegionSampler;
//! use dinobot_types::Region;
//!
//! let near = Region::new(0, 0, 50, 60);
//! let mut sampler = ScriptedSampler::new().then_dark(near, 301);
//!
//! let frame = sampler.capture(&near).unwrap();
//! assert_eq!(frame.samples().iter().filter(|&&v| v < 150).count(), 301);
//!
//! // Script exhausted: back to a clear background.
//! let frame = sampler.capture(&near).unwrap();
//! assert!(frame.samples().iter().all(|&v| v >= 150));
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use dinobot_types::{DinoError, Region};
use image::{Rgba, RgbaImage};

use crate::actuator::JumpActuator;
use crate::sampler::RegionSampler;

/// Background luminance of a clear game area.
pub const CLEAR_LUMA: u8 = 200;
/// Luminance used for obstacle pixels.
pub const DARK_LUMA: u8 = 100;

// ────────────────────────────────────────────────────────────────────────────
// Scripted sampler
// ────────────────────────────────────────────────────────────────────────────

/// One scripted capture result.
#[derive(Debug, Clone)]
pub enum SimShot {
    /// A frame whose first `n` pixels (row-major) are dark.
    Dark(usize),
    /// A capture failure with the given details.
    Fail(String),
}

/// A sampler that replays scripted captures per region.
pub struct ScriptedSampler {
    id: String,
    background: u8,
    dark_value: u8,
    scripts: HashMap<Region, VecDeque<SimShot>>,
    captures: Arc<AtomicU64>,
}

impl Default for ScriptedSampler {
    fn default() -> Self {
        Self {
            id: "sim-screen".to_string(),
            background: CLEAR_LUMA,
            dark_value: DARK_LUMA,
            scripts: HashMap::new(),
            captures: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl ScriptedSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Luminance of non-dark pixels.
    pub fn with_background(mut self, value: u8) -> Self {
        self.background = value;
        self
    }

    /// Luminance of dark pixels.
    pub fn with_dark_value(mut self, value: u8) -> Self {
        self.dark_value = value;
        self
    }

    /// Queue a capture of `region` containing `dark` dark pixels.
    pub fn then_dark(self, region: Region, dark: usize) -> Self {
        self.then(region, SimShot::Dark(dark))
    }

    /// Queue a failed capture of `region`.
    pub fn then_fail(self, region: Region, details: impl Into<String>) -> Self {
        self.then(region, SimShot::Fail(details.into()))
    }

    /// Queue an arbitrary shot for `region`.
    pub fn then(mut self, region: Region, shot: SimShot) -> Self {
        self.scripts.entry(region).or_default().push_back(shot);
        self
    }

    /// Shared counter of `grab` calls, readable after the sampler is boxed.
    pub fn capture_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.captures)
    }

    fn render(&self, region: &Region, dark: usize) -> RgbaImage {
        let width = region.width.max(0) as u32;
        let height = region.height.max(0) as u32;
        let (dark_value, background) = (self.dark_value, self.background);
        RgbaImage::from_fn(width, height, |x, y| {
            let index = y as usize * width as usize + x as usize;
            let v = if index < dark { dark_value } else { background };
            Rgba([v, v, v, 255])
        })
    }
}

impl RegionSampler for ScriptedSampler {
    fn id(&self) -> &str {
        &self.id
    }

    fn grab(&mut self, region: &Region) -> Result<RgbaImage, DinoError> {
        self.captures.fetch_add(1, Ordering::Relaxed);
        let shot = self
            .scripts
            .get_mut(region)
            .and_then(VecDeque::pop_front)
            .unwrap_or(SimShot::Dark(0));
        match shot {
            SimShot::Dark(n) => Ok(self.render(region, n)),
            SimShot::Fail(details) => Err(DinoError::Capture {
                region: region.to_string(),
                details,
            }),
        }
    }
}

/// A sampler whose display is permanently unavailable.
#[derive(Debug, Default)]
pub struct OfflineSampler;

impl RegionSampler for OfflineSampler {
    fn id(&self) -> &str {
        "offline"
    }

    fn grab(&mut self, region: &Region) -> Result<RgbaImage, DinoError> {
        Err(DinoError::Capture {
            region: region.to_string(),
            details: "display unavailable".to_string(),
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Recording actuator
// ────────────────────────────────────────────────────────────────────────────

/// Shared log of dispatched jump times.
pub type JumpLog = Arc<Mutex<Vec<Instant>>>;

/// An actuator that records the time of every jump.  Optionally fails every
/// call to exercise error paths.
pub struct RecordingActuator {
    id: String,
    log: JumpLog,
    failing: bool,
}

impl Default for RecordingActuator {
    fn default() -> Self {
        Self {
            id: "sim-keyboard".to_string(),
            log: Arc::new(Mutex::new(Vec::new())),
            failing: false,
        }
    }
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// An actuator that rejects every jump.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Handle to the jump log, readable after the actuator is boxed.
    pub fn log(&self) -> JumpLog {
        Arc::clone(&self.log)
    }
}

impl JumpActuator for RecordingActuator {
    fn id(&self) -> &str {
        &self.id
    }

    fn jump(&mut self) -> Result<(), DinoError> {
        if self.failing {
            return Err(DinoError::Actuation {
                actuator: self.id.clone(),
                details: "simulated input failure".to_string(),
            });
        }
        match self.log.lock() {
            Ok(mut log) => log.push(Instant::now()),
            Err(poisoned) => poisoned.into_inner().push(Instant::now()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NEAR: Region = Region::new(743, 366, 50, 60);
    const FAR: Region = Region::new(823, 366, 50, 60);

    fn dark_count(sampler: &mut ScriptedSampler, region: &Region) -> usize {
        sampler
            .capture(region)
            .unwrap()
            .samples()
            .iter()
            .filter(|&&v| v == DARK_LUMA)
            .count()
    }

    #[test]
    fn scripts_are_kept_per_region() {
        let mut sampler = ScriptedSampler::new()
            .then_dark(NEAR, 10)
            .then_dark(FAR, 20)
            .then_dark(NEAR, 30);
        assert_eq!(dark_count(&mut sampler, &FAR), 20);
        assert_eq!(dark_count(&mut sampler, &NEAR), 10);
        assert_eq!(dark_count(&mut sampler, &NEAR), 30);
        assert_eq!(dark_count(&mut sampler, &FAR), 0);
        assert_eq!(sampler.capture_counter().load(Ordering::Relaxed), 4);
    }

    #[test]
    fn dark_count_is_clamped_to_area() {
        let mut sampler = ScriptedSampler::new().then_dark(NEAR, 10_000);
        assert_eq!(dark_count(&mut sampler, &NEAR), 3000);
    }

    #[test]
    fn scripted_failure_is_a_capture_error() {
        let mut sampler = ScriptedSampler::new().then_fail(NEAR, "permission denied");
        let err = sampler.capture(&NEAR).unwrap_err();
        assert!(matches!(err, DinoError::Capture { ref details, .. } if details == "permission denied"));
        assert!(sampler.capture(&NEAR).is_ok());
    }

    #[test]
    fn offline_sampler_always_fails() {
        let mut sampler = OfflineSampler;
        assert!(sampler.capture(&NEAR).is_err());
        assert!(sampler.capture(&FAR).is_err());
    }

    #[test]
    fn recording_actuator_logs_jumps() {
        let mut act = RecordingActuator::new();
        let log = act.log();
        act.jump().unwrap();
        act.jump().unwrap();
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn failing_actuator_reports_actuation_error() {
        let mut act = RecordingActuator::failing();
        let log = act.log();
        assert!(matches!(act.jump(), Err(DinoError::Actuation { .. })));
        assert!(log.lock().unwrap().is_empty());
    }
}
