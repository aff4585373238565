use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Axis-aligned screen rectangle in absolute desktop coordinates.
///
/// Dimensions are signed so that a malformed configuration (e.g. a negative
/// width) survives deserialisation and can be rejected with a precise message
/// by the kernel's layout verifier instead of a generic parse error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge.
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    /// `true` when both dimensions are strictly positive.
    pub fn is_well_formed(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Number of pixels covered; zero for malformed regions.
    pub fn area(&self) -> usize {
        if self.is_well_formed() {
            self.width as usize * self.height as usize
        } else {
            0
        }
    }

    /// `true` when `inner` lies entirely inside `self` (edges may touch).
    pub fn contains(&self, inner: &Region) -> bool {
        inner.x >= self.x
            && inner.y >= self.y
            && inner.right() <= self.right()
            && inner.bottom() <= self.bottom()
    }

    /// `true` when the two rectangles share at least one pixel.
    pub fn overlaps(&self, other: &Region) -> bool {
        i64::from(self.x) < other.right()
            && i64::from(other.x) < self.right()
            && i64::from(self.y) < other.bottom()
            && i64::from(other.y) < self.bottom()
    }

    /// Offset of `self` relative to the top-left corner of `outer`, or `None`
    /// when `self` is not contained in `outer`.
    pub fn offset_within(&self, outer: &Region) -> Option<(u32, u32)> {
        if !outer.contains(self) {
            return None;
        }
        Some(((self.x - outer.x) as u32, (self.y - outer.y) as u32))
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}, {}) {}x{}",
            self.x, self.y, self.width, self.height
        )
    }
}

/// The three rectangles the bot works with: the whole game canvas and the
/// two detection boxes inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionLayout {
    pub game: Region,
    /// Box closest to the player; confirms an imminent obstacle.
    pub near: Region,
    /// Box further ahead; gives lead time.
    pub far: Region,
}

impl DetectionLayout {
    /// Named detection boxes in sampling order.
    pub fn detection_boxes(&self) -> [(&'static str, Region); 2] {
        [("near", self.near), ("far", self.far)]
    }
}

/// A single grayscale capture of one [`Region`].
///
/// One luminance sample per pixel, row-major. Frames are produced fresh every
/// poll cycle and dropped after classification.
#[derive(Debug, Clone)]
pub struct Frame {
    region: Region,
    captured_at: Instant,
    width: u32,
    height: u32,
    luma: Vec<u8>,
}

impl Frame {
    /// Wrap a raw luminance buffer.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Configuration`] if `luma` does not hold exactly
    /// `width * height` samples.
    pub fn new(
        region: Region,
        width: u32,
        height: u32,
        luma: Vec<u8>,
        captured_at: Instant,
    ) -> Result<Self, DinoError> {
        let expected = width as usize * height as usize;
        if luma.len() != expected {
            return Err(DinoError::Configuration {
                subject: format!("frame for region {region}"),
                details: format!(
                    "buffer holds {} samples, expected {width}x{height} = {expected}",
                    luma.len()
                ),
            });
        }
        Ok(Self {
            region,
            captured_at,
            width,
            height,
            luma,
        })
    }

    /// A frame covering `region` where every sample equals `value`.
    pub fn uniform(region: Region, value: u8) -> Self {
        let width = region.width.max(0) as u32;
        let height = region.height.max(0) as u32;
        Self {
            region,
            captured_at: Instant::now(),
            width,
            height,
            luma: vec![value; region.area()],
        }
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn samples(&self) -> &[u8] {
        &self.luma
    }

    /// Luminance at `(x, y)`, or `None` outside the frame.
    pub fn sample(&self, x: u32, y: u32) -> Option<u8> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.luma
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// `true` when the captured dimensions equal the configured region.
    pub fn matches_region(&self) -> bool {
        i64::from(self.width) == i64::from(self.region.width)
            && i64::from(self.height) == i64::from(self.region.height)
    }
}

/// Binary thresholding parameters shared by both detection regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Samples strictly below this luminance count as dark.
    pub dark_threshold: u8,
    /// A region reports an obstacle when its dark count strictly exceeds this.
    pub trigger_count: usize,
}

/// Per-region classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionAnalysis {
    pub dark_pixels: usize,
    pub obstacle: bool,
}

/// Near and far analyses folded into the single verdict passed downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedVerdict {
    pub near: RegionAnalysis,
    pub far: RegionAnalysis,
    pub total_dark_pixels: usize,
    pub obstacle_detected: bool,
    pub thresholds: Thresholds,
}

impl CombinedVerdict {
    /// Combine two region analyses: dark counts are summed, obstacle flags
    /// are OR-ed.
    pub fn combine(near: RegionAnalysis, far: RegionAnalysis, thresholds: Thresholds) -> Self {
        Self {
            near,
            far,
            total_dark_pixels: near.dark_pixels + far.dark_pixels,
            obstacle_detected: near.obstacle || far.obstacle,
            thresholds,
        }
    }
}

/// Counters owned by the control loop for the lifetime of one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuationState {
    /// Incremented once at the start of every poll cycle.
    pub frame_count: u64,
    /// Incremented once per dispatched jump.
    pub action_count: u64,
    /// Time of the most recent dispatched jump.
    pub last_action_at: Option<Instant>,
}

/// Snapshot handed to observers after a cycle has been decided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub frame_count: u64,
    pub action_count: u64,
    pub verdict: CombinedVerdict,
    /// `true` when this cycle dispatched a jump.
    pub jumped: bool,
}

/// Cumulative statistics returned when a run stops.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub frames: u64,
    pub actions: u64,
    pub poll_interval: Duration,
    /// Measured time between loop start and stop.
    pub wall_time: Duration,
}

impl RunSummary {
    /// Runtime estimate derived from the polling cadence alone
    /// (`frames * poll_interval`), ignoring per-cycle work.
    pub fn estimated_runtime(&self) -> Duration {
        self.poll_interval
            .saturating_mul(u32::try_from(self.frames).unwrap_or(u32::MAX))
    }
}

/// Error type spanning capture faults, configuration problems, and input
/// dispatch failures.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DinoError {
    #[error("Capture failed for {region}: {details}")]
    Capture { region: String, details: String },

    #[error("Capture failed {consecutive} cycles in a row; last error: {last_error}")]
    RepeatedCaptureFailure { consecutive: u32, last_error: String },

    #[error("Invalid configuration for {subject}: {details}")]
    Configuration { subject: String, details: String },

    #[error("Actuator {actuator} failed: {details}")]
    Actuation { actuator: String, details: String },
}

impl DinoError {
    /// `true` for errors that must stop the control loop.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DinoError::RepeatedCaptureFailure { .. } | DinoError::Configuration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME: Region = Region::new(593, 246, 729, 162);

    #[test]
    fn region_contains_and_offsets() {
        let near = Region::new(743, 366, 50, 60);
        assert!(GAME.contains(&near));
        assert_eq!(near.offset_within(&GAME), Some((150, 120)));
    }

    #[test]
    fn region_touching_edge_is_contained() {
        let inner = Region::new(593 + 729 - 10, 246, 10, 162);
        assert!(GAME.contains(&inner));
        let spill = Region::new(593 + 729 - 9, 246, 10, 162);
        assert!(!GAME.contains(&spill));
        assert_eq!(spill.offset_within(&GAME), None);
    }

    #[test]
    fn region_overlap_excludes_shared_edge() {
        let a = Region::new(0, 0, 50, 60);
        let b = Region::new(50, 0, 50, 60);
        let c = Region::new(49, 59, 5, 5);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }

    #[test]
    fn malformed_region_has_zero_area() {
        assert_eq!(Region::new(0, 0, -5, 10).area(), 0);
        assert_eq!(Region::new(0, 0, 50, 60).area(), 3000);
    }

    #[test]
    fn frame_rejects_short_buffer() {
        let region = Region::new(0, 0, 2, 2);
        let err = Frame::new(region, 2, 2, vec![0; 3], Instant::now()).unwrap_err();
        assert!(matches!(err, DinoError::Configuration { .. }));
        assert!(err.to_string().contains("expected 2x2 = 4"));
    }

    #[test]
    fn frame_sample_lookup_is_row_major() {
        let region = Region::new(0, 0, 3, 2);
        let frame = Frame::new(region, 3, 2, vec![0, 1, 2, 3, 4, 5], Instant::now()).unwrap();
        assert_eq!(frame.sample(2, 0), Some(2));
        assert_eq!(frame.sample(0, 1), Some(3));
        assert_eq!(frame.sample(3, 0), None);
        assert!(frame.matches_region());
    }

    #[test]
    fn verdict_sums_and_ors() {
        let thresholds = Thresholds {
            dark_threshold: 150,
            trigger_count: 300,
        };
        let near = RegionAnalysis {
            dark_pixels: 301,
            obstacle: true,
        };
        let far = RegionAnalysis {
            dark_pixels: 12,
            obstacle: false,
        };
        let verdict = CombinedVerdict::combine(near, far, thresholds);
        assert_eq!(verdict.total_dark_pixels, 313);
        assert!(verdict.obstacle_detected);

        let verdict = CombinedVerdict::combine(far, far, thresholds);
        assert!(!verdict.obstacle_detected);
    }

    #[test]
    fn summary_estimates_runtime_from_cadence() {
        let summary = RunSummary {
            run_id: Uuid::new_v4(),
            frames: 500,
            actions: 3,
            poll_interval: Duration::from_millis(10),
            wall_time: Duration::from_secs(9),
        };
        assert_eq!(summary.estimated_runtime(), Duration::from_secs(5));
    }

    #[test]
    fn error_roundtrip_and_display() {
        let err = DinoError::Configuration {
            subject: "near".to_string(),
            details: "right edge 1400 exceeds game bound 1322".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: DinoError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
        assert!(err.to_string().contains("near"));
        assert!(err.is_fatal());

        let transient = DinoError::Capture {
            region: "far".to_string(),
            details: "display unavailable".to_string(),
        };
        assert!(!transient.is_fatal());
    }
}
