//! [`ObstacleClassifier`] – binary thresholding of the detection frames.
//!
//! # Algorithm
//!
//! For each frame, count the samples whose luminance is strictly below
//! `dark_threshold`.  A region reports an obstacle when that count strictly
//! exceeds `trigger_count`.  The combined verdict is positive when either
//! region is: the far box buys lead time, the near box confirms.
//!
//! Both comparisons are strict.  A sample exactly at `dark_threshold` is
//! never dark, and a count exactly at `trigger_count` never triggers.
//!
//! # Example
//!
//! ```rust
//! use dinobot_kernel::classifier::ObstacleClassifier;
//! use dinobot_types::{Frame, Region, Thresholds};
//!
//! let near = Region::new(743, 366, 50, 60);
//! let far = Region::new(823, 366, 50, 60);
//! let classifier = ObstacleClassifier::new(
//!     Thresholds { dark_threshold: 150, trigger_count: 300 },
//!     near,
//!     far,
//! );
//!
//! let verdict = classifier
//!     .classify(&Frame::uniform(near, 100), &Frame::uniform(far, 200))
//!     .unwrap();
//! assert!(verdict.obstacle_detected);
//! assert_eq!(verdict.total_dark_pixels, 3000);
//! ```

use dinobot_types::{CombinedVerdict, DinoError, Frame, Region, RegionAnalysis, Thresholds};

/// Analyse a single frame.
pub fn analyze_region(frame: &Frame, thresholds: &Thresholds) -> RegionAnalysis {
    let dark_pixels = frame
        .samples()
        .iter()
        .filter(|&&luma| luma < thresholds.dark_threshold)
        .count();
    RegionAnalysis {
        dark_pixels,
        obstacle: dark_pixels > thresholds.trigger_count,
    }
}

/// Analyse both frames and fold them into one verdict without checking them
/// against any configured geometry.
pub fn classify(near: &Frame, far: &Frame, thresholds: Thresholds) -> CombinedVerdict {
    CombinedVerdict::combine(
        analyze_region(near, &thresholds),
        analyze_region(far, &thresholds),
        thresholds,
    )
}

/// Classifier bound to the configured detection boxes.
///
/// Frames are checked against the box they claim to cover before being
/// counted, so a sampler that returns the wrong rectangle (or a scaled
/// capture on a HiDPI display) is reported instead of silently skewing the
/// counts.
#[derive(Debug, Clone)]
pub struct ObstacleClassifier {
    thresholds: Thresholds,
    near: Region,
    far: Region,
}

impl ObstacleClassifier {
    pub fn new(thresholds: Thresholds, near: Region, far: Region) -> Self {
        Self {
            thresholds,
            near,
            far,
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Classify one near/far frame pair.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Configuration`] when a frame does not cover its
    /// configured box or its dimensions differ from the box.
    pub fn classify(&self, near: &Frame, far: &Frame) -> Result<CombinedVerdict, DinoError> {
        Self::check_frame("near", &self.near, near)?;
        Self::check_frame("far", &self.far, far)?;
        Ok(classify(near, far, self.thresholds))
    }

    fn check_frame(name: &str, expected: &Region, frame: &Frame) -> Result<(), DinoError> {
        if frame.region() != expected {
            return Err(DinoError::Configuration {
                subject: format!("{name} frame"),
                details: format!(
                    "captured region {} does not match configured {expected}",
                    frame.region()
                ),
            });
        }
        if !frame.matches_region() {
            return Err(DinoError::Configuration {
                subject: format!("{name} frame"),
                details: format!(
                    "captured {}x{} pixels, configured box is {}x{}",
                    frame.width(),
                    frame.height(),
                    expected.width,
                    expected.height
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    const NEAR: Region = Region::new(743, 366, 50, 60);
    const FAR: Region = Region::new(823, 366, 50, 60);
    const THRESHOLDS: Thresholds = Thresholds {
        dark_threshold: 150,
        trigger_count: 300,
    };

    /// 50x60 frame with `dark` pixels at luminance 100 and the rest at 200.
    fn frame_with_dark(region: Region, dark: usize) -> Frame {
        let mut luma = vec![200u8; region.area()];
        for sample in luma.iter_mut().take(dark) {
            *sample = 100;
        }
        Frame::new(
            region,
            region.width as u32,
            region.height as u32,
            luma,
            Instant::now(),
        )
        .unwrap()
    }

    fn classifier() -> ObstacleClassifier {
        ObstacleClassifier::new(THRESHOLDS, NEAR, FAR)
    }

    #[test]
    fn three_hundred_one_dark_pixels_trigger() {
        let analysis = analyze_region(&frame_with_dark(NEAR, 301), &THRESHOLDS);
        assert_eq!(analysis.dark_pixels, 301);
        assert!(analysis.obstacle);
    }

    #[test]
    fn exactly_trigger_count_does_not_trigger() {
        let analysis = analyze_region(&frame_with_dark(NEAR, 300), &THRESHOLDS);
        assert_eq!(analysis.dark_pixels, 300);
        assert!(!analysis.obstacle);
    }

    #[test]
    fn pixel_at_threshold_is_not_dark() {
        let at = Frame::uniform(NEAR, 150);
        let below = Frame::uniform(NEAR, 149);
        assert_eq!(analyze_region(&at, &THRESHOLDS).dark_pixels, 0);
        assert_eq!(analyze_region(&below, &THRESHOLDS).dark_pixels, 3000);
    }

    #[test]
    fn dark_count_matches_brute_force_over_all_thresholds() {
        // Every luminance value appears in the frame at least once.
        let luma: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 256) as u8).collect();
        let frame = Frame::new(NEAR, 50, 60, luma.clone(), Instant::now()).unwrap();
        for threshold in 0..=255u8 {
            let thresholds = Thresholds {
                dark_threshold: threshold,
                trigger_count: 0,
            };
            let expected = luma.iter().filter(|&&v| v < threshold).count();
            assert_eq!(analyze_region(&frame, &thresholds).dark_pixels, expected);
        }
    }

    #[test]
    fn near_alone_triggers_combined_verdict() {
        let verdict = classifier()
            .classify(&frame_with_dark(NEAR, 400), &frame_with_dark(FAR, 10))
            .unwrap();
        assert!(verdict.near.obstacle);
        assert!(!verdict.far.obstacle);
        assert!(verdict.obstacle_detected);
        assert_eq!(verdict.total_dark_pixels, 410);
    }

    #[test]
    fn far_alone_triggers_combined_verdict() {
        let verdict = classifier()
            .classify(&frame_with_dark(NEAR, 0), &frame_with_dark(FAR, 301))
            .unwrap();
        assert!(verdict.obstacle_detected);
    }

    #[test]
    fn split_obstacle_below_both_triggers_stays_clear() {
        // 250 + 250 exceeds the trigger in total but neither box alone does.
        let verdict = classifier()
            .classify(&frame_with_dark(NEAR, 250), &frame_with_dark(FAR, 250))
            .unwrap();
        assert_eq!(verdict.total_dark_pixels, 500);
        assert!(!verdict.obstacle_detected);
    }

    #[test]
    fn swapped_frames_are_rejected() {
        let err = classifier()
            .classify(&frame_with_dark(FAR, 0), &frame_with_dark(NEAR, 0))
            .unwrap_err();
        assert!(
            matches!(&err, DinoError::Configuration { subject, .. } if subject == "near frame"),
            "got {err:?}"
        );
    }

    #[test]
    fn scaled_capture_is_rejected() {
        // A HiDPI capture at 2x reports the right region but twice the pixels.
        let scaled = Frame::new(NEAR, 100, 120, vec![200; 12_000], Instant::now()).unwrap();
        let err = classifier()
            .classify(&scaled, &frame_with_dark(FAR, 0))
            .unwrap_err();
        assert!(err.to_string().contains("100x120"));
    }
}
