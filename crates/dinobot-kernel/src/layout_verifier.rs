//! [`LayoutVerifier`] – start-up validation of the detection geometry.
//!
//! Before the control loop is built, the configured [`DetectionLayout`] is
//! passed through [`LayoutVerifier::verify`].  Every registered
//! [`LayoutRule`] is evaluated in order and the first violation is returned
//! as a [`DinoError::Configuration`] naming the rectangle and the bound it
//! broke.
//!
//! Built-in rules:
//! - [`PositiveSizeRule`] – every rectangle has a positive width and height.
//! - [`WithinGameRule`] – both detection boxes lie inside the game rectangle.
//! - [`DisjointBoxesRule`] – the near and far boxes do not overlap.
//! - [`ReachableTriggerRule`] – each box has more pixels than
//!   `trigger_count`, otherwise it could never report an obstacle.
//!
//! # Example
//!
//! ```
//! use dinobot_kernel::layout_verifier::LayoutVerifier;
//! use dinobot_types::{DetectionLayout, Region, Thresholds};
//!
//! let layout = DetectionLayout {
//!     game: Region::new(593, 246, 729, 162),
//!     near: Region::new(743, 366, 50, 60),
//!     far: Region::new(823, 366, 50, 60),
//! };
//! let thresholds = Thresholds { dark_threshold: 150, trigger_count: 300 };
//! assert!(LayoutVerifier::standard(thresholds).verify(&layout).is_ok());
//!
//! let spilled = DetectionLayout { far: Region::new(1300, 366, 50, 60), ..layout };
//! assert!(LayoutVerifier::standard(thresholds).verify(&spilled).is_err());
//! ```

use dinobot_types::{DetectionLayout, DinoError, Region, Thresholds};

// ────────────────────────────────────────────────────────────────────────────
// Rule trait
// ────────────────────────────────────────────────────────────────────────────

/// A single geometric invariant the layout must satisfy.
pub trait LayoutRule {
    /// Human-readable name used in log output.
    fn name(&self) -> &str;

    /// Return `Ok(())` when the layout satisfies the invariant, or
    /// [`DinoError::Configuration`] when it is violated.
    fn check(&self, layout: &DetectionLayout) -> Result<(), DinoError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LayoutVerifier
// ────────────────────────────────────────────────────────────────────────────

/// Rule engine validating a [`DetectionLayout`] against every registered
/// [`LayoutRule`].
#[derive(Default)]
pub struct LayoutVerifier {
    rules: Vec<Box<dyn LayoutRule>>,
}

impl LayoutVerifier {
    /// Create an empty verifier with no rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// A verifier loaded with all built-in rules.
    pub fn standard(thresholds: Thresholds) -> Self {
        let mut verifier = Self::new();
        verifier.add_rule(Box::new(PositiveSizeRule));
        verifier.add_rule(Box::new(WithinGameRule));
        verifier.add_rule(Box::new(DisjointBoxesRule));
        verifier.add_rule(Box::new(ReachableTriggerRule { thresholds }));
        verifier
    }

    /// Register a new rule.  Rules are evaluated in insertion order.
    pub fn add_rule(&mut self, rule: Box<dyn LayoutRule>) {
        self.rules.push(rule);
    }

    /// Validate `layout`, returning the first violation.
    pub fn verify(&self, layout: &DetectionLayout) -> Result<(), DinoError> {
        for rule in &self.rules {
            if let Err(e) = rule.check(layout) {
                tracing::debug!(rule = rule.name(), error = %e, "layout rule violated");
                return Err(e);
            }
        }
        Ok(())
    }
}

fn named_regions(layout: &DetectionLayout) -> [(&'static str, Region); 3] {
    [("game", layout.game), ("near", layout.near), ("far", layout.far)]
}

// ────────────────────────────────────────────────────────────────────────────
// Built-in rules
// ────────────────────────────────────────────────────────────────────────────

/// Rejects rectangles with a zero or negative width or height.
pub struct PositiveSizeRule;

impl LayoutRule for PositiveSizeRule {
    fn name(&self) -> &str {
        "positive_size"
    }

    fn check(&self, layout: &DetectionLayout) -> Result<(), DinoError> {
        for (name, region) in named_regions(layout) {
            if region.width <= 0 {
                return Err(DinoError::Configuration {
                    subject: format!("{name} region"),
                    details: format!("width {} must be positive", region.width),
                });
            }
            if region.height <= 0 {
                return Err(DinoError::Configuration {
                    subject: format!("{name} region"),
                    details: format!("height {} must be positive", region.height),
                });
            }
        }
        Ok(())
    }
}

/// Rejects detection boxes that leave the game rectangle.
pub struct WithinGameRule;

impl LayoutRule for WithinGameRule {
    fn name(&self) -> &str {
        "within_game"
    }

    fn check(&self, layout: &DetectionLayout) -> Result<(), DinoError> {
        let game = layout.game;
        for (name, region) in layout.detection_boxes() {
            let violation = if region.x < game.x {
                Some(format!("left edge {} is left of game bound {}", region.x, game.x))
            } else if region.y < game.y {
                Some(format!("top edge {} is above game bound {}", region.y, game.y))
            } else if region.right() > game.right() {
                Some(format!(
                    "right edge {} exceeds game bound {}",
                    region.right(),
                    game.right()
                ))
            } else if region.bottom() > game.bottom() {
                Some(format!(
                    "bottom edge {} exceeds game bound {}",
                    region.bottom(),
                    game.bottom()
                ))
            } else {
                None
            };
            if let Some(details) = violation {
                return Err(DinoError::Configuration {
                    subject: format!("{name} region {region}"),
                    details,
                });
            }
        }
        Ok(())
    }
}

/// Rejects overlapping near and far boxes.
pub struct DisjointBoxesRule;

impl LayoutRule for DisjointBoxesRule {
    fn name(&self) -> &str {
        "disjoint_boxes"
    }

    fn check(&self, layout: &DetectionLayout) -> Result<(), DinoError> {
        if layout.near.overlaps(&layout.far) {
            return Err(DinoError::Configuration {
                subject: "near/far regions".to_string(),
                details: format!("{} overlaps {}", layout.near, layout.far),
            });
        }
        Ok(())
    }
}

/// Rejects boxes too small to ever exceed `trigger_count`.
pub struct ReachableTriggerRule {
    pub thresholds: Thresholds,
}

impl LayoutRule for ReachableTriggerRule {
    fn name(&self) -> &str {
        "reachable_trigger"
    }

    fn check(&self, layout: &DetectionLayout) -> Result<(), DinoError> {
        for (name, region) in layout.detection_boxes() {
            if region.area() <= self.thresholds.trigger_count {
                return Err(DinoError::Configuration {
                    subject: format!("{name} region"),
                    details: format!(
                        "{} pixels can never exceed trigger_count {}",
                        region.area(),
                        self.thresholds.trigger_count
                    ),
                });
            }
        }
        Ok(())
    }
}
