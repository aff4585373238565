//! Live screen capture through `xcap`.
//!
//! Each call resolves the monitor under the region's top-left corner and
//! captures the rectangle relative to that monitor.  Regions spanning two
//! monitors are not supported and fail with [`DinoError::Capture`].

use dinobot_types::{DinoError, Region};
use image::RgbaImage;
use tracing::trace;
use xcap::Monitor;

use crate::sampler::RegionSampler;

/// [`RegionSampler`] backed by the desktop compositor.
#[derive(Debug, Default)]
pub struct ScreenSampler;

impl ScreenSampler {
    pub fn new() -> Self {
        Self
    }
}

fn capture_error(region: &Region, details: impl std::fmt::Display) -> DinoError {
    DinoError::Capture {
        region: region.to_string(),
        details: details.to_string(),
    }
}

impl RegionSampler for ScreenSampler {
    fn id(&self) -> &str {
        "screen"
    }

    fn grab(&mut self, region: &Region) -> Result<RgbaImage, DinoError> {
        if !region.is_well_formed() {
            return Err(capture_error(region, "region has no pixels"));
        }

        let monitor = Monitor::from_point(region.x, region.y)
            .map_err(|e| capture_error(region, format!("no monitor at origin: {e}")))?;
        let origin_x = monitor.x().map_err(|e| capture_error(region, e))?;
        let origin_y = monitor.y().map_err(|e| capture_error(region, e))?;

        let rel_x = u32::try_from(region.x - origin_x)
            .map_err(|_| capture_error(region, "region starts left of its monitor"))?;
        let rel_y = u32::try_from(region.y - origin_y)
            .map_err(|_| capture_error(region, "region starts above its monitor"))?;

        trace!(%region, rel_x, rel_y, "capturing screen region");
        monitor
            .capture_region(rel_x, rel_y, region.width as u32, region.height as u32)
            .map_err(|e| capture_error(region, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_region_fails_before_touching_the_display() {
        let mut sampler = ScreenSampler::new();
        let err = sampler.grab(&Region::new(0, 0, 0, 10)).unwrap_err();
        assert!(matches!(err, DinoError::Capture { .. }));
        assert_eq!(sampler.id(), "screen");
    }
}
