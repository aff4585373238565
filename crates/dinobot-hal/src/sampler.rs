//! Generic `RegionSampler` trait for anything that can photograph a screen
//! rectangle.

use std::time::Instant;

use dinobot_types::{DinoError, Frame, Region};
use image::{GrayImage, Luma, Rgba, RgbaImage};

/// A source of screen captures.
///
/// Implementors provide [`grab`][RegionSampler::grab]; the grayscale
/// reduction in [`capture`][RegionSampler::capture] comes for free.  No
/// retries happen at this layer: a failed capture is returned to the caller
/// as-is.
pub trait RegionSampler {
    /// Stable identifier for this sampler, e.g. `"screen"`.
    fn id(&self) -> &str;

    /// Capture `region` in colour.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Capture`] when the screen source is unavailable
    /// (display disconnected, permission denied, region off every monitor).
    fn grab(&mut self, region: &Region) -> Result<RgbaImage, DinoError>;

    /// Capture `region` and reduce it to one luminance sample per pixel.
    ///
    /// # Errors
    ///
    /// Propagates any [`DinoError::Capture`] from [`grab`][Self::grab].
    fn capture(&mut self, region: &Region) -> Result<Frame, DinoError> {
        let captured_at = Instant::now();
        let image = self.grab(region)?;
        frame_from_rgba(region, &image, captured_at)
    }
}

/// ITU-R 601 luma with integer weights, truncated: `(299R + 587G + 114B) / 1000`.
/// Alpha is ignored.
pub fn rec601_luma(Rgba([r, g, b, _]): Rgba<u8>) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    (weighted / 1000) as u8
}

/// Reduce an RGBA capture to a luminance [`Frame`] bound to `region`, one
/// [`rec601_luma`] sample per pixel.
///
/// # Errors
///
/// Returns [`DinoError::Configuration`] if the image buffer is inconsistent
/// with its own dimensions.
pub fn frame_from_rgba(
    region: &Region,
    image: &RgbaImage,
    captured_at: Instant,
) -> Result<Frame, DinoError> {
    let gray = GrayImage::from_fn(image.width(), image.height(), |x, y| {
        Luma([rec601_luma(*image.get_pixel(x, y))])
    });
    let (width, height) = gray.dimensions();
    Frame::new(*region, width, height, gray.into_raw(), captured_at)
}
