//! Debug image rendering.
//!
//! Every `every`-th cycle the control loop captures the whole game rectangle
//! and hands a [`DebugSnapshot`] to the [`DebugSink`].  The sink renders and
//! writes PNGs on its own worker thread; the loop never waits for it, and a
//! snapshot submitted while the queue is full is dropped.
//!
//! Canvas layout (`game.width + 400` by `game.height + 300`, white):
//!
//! - top-left: the game capture with both detection boxes outlined, red when
//!   an obstacle was detected and green otherwise;
//! - below it: the near and far frames zoomed 4x, each with a caption;
//! - right column: frame and jump counters, the pixel breakdown, both
//!   thresholds, and the obstacle status, one line every 20 px.
//!
//! Text is shaped and rasterised with `cosmic-text`.  Without any usable font
//! the canvas is still rendered, just without text.

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

use chrono::Local;
use cosmic_text::{Attrs, Buffer, Color, FontSystem, Metrics, Shaping, SwashCache, fontdb};
use dinobot_types::{CycleReport, DetectionLayout, DinoError, Frame};
use image::imageops::{self, FilterType};
use image::{GrayImage, Rgb, RgbImage, RgbaImage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub const ZOOM: u32 = 4;
pub const INFO_COLUMN_WIDTH: u32 = 400;
pub const ZOOM_AREA_HEIGHT: u32 = 300;
pub const LINE_HEIGHT: u32 = 20;
const FONT_SIZE: f32 = 14.0;
const FONT_LOCALE: &str = "en-US";
const OUTLINE_WIDTH: u32 = 3;
const QUEUE_DEPTH: usize = 4;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const RED: Rgb<u8> = Rgb([220, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 170, 0]);
const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

/// Everything needed to render one debug image.
pub struct DebugSnapshot {
    pub layout: DetectionLayout,
    pub report: CycleReport,
    pub game: RgbaImage,
    pub near: Frame,
    pub far: Frame,
}

/// File name for a snapshot: `frame_{frame:05}_{HHMMSS}_{JUMP|safe}.png`.
pub fn debug_file_name(report: &CycleReport) -> String {
    let stamp = report.timestamp.with_timezone(&Local).format("%H%M%S");
    let status = if report.verdict.obstacle_detected {
        "JUMP"
    } else {
        "safe"
    };
    format!("frame_{:05}_{stamp}_{status}.png", report.frame_count)
}

/// Lines of the info column.  Lines mentioning a jump are drawn in red.
pub fn info_lines(report: &CycleReport) -> Vec<String> {
    let v = &report.verdict;
    let status = if v.obstacle_detected {
        "YES - JUMP!"
    } else {
        "NO - Safe"
    };
    vec![
        format!("Frame: {}", report.frame_count),
        format!("Jumps: {}", report.action_count),
        String::new(),
        "PIXEL ANALYSIS:".to_string(),
        format!("Near Dark Pixels: {}", v.near.dark_pixels),
        format!("Far Dark Pixels: {}", v.far.dark_pixels),
        format!("Total Dark Pixels: {}", v.total_dark_pixels),
        String::new(),
        "THRESHOLDS:".to_string(),
        format!("Dark Threshold: < {}", v.thresholds.dark_threshold),
        format!("Trigger Count: > {}", v.thresholds.trigger_count),
        String::new(),
        "STATUS:".to_string(),
        format!("Obstacle: {status}"),
    ]
}

// ─────────────────────────────────────────────────────────────────────────────
// TextPainter
// ─────────────────────────────────────────────────────────────────────────────

/// Shapes single lines of text and blends their glyphs into an [`RgbImage`].
pub struct TextPainter {
    font_system: FontSystem,
    swash_cache: SwashCache,
    metrics: Metrics,
}

impl TextPainter {
    /// A painter using the fonts installed on this system.
    pub fn new() -> Self {
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        Self::from_database(db)
    }

    /// A painter restricted to the faces in `db`.
    pub fn from_database(db: fontdb::Database) -> Self {
        Self {
            font_system: FontSystem::new_with_locale_and_db(FONT_LOCALE.to_string(), db),
            swash_cache: SwashCache::new(),
            metrics: Metrics::new(FONT_SIZE, LINE_HEIGHT as f32),
        }
    }

    /// `true` when at least one font face is available.
    pub fn has_fonts(&self) -> bool {
        !self.font_system.db().is_empty()
    }

    /// Draw `text` with its line box's top-left corner at (`x`, `y`).
    pub fn draw(&mut self, canvas: &mut RgbImage, x: u32, y: u32, text: &str, color: Rgb<u8>) {
        if text.is_empty() || !self.has_fonts() {
            return;
        }
        let width = canvas.width().saturating_sub(x) as f32;
        let mut buffer = Buffer::new(&mut self.font_system, self.metrics);
        buffer.set_size(
            &mut self.font_system,
            Some(width),
            Some(self.metrics.line_height),
        );
        buffer.set_text(&mut self.font_system, text, &Attrs::new(), Shaping::Advanced);
        buffer.shape_until_scroll(&mut self.font_system, false);

        let Rgb([r, g, b]) = color;
        buffer.draw(
            &mut self.font_system,
            &mut self.swash_cache,
            Color::rgb(r, g, b),
            |gx, gy, w, h, c| {
                for dy in 0..h as i64 {
                    for dx in 0..w as i64 {
                        let px = i64::from(x) + i64::from(gx) + dx;
                        let py = i64::from(y) + i64::from(gy) + dy;
                        blend(canvas, px, py, c);
                    }
                }
            },
        );
    }
}

impl Default for TextPainter {
    fn default() -> Self {
        Self::new()
    }
}

/// Alpha-blend `color` over the canvas pixel at (`x`, `y`), clipping.
fn blend(canvas: &mut RgbImage, x: i64, y: i64, color: Color) {
    let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
        return;
    };
    if x >= canvas.width() || y >= canvas.height() {
        return;
    }
    let alpha = u16::from(color.a());
    let pixel = canvas.get_pixel_mut(x, y);
    let src = [color.r(), color.g(), color.b()];
    for (dst, src) in pixel.0.iter_mut().zip(src) {
        let mixed = (u16::from(src) * alpha + u16::from(*dst) * (255 - alpha)) / 255;
        *dst = mixed as u8;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Canvas
// ─────────────────────────────────────────────────────────────────────────────

/// Render the debug canvas for `snapshot`.
pub fn render_canvas(snapshot: &DebugSnapshot, painter: &mut TextPainter) -> RgbImage {
    let game = snapshot.layout.game;
    let game_w = game.width.max(0) as u32;
    let game_h = game.height.max(0) as u32;
    let mut canvas = RgbImage::from_pixel(
        game_w + INFO_COLUMN_WIDTH,
        game_h + ZOOM_AREA_HEIGHT,
        WHITE,
    );

    let game_rgb = image::DynamicImage::ImageRgba8(snapshot.game.clone()).to_rgb8();
    imageops::replace(&mut canvas, &game_rgb, 0, 0);

    let color = if snapshot.report.verdict.obstacle_detected {
        RED
    } else {
        GREEN
    };
    for (_, region) in snapshot.layout.detection_boxes() {
        if let Some((x, y)) = region.offset_within(&game) {
            draw_outline(
                &mut canvas,
                x,
                y,
                region.width as u32,
                region.height as u32,
                color,
            );
        }
    }

    let zoom_y = i64::from(game_h) + 10;
    let near_zoom = zoom_frame(&snapshot.near);
    let far_x = near_zoom.width() + 20;
    imageops::replace(&mut canvas, &near_zoom, 0, zoom_y);
    imageops::replace(&mut canvas, &zoom_frame(&snapshot.far), i64::from(far_x), zoom_y);

    let info_x = game_w + 10;
    for (i, line) in info_lines(&snapshot.report).iter().enumerate() {
        let line_color = if line.contains("JUMP") { RED } else { BLACK };
        painter.draw(&mut canvas, info_x, 10 + i as u32 * LINE_HEIGHT, line, line_color);
    }

    let caption_y = game_h + 250;
    painter.draw(&mut canvas, 10, caption_y, "Near Detection (4x zoom)", BLACK);
    painter.draw(&mut canvas, far_x, caption_y, "Far Detection (4x zoom)", BLACK);
    canvas
}

fn zoom_frame(frame: &Frame) -> RgbImage {
    let gray = GrayImage::from_raw(frame.width(), frame.height(), frame.samples().to_vec())
        .unwrap_or_else(|| GrayImage::new(frame.width(), frame.height()));
    let zoomed = imageops::resize(
        &gray,
        frame.width() * ZOOM,
        frame.height() * ZOOM,
        FilterType::Nearest,
    );
    image::DynamicImage::ImageLuma8(zoomed).to_rgb8()
}

fn fill_rect(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    for py in y..y.saturating_add(h).min(canvas.height()) {
        for px in x..x.saturating_add(w).min(canvas.width()) {
            canvas.put_pixel(px, py, color);
        }
    }
}

/// Outline drawn inward from the rectangle's edges.
fn draw_outline(canvas: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: Rgb<u8>) {
    let t = OUTLINE_WIDTH.min(w).min(h);
    fill_rect(canvas, x, y, w, t, color);
    fill_rect(canvas, x, y + h - t, w, t, color);
    fill_rect(canvas, x, y, t, h, color);
    fill_rect(canvas, x + w - t, y, t, h, color);
}

/// Render `snapshot` and write it under `folder`.
pub fn save_snapshot(
    folder: &Path,
    snapshot: &DebugSnapshot,
    painter: &mut TextPainter,
) -> Result<PathBuf, image::ImageError> {
    let path = folder.join(debug_file_name(&snapshot.report));
    render_canvas(snapshot, painter).save(&path)?;
    Ok(path)
}

// ─────────────────────────────────────────────────────────────────────────────
// DebugSink
// ─────────────────────────────────────────────────────────────────────────────

/// Renders and persists one snapshot on the writer thread.
pub type SnapshotWriter = Box<dyn FnMut(&DebugSnapshot) -> Result<PathBuf, image::ImageError> + Send>;

/// Fire-and-forget PNG writer running on a dedicated thread.
///
/// Dropping the sink closes the queue and waits for already queued snapshots
/// to be written.
pub struct DebugSink {
    folder: PathBuf,
    every: u64,
    tx: Option<mpsc::Sender<DebugSnapshot>>,
    worker: Option<JoinHandle<()>>,
}

impl DebugSink {
    /// Create `folder` if needed and start the writer thread, which renders
    /// with the system fonts.
    ///
    /// # Errors
    ///
    /// Returns [`DinoError::Configuration`] when the folder cannot be created
    /// or the thread cannot be spawned.
    pub fn spawn(folder: impl Into<PathBuf>, every: u64) -> Result<Self, DinoError> {
        let folder = folder.into();
        let target = folder.clone();
        let mut painter: Option<TextPainter> = None;
        let writer: SnapshotWriter = Box::new(move |snapshot| {
            // Font discovery happens on the writer thread, on first use.
            let painter = painter.get_or_insert_with(TextPainter::new);
            save_snapshot(&target, snapshot, painter)
        });
        Self::spawn_with_writer(folder, every, writer)
    }

    /// Like [`spawn`][Self::spawn], but every queued snapshot is handed to
    /// `writer`.
    ///
    /// # Errors
    ///
    /// See [`spawn`][Self::spawn].
    pub fn spawn_with_writer(
        folder: impl Into<PathBuf>,
        every: u64,
        mut writer: SnapshotWriter,
    ) -> Result<Self, DinoError> {
        let folder = folder.into();
        std::fs::create_dir_all(&folder).map_err(|e| DinoError::Configuration {
            subject: format!("debug folder {}", folder.display()),
            details: e.to_string(),
        })?;

        let (tx, mut rx) = mpsc::channel::<DebugSnapshot>(QUEUE_DEPTH);
        let worker = std::thread::Builder::new()
            .name("dinobot-debug".to_string())
            .spawn(move || {
                while let Some(snapshot) = rx.blocking_recv() {
                    match writer(&snapshot) {
                        Ok(path) => info!(path = %path.display(), "saved debug frame"),
                        Err(e) => warn!(error = %e, "failed to save debug frame"),
                    }
                }
            })
            .map_err(|e| DinoError::Configuration {
                subject: "debug renderer".to_string(),
                details: e.to_string(),
            })?;

        Ok(Self {
            folder,
            every,
            tx: Some(tx),
            worker: Some(worker),
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// `true` when `frame_count` should produce a debug image.
    pub fn is_due(&self, frame_count: u64) -> bool {
        self.every > 0 && frame_count % self.every == 0
    }

    /// Queue `snapshot` without blocking.  Returns `false` when it was
    /// dropped because the writer is busy or gone.
    pub fn submit(&self, snapshot: DebugSnapshot) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(snapshot) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("debug writer busy; snapshot dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("debug writer stopped; snapshot dropped");
                false
            }
        }
    }
}

impl Drop for DebugSink {
    fn drop(&mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("debug writer thread panicked");
        }
    }
}
