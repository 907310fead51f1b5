// Overlay canvas: maps perception boxes from image pixels to the display box.

use crate::metrics;
use crate::model::PerceptionMessage;

/// Line width at scale 1.0.
pub const BASE_LINE_WIDTH: f64 = 2.0;

/// Per-axis scale from image pixel space to canvas pixel space.
///
/// The mapping is a non-aspect-preserving stretch: `sx` and `sy` are
/// independent, so boxes follow the display element's current shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub sx: f64,
    pub sy: f64,
}

impl Transform {
    /// Scale factors for an image of `image` size drawn onto a canvas of `canvas` size.
    ///
    /// Returns `None` when either image dimension is zero or non-finite, or the
    /// canvas has no area; the caller skips the frame.
    pub fn new(image: [f64; 2], canvas: (u32, u32)) -> Option<Self> {
        let [iw, ih] = image;
        if !(iw.is_finite() && ih.is_finite()) || iw <= 0.0 || ih <= 0.0 {
            return None;
        }
        if canvas.0 == 0 || canvas.1 == 0 {
            return None;
        }
        Some(Self {
            sx: canvas.0 as f64 / iw,
            sy: canvas.1 as f64 / ih,
        })
    }

    /// Map an `[x, y, w, h]` box into canvas space.
    pub fn apply(&self, xywh: [f64; 4]) -> Rect {
        let [x, y, w, h] = xywh;
        Rect {
            x: x * self.sx,
            y: y * self.sy,
            w: w * self.sx,
            h: h * self.sy,
        }
    }

    /// Stroke width scaled by the mean of both axes.
    pub fn line_width(&self) -> f64 {
        BASE_LINE_WIDTH * ((self.sx + self.sy) / 2.0)
    }
}

/// An axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub w: f64,
    pub h: f64,
}

impl Rect {
    pub fn rounded(&self) -> [i64; 4] {
        [
            self.x.round() as i64,
            self.y.round() as i64,
            self.w.round() as i64,
            self.h.round() as i64,
        ]
    }
}

/// One stroked box of a rendered overlay frame.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub rect: Rect,
    pub label: Option<String>,
    pub score: Option<f64>,
}

/// Everything drawn for one perception message. Replaces the previous frame.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OverlayFrame {
    pub line_width: f64,
    pub boxes: Vec<OverlayBox>,
}

/// The overlay canvas: tracks its size and holds the last drawn frame.
#[derive(Debug, Clone, Default)]
pub struct OverlayCanvas {
    width: u32,
    height: u32,
    frame: OverlayFrame,
    sized: bool,
}

impl OverlayCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Whether the canvas has been sized to a display box yet.
    pub fn is_sized(&self) -> bool {
        self.sized
    }

    /// Match the display box of the video element (viewport resize or first frame).
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            tracing::debug!("overlay canvas resized to {width}x{height}");
        }
        self.width = width;
        self.height = height;
        self.sized = true;
    }

    /// Clear the canvas and draw every box of `msg`.
    ///
    /// The transform is recomputed from the current canvas size each time. On a
    /// degenerate transform the canvas is left cleared and `false` is returned.
    pub fn draw(&mut self, msg: &PerceptionMessage) -> bool {
        self.frame = OverlayFrame::default();

        let image = msg.image_size_or_default();
        let Some(transform) = Transform::new(image, self.size()) else {
            tracing::debug!(
                "skipping overlay frame: image {}x{} on canvas {}x{}",
                image[0],
                image[1],
                self.width,
                self.height
            );
            metrics::OVERLAY_FRAMES_SKIPPED_TOTAL.inc();
            return false;
        };

        self.frame.line_width = transform.line_width();
        self.frame.boxes = msg
            .boxes
            .iter()
            .map(|b| OverlayBox {
                rect: transform.apply(b.xywh),
                label: b.label.clone(),
                score: b.score,
            })
            .collect();
        true
    }

    pub fn frame(&self) -> &OverlayFrame {
        &self.frame
    }

    pub fn clear(&mut self) {
        self.frame = OverlayFrame::default();
    }
}
