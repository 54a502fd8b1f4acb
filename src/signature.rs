//! Freehand signature capture.
//!
//! The pad accumulates completed strokes into a single RGBA raster with a
//! transparent background. Saving freezes that raster, persists the `signed`
//! flag through the state machine, and hands back a [`Signature`] that every
//! signature block of the agreement reuses as-is.

use std::sync::Arc;

use ::image::{Rgba, RgbaImage};
use tracing::{debug, info};

use crate::backend::Backend;
use crate::error::{AppError, Result};
use crate::lifecycle::StateMachine;
use crate::ticket::Ticket;

/// Logical drawing surface in pointer units.
pub const PAD_WIDTH: u32 = 400;
pub const PAD_HEIGHT: u32 = 150;

/// Supersampling applied when rasterizing so the signature stays sharp in print.
pub const RASTER_SCALE: u32 = 2;

/// Pen radius in pointer units.
const PEN_RADIUS: f32 = 1.4;

const INK: Rgba<u8> = Rgba([20, 24, 82, 255]);

pub type Point = [f32; 2];
pub type Strokes = Vec<Vec<Point>>;

/// A frozen signature raster. Cloning shares the same pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    image: Arc<RgbaImage>,
}

impl Signature {
    #[must_use]
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }
}

pub struct SignaturePad {
    raster: RgbaImage,
    active: Option<Vec<Point>>,
    strokes: usize,
    saved: Option<Signature>,
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new()
    }
}

impl SignaturePad {
    #[must_use]
    pub fn new() -> Self {
        Self {
            raster: blank_raster(),
            active: None,
            strokes: 0,
            saved: None,
        }
    }

    #[must_use]
    pub const fn is_saved(&self) -> bool {
        self.saved.is_some()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.strokes == 0
    }

    #[must_use]
    pub const fn stroke_count(&self) -> usize {
        self.strokes
    }

    // ------------------------------------------------------------------------
    // Pointer input. All of it is ignored once the pad is saved.
    // ------------------------------------------------------------------------

    pub fn pointer_down(&mut self, point: Point) {
        if self.is_saved() {
            return;
        }
        self.active = Some(vec![point]);
    }

    pub fn pointer_move(&mut self, point: Point) {
        if let Some(stroke) = self.active.as_mut() {
            stroke.push(point);
        }
    }

    pub fn pointer_up(&mut self) {
        if let Some(stroke) = self.active.take() {
            composite_stroke(&mut self.raster, &stroke);
            self.strokes += 1;
            debug!(points = stroke.len(), strokes = self.strokes, "Stroke composited");
        }
    }

    /// Feeds one complete stroke as down, moves, up.
    pub fn draw_stroke(&mut self, points: &[Point]) {
        let Some((first, rest)) = points.split_first() else {
            return;
        };
        self.pointer_down(*first);
        for point in rest {
            self.pointer_move(*point);
        }
        self.pointer_up();
    }

    pub fn replay(&mut self, strokes: &Strokes) {
        for stroke in strokes {
            self.draw_stroke(stroke);
        }
    }

    pub fn clear(&mut self) {
        if self.is_saved() {
            return;
        }
        self.raster = blank_raster();
        self.active = None;
        self.strokes = 0;
    }

    /// Freezes the raster and marks the ticket signed.
    ///
    /// The pad stays editable if the transition fails, so the buyer can retry.
    pub fn save<B: Backend + ?Sized>(
        &mut self,
        machine: &StateMachine<'_, B>,
        ticket: &mut Ticket,
    ) -> Result<Signature> {
        if self.is_saved() {
            return Err(AppError::validation("signature has already been saved"));
        }
        self.pointer_up();
        if self.is_empty() {
            return Err(AppError::validation("draw a signature before saving"));
        }

        machine.mark_signed(ticket)?;

        let signature = Signature {
            image: Arc::new(self.raster.clone()),
        };
        self.saved = Some(signature.clone());
        info!(ticket_id = %ticket.id, strokes = self.strokes, "Signature saved");
        Ok(signature)
    }

    /// Current raster without locking the pad, for re-rendering a ticket that
    /// is already signed.
    #[must_use]
    pub fn snapshot(&self) -> Option<Signature> {
        if let Some(saved) = &self.saved {
            return Some(saved.clone());
        }
        (!self.is_empty()).then(|| Signature {
            image: Arc::new(self.raster.clone()),
        })
    }
}

fn blank_raster() -> RgbaImage {
    RgbaImage::from_pixel(
        PAD_WIDTH * RASTER_SCALE,
        PAD_HEIGHT * RASTER_SCALE,
        Rgba([255, 255, 255, 0]),
    )
}

// ============================================================================
// Rasterization
// ============================================================================

fn composite_stroke(raster: &mut RgbaImage, stroke: &[Point]) {
    let scale = RASTER_SCALE as f32;
    let radius = PEN_RADIUS * scale;
    let scaled: Vec<(f32, f32)> = stroke.iter().map(|[x, y]| (x * scale, y * scale)).collect();

    if let [only] = scaled.as_slice() {
        stamp(raster, only.0, only.1, radius);
        return;
    }

    for pair in scaled.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        let length = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        let steps = (length / (radius * 0.5)).ceil().max(1.0) as u32;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            stamp(raster, x0 + (x1 - x0) * t, y0 + (y1 - y0) * t, radius);
        }
    }
}

fn stamp(raster: &mut RgbaImage, cx: f32, cy: f32, radius: f32) {
    let (width, height) = raster.dimensions();
    let min_x = (cx - radius).floor().max(0.0) as u32;
    let min_y = (cy - radius).floor().max(0.0) as u32;
    let max_x = (cx + radius).ceil().min(width as f32 - 1.0);
    let max_y = (cy + radius).ceil().min(height as f32 - 1.0);
    if max_x < 0.0 || max_y < 0.0 {
        return;
    }
    let (max_x, max_y) = (max_x as u32, max_y as u32);

    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= radius * radius {
                raster.put_pixel(x, y, INK);
            }
        }
    }
}

/// Reads strokes from a JSON file shaped `[[[x, y], ...], ...]`.
pub fn load_strokes(path: &str) -> Result<Strokes> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::validation(format!("{}: {}", path, e)))?;
    let strokes: Strokes = serde_json::from_str(&content)
        .map_err(|e| AppError::validation(format!("{}: invalid stroke file: {}", path, e)))?;
    if strokes.iter().all(Vec::is_empty) {
        return Err(AppError::validation(format!("{}: no strokes recorded", path)));
    }
    Ok(strokes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ink_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| p.0[3] == 255).count()
    }

    #[test]
    fn test_raster_is_supersampled() {
        let pad = SignaturePad::new();
        assert_eq!(
            pad.raster.dimensions(),
            (PAD_WIDTH * RASTER_SCALE, PAD_HEIGHT * RASTER_SCALE)
        );
    }

    #[test]
    fn test_strokes_accumulate_into_one_raster() {
        let mut pad = SignaturePad::new();
        pad.draw_stroke(&[[10.0, 10.0], [100.0, 40.0]]);
        let after_first = ink_pixels(&pad.raster);
        assert!(after_first > 0);

        pad.draw_stroke(&[[10.0, 120.0], [300.0, 120.0]]);
        let after_second = ink_pixels(&pad.raster);
        assert!(after_second > after_first);
        assert_eq!(pad.stroke_count(), 2);
    }

    #[test]
    fn test_moves_without_pointer_down_are_ignored() {
        let mut pad = SignaturePad::new();
        pad.pointer_move([50.0, 50.0]);
        pad.pointer_up();
        assert!(pad.is_empty());
        assert_eq!(ink_pixels(&pad.raster), 0);
    }

    #[test]
    fn test_single_tap_leaves_a_dot() {
        let mut pad = SignaturePad::new();
        pad.draw_stroke(&[[200.0, 75.0]]);
        assert!(ink_pixels(&pad.raster) > 0);
    }

    #[test]
    fn test_points_outside_the_pad_are_clipped() {
        let mut pad = SignaturePad::new();
        pad.draw_stroke(&[[-50.0, -50.0], [-10.0, -10.0]]);
        pad.draw_stroke(&[[PAD_WIDTH as f32 + 10.0, 10.0], [PAD_WIDTH as f32 + 90.0, 10.0]]);
        assert_eq!(ink_pixels(&pad.raster), 0);
        assert_eq!(pad.stroke_count(), 2);
    }

    #[test]
    fn test_clear_erases_everything() {
        let mut pad = SignaturePad::new();
        pad.draw_stroke(&[[10.0, 10.0], [50.0, 50.0]]);
        pad.clear();
        assert!(pad.is_empty());
        assert_eq!(ink_pixels(&pad.raster), 0);
        assert!(pad.snapshot().is_none());
    }

    #[test]
    fn test_snapshot_does_not_lock() {
        let mut pad = SignaturePad::new();
        pad.draw_stroke(&[[10.0, 10.0], [50.0, 50.0]]);
        assert!(pad.snapshot().is_some());
        assert!(!pad.is_saved());
        pad.clear();
        assert!(pad.is_empty());
    }
}
