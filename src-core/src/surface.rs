//! The compositing surface: an owned BGRA canvas.
//!
//! The compositor draws into it and the recorder's sampling loop reads
//! it back, so it is shared behind a mutex ([`SharedSurface`]). All
//! drawing is plain CPU blitting; the canvas persists between frames.

use crate::capture::SourceFrame;
use crate::transform::Transform;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Smallest accepted canvas edge, in pixels.
pub const MIN_CANVAS_EDGE: u32 = 16;

/// Largest accepted canvas edge, in pixels.
pub const MAX_CANVAS_EDGE: u32 = 8192;

/// Background written by `clear()`: opaque black, BGRA order.
const BACKGROUND_BGRA: [u8; 4] = [0x00, 0x00, 0x00, 0xff];

/// Canvas surface shared between the compositor and the sampler.
pub type SharedSurface = Arc<Mutex<CanvasSurface>>;

/// User-adjustable output dimensions of the compositing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanvasGeometry {
    pub width: u32,
    pub height: u32,
}

impl CanvasGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Clamp both edges into the supported range.
    pub fn clamped(self) -> Self {
        Self {
            width: self.width.clamp(MIN_CANVAS_EDGE, MAX_CANVAS_EDGE),
            height: self.height.clamp(MIN_CANVAS_EDGE, MAX_CANVAS_EDGE),
        }
    }
}

impl Default for CanvasGeometry {
    fn default() -> Self {
        Self {
            width: 960,
            height: 540,
        }
    }
}

/// An in-memory BGRA pixel surface that source frames are drawn onto.
pub struct CanvasSurface {
    geometry: CanvasGeometry,
    /// BGRA rows, `width * height * 4` bytes
    pixels: Vec<u8>,
}

impl CanvasSurface {
    /// Allocate a cleared surface at the given (clamped) geometry.
    pub fn new(geometry: CanvasGeometry) -> Self {
        let geometry = geometry.clamped();
        let mut surface = Self {
            geometry,
            pixels: vec![0; geometry.width as usize * geometry.height as usize * 4],
        };
        surface.clear();
        surface
    }

    /// Wrap a fresh surface in the shared handle used by the pipeline.
    pub fn shared(geometry: CanvasGeometry) -> SharedSurface {
        Arc::new(Mutex::new(Self::new(geometry)))
    }

    pub fn geometry(&self) -> CanvasGeometry {
        self.geometry
    }

    /// Reallocate at a new (clamped) geometry. The surface is cleared;
    /// previous contents are not preserved.
    pub fn resize(&mut self, geometry: CanvasGeometry) {
        let geometry = geometry.clamped();
        self.geometry = geometry;
        self.pixels = vec![0; geometry.width as usize * geometry.height as usize * 4];
        self.clear();
    }

    /// Fill the whole surface with the background color.
    pub fn clear(&mut self) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&BACKGROUND_BGRA);
        }
    }

    /// Draw a source frame at `(transform.x, transform.y)`, scaled by
    /// `transform.scale` relative to the frame's native dimensions.
    ///
    /// Nearest-neighbour sampling, clipped to the canvas. A transform
    /// whose effective destination size is not positive draws nothing.
    pub fn draw_frame(&mut self, frame: &SourceFrame, transform: &Transform) {
        let scale = transform.scale;
        if scale <= 0.0 || frame.width() == 0 || frame.height() == 0 {
            return;
        }
        // Dimensions come from the backend; keep the size math in
        // u128 so absurd values cannot overflow the guard.
        let src = frame.data();
        if (src.len() as u128) < frame.width() as u128 * frame.height() as u128 * 4 {
            return;
        }

        let dest_w = (frame.width() as f64 * scale).round() as i64;
        let dest_h = (frame.height() as f64 * scale).round() as i64;
        if dest_w <= 0 || dest_h <= 0 {
            return;
        }
        let origin_x = transform.x.round() as i64;
        let origin_y = transform.y.round() as i64;

        // Intersection of the destination rectangle with the canvas.
        let x0 = origin_x.max(0);
        let y0 = origin_y.max(0);
        let x1 = (origin_x + dest_w).min(self.geometry.width as i64);
        let y1 = (origin_y + dest_h).min(self.geometry.height as i64);
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let canvas_row = self.geometry.width as usize * 4;
        let src_row = frame.width() as usize * 4;
        for dy in y0..y1 {
            let sy = (((dy - origin_y) as f64 / scale) as u32).min(frame.height() - 1);
            let dst_base = dy as usize * canvas_row;
            let src_base = sy as usize * src_row;
            for dx in x0..x1 {
                let sx = (((dx - origin_x) as f64 / scale) as u32).min(frame.width() - 1);
                let dst = dst_base + dx as usize * 4;
                let s = src_base + sx as usize * 4;
                self.pixels[dst..dst + 4].copy_from_slice(&src[s..s + 4]);
            }
        }
    }

    /// Copy of the current BGRA contents.
    pub fn snapshot(&self) -> Vec<u8> {
        self.pixels.clone()
    }

    /// Raw BGRA contents.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl std::fmt::Debug for CanvasSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasSurface")
            .field("geometry", &self.geometry)
            .finish()
    }
}
