// Viewport-to-image geometry for the capture overlay
//
// The overlay is moved and resized in viewport (logical pixel) space; the
// photo it selects from has its own, device-dependent resolution.

use crate::core::errors::{GeometryError, GeometryResult};
use crate::core::types::{CropRect, FrameDimensions, ViewportRect};

/// Smallest side length the overlay can be resized to, in logical pixels
pub const MIN_OVERLAY_SIDE: f64 = 40.0;

/// Map an overlay rectangle onto the pixel grid of a captured image.
///
/// Each axis is scaled independently (`image / viewport`) with no aspect
/// ratio correction, then floored to whole pixels. A crop running past the
/// right or bottom edge is shortened to fit; a crop that ends up with no
/// area is rejected with [`GeometryError::InvalidRegion`].
pub fn map_viewport_rect_to_image_rect(
    rect: &ViewportRect,
    viewport: &FrameDimensions,
    image: &FrameDimensions,
) -> GeometryResult<CropRect> {
    ensure_frame(viewport)?;
    ensure_frame(image)?;

    let scale_x = image.width / viewport.width;
    let scale_y = image.height / viewport.height;

    let image_width = image.width.floor().min(u32::MAX as f64) as i64;
    let image_height = image.height.floor().min(u32::MAX as f64) as i64;

    let (origin_x, width) = scale_axis(rect.x, rect.width, scale_x, image_width);
    let (origin_y, height) = scale_axis(rect.y, rect.height, scale_y, image_height);

    if width <= 0 || height <= 0 {
        return Err(GeometryError::InvalidRegion { width, height });
    }

    Ok(CropRect {
        origin_x: origin_x as u32,
        origin_y: origin_y as u32,
        width: width as u32,
        height: height as u32,
    })
}

/// Scale one axis and clamp it to `[0, limit]`
fn scale_axis(origin: f64, length: f64, scale: f64, limit: i64) -> (i64, i64) {
    // Float-to-int casts saturate, so only the sum below can overflow
    let start = if origin.is_finite() {
        ((origin * scale).floor() as i64).clamp(0, limit)
    } else {
        0
    };
    let size = if length.is_finite() {
        (length * scale).floor() as i64
    } else {
        0
    };

    (start, size.min(limit - start))
}

fn ensure_frame(frame: &FrameDimensions) -> GeometryResult<()> {
    if frame.is_valid() {
        Ok(())
    } else {
        Err(GeometryError::InvalidFrame {
            width: frame.width,
            height: frame.height,
        })
    }
}

/// Overlay size presets offered next to the viewfinder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePreset {
    Small,
    Medium,
    Large,
}

impl FramePreset {
    /// Overlay of this preset size, centred in the viewport
    pub fn rect_in(&self, viewport: &FrameDimensions) -> ViewportRect {
        let (width_fraction, height) = match self {
            FramePreset::Small => (0.3, 100.0),
            FramePreset::Medium => (0.6, 200.0),
            FramePreset::Large => (0.8, 300.0),
        };
        let width = viewport.width * width_fraction;
        let centred = ViewportRect::new(
            (viewport.width - width) / 2.0,
            (viewport.height - height) / 2.0,
            width,
            height,
        );
        centred.clamped_to(viewport)
    }
}

impl ViewportRect {
    /// Keep the rectangle inside the viewport and at least [`MIN_OVERLAY_SIDE`] wide/high
    pub fn clamped_to(&self, viewport: &FrameDimensions) -> ViewportRect {
        let width = clamp_side(self.width, viewport.width);
        let height = clamp_side(self.height, viewport.height);
        ViewportRect {
            x: self.x.clamp(0.0, (viewport.width - width).max(0.0)),
            y: self.y.clamp(0.0, (viewport.height - height).max(0.0)),
            width,
            height,
        }
    }

    /// Pan gesture: translate by `(dx, dy)`, stopping at the viewport edges
    pub fn moved_by(&self, dx: f64, dy: f64, viewport: &FrameDimensions) -> ViewportRect {
        ViewportRect {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
        .clamped_to(viewport)
    }

    /// Resize gesture from the bottom-right handle; the origin stays put
    pub fn resized_by(&self, dw: f64, dh: f64, viewport: &FrameDimensions) -> ViewportRect {
        let max_width = (viewport.width - self.x).max(MIN_OVERLAY_SIDE);
        let max_height = (viewport.height - self.y).max(MIN_OVERLAY_SIDE);
        ViewportRect {
            width: (self.width + dw).clamp(MIN_OVERLAY_SIDE, max_width),
            height: (self.height + dh).clamp(MIN_OVERLAY_SIDE, max_height),
            ..*self
        }
        .clamped_to(viewport)
    }
}

fn clamp_side(side: f64, available: f64) -> f64 {
    let upper = available.max(0.0);
    let lower = MIN_OVERLAY_SIDE.min(upper);
    if side.is_finite() {
        side.clamp(lower, upper)
    } else {
        upper
    }
}
