//! Coordinate resolution. Pure geometry, no OS calls.
//!
//! A selection is reported in the logical pixel space of one overlay
//! window; the raster we actually got back is in the physical pixel space
//! of whichever display (or desktop union) the backend captured. This
//! module reconciles the two into a crop rectangle that is guaranteed to
//! sit inside the raster.

use crate::display::{self, LogicalDisplay, Rect};
use crate::selection::{SelectionResult, SelectionTelemetry};

/// Crops narrower than this are rejected as accidental clicks.
pub const MIN_CROP_DIM: u32 = 2;

/// Raster dimensions plus the display-match flag from the capture bridge.
#[derive(Debug, Clone, Copy)]
pub struct RasterMeta {
    pub width: u32,
    pub height: u32,
    pub matched_target_display: bool,
}

/// Final crop rectangle in raster pixel space. Always strictly inside the
/// raster with both dimensions >= [`MIN_CROP_DIM`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    #[error("Selected area is too small")]
    SelectionTooSmall,
}

/// Mean (screen − client) delta per axis across the recorded clicks.
///
/// The overlay reports client-area coordinates that can sit a constant
/// bias away from true global screen coordinates, depending on the
/// compositor. Comparing the paired coordinates at each click measures
/// that bias empirically; this is a best-effort calibration, not a
/// guaranteed transform, and it is zero whenever telemetry is missing.
fn overlay_offset(telemetry: Option<&SelectionTelemetry>) -> (f64, f64) {
    let Some(t) = telemetry else {
        return (0.0, 0.0);
    };

    let mut dx = vec![t.first_point_screen.x - t.first_point_client.x];
    let mut dy = vec![t.first_point_screen.y - t.first_point_client.y];
    if let (Some(screen), Some(client)) = (t.second_point_screen, t.second_point_client) {
        dx.push(screen.x - client.x);
        dy.push(screen.y - client.y);
    }

    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    (mean(&dx), mean(&dy))
}

/// Map the logical selection rectangle onto the captured raster.
///
/// Two regimes: when the raster is known to be the selected display, each
/// axis scales by `raster_dim / display_logical_dim`; when the raster is a
/// fallback spanning the whole desktop, the selection is re-anchored
/// against the union of all display bounds. Values are rounded, never
/// truncated, so fractional pixel boundaries do not systematically
/// under-crop.
pub fn resolve_crop(
    selection: &SelectionResult,
    displays: &[LogicalDisplay],
    raster: &RasterMeta,
) -> Result<CropRect, GeometryError> {
    let (offset_x, offset_y) = overlay_offset(selection.telemetry.as_ref());
    let scale = if selection.scale_factor.is_finite() && selection.scale_factor > 0.0 {
        selection.scale_factor
    } else {
        1.0
    };
    let raster_w = raster.width as f64;
    let raster_h = raster.height as f64;

    let origin_x = selection.rect.x + offset_x;
    let origin_y = selection.rect.y + offset_y;

    let mut left;
    let mut top;
    let mut width;
    let mut height;

    if raster.matched_target_display {
        let base_w = if selection.display_size.width > 0.0 {
            selection.display_size.width
        } else {
            raster_w
        };
        let base_h = if selection.display_size.height > 0.0 {
            selection.display_size.height
        } else {
            raster_h
        };
        let scale_x = if base_w > 0.0 && raster_w > 0.0 {
            raster_w / base_w
        } else {
            scale.max(1.0)
        };
        let scale_y = if base_h > 0.0 && raster_h > 0.0 {
            raster_h / base_h
        } else {
            scale.max(1.0)
        };

        left = (origin_x * scale_x).round();
        top = (origin_y * scale_y).round();
        width = (selection.rect.width * scale_x).round();
        height = (selection.rect.height * scale_y).round();
    } else {
        let union = display::union_bounds(displays)
            .unwrap_or_else(|| Rect::new(0.0, 0.0, raster_w, raster_h));

        // Logical → physical point conversion would go here; the
        // windowing layer exposes none, so the conversion is identity and
        // the per-axis recompute below catches degenerate extents.
        let top_left_x = selection.display_bounds.x + origin_x;
        let top_left_y = selection.display_bounds.y + origin_y;
        let bottom_right_x = top_left_x + selection.rect.width;
        let bottom_right_y = top_left_y + selection.rect.height;

        left = (top_left_x - union.x).round();
        top = (top_left_y - union.y).round();
        width = (bottom_right_x - top_left_x).round();
        height = (bottom_right_y - top_left_y).round();

        if !width.is_finite() || width <= 0.0 {
            let fallback_scale_x = if selection.display_size.width > 0.0 {
                raster_w / selection.display_size.width
            } else {
                scale.max(1.0)
            };
            width = (selection.rect.width * fallback_scale_x).round();
        }
        if !height.is_finite() || height <= 0.0 {
            let fallback_scale_y = if selection.display_size.height > 0.0 {
                raster_h / selection.display_size.height
            } else {
                scale.max(1.0)
            };
            height = (selection.rect.height * fallback_scale_y).round();
        }
    }

    // A selection that never had any area fails here, before the minimum
    // clamp below could quietly inflate it into a 2x2 crop.
    if !width.is_finite() || !height.is_finite() || width <= 0.0 || height <= 0.0 {
        return Err(GeometryError::SelectionTooSmall);
    }

    width = width.max(MIN_CROP_DIM as f64);
    height = height.max(MIN_CROP_DIM as f64);

    if !left.is_finite() {
        left = 0.0;
    }
    if !top.is_finite() {
        top = 0.0;
    }

    if left < 0.0 {
        width += left;
        left = 0.0;
    }
    if top < 0.0 {
        height += top;
        top = 0.0;
    }

    if left + width > raster_w {
        width = raster_w - left;
    }
    if top + height > raster_h {
        height = raster_h - top;
    }

    if width < MIN_CROP_DIM as f64 || height < MIN_CROP_DIM as f64 {
        return Err(GeometryError::SelectionTooSmall);
    }

    Ok(CropRect {
        left: left as u32,
        top: top as u32,
        width: width as u32,
        height: height as u32,
    })
}
