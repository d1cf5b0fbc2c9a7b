//! Display registry: a frozen snapshot of the windowing system's
//! logical display list, taken once per selection session.
//!
//! Tauri reports monitor geometry in physical pixels; everything here is
//! converted to logical (DIP) coordinates so the overlay windows and the
//! selection rectangles share one coordinate space. Configuration changes
//! mid-session are deliberately ignored; the next session re-snapshots.

use serde::{Deserialize, Serialize};
use tauri::AppHandle;

/// A point in logical (DIP) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A size in logical (DIP) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A rectangle in logical (DIP) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One logical display as the windowing system reports it.
///
/// `id` is opaque: Tauri only guarantees a name string, which may or may
/// not line up with whatever the capture backend calls the same panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalDisplay {
    pub id: String,
    pub index: usize,
    pub bounds: Rect,
    pub scale_factor: f64,
}

impl LogicalDisplay {
    pub fn size(&self) -> Size {
        Size {
            width: self.bounds.width,
            height: self.bounds.height,
        }
    }
}

/// Snapshot the current logical display list, ordered as enumerated.
///
/// An empty vec is a valid outcome (headless session, displays asleep) and
/// is treated upstream as "nothing to select", not as an error.
pub fn snapshot(app: &AppHandle) -> tauri::Result<Vec<LogicalDisplay>> {
    let monitors = app.available_monitors()?;

    Ok(monitors
        .into_iter()
        .enumerate()
        .map(|(index, monitor)| {
            let scale = monitor.scale_factor();
            let scale = if scale > 0.0 { scale } else { 1.0 };
            let position = monitor.position().to_logical::<f64>(scale);
            let size = monitor.size().to_logical::<f64>(scale);

            LogicalDisplay {
                id: monitor
                    .name()
                    .cloned()
                    .unwrap_or_else(|| format!("display-{index}")),
                index,
                bounds: Rect::new(position.x, position.y, size.width, size.height),
                scale_factor: scale,
            }
        })
        .collect())
}

/// Smallest rectangle enclosing every display's logical bounds.
///
/// Used when a capture could not be scoped to one display and the raster
/// spans the whole desktop. `None` when the registry is empty.
pub fn union_bounds(displays: &[LogicalDisplay]) -> Option<Rect> {
    let first = displays.first()?;
    let mut min_x = first.bounds.x;
    let mut min_y = first.bounds.y;
    let mut max_x = first.bounds.x + first.bounds.width;
    let mut max_y = first.bounds.y + first.bounds.height;

    for display in &displays[1..] {
        let b = display.bounds;
        min_x = min_x.min(b.x);
        min_y = min_y.min(b.y);
        max_x = max_x.max(b.x + b.width);
        max_y = max_y.max(b.y + b.height);
    }

    Some(Rect::new(min_x, min_y, max_x - min_x, max_y - min_y))
}
