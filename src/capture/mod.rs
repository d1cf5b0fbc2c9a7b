//! Screen capture domain: candidate matching, geometry, extraction.
//!
//! `capture_region` is the pipeline behind a completed selection: snapshot
//! the logical displays again, guess which backend display the user meant,
//! grab a raster, resolve the crop rectangle, encode, persist, enqueue.

mod backend;
mod extract;
pub mod geometry;

pub use backend::{
    capture_with_candidates, derive_candidates, BackendDisplay, CandidateId, CaptureBackend,
    CapturedRaster, XcapBackend,
};
pub use extract::{crop_to_png_bytes, encode_png, ExtractError};
pub use geometry::{resolve_crop, CropRect, GeometryError, RasterMeta};

use std::path::PathBuf;
use std::time::Instant;

use tauri::AppHandle;

use crate::display;
use crate::queue::QueueManager;
use crate::selection::SelectionResult;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Failed to enumerate capture displays: {0}")]
    Enumeration(String),

    #[error("No capture displays available")]
    NoDisplays,

    #[error("No capture display matches candidate {0}")]
    DisplayNotFound(String),

    #[error("Screen capture failed: {0}")]
    Capture(String),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Failed to read display layout: {0}")]
    Displays(#[from] tauri::Error),

    #[error("Failed to persist screenshot: {0}")]
    Io(#[from] std::io::Error),
}

/// Capture the selected region and enqueue the resulting PNG.
///
/// Candidate failures are recovered by the fallback chain inside
/// [`capture_with_candidates`]; only a total capture failure or a
/// degenerate crop rectangle aborts. The file is written in full before
/// it is enqueued, so a failed write never leaves a corrupt entry behind.
pub fn capture_region(
    app: &AppHandle,
    selection: &SelectionResult,
    queues: &mut QueueManager,
) -> Result<PathBuf, CaptureError> {
    let start = Instant::now();

    let displays = display::snapshot(app)?;

    let backend = XcapBackend;
    let backend_displays = match backend.list_displays() {
        Ok(displays) => displays,
        Err(error) => {
            log::warn!("capture display enumeration failed: {error}");
            Vec::new()
        }
    };

    let candidates = derive_candidates(selection, &backend_displays);
    log::debug!(
        "capture candidates for display {}: {:?}",
        selection.display_id,
        candidates
    );

    let raster = capture_with_candidates(&backend, &candidates)?;
    let meta = RasterMeta {
        width: raster.image.width(),
        height: raster.image.height(),
        matched_target_display: raster.matched_target_display,
    };

    let crop = resolve_crop(selection, &displays, &meta)?;
    let png_bytes = crop_to_png_bytes(&raster.image, &crop)?;

    let path = queues.next_output_path();
    std::fs::write(&path, &png_bytes)?;
    queues.enqueue(path.clone());

    log::info!(
        "captured region {}x{} at {},{} (matched={}) in {}ms, {} bytes",
        crop.width,
        crop.height,
        crop.left,
        crop.top,
        meta.matched_target_display,
        start.elapsed().as_millis(),
        png_bytes.len()
    );

    Ok(path)
}

/// Capture the whole primary display and enqueue it.
pub fn take_screenshot(queues: &mut QueueManager) -> Result<PathBuf, CaptureError> {
    let start = Instant::now();

    let backend = XcapBackend;
    let image = backend.capture_fallback()?;
    let png_bytes = encode_png(&image)?;

    let path = queues.next_output_path();
    std::fs::write(&path, &png_bytes)?;
    queues.enqueue(path.clone());

    log::info!(
        "captured full screen {}x{} in {}ms",
        image.width(),
        image.height(),
        start.elapsed().as_millis()
    );

    Ok(path)
}
