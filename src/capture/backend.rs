//! Capture backend bridge, talking to the OS through `xcap`.
//!
//! The backend enumerates displays on its own terms; nothing guarantees
//! its ids line up with the windowing system's. `derive_candidates` is the
//! ordered guesswork that bridges the two enumerations, and
//! `capture_with_candidates` walks those guesses until one captures,
//! falling back to an unscoped grab when none do.

use std::fmt;

use image::RgbaImage;
use xcap::Monitor;

use super::CaptureError;
use crate::selection::SelectionResult;

/// A display as the capture backend reports it (physical pixels).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDisplay {
    pub id: u32,
    pub name: Option<String>,
    pub width: u32,
    pub height: u32,
}

/// An identifier the backend might accept for a specific display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateId {
    Id(u32),
    Name(String),
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateId::Id(id) => write!(f, "{id}"),
            CandidateId::Name(name) => write!(f, "{name}"),
        }
    }
}

/// A raster returned by the backend, tagged with whether it is known to
/// correspond to the selected display or is a best-effort fallback.
pub struct CapturedRaster {
    pub image: RgbaImage,
    pub matched_target_display: bool,
}

/// Seam between candidate iteration and the actual OS capture calls.
pub trait CaptureBackend {
    /// Best-effort display enumeration; may legitimately fail or be empty.
    fn list_displays(&self) -> Result<Vec<BackendDisplay>, CaptureError>;

    /// Capture the display the candidate refers to.
    fn capture_display(&self, candidate: &CandidateId) -> Result<RgbaImage, CaptureError>;

    /// Unscoped capture (primary display, or whatever the backend can get).
    fn capture_fallback(&self) -> Result<RgbaImage, CaptureError>;
}

fn push_unique(candidates: &mut Vec<CandidateId>, candidate: CandidateId) {
    if !candidates.contains(&candidate) {
        candidates.push(candidate);
    }
}

/// Ordered, deduplicated candidate list for the selected display.
///
/// Priority: the selection's own id (numeric and string forms), then a
/// backend display matched by id equivalence, then one matched by expected
/// pixel size (`round(logical × scale)`), then the backend display at the
/// same ordinal index. When nothing matches, the own-id guesses are left
/// as-is and capture will most likely take the fallback path.
pub fn derive_candidates(
    selection: &SelectionResult,
    backend_displays: &[BackendDisplay],
) -> Vec<CandidateId> {
    let mut candidates = Vec::new();

    let own_id = selection.display_id.trim();
    if let Ok(numeric) = own_id.parse::<u32>() {
        push_unique(&mut candidates, CandidateId::Id(numeric));
    }
    if !own_id.is_empty() {
        push_unique(&mut candidates, CandidateId::Name(own_id.to_string()));
    }

    if !backend_displays.is_empty() {
        let numeric_own = own_id.parse::<u32>().ok();
        let match_by_id = backend_displays.iter().find(|d| {
            if numeric_own == Some(d.id) || d.id.to_string() == own_id {
                return true;
            }
            d.name.as_deref() == Some(own_id)
        });

        if let Some(display) = match_by_id {
            push_unique(&mut candidates, CandidateId::Id(display.id));
        } else {
            let expected_width =
                (selection.display_size.width * selection.scale_factor).round() as u32;
            let expected_height =
                (selection.display_size.height * selection.scale_factor).round() as u32;
            let match_by_size = backend_displays
                .iter()
                .find(|d| d.width == expected_width && d.height == expected_height);
            if let Some(display) = match_by_size {
                push_unique(&mut candidates, CandidateId::Id(display.id));
            }
        }

        if let Some(display) = backend_displays.get(selection.display_index) {
            push_unique(&mut candidates, CandidateId::Id(display.id));
        }
    }

    candidates
}

/// Try candidates in order; the first capture that succeeds wins and marks
/// the raster as display-matched. Individual failures are recoverable;
/// only a failed fallback is fatal.
pub fn capture_with_candidates<B: CaptureBackend>(
    backend: &B,
    candidates: &[CandidateId],
) -> Result<CapturedRaster, CaptureError> {
    for candidate in candidates {
        match backend.capture_display(candidate) {
            Ok(image) => {
                log::debug!("captured target display via candidate {candidate}");
                return Ok(CapturedRaster {
                    image,
                    matched_target_display: true,
                });
            }
            Err(error) => {
                log::warn!("candidate {candidate} capture failed: {error}");
            }
        }
    }

    log::debug!("no candidate capture succeeded; taking unscoped fallback capture");
    let image = backend.capture_fallback()?;
    Ok(CapturedRaster {
        image,
        matched_target_display: false,
    })
}

/// The real backend, backed by `xcap::Monitor`.
pub struct XcapBackend;

fn monitor_matches(monitor: &Monitor, candidate: &CandidateId) -> bool {
    match candidate {
        CandidateId::Id(id) => monitor.id().map(|v| v == *id).unwrap_or(false),
        CandidateId::Name(name) => {
            if monitor.name().map(|n| n == *name).unwrap_or(false) {
                return true;
            }
            match name.parse::<u32>() {
                Ok(numeric) => monitor.id().map(|v| v == numeric).unwrap_or(false),
                Err(_) => false,
            }
        }
    }
}

impl CaptureBackend for XcapBackend {
    fn list_displays(&self) -> Result<Vec<BackendDisplay>, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::Enumeration(e.to_string()))?;

        // Monitors whose metadata cannot be read are skipped rather than
        // failing the whole enumeration.
        Ok(monitors
            .iter()
            .filter_map(|monitor| {
                let id = monitor.id().ok()?;
                let width = monitor.width().ok()?;
                let height = monitor.height().ok()?;
                Some(BackendDisplay {
                    id,
                    name: monitor.name().ok(),
                    width,
                    height,
                })
            })
            .collect())
    }

    fn capture_display(&self, candidate: &CandidateId) -> Result<RgbaImage, CaptureError> {
        let monitors =
            Monitor::all().map_err(|e| CaptureError::Enumeration(e.to_string()))?;
        let monitor = monitors
            .into_iter()
            .find(|m| monitor_matches(m, candidate))
            .ok_or_else(|| CaptureError::DisplayNotFound(candidate.to_string()))?;

        monitor
            .capture_image()
            .map_err(|e| CaptureError::Capture(e.to_string()))
    }

    fn capture_fallback(&self) -> Result<RgbaImage, CaptureError> {
        let mut monitors =
            Monitor::all().map_err(|e| CaptureError::Enumeration(e.to_string()))?;
        if monitors.is_empty() {
            return Err(CaptureError::NoDisplays);
        }

        // Primary if any monitor claims to be, otherwise the first.
        let index = monitors
            .iter()
            .position(|m| m.is_primary().unwrap_or(false))
            .unwrap_or(0);
        let monitor = monitors.swap_remove(index);

        monitor
            .capture_image()
            .map_err(|e| CaptureError::Capture(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{Rect, Size};
    use std::cell::RefCell;

    fn selection(display_id: &str, index: usize, scale: f64, size: (f64, f64)) -> SelectionResult {
        SelectionResult {
            display_id: display_id.to_string(),
            display_index: index,
            scale_factor: scale,
            rect: Rect::new(0.0, 0.0, 100.0, 100.0),
            display_size: Size {
                width: size.0,
                height: size.1,
            },
            display_bounds: Rect::new(0.0, 0.0, size.0, size.1),
            telemetry: None,
        }
    }

    fn backend_display(id: u32, name: &str, width: u32, height: u32) -> BackendDisplay {
        BackendDisplay {
            id,
            name: Some(name.to_string()),
            width,
            height,
        }
    }

    #[test]
    fn numeric_own_id_yields_both_forms_first() {
        let candidates = derive_candidates(&selection("7", 0, 1.0, (800.0, 600.0)), &[]);
        assert_eq!(
            candidates,
            vec![CandidateId::Id(7), CandidateId::Name("7".into())]
        );
    }

    #[test]
    fn id_match_takes_priority_over_size_match() {
        let displays = vec![
            backend_display(1, "Display 1", 1600, 1200),
            backend_display(2, "main", 3840, 2160),
        ];
        // "main" matches display 2 by name even though display 1 matches
        // the expected pixel size.
        let candidates = derive_candidates(&selection("main", 0, 2.0, (800.0, 600.0)), &displays);
        assert_eq!(
            candidates,
            vec![
                CandidateId::Name("main".into()),
                CandidateId::Id(2),
                CandidateId::Id(1), // ordinal-index fallback
            ]
        );
    }

    #[test]
    fn size_match_engages_when_no_id_match() {
        let displays = vec![
            backend_display(10, "A", 1920, 1080),
            backend_display(11, "B", 2000, 1400),
        ];
        let candidates =
            derive_candidates(&selection("Built-in", 1, 2.0, (1000.0, 700.0)), &displays);
        assert_eq!(
            candidates,
            vec![
                CandidateId::Name("Built-in".into()),
                CandidateId::Id(11), // 1000x700 @ 2.0 == 2000x1400
            ]
        );
        // Index 1 resolves to the same display; deduplicated.
    }

    #[test]
    fn ordinal_index_is_ignored_when_out_of_range() {
        let displays = vec![backend_display(10, "A", 1920, 1080)];
        let candidates = derive_candidates(&selection("ghost", 5, 1.0, (1.0, 1.0)), &displays);
        assert_eq!(candidates, vec![CandidateId::Name("ghost".into())]);
    }

    #[test]
    fn no_match_leaves_only_own_id_guesses() {
        let candidates = derive_candidates(&selection("Built-in", 0, 2.0, (1000.0, 700.0)), &[]);
        assert_eq!(candidates, vec![CandidateId::Name("Built-in".into())]);
    }

    // ── capture fallback chain ──────────────────────────────────────────

    struct MockBackend {
        good_ids: Vec<u32>,
        fallback_ok: bool,
        display_calls: RefCell<Vec<CandidateId>>,
        fallback_calls: RefCell<usize>,
    }

    impl MockBackend {
        fn new(good_ids: Vec<u32>, fallback_ok: bool) -> Self {
            Self {
                good_ids,
                fallback_ok,
                display_calls: RefCell::new(Vec::new()),
                fallback_calls: RefCell::new(0),
            }
        }
    }

    impl CaptureBackend for MockBackend {
        fn list_displays(&self) -> Result<Vec<BackendDisplay>, CaptureError> {
            Ok(Vec::new())
        }

        fn capture_display(&self, candidate: &CandidateId) -> Result<RgbaImage, CaptureError> {
            self.display_calls.borrow_mut().push(candidate.clone());
            match candidate {
                CandidateId::Id(id) if self.good_ids.contains(id) => Ok(RgbaImage::new(4, 4)),
                _ => Err(CaptureError::Capture("mock candidate failure".into())),
            }
        }

        fn capture_fallback(&self) -> Result<RgbaImage, CaptureError> {
            *self.fallback_calls.borrow_mut() += 1;
            if self.fallback_ok {
                Ok(RgbaImage::new(8, 8))
            } else {
                Err(CaptureError::Capture("mock fallback failure".into()))
            }
        }
    }

    #[test]
    fn first_successful_candidate_stops_the_loop() {
        let backend = MockBackend::new(vec![2], true);
        let candidates = vec![
            CandidateId::Id(1),
            CandidateId::Id(2),
            CandidateId::Id(3),
        ];
        let raster = capture_with_candidates(&backend, &candidates).unwrap();
        assert!(raster.matched_target_display);
        assert_eq!(
            *backend.display_calls.borrow(),
            vec![CandidateId::Id(1), CandidateId::Id(2)]
        );
        assert_eq!(*backend.fallback_calls.borrow(), 0);
    }

    #[test]
    fn exhausted_candidates_take_exactly_one_fallback() {
        let backend = MockBackend::new(vec![], true);
        let candidates = vec![CandidateId::Id(1), CandidateId::Name("x".into())];
        let raster = capture_with_candidates(&backend, &candidates).unwrap();
        assert!(!raster.matched_target_display);
        assert_eq!(backend.display_calls.borrow().len(), 2);
        assert_eq!(*backend.fallback_calls.borrow(), 1);
    }

    #[test]
    fn fallback_failure_is_fatal() {
        let backend = MockBackend::new(vec![], false);
        let candidates = vec![CandidateId::Id(1)];
        let result = capture_with_candidates(&backend, &candidates);
        assert!(matches!(result, Err(CaptureError::Capture(_))));
        assert_eq!(*backend.fallback_calls.borrow(), 1);
    }

    #[test]
    fn empty_candidate_list_goes_straight_to_fallback() {
        let backend = MockBackend::new(vec![], true);
        let raster = capture_with_candidates(&backend, &[]).unwrap();
        assert!(!raster.matched_target_display);
        assert_eq!(*backend.fallback_calls.borrow(), 1);
    }
}
