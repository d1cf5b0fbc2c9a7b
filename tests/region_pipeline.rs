//! End-to-end pipeline tests over a scripted capture backend: candidate
//! derivation, the capture fallback chain, crop resolution, PNG extraction
//! and queue persistence, with no real displays involved.

use image::{Rgba, RgbaImage};
use tempfile::tempdir;

use snip_queue_lib::capture::{
    capture_with_candidates, crop_to_png_bytes, derive_candidates, resolve_crop, BackendDisplay,
    CandidateId, CaptureBackend, RasterMeta,
};
use snip_queue_lib::capture::CaptureError;
use snip_queue_lib::display::{LogicalDisplay, Rect, Size};
use snip_queue_lib::queue::{QueueManager, View, MAX_SCREENSHOTS};
use snip_queue_lib::selection::SelectionResult;

/// A backend over synthetic displays. Each display captures to a raster of
/// its advertised size filled with a per-display color, so assertions can
/// tell which display a pixel came from.
struct ScriptedBackend {
    displays: Vec<BackendDisplay>,
    colors: Vec<Rgba<u8>>,
    broken_ids: Vec<u32>,
    fallback: Option<(u32, u32, Rgba<u8>)>,
}

impl ScriptedBackend {
    fn raster(width: u32, height: u32, color: Rgba<u8>) -> RgbaImage {
        RgbaImage::from_pixel(width, height, color)
    }
}

impl CaptureBackend for ScriptedBackend {
    fn list_displays(&self) -> Result<Vec<BackendDisplay>, CaptureError> {
        Ok(self.displays.clone())
    }

    fn capture_display(&self, candidate: &CandidateId) -> Result<RgbaImage, CaptureError> {
        let position = self.displays.iter().position(|d| match candidate {
            CandidateId::Id(id) => d.id == *id,
            CandidateId::Name(name) => d.name.as_deref() == Some(name.as_str()),
        });
        let Some(position) = position else {
            return Err(CaptureError::DisplayNotFound(candidate.to_string()));
        };
        let display = &self.displays[position];
        if self.broken_ids.contains(&display.id) {
            return Err(CaptureError::Capture("scripted capture failure".into()));
        }
        Ok(Self::raster(display.width, display.height, self.colors[position]))
    }

    fn capture_fallback(&self) -> Result<RgbaImage, CaptureError> {
        match self.fallback {
            Some((width, height, color)) => Ok(Self::raster(width, height, color)),
            None => Err(CaptureError::Capture("scripted fallback failure".into())),
        }
    }
}

fn logical_display(id: &str, index: usize, bounds: Rect, scale: f64) -> LogicalDisplay {
    LogicalDisplay {
        id: id.to_string(),
        index,
        bounds,
        scale_factor: scale,
    }
}

fn selection_on(display: &LogicalDisplay, rect: Rect) -> SelectionResult {
    SelectionResult {
        display_id: display.id.clone(),
        display_index: display.index,
        scale_factor: display.scale_factor,
        rect,
        display_size: Size {
            width: display.bounds.width,
            height: display.bounds.height,
        },
        display_bounds: display.bounds,
        telemetry: None,
    }
}

fn decode(png: &[u8]) -> RgbaImage {
    image::load_from_memory(png).unwrap().to_rgba8()
}

#[test]
fn hidpi_selection_crops_the_matched_display() {
    let displays = vec![
        logical_display("101", 0, Rect::new(0.0, 0.0, 1000.0, 700.0), 2.0),
        logical_display("102", 1, Rect::new(1000.0, 0.0, 1280.0, 1024.0), 1.0),
    ];
    let backend = ScriptedBackend {
        displays: vec![
            BackendDisplay {
                id: 101,
                name: Some("Built-in".into()),
                width: 2000,
                height: 1400,
            },
            BackendDisplay {
                id: 102,
                name: Some("External".into()),
                width: 1280,
                height: 1024,
            },
        ],
        colors: vec![Rgba([10, 0, 0, 255]), Rgba([0, 20, 0, 255])],
        broken_ids: vec![],
        fallback: None,
    };

    let selection = selection_on(&displays[0], Rect::new(100.0, 50.0, 300.0, 200.0));
    let backend_displays = backend.list_displays().unwrap();
    let candidates = derive_candidates(&selection, &backend_displays);
    assert_eq!(candidates.first(), Some(&CandidateId::Id(101)));

    let raster = capture_with_candidates(&backend, &candidates).unwrap();
    assert!(raster.matched_target_display);

    let meta = RasterMeta {
        width: raster.image.width(),
        height: raster.image.height(),
        matched_target_display: true,
    };
    let crop = resolve_crop(&selection, &displays, &meta).unwrap();
    assert_eq!((crop.left, crop.top), (200, 100));
    assert_eq!((crop.width, crop.height), (600, 400));

    let png = crop_to_png_bytes(&raster.image, &crop).unwrap();
    let decoded = decode(&png);
    assert_eq!(decoded.dimensions(), (600, 400));
    assert_eq!(decoded.get_pixel(0, 0), &Rgba([10, 0, 0, 255]));
}

#[test]
fn broken_display_falls_back_to_desktop_grab_and_reanchors() {
    let displays = vec![
        logical_display("201", 0, Rect::new(0.0, 0.0, 1000.0, 700.0), 1.0),
        logical_display("202", 1, Rect::new(1000.0, 0.0, 1000.0, 700.0), 1.0),
    ];
    // Selection is on the second display; its capture is broken, so the
    // pipeline takes a desktop-union fallback grab instead.
    let backend = ScriptedBackend {
        displays: vec![
            BackendDisplay {
                id: 201,
                name: None,
                width: 1000,
                height: 700,
            },
            BackendDisplay {
                id: 202,
                name: None,
                width: 1000,
                height: 700,
            },
        ],
        colors: vec![Rgba([1, 1, 1, 255]), Rgba([2, 2, 2, 255])],
        broken_ids: vec![202],
        fallback: Some((2000, 700, Rgba([9, 9, 9, 255]))),
    };

    let selection = selection_on(&displays[1], Rect::new(50.0, 40.0, 200.0, 100.0));
    let candidates = derive_candidates(&selection, &backend.list_displays().unwrap());
    let raster = capture_with_candidates(&backend, &candidates).unwrap();
    assert!(!raster.matched_target_display);
    assert_eq!(raster.image.dimensions(), (2000, 700));

    let meta = RasterMeta {
        width: 2000,
        height: 700,
        matched_target_display: false,
    };
    let crop = resolve_crop(&selection, &displays, &meta).unwrap();
    // Re-anchored past the first display's width.
    assert_eq!((crop.left, crop.top), (1050, 40));
    assert_eq!((crop.width, crop.height), (200, 100));

    let png = crop_to_png_bytes(&raster.image, &crop).unwrap();
    assert_eq!(decode(&png).dimensions(), (200, 100));
}

#[test]
fn unknown_display_id_still_matches_by_expected_pixel_size() {
    let display = logical_display("weird-uuid", 0, Rect::new(0.0, 0.0, 1000.0, 700.0), 2.0);
    let backend = ScriptedBackend {
        displays: vec![BackendDisplay {
            id: 55,
            name: Some("Panel".into()),
            width: 2000,
            height: 1400,
        }],
        colors: vec![Rgba([7, 7, 7, 255])],
        broken_ids: vec![],
        fallback: None,
    };

    let selection = selection_on(&display, Rect::new(0.0, 0.0, 10.0, 10.0));
    let candidates = derive_candidates(&selection, &backend.list_displays().unwrap());
    // The own-id guess fails, the size-derived candidate succeeds.
    let raster = capture_with_candidates(&backend, &candidates).unwrap();
    assert!(raster.matched_target_display);
    assert_eq!(raster.image.dimensions(), (2000, 1400));
}

#[test]
fn captured_files_flow_through_the_bounded_queue() {
    let tmp = tempdir().unwrap();
    let mut queues = QueueManager::new(tmp.path()).unwrap();

    let display = logical_display("1", 0, Rect::new(0.0, 0.0, 100.0, 100.0), 1.0);
    let backend = ScriptedBackend {
        displays: vec![BackendDisplay {
            id: 1,
            name: None,
            width: 100,
            height: 100,
        }],
        colors: vec![Rgba([3, 3, 3, 255])],
        broken_ids: vec![],
        fallback: None,
    };

    let mut first_path = None;
    for i in 0..=MAX_SCREENSHOTS {
        let selection = selection_on(&display, Rect::new(0.0, 0.0, 10.0 + i as f64, 10.0));
        let candidates = derive_candidates(&selection, &backend.list_displays().unwrap());
        let raster = capture_with_candidates(&backend, &candidates).unwrap();
        let meta = RasterMeta {
            width: raster.image.width(),
            height: raster.image.height(),
            matched_target_display: raster.matched_target_display,
        };
        let crop = resolve_crop(&selection, &[display.clone()], &meta).unwrap();
        let png = crop_to_png_bytes(&raster.image, &crop).unwrap();

        let path = queues.next_output_path();
        std::fs::write(&path, &png).unwrap();
        queues.enqueue(path.clone());
        if first_path.is_none() {
            first_path = Some(path);
        }
    }

    let paths = queues.paths(View::Primary);
    assert_eq!(paths.len(), MAX_SCREENSHOTS);
    let first_path = first_path.unwrap();
    assert!(!paths.contains(&first_path), "oldest entry must be evicted");
    assert!(!first_path.exists(), "evicted file must be deleted");
    for path in &paths {
        assert!(path.exists());
    }
}
