//! Region-screenshot app: global hotkeys drive an interactive multi-display
//! selection overlay, captures are cropped and PNG-encoded, and results land
//! in bounded per-view queues that the frontend reads back over commands.

pub mod capture;
pub mod display;
pub mod queue;
pub mod selection;
mod shortcuts;

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager};

use capture::CaptureError;
use queue::{QueueManager, View};
use selection::{SelectionError, SelectionState};

/// Delay between overlay teardown and the actual screen grab, so the
/// compositor has removed the overlay windows from the frame.
const CAPTURE_SETTLE_MS: u64 = 50;

const SCREENSHOT_TAKEN_EVENT: &str = "screenshot-taken";

/// Managed queue state. The mutex is held only for short synchronous
/// sections; never across an await point.
pub struct QueueState(pub Mutex<QueueManager>);

impl QueueState {
    fn lock(&self) -> MutexGuard<'_, QueueManager> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("Failed to read screenshot back: {0}")]
    Preview(#[from] std::io::Error),
}

/// Event payload announcing a new screenshot to the frontend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotTaken {
    pub path: String,
    pub preview: String,
}

impl ScreenshotTaken {
    fn from_path(path: &std::path::Path) -> Result<Self, std::io::Error> {
        Ok(Self {
            path: path.to_string_lossy().into_owned(),
            preview: queue::image_preview(path)?,
        })
    }
}

/// The full region flow: run a selection session, then capture and enqueue.
/// `Ok(None)` means the user cancelled or there was nothing to select.
pub async fn region_capture_flow(app: AppHandle) -> Result<Option<ScreenshotTaken>, FlowError> {
    let Some(selection) = selection::start_selection(app.clone()).await? else {
        return Ok(None);
    };

    tokio::time::sleep(Duration::from_millis(CAPTURE_SETTLE_MS)).await;

    let path = {
        let queues = app.state::<QueueState>();
        let mut queues = queues.lock();
        capture::capture_region(&app, &selection, &mut queues)?
    };

    let shot = ScreenshotTaken::from_path(&path)?;
    if let Err(error) = app.emit(SCREENSHOT_TAKEN_EVENT, &shot) {
        log::warn!("failed to broadcast screenshot event: {error}");
    }
    Ok(Some(shot))
}

/// Whole-screen capture of the primary display, enqueued like any other.
pub fn screenshot_flow(app: AppHandle) -> Result<ScreenshotTaken, FlowError> {
    let path = {
        let queues = app.state::<QueueState>();
        let mut queues = queues.lock();
        capture::take_screenshot(&mut queues)?
    };

    let shot = ScreenshotTaken::from_path(&path)?;
    if let Err(error) = app.emit(SCREENSHOT_TAKEN_EVENT, &shot) {
        log::warn!("failed to broadcast screenshot event: {error}");
    }
    Ok(shot)
}

#[tauri::command]
async fn capture_region_screenshot(app: AppHandle) -> Result<Option<ScreenshotTaken>, String> {
    region_capture_flow(app).await.map_err(|e| e.to_string())
}

#[tauri::command]
fn take_screenshot(app: AppHandle) -> Result<ScreenshotTaken, String> {
    screenshot_flow(app).map_err(|e| e.to_string())
}

#[tauri::command]
fn get_screenshot_queue(state: tauri::State<'_, QueueState>, view: Option<View>) -> Vec<String> {
    let queues = state.lock();
    let view = view.unwrap_or_else(|| queues.view());
    queues
        .paths(view)
        .into_iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect()
}

#[tauri::command]
fn delete_screenshot(state: tauri::State<'_, QueueState>, path: String) -> Result<(), String> {
    state
        .lock()
        .delete(std::path::Path::new(&path))
        .map_err(|e| e.to_string())
}

#[tauri::command]
fn clear_queues(state: tauri::State<'_, QueueState>) {
    state.lock().clear_all();
}

#[tauri::command]
fn get_image_preview(path: String) -> Result<String, String> {
    queue::image_preview(std::path::Path::new(&path)).map_err(|e| e.to_string())
}

#[tauri::command]
fn get_view(state: tauri::State<'_, QueueState>) -> View {
    state.lock().view()
}

#[tauri::command]
fn set_view(state: tauri::State<'_, QueueState>, view: View) {
    log::info!("switching view to {view:?}");
    state.lock().set_view(view);
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    env_logger::init();

    tauri::Builder::default()
        .plugin(shortcuts::plugin())
        .manage(SelectionState::default())
        .setup(|app| {
            let queues = QueueManager::from_app_data()?;
            app.manage(QueueState(Mutex::new(queues)));
            shortcuts::register_all(app.handle())?;
            log::info!(
                "ready; {} starts region capture, {} grabs the full screen",
                shortcuts::REGION_SHORTCUT,
                shortcuts::SCREENSHOT_SHORTCUT
            );
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            capture_region_screenshot,
            take_screenshot,
            get_screenshot_queue,
            delete_screenshot,
            clear_queues,
            get_image_preview,
            get_view,
            set_view,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
