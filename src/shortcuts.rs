//! Global keyboard shortcuts, the app's entry points.
//!
//! There is no persistent main window; a hotkey either starts the
//! interactive region selection or grabs the whole screen.

use tauri::{AppHandle, Wry};
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};

pub const REGION_SHORTCUT: &str = "CmdOrCtrl+Shift+S";
pub const SCREENSHOT_SHORTCUT: &str = "CmdOrCtrl+H";

fn matches_accelerator(shortcut: &Shortcut, accelerator: &str) -> bool {
    accelerator
        .parse::<Shortcut>()
        .map(|expected| *shortcut == expected)
        .unwrap_or(false)
}

/// The global-shortcut plugin wired to the capture flows.
pub fn plugin() -> tauri::plugin::TauriPlugin<Wry> {
    tauri_plugin_global_shortcut::Builder::new()
        .with_handler(|app: &AppHandle, shortcut, event| {
            if event.state() != ShortcutState::Pressed {
                return;
            }

            if matches_accelerator(shortcut, REGION_SHORTCUT) {
                log::info!("region capture shortcut pressed");
                let app = app.clone();
                tauri::async_runtime::spawn(async move {
                    match crate::region_capture_flow(app).await {
                        Ok(Some(shot)) => log::info!("region screenshot saved: {}", shot.path),
                        Ok(None) => log::info!("region selection cancelled"),
                        Err(error) => log::error!("region capture failed: {error}"),
                    }
                });
            } else if matches_accelerator(shortcut, SCREENSHOT_SHORTCUT) {
                log::info!("full screenshot shortcut pressed");
                let app = app.clone();
                tauri::async_runtime::spawn(async move {
                    match crate::screenshot_flow(app) {
                        Ok(shot) => log::info!("screenshot saved: {}", shot.path),
                        Err(error) => log::error!("screenshot failed: {error}"),
                    }
                });
            }
        })
        .build()
}

/// Register both shortcuts; called once from setup.
pub fn register_all(app: &AppHandle) -> Result<(), Box<dyn std::error::Error>> {
    app.global_shortcut().register(REGION_SHORTCUT)?;
    app.global_shortcut().register(SCREENSHOT_SHORTCUT)?;
    Ok(())
}
