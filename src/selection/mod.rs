//! Interactive region selection across every connected display.
//!
//! One borderless, transparent, always-on-top webview is created per
//! logical display; each runs the two-click protocol in `overlay/index.html`
//! and reports back through app-wide events, exactly one of which wins.
//! The caller awaits a one-shot future that resolves with the normalized
//! selection, `None` on cancellation, or an error on overlay failure.

mod state;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tauri::{AppHandle, Listener, Manager, WebviewUrl, WebviewWindowBuilder, WindowEvent};
use tokio::sync::oneshot;

use crate::display::{self, LogicalDisplay};

pub use state::{SelectionResult, SelectionTelemetry};
use state::{Phase, Session, SessionOutcome};

const COMPLETE_EVENT: &str = "selection-complete";
const CANCEL_EVENT: &str = "selection-cancel";

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("Selection already in progress")]
    AlreadyActive,

    #[error("Failed to create selection overlay: {0}")]
    Overlay(#[from] tauri::Error),

    #[error("Failed to encode overlay config: {0}")]
    Config(#[from] serde_json::Error),
}

/// Managed Tauri state: the single session slot plus a counter that keeps
/// overlay window labels unique across sessions, so a late `Destroyed`
/// event from a torn-down session can never be attributed to a new one.
#[derive(Default)]
pub struct SelectionState {
    session: Mutex<Option<Session>>,
    sessions_started: AtomicU64,
}

fn lock(state: &Mutex<Option<Session>>) -> MutexGuard<'_, Option<Session>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Per-overlay config injected into the webview before the page loads.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OverlayConfig<'a> {
    display_id: &'a str,
    display_index: usize,
    scale_factor: f64,
    width: f64,
    height: f64,
    bounds_x: f64,
    bounds_y: f64,
}

/// Run one interactive selection session.
///
/// Returns `Ok(None)` when there is nothing to select (no displays) or the
/// user cancelled; errors are reserved for internal failures. Rejects
/// synchronously if a session is already active.
pub async fn start_selection(app: AppHandle) -> Result<Option<SelectionResult>, SelectionError> {
    let displays = display::snapshot(&app)?;
    if displays.is_empty() {
        log::info!("no displays reported; nothing to select");
        return Ok(None);
    }

    let (tx, rx) = oneshot::channel();
    let nonce = {
        let selection = app.state::<SelectionState>();
        let mut guard = lock(&selection.session);
        if guard.is_some() {
            return Err(SelectionError::AlreadyActive);
        }
        *guard = Some(Session::new(displays.clone(), tx));
        selection.sessions_started.fetch_add(1, Ordering::Relaxed) + 1
    };

    log::debug!(
        "selection session {nonce} starting across {} display(s)",
        displays.len()
    );

    let complete_id = app.listen_any(COMPLETE_EVENT, {
        let app = app.clone();
        move |event| on_selection_complete(&app, event)
    });
    let cancel_id = app.listen_any(CANCEL_EVENT, {
        let app = app.clone();
        move |_| on_selection_cancel(&app)
    });
    {
        let selection = app.state::<SelectionState>();
        let mut guard = lock(&selection.session);
        if let Some(session) = guard.as_mut() {
            session.add_listener(complete_id);
            session.add_listener(cancel_id);
        }
    }

    if let Err(error) = create_overlay_windows(&app, &displays, nonce) {
        log::error!("selection overlay creation failed: {error}");
        finish(&app, SessionOutcome::Failed(error));
    }

    match rx.await {
        Ok(SessionOutcome::Completed(result)) => Ok(Some(result)),
        Ok(SessionOutcome::Cancelled) => Ok(None),
        Ok(SessionOutcome::Failed(error)) => Err(error),
        Err(_) => {
            log::warn!("selection session ended without delivering an outcome");
            Ok(None)
        }
    }
}

fn create_overlay_windows(
    app: &AppHandle,
    displays: &[LogicalDisplay],
    nonce: u64,
) -> Result<(), SelectionError> {
    for display in displays {
        let label = format!("selection-{nonce}-{}", display.index);
        let config = OverlayConfig {
            display_id: &display.id,
            display_index: display.index,
            scale_factor: display.scale_factor,
            width: display.bounds.width,
            height: display.bounds.height,
            bounds_x: display.bounds.x,
            bounds_y: display.bounds.y,
        };
        let script = format!(
            "window.__SELECTION_CONFIG__ = {};",
            serde_json::to_string(&config)?
        );

        let window = WebviewWindowBuilder::new(app, &label, WebviewUrl::App("index.html".into()))
            .title("Select region")
            .position(display.bounds.x, display.bounds.y)
            .inner_size(display.bounds.width, display.bounds.height)
            .decorations(false)
            .transparent(true)
            .resizable(false)
            .maximizable(false)
            .minimizable(false)
            .skip_taskbar(true)
            .always_on_top(true)
            .visible_on_all_workspaces(true)
            .content_protected(true)
            .shadow(false)
            .accept_first_mouse(true)
            .focused(true)
            .initialization_script(script.as_str())
            .build()?;

        {
            let selection = app.state::<SelectionState>();
            let mut guard = lock(&selection.session);
            if let Some(session) = guard.as_mut() {
                session.register_overlay(label.clone());
            }
        }

        let handle = app.clone();
        let event_label = label.clone();
        window.on_window_event(move |event| match event {
            WindowEvent::Focused(false) => on_overlay_blur(&handle, &event_label),
            WindowEvent::Destroyed => on_overlay_destroyed(&handle, &event_label),
            _ => {}
        });

        if let Err(error) = window.set_focus() {
            log::warn!("overlay {label} could not take initial focus: {error}");
        }
    }

    Ok(())
}

fn on_selection_complete(app: &AppHandle, event: tauri::Event) {
    let payload: SelectionResult = match serde_json::from_str(event.payload()) {
        Ok(payload) => payload,
        Err(error) => {
            log::warn!("ignoring malformed selection payload: {error}");
            return;
        }
    };

    let result = {
        let selection = app.state::<SelectionState>();
        let guard = lock(&selection.session);
        let Some(session) = guard.as_ref() else { return };
        if !session.is_active() {
            return;
        }
        let display_index = session.resolve_display_index(&payload.display_id, payload.display_index);
        SelectionResult {
            display_index,
            ..payload
        }
    };

    log::debug!(
        "selection completed on display {} ({}) rect {:?}",
        result.display_index,
        result.display_id,
        result.rect
    );
    finish(app, SessionOutcome::Completed(result));
}

fn on_selection_cancel(app: &AppHandle) {
    {
        let selection = app.state::<SelectionState>();
        let guard = lock(&selection.session);
        match guard.as_ref() {
            Some(session) if session.is_active() => {}
            _ => return,
        }
    }
    log::debug!("selection cancelled");
    finish(app, SessionOutcome::Cancelled);
}

/// Overlays must stay focused for the duration of the session so keyboard
/// cancellation keeps working; losing focus never aborts the selection.
fn on_overlay_blur(app: &AppHandle, label: &str) {
    let reclaim = {
        let selection = app.state::<SelectionState>();
        let guard = lock(&selection.session);
        matches!(guard.as_ref(), Some(session) if session.is_active() && session.owns_overlay(label))
    };
    if reclaim {
        if let Some(window) = app.get_webview_window(label) {
            let _ = window.set_focus();
        }
    }
}

/// An overlay closing on its own (compositor kill, user gesture) while the
/// session is still active counts as a cancellation once none remain.
fn on_overlay_destroyed(app: &AppHandle, label: &str) {
    let implicit_cancel = {
        let selection = app.state::<SelectionState>();
        let mut guard = lock(&selection.session);
        let Some(session) = guard.as_mut() else { return };
        if !session.owns_overlay(label) {
            return;
        }
        let remaining = session.overlay_closed(label);
        session.is_active() && remaining == 0
    };
    if implicit_cancel {
        log::debug!("all selection overlays closed; treating as cancellation");
        finish(app, SessionOutcome::Cancelled);
    }
}

/// Single teardown path for every way a session can end. The phase flip
/// and the sender draining happen under the lock; window destruction does
/// not, so `Destroyed` re-entry from the event loop cannot deadlock.
fn finish(app: &AppHandle, outcome: SessionOutcome) {
    let phase = match &outcome {
        SessionOutcome::Cancelled => Phase::Cancelling,
        _ => Phase::Completing,
    };

    let selection = app.state::<SelectionState>();
    let (sender, listeners, labels) = {
        let mut guard = lock(&selection.session);
        let Some(session) = guard.as_mut() else { return };
        if !session.begin_teardown(phase) {
            return;
        }
        (
            session.take_sender(),
            session.take_listeners(),
            session.take_overlay_labels(),
        )
    };

    for id in listeners {
        app.unlisten(id);
    }

    for label in &labels {
        if let Some(window) = app.get_webview_window(label) {
            if let Err(error) = window.hide() {
                log::warn!("failed to hide overlay {label}: {error}");
            }
            if let Err(error) = window.destroy() {
                log::warn!("failed to destroy overlay {label}: {error}");
            }
        }
    }

    {
        let mut guard = lock(&selection.session);
        *guard = None;
    }

    if let Some(sender) = sender {
        if sender.send(outcome).is_err() {
            log::warn!("selection caller went away before the outcome was delivered");
        }
    }
}
