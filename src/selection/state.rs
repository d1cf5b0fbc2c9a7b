//! Session state for the selection overlay controller.
//!
//! `Idle` is represented by an empty session slot; a populated [`Session`]
//! is either `Active` or tearing down. The one-shot sender doubles as the
//! resolution ledger: whoever takes it delivers the outcome, and a second
//! completion signal finds the slot already drained and does nothing.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::display::{LogicalDisplay, Point, Rect, Size};

use super::SelectionError;

/// Lifecycle of one selection session. `Idle` has no `Session` at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Active,
    Completing,
    Cancelling,
}

/// Paired client/screen coordinates recorded at each click, plus the
/// webview's device pixel ratio. Feeds the overlay-offset calibration in
/// the geometry engine; absence simply disables that correction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionTelemetry {
    pub device_pixel_ratio: f64,
    pub first_point_client: Point,
    pub second_point_client: Option<Point>,
    pub first_point_screen: Point,
    pub second_point_screen: Option<Point>,
    #[serde(default)]
    pub selection_box_client_rect: Option<Rect>,
}

/// The normalized outcome of a completed selection.
///
/// Produced exactly once per session by the overlay that received the
/// second click; consumed exactly once by the capture pipeline. The rect
/// is already min/max-normalized (origin = min corner, non-negative size)
/// in the logical pixel space of the overlay's own display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    pub display_id: String,
    pub display_index: usize,
    pub scale_factor: f64,
    pub rect: Rect,
    pub display_size: Size,
    pub display_bounds: Rect,
    #[serde(default, rename = "debug")]
    pub telemetry: Option<SelectionTelemetry>,
}

/// Terminal result delivered through the session's one-shot channel.
#[derive(Debug)]
pub enum SessionOutcome {
    Completed(SelectionResult),
    Cancelled,
    Failed(SelectionError),
}

/// Mutable state of the in-flight session. All access goes through the
/// controller's mutex; nothing here touches Tauri.
pub struct Session {
    phase: Phase,
    displays: Vec<LogicalDisplay>,
    overlay_labels: Vec<String>,
    listeners: Vec<tauri::EventId>,
    sender: Option<oneshot::Sender<SessionOutcome>>,
}

impl Session {
    pub fn new(displays: Vec<LogicalDisplay>, sender: oneshot::Sender<SessionOutcome>) -> Self {
        Self {
            phase: Phase::Active,
            displays,
            overlay_labels: Vec::new(),
            listeners: Vec::new(),
            sender: Some(sender),
        }
    }

    /// Events are only honored while the session is still active; anything
    /// arriving after teardown began is a duplicate or a late echo.
    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Flip into a teardown phase. Returns `false` if teardown had already
    /// begun; the caller must then back off instead of double-resolving.
    pub fn begin_teardown(&mut self, phase: Phase) -> bool {
        if self.phase != Phase::Active {
            return false;
        }
        debug_assert!(phase != Phase::Active);
        self.phase = phase;
        true
    }

    /// Take the one-shot sender; `None` means the outcome was already
    /// claimed by an earlier signal.
    pub fn take_sender(&mut self) -> Option<oneshot::Sender<SessionOutcome>> {
        self.sender.take()
    }

    pub fn add_listener(&mut self, id: tauri::EventId) {
        self.listeners.push(id);
    }

    pub fn take_listeners(&mut self) -> Vec<tauri::EventId> {
        std::mem::take(&mut self.listeners)
    }

    pub fn register_overlay(&mut self, label: String) {
        self.overlay_labels.push(label);
    }

    pub fn owns_overlay(&self, label: &str) -> bool {
        self.overlay_labels.iter().any(|l| l == label)
    }

    /// Drop a closed overlay from the session; returns how many remain.
    pub fn overlay_closed(&mut self, label: &str) -> usize {
        self.overlay_labels.retain(|l| l != label);
        self.overlay_labels.len()
    }

    pub fn take_overlay_labels(&mut self) -> Vec<String> {
        std::mem::take(&mut self.overlay_labels)
    }

    /// Pick the registry index for a result, trusting the payload index
    /// only when it is in range and falling back to an id lookup.
    pub fn resolve_display_index(&self, display_id: &str, payload_index: usize) -> usize {
        if payload_index < self.displays.len() {
            return payload_index;
        }
        self.displays
            .iter()
            .position(|d| d.id == display_id)
            .unwrap_or(0)
    }
}
