//! Bounded screenshot queues with oldest-eviction.
//!
//! Two FIFO queues (one per view), each backed by its own directory and
//! holding at most [`MAX_SCREENSHOTS`] files. Pushing past the bound
//! evicts the oldest entry and deletes its file; a failed deletion is
//! logged and the in-memory queue advances anyway.

use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_SCREENSHOTS: usize = 5;

const PRIMARY_DIR: &str = "screenshots";
const EXTRA_DIR: &str = "extra_screenshots";

/// Which of the two queues new captures land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Primary,
    Extra,
}

/// One bounded FIFO of screenshot files.
pub struct ScreenshotQueue {
    dir: PathBuf,
    entries: VecDeque<PathBuf>,
    capacity: usize,
}

impl ScreenshotQueue {
    pub fn new(dir: PathBuf, capacity: usize) -> io::Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            entries: VecDeque::new(),
            capacity,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.entries.iter().cloned().collect()
    }

    /// Append a path; past capacity, evict and delete the oldest file.
    /// Returns the evicted path, if any. Deletion failure is non-fatal.
    pub fn push(&mut self, path: PathBuf) -> Option<PathBuf> {
        self.entries.push_back(path);
        if self.entries.len() <= self.capacity {
            return None;
        }

        let evicted = self.entries.pop_front();
        if let Some(old) = &evicted {
            if let Err(error) = fs::remove_file(old) {
                log::warn!(
                    "failed to delete evicted screenshot {}: {error}",
                    old.display()
                );
            } else {
                log::debug!("evicted oldest screenshot {}", old.display());
            }
        }
        evicted
    }

    /// Delete a specific file and drop it from the queue. The queue entry
    /// survives if the file could not be deleted.
    pub fn remove(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)?;
        self.entries.retain(|p| p != path);
        Ok(())
    }

    /// Delete every file and empty the queue; failures are logged.
    pub fn clear(&mut self) {
        for path in self.entries.drain(..) {
            if let Err(error) = fs::remove_file(&path) {
                log::warn!("failed to delete screenshot {}: {error}", path.display());
            }
        }
    }
}

/// Owner of both queues plus the active-view switch. Always accessed
/// through the managed mutex in the app state.
pub struct QueueManager {
    view: View,
    primary: ScreenshotQueue,
    extra: ScreenshotQueue,
}

impl QueueManager {
    pub fn new(base_dir: &Path) -> io::Result<Self> {
        Ok(Self {
            view: View::Primary,
            primary: ScreenshotQueue::new(base_dir.join(PRIMARY_DIR), MAX_SCREENSHOTS)?,
            extra: ScreenshotQueue::new(base_dir.join(EXTRA_DIR), MAX_SCREENSHOTS)?,
        })
    }

    /// Queues rooted under the platform data dir.
    pub fn from_app_data() -> io::Result<Self> {
        let base = dirs::data_dir()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no platform data directory"))?
            .join("snip-queue");
        Self::new(&base)
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    fn queue(&self, view: View) -> &ScreenshotQueue {
        match view {
            View::Primary => &self.primary,
            View::Extra => &self.extra,
        }
    }

    fn queue_mut(&mut self, view: View) -> &mut ScreenshotQueue {
        match view {
            View::Primary => &mut self.primary,
            View::Extra => &mut self.extra,
        }
    }

    pub fn active(&self) -> &ScreenshotQueue {
        self.queue(self.view)
    }

    /// Fresh output path in the active queue's directory.
    pub fn next_output_path(&self) -> PathBuf {
        self.active().dir().join(format!("{}.png", Uuid::new_v4()))
    }

    pub fn enqueue(&mut self, path: PathBuf) -> Option<PathBuf> {
        let view = self.view;
        self.queue_mut(view).push(path)
    }

    pub fn paths(&self, view: View) -> Vec<PathBuf> {
        self.queue(view).paths()
    }

    pub fn delete(&mut self, path: &Path) -> io::Result<()> {
        let view = self.view;
        self.queue_mut(view).remove(path)
    }

    pub fn clear_all(&mut self) {
        self.primary.clear();
        self.extra.clear();
    }
}

/// Base64 data URL for a stored screenshot, for inline preview use.
pub fn image_preview(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(bytes)))
}
