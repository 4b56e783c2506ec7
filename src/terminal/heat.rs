//! Hot/Cool Tracking
//!
//! A command is "hot" while its output is still changing. Every chunk
//! restarts a timer whose length depends on whether the chunk looks like a
//! build in progress; the command cools down when the timer runs out.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::config::ExecutionConfig;

/// Whether `text` looks like a build that is still running
///
/// True when the text contains a compiling marker and none of the
/// nullifiers. Matching ignores case on both sides.
pub fn is_compiling<S: AsRef<str>>(text: &str, markers: &[S], nullifiers: &[S]) -> bool {
    let lower = text.to_lowercase();
    let contains = |needle: &S| {
        let needle = needle.as_ref();
        !needle.is_empty() && lower.contains(&needle.to_lowercase())
    };
    markers.iter().any(contains) && !nullifiers.iter().any(contains)
}

/// Hot period to use after a chunk containing `text`
pub fn hot_period(text: &str, config: &ExecutionConfig) -> Duration {
    if is_compiling(text, &config.compiling_markers, &config.marker_nullifiers) {
        config.hot_timeout_compiling()
    } else {
        config.hot_timeout_normal()
    }
}

/// Resettable hot timer
///
/// Must be reset from inside a tokio runtime. The pending timer task is
/// aborted on reset, cancel and drop.
#[derive(Debug, Default)]
pub struct HotTimer {
    hot: Arc<AtomicBool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl HotTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the timer is pending
    pub fn is_hot(&self) -> bool {
        self.hot.load(Ordering::SeqCst)
    }

    /// Mark hot and cool down after `period` unless reset again
    pub fn reset(&self, period: Duration) {
        let mut task = self.lock_task();
        if let Some(previous) = task.take() {
            previous.abort();
        }

        self.hot.store(true, Ordering::SeqCst);
        let hot = Arc::clone(&self.hot);
        *task = Some(tokio::spawn(async move {
            tokio::time::sleep(period).await;
            hot.store(false, Ordering::SeqCst);
            trace!("Hot timer expired after {:?}", period);
        }));
    }

    /// Stop the timer and force cool
    pub fn cancel(&self) {
        if let Some(previous) = self.lock_task().take() {
            previous.abort();
        }
        self.hot.store(false, Ordering::SeqCst);
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        // A poisoned lock only means a panic elsewhere; the handle is still usable
        self.task.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for HotTimer {
    fn drop(&mut self) {
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }
}
