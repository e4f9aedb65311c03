//! Change notification for tailed files.
//!
//! Two strategies share the [`NotificationBackend`] capability:
//! - **Native**: OS filesystem events through the `notify` crate.
//! - **Poll**: a fixed timer tick, for producers whose writes the OS does not
//!   report promptly.
//!
//! A backend only says "the file may have changed". Reading is the tailer's job.

mod native;
mod poll;

pub use native::NativeWatcher;
pub use poll::PollWatcher;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Default poll tick.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watcher initialization failed: {0}")]
    Init(String),

    #[error("watch failed for {path}: {message}")]
    Watch { path: String, message: String },

    #[error("notification error: {0}")]
    Notify(#[from] notify::Error),
}

/// What a backend observed.
#[derive(Debug)]
pub enum Signal {
    /// The watched file may have grown or been truncated.
    Changed,
    /// An event other than a write touched the watched file.
    Unexpected(String),
    /// The backend reported an error. Not fatal to the loop.
    Failed(WatchError),
}

#[async_trait]
pub trait NotificationBackend: Send {
    /// Begin observing `path`.
    fn start(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Stop observing `path`.
    fn stop(&mut self, path: &Path) -> Result<(), WatchError>;

    /// Wait for the next signal. `None` once the backend is stopped or closed.
    async fn next_signal(&mut self) -> Option<Signal>;

    /// Whether the tailer should drop its file handle after every read cycle.
    fn reopen_each_cycle(&self) -> bool;

    fn backend_name(&self) -> &'static str;
}

/// Watch mode configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    /// Try native watching, fall back to polling if it cannot initialize.
    #[default]
    Auto,
    Native,
    Poll,
}

impl std::str::FromStr for WatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(WatchMode::Auto),
            "native" => Ok(WatchMode::Native),
            "poll" | "polling" => Ok(WatchMode::Poll),
            _ => Err(format!(
                "Invalid watch mode '{}'. Valid options: auto, native, poll",
                s
            )),
        }
    }
}

/// Build the backend selected by `mode`.
pub fn create_backend(
    mode: WatchMode,
    poll_interval: Duration,
) -> Result<Box<dyn NotificationBackend>, WatchError> {
    match mode {
        WatchMode::Native => Ok(Box::new(NativeWatcher::new()?)),
        WatchMode::Poll => Ok(Box::new(PollWatcher::new(poll_interval))),
        WatchMode::Auto => match NativeWatcher::new() {
            Ok(watcher) => Ok(Box::new(watcher)),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "Native file watching unavailable, falling back to polling"
                );
                Ok(Box::new(PollWatcher::new(poll_interval)))
            }
        },
    }
}
