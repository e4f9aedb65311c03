use super::{NotificationBackend, Signal, WatchError};
use async_trait::async_trait;
use notify::event::{Event, EventKind};
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Push backend on OS filesystem notifications.
///
/// Watches the containing directory rather than the file itself, so the
/// watch survives the producer deleting and recreating the file. Events for
/// other entries in the directory are ignored.
pub struct NativeWatcher {
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    file_name: Option<OsString>,
    watched_dir: Option<PathBuf>,
}

impl NativeWatcher {
    pub fn new() -> Result<Self, WatchError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .map_err(|e| WatchError::Init(e.to_string()))?;

        Ok(Self {
            watcher,
            events: rx,
            file_name: None,
            watched_dir: None,
        })
    }

    fn concerns_file(&self, event: &Event) -> bool {
        match &self.file_name {
            Some(name) => event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(name.as_os_str())),
            None => false,
        }
    }
}

fn containing_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Map a filesystem event for the watched file to a signal.
fn classify(kind: &EventKind) -> Option<Signal> {
    match kind {
        EventKind::Modify(_) => Some(Signal::Changed),
        EventKind::Access(_) => None,
        other => Some(Signal::Unexpected(format!("{:?}", other))),
    }
}

#[async_trait]
impl NotificationBackend for NativeWatcher {
    fn start(&mut self, path: &Path) -> Result<(), WatchError> {
        let dir = containing_dir(path);
        self.watcher
            .watch(&dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::Watch {
                path: dir.display().to_string(),
                message: e.to_string(),
            })?;
        self.file_name = path.file_name().map(|n| n.to_os_string());
        self.watched_dir = Some(dir);
        Ok(())
    }

    fn stop(&mut self, _path: &Path) -> Result<(), WatchError> {
        if let Some(dir) = self.watched_dir.take() {
            self.watcher
                .unwatch(&dir)
                .map_err(|e| WatchError::Watch {
                    path: dir.display().to_string(),
                    message: e.to_string(),
                })?;
        }
        self.events.close();
        Ok(())
    }

    async fn next_signal(&mut self) -> Option<Signal> {
        loop {
            match self.events.recv().await? {
                Ok(event) => {
                    if !self.concerns_file(&event) {
                        continue;
                    }
                    if let Some(signal) = classify(&event.kind) {
                        return Some(signal);
                    }
                }
                Err(e) => return Some(Signal::Failed(WatchError::Notify(e))),
            }
        }
    }

    fn reopen_each_cycle(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "native"
    }
}
