//! Logs changes in the files directory.
//!
//! The notify callback only forwards events into a channel; a dedicated
//! task consumes them, so the observer never shares state with sessions.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::file_info::FileInfo;
use crate::session::is_partial_upload;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Created(PathBuf),
    Modified(PathBuf),
    Removed(PathBuf),
}

/// Stream of change events for one directory. Dropping it stops the watcher;
/// calling [`ChangeFeed::watch`] again starts a fresh one.
pub struct ChangeFeed {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    pending: VecDeque<ChangeEvent>,
}

impl ChangeFeed {
    pub fn watch(dir: &Path) -> notify::Result<Self> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            if let Err(e) = tx.send(res) {
                debug!("Change feed closed, dropping event: {:?}", e.0);
            }
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            events,
            pending: VecDeque::new(),
        })
    }

    pub async fn next(&mut self) -> Option<ChangeEvent> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(event);
            }
            match self.events.recv().await? {
                Ok(event) => self.pending.extend(convert_event(event)),
                Err(e) => warn!("Watch error: {}", e),
            }
        }
    }
}

/// One change per affected path; access and metadata-only events are dropped.
pub fn convert_event(event: Event) -> Vec<ChangeEvent> {
    let make: fn(PathBuf) -> ChangeEvent = match event.kind {
        EventKind::Create(_) => ChangeEvent::Created,
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => return Vec::new(),
        EventKind::Modify(_) => ChangeEvent::Modified,
        EventKind::Remove(_) => ChangeEvent::Removed,
        _ => return Vec::new(),
    };
    event
        .paths
        .into_iter()
        .filter(|path| !path.file_name().is_some_and(is_partial_upload))
        .map(make)
        .collect()
}

/// Starts the observer task, or logs and returns `None` if watching fails.
pub fn spawn_observer(dir: PathBuf) -> Option<JoinHandle<()>> {
    match ChangeFeed::watch(&dir) {
        Ok(feed) => {
            info!("Watching {:?} for changes", dir);
            Some(tokio::spawn(observe(feed)))
        }
        Err(e) => {
            warn!("Cannot watch {:?}: {}, continuing without it", dir, e);
            None
        }
    }
}

async fn observe(mut feed: ChangeFeed) {
    while let Some(event) = feed.next().await {
        match event {
            ChangeEvent::Created(path) => {
                info!("File created: {:?}", path);
                log_content(&path).await;
            }
            ChangeEvent::Modified(path) => {
                info!("File changed: {:?}", path);
                log_content(&path).await;
            }
            ChangeEvent::Removed(path) => info!("File deleted: {:?}", path),
        }
    }
    debug!("Change feed ended");
}

async fn log_content(path: &Path) {
    if !path.is_file() {
        return;
    }
    match FileInfo::inspect(path).await {
        Ok(info) if info.is_binary => {
            info!("Binary file {:?} ({} bytes), content not shown", info.path, info.len)
        }
        Ok(info) => match tokio::fs::read_to_string(&info.path).await {
            Ok(content) if !content.is_empty() => info!("File content:\n{}", content),
            Ok(_) => {}
            Err(e) => warn!("Error reading file content: {}", e),
        },
        Err(e) => warn!("Error reading file content: {}", e),
    }
}
