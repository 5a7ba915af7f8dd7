//! Recursive file watcher.
//!
//! Every directory under the served root is registered individually with
//! the OS watch primitive. Directories that appear later (created or moved
//! in) are registered from the event loop, so the watched tree grows with
//! the served tree. Events are not debounced: each qualifying event
//! triggers one broadcast.

use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use super::hub::NotificationHub;

/// Extensions whose changes trigger a reload (compared case-insensitively).
const WATCHED_EXTENSIONS: [&str; 5] = ["php", "html", "htm", "css", "js"];

/// Handle to the running watcher task.
///
/// Dropping the handle stops the task; [`TreeWatcher::shutdown`] also waits
/// for it to finish.
pub(crate) struct TreeWatcher {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl TreeWatcher {
    /// Register the tree rooted at `root` and start the event loop.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be created or `root` itself
    /// cannot be watched. Failures on subdirectories are logged and skipped.
    pub(crate) fn start(root: &Path, hub: NotificationHub) -> Result<Self, notify::Error> {
        // Unbounded: the loop calls back into the watcher to register new
        // directories, so the watcher thread must never block on this channel.
        let (tx, rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.send(res);
        })?;

        let directories = register_tree(&mut watcher, root)?;
        tracing::info!(root = %root.display(), directories, "Watching for changes");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(watcher, rx, shutdown_rx, hub));

        Ok(Self {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Stop the event loop and wait for it to exit.
    pub(crate) async fn shutdown(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "File watcher task failed");
        }
    }
}

impl Drop for TreeWatcher {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

/// Event loop. Owns the watcher so registrations happen on one task only.
async fn run(
    mut watcher: RecommendedWatcher,
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
    mut shutdown: oneshot::Receiver<()>,
    hub: NotificationHub,
) {
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            event = rx.recv() => match event {
                Some(Ok(event)) => handle_event(&mut watcher, &event, &hub),
                Some(Err(e)) => tracing::warn!(error = %e, "File watcher error"),
                None => break,
            },
        }
    }
    tracing::debug!("File watcher stopped");
}

fn handle_event<W: Watcher>(watcher: &mut W, event: &Event, hub: &NotificationHub) {
    if is_creation(&event.kind) {
        for path in &event.paths {
            if !is_real_dir(path) {
                continue;
            }
            match register_tree(watcher, path) {
                Ok(directories) => {
                    tracing::debug!(path = %path.display(), directories, "Registered new directory");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to watch new directory");
                }
            }
        }
    }

    if !is_relevant(&event.kind) {
        return;
    }

    if let Some(path) = event.paths.iter().find(|p| has_watched_extension(p)) {
        tracing::info!(path = %path.display(), kind = ?event.kind, "Change detected");
        hub.broadcast();
    }
}

/// Watch `root` and every directory below it.
///
/// Returns the number of directories registered. Only a failure on `root`
/// itself is an error.
fn register_tree<W: Watcher>(watcher: &mut W, root: &Path) -> Result<usize, notify::Error> {
    watcher.watch(root, RecursiveMode::NonRecursive)?;
    tracing::debug!(path = %root.display(), "Watching directory");

    let mut registered = 1;
    let mut pending = subdirectories(root);

    while let Some(dir) = pending.pop() {
        if let Err(e) = watcher.watch(&dir, RecursiveMode::NonRecursive) {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to watch directory");
            continue;
        }
        tracing::debug!(path = %dir.display(), "Watching directory");
        registered += 1;
        pending.extend(subdirectories(&dir));
    }

    Ok(registered)
}

/// Immediate child directories, not following symlinks.
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to read directory");
            return Vec::new();
        }
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "Failed to read directory entry");
                continue;
            }
        };
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => dirs.push(entry.path()),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to stat entry");
            }
        }
    }
    dirs
}

fn is_real_dir(path: &Path) -> bool {
    std::fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
}

/// Events that can bring a new directory into the tree.
fn is_creation(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Name(RenameMode::To | RenameMode::Both))
    )
}

/// Writes, creations, removals and renames. Metadata-only changes and
/// accesses are ignored.
fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_)
            | EventKind::Remove(_)
            | EventKind::Modify(
                ModifyKind::Any | ModifyKind::Data(_) | ModifyKind::Name(_) | ModifyKind::Other
            )
    )
}

fn has_watched_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            WATCHED_EXTENSIONS
                .iter()
                .any(|watched| ext.eq_ignore_ascii_case(watched))
        })
}
