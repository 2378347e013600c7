//! Configuration file watcher for host set reloads.
//!
//! The parent directory is watched rather than the file itself, so editors
//! that save by writing a temp file and renaming it over the original are
//! still observed.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use crate::config::loader::load_config;
use crate::config::schema::HealthConfigFile;

/// Reloads the configuration file whenever it changes on disk.
pub struct ConfigWatcher {
    path: PathBuf,
    updates: mpsc::UnboundedSender<HealthConfigFile>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver of validated configurations.
    /// Files that fail to load are logged and never sent.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<HealthConfigFile>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (Self { path: path.to_path_buf(), updates }, rx)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = self.path.file_name().map(|name| name.to_os_string());
        let path = self.path;
        let updates = self.updates;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = ?e, "Config watch error");
                        return;
                    }
                };
                if !(event.kind.is_modify() || event.kind.is_create()) {
                    return;
                }
                let touches_config = event
                    .paths
                    .iter()
                    .any(|changed| changed.file_name().map(|n| n.to_os_string()) == file_name);
                if !touches_config {
                    return;
                }

                match load_config(&path) {
                    Ok(config) => {
                        tracing::info!(path = ?path, clusters = config.clusters.len(), "Config reloaded");
                        let _ = updates.send(config);
                    }
                    Err(e) => {
                        tracing::error!(path = ?path, error = %e, "Invalid config on reload, keeping current one");
                    }
                }
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = ?dir, "Config watcher started");
        Ok(watcher)
    }
}
