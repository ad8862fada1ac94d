//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::WebConfig;

/// Watches one configuration file and publishes every valid, changed
/// version of it.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<WebConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end of its updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<WebConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching on notify's background thread.
    ///
    /// Updates stop when the returned handle is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let mut reloader = Reloader {
            last: load_config(&self.path).ok(),
            path: self.path.clone(),
            update_tx: self.update_tx,
        };

        let mut watcher = RecommendedWatcher::new(
            move |event: notify::Result<Event>| reloader.handle(event),
            Config::default(),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

struct Reloader {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<WebConfig>,
    last: Option<WebConfig>,
}

impl Reloader {
    fn handle(&mut self, event: notify::Result<Event>) {
        match event {
            Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                self.reload();
            }
            Ok(_) => {}
            Err(err) => tracing::error!(error = %err, "Config watch error"),
        }
    }

    /// Publish the file if it parses, validates and differs from the last
    /// published version. Editors often emit several events per save.
    fn reload(&mut self) -> bool {
        let config = match load_config(&self.path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Config reload failed, keeping current configuration"
                );
                return false;
            }
        };
        if self.last.as_ref() == Some(&config) {
            tracing::debug!("Config file unchanged");
            return false;
        }

        tracing::info!(path = %self.path.display(), "Config file changed, reloading");
        self.last = Some(config.clone());
        self.update_tx.send(config).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publishes_only_valid_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weblane.toml");
        std::fs::write(&path, "[server]\nenabled_gzip = false\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut reloader = Reloader {
            last: load_config(&path).ok(),
            path: path.clone(),
            update_tx: tx,
        };

        assert!(!reloader.reload(), "unchanged file");

        std::fs::write(&path, "[server]\nenabled_gzip = true\n").unwrap();
        assert!(reloader.reload());
        assert!(rx.try_recv().unwrap().server.enabled_gzip);

        std::fs::write(&path, "[server]\ngzip_level = 42\n").unwrap();
        assert!(!reloader.reload(), "invalid level is rejected");
        assert!(rx.try_recv().is_err());
    }
}
