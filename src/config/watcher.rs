//! Configuration file watcher for hot reload.
//!
//! # Data Flow
//! ```text
//! notify event on the parent directory
//!     → filtered to the config file name
//!     → debounce (editors write in bursts)
//!     → load_config (parse + validate)
//!     → valid: sent on the update channel
//!     → invalid: logged, current configuration kept
//! ```
//!
//! The parent directory is watched rather than the file itself so that
//! editors which replace the file by rename are still picked up.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::OrchestratorConfig;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Running watcher. Dropping it stops both the notify backend and the
/// reload task.
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    reload: JoinHandle<()>,
}

impl ConfigWatcher {
    /// Start watching `path`. Must be called inside a tokio runtime.
    ///
    /// Returns the watcher and a receiver for validated configurations.
    pub fn start(path: &Path) -> Result<(Self, mpsc::UnboundedReceiver<OrchestratorConfig>), notify::Error> {
        Self::start_with_debounce(path, DEFAULT_DEBOUNCE)
    }

    pub fn start_with_debounce(
        path: &Path,
        debounce: Duration,
    ) -> Result<(Self, mpsc::UnboundedReceiver<OrchestratorConfig>), notify::Error> {
        let path = path.to_path_buf();
        let file_name = path
            .file_name()
            .map(OsString::from)
            .ok_or_else(|| notify::Error::generic("config path has no file name"))?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if touches(&event, &file_name) => {
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&directory, RecursiveMode::NonRecursive)?;

        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let reload = tokio::spawn(reload_loop(path.clone(), debounce, event_rx, update_tx));

        tracing::info!(path = ?path, debounce_ms = debounce.as_millis() as u64, "Config watcher started");
        Ok((
            Self {
                path,
                _watcher: watcher,
                reload,
            },
            update_rx,
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.reload.abort();
    }
}

fn touches(event: &Event, file_name: &OsString) -> bool {
    let relevant = event.kind.is_modify() || event.kind.is_create();
    relevant
        && event
            .paths
            .iter()
            .any(|changed| changed.file_name() == Some(file_name.as_os_str()))
}

async fn reload_loop(
    path: PathBuf,
    debounce: Duration,
    mut events: mpsc::UnboundedReceiver<()>,
    updates: mpsc::UnboundedSender<OrchestratorConfig>,
) {
    while events.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while events.try_recv().is_ok() {}

        match load_config(&path) {
            Ok(config) => {
                tracing::info!(path = ?path, chain = ?config.fallback.chain, "Config reloaded");
                if updates.send(config).is_err() {
                    break;
                }
            }
            Err(e) => {
                tracing::error!(path = ?path, error = %e, "Config reload rejected, keeping current configuration");
            }
        }
    }
}
