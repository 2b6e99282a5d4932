//! Hot reload of the pipeline configuration file.
//!
//! # Responsibilities
//! - Turn file-system events for the config file into reload candidates
//! - Coalesce the burst of events one save produces into a single reload
//! - Hand over only configs that load cleanly and name registered classes
//!
//! # Data Flow
//! ```text
//! notify callback ──() events──▶ reload task (debounce)
//!     → load_config → ComponentFactory::check_classes
//!     → unchanged? skip : send PipelineConfig to the server
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::loader::load_config;
use crate::config::schema::PipelineConfig;
use crate::registry::ComponentFactory;

/// Quiet period after the last file event before the file is re-read.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Watches the configuration file and publishes accepted configurations.
pub struct ConfigWatcher {
    path: PathBuf,
    debounce: Duration,
    checker: ReloadChecker,
    update_tx: mpsc::UnboundedSender<PipelineConfig>,
}

/// Keeps the watcher and its reload task alive. Dropping it stops both.
pub struct WatchHandle {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl ConfigWatcher {
    /// Create a watcher for `path`; `initial` is the configuration already
    /// running, so an event that leaves the file unchanged is ignored.
    pub fn new(
        path: &Path,
        components: ComponentFactory,
        initial: &PipelineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                debounce: DEFAULT_DEBOUNCE,
                checker: ReloadChecker::new(components, initial.clone()),
                update_tx,
            },
            update_rx,
        )
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Start watching. Must be called inside a tokio runtime.
    pub fn run(self) -> Result<WatchHandle, notify::Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<()>();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    // the reload task is gone only during shutdown
                    let _ = event_tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), debounce_ms = self.debounce.as_millis() as u64, "Config watcher started");
        let task = tokio::spawn(self.reload_loop(event_rx));
        Ok(WatchHandle {
            _watcher: watcher,
            task,
        })
    }

    async fn reload_loop(mut self, mut events: mpsc::UnboundedReceiver<()>) {
        while events.recv().await.is_some() {
            let mut coalesced = 1usize;
            while let Ok(Some(())) = tokio::time::timeout(self.debounce, events.recv()).await {
                coalesced += 1;
            }
            tracing::debug!(events = coalesced, "Config file changed");

            let Some(config) = self.checker.accept(&self.path) else {
                continue;
            };
            if self.update_tx.send(config).is_err() {
                tracing::warn!("Config update receiver closed, stopping watcher");
                return;
            }
        }
    }
}

/// Decides whether a re-read configuration file should be applied.
struct ReloadChecker {
    components: ComponentFactory,
    current: PipelineConfig,
}

impl ReloadChecker {
    fn new(components: ComponentFactory, current: PipelineConfig) -> Self {
        Self { components, current }
    }

    /// Load `path`, returning the configuration if it is usable and differs
    /// from the one last accepted.
    fn accept(&mut self, path: &Path) -> Option<PipelineConfig> {
        let config = match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::error!(error = %e, "Rejected config reload, keeping current configuration");
                return None;
            }
        };
        if let Err(e) = self.components.check_classes(&config) {
            tracing::error!(error = %e, "Rejected config reload, keeping current configuration");
            return None;
        }
        if config == self.current {
            tracing::debug!("Config file unchanged, skipping reload");
            return None;
        }

        tracing::info!(
            filters = config.filters.len(),
            servlets = config.servlets.len(),
            "Accepted config reload"
        );
        self.current = config.clone();
        Some(config)
    }
}
