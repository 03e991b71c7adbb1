//! Hot reload of rate limit settings from the configuration file.
//!
//! Only the rate limit policy is applied while running, so a file change is
//! forwarded only when the policy it yields differs from the last one sent.
//! Once the receiving side is gone the watcher stops forwarding.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GateConfig;
use crate::security::RateLimitPolicy;

/// Outcome of handling one file change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new policy was sent to the server.
    Forwarded,
    /// The file changed but the rate limit policy did not.
    Unchanged,
    /// The file failed to load or validate; the running policy stays.
    Rejected,
    /// The server stopped listening for updates.
    Closed,
}

/// Tracks the last forwarded policy and sends only real changes.
#[derive(Debug)]
struct Reloader {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<GateConfig>,
    current: RateLimitPolicy,
    closed: bool,
}

impl Reloader {
    fn reload(&mut self) -> ReloadOutcome {
        match load_config(&self.path) {
            Ok(config) => self.offer(config),
            Err(e) => {
                tracing::error!(path = ?self.path, error = %e, "Config reload rejected, keeping current rate limits");
                ReloadOutcome::Rejected
            }
        }
    }

    fn offer(&mut self, config: GateConfig) -> ReloadOutcome {
        if self.closed {
            return ReloadOutcome::Closed;
        }

        let policy = RateLimitPolicy::from_config(&config.rate_limit);
        if policy == self.current {
            tracing::debug!(path = ?self.path, "Config changed without rate limit changes");
            return ReloadOutcome::Unchanged;
        }

        if self.update_tx.send(config).is_err() {
            tracing::warn!(path = ?self.path, "Config update receiver dropped, stopping reloads");
            self.closed = true;
            return ReloadOutcome::Closed;
        }

        tracing::info!(
            calls = policy.calls,
            period_secs = policy.period_secs,
            auth_calls = policy.auth_calls,
            auth_period_secs = policy.auth_period_secs,
            "Forwarded new rate limit policy"
        );
        self.current = policy;
        ReloadOutcome::Forwarded
    }
}

/// Watches the configuration file and forwards rate limit changes.
pub struct ConfigWatcher {
    reloader: Reloader,
}

impl ConfigWatcher {
    /// `current` is the configuration the server starts with.
    ///
    /// Returns the watcher and a receiver for validated updates.
    pub fn new(path: &Path, current: &GateConfig) -> (Self, mpsc::UnboundedReceiver<GateConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                reloader: Reloader {
                    path: path.to_path_buf(),
                    update_tx,
                    current: RateLimitPolicy::from_config(&current.rate_limit),
                    closed: false,
                },
            },
            update_rx,
        )
    }

    /// Start watching the file in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.reloader.path.clone();
        let mut reloader = self.reloader;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    if !reloader.closed {
                        reloader.reload();
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}
