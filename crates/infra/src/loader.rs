//! Asynchronous snapshot loader.
//!
//! Fetches rule data from the directory, builds a [`PolicySnapshot`] and swaps
//! it into the shared [`SnapshotCell`]. Evaluators never wait on this.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use warden_auth::{Authorizer, SnapshotCell};
use warden_core::DomainError;

use crate::assemble::assemble;
use crate::config::{LoaderConfig, MIN_REFRESH_INTERVAL};
use crate::directory::{DirectoryError, DirectorySource};

/// Why one fetch attempt failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttemptError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error("directory returned invalid rule data: {0}")]
    Invalid(#[from] DomainError),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// No snapshot could be fetched and none was loaded before.
    #[error("policy snapshot unavailable after {attempts} attempt(s): {last_error}")]
    SnapshotUnavailable { attempts: u32, last_error: AttemptError },
}

/// What a refresh did to the cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new snapshot was installed.
    Updated { revision: u64 },
    /// Fetching failed; the previously loaded snapshot stays in place.
    ServedStale { revision: u64, error: AttemptError },
}

pub struct SnapshotLoader<S> {
    source: S,
    cell: Arc<SnapshotCell>,
    config: LoaderConfig,
    refresh_lock: Mutex<()>,
}

impl<S> SnapshotLoader<S>
where
    S: DirectorySource + 'static,
{
    pub fn new(source: S, cell: Arc<SnapshotCell>, config: LoaderConfig) -> Self {
        Self {
            source,
            cell,
            config,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Build the cell and an [`Authorizer`] over it from one configuration.
    pub fn with_authorizer(source: S, config: LoaderConfig) -> (Self, Authorizer) {
        let cell = Arc::new(SnapshotCell::new().with_stale_after(config.stale_after));
        let authorizer = Authorizer::new(Arc::clone(&cell))
            .with_primary_role_edit_level(config.primary_role_edit_level);
        (Self::new(source, cell, config), authorizer)
    }

    pub fn cell(&self) -> &Arc<SnapshotCell> {
        &self.cell
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Fetch and install a fresh snapshot.
    ///
    /// Refreshes are serialized. On failure the current snapshot (if any) is
    /// kept and reported as [`RefreshOutcome::ServedStale`].
    pub async fn refresh(&self) -> Result<RefreshOutcome, LoadError> {
        let _guard = self.refresh_lock.lock().await;

        let previous = self.cell.load();
        let revision = previous.as_ref().map(|s| s.revision + 1).unwrap_or(1);
        let max_attempts = self.config.max_attempts.max(1);

        let mut attempt = 0;
        let last_error = loop {
            attempt += 1;
            match self.attempt(revision).await {
                Ok(snapshot) => {
                    info!(
                        revision,
                        roles = snapshot.catalog.len(),
                        permission_rules = snapshot.permissions.len(),
                        field_rules = snapshot.field_security.len(),
                        visibility_modules = snapshot.visibility.len(),
                        "policy snapshot loaded"
                    );
                    self.cell.replace(snapshot);
                    return Ok(RefreshOutcome::Updated { revision });
                }
                Err(err @ AttemptError::Invalid(_)) => {
                    // Same data on retry; no point asking again.
                    warn!(attempt, error = %err, "rejected directory data");
                    break err;
                }
                Err(err) => {
                    warn!(attempt, max_attempts, error = %err, "snapshot fetch failed");
                    if attempt >= max_attempts {
                        break err;
                    }
                    let backoff = self.backoff(attempt);
                    debug!(?backoff, "retrying snapshot fetch");
                    tokio::time::sleep(backoff).await;
                }
            }
        };

        match previous {
            Some(current) => {
                warn!(
                    revision = current.revision,
                    loaded_at = %current.loaded_at,
                    error = %last_error,
                    "keeping previous policy snapshot"
                );
                Ok(RefreshOutcome::ServedStale {
                    revision: current.revision,
                    error: last_error,
                })
            }
            None => {
                error!(attempts = attempt, error = %last_error, "no policy snapshot available");
                Err(LoadError::SnapshotUnavailable {
                    attempts: attempt,
                    last_error,
                })
            }
        }
    }

    async fn attempt(&self, revision: u64) -> Result<warden_auth::PolicySnapshot, AttemptError> {
        let bundle = tokio::time::timeout(self.config.fetch_timeout, self.source.fetch_bundle())
            .await
            .map_err(|_| DirectoryError::Timeout)??;
        Ok(assemble(bundle, revision, Utc::now(), &self.config.level_overrides)?)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << (attempt - 1).min(16);
        self.config.retry_backoff.saturating_mul(factor)
    }

    /// Refresh on `config.refresh_interval` until the handle is shut down.
    ///
    /// The first tick fires immediately. Dropping the handle also stops the loop.
    pub fn spawn_periodic(self: Arc<Self>) -> RefreshHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        // Fields are public; the floor is enforced here as well.
        let interval = self.config.refresh_interval.max(MIN_REFRESH_INTERVAL);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        info!("policy refresh loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        // Outcomes are already logged inside refresh().
                        let _ = self.refresh().await;
                    }
                }
            }
        });

        RefreshHandle {
            shutdown: Some(shutdown_tx),
            join,
        }
    }
}

/// Handle to the background refresh task.
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown: Option<oneshot::Sender<()>>,
    join: JoinHandle<()>,
}

impl RefreshHandle {
    /// Stop refreshing and wait for an in-flight refresh to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(err) = (&mut self.join).await {
            error!(error = %err, "policy refresh task failed");
        }
    }
}
