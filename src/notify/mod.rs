//! Notification Bridge
//!
//! Delivers a [`ChangeNotification`] to the build coordinator and blocks until the
//! coordinator accepts or rejects it. Each submission runs on its own worker thread
//! with a private single-threaded runtime, so no session or event loop is ever shared
//! between submissions or with the caller. The worker reports through a one-slot
//! channel and the caller reads exactly one value from it.

pub mod wire;

use crate::config::CoordinatorConfig;
use crate::error::HookError;
use crate::types::ChangeNotification;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

pub use wire::{Credentials, SessionError};

/// Extra time the caller waits beyond the worker's own deadline.
const HANDOFF_GRACE: Duration = Duration::from_secs(5);

/// Anything that can ask the coordinator to build a change
pub trait ChangeNotifier: Send + Sync {
    /// Submit a change; `true` only if the coordinator accepted it.
    fn submit(&self, change: &ChangeNotification) -> bool;
}

/// Coordinator client with one isolated session per submission
#[derive(Debug, Clone)]
pub struct NotificationBridge {
    host: String,
    port: u16,
    credentials: Credentials,
    deadline: Duration,
}

impl NotificationBridge {
    /// Build a bridge from configuration. A missing host is fatal.
    pub fn new(config: &CoordinatorConfig) -> Result<Self, HookError> {
        config.validate().map_err(HookError::ConfigError)?;
        let (host, port) = config.endpoint().map_err(HookError::ConfigError)?;
        Ok(Self {
            host,
            port,
            credentials: Credentials {
                username: config.username.clone(),
                password: config.password.clone(),
            },
            deadline: Duration::from_secs(config.timeout_secs),
        })
    }

    /// Override the session deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn endpoint(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }
}

impl ChangeNotifier for NotificationBridge {
    fn submit(&self, change: &ChangeNotification) -> bool {
        let (tx, rx) = mpsc::sync_channel::<bool>(1);
        let job = SubmitJob {
            host: self.host.clone(),
            port: self.port,
            credentials: self.credentials.clone(),
            deadline: self.deadline,
            change: change.clone(),
        };

        let spawned = thread::Builder::new()
            .name("buildhook-notify".to_string())
            .spawn(move || {
                let accepted = job.run();
                // The caller may have given up already; nothing to do then.
                let _ = tx.send(accepted);
            });
        if let Err(e) = spawned {
            error!(error = %e, "Failed to spawn notification worker");
            return false;
        }

        match rx.recv_timeout(self.deadline.saturating_add(HANDOFF_GRACE)) {
            Ok(accepted) => accepted,
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    coordinator = %self.host,
                    revision = %change.target_revision,
                    "Notification worker did not report in time"
                );
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                error!(
                    coordinator = %self.host,
                    revision = %change.target_revision,
                    "Notification worker exited without a result"
                );
                false
            }
        }
    }
}

/// Everything one worker needs, owned so the worker shares nothing with the caller.
struct SubmitJob {
    host: String,
    port: u16,
    credentials: Credentials,
    deadline: Duration,
    change: ChangeNotification,
}

impl SubmitJob {
    /// Run one session on a private runtime. The runtime is gone by the time this returns.
    fn run(self) -> bool {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                error!(error = %e, "Failed to create notification runtime");
                return false;
            }
        };

        let outcome = runtime.block_on(async {
            tokio::time::timeout(
                self.deadline,
                wire::deliver(&self.host, self.port, &self.credentials, &self.change),
            )
            .await
        });
        drop(runtime);

        match outcome {
            Ok(Ok(())) => {
                info!(
                    coordinator = %self.host,
                    revision = %self.change.target_revision,
                    branch = %self.change.branch_name,
                    "Coordinator accepted change"
                );
                true
            }
            Ok(Err(e @ SessionError::Connect { .. })) => {
                error!(coordinator = %self.host, error = %e, "Connecting to coordinator failed");
                false
            }
            Ok(Err(e)) => {
                warn!(
                    coordinator = %self.host,
                    revision = %self.change.target_revision,
                    error = %e,
                    "Coordinator did not accept change"
                );
                false
            }
            Err(_) => {
                warn!(
                    coordinator = %self.host,
                    deadline_secs = self.deadline.as_secs_f64(),
                    "Coordinator session timed out"
                );
                false
            }
        }
    }
}
