//! Lifecycle state machine for the notification service
//!
//! One `LifecycleManager` exists per service instance. It owns the service
//! configuration and the embedded/external decision, and serializes every
//! state transition behind a single mutex so concurrent start/stop requests
//! always observe a consistent state. Valid edges:
//!
//! ```text
//! UNINITIALIZED -> STOPPED -> STARTING -> RUNNING -> STOPPING -> STOPPED
//!                              |            |
//!                              +-> FAILED <-+        (no edge out of FAILED)
//! ```
//!
//! Holding the internal guard across a backend call would invite deadlock, so
//! transitions are two-phase: `begin_*` claims the transition under the lock,
//! the backend call runs unlocked, and `complete_*`/`mark_failed` records the
//! outcome.

use crate::core::sync::lock_or;
use crate::notify::config::ServiceConfig;
use crate::notify::error::{NotifyError, NotifyResult};
use std::sync::Mutex;
use strum_macros::Display;

/// Observable state of the notification service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LifecycleState {
    Uninitialized,
    Stopped,
    Starting,
    Running,
    Stopping,
    Failed,
}

/// Outcome of claiming a start transition.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StartDisposition {
    /// The caller owns the STOPPED -> STARTING transition
    Start,
    /// Service already RUNNING; the call is a no-op
    AlreadyRunning,
}

/// Outcome of claiming a stop transition.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StopDisposition {
    /// The caller owns the transition to STOPPING
    Stop,
    /// Already stopped (or never started); the call is a no-op
    AlreadyStopped,
    /// Startup failed earlier; release resources but remain FAILED
    ReleaseOnly,
}

pub struct LifecycleManager {
    state: Mutex<LifecycleState>,
    config: ServiceConfig,
}

impl LifecycleManager {
    pub(crate) fn new(config: ServiceConfig) -> Self {
        Self {
            state: Mutex::new(LifecycleState::Uninitialized),
            config,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(LifecycleState::Failed)
    }

    /// Whether this process starts/stops the backend itself. Internal gate
    /// only; producers and consumers never need to consult it.
    pub(crate) fn is_embedded(&self) -> bool {
        self.config.embedded
    }

    pub(crate) fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// UNINITIALIZED -> STOPPED, once configuration has been validated.
    pub(crate) fn mark_initialized(&self) -> NotifyResult<()> {
        let mut state = self.guard()?;
        match *state {
            LifecycleState::Uninitialized => {
                *state = LifecycleState::Stopped;
                Ok(())
            }
            current => Err(NotifyError::IllegalState {
                message: format!("service already initialized (state {})", current),
            }),
        }
    }

    /// Claim the start transition. Only one caller may ever hold `Start`;
    /// a concurrent caller observing STARTING fails fast rather than risking
    /// a double-start of the backend.
    pub(crate) fn begin_start(&self) -> NotifyResult<StartDisposition> {
        let mut state = self.guard()?;
        match *state {
            LifecycleState::Stopped => {
                *state = LifecycleState::Starting;
                log::debug!("lifecycle: STOPPED -> STARTING");
                Ok(StartDisposition::Start)
            }
            LifecycleState::Running => Ok(StartDisposition::AlreadyRunning),
            LifecycleState::Starting => Err(NotifyError::IllegalState {
                message: "service start already in progress".to_string(),
            }),
            LifecycleState::Failed => Err(NotifyError::IllegalState {
                message: "service failed to start and cannot be restarted in this process"
                    .to_string(),
            }),
            current => Err(NotifyError::IllegalState {
                message: format!("cannot start service from state {}", current),
            }),
        }
    }

    /// STARTING -> RUNNING.
    pub(crate) fn complete_start(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = LifecycleState::Running;
            log::info!("lifecycle: STARTING -> RUNNING");
        }
    }

    /// STARTING or RUNNING -> FAILED. Permanent for this process instance.
    pub(crate) fn mark_failed(&self) {
        if let Ok(mut state) = self.state.lock() {
            log::error!("lifecycle: {} -> FAILED", *state);
            *state = LifecycleState::Failed;
        }
    }

    /// Claim the stop transition. Idempotent: a second shutdown observes
    /// `AlreadyStopped` and succeeds without touching the backend again.
    pub(crate) fn begin_stop(&self) -> NotifyResult<StopDisposition> {
        let mut state = self.guard()?;
        match *state {
            LifecycleState::Running | LifecycleState::Starting => {
                *state = LifecycleState::Stopping;
                log::debug!("lifecycle: -> STOPPING");
                Ok(StopDisposition::Stop)
            }
            LifecycleState::Failed => Ok(StopDisposition::ReleaseOnly),
            LifecycleState::Uninitialized
            | LifecycleState::Stopped
            | LifecycleState::Stopping => Ok(StopDisposition::AlreadyStopped),
        }
    }

    /// STOPPING -> STOPPED.
    pub(crate) fn complete_stop(&self) {
        if let Ok(mut state) = self.state.lock() {
            *state = LifecycleState::Stopped;
            log::info!("lifecycle: STOPPING -> STOPPED");
        }
    }

    /// Gate for obtaining producers and consumer groups: the service must be
    /// initialized and not failed, stopping, or mid-start.
    pub(crate) fn ensure_usable(&self) -> NotifyResult<()> {
        let state = self.guard()?;
        match *state {
            LifecycleState::Stopped | LifecycleState::Running => Ok(()),
            current => Err(NotifyError::IllegalState {
                message: format!("notification service is not usable in state {}", current),
            }),
        }
    }

    fn guard(&self) -> NotifyResult<std::sync::MutexGuard<'_, LifecycleState>> {
        lock_or(self.state.lock(), |message| NotifyError::IllegalState {
            message,
        })
    }
}
