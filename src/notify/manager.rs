//! NotificationManager - central coordination for the notification bus
//!
//! One manager exists per service instance. It owns the lifecycle state
//! machine, the resolved backend driver, and acts as the factory for
//! producers and consumer groups. It deliberately does no worker scheduling:
//! `create_consumers` sizes parallelism, and the host application runs each
//! handle on a worker of its own choosing.

use crate::notify::backend::{self, NotificationBackend};
use crate::notify::channel::ChannelKind;
use crate::notify::config::ServiceConfig;
use crate::notify::consumer::ConsumerHandle;
use crate::notify::error::{NotifyError, NotifyResult};
use crate::notify::lifecycle::{
    LifecycleManager, LifecycleState, StartDisposition, StopDisposition,
};
use crate::notify::producer::NotificationProducer;
use std::sync::Arc;

pub struct NotificationManager {
    lifecycle: LifecycleManager,
    backend: Arc<dyn NotificationBackend>,
}

impl NotificationManager {
    /// Validate `config`, resolve its backend driver from the registry, and
    /// construct a service instance in the STOPPED state.
    pub fn initialize(config: ServiceConfig) -> NotifyResult<Arc<Self>> {
        config.validate()?;
        let backend = backend::create_backend(&config)?;
        log::info!(
            "notification service initialized: backend '{}', {} mode, group '{}'",
            backend.name(),
            if config.embedded { "embedded" } else { "external" },
            config.consumer_group(),
        );

        let lifecycle = LifecycleManager::new(config);
        lifecycle.mark_initialized()?;
        Ok(Arc::new(Self { lifecycle, backend }))
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub(crate) fn lifecycle(&self) -> &LifecycleManager {
        &self.lifecycle
    }

    pub(crate) fn backend(&self) -> &Arc<dyn NotificationBackend> {
        &self.backend
    }

    pub(crate) fn config(&self) -> &ServiceConfig {
        self.lifecycle.config()
    }

    /// Start the embedded backend service.
    ///
    /// A no-op success when the backend is externally managed (the state
    /// still advances to RUNNING, without any backend call). While RUNNING a
    /// second call is a no-op; a concurrent call during STARTING fails fast
    /// with `IllegalState`. A failed start leaves the service FAILED for the
    /// remainder of the process.
    pub async fn start_service(&self) -> NotifyResult<()> {
        match self.lifecycle.begin_start()? {
            StartDisposition::AlreadyRunning => {
                log::trace!("start_service: already running");
                Ok(())
            }
            StartDisposition::Start => {
                if !self.lifecycle.is_embedded() {
                    log::debug!("backend is externally managed, nothing to start");
                    self.lifecycle.complete_start();
                    return Ok(());
                }
                match self.backend.start().await {
                    Ok(()) => {
                        self.lifecycle.complete_start();
                        Ok(())
                    }
                    Err(source) => {
                        self.lifecycle.mark_failed();
                        Err(NotifyError::ServiceStart { source })
                    }
                }
            }
        }
    }

    /// Close all backend connections and release resources.
    ///
    /// Safe to call multiple times (later calls are no-ops) and safe to call
    /// even if startup never completed. From FAILED, resources are released
    /// best-effort but the state remains FAILED.
    pub async fn shutdown(&self) -> NotifyResult<()> {
        match self.lifecycle.begin_stop()? {
            StopDisposition::AlreadyStopped => {
                log::trace!("shutdown: already stopped");
                Ok(())
            }
            StopDisposition::Stop => {
                if let Err(error) = self.backend.shutdown().await {
                    // Shutdown still completes; there is nothing the state
                    // machine can do with a connection that refuses to close.
                    log::warn!("backend shutdown reported an error: {}", error);
                }
                self.lifecycle.complete_stop();
                Ok(())
            }
            StopDisposition::ReleaseOnly => {
                if let Err(error) = self.backend.shutdown().await {
                    log::warn!(
                        "backend shutdown after failed start reported an error: {}",
                        error
                    );
                }
                Ok(())
            }
        }
    }

    /// Create a producer handle onto the shared backend connection.
    pub fn create_producer(self: &Arc<Self>) -> NotifyResult<NotificationProducer> {
        self.lifecycle.ensure_usable()?;
        Ok(NotificationProducer::new(Arc::downgrade(self)))
    }

    /// Create exactly `count` independent consumer handles for `channel`,
    /// all members of this service's consumer group. Under normal backend
    /// operation no message is delivered to more than one of them.
    ///
    /// This is a factory, not a scheduler: the caller runs each handle on a
    /// worker of its own.
    pub async fn create_consumers(
        self: &Arc<Self>,
        channel: ChannelKind,
        count: usize,
    ) -> NotifyResult<Vec<ConsumerHandle>> {
        self.lifecycle.ensure_usable()?;
        if count == 0 {
            return Err(NotifyError::Configuration {
                message: "consumer count must be a positive integer".to_string(),
            });
        }
        if !self.backend.provisioned(channel) {
            return Err(NotifyError::Configuration {
                message: format!(
                    "channel {} ({}) has no provisioned backend resource",
                    channel,
                    channel.backend_name()
                ),
            });
        }

        let group = self.config().consumer_group().to_string();
        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            let subscription = self
                .backend
                .subscribe(channel, &group)
                .await
                .map_err(|source| NotifyError::Configuration {
                    message: format!("cannot subscribe to channel {}: {}", channel, source),
                })?;
            handles.push(ConsumerHandle::new(channel, group.clone(), subscription));
        }
        log::debug!(
            "created {} consumer(s) on channel {} in group '{}'",
            count,
            channel,
            group
        );
        Ok(handles)
    }
}
