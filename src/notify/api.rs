//! Public API for the notification bus
//!
//! This module is the complete public surface of the notification system.
//! External code should import from here rather than from internal modules.

use std::sync::{Arc, OnceLock};

// Channels and configuration
pub use crate::notify::channel::ChannelKind;
pub use crate::notify::config::{ServiceConfig, DEFAULT_CONSUMER_GROUP};

// Lifecycle and central coordination
pub use crate::notify::lifecycle::LifecycleState;
pub use crate::notify::manager::NotificationManager;

// Producer/consumer contract
pub use crate::notify::consumer::ConsumerHandle;
pub use crate::notify::message::ReceivedMessage;
pub use crate::notify::producer::NotificationProducer;

// Backend driver surface, for implementing and registering new backends
pub use crate::notify::backend::{
    register_backend, BackendFactory, BackendSubscription, Delivery, DeliveryToken,
    NotificationBackend,
};
pub use crate::notify::memory::{MemoryBackend, MAX_PENDING_PROPERTY};

// Error handling
pub use crate::notify::error::{BackendError, NotifyError, NotifyResult};

/// Process-wide service instance, initialized at most once.
static NOTIFICATION_SERVICE: OnceLock<Arc<NotificationManager>> = OnceLock::new();

/// Initialize the process-wide notification service.
///
/// The first call constructs the service from `config`. Later calls with an
/// equal config return the existing instance; a different config is rejected
/// with `IllegalState` since the service cannot be re-initialized.
pub fn init_notification_service(config: ServiceConfig) -> NotifyResult<Arc<NotificationManager>> {
    if let Some(existing) = NOTIFICATION_SERVICE.get() {
        return reuse_or_reject(existing, &config);
    }

    let manager = NotificationManager::initialize(config.clone())?;
    match NOTIFICATION_SERVICE.set(Arc::clone(&manager)) {
        Ok(()) => Ok(manager),
        // Lost the initialization race; defer to whoever won.
        Err(_) => match NOTIFICATION_SERVICE.get() {
            Some(existing) => reuse_or_reject(existing, &config),
            None => Err(NotifyError::IllegalState {
                message: "notification service initialization raced and was lost".to_string(),
            }),
        },
    }
}

/// Access the process-wide notification service.
///
/// Fails with `IllegalState` until [`init_notification_service`] has run.
pub fn notification_service() -> NotifyResult<Arc<NotificationManager>> {
    NOTIFICATION_SERVICE
        .get()
        .cloned()
        .ok_or_else(|| NotifyError::IllegalState {
            message: "notification service has not been initialized".to_string(),
        })
}

fn reuse_or_reject(
    existing: &Arc<NotificationManager>,
    config: &ServiceConfig,
) -> NotifyResult<Arc<NotificationManager>> {
    if existing.config() == config {
        log::trace!("notification service already initialized with this configuration");
        Ok(Arc::clone(existing))
    } else {
        Err(NotifyError::IllegalState {
            message: "notification service already initialized with a different configuration"
                .to_string(),
        })
    }
}
