//! Backend driver abstraction
//!
//! The core is written against this driver surface, never against a concrete
//! broker's native client. A driver exposes connect/disconnect (start and
//! shutdown), publish, and subscribe/acknowledge primitives. Drivers are
//! selected at initialization time from configuration via an explicit, typed
//! registry mapping backend names to factories.

use crate::core::sync::lock_or;
use crate::notify::channel::ChannelKind;
use crate::notify::config::ServiceConfig;
use crate::notify::error::{BackendError, NotifyError, NotifyResult};
use crate::notify::memory::MemoryBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};
use std::time::Duration;

/// Opaque per-delivery token used to acknowledge or fail a single message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeliveryToken(u64);

impl DeliveryToken {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A single message handed to a subscription, pending disposition.
#[derive(Debug)]
pub struct Delivery {
    /// Token the subscription expects back in `ack` or `nack`
    pub token: DeliveryToken,
    /// Backend-assigned position within the channel's ordered stream
    pub sequence: u64,
    /// Opaque message body; the core never interprets it
    pub payload: Vec<u8>,
}

/// Driver surface a concrete messaging backend must implement.
///
/// All methods take `&self`; a driver shares or pools its connections
/// internally so callers never need external synchronization.
#[async_trait]
pub trait NotificationBackend: Send + Sync {
    /// Registered name of this driver.
    fn name(&self) -> &str;

    /// Start the backend service in-process. Only invoked in embedded mode.
    async fn start(&self) -> Result<(), BackendError>;

    /// Close all connections and release resources. In embedded mode this
    /// also stops the in-process service.
    async fn shutdown(&self) -> Result<(), BackendError>;

    /// Durably accept an ordered batch of payloads for `channel`. Either the
    /// whole batch is accepted or the call fails without partial acceptance.
    async fn publish(
        &self,
        channel: ChannelKind,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), BackendError>;

    /// Open a competing-consumer subscription on `channel` for `group`.
    async fn subscribe(
        &self,
        channel: ChannelKind,
        group: &str,
    ) -> Result<Box<dyn BackendSubscription>, BackendError>;

    /// Whether a backing resource exists for `channel`.
    fn provisioned(&self, channel: ChannelKind) -> bool;
}

/// One member's view of a consumer group: pull, acknowledge, fail.
#[async_trait]
pub trait BackendSubscription: Send + Sync {
    /// Wait up to `timeout` for the next message. `Ok(None)` on timeout.
    async fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>, BackendError>;

    /// Acknowledge a delivery as durably processed; it must not be
    /// redelivered to this consumer group.
    async fn ack(&mut self, token: DeliveryToken) -> Result<(), BackendError>;

    /// Report a delivery as failed so it becomes eligible for redelivery
    /// according to the backend's own visibility policy.
    async fn nack(&mut self, token: DeliveryToken, reason: &str) -> Result<(), BackendError>;

    /// Release backend-side resources for this subscription. Must be safe to
    /// call from `Drop`, hence synchronous; any outstanding delivery returns
    /// to the group for redelivery.
    fn close(&mut self);
}

/// Factory producing a backend instance from validated configuration.
pub type BackendFactory =
    Arc<dyn Fn(&ServiceConfig) -> Result<Arc<dyn NotificationBackend>, BackendError> + Send + Sync>;

static BACKEND_REGISTRY: LazyLock<RwLock<HashMap<String, BackendFactory>>> = LazyLock::new(|| {
    let mut factories: HashMap<String, BackendFactory> = HashMap::new();
    factories.insert(
        "memory".to_string(),
        Arc::new(|config: &ServiceConfig| {
            Ok(Arc::new(MemoryBackend::new(config)?) as Arc<dyn NotificationBackend>)
        }),
    );
    RwLock::new(factories)
});

/// Register a backend driver factory under `name`.
///
/// Registering the same name again replaces the previous factory; it does not
/// affect services already initialized against the old one.
pub fn register_backend(name: &str, factory: BackendFactory) -> NotifyResult<()> {
    let mut factories = lock_or(BACKEND_REGISTRY.write(), |message| {
        NotifyError::Configuration { message }
    })?;
    log::debug!("registering notification backend '{}'", name);
    factories.insert(name.to_string(), factory);
    Ok(())
}

/// Resolve and construct the backend named by `config.backend`.
pub(crate) fn create_backend(config: &ServiceConfig) -> NotifyResult<Arc<dyn NotificationBackend>> {
    let factory = {
        let factories = lock_or(BACKEND_REGISTRY.read(), |message| {
            NotifyError::Configuration { message }
        })?;
        factories
            .get(&config.backend)
            .cloned()
            .ok_or_else(|| NotifyError::Configuration {
                message: format!("unknown notification backend '{}'", config.backend),
            })?
    };

    factory(config).map_err(|source| NotifyError::Configuration {
        message: format!("backend '{}' could not be constructed: {}", config.backend, source),
    })
}
