//! Stub backends shared by the notification system tests

use crate::notify::backend::{
    register_backend, BackendSubscription, Delivery, DeliveryToken, NotificationBackend,
};
use crate::notify::channel::ChannelKind;
use crate::notify::config::ServiceConfig;
use crate::notify::error::BackendError;
use crate::notify::memory::MemoryBackend;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Backend that records every driver invocation and otherwise does nothing.
pub(crate) struct RecordingBackend {
    pub start_calls: AtomicUsize,
    pub shutdown_calls: AtomicUsize,
    pub publish_calls: AtomicUsize,
    pub provisioned: bool,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            start_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            publish_calls: AtomicUsize::new(0),
            provisioned: true,
        })
    }

    pub fn unprovisioned() -> Arc<Self> {
        Arc::new(Self {
            start_calls: AtomicUsize::new(0),
            shutdown_calls: AtomicUsize::new(0),
            publish_calls: AtomicUsize::new(0),
            provisioned: false,
        })
    }
}

#[async_trait]
impl NotificationBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<(), BackendError> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        self.shutdown_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn publish(
        &self,
        _channel: ChannelKind,
        _payloads: Vec<Vec<u8>>,
    ) -> Result<(), BackendError> {
        self.publish_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn subscribe(
        &self,
        _channel: ChannelKind,
        _group: &str,
    ) -> Result<Box<dyn BackendSubscription>, BackendError> {
        Ok(Box::new(EmptySubscription))
    }

    fn provisioned(&self, _channel: ChannelKind) -> bool {
        self.provisioned
    }
}

/// Subscription that never delivers anything.
pub(crate) struct EmptySubscription;

#[async_trait]
impl BackendSubscription for EmptySubscription {
    async fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>, BackendError> {
        tokio::time::sleep(timeout).await;
        Ok(None)
    }

    async fn ack(&mut self, _token: DeliveryToken) -> Result<(), BackendError> {
        Ok(())
    }

    async fn nack(&mut self, _token: DeliveryToken, _reason: &str) -> Result<(), BackendError> {
        Ok(())
    }

    fn close(&mut self) {}
}

/// Backend whose embedded start always fails.
pub(crate) struct FailingStartBackend;

#[async_trait]
impl NotificationBackend for FailingStartBackend {
    fn name(&self) -> &str {
        "failing-start"
    }

    async fn start(&self) -> Result<(), BackendError> {
        Err("broker refused to bind its listen port".into())
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        Ok(())
    }

    async fn publish(
        &self,
        _channel: ChannelKind,
        _payloads: Vec<Vec<u8>>,
    ) -> Result<(), BackendError> {
        Err("not started".into())
    }

    async fn subscribe(
        &self,
        _channel: ChannelKind,
        _group: &str,
    ) -> Result<Box<dyn BackendSubscription>, BackendError> {
        Err("not started".into())
    }

    fn provisioned(&self, _channel: ChannelKind) -> bool {
        true
    }
}

/// Backend that rejects the first `failures` publishes, then recovers and
/// delegates to an in-memory backend.
pub(crate) struct FlakyPublishBackend {
    inner: MemoryBackend,
    remaining_failures: AtomicUsize,
}

impl FlakyPublishBackend {
    pub fn new(config: &ServiceConfig, failures: usize) -> Result<Arc<Self>, BackendError> {
        Ok(Arc::new(Self {
            inner: MemoryBackend::new(config)?,
            remaining_failures: AtomicUsize::new(failures),
        }))
    }
}

#[async_trait]
impl NotificationBackend for FlakyPublishBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn start(&self) -> Result<(), BackendError> {
        self.inner.start().await
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        self.inner.shutdown().await
    }

    async fn publish(
        &self,
        channel: ChannelKind,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), BackendError> {
        let remaining = self.remaining_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.remaining_failures.store(remaining - 1, Ordering::SeqCst);
            return Err("transient broker write rejection".into());
        }
        self.inner.publish(channel, payloads).await
    }

    async fn subscribe(
        &self,
        channel: ChannelKind,
        group: &str,
    ) -> Result<Box<dyn BackendSubscription>, BackendError> {
        self.inner.subscribe(channel, group).await
    }

    fn provisioned(&self, channel: ChannelKind) -> bool {
        self.inner.provisioned(channel)
    }
}

/// Register a shared stub instance under `name` so `ServiceConfig` can
/// select it through the ordinary registry path.
pub(crate) fn register_stub<B: NotificationBackend + 'static>(name: &str, backend: Arc<B>) {
    let backend: Arc<dyn NotificationBackend> = backend;
    register_backend(
        name,
        Arc::new(move |_config: &ServiceConfig| Ok(Arc::clone(&backend))),
    )
    .expect("backend registry is usable in tests");
}
