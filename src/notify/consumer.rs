//! Consumer handle: the unit a worker uses to pull and dispose messages
//!
//! Each handle enforces single-in-flight processing: at most one delivered
//! message may be outstanding at a time, so a failure always has an
//! unambiguous target. The handle owns its backend subscription and releases
//! it on `close` (or on drop as a safety net), returning any outstanding
//! delivery to the group so an abandoned worker cannot strand a message
//! behind a stuck lease.

use crate::notify::backend::{BackendSubscription, DeliveryToken};
use crate::notify::channel::ChannelKind;
use crate::notify::error::{NotifyError, NotifyResult};
use crate::notify::message::ReceivedMessage;
use std::time::Duration;

pub struct ConsumerHandle {
    channel: ChannelKind,
    group: String,
    subscription: Box<dyn BackendSubscription>,
    outstanding: Option<DeliveryToken>,
    closed: bool,
}

impl ConsumerHandle {
    pub(crate) fn new(
        channel: ChannelKind,
        group: String,
        subscription: Box<dyn BackendSubscription>,
    ) -> Self {
        Self {
            channel,
            group,
            subscription,
            outstanding: None,
            closed: false,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    /// Whether a delivered message is awaiting commit or fail.
    pub fn has_outstanding(&self) -> bool {
        self.outstanding.is_some()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait up to `timeout` for the next message on this handle's channel.
    ///
    /// Returns `Ok(None)` on timeout; that is not an error and leaves the
    /// handle idle. Polling again while a delivery is outstanding is a
    /// protocol violation.
    pub async fn poll(&mut self, timeout: Duration) -> NotifyResult<Option<ReceivedMessage>> {
        self.ensure_open()?;
        if self.outstanding.is_some() {
            return Err(NotifyError::ProtocolViolation {
                message: "poll while a delivery is outstanding; commit or fail it first"
                    .to_string(),
            });
        }

        let delivery = self
            .subscription
            .next(timeout)
            .await
            .map_err(|source| NotifyError::Delivery {
                channel: self.channel,
                source,
            })?;

        match delivery {
            Some(delivery) => {
                log::trace!(
                    "delivered message {} on channel {} (group '{}')",
                    delivery.sequence,
                    self.channel,
                    self.group
                );
                self.outstanding = Some(delivery.token);
                Ok(Some(ReceivedMessage::new(
                    self.channel,
                    delivery.sequence,
                    delivery.payload,
                )))
            }
            None => Ok(None),
        }
    }

    /// Acknowledge the outstanding message as durably processed.
    ///
    /// On `Commit` errors the acknowledgment did not reach the backend; the
    /// message must be treated as possibly-redelivered (at-least-once, not
    /// exactly-once).
    pub async fn commit(&mut self) -> NotifyResult<()> {
        self.ensure_open()?;
        let token = self
            .outstanding
            .take()
            .ok_or_else(|| NotifyError::ProtocolViolation {
                message: "commit without an outstanding delivery".to_string(),
            })?;

        self.subscription
            .ack(token)
            .await
            .map_err(|source| NotifyError::Commit { source })
    }

    /// Report the outstanding message as failed so it becomes eligible for
    /// redelivery, to this or another handle, on the backend's own schedule.
    /// The reason is recorded for observability only.
    pub async fn fail(&mut self, reason: &str) -> NotifyResult<()> {
        self.ensure_open()?;
        let token = self
            .outstanding
            .take()
            .ok_or_else(|| NotifyError::ProtocolViolation {
                message: "fail without an outstanding delivery".to_string(),
            })?;

        log::debug!(
            "consumer on channel {} (group '{}') failed message: {}",
            self.channel,
            self.group,
            reason
        );

        self.subscription
            .nack(token, reason)
            .await
            .map_err(|source| NotifyError::Commit { source })
    }

    /// Release the backend subscription. Idempotent. Any outstanding
    /// delivery returns to the group for redelivery.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.outstanding = None;
        self.subscription.close();
        self.closed = true;
        log::trace!(
            "consumer handle on channel {} (group '{}') closed",
            self.channel,
            self.group
        );
    }

    fn ensure_open(&self) -> NotifyResult<()> {
        if self.closed {
            return Err(NotifyError::ProtocolViolation {
                message: "consumer handle is closed".to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.close();
    }
}
