//! Producer handle for sending messages to a channel
//!
//! A producer is a lightweight handle onto the shared backend connection; any
//! number can exist concurrently and none needs external synchronization.
//! Each `send` presents its batch to the backend as a whole: either every
//! message is durably accepted in order, or the call fails and the caller
//! owns the retry decision. The producer never retries implicitly, to avoid
//! duplicating messages beyond what at-least-once delivery already implies.

use crate::notify::channel::ChannelKind;
use crate::notify::error::{NotifyError, NotifyResult};
use crate::notify::manager::NotificationManager;
use std::sync::Weak;

pub struct NotificationProducer {
    manager: Weak<NotificationManager>,
}

impl NotificationProducer {
    pub(crate) fn new(manager: Weak<NotificationManager>) -> Self {
        Self { manager }
    }

    /// Send an ordered batch of payloads to `channel`.
    ///
    /// Returns only once the backend has accepted the whole batch; there is
    /// no partial-acceptance outcome. An empty batch is a no-op success.
    pub async fn send<B: AsRef<[u8]>>(
        &self,
        channel: ChannelKind,
        payloads: &[B],
    ) -> NotifyResult<()> {
        if payloads.is_empty() {
            log::trace!("empty batch for channel {}, nothing to send", channel);
            return Ok(());
        }

        let manager = self
            .manager
            .upgrade()
            .ok_or_else(|| NotifyError::IllegalState {
                message: "notification service no longer exists".to_string(),
            })?;
        manager.lifecycle().ensure_usable()?;

        let batch: Vec<Vec<u8>> = payloads.iter().map(|p| p.as_ref().to_vec()).collect();
        log::trace!("sending {} message(s) to channel {}", batch.len(), channel);

        manager
            .backend()
            .publish(channel, batch)
            .await
            .map_err(|source| NotifyError::Delivery { channel, source })
    }
}
