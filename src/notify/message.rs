//! Message type delivered to consumers
//!
//! Payloads are opaque bytes; the core never interprets them. The sequence
//! number is the backend-assigned position within the channel's ordered
//! stream and is meaningful only relative to other messages on the same
//! channel.

use crate::notify::channel::ChannelKind;

/// A message pulled from a channel, pending commit or fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    channel: ChannelKind,
    sequence: u64,
    payload: Vec<u8>,
}

impl ReceivedMessage {
    pub(crate) fn new(channel: ChannelKind, sequence: u64, payload: Vec<u8>) -> Self {
        Self {
            channel,
            sequence,
            payload,
        }
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the message, taking ownership of the payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
