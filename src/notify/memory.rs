//! In-memory notification backend
//!
//! The default embedded backend, also used as the reachable test backend.
//! Each channel keeps an append-only log with monotonic sequence numbers and
//! Arc-wrapped payloads shared across consumer groups. Each group holds a
//! cursor into the log, a redelivery queue for failed messages, and an
//! in-flight map keyed by delivery token, giving competing-consumer semantics
//! within a group: every message goes to exactly one subscription.
//!
//! Redelivery timing is immediate: a failed or abandoned message becomes
//! visible to the group again as soon as it is returned. Waiting pollers are
//! woken through a per-channel [`Notify`].

use crate::core::sync::lock_or;
use crate::notify::backend::{BackendSubscription, Delivery, DeliveryToken, NotificationBackend};
use crate::notify::channel::ChannelKind;
use crate::notify::config::ServiceConfig;
use crate::notify::error::BackendError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Property key bounding the per-channel backlog.
pub const MAX_PENDING_PROPERTY: &str = "memory.max.pending";

const DEFAULT_MAX_PENDING: usize = 10_000;

/// Deadline substitute when the caller's timeout overflows the clock.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Per-group competing-consumer state.
#[derive(Debug, Default)]
struct GroupState {
    /// Next unread index in the channel log
    cursor: usize,
    /// Failed or abandoned messages eligible for redelivery, oldest first
    redelivery: VecDeque<usize>,
    /// Delivered but undisposed messages, token -> log index
    in_flight: HashMap<u64, usize>,
}

#[derive(Debug, Default)]
struct ChannelInner {
    /// Append-only message log; index + 1 is the message's sequence number
    log: Vec<Arc<[u8]>>,
    groups: HashMap<String, GroupState>,
    next_token: u64,
}

impl ChannelInner {
    /// Take the next visible message for `group`, preferring redeliveries,
    /// and mark it in flight under a fresh token.
    fn take_next(&mut self, group: &str) -> Option<(u64, usize)> {
        let token = self.next_token;
        let log_len = self.log.len();
        let state = self.groups.get_mut(group)?;

        let index = if let Some(index) = state.redelivery.pop_front() {
            index
        } else if state.cursor < log_len {
            let index = state.cursor;
            state.cursor += 1;
            index
        } else {
            return None;
        };

        state.in_flight.insert(token, index);
        self.next_token += 1;
        Some((token, index))
    }
}

#[derive(Debug)]
struct ChannelState {
    inner: Mutex<ChannelInner>,
    wakeup: Notify,
}

/// In-process backend holding all three channels in memory.
pub struct MemoryBackend {
    channels: HashMap<ChannelKind, Arc<ChannelState>>,
    stopped: Arc<AtomicBool>,
    max_pending: usize,
}

impl MemoryBackend {
    pub fn new(config: &ServiceConfig) -> Result<Self, BackendError> {
        let max_pending = match config.properties.get(MAX_PENDING_PROPERTY) {
            Some(raw) => raw.parse::<usize>().map_err(|_| {
                BackendError::from(format!(
                    "property '{}' must be a positive integer, got '{}'",
                    MAX_PENDING_PROPERTY, raw
                ))
            })?,
            None => DEFAULT_MAX_PENDING,
        };

        let channels = ChannelKind::all()
            .map(|kind| {
                (
                    kind,
                    Arc::new(ChannelState {
                        inner: Mutex::new(ChannelInner::default()),
                        wakeup: Notify::new(),
                    }),
                )
            })
            .collect();

        Ok(Self {
            channels,
            stopped: Arc::new(AtomicBool::new(false)),
            max_pending,
        })
    }

    fn channel(&self, kind: ChannelKind) -> Result<&Arc<ChannelState>, BackendError> {
        self.channels
            .get(&kind)
            .ok_or_else(|| BackendError::from(format!("channel {} is not provisioned", kind)))
    }
}

#[async_trait]
impl NotificationBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn start(&self) -> Result<(), BackendError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err("in-memory backend cannot be restarted after shutdown".into());
        }
        log::info!("in-memory notification backend started");
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), BackendError> {
        self.stopped.store(true, Ordering::Release);
        for state in self.channels.values() {
            state.wakeup.notify_waiters();
        }
        log::info!("in-memory notification backend stopped");
        Ok(())
    }

    async fn publish(
        &self,
        channel: ChannelKind,
        payloads: Vec<Vec<u8>>,
    ) -> Result<(), BackendError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err("in-memory backend is stopped".into());
        }
        let state = self.channel(channel)?;
        {
            let mut inner = lock_or(state.inner.lock(), |message| BackendError::from(message))?;
            if inner.log.len() + payloads.len() > self.max_pending {
                return Err(format!(
                    "channel {} backlog full (max {} messages)",
                    channel, self.max_pending
                )
                .into());
            }
            for payload in payloads {
                inner.log.push(Arc::from(payload));
            }
        }
        state.wakeup.notify_waiters();
        Ok(())
    }

    async fn subscribe(
        &self,
        channel: ChannelKind,
        group: &str,
    ) -> Result<Box<dyn BackendSubscription>, BackendError> {
        if self.stopped.load(Ordering::Acquire) {
            return Err("in-memory backend is stopped".into());
        }
        let state = Arc::clone(self.channel(channel)?);
        {
            let mut inner = lock_or(state.inner.lock(), |message| BackendError::from(message))?;
            // Groups start at the beginning of the log so messages published
            // before the first subscriber are still delivered.
            inner.groups.entry(group.to_string()).or_default();
        }
        Ok(Box::new(MemorySubscription {
            channel,
            group: group.to_string(),
            state,
            stopped: Arc::clone(&self.stopped),
            outstanding: HashSet::new(),
            closed: false,
        }))
    }

    fn provisioned(&self, channel: ChannelKind) -> bool {
        self.channels.contains_key(&channel)
    }
}

struct MemorySubscription {
    channel: ChannelKind,
    group: String,
    state: Arc<ChannelState>,
    stopped: Arc<AtomicBool>,
    /// Tokens issued to this subscription and not yet disposed
    outstanding: HashSet<u64>,
    closed: bool,
}

#[async_trait]
impl BackendSubscription for MemorySubscription {
    async fn next(&mut self, timeout: Duration) -> Result<Option<Delivery>, BackendError> {
        if self.closed {
            return Err("subscription is closed".into());
        }
        // An extreme timeout must not panic the poll; saturate far out.
        let now = tokio::time::Instant::now();
        let deadline = now
            .checked_add(timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);
        loop {
            if self.stopped.load(Ordering::Acquire) {
                // Backend shut down while waiting; degrade to "no message"
                // so workers can observe shutdown on their own terms.
                return Ok(None);
            }

            // Register interest before checking so a publish between the
            // check and the await cannot be missed.
            let mut notified = pin!(self.state.wakeup.notified());
            notified.as_mut().enable();

            let taken = {
                let mut inner = lock_or(self.state.inner.lock(), |message| BackendError::from(message))?;
                inner.take_next(&self.group).map(|(token, index)| {
                    (token, index as u64 + 1, inner.log[index].to_vec())
                })
            };

            if let Some((token, sequence, payload)) = taken {
                self.outstanding.insert(token);
                return Ok(Some(Delivery {
                    token: DeliveryToken::new(token),
                    sequence,
                    payload,
                }));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&mut self, token: DeliveryToken) -> Result<(), BackendError> {
        if !self.outstanding.remove(&token.value()) {
            return Err(format!("unknown delivery token {}", token.value()).into());
        }
        if self.stopped.load(Ordering::Acquire) {
            // The lease is gone with the backend; the message counts as
            // possibly-redelivered.
            return Err("in-memory backend is stopped".into());
        }
        let mut inner = lock_or(self.state.inner.lock(), |message| BackendError::from(message))?;
        let state = inner
            .groups
            .get_mut(&self.group)
            .ok_or_else(|| BackendError::from(format!("consumer group '{}' is gone", self.group)))?;
        state
            .in_flight
            .remove(&token.value())
            .ok_or_else(|| BackendError::from(format!("delivery {} is not in flight", token.value())))?;
        Ok(())
    }

    async fn nack(&mut self, token: DeliveryToken, reason: &str) -> Result<(), BackendError> {
        if !self.outstanding.remove(&token.value()) {
            return Err(format!("unknown delivery token {}", token.value()).into());
        }
        log::debug!(
            "message on {} returned to group '{}' for redelivery: {}",
            self.channel,
            self.group,
            reason
        );
        {
            let mut inner = lock_or(self.state.inner.lock(), |message| BackendError::from(message))?;
            if let Some(state) = inner.groups.get_mut(&self.group) {
                if let Some(index) = state.in_flight.remove(&token.value()) {
                    state.redelivery.push_back(index);
                }
            }
        }
        self.state.wakeup.notify_waiters();
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Ok(mut inner) = self.state.inner.lock() {
            if let Some(state) = inner.groups.get_mut(&self.group) {
                for token in self.outstanding.drain() {
                    if let Some(index) = state.in_flight.remove(&token) {
                        state.redelivery.push_back(index);
                    }
                }
            }
        }
        self.state.wakeup.notify_waiters();
        log::trace!(
            "subscription on {} (group '{}') closed",
            self.channel,
            self.group
        );
    }
}
