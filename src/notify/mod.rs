//! Notification abstraction layer
//!
//! Decouples producers of metadata-change events from a pluggable messaging
//! backend. Three logical channels (HOOK, ENTITIES, TYPES) share one backend
//! instance but never cross-deliver. The backend may be embedded (started
//! and stopped by this process) or an external service the process merely
//! connects to.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐          ┌─────────────────────┐
//! │  Producer A  │   │  Producer B  │          │  LifecycleManager   │
//! └──────┬───────┘   └──────┬───────┘          │ STOPPED -> STARTING │
//!        │ send(HOOK, …)    │ send(ENTITIES,…) │  -> RUNNING -> …    │
//!        ▼                  ▼                  └──────────┬──────────┘
//! ┌─────────────────────────────────────────────────────┐ │ start/stop
//! │            NotificationManager (per process)        │ │ (embedded)
//! │   ┌──────────────── backend driver ───────────────┐ │ │
//! │   │  METABUS_HOOK │ METABUS_ENTITIES │ METABUS_…  │◄┼─┘
//! │   └───────┬───────────────┬─────────────────------┘ │
//! └───────────┼───────────────┼─────────────────────────┘
//!             │ competing     │ competing
//!      ┌──────┴─────┐   ┌─────┴──────┐
//!      │ Handle 1..N│   │ Handle 1..M│   one consumer group per process;
//!      └────────────┘   └────────────┘   each message to exactly one handle
//! ```
//!
//! Delivery is at-least-once: a committed message is never redelivered to the
//! group under normal operation, a failed or abandoned one becomes eligible
//! for redelivery on the backend's own schedule. Ordering holds per channel
//! and per producer within a single handle's delivery stream; nothing is
//! guaranteed across channels or across producers.

// Internal modules - all access should go through the api module
pub(crate) mod backend;
pub(crate) mod channel;
pub(crate) mod config;
pub(crate) mod consumer;
pub(crate) mod error;
pub(crate) mod lifecycle;
pub(crate) mod manager;
pub(crate) mod memory;
pub(crate) mod message;
pub(crate) mod producer;

// Public API module - the only public interface for the notification system
pub mod api;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod consumer_tests;
