//! metabus - a notification abstraction layer for metadata-change events
//!
//! Decouples producers of metadata-change events from a pluggable, swappable
//! messaging backend. Multiple logical channels share one backend instance but
//! never cross-deliver messages. See the [`notify`] module for the full
//! architecture.

pub mod core;
pub mod notify;
