//! Channel registry for the notification bus
//!
//! Channels are a closed, compile-time enumeration. Each channel maps to
//! exactly one backend-addressable resource name, fixed by convention and
//! never user-configurable per call. Messages on different channels share a
//! backend instance but are never cross-delivered.

use strum_macros::{Display, EnumIter};

/// The logical channels carried by the notification bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ChannelKind {
    /// Metadata-change events emitted by external hooks
    Hook,
    /// Entity create/update/delete events
    Entities,
    /// Type-definition change events
    Types,
}

impl ChannelKind {
    /// The backend-side resource name for this channel.
    pub fn backend_name(&self) -> &'static str {
        match self {
            ChannelKind::Hook => "METABUS_HOOK",
            ChannelKind::Entities => "METABUS_ENTITIES",
            ChannelKind::Types => "METABUS_TYPES",
        }
    }

    /// Iterate over every channel kind.
    pub fn all() -> impl Iterator<Item = ChannelKind> {
        use strum::IntoEnumIterator;
        Self::iter()
    }
}
