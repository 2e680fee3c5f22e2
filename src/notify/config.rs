//! Service configuration for the notification bus
//!
//! A `ServiceConfig` is created once at initialization, validated, and
//! read-only afterwards. It is owned by the lifecycle manager. Backend
//! connection parameters are opaque to the core and passed through to the
//! selected backend driver untouched.

use crate::notify::error::{NotifyError, NotifyResult};
use serde::Deserialize;
use std::collections::HashMap;

/// Consumer group id used when the configuration does not name one.
pub const DEFAULT_CONSUMER_GROUP: &str = "metabus";

/// Configuration bundle recognized at service initialization.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServiceConfig {
    /// Whether this process starts and stops the backend itself. When false
    /// the backend is assumed to be an externally managed service.
    #[serde(default)]
    pub embedded: bool,

    /// Registered name of the backend driver to use (e.g. `"memory"`).
    pub backend: String,

    /// Consumer group id shared by all consumers created by this process.
    #[serde(default)]
    pub group_id: Option<String>,

    /// Opaque, backend-specific connection parameters.
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl ServiceConfig {
    /// Convenience constructor for an embedded deployment.
    pub fn embedded(backend: &str) -> Self {
        Self {
            embedded: true,
            backend: backend.to_string(),
            group_id: None,
            properties: HashMap::new(),
        }
    }

    /// Convenience constructor for an externally managed backend.
    pub fn external(backend: &str) -> Self {
        Self {
            embedded: false,
            backend: backend.to_string(),
            group_id: None,
            properties: HashMap::new(),
        }
    }

    /// Attach a backend-specific connection parameter.
    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// The consumer group id, falling back to [`DEFAULT_CONSUMER_GROUP`].
    pub fn consumer_group(&self) -> &str {
        self.group_id.as_deref().unwrap_or(DEFAULT_CONSUMER_GROUP)
    }

    pub(crate) fn validate(&self) -> NotifyResult<()> {
        if self.backend.trim().is_empty() {
            return Err(NotifyError::Configuration {
                message: "backend name must not be empty".to_string(),
            });
        }
        if let Some(group) = &self.group_id {
            if group.trim().is_empty() {
                return Err(NotifyError::Configuration {
                    message: "consumer group id must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
