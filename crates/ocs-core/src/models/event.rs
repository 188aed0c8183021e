//! Event context
//!
//! Read-only view over an inbound charging event: its tenant, identifier,
//! fields and processing options. The engine never looks inside it; only
//! filter evaluation does, through the `~*req.` and `~*opts.` paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Path prefix addressing event fields
pub const REQ_PATH_PREFIX: &str = "~*req.";

/// Path prefix addressing processing options
pub const OPTS_PATH_PREFIX: &str = "~*opts.";

fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Charging event as seen by filter evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventContext {
    /// Empty until the ingestion layer assigns the default tenant
    #[serde(default)]
    pub tenant: String,

    #[serde(default = "new_event_id")]
    pub id: String,

    /// Event fields
    #[serde(default)]
    pub event: HashMap<String, Value>,

    /// Processing options
    #[serde(default)]
    pub opts: HashMap<String, Value>,
}

impl EventContext {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            id: new_event_id(),
            event: HashMap::new(),
            opts: HashMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.event.insert(name.into(), value.into());
        self
    }

    pub fn with_opt(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.opts.insert(name.into(), value.into());
        self
    }

    /// Look up a value by path (`~*req.Account`, `~*opts.*context`)
    pub fn field(&self, path: &str) -> Option<&Value> {
        if let Some(name) = path.strip_prefix(REQ_PATH_PREFIX) {
            self.event.get(name)
        } else if let Some(name) = path.strip_prefix(OPTS_PATH_PREFIX) {
            self.opts.get(name)
        } else {
            None
        }
    }

    /// Look up a value by path and render it as a string
    ///
    /// Strings are returned without quotes; `null` counts as missing.
    pub fn field_as_string(&self, path: &str) -> Option<String> {
        match self.field(path)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}
