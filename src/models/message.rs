//! Canonical message exchanged between the two spokes of a hub

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known metadata keys
pub mod meta {
    pub const CONTENT_TYPE: &str = "content-type";
    pub const HTTP_METHOD: &str = "http.method";
    /// Path and query of the original request, relative to the endpoint
    pub const HTTP_PATH: &str = "http.path";
    pub const HTTP_STATUS: &str = "http.status";
}

/// Protocol-neutral payload plus the attributes the receiving spoke needs to
/// re-encode it for its own wire protocol.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMessage {
    pub payload: Vec<u8>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CanonicalMessage {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn content_type(&self) -> Option<&str> {
        self.meta(meta::CONTENT_TYPE)
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
