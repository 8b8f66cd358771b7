// src/zone.rs
//! Zone identity. A zone owns exactly one cookie jar.
//!
use std::fmt::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for a zone, represented as a UUID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZoneId(Uuid);

impl ZoneId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ZoneId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ZoneId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Display for ZoneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
