//! Unique identifier types for watchdog entities
//!
//! Custodians use UUID v7 so registrations sort chronologically.
//! Attesters are identified by the external address string they sign with.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a registered custodian
///
/// Uses UUID v7 for time-based sorting. Registration order can be
/// recovered from the embedded timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustodianId(Uuid);

impl CustodianId {
    /// Allocate an id stamped with the current time
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Wrap an id restored from storage
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for CustodianId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CustodianId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an attester submitting reserve observations
///
/// Format: any non-empty address string (e.g. "0xabc..." or "attester-1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttesterId(String);

impl AttesterId {
    /// Create a new AttesterId
    ///
    /// # Panics
    /// Panics if the address is empty or only whitespace
    pub fn new(address: impl Into<String>) -> Self {
        let s = address.into();
        assert!(!s.trim().is_empty(), "AttesterId must not be empty");
        Self(s)
    }

    /// Try to create an AttesterId, returning None if empty
    pub fn try_new(address: impl Into<String>) -> Option<Self> {
        let s = address.into();
        if s.trim().is_empty() {
            None
        } else {
            Some(Self(s))
        }
    }

    /// Get the address string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AttesterId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
