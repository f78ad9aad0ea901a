/*!
 * Process Identity
 * Immutable process ids compared case-insensitively
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Immutable process id. Equality ignores ASCII case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(String);

/// Lowercased id used as the map key in the logger and the run registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessKey(String);

impl ProcessId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id; `None` if blank
    pub fn parse(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn key(&self) -> ProcessKey {
        ProcessKey(self.0.to_ascii_lowercase())
    }
}

impl PartialEq for ProcessId {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for ProcessId {}

impl Hash for ProcessId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ProcessKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProcessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ProcessId> for ProcessKey {
    fn from(id: &ProcessId) -> Self {
        id.key()
    }
}

/// Identity shared by processes, tasks and logs
pub trait ProcessIdentity {
    fn process_id(&self) -> &ProcessId;
    fn process_name(&self) -> &str;

    fn process_key(&self) -> ProcessKey {
        self.process_id().key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_case_insensitive_equality() {
        let a = ProcessId::parse("Nightly-Import").unwrap();
        let b = ProcessId::parse("nightly-import").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key(), b.key());

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(ProcessId::generate(), ProcessId::generate());
    }

    #[test]
    fn test_blank_id_rejected() {
        assert!(ProcessId::parse("   ").is_none());
    }
}
