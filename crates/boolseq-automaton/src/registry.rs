//! Node identity registry.
//!
//! The registry is a context object owned by the session and passed into
//! every node-creating call. `(namespace, label)` is a composite key: the
//! namespace lets several independently written networks share one session
//! without label collisions.

use std::collections::HashMap;

use boolseq_core::NodeIdentity;
use uuid::Uuid;

use crate::error::{AutomatonError, AutomatonResult};

/// Issues and validates unique node identities.
#[derive(Debug, Default, Clone)]
pub struct IdentityRegistry {
    by_key: HashMap<(String, String), NodeIdentity>,
    by_uuid: HashMap<Uuid, (String, String)>,
    next_serial: u64,
}

impl IdentityRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new identity.
    pub fn create(&mut self, namespace: &str, label: &str) -> AutomatonResult<NodeIdentity> {
        let key = (namespace.to_string(), label.to_string());
        if self.by_key.contains_key(&key) {
            return Err(AutomatonError::DuplicateIdentity {
                namespace: key.0,
                label: key.1,
            });
        }

        let identity = NodeIdentity::new(namespace, label, self.next_serial);
        self.next_serial += 1;
        self.by_uuid.insert(identity.uuid, key.clone());
        self.by_key.insert(key, identity.clone());
        Ok(identity)
    }

    /// Find the identity registered under `(namespace, label)`.
    pub fn lookup(&self, namespace: &str, label: &str) -> AutomatonResult<&NodeIdentity> {
        self.by_key
            .get(&(namespace.to_string(), label.to_string()))
            .ok_or_else(|| AutomatonError::UnknownIdentity {
                namespace: namespace.to_string(),
                label: label.to_string(),
            })
    }

    /// Find an identity by its uuid.
    pub fn lookup_uuid(&self, uuid: &Uuid) -> Option<&NodeIdentity> {
        self.by_uuid.get(uuid).and_then(|key| self.by_key.get(key))
    }

    pub fn contains(&self, namespace: &str, label: &str) -> bool {
        self.by_key
            .contains_key(&(namespace.to_string(), label.to_string()))
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    /// Forget every identity and restart serial numbering.
    ///
    /// Labels become reusable only after this call.
    pub fn reset(&mut self) {
        self.by_key.clear();
        self.by_uuid.clear();
        self.next_serial = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let mut registry = IdentityRegistry::new();
        let a = registry.create("net", "a").unwrap();
        let b = registry.create("net", "b").unwrap();

        assert_eq!(a.serial, 0);
        assert_eq!(b.serial, 1);
        assert_eq!(registry.lookup("net", "a").unwrap(), &a);
        assert_eq!(registry.lookup_uuid(&b.uuid), Some(&b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_duplicate_identity() {
        let mut registry = IdentityRegistry::new();
        registry.create("net", "a").unwrap();

        let err = registry.create("net", "a").unwrap_err();
        assert!(matches!(err, AutomatonError::DuplicateIdentity { .. }));

        // Same label in another namespace is fine.
        assert!(registry.create("other", "a").is_ok());
    }

    #[test]
    fn test_unknown_identity() {
        let registry = IdentityRegistry::new();
        assert!(matches!(
            registry.lookup("net", "missing"),
            Err(AutomatonError::UnknownIdentity { .. })
        ));
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut registry = IdentityRegistry::new();
        let first = registry.create("net", "a").unwrap();
        registry.reset();

        assert!(registry.is_empty());
        let second = registry.create("net", "a").unwrap();
        assert_eq!(second.serial, 0);
        assert_ne!(first.uuid, second.uuid);
    }
}
