// Copyright 2021 IOTA Stiftung
// SPDX-License-Identifier: Apache-2.0

//! The state registry: a tagged map of user-supplied `{serialize, merge}` handlers, keyed by a
//! string identifier unique within the process. Modeled as a capability map rather than an
//! inheritance hierarchy.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bytes::Bytes;

/// A user-defined mergeable value identified by a string key, e.g. a set of alert silences or a
/// notification log. The concrete implementation, and the byte encoding it chooses, is entirely
/// the caller's concern; this layer only calls `serialize`/`merge` and moves the resulting bytes
/// around.
pub trait State: Send + Sync {
    /// Serializes the current snapshot of this state.
    fn serialize(&self) -> Bytes;

    /// Merges an incoming snapshot (from a broadcast message or a push/pull exchange) into the
    /// current state. Must be commutative and associative, since no delivery-order guarantee is
    /// made above the transport.
    fn merge(&self, data: &[u8]);
}

/// Registers [`State`] handlers under string keys and looks them up by key for the delegate to
/// dispatch incoming [`crate::broadcast::Part`]s to.
///
/// Per the register-before-ready contract, this is written only during setup, before the settle
/// barrier opens the ready gate; after that it is read-only, so the `RwLock` here is read-heavy
/// rather than a bottleneck.
#[derive(Clone, Default)]
pub struct StateRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn State>>>>,
}

impl StateRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `key`, overwriting any prior registration for that key.
    pub fn insert(&self, key: impl Into<String>, handler: Arc<dyn State>) {
        self.handlers
            .write()
            .expect("state registry lock poisoned")
            .insert(key.into(), handler);
    }

    /// Looks up the handler registered for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<dyn State>> {
        self.handlers.read().expect("state registry lock poisoned").get(key).cloned()
    }

    /// Serializes every registered state into `(key, bytes)` pairs, for a push/pull snapshot.
    pub fn serialize_all(&self) -> Vec<(String, Bytes)> {
        self.handlers
            .read()
            .expect("state registry lock poisoned")
            .iter()
            .map(|(key, handler)| (key.clone(), handler.serialize()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingState {
        merged: Mutex<Vec<Vec<u8>>>,
    }

    impl State for RecordingState {
        fn serialize(&self) -> Bytes {
            Bytes::from_static(b"snapshot")
        }
        fn merge(&self, data: &[u8]) {
            self.merged.lock().unwrap().push(data.to_vec());
        }
    }

    #[test]
    fn registers_and_looks_up_by_key() {
        let registry = StateRegistry::new();
        let handler = Arc::new(RecordingState { merged: Mutex::new(Vec::new()) });
        registry.insert("silences", handler.clone());

        let found = registry.get("silences").expect("handler present");
        found.merge(b"payload");
        assert_eq!(handler.merged.lock().unwrap().as_slice(), &[b"payload".to_vec()]);

        assert!(registry.get("nflog").is_none());
    }

    #[test]
    fn reregistering_a_key_overwrites() {
        let registry = StateRegistry::new();
        registry.insert("k", Arc::new(RecordingState { merged: Mutex::new(Vec::new()) }));
        let second = Arc::new(RecordingState { merged: Mutex::new(Vec::new()) });
        registry.insert("k", second.clone());

        registry.get("k").unwrap().merge(b"x");
        assert_eq!(second.merged.lock().unwrap().len(), 1);
    }
}
