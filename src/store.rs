//! Mock definition store.
//!
//! Keys definitions by method, url and serialized header requirements so
//! re-registrations overwrite while header-gated variants of the same route
//! coexist. Iteration order is insertion order, which doubles as dispatch
//! priority.

use crate::definition::MockDefinition;
use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

/// Derived identity of a mock definition, used to detect duplicate
/// registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MatchKey(String);

impl MatchKey {
    /// Derive the key for a definition: `METHOD_url`, plus the canonical
    /// serialization of the header requirements when any are present. The
    /// requirement map is ordered, so equal sets always serialize equally.
    pub fn derive(def: &MockDefinition) -> Self {
        let mut key = format!("{}_{}", def.request.method, def.request.url);
        if let Some(headers) = def.request.header_requirements() {
            key.push('_');
            key.push_str(
                &serde_json::to_string(headers).expect("string map serializes to JSON"),
            );
        }
        MatchKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

struct StoredEntry {
    key: MatchKey,
    definition: MockDefinition,
}

#[derive(Default)]
struct Inner {
    /// Entries in insertion order; the order is the dispatch priority.
    entries: Vec<StoredEntry>,
    /// Position of each key in `entries`, for O(1) exact lookup.
    index: HashMap<MatchKey, usize>,
}

/// In-memory registry of mock definitions.
///
/// Shared behind an `Arc` by the loader, the registration endpoint and the
/// dispatcher; a single lock keeps inserts atomic with respect to concurrent
/// scans.
#[derive(Default)]
pub struct MockStore {
    inner: RwLock<Inner>,
}

impl MockStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, overwriting any entry with the same key.
    ///
    /// An overwritten entry keeps its original position, so re-registering a
    /// definition does not demote its dispatch priority.
    pub fn insert(&self, definition: MockDefinition) -> MatchKey {
        let key = MatchKey::derive(&definition);
        let mut guard = self.inner.write().expect("lock poisoned");
        let inner = &mut *guard;
        if let Some(&pos) = inner.index.get(&key) {
            inner.entries[pos].definition = definition;
        } else {
            inner.index.insert(key.clone(), inner.entries.len());
            inner.entries.push(StoredEntry {
                key: key.clone(),
                definition,
            });
        }
        key
    }

    /// Exact-key retrieval.
    pub fn get(&self, key: &MatchKey) -> Option<MockDefinition> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .index
            .get(key)
            .map(|&pos| inner.entries[pos].definition.clone())
    }

    /// First definition, in insertion order, satisfying the predicate.
    ///
    /// The scan runs under the read lock so a concurrent insert is either
    /// fully visible or not visible at all.
    pub fn find<F>(&self, mut pred: F) -> Option<MockDefinition>
    where
        F: FnMut(&MockDefinition) -> bool,
    {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .entries
            .iter()
            .find(|entry| pred(&entry.definition))
            .map(|entry| entry.definition.clone())
    }

    /// All stored entries in insertion order.
    pub fn snapshot(&self) -> Vec<(MatchKey, MockDefinition)> {
        let inner = self.inner.read().expect("lock poisoned");
        inner
            .entries
            .iter()
            .map(|entry| (entry.key.clone(), entry.definition.clone()))
            .collect()
    }

    /// Number of stored definitions.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all definitions. Used by test harnesses.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("lock poisoned");
        inner.entries.clear();
        inner.index.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(method: &str, url: &str, headers: &[(&str, &str)], marker: &str) -> MockDefinition {
        let headers: serde_json::Map<String, serde_json::Value> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        let mut request = serde_json::json!({ "method": method, "url": url });
        if !headers.is_empty() {
            request["headers"] = serde_json::Value::Object(headers);
        }
        serde_json::from_value(serde_json::json!({
            "request": request,
            "response": { "status": 200, "body": { "marker": marker } }
        }))
        .unwrap()
    }

    #[test]
    fn test_key_without_headers() {
        let def = definition("GET", "/api/users", &[], "a");
        assert_eq!(MatchKey::derive(&def).as_str(), "GET_/api/users");
    }

    #[test]
    fn test_key_includes_serialized_headers() {
        let def = definition("GET", "/api/users", &[("X-Env", "staging")], "a");
        assert_eq!(
            MatchKey::derive(&def).as_str(),
            r#"GET_/api/users_{"X-Env":"staging"}"#
        );
    }

    #[test]
    fn test_key_is_order_stable() {
        let a = definition("GET", "/x", &[("A", "1"), ("B", "2")], "a");
        let b = definition("GET", "/x", &[("B", "2"), ("A", "1")], "b");
        assert_eq!(MatchKey::derive(&a), MatchKey::derive(&b));
    }

    #[test]
    fn test_insert_overwrites_equal_key() {
        let store = MockStore::new();
        let first = definition("GET", "/api/users", &[], "first");
        let second = definition("GET", "/api/users", &[], "second");

        let key = store.insert(first);
        store.insert(second.clone());

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&key), Some(second));
    }

    #[test]
    fn test_header_variants_coexist() {
        let store = MockStore::new();
        store.insert(definition("GET", "/api/users", &[], "plain"));
        store.insert(definition("GET", "/api/users", &[("X-Env", "staging")], "gated"));

        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let store = MockStore::new();
        store.insert(definition("GET", "/a", &[], "a1"));
        store.insert(definition("GET", "/b", &[], "b"));
        store.insert(definition("GET", "/a", &[], "a2"));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].0.as_str(), "GET_/a");
        assert_eq!(snapshot[1].0.as_str(), "GET_/b");
        assert_eq!(
            snapshot[0].1.response.body,
            definition("GET", "/a", &[], "a2").response.body
        );
    }

    #[test]
    fn test_find_scans_in_insertion_order() {
        let store = MockStore::new();
        store.insert(definition("GET", "/x", &[("V", "1")], "v1"));
        store.insert(definition("GET", "/x", &[("V", "2")], "v2"));

        let found = store.find(|def| def.request.url == "/x").unwrap();
        assert_eq!(found, definition("GET", "/x", &[("V", "1")], "v1"));
    }

    #[test]
    fn test_clear() {
        let store = MockStore::new();
        store.insert(definition("GET", "/x", &[], "a"));
        assert!(!store.is_empty());
        store.clear();
        assert!(store.is_empty());
        assert!(store.find(|_| true).is_none());
    }
}
