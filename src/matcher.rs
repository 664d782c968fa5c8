//! Request matching logic.
//!
//! Matches incoming requests against stored mock definitions.

use crate::definition::MockDefinition;
use crate::store::MockStore;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// The inbound request as seen by the matching engine: method, path and
/// observed headers. Built by the HTTP boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    /// HTTP method
    pub method: String,
    /// Request path, without query string
    pub path: String,
    /// Observed request headers
    pub headers: HashMap<String, String>,
}

/// Outcome of dispatching a request against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A stored definition matched; its response should be replayed.
    Matched(MockDefinition),
    /// Nothing matched. Carries the original descriptor so the boundary can
    /// render a diagnostic payload.
    NotFound(RequestDescriptor),
}

/// Check whether observed request headers satisfy a set of required headers.
///
/// Header names are compared case-insensitively, values must be exactly
/// equal. Headers the request carries beyond the required set are ignored,
/// and an absent or empty requirement set matches anything.
pub fn headers_satisfy(
    observed: &HashMap<String, String>,
    required: Option<&BTreeMap<String, String>>,
) -> bool {
    let required = match required {
        None => return true,
        Some(r) if r.is_empty() => return true,
        Some(r) => r,
    };

    required.iter().all(|(name, value)| {
        observed
            .iter()
            .find(|(k, _)| k.to_lowercase() == name.to_lowercase())
            .map(|(_, v)| v)
            == Some(value)
    })
}

/// Resolves inbound requests to stored mock definitions.
pub struct Dispatcher {
    store: Arc<MockStore>,
}

impl Dispatcher {
    /// Create a dispatcher over the given store.
    pub fn new(store: Arc<MockStore>) -> Self {
        Self { store }
    }

    /// Find the first definition, in insertion order, matching the request.
    ///
    /// Method and path must be exactly equal. A definition with header
    /// requirements matches only when the request satisfies them; one
    /// without matches unconditionally. A failed header gate does not end
    /// the scan, so a request lacking special headers can still reach a
    /// later header-less fallback for the same route.
    pub fn dispatch(&self, request: RequestDescriptor) -> Dispatch {
        let found = self.store.find(|def| {
            if def.request.method != request.method || def.request.url != request.path {
                return false;
            }
            headers_satisfy(&request.headers, def.request.header_requirements())
        });

        match found {
            Some(def) => Dispatch::Matched(def),
            None => Dispatch::NotFound(request),
        }
    }
}
