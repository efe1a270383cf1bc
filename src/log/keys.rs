//! Partition keys and metadata headers.
//!
//! Keys decide partition placement, so every message of one run (or trace)
//! lands on the same partition and keeps its order.

use crate::model::EventKind;

pub const NAMESPACE_HEADER: &str = "namespace";
pub const EVENT_TYPE_HEADER: &str = "event_type";

/// `namespace:id`, `namespace`, `id`, or no key, depending on what is known.
pub fn message_key(namespace: Option<&str>, correlation_id: Option<&str>) -> Option<String> {
    match (namespace, correlation_id) {
        (Some(ns), Some(id)) => Some(format!("{}:{}", ns, id)),
        (Some(ns), None) => Some(ns.to_string()),
        (None, Some(id)) => Some(id.to_string()),
        (None, None) => None,
    }
}

/// Headers attached when the namespace is known; none otherwise.
pub fn message_headers(namespace: Option<&str>, kind: EventKind) -> Vec<(String, String)> {
    match namespace {
        Some(ns) => vec![
            (NAMESPACE_HEADER.to_string(), ns.to_string()),
            (EVENT_TYPE_HEADER.to_string(), kind.as_str().to_string()),
        ],
        None => Vec::new(),
    }
}

/// Namespace encoded in a `namespace:id` key. Keys without a colon carry none.
pub fn namespace_from_key(key: &str) -> Option<&str> {
    key.split_once(':').map(|(ns, _)| ns)
}
