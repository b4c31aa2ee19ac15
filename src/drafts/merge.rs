//! Structural merge used to layer defaults, server data and drafts.

use serde_json::{Map, Value};

/// Merge `patch` over `base` without touching either input.
///
/// Objects merge key by key at any depth. Everything else in `patch`, arrays and
/// `null` included, replaces the base value wholesale. A list field carries the
/// complete edited set, so merging element-wise would make removals impossible.
pub fn deep_merge(base: &Value, patch: &Value) -> Value {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => Value::Object(merge_objects(base, patch)),
        (_, patch) => patch.clone(),
    }
}

fn merge_objects(base: &Map<String, Value>, patch: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, incoming) in patch {
        let next = match merged.get(key) {
            Some(existing) => deep_merge(existing, incoming),
            None => incoming.clone(),
        };
        merged.insert(key.clone(), next);
    }
    merged
}
