//! Shallow conflict merge.

use serde_json::Value;

/// Field-level merge of two JSON documents: every top-level server field
/// is kept unless the local document also sets it, in which case the local
/// value wins. No recursion and no semantic reconciliation.
///
/// When either side is not a JSON object the local document is returned
/// unchanged, matching the "local fields take precedence" contract.
pub fn shallow_merge(local: &Value, server: &Value) -> Value {
    match (local, server) {
        (Value::Object(local_map), Value::Object(server_map)) => {
            let mut merged = server_map.clone();
            for (key, value) in local_map {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        _ => local.clone(),
    }
}
