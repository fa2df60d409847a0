//! Capability declarations and negotiation.
//!
//! Capabilities are open-shaped nested objects: neither side needs to know
//! the full schema of the other's declaration to combine or inspect them.

use serde::{Deserialize, Serialize};
use serde_json::map::Entry;
use serde_json::{Map, Value};

use crate::error::Error;

/// A nested capability declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(pub Map<String, Value>);

impl Capabilities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a dotted capability path is declared and not explicitly
    /// disabled (`false` or `null`).
    pub fn supports(&self, path: &str) -> bool {
        let mut current = Value::Object(self.0.clone());
        for segment in path.split('.') {
            match current.get(segment) {
                Some(value) => current = value.clone(),
                None => return false,
            }
        }
        !matches!(current, Value::Bool(false) | Value::Null)
    }

    pub fn merge(&self, additional: &Capabilities) -> Capabilities {
        merge_capabilities(self, additional)
    }
}

impl From<Value> for Capabilities {
    fn from(value: Value) -> Self {
        match value {
            Value::Object(map) => Capabilities(map),
            _ => Capabilities::new(),
        }
    }
}

/// Deep-merges two capability declarations: objects merge recursively by
/// key, anything else overwrites.
pub fn merge_capabilities(base: &Capabilities, additional: &Capabilities) -> Capabilities {
    let mut merged = base.0.clone();
    merge_objects(&mut merged, &additional.0);
    Capabilities(merged)
}

fn merge_objects(base: &mut Map<String, Value>, additional: &Map<String, Value>) {
    for (key, value) in additional {
        match base.entry(key.clone()) {
            Entry::Occupied(mut slot) => match (slot.get_mut(), value) {
                (Value::Object(existing), Value::Object(incoming)) => {
                    merge_objects(existing, incoming);
                }
                (slot_value, value) => *slot_value = value.clone(),
            },
            Entry::Vacant(slot) => {
                slot.insert(value.clone());
            }
        }
    }
}

/// Capability checks applied by the engine before traffic leaves or
/// handlers are installed.
///
/// The default implementation permits everything; protocol layers with a
/// concrete capability model implement the mapping from method names to
/// declared capabilities.
pub trait CapabilityPolicy {
    /// May this side send a request with the given method? Consulted only
    /// when strict capability enforcement is enabled.
    fn assert_capability_for_method(&self, _method: &str) -> Result<(), Error> {
        Ok(())
    }

    /// May this side emit a notification with the given method?
    fn assert_notification_capability(&self, _method: &str) -> Result<(), Error> {
        Ok(())
    }

    /// May this side install a request handler for the given method?
    fn assert_request_handler_capability(&self, _method: &str) -> Result<(), Error> {
        Ok(())
    }
}

/// The permissive default policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl CapabilityPolicy for AllowAll {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn caps(value: Value) -> Capabilities {
        Capabilities::from(value)
    }

    #[test]
    fn merges_nested_objects_by_key() {
        let merged = merge_capabilities(
            &caps(json!({ "a": { "x": 1 } })),
            &caps(json!({ "a": { "y": 2 }, "b": true })),
        );
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({ "a": { "x": 1, "y": 2 }, "b": true })
        );
    }

    #[test]
    fn non_objects_overwrite() {
        let merged = merge_capabilities(
            &caps(json!({ "a": { "x": 1 }, "b": true })),
            &caps(json!({ "a": false, "b": { "y": 2 } })),
        );
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({ "a": false, "b": { "y": 2 } })
        );
    }

    #[test]
    fn merge_recurses_below_the_first_level() {
        let merged = merge_capabilities(
            &caps(json!({ "tools": { "call": { "streaming": true } } })),
            &caps(json!({ "tools": { "call": { "batched": true } } })),
        );
        assert_eq!(
            serde_json::to_value(&merged).unwrap(),
            json!({ "tools": { "call": { "streaming": true, "batched": true } } })
        );
    }

    #[test]
    fn supports_walks_dotted_paths() {
        let capabilities = caps(json!({
            "roots": { "listChanged": true },
            "sampling": {},
            "experimental": false
        }));
        assert!(capabilities.supports("roots"));
        assert!(capabilities.supports("roots.listChanged"));
        assert!(capabilities.supports("sampling"));
        assert!(!capabilities.supports("experimental"));
        assert!(!capabilities.supports("prompts"));
    }
}
