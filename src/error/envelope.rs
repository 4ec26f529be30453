use serde_json::{json, Map, Value};
use tracing::debug;

use super::ActionError;
use crate::runtime_config::GantryConfig;

/// Protocol code for plain-string errors ("internal error").
pub const INTERNAL_ERROR_CODE: i64 = -32603;
/// Protocol code for unclassified errors ("server error").
pub const SERVER_ERROR_CODE: i64 = -32000;

/// Own properties that never leak into the envelope's data section.
const RESERVED_PROPS: [&str; 4] = ["stack", "name", "message", "httpCode"];

/// Normalize an error into a plain, serializable envelope.
///
/// Precedence: an error exposing its own serialization is used verbatim.
/// Otherwise the error is classified - a domain error contributes its
/// protocol code, a plain-string error becomes a generic internal error,
/// anything else a generic server error. Own properties outside the reserved
/// set are copied into `data`, `message` is included when present and the
/// stack trace only in development mode. An override mapping keyed by the
/// classified error name is deep-merged on top.
///
/// This is the single place failures become client-visible bodies; it never
/// panics - any failure while building the envelope degrades to a bare
/// server-error envelope.
pub fn process_json_error(err: &ActionError, config: &GantryConfig) -> Value {
    if let Some(own) = err.own_json() {
        return own.clone();
    }

    let code = match err {
        ActionError::Http(e) => e.code.unwrap_or(SERVER_ERROR_CODE),
        ActionError::Message(_) => INTERNAL_ERROR_CODE,
        ActionError::Custom { .. } => SERVER_ERROR_CODE,
    };

    let mut envelope = Map::new();
    envelope.insert("code".to_string(), json!(code));

    if let Some(message) = err.message() {
        envelope.insert("message".to_string(), json!(message));
    }

    let own_props = match err {
        ActionError::Http(e) => Some(&e.data),
        ActionError::Custom { data, .. } => Some(data),
        ActionError::Message(_) => None,
    };
    if let Some(props) = own_props {
        let data: Map<String, Value> = props
            .iter()
            .filter(|(k, _)| !RESERVED_PROPS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !data.is_empty() {
            envelope.insert("data".to_string(), Value::Object(data));
        }
    }

    if config.development {
        let stack = match err {
            ActionError::Http(e) => e.stack.clone(),
            ActionError::Custom { stack, .. } => stack.clone(),
            ActionError::Message(_) => None,
        };
        if let Some(stack) = stack {
            envelope.insert("stack".to_string(), json!(stack));
        }
    }

    let mut envelope = Value::Object(envelope);
    if let Some(overrides) = config.error_overrides.get(err.name()) {
        debug!(error_name = err.name(), "Applying error envelope override");
        deep_merge(&mut envelope, overrides);
    }
    envelope
}

/// Recursively merge `overlay` into `base`.
///
/// Matching object-valued keys merge recursively; for everything else the
/// overlay wins, including scalar conflicts. Keys only present in `base`
/// survive untouched.
pub fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}
