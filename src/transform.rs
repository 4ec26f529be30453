//! Result transformation contract.
//!
//! Serialization of structured handler results is delegated to an external
//! collaborator through [`ResultTransformer`]; the crate ships
//! [`PlainTransformer`] as the default implementation. [`transform_result`]
//! applies the skip rules: transformation only touches structured JSON
//! results - nullish, binary and stream-like outcomes pass through untouched
//! so the driver can write them directly.

use serde_json::Value;

use crate::driver::Outcome;
use crate::metadata::MethodMetadata;
use crate::runtime_config::GantryConfig;

/// Options controlling the structured-to-plain transform.
///
/// Method-level options (declared via a transform directive) take precedence
/// over the process-wide defaults in [`GantryConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformOptions {
    /// Top-level and nested object keys removed from the result.
    pub exclude: Vec<String>,
    /// Drop keys whose value is `null`.
    pub strip_nulls: bool,
}

impl TransformOptions {
    pub fn exclude(keys: &[&str]) -> Self {
        Self {
            exclude: keys.iter().map(|k| (*k).to_string()).collect(),
            strip_nulls: false,
        }
    }

    pub fn with_strip_nulls(mut self) -> Self {
        self.strip_nulls = true;
        self
    }
}

/// The structured-to-plain transform seam.
///
/// Implementations must be pure with respect to shared state; the same
/// transformer instance is used by every in-flight request.
pub trait ResultTransformer: Send + Sync {
    fn transform(&self, value: Value, options: &TransformOptions) -> Value;
}

/// Default transformer: applies `exclude` and `strip_nulls` recursively to
/// objects and to objects nested in arrays.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTransformer;

impl ResultTransformer for PlainTransformer {
    fn transform(&self, value: Value, options: &TransformOptions) -> Value {
        match value {
            Value::Object(map) => {
                let transformed = map
                    .into_iter()
                    .filter(|(k, _)| !options.exclude.iter().any(|e| e == k))
                    .filter(|(_, v)| !(options.strip_nulls && v.is_null()))
                    .map(|(k, v)| (k, self.transform(v, options)))
                    .collect();
                Value::Object(transformed)
            }
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|v| self.transform(v, options))
                    .collect(),
            ),
            other => other,
        }
    }
}

/// Apply the configured transform to a successful outcome.
///
/// Skipped entirely when transformation is disabled or the outcome is not a
/// structured JSON value; binary and stream results are passed through for
/// direct writing.
pub fn transform_result(
    outcome: Outcome,
    method: &MethodMetadata,
    config: &GantryConfig,
    transformer: &dyn ResultTransformer,
) -> Outcome {
    if !config.transform_enabled {
        return outcome;
    }
    match outcome {
        Outcome::Json(value @ (Value::Object(_) | Value::Array(_))) => {
            let options = method
                .transform_options
                .as_ref()
                .unwrap_or(&config.default_transform);
            Outcome::Json(transformer.transform(value, options))
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exclude_keys() {
        let opts = TransformOptions::exclude(&["secret"]);
        let out = PlainTransformer.transform(json!({"a": 1, "secret": "x"}), &opts);
        assert_eq!(out, json!({"a": 1}));
    }

    #[test]
    fn test_strip_nulls_recurses_into_arrays() {
        let opts = TransformOptions::default().with_strip_nulls();
        let out = PlainTransformer.transform(json!([{"a": 1, "b": null}]), &opts);
        assert_eq!(out, json!([{"a": 1}]));
    }
}
