//! Method metadata - the registered unit of dispatch.
//!
//! `MethodMetadata` resolves one method's full route, applied headers,
//! status-code policy and transform options by merging method-level
//! directives with the process-wide defaults. All derived fields are
//! computed by [`MethodMetadata::build`], which recomputes from scratch and
//! is therefore idempotent; nothing else mutates them after construction.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use http::Method;
use serde_json::Value;

use super::param::ParamMetadata;
use super::response::{ResponseDirective, ResultPolicy};
use crate::driver::context::{RequestContext, ResponseContext};
use crate::driver::Outcome;
use crate::error::ActionError;
use crate::runtime_config::GantryConfig;
use crate::transform::TransformOptions;

/// The controller action invoked per matched request.
///
/// Receives the framework-neutral request handle, the response handle (so an
/// action may write the response itself and return [`Outcome::Done`]) and the
/// extracted parameter values in declaration order (`None` = absent).
pub type ActionFn = Arc<
    dyn Fn(&RequestContext, &mut ResponseContext, Vec<Option<Value>>) -> Result<Outcome, ActionError>
        + Send
        + Sync,
>;

/// A route fragment: either a literal path (which may carry `{name}`
/// segments) or a regex pattern source. Flags such as case-insensitivity
/// travel inline in the pattern source (`(?i)...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutePath {
    Literal(String),
    Pattern(String),
}

impl RoutePath {
    pub fn literal(path: impl Into<String>) -> Self {
        RoutePath::Literal(path.into())
    }

    pub fn pattern(source: impl Into<String>) -> Self {
        RoutePath::Pattern(source.into())
    }

    pub fn is_pattern(&self) -> bool {
        matches!(self, RoutePath::Pattern(_))
    }

    pub fn as_str(&self) -> &str {
        match self {
            RoutePath::Literal(s) | RoutePath::Pattern(s) => s,
        }
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata for one registered method: verb, route fragment, declared
/// parameters, the action closure and the derived response policy.
#[derive(Clone)]
pub struct MethodMetadata {
    /// Lookup key of the owning controller (non-owning back-reference).
    pub controller: Arc<str>,
    /// Name of the target method, for logging and registration.
    pub action_name: String,
    pub method: Method,
    /// Route fragment as declared on the method.
    pub route: RoutePath,
    /// Declaration-ordered parameter descriptors.
    pub params: Vec<ParamMetadata>,
    pub action: ActionFn,

    // Derived by build(); never set directly.
    pub full_route: RoutePath,
    pub transform_options: Option<TransformOptions>,
    pub on_undefined: Option<ResultPolicy>,
    pub on_null: Option<ResultPolicy>,
    pub success_status: Option<u16>,
    pub headers: HashMap<String, String>,
}

impl fmt::Debug for MethodMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodMetadata")
            .field("controller", &self.controller)
            .field("action_name", &self.action_name)
            .field("method", &self.method)
            .field("route", &self.route)
            .field("params", &self.params)
            .field("full_route", &self.full_route)
            .field("transform_options", &self.transform_options)
            .field("on_undefined", &self.on_undefined)
            .field("on_null", &self.on_null)
            .field("success_status", &self.success_status)
            .field("headers", &self.headers)
            .finish()
    }
}

impl MethodMetadata {
    pub fn new(
        controller: Arc<str>,
        action_name: impl Into<String>,
        method: Method,
        route: RoutePath,
        params: Vec<ParamMetadata>,
        action: ActionFn,
    ) -> Self {
        let full_route = route.clone();
        Self {
            controller,
            action_name: action_name.into(),
            method,
            route,
            params,
            action,
            full_route,
            transform_options: None,
            on_undefined: None,
            on_null: None,
            success_status: None,
            headers: HashMap::new(),
        }
    }

    /// Resolve all derived fields from the method's directives and the
    /// process-wide defaults.
    ///
    /// Single-valued directive kinds take the first declaration; `Header`
    /// directives accumulate with later declarations for the same name
    /// overwriting earlier ones. A content-type directive materializes as a
    /// `Content-type` header entry with exactly that casing. Recomputes from
    /// scratch, so calling it twice with the same input yields identical
    /// results.
    pub fn build(
        &mut self,
        base_route: &str,
        directives: &[ResponseDirective],
        defaults: &GantryConfig,
    ) {
        self.transform_options = directives
            .iter()
            .find_map(|d| match d {
                ResponseDirective::TransformOptions(opts) => Some(opts.clone()),
                _ => None,
            });

        self.on_undefined = directives
            .iter()
            .find_map(|d| match d {
                ResponseDirective::OnUndefined(policy) => Some(policy.clone()),
                _ => None,
            })
            .or_else(|| defaults.undefined_result_code.map(ResultPolicy::Status));

        self.on_null = directives
            .iter()
            .find_map(|d| match d {
                ResponseDirective::OnNull(policy) => Some(policy.clone()),
                _ => None,
            })
            .or_else(|| defaults.null_result_code.map(ResultPolicy::Status));

        // No process-wide default for the success code.
        self.success_status = directives.iter().find_map(|d| match d {
            ResponseDirective::SuccessCode(code) => Some(*code),
            _ => None,
        });

        let mut headers = HashMap::new();
        for directive in directives {
            match directive {
                ResponseDirective::ContentType(ct) => {
                    headers.insert("Content-type".to_string(), ct.clone());
                }
                ResponseDirective::Header { name, value } => {
                    headers.insert(name.clone(), value.clone());
                }
                _ => {}
            }
        }
        self.headers = headers;

        self.full_route = append_base_route(base_route, &self.route);
    }
}

/// Compose a controller base prefix with a method route fragment.
///
/// Literal fragments concatenate verbatim - no separator injection, no
/// trailing-slash normalization. A pattern fragment with an empty base is
/// returned unchanged. A pattern fragment with a non-empty base is re-anchored
/// to the full request path: leading inline flags are hoisted to the front,
/// the fragment's own `^` is stripped, one trailing unescaped `$` is stripped
/// (so composition never doubles the end anchor) and `?$` is appended.
pub fn append_base_route(base: &str, fragment: &RoutePath) -> RoutePath {
    match fragment {
        RoutePath::Literal(path) => RoutePath::Literal(format!("{base}{path}")),
        RoutePath::Pattern(source) => {
            if base.is_empty() {
                return fragment.clone();
            }
            let (flags, rest) = split_inline_flags(source);
            let rest = rest.strip_prefix('^').unwrap_or(rest);
            let rest = strip_trailing_anchor(rest);
            RoutePath::Pattern(format!("{flags}^{base}{rest}?$"))
        }
    }
}

/// Split a leading inline flag group (`(?i)`, `(?is)`, ...) off a pattern
/// source, so it can be hoisted in front of a new `^` anchor.
fn split_inline_flags(source: &str) -> (&str, &str) {
    if let Some(rest) = source.strip_prefix("(?") {
        if let Some(close) = rest.find(')') {
            let flags = &rest[..close];
            if !flags.is_empty() && flags.chars().all(|c| "imsxuU-".contains(c)) {
                let split_at = 2 + close + 1;
                return (&source[..split_at], &source[split_at..]);
            }
        }
    }
    ("", source)
}

/// Strip one trailing `$` unless it is escaped.
fn strip_trailing_anchor(source: &str) -> &str {
    if let Some(stripped) = source.strip_suffix('$') {
        let trailing_backslashes = stripped.chars().rev().take_while(|c| *c == '\\').count();
        if trailing_backslashes % 2 == 0 {
            return stripped;
        }
    }
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_concatenation_injects_no_separator() {
        let composed = append_base_route("math", &RoutePath::literal("add"));
        assert_eq!(composed, RoutePath::Literal("mathadd".to_string()));
        let composed = append_base_route("math", &RoutePath::literal("/add"));
        assert_eq!(composed, RoutePath::Literal("math/add".to_string()));
    }

    #[test]
    fn test_pattern_with_empty_base_is_identity() {
        let fragment = RoutePath::pattern(r"^/items/\d+$");
        assert_eq!(append_base_route("", &fragment), fragment);
    }

    #[test]
    fn test_pattern_composition_anchors_and_hoists_flags() {
        let composed = append_base_route("/math", &RoutePath::pattern(r"(?i)^/Add$"));
        assert_eq!(
            composed,
            RoutePath::Pattern(r"(?i)^/math/Add?$".to_string())
        );
    }

    #[test]
    fn test_pattern_composition_keeps_escaped_dollar() {
        let composed = append_base_route("/m", &RoutePath::pattern(r"^/price\$"));
        assert_eq!(composed, RoutePath::Pattern(r"^/m/price\$?$".to_string()));
    }
}
