//! # Driver Module
//!
//! The framework-neutral driver contract plus one concrete driver per host
//! HTTP framework. A [`Driver`] walks the lifecycle
//! `Uninitialized → Initialized → RoutesRegistered → Serving`:
//! `initialize` wires host-level cross-cutting concerns (CORS), then the
//! executor registers every method as a route with an execute callback, and
//! `register_routes` finalizes the table before serving starts.
//!
//! Parameter extraction and success/error response shaping have default
//! implementations that operate on the framework-neutral
//! [`context::RequestContext`]/[`context::ResponseContext`] pair; concrete
//! drivers only declare which parameter sources their host can provide and
//! translate between the host's request/response primitives and the neutral
//! handles.

pub mod context;
pub mod may_http;
pub mod routes;
pub mod tiny;

use std::fmt;
use std::io::Read;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::{ActionError, DriverError};
use crate::metadata::{MethodMetadata, ParamMetadata, ParamSource, ResultPolicy};
use crate::runtime_config::GantryConfig;
use crate::transform::{transform_result, ResultTransformer};
use context::{pairs_to_object, RequestContext, ResponseBody, ResponseContext};

/// Driver lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Initialized,
    RoutesRegistered,
    Serving,
}

impl DriverState {
    pub fn as_str(self) -> &'static str {
        match self {
            DriverState::Uninitialized => "Uninitialized",
            DriverState::Initialized => "Initialized",
            DriverState::RoutesRegistered => "RoutesRegistered",
            DriverState::Serving => "Serving",
        }
    }
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one action invocation.
///
/// `Empty` models a method that produced no value, `Null` an explicit JSON
/// null - the two select different status-code policies. `Done` signals the
/// action already wrote the response itself, so shaping only advances
/// control.
pub enum Outcome {
    Done,
    Empty,
    Null,
    Json(Value),
    Binary(Vec<u8>),
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Done => f.write_str("Done"),
            Outcome::Empty => f.write_str("Empty"),
            Outcome::Null => f.write_str("Null"),
            Outcome::Json(v) => f.debug_tuple("Json").field(v).finish(),
            Outcome::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
            Outcome::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Per-route callback installed by the executor; invoked by the driver with
/// the framework-neutral handles for each matching request.
pub type ExecuteFn = Arc<dyn Fn(&RequestContext, &mut ResponseContext) + Send + Sync>;

/// Framework-neutral driver lifecycle.
///
/// Route registration uses interior mutability so a driver can be shared as
/// `Arc<dyn Driver>` between the executor and the execute callbacks it
/// installs.
pub trait Driver: Send + Sync {
    fn name(&self) -> &'static str;

    /// The configuration injected at construction.
    fn config(&self) -> &GantryConfig;

    /// The structured-to-plain transform collaborator.
    fn transformer(&self) -> &dyn ResultTransformer;

    fn state(&self) -> DriverState;

    /// Wire framework-level cross-cutting middleware onto the host app.
    /// Called once, before any route registration. Fails fatally with
    /// `MissingDependency` when the configuration requires a capability the
    /// host cannot provide.
    fn initialize(&self) -> Result<(), DriverError>;

    /// Bind one route (verb + path/pattern) so that matching requests invoke
    /// `execute` with the neutral handles. Must not invoke the controller
    /// method directly.
    fn register_method(
        &self,
        meta: Arc<MethodMetadata>,
        execute: ExecuteFn,
    ) -> Result<(), DriverError>;

    /// Finalize route installation on the host app. Called exactly once,
    /// after all `register_method` calls.
    fn register_routes(&self) -> Result<(), DriverError>;

    /// Which parameter sources this driver's host can provide.
    fn supports_source(&self, _source: ParamSource) -> bool {
        true
    }

    /// Pure extraction of one declared parameter from the live request;
    /// `None` when absent. Unsupported source kinds fail with
    /// `UnsupportedFeature` naming the feature and the driver.
    fn param_from_request(
        &self,
        req: &RequestContext,
        param: &ParamMetadata,
    ) -> Result<Option<Value>, DriverError> {
        if !self.supports_source(param.source) {
            return Err(DriverError::UnsupportedFeature {
                feature: param.source.to_string(),
                driver: self.name(),
            });
        }
        Ok(extract_param(req, param))
    }

    /// Shape a successful outcome into the response. Every path advances
    /// control exactly once.
    fn handle_success(&self, outcome: Outcome, meta: &MethodMetadata, res: &mut ResponseContext) {
        // The action wrote the response itself - advance and touch nothing.
        if matches!(outcome, Outcome::Done) || res.is_committed() {
            res.advance();
            return;
        }

        let outcome = transform_result(outcome, meta, self.config(), self.transformer());

        match &outcome {
            Outcome::Empty => match &meta.on_undefined {
                Some(ResultPolicy::Raise(constructor)) => {
                    self.handle_error(ActionError::Http(constructor()), Some(meta), res);
                    return;
                }
                Some(ResultPolicy::Status(code)) => res.set_status(*code),
                None => {}
            },
            Outcome::Null => match &meta.on_null {
                Some(ResultPolicy::Raise(constructor)) => {
                    self.handle_error(ActionError::Http(constructor()), Some(meta), res);
                    return;
                }
                Some(ResultPolicy::Status(code)) => res.set_status(*code),
                // Bare "no content" when no policy is declared.
                None => res.set_status(204),
            },
            _ => {
                if let Some(code) = meta.success_status {
                    res.set_status(code);
                }
            }
        }

        // A defaulted 204 must not carry content (RFC 9110 §6.3.5).
        let outcome = if meta.on_null.is_none() && matches!(outcome, Outcome::Null) {
            Outcome::Empty
        } else {
            outcome
        };

        for (name, value) in &meta.headers {
            res.set_header(name, value.clone());
        }

        match outcome {
            Outcome::Binary(bytes) => res.set_body(ResponseBody::Binary(bytes)),
            Outcome::Stream(stream) => res.set_body(ResponseBody::Stream(stream)),
            Outcome::Json(value) => res.set_body(ResponseBody::Json(value)),
            Outcome::Null => res.set_body(ResponseBody::Json(Value::Null)),
            Outcome::Empty | Outcome::Done => {}
        }

        res.advance();
    }

    /// Translate an error into the response. With the default error handler
    /// enabled the client receives a structured envelope; otherwise the
    /// error is forwarded to the host framework's own error chain. Never
    /// propagates a failure itself.
    fn handle_error(
        &self,
        err: ActionError,
        meta: Option<&MethodMetadata>,
        res: &mut ResponseContext,
    ) {
        warn!(error = %err, error_name = err.name(), "Handling action error");
        if self.config().default_error_handler {
            res.set_status(err.http_status().unwrap_or(500));
            if let Some(meta) = meta {
                for (name, value) in &meta.headers {
                    res.set_header(name, value.clone());
                }
            }
            let envelope = crate::error::process_json_error(&err, self.config());
            res.set_body(ResponseBody::Json(envelope));
            res.advance();
        } else {
            res.forward(err);
            res.advance();
        }
    }
}

/// Framework-neutral extraction of one parameter from the parsed request.
pub(crate) fn extract_param(req: &RequestContext, param: &ParamMetadata) -> Option<Value> {
    let name = param.name.as_deref();
    match param.source {
        ParamSource::Body => req.body.clone(),
        ParamSource::BodyField => req
            .body
            .as_ref()
            .and_then(|b| b.get(name?))
            .cloned(),
        ParamSource::RouteParam => req
            .get_path_param(name?)
            .map(|v| Value::String(v.to_string())),
        ParamSource::RouteParams => Some(pairs_to_object(&req.path_params)),
        ParamSource::QueryValue => req
            .get_query_param(name?)
            .map(|v| Value::String(v.to_string())),
        ParamSource::Query => Some(pairs_to_object(&req.query_params)),
        ParamSource::HeaderValue => req
            .get_header(name?)
            .map(|v| Value::String(v.to_string())),
        ParamSource::Headers => Some(pairs_to_object(&req.headers)),
        ParamSource::CookieValue => req
            .get_cookie(name?)
            .map(|v| Value::String(v.to_string())),
        ParamSource::Cookies => Some(pairs_to_object(&req.cookies)),
        ParamSource::SessionValue => req.session.as_ref()?.get(name?).cloned(),
        ParamSource::Session => req.session.as_ref().map(|session| {
            let map: Map<String, Value> =
                session.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Value::Object(map)
        }),
        ParamSource::StateValue => req.state.as_ref()?.get(name?).cloned(),
        ParamSource::State => req.state.as_ref().map(|state| {
            let map: Map<String, Value> =
                state.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            Value::Object(map)
        }),
        // No framework-neutral representation; drivers without multipart
        // support report these as unsupported before reaching here.
        ParamSource::File | ParamSource::Files => None,
    }
}
