//! Compiled route table shared by the concrete drivers.
//!
//! Routes are kept in registration order and matched first-to-last, so
//! collisions resolve by first-registered-wins. Literal routes may carry
//! `{name}` segments which compile to `([^/]+)` captures; pattern routes
//! compile verbatim and contribute their named capture groups as path
//! parameters. The incoming verb must equal the declared verb exactly -
//! hosts that promote HEAD from GET (or similar quirks) never reach a GET
//! callback with a HEAD request.

use std::sync::Arc;

use http::Method;
use regex::Regex;
use tracing::{debug, info};

use super::context::ParamVec;
use super::ExecuteFn;
use crate::error::DriverError;
use crate::metadata::{MethodMetadata, RoutePath};

pub struct CompiledRoute {
    pub method: Method,
    pub regex: Regex,
    /// Positional capture names for literal `{name}` segments; empty for
    /// pattern routes, which use named groups instead.
    pub param_names: Vec<Arc<str>>,
    pub meta: Arc<MethodMetadata>,
    pub execute: ExecuteFn,
}

#[derive(Default)]
pub struct RouteTable {
    routes: Vec<CompiledRoute>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn push(&mut self, meta: Arc<MethodMetadata>, execute: ExecuteFn) -> Result<(), DriverError> {
        let (regex, param_names) = compile_route(&meta.full_route)?;
        info!(
            method = %meta.method,
            route = %meta.full_route,
            controller = %meta.controller,
            action = %meta.action_name,
            "Route registered"
        );
        self.routes.push(CompiledRoute {
            method: meta.method.clone(),
            regex,
            param_names,
            meta,
            execute,
        });
        Ok(())
    }

    /// Match a request against the table; first registered route wins.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&CompiledRoute, ParamVec)> {
        for route in &self.routes {
            if route.method != *method {
                continue;
            }
            if let Some(caps) = route.regex.captures(path) {
                let mut params = ParamVec::new();
                if route.param_names.is_empty() {
                    for name in route.regex.capture_names().flatten() {
                        if let Some(m) = caps.name(name) {
                            params.push((Arc::from(name), m.as_str().to_string()));
                        }
                    }
                } else {
                    for (idx, name) in route.param_names.iter().enumerate() {
                        if let Some(m) = caps.get(idx + 1) {
                            params.push((Arc::clone(name), m.as_str().to_string()));
                        }
                    }
                }
                debug!(method = %method, path = %path, route = %route.meta.full_route, "Route matched");
                return Some((route, params));
            }
        }
        debug!(method = %method, path = %path, "No route matched");
        None
    }
}

/// Compile a resolved route into a matcher.
fn compile_route(route: &RoutePath) -> Result<(Regex, Vec<Arc<str>>), DriverError> {
    match route {
        RoutePath::Literal(path) => literal_to_regex(path),
        RoutePath::Pattern(source) => {
            let regex = Regex::new(source).map_err(|e| DriverError::InvalidRoute {
                route: source.clone(),
                reason: e.to_string(),
            })?;
            Ok((regex, Vec::new()))
        }
    }
}

/// Translate a literal route with `{name}` segments into an anchored regex
/// and the ordered parameter names.
fn literal_to_regex(path: &str) -> Result<(Regex, Vec<Arc<str>>), DriverError> {
    let mut pattern = String::with_capacity(path.len() + 8);
    pattern.push('^');
    let mut param_names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let (literal, tail) = rest.split_at(open);
        pattern.push_str(&regex::escape(literal));
        let close = tail.find('}').ok_or_else(|| DriverError::InvalidRoute {
            route: path.to_string(),
            reason: "unclosed `{` in route".to_string(),
        })?;
        let name = &tail[1..close];
        if name.is_empty() {
            return Err(DriverError::InvalidRoute {
                route: path.to_string(),
                reason: "empty parameter name".to_string(),
            });
        }
        pattern.push_str("([^/]+)");
        param_names.push(Arc::from(name));
        rest = &tail[close + 1..];
    }
    pattern.push_str(&regex::escape(rest));
    pattern.push('$');
    let regex = Regex::new(&pattern).map_err(|e| DriverError::InvalidRoute {
        route: path.to_string(),
        reason: e.to_string(),
    })?;
    Ok((regex, param_names))
}
