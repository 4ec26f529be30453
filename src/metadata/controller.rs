//! Controller metadata and the fluent registration API.
//!
//! Controllers are registered explicitly through [`ControllerBuilder`] and
//! [`MethodBuilder`] instead of runtime reflection: callers declare the base
//! route, then each method's verb, route fragment, parameters and response
//! directives, and attach the action closure. Controller instances are
//! captured inside the action closures at registration time, so there is no
//! separate resolver.

use std::sync::Arc;

use http::Method;

use super::method::{ActionFn, MethodMetadata, RoutePath};
use super::param::ParamMetadata;
use super::response::{ResponseDirective, ResultPolicy};
use crate::runtime_config::GantryConfig;
use crate::transform::TransformOptions;

/// Groups a controller's methods under a shared base route.
///
/// Owns its methods exclusively; method order is declaration order, and route
/// collisions are left to the host's first-match-wins route table.
#[derive(Debug, Clone)]
pub struct ControllerMetadata {
    pub name: Arc<str>,
    pub base_route: String,
    pub methods: Vec<MethodMetadata>,
}

/// Fluent builder for one controller.
pub struct ControllerBuilder {
    name: Arc<str>,
    base_route: String,
    methods: Vec<PendingMethod>,
}

struct PendingMethod {
    meta: MethodMetadata,
    directives: Vec<ResponseDirective>,
}

impl ControllerBuilder {
    pub fn new(name: impl Into<String>, base_route: impl Into<String>) -> Self {
        Self {
            name: Arc::from(name.into()),
            base_route: base_route.into(),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.methods.push(method.into_pending(Arc::clone(&self.name)));
        self
    }

    /// Resolve every method against the process-wide defaults and produce
    /// the finished metadata. `build()` runs once per method, after all its
    /// directives are known.
    pub fn build(self, defaults: &GantryConfig) -> ControllerMetadata {
        let base_route = self.base_route;
        let methods = self
            .methods
            .into_iter()
            .map(|mut pending| {
                pending
                    .meta
                    .build(&base_route, &pending.directives, defaults);
                pending.meta
            })
            .collect();
        ControllerMetadata {
            name: self.name,
            base_route,
            methods,
        }
    }
}

/// Fluent builder for one method: verb + route + parameters + directives +
/// action.
pub struct MethodBuilder {
    action_name: String,
    method: Method,
    route: RoutePath,
    params: Vec<ParamMetadata>,
    directives: Vec<ResponseDirective>,
    action: Option<ActionFn>,
}

impl MethodBuilder {
    pub fn new(method: Method, route: impl Into<String>, action_name: impl Into<String>) -> Self {
        Self {
            action_name: action_name.into(),
            method,
            route: RoutePath::Literal(route.into()),
            params: Vec::new(),
            directives: Vec::new(),
            action: None,
        }
    }

    /// Use a regex pattern instead of a literal route fragment.
    pub fn pattern(mut self, source: impl Into<String>) -> Self {
        self.route = RoutePath::Pattern(source.into());
        self
    }

    pub fn param(mut self, param: ParamMetadata) -> Self {
        self.params.push(param);
        self
    }

    pub fn directive(mut self, directive: ResponseDirective) -> Self {
        self.directives.push(directive);
        self
    }

    pub fn success_code(self, code: u16) -> Self {
        self.directive(ResponseDirective::SuccessCode(code))
    }

    pub fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.directive(ResponseDirective::header(name, value))
    }

    pub fn content_type(self, value: impl Into<String>) -> Self {
        self.directive(ResponseDirective::ContentType(value.into()))
    }

    pub fn on_undefined(self, policy: ResultPolicy) -> Self {
        self.directive(ResponseDirective::OnUndefined(policy))
    }

    pub fn on_null(self, policy: ResultPolicy) -> Self {
        self.directive(ResponseDirective::OnNull(policy))
    }

    pub fn transform_options(self, options: TransformOptions) -> Self {
        self.directive(ResponseDirective::TransformOptions(options))
    }

    pub fn action<F>(mut self, action: F) -> Self
    where
        F: Fn(
                &crate::driver::context::RequestContext,
                &mut crate::driver::context::ResponseContext,
                Vec<Option<serde_json::Value>>,
            ) -> Result<crate::driver::Outcome, crate::error::ActionError>
            + Send
            + Sync
            + 'static,
    {
        self.action = Some(Arc::new(action));
        self
    }

    fn into_pending(self, controller: Arc<str>) -> PendingMethod {
        let action: ActionFn = self
            .action
            .unwrap_or_else(|| Arc::new(|_req, _res, _args| Ok(crate::driver::Outcome::Empty)));
        let meta = MethodMetadata::new(
            controller,
            self.action_name,
            self.method,
            self.route,
            self.params,
            action,
        );
        PendingMethod {
            meta,
            directives: self.directives,
        }
    }
}
