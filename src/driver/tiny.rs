//! Driver for the `tiny_http` blocking server.
//!
//! A single accept thread pulls requests off `incoming_requests` and services
//! each one inline. The host has no middleware layer, so a configuration that
//! requires CORS fails fast at `initialize` instead of serving requests with
//! a policy it cannot enforce.

use std::collections::HashMap;
use std::io;
use std::io::Read;
use std::net::ToSocketAddrs;
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

use serde_json::{json, Value};
use tracing::{debug, error, info};

use super::context::{
    parse_cookie_header, parse_query_params, HeaderVec, RequestContext, ResponseBody,
    ResponseContext,
};
use super::routes::RouteTable;
use super::{Driver, DriverState, ExecuteFn};
use crate::error::DriverError;
use crate::ids::RequestId;
use crate::metadata::{MethodMetadata, ParamSource};
use crate::runtime_config::GantryConfig;
use crate::transform::{PlainTransformer, ResultTransformer};

/// Driver hosting the dispatch pipeline on `tiny_http`.
pub struct TinyHttpDriver {
    config: Arc<GantryConfig>,
    transformer: Arc<dyn ResultTransformer>,
    state: Mutex<DriverState>,
    routes: Arc<RwLock<RouteTable>>,
    app_state: Arc<HashMap<String, Value>>,
}

impl TinyHttpDriver {
    pub fn new(config: GantryConfig) -> Self {
        Self {
            config: Arc::new(config),
            transformer: Arc::new(PlainTransformer),
            state: Mutex::new(DriverState::Uninitialized),
            routes: Arc::new(RwLock::new(RouteTable::new())),
            app_state: Arc::new(HashMap::new()),
        }
    }

    pub fn with_transformer(mut self, transformer: Arc<dyn ResultTransformer>) -> Self {
        self.transformer = transformer;
        self
    }

    /// Application-level shared state exposed to state-sourced parameters.
    pub fn with_state(mut self, state: HashMap<String, Value>) -> Self {
        self.app_state = Arc::new(state);
        self
    }

    fn transition(&self, expected: DriverState, next: DriverState) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        if *state != expected {
            return Err(DriverError::InvalidState {
                driver: "tiny_http",
                state: state.as_str(),
                expected: expected.as_str(),
            });
        }
        *state = next;
        Ok(())
    }

    /// Start serving on `addr`. Requires all routes to be registered first.
    pub fn start<A: ToSocketAddrs>(&self, addr: A) -> io::Result<TinyServerHandle> {
        self.transition(DriverState::RoutesRegistered, DriverState::Serving)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let server = tiny_http::Server::http(addr)
            .map_err(|e| io::Error::new(io::ErrorKind::AddrInUse, e.to_string()))?;
        let server = Arc::new(server);
        let routes = Arc::clone(&self.routes);
        let app_state = Arc::clone(&self.app_state);
        let accept = Arc::clone(&server);
        let handle = thread::spawn(move || {
            for request in accept.incoming_requests() {
                serve_one(request, &routes, &app_state);
            }
        });
        info!("Server started");
        Ok(TinyServerHandle { server, handle })
    }
}

impl Driver for TinyHttpDriver {
    fn name(&self) -> &'static str {
        "tiny_http"
    }

    fn config(&self) -> &GantryConfig {
        &self.config
    }

    fn transformer(&self) -> &dyn ResultTransformer {
        self.transformer.as_ref()
    }

    fn state(&self) -> DriverState {
        *self.state.lock().unwrap()
    }

    fn initialize(&self) -> Result<(), DriverError> {
        self.transition(DriverState::Uninitialized, DriverState::Initialized)?;
        if self.config.cors.is_some() {
            return Err(DriverError::MissingDependency {
                library: "cors middleware".to_string(),
                install: "the tiny_http host has no middleware layer; use the may_http driver \
                          or drop the CORS configuration"
                    .to_string(),
            });
        }
        Ok(())
    }

    fn register_method(
        &self,
        meta: Arc<MethodMetadata>,
        execute: ExecuteFn,
    ) -> Result<(), DriverError> {
        let state = self.state.lock().unwrap();
        if *state != DriverState::Initialized {
            return Err(DriverError::InvalidState {
                driver: "tiny_http",
                state: state.as_str(),
                expected: DriverState::Initialized.as_str(),
            });
        }
        drop(state);
        self.routes.write().unwrap().push(meta, execute)
    }

    fn register_routes(&self) -> Result<(), DriverError> {
        self.transition(DriverState::Initialized, DriverState::RoutesRegistered)?;
        info!(
            route_count = self.routes.read().unwrap().len(),
            "Route table finalized"
        );
        Ok(())
    }

    fn supports_source(&self, source: ParamSource) -> bool {
        !matches!(
            source,
            ParamSource::SessionValue
                | ParamSource::Session
                | ParamSource::File
                | ParamSource::Files
        )
    }
}

/// Handle to the running accept thread.
pub struct TinyServerHandle {
    server: Arc<tiny_http::Server>,
    handle: thread::JoinHandle<()>,
}

impl TinyServerHandle {
    /// The address the server is listening on.
    pub fn addr(&self) -> Option<std::net::SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Unblock the accept loop and wait for the thread to finish.
    pub fn stop(self) {
        self.server.unblock();
        let _ = self.handle.join();
    }

    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

fn serve_one(
    mut request: tiny_http::Request,
    routes: &RwLock<RouteTable>,
    app_state: &Arc<HashMap<String, Value>>,
) {
    let Some(mut ctx) = parse_request(&mut request) else {
        // Verb is not a valid HTTP token; it can never name a route.
        respond_json(request, 501, &json!({ "error": "Not Implemented" }));
        return;
    };
    ctx.state = Some(Arc::clone(app_state));

    let route_hit = {
        let routes = routes.read().unwrap();
        routes
            .find(&ctx.method, &ctx.path)
            .map(|(route, params)| (Arc::clone(&route.meta), route.execute.clone(), params))
    };

    let Some((meta, execute, path_params)) = route_hit else {
        let body = json!({
            "error": "Not Found",
            "method": ctx.method.as_str(),
            "path": ctx.path,
        });
        respond_json(request, 404, &body);
        return;
    };

    ctx.path_params = path_params;
    debug!(
        request_id = %ctx.request_id,
        controller = %meta.controller,
        action = %meta.action_name,
        "Dispatching request"
    );

    let mut out = ResponseContext::new();
    execute(&ctx, &mut out);

    if let Some(err) = out.take_forwarded() {
        let response = tiny_http::Response::from_data(err.to_string().into_bytes())
            .with_status_code(tiny_http::StatusCode(500));
        if let Err(e) = request.respond(response) {
            error!(error = %e, "Failed to write response");
        }
        return;
    }

    write_response(request, out);
}

/// Translate a raw `tiny_http` request into the framework-neutral handle.
/// `None` when the request line carries a verb that is not an HTTP token.
fn parse_request(request: &mut tiny_http::Request) -> Option<RequestContext> {
    let method: http::Method = request.method().as_str().parse().ok()?;
    let raw_path = request.url().to_string();
    let path = raw_path.split('?').next().unwrap_or("/").to_string();

    let headers: HeaderVec = request
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.field.as_str().as_str().to_ascii_lowercase().as_str()),
                h.value.as_str().to_string(),
            )
        })
        .collect();

    let mut ctx = RequestContext::new(method, path);
    ctx.query_params = parse_query_params(&raw_path);
    ctx.headers = headers;
    ctx.cookies = ctx
        .get_header("cookie")
        .map(parse_cookie_header)
        .unwrap_or_default();
    ctx.request_id = RequestId::from_header_or_new(ctx.get_header("x-request-id"));

    let mut body_str = String::new();
    if let Ok(size) = request.as_reader().read_to_string(&mut body_str) {
        if size > 0 {
            ctx.body = serde_json::from_str(&body_str).ok();
        }
    }
    Some(ctx)
}

fn respond_json(request: tiny_http::Request, status: u16, body: &Value) {
    let response = tiny_http::Response::from_data(body.to_string().into_bytes())
        .with_status_code(tiny_http::StatusCode(status))
        .with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header"),
        );
    if let Err(e) = request.respond(response) {
        error!(error = %e, "Failed to write response");
    }
}

/// Write a shaped response back through `tiny_http`.
fn write_response(request: tiny_http::Request, mut out: ResponseContext) {
    let status = out.status().unwrap_or(200);
    let body = out.take_body();
    let needs_json_content_type =
        matches!(body, ResponseBody::Json(_)) && out.get_header("content-type").is_none();

    let bytes = match body {
        ResponseBody::Empty => Vec::new(),
        ResponseBody::Json(value) => serde_json::to_vec(&value).unwrap_or_default(),
        ResponseBody::Binary(b) => b,
        ResponseBody::Stream(mut reader) => {
            let mut b = Vec::new();
            if reader.read_to_end(&mut b).is_err() {
                let response = tiny_http::Response::from_data(Vec::new())
                    .with_status_code(tiny_http::StatusCode(500));
                if let Err(e) = request.respond(response) {
                    error!(error = %e, "Failed to write response");
                }
                return;
            }
            b
        }
    };

    let mut response =
        tiny_http::Response::from_data(bytes).with_status_code(tiny_http::StatusCode(status));
    for (name, value) in out.headers() {
        if let Ok(header) =
            tiny_http::Header::from_bytes(name.as_bytes(), value.as_bytes())
        {
            response = response.with_header(header);
        }
    }
    if needs_json_content_type {
        response = response.with_header(
            tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                .expect("static header"),
        );
    }
    if let Err(e) = request.respond(response) {
        error!(error = %e, "Failed to write response");
    }
}
