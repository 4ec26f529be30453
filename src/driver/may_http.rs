//! Driver for the `may_minihttp` coroutine HTTP server.
//!
//! Each connection is serviced by a `may` coroutine; the service translates
//! the raw request into a [`RequestContext`], matches it against the shared
//! route table and writes the shaped [`ResponseContext`] back out. CORS is
//! wired at the host level: preflight OPTIONS requests short-circuit before
//! routing, and policy headers are appended to every routed response.

use std::collections::{HashMap, HashSet};
use std::io;
use std::io::Read;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService, Request, Response};
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::context::{
    parse_cookie_header, parse_query_params, HeaderVec, RequestContext, ResponseBody,
    ResponseContext,
};
use super::routes::RouteTable;
use super::{Driver, DriverState, ExecuteFn};
use crate::error::DriverError;
use crate::ids::RequestId;
use crate::metadata::{MethodMetadata, ParamSource};
use crate::runtime_config::{CorsConfig, GantryConfig, RuntimeConfig};
use crate::transform::{PlainTransformer, ResultTransformer};

/// Driver hosting the dispatch pipeline on `may_minihttp`.
pub struct MayHttpDriver {
    config: Arc<GantryConfig>,
    transformer: Arc<dyn ResultTransformer>,
    state: Mutex<DriverState>,
    routes: Arc<RwLock<RouteTable>>,
    app_state: Arc<HashMap<String, Value>>,
}

impl MayHttpDriver {
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
                driver: "may_http",
                state: state.as_str(),
                expected: expected.as_str(),
            });
        }
        *state = next;
        Ok(())
    }

    /// Start serving on `addr`. Requires all routes to be registered first.
    pub fn start<A: ToSocketAddrs>(&self, addr: A) -> io::Result<ServerHandle> {
        self.transition(DriverState::RoutesRegistered, DriverState::Serving)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        let runtime = RuntimeConfig::global();
        may::config().set_stack_size(runtime.stack_size);
        let service = GantryService {
            routes: Arc::clone(&self.routes),
            cors: self.config.cors.clone(),
            app_state: Arc::clone(&self.app_state),
        };
        let handle = HttpServer(service).start(addr)?;
        info!(stack_size = runtime.stack_size, "Server started");
        Ok(handle)
    }
}

impl Driver for MayHttpDriver {
    fn name(&self) -> &'static str {
        "may_http"
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
        if let Some(cors) = &self.config.cors {
            info!(origins = ?cors.allowed_origins, "CORS policy enabled");
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
                driver: "may_http",
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

/// Per-connection HTTP service; cloned into each serving coroutine.
pub struct GantryService {
    routes: Arc<RwLock<RouteTable>>,
    cors: Option<CorsConfig>,
    app_state: Arc<HashMap<String, Value>>,
}

impl Clone for GantryService {
    fn clone(&self) -> Self {
        Self {
            routes: Arc::clone(&self.routes),
            cors: self.cors.clone(),
            app_state: Arc::clone(&self.app_state),
        }
    }
}

impl HttpService for GantryService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let Some(mut ctx) = parse_request(req) else {
            // Verb is not a valid HTTP token; it can never name a route.
            res.status_code(501, "Not Implemented");
            res.header("Content-Type: application/json");
            res.body_vec(json!({ "error": "Not Implemented" }).to_string().into_bytes());
            return Ok(());
        };
        ctx.state = Some(Arc::clone(&self.app_state));

        if let Some(cors) = &self.cors {
            if ctx.method == http::Method::OPTIONS {
                let mut preflight = ResponseContext::new();
                preflight.set_status(204);
                apply_cors_headers(cors, &mut preflight);
                write_response(res, preflight);
                return Ok(());
            }
        }

        let route_hit = {
            let routes = self.routes.read().unwrap();
            routes
                .find(&ctx.method, &ctx.path)
                .map(|(route, params)| (Arc::clone(&route.meta), route.execute.clone(), params))
        };

        let Some((meta, execute, path_params)) = route_hit else {
            let mut out = ResponseContext::new();
            out.set_status(404);
            out.set_body(ResponseBody::Json(json!({
                "error": "Not Found",
                "method": ctx.method.as_str(),
                "path": ctx.path,
            })));
            if let Some(cors) = &self.cors {
                apply_cors_headers(cors, &mut out);
            }
            write_response(res, out);
            return Ok(());
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
            // No further host error chain exists here; surface a plain 500.
            res.status_code(500, "Internal Server Error");
            res.header("Content-Type: text/plain");
            res.body_vec(err.to_string().into_bytes());
            return Ok(());
        }

        if let Some(cors) = &self.cors {
            apply_cors_headers(cors, &mut out);
        }
        write_response(res, out);
        Ok(())
    }
}

/// Append the configured CORS policy headers without overwriting anything the
/// method already set.
fn apply_cors_headers(cors: &CorsConfig, res: &mut ResponseContext) {
    res.set_header(
        "Access-Control-Allow-Origin",
        cors.allowed_origins.join(", "),
    );
    res.set_header(
        "Access-Control-Allow-Headers",
        cors.allowed_headers.join(", "),
    );
    res.set_header(
        "Access-Control-Allow-Methods",
        cors.allowed_methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", "),
    );
}

/// Translate a raw `may_minihttp` request into the framework-neutral handle.
/// `None` when the request line carries a verb that is not an HTTP token.
fn parse_request(req: Request) -> Option<RequestContext> {
    let method: http::Method = req.method().parse().ok()?;
    let raw_path = req.path().to_string();
    let path = raw_path
        .split('?')
        .next()
        .unwrap_or("/")
        .to_string();

    let headers: HeaderVec = req
        .headers()
        .iter()
        .map(|h| {
            (
                Arc::from(h.name.to_ascii_lowercase().as_str()),
                String::from_utf8_lossy(h.value).to_string(),
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
    if let Ok(size) = req.body().read_to_string(&mut body_str) {
        if size > 0 {
            let parsed: Result<Value, _> = serde_json::from_str(&body_str);
            if parsed.is_err() {
                debug!(body_size_bytes = size, "Request body is not valid JSON");
            }
            ctx.body = parsed.ok();
        }
    }

    debug!(
        request_id = %ctx.request_id,
        method = %ctx.method,
        path = %ctx.path,
        header_count = ctx.headers.len(),
        "HTTP request parsed"
    );
    Some(ctx)
}

fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        _ => "OK",
    }
}

static HEADER_LINES: Lazy<Mutex<HashSet<&'static str>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// `Response::header` takes a `&'static str`, so formatted header lines are
/// interned: each distinct `name: value` line is leaked at most once and
/// reused for every later response that carries it.
fn intern_header_line(name: &str, value: &str) -> &'static str {
    let line = format!("{name}: {value}");
    let mut lines = HEADER_LINES.lock().unwrap();
    if let Some(interned) = lines.get(line.as_str()) {
        return interned;
    }
    let interned: &'static str = Box::leak(line.into_boxed_str());
    lines.insert(interned);
    interned
}

/// Write a shaped response back through the `may_minihttp` response handle.
fn write_response(res: &mut Response, mut out: ResponseContext) {
    let status = out.status().unwrap_or(200);
    res.status_code(status as usize, status_reason(status));

    let body = out.take_body();
    let needs_json_content_type =
        matches!(body, ResponseBody::Json(_)) && out.get_header("content-type").is_none();

    for (name, value) in out.headers() {
        res.header(intern_header_line(name, value));
    }
    if needs_json_content_type {
        res.header("Content-Type: application/json");
    }

    match body {
        ResponseBody::Empty => {}
        ResponseBody::Json(value) => {
            res.body_vec(serde_json::to_vec(&value).unwrap_or_default());
        }
        ResponseBody::Binary(bytes) => {
            res.body_vec(bytes);
        }
        ResponseBody::Stream(mut reader) => {
            // Buffered host; drain the stream before responding.
            let mut bytes = Vec::new();
            if reader.read_to_end(&mut bytes).is_ok() {
                res.body_vec(bytes);
            } else {
                res.status_code(500, "Internal Server Error");
            }
        }
    }
}

/// Wrapper around may_minihttp's HTTP server.
///
/// Uses 32 max headers to handle modern API gateway/proxy traffic.
pub struct HttpServer<T>(pub T);

/// Handle to a running HTTP server.
#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl ServerHandle {
    /// Wait for the server to accept connections. Polls the bound address;
    /// errors with `TimedOut` after ~250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop the server and wait for its coroutine to finish.
    pub fn stop(self) {
        // SAFETY: cancel() is unsafe in the may runtime; the handle is valid
        // and cancellation is the intended shutdown path.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
    }

    /// Block until the server coroutine finishes.
    pub fn join(self) -> std::thread::Result<()> {
        self.handle.join()
    }
}

impl<T: HttpService + Clone + Send + Sync + 'static> HttpServer<T> {
    /// Start the HTTP server on the given address.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let handle = HttpServerWithHeaders::<_, 32>(self.0).start(addr)?;
        Ok(ServerHandle { addr, handle })
    }
}
