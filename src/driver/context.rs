//! Framework-neutral request/response handles.
//!
//! Concrete drivers parse their host framework's request into a
//! [`RequestContext`] and translate the [`ResponseContext`] back into a host
//! response after the execute callback returns. The per-request pair is
//! exclusively owned by the task servicing that request and never shared.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::sync::Arc;

use http::Method;
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::error::ActionError;
use crate::ids::RequestId;

/// Maximum path/query parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Maximum inline headers/cookies before heap allocation.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header/cookie storage for the hot path.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Parsed, framework-neutral view of one incoming request.
///
/// Header names are normalized to lower-case at parse time; lookups are
/// case-insensitive regardless. Session and shared-state maps are optional -
/// drivers populate them only when the host (or driver configuration)
/// provides them.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Correlation id threaded through extraction, invocation and response.
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    /// Path parameters extracted by the route table.
    pub path_params: ParamVec,
    pub query_params: ParamVec,
    /// HTTP headers (lower-case names).
    pub headers: HeaderVec,
    pub cookies: HeaderVec,
    /// Request body parsed as JSON (if present).
    pub body: Option<Value>,
    pub session: Option<HashMap<String, Value>>,
    pub state: Option<Arc<HashMap<String, Value>>>,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            request_id: RequestId::new(),
            method,
            path: path.into(),
            path_params: ParamVec::new(),
            query_params: ParamVec::new(),
            headers: HeaderVec::new(),
            cookies: HeaderVec::new(),
            body: None,
            session: None,
            state: None,
        }
    }

    /// Get a path parameter by name (last write wins for duplicate names at
    /// different path depths).
    #[inline]
    pub fn get_path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a query parameter by name (last write wins).
    #[inline]
    pub fn get_query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[inline]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn get_cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Collect a name/value pair list into a JSON object (later entries win).
pub(crate) fn pairs_to_object(pairs: &[(Arc<str>, String)]) -> Value {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), Value::String(v.clone()));
    }
    Value::Object(map)
}

/// Response body produced by response shaping.
pub enum ResponseBody {
    Empty,
    Json(Value),
    Binary(Vec<u8>),
    /// Piped to the host response; hosts that only support buffered writes
    /// drain the reader before responding.
    Stream(Box<dyn Read + Send>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Empty => f.write_str("Empty"),
            ResponseBody::Json(v) => f.debug_tuple("Json").field(v).finish(),
            ResponseBody::Binary(b) => write!(f, "Binary({} bytes)", b.len()),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Framework-neutral response handle.
///
/// Tracks how often control was advanced so tests (and drivers) can assert
/// the exactly-once guarantee, and carries a forwarded error when the default
/// error handler is disabled and the host chain takes over.
#[derive(Debug)]
pub struct ResponseContext {
    status: Option<u16>,
    headers: HeaderVec,
    body: ResponseBody,
    committed: bool,
    advanced: u32,
    forwarded: Option<ActionError>,
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseContext {
    pub fn new() -> Self {
        Self {
            status: None,
            headers: HeaderVec::new(),
            body: ResponseBody::Empty,
            committed: false,
            advanced: 0,
            forwarded: None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    pub fn headers(&self) -> &HeaderVec {
        &self.headers
    }

    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header (case-insensitive replacement).
    pub fn set_header(&mut self, name: &str, value: String) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn set_body(&mut self, body: ResponseBody) {
        self.body = body;
    }

    pub fn take_body(&mut self) -> ResponseBody {
        std::mem::replace(&mut self.body, ResponseBody::Empty)
    }

    /// Mark the response as already written by the action itself; response
    /// shaping then only advances control.
    pub fn commit(&mut self) {
        self.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Advance control to the next handler in the host chain.
    pub fn advance(&mut self) {
        self.advanced += 1;
    }

    pub fn times_advanced(&self) -> u32 {
        self.advanced
    }

    /// Advance control carrying an error, handing it to the host framework's
    /// own error-handling chain.
    pub fn forward(&mut self, err: ActionError) {
        self.forwarded = Some(err);
    }

    pub fn forwarded_error(&self) -> Option<&ActionError> {
        self.forwarded.as_ref()
    }

    pub fn take_forwarded(&mut self) -> Option<ActionError> {
        self.forwarded.take()
    }
}

/// Parse cookies from a `Cookie` header value.
pub fn parse_cookie_header(raw: &str) -> HeaderVec {
    raw.split(';')
        .filter_map(|pair| {
            let mut parts = pair.trim().splitn(2, '=');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((Arc::from(name), value))
        })
        .collect()
}

/// Parse query string parameters from a URL path, URL-decoding names and
/// values.
pub fn parse_query_params(path: &str) -> ParamVec {
    match path.find('?') {
        Some(pos) => url::form_urlencoded::parse(path[pos + 1..].as_bytes())
            .map(|(k, v)| (Arc::from(k.as_ref()), v.to_string()))
            .collect(),
        None => ParamVec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cookie_header() {
        let cookies = parse_cookie_header("a=b; c=d");
        assert_eq!(cookies[0], (Arc::from("a"), "b".to_string()));
        assert_eq!(cookies[1], (Arc::from("c"), "d".to_string()));
    }

    #[test]
    fn test_parse_query_params() {
        let q = parse_query_params("/p?x=1&y=two%20words");
        assert_eq!(q[0].1, "1");
        assert_eq!(q[1].1, "two words");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let mut ctx = RequestContext::new(Method::GET, "/");
        ctx.headers.push((Arc::from("x-test"), "yes".to_string()));
        assert_eq!(ctx.get_header("X-Test"), Some("yes"));
    }

    #[test]
    fn test_set_header_replaces_case_insensitively() {
        let mut res = ResponseContext::new();
        res.set_header("Content-type", "text/plain".to_string());
        res.set_header("content-TYPE", "application/json".to_string());
        assert_eq!(res.headers().len(), 1);
        assert_eq!(res.get_header("Content-Type"), Some("application/json"));
    }
}
