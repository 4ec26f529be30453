use std::fmt;
use std::sync::Arc;

use crate::error::HttpError;
use crate::transform::TransformOptions;

/// Policy applied when a method yields no value (or an explicit null):
/// either set a literal status code, or raise a constructed domain error
/// that is routed through error handling instead.
#[derive(Clone)]
pub enum ResultPolicy {
    Status(u16),
    Raise(Arc<dyn Fn() -> HttpError + Send + Sync>),
}

impl ResultPolicy {
    pub fn raise<F>(constructor: F) -> Self
    where
        F: Fn() -> HttpError + Send + Sync + 'static,
    {
        ResultPolicy::Raise(Arc::new(constructor))
    }
}

impl fmt::Debug for ResultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultPolicy::Status(code) => f.debug_tuple("Status").field(code).finish(),
            ResultPolicy::Raise(_) => f.write_str("Raise(..)"),
        }
    }
}

/// One declarative response-shaping directive attached to a method.
///
/// `Header` directives accumulate into the headers map (later declarations
/// for the same name overwrite earlier ones); every other kind is
/// single-valued and the first declaration wins.
#[derive(Debug, Clone)]
pub enum ResponseDirective {
    TransformOptions(TransformOptions),
    OnUndefined(ResultPolicy),
    OnNull(ResultPolicy),
    SuccessCode(u16),
    Header { name: String, value: String },
    ContentType(String),
}

impl ResponseDirective {
    pub fn header(name: impl Into<String>, value: impl Into<String>) -> Self {
        ResponseDirective::Header {
            name: name.into(),
            value: value.into(),
        }
    }
}
