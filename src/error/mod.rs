//! Error taxonomy for the dispatch pipeline.
//!
//! Three layers of failure are kept apart:
//!
//! - [`DriverError`] - startup and registration failures raised by a driver.
//!   `MissingDependency` is fatal at bootstrap and never recovered;
//!   `UnsupportedFeature` is surfaced when metadata asks a driver for a
//!   parameter source it cannot provide.
//! - [`HttpError`] - a domain error raised by controller logic, carrying an
//!   optional HTTP status hint and an optional protocol code.
//! - [`ActionError`] - anything that escapes an action invocation, including
//!   plain-string errors and arbitrary foreign errors. Normalized into a
//!   client-facing envelope by [`process_json_error`].

mod envelope;

pub use envelope::{deep_merge, process_json_error, INTERNAL_ERROR_CODE, SERVER_ERROR_CODE};

use serde_json::{Map, Value};
use thiserror::Error;

/// Failures raised by a driver during startup or route registration.
#[derive(Debug, Error)]
pub enum DriverError {
    /// A host-level capability the configuration requires is not available on
    /// this driver. Startup-time fatal, never recovered.
    #[error("missing host dependency `{library}`: {install}")]
    MissingDependency { library: String, install: String },

    /// Metadata declared a parameter source this driver cannot extract.
    #[error("`{feature}` is not supported by the `{driver}` driver")]
    UnsupportedFeature {
        feature: String,
        driver: &'static str,
    },

    /// A route fragment failed to compile into a matcher.
    #[error("invalid route `{route}`: {reason}")]
    InvalidRoute { route: String, reason: String },

    /// Lifecycle misuse (registering routes before `initialize`, etc.).
    #[error("driver `{driver}` is in state {state}, expected {expected}")]
    InvalidState {
        driver: &'static str,
        state: &'static str,
        expected: &'static str,
    },

    #[error("registration failed: {0}")]
    Registration(String),
}

/// Domain error raised by controller logic.
///
/// Carries an optional HTTP status hint and an optional protocol code; both
/// feed response shaping and envelope normalization. `data` holds additional
/// own properties that are copied into the envelope, `json` (when present) is
/// the error's own serialization and is used verbatim instead of classifying.
#[derive(Debug, Clone)]
pub struct HttpError {
    pub name: String,
    pub status: Option<u16>,
    pub code: Option<i64>,
    pub message: Option<String>,
    pub data: Map<String, Value>,
    pub json: Option<Value>,
    pub stack: Option<String>,
}

impl HttpError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            name: "HttpError".to_string(),
            status: Some(status),
            code: None,
            message: Some(message.into()),
            data: Map::new(),
            json: None,
            stack: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        let mut err = Self::new(400, message);
        err.name = "BadRequestError".to_string();
        err
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        let mut err = Self::new(404, message);
        err.name = "NotFoundError".to_string();
        err
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Replace classification entirely with the error's own serialization.
    pub fn with_json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }
}

impl std::fmt::Display for HttpError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(m) => write!(f, "{}: {}", self.name, m),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::error::Error for HttpError {}

/// Anything that escapes an action invocation.
///
/// `Http` is a classified domain error; `Message` models a plain string
/// thrown as an error; `Custom` covers every other error shape, carrying the
/// own-properties and optional own-serialization the envelope needs.
#[derive(Debug)]
pub enum ActionError {
    Http(HttpError),
    Message(String),
    Custom {
        name: String,
        message: Option<String>,
        data: Map<String, Value>,
        json: Option<Value>,
        stack: Option<String>,
    },
}

impl ActionError {
    /// Classified error name, used to look up envelope overrides.
    pub fn name(&self) -> &str {
        match self {
            ActionError::Http(e) => &e.name,
            ActionError::Message(_) => "Error",
            ActionError::Custom { name, .. } => name,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            ActionError::Http(e) => e.message.as_deref(),
            ActionError::Message(m) => Some(m),
            ActionError::Custom { message, .. } => message.as_deref(),
        }
    }

    /// HTTP status hint, if the underlying error carries one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            ActionError::Http(e) => e.status,
            _ => None,
        }
    }

    /// The error's own serialization, used verbatim when present.
    pub fn own_json(&self) -> Option<&Value> {
        match self {
            ActionError::Http(e) => e.json.as_ref(),
            ActionError::Message(_) => None,
            ActionError::Custom { json, .. } => json.as_ref(),
        }
    }

    pub fn from_std(err: &(dyn std::error::Error + 'static)) -> Self {
        ActionError::Custom {
            name: "Error".to_string(),
            message: Some(err.to_string()),
            data: Map::new(),
            json: None,
            stack: None,
        }
    }
}

impl std::fmt::Display for ActionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionError::Http(e) => write!(f, "{e}"),
            ActionError::Message(m) => write!(f, "{m}"),
            ActionError::Custom { name, message, .. } => match message {
                Some(m) => write!(f, "{name}: {m}"),
                None => write!(f, "{name}"),
            },
        }
    }
}

impl std::error::Error for ActionError {}

impl From<HttpError> for ActionError {
    fn from(err: HttpError) -> Self {
        ActionError::Http(err)
    }
}

impl From<String> for ActionError {
    fn from(message: String) -> Self {
        ActionError::Message(message)
    }
}

impl From<&str> for ActionError {
    fn from(message: &str) -> Self {
        ActionError::Message(message.to_string())
    }
}

impl From<DriverError> for ActionError {
    fn from(err: DriverError) -> Self {
        ActionError::Custom {
            name: "DriverError".to_string(),
            message: Some(err.to_string()),
            data: Map::new(),
            json: None,
            stack: None,
        }
    }
}
