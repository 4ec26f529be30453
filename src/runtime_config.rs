//! # Runtime Configuration Module
//!
//! Two configuration surfaces live here:
//!
//! - [`GantryConfig`] - the explicit configuration value threaded into driver
//!   construction. Development mode, the default error handling switch,
//!   process-wide result-code defaults, transform defaults and the error
//!   envelope override map all travel through it; there is no ambient global
//!   state.
//! - [`RuntimeConfig`] - environment variable based coroutine tuning.
//!
//! ## Environment Variables
//!
//! ### `GANTRY_STACK_SIZE`
//!
//! Sets the stack size for the `may` coroutines serving requests. Accepts
//! decimal (`16384`) or hexadecimal (`0x4000`) values. Default: `0x4000`
//! (16 KB). Larger stacks support deeper call chains; smaller stacks reduce
//! memory for many concurrent coroutines.

use std::collections::HashMap;
use std::env;

use http::Method;
use once_cell::sync::Lazy;
use serde_json::Value;

use crate::transform::TransformOptions;

/// CORS policy wired onto the host app by `Driver::initialize`.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_methods: Vec<Method>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".into()],
            allowed_headers: vec!["Content-Type".into(), "Authorization".into()],
            allowed_methods: vec![
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ],
        }
    }
}

/// Process-wide dispatch configuration, injected into drivers at
/// construction.
#[derive(Debug, Clone)]
pub struct GantryConfig {
    /// Include stack traces in error envelopes.
    pub development: bool,
    /// When enabled, errors become structured bodies via the error envelope;
    /// when disabled, errors are forwarded to the host framework's own
    /// error-handling chain.
    pub default_error_handler: bool,
    /// Process-wide default status for methods returning no value, unless a
    /// method-level directive overrides it.
    pub undefined_result_code: Option<u16>,
    /// Process-wide default status for methods returning an explicit null.
    pub null_result_code: Option<u16>,
    /// Master switch for result transformation.
    pub transform_enabled: bool,
    /// Transform options used when a method declares none.
    pub default_transform: TransformOptions,
    /// Envelope overrides keyed by classified error name, deep-merged into
    /// the envelope after classification.
    pub error_overrides: HashMap<String, Value>,
    /// Optional CORS policy; wired by `Driver::initialize` on hosts that
    /// support it.
    pub cors: Option<CorsConfig>,
}

impl Default for GantryConfig {
    fn default() -> Self {
        Self {
            development: false,
            default_error_handler: true,
            undefined_result_code: None,
            null_result_code: None,
            transform_enabled: true,
            default_transform: TransformOptions::default(),
            error_overrides: HashMap::new(),
            cors: None,
        }
    }
}

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let stack_size = match env::var("GANTRY_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };
        RuntimeConfig { stack_size }
    }

    /// Process-wide configuration, read from the environment once.
    pub fn global() -> &'static Self {
        static GLOBAL: Lazy<RuntimeConfig> = Lazy::new(RuntimeConfig::from_env);
        &GLOBAL
    }
}
