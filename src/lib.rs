//! # Gantry
//!
//! **Gantry** is a metadata-driven controller dispatch library for Rust. You
//! declare controllers, methods, parameters and response-shaping directives
//! through explicit builders; Gantry binds the resulting metadata graph onto
//! a pluggable HTTP host and services each matched request through a single
//! pipeline: extract declared parameters, invoke the action, shape the
//! outcome (or the error) into the response.
//!
//! ## Architecture
//!
//! The library is organized into a handful of modules:
//!
//! - **[`metadata`]** - Controller/method/parameter descriptors and the
//!   fluent builders that produce them
//! - **[`dispatcher`]** - The executor that mounts controllers onto a driver
//!   and runs the extract → invoke → shape pipeline per request
//! - **[`driver`]** - The host abstraction (lifecycle state machine, route
//!   table, request/response handles) plus drivers for `may_minihttp` and
//!   `tiny_http`
//! - **[`transform`]** - Structured-result transformation (field exclusion,
//!   null stripping)
//! - **[`error`]** - The error taxonomy and the JSON error envelope
//! - **[`runtime_config`]** - The explicit configuration value injected into
//!   drivers, plus environment based coroutine tuning
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use gantry::dispatcher::Executor;
//! use gantry::driver::may_http::MayHttpDriver;
//! use gantry::driver::Outcome;
//! use gantry::metadata::{ControllerBuilder, MethodBuilder, ParamMetadata, ParamSource};
//! use gantry::runtime_config::GantryConfig;
//! use serde_json::json;
//!
//! let config = GantryConfig::default();
//! let controller = ControllerBuilder::new("users", "/users")
//!     .method(
//!         MethodBuilder::new(http::Method::GET, "/{id}", "get_user")
//!             .param(ParamMetadata::named(ParamSource::RouteParam, "id").required())
//!             .action(|_req, _res, args| {
//!                 let id = args[0].clone().unwrap_or_default();
//!                 Ok(Outcome::Json(json!({ "id": id })))
//!             }),
//!     )
//!     .build(&config);
//!
//! let driver = Arc::new(MayHttpDriver::new(config));
//! let mut executor = Executor::new(driver.clone());
//! executor.add_controller(controller);
//! executor.mount().expect("mount");
//! let handle = driver.start("0.0.0.0:8080").expect("bind");
//! handle.join().expect("server");
//! ```
//!
//! ## Runtime Considerations
//!
//! The primary driver runs on the `may` coroutine runtime, not tokio:
//! handlers execute in lightweight coroutines and the stack size is
//! configurable via the `GANTRY_STACK_SIZE` environment variable. The
//! `tiny_http` driver services requests on a plain OS thread and makes no
//! runtime assumptions.
//!
//! The metadata graph is built once at startup and shared read-only with
//! every request task; concurrent requests never synchronize on it.

pub mod dispatcher;
pub mod driver;
pub mod error;
pub mod ids;
pub mod metadata;
pub mod runtime_config;
pub mod transform;

pub use dispatcher::Executor;
pub use driver::{Driver, DriverState, Outcome};
pub use error::{ActionError, DriverError, HttpError};
pub use ids::RequestId;
pub use metadata::{ControllerBuilder, ControllerMetadata, MethodBuilder};
pub use runtime_config::{CorsConfig, GantryConfig, RuntimeConfig};
pub use transform::{PlainTransformer, ResultTransformer, TransformOptions};
