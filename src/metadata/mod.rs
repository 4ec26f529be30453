//! # Metadata Module
//!
//! The in-memory model for declared controllers, methods, parameters and
//! response-shaping directives. The graph is built once at startup through
//! the fluent builders and treated as read-only afterwards; concurrent
//! requests only read it, so no synchronization is needed.
//!
//! Ownership: a [`ControllerMetadata`] exclusively owns its
//! [`MethodMetadata`] list, which in turn exclusively owns its
//! [`ParamMetadata`] list. Methods hold only a name key back to their
//! controller, never a cyclic reference.

mod controller;
mod method;
mod param;
mod response;

pub use controller::{ControllerBuilder, ControllerMetadata, MethodBuilder};
pub use method::{append_base_route, ActionFn, MethodMetadata, RoutePath};
pub use param::{ParamMetadata, ParamSource};
pub use response::{ResponseDirective, ResultPolicy};
