//! # Dispatcher Module
//!
//! Binds the read-only controller metadata graph onto a driver and services
//! each matched request: extract declared parameters, invoke the action with
//! panic recovery, then hand the outcome to the driver's response shaping.

mod core;

pub use core::Executor;
