//! The executor: binds registered controllers onto a driver and services
//! matched requests through the extract → invoke → shape pipeline.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info};

use crate::driver::context::{RequestContext, ResponseContext};
use crate::driver::{Driver, ExecuteFn};
use crate::error::{ActionError, DriverError, HttpError};
use crate::metadata::{ControllerMetadata, MethodMetadata};

/// Drives controller registration and dispatch over an injected [`Driver`].
///
/// `mount` walks the driver's lifecycle end to end: initialize, validate and
/// register every controller method, then finalize the route table. After
/// `mount` the metadata graph is shared read-only with every request task.
pub struct Executor {
    driver: Arc<dyn Driver>,
    controllers: Vec<ControllerMetadata>,
}

impl Executor {
    pub fn new(driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            controllers: Vec::new(),
        }
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn add_controller(&mut self, controller: ControllerMetadata) -> &mut Self {
        self.controllers.push(controller);
        self
    }

    /// Initialize the driver, register every controller method as a route
    /// and finalize the table. Fails fast on the first invalid declaration;
    /// nothing is served with a partially registered table.
    pub fn mount(&self) -> Result<(), DriverError> {
        self.driver.initialize()?;
        for controller in &self.controllers {
            for method in &controller.methods {
                validate_method(self.driver.as_ref(), method)?;
                let meta = Arc::new(method.clone());
                let execute = execute_callback(Arc::clone(&self.driver), Arc::clone(&meta));
                self.driver.register_method(meta, execute)?;
            }
            info!(
                controller = %controller.name,
                method_count = controller.methods.len(),
                "Controller mounted"
            );
        }
        self.driver.register_routes()
    }
}

/// Reject declarations the driver can never service: named sources without a
/// name, and sources the driver does not support.
fn validate_method(driver: &dyn Driver, method: &MethodMetadata) -> Result<(), DriverError> {
    for param in &method.params {
        if param.source.requires_name() && param.name.is_none() {
            return Err(DriverError::Registration(format!(
                "{}.{}: `{}` parameter requires a name",
                method.controller, method.action_name, param.source
            )));
        }
        if !driver.supports_source(param.source) {
            return Err(DriverError::UnsupportedFeature {
                feature: param.source.to_string(),
                driver: driver.name(),
            });
        }
    }
    Ok(())
}

/// Build the per-route callback: parameter extraction, action invocation with
/// panic recovery, then success or error shaping. Exactly one shaping path
/// runs per request.
fn execute_callback(driver: Arc<dyn Driver>, meta: Arc<MethodMetadata>) -> ExecuteFn {
    Arc::new(move |req: &RequestContext, res: &mut ResponseContext| {
        let mut args = Vec::with_capacity(meta.params.len());
        for param in &meta.params {
            let value = match driver.param_from_request(req, param) {
                Ok(value) => value,
                Err(err) => {
                    driver.handle_error(err.into(), Some(&meta), res);
                    return;
                }
            };
            if param.required && value.is_none() {
                debug!(
                    request_id = %req.request_id,
                    param = %param.label(),
                    "Required parameter missing"
                );
                let err = HttpError::bad_request(format!(
                    "missing required parameter `{}`",
                    param.label()
                ));
                driver.handle_error(err.into(), Some(&meta), res);
                return;
            }
            args.push(value);
        }

        debug!(
            request_id = %req.request_id,
            controller = %meta.controller,
            action = %meta.action_name,
            arg_count = args.len(),
            "Invoking action"
        );

        let invoked = catch_unwind(AssertUnwindSafe(|| (meta.action)(req, res, args)));
        match invoked {
            Ok(Ok(outcome)) => driver.handle_success(outcome, &meta, res),
            Ok(Err(err)) => driver.handle_error(err, Some(&meta), res),
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                error!(
                    request_id = %req.request_id,
                    controller = %meta.controller,
                    action = %meta.action_name,
                    detail = %detail,
                    "Action panicked"
                );
                driver.handle_error(
                    ActionError::Message(format!("handler panicked: {detail}")),
                    Some(&meta),
                    res,
                );
            }
        }
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
