#![allow(dead_code)]

pub mod tracing_util {
    use std::sync::Once;

    static TRACING_INIT: Once = Once::new();

    /// Install a test-friendly subscriber once per test binary.
    pub fn init_tracing() {
        TRACING_INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "info".into()),
                )
                .with_test_writer()
                .try_init();
        });
    }
}

pub mod mock {
    use std::sync::{Arc, Mutex, RwLock};

    use gantry::driver::context::{RequestContext, ResponseContext};
    use gantry::driver::routes::RouteTable;
    use gantry::driver::{Driver, DriverState, ExecuteFn};
    use gantry::error::DriverError;
    use gantry::metadata::{MethodMetadata, ParamSource};
    use gantry::runtime_config::GantryConfig;
    use gantry::transform::{PlainTransformer, ResultTransformer};
    use http::Method;

    /// In-memory driver: real route table and real default response shaping,
    /// no sockets. `dispatch` plays the host's role for one request.
    pub struct MockDriver {
        config: Arc<GantryConfig>,
        transformer: Arc<dyn ResultTransformer>,
        state: Mutex<DriverState>,
        routes: Arc<RwLock<RouteTable>>,
        unsupported: Vec<ParamSource>,
    }

    impl MockDriver {
        pub fn new(config: GantryConfig) -> Self {
            Self {
                config: Arc::new(config),
                transformer: Arc::new(PlainTransformer),
                state: Mutex::new(DriverState::Uninitialized),
                routes: Arc::new(RwLock::new(RouteTable::new())),
                unsupported: vec![
                    ParamSource::SessionValue,
                    ParamSource::Session,
                    ParamSource::File,
                    ParamSource::Files,
                ],
            }
        }

        pub fn with_unsupported(mut self, sources: Vec<ParamSource>) -> Self {
            self.unsupported = sources;
            self
        }

        pub fn route_count(&self) -> usize {
            self.routes.read().unwrap().len()
        }

        /// Run one request through the registered routes; `None` when no
        /// route matches.
        pub fn dispatch(&self, mut ctx: RequestContext) -> Option<ResponseContext> {
            let (execute, path_params) = {
                let routes = self.routes.read().unwrap();
                let (route, params) = routes.find(&ctx.method, &ctx.path)?;
                (route.execute.clone(), params)
            };
            ctx.path_params = path_params;
            let mut res = ResponseContext::new();
            execute(&ctx, &mut res);
            Some(res)
        }

        pub fn request(&self, method: Method, path: &str) -> Option<ResponseContext> {
            self.dispatch(RequestContext::new(method, path))
        }
    }

    impl Driver for MockDriver {
        fn name(&self) -> &'static str {
            "mock"
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
            let mut state = self.state.lock().unwrap();
            if *state != DriverState::Uninitialized {
                return Err(DriverError::InvalidState {
                    driver: "mock",
                    state: state.as_str(),
                    expected: DriverState::Uninitialized.as_str(),
                });
            }
            *state = DriverState::Initialized;
            Ok(())
        }

        fn register_method(
            &self,
            meta: Arc<MethodMetadata>,
            execute: ExecuteFn,
        ) -> Result<(), DriverError> {
            if self.state() != DriverState::Initialized {
                return Err(DriverError::Registration(
                    "register_method before initialize".to_string(),
                ));
            }
            self.routes.write().unwrap().push(meta, execute)
        }

        fn register_routes(&self) -> Result<(), DriverError> {
            let mut state = self.state.lock().unwrap();
            if *state != DriverState::Initialized {
                return Err(DriverError::InvalidState {
                    driver: "mock",
                    state: state.as_str(),
                    expected: DriverState::Initialized.as_str(),
                });
            }
            *state = DriverState::RoutesRegistered;
            Ok(())
        }

        fn supports_source(&self, source: ParamSource) -> bool {
            !self.unsupported.contains(&source)
        }
    }
}
