//! Live-server tests for the two concrete drivers: real sockets, malformed
//! request verbs, and host-capability failures at initialize.

mod common;

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use gantry::dispatcher::Executor;
use gantry::driver::may_http::MayHttpDriver;
use gantry::driver::tiny::TinyHttpDriver;
use gantry::driver::{Driver, DriverState, Outcome};
use gantry::error::DriverError;
use gantry::metadata::{
    ControllerBuilder, ControllerMetadata, MethodBuilder, ParamMetadata, ParamSource,
};
use gantry::runtime_config::{CorsConfig, GantryConfig};
use http::Method;
use serde_json::json;

use common::tracing_util::init_tracing;

fn pets_controller(config: &GantryConfig) -> ControllerMetadata {
    ControllerBuilder::new("pets", "/pets")
        .method(
            MethodBuilder::new(Method::GET, "/{id}", "get_pet")
                .param(ParamMetadata::named(ParamSource::RouteParam, "id").required())
                .action(|_req, _res, args| Ok(Outcome::Json(json!({ "id": args[0].clone() })))),
        )
        .build(config)
}

/// Send one raw HTTP request and read whatever the server answers. Keep-alive
/// hosts hold the socket open, so the read stops on a short timeout instead
/// of EOF.
fn raw_request(addr: SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).expect("connect");
    stream.write_all(raw.as_bytes()).expect("write request");
    stream
        .set_read_timeout(Some(Duration::from_millis(500)))
        .expect("set timeout");
    let mut buf = Vec::new();
    let _ = stream.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}

/// Grab an ephemeral port that is free right now.
fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind ephemeral");
    listener.local_addr().expect("local addr").port()
}

#[test]
fn test_tiny_http_serves_requests_end_to_end() {
    init_tracing();
    let config = GantryConfig::default();
    let driver = Arc::new(TinyHttpDriver::new(config.clone()));
    let mut executor = Executor::new(driver.clone());
    executor.add_controller(pets_controller(&config));
    executor.mount().expect("mount");

    let handle = driver.start("127.0.0.1:0").expect("start");
    let addr = handle.addr().expect("bound address");

    let ok = raw_request(
        addr,
        "GET /pets/42 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(ok.starts_with("HTTP/1.1 200"), "got: {ok}");
    assert!(ok.contains(r#"{"id":"42"}"#), "got: {ok}");

    let missing = raw_request(
        addr,
        "GET /nope HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(missing.starts_with("HTTP/1.1 404"), "got: {missing}");

    handle.stop();
}

#[test]
fn test_tiny_http_rejects_unparseable_verb() {
    init_tracing();
    let config = GantryConfig::default();
    let driver = Arc::new(TinyHttpDriver::new(config.clone()));
    let mut executor = Executor::new(driver.clone());
    executor.add_controller(pets_controller(&config));
    executor.mount().expect("mount");

    let handle = driver.start("127.0.0.1:0").expect("start");
    let addr = handle.addr().expect("bound address");

    // "GE(T" is not an HTTP token; it must not fall through to the GET route.
    let res = raw_request(
        addr,
        "GE(T /pets/42 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(res.starts_with("HTTP/1.1 501"), "got: {res}");
    assert!(!res.contains(r#"{"id":"42"}"#), "got: {res}");

    handle.stop();
}

#[test]
fn test_tiny_http_with_cors_fails_initialize() {
    let config = GantryConfig {
        cors: Some(CorsConfig::default()),
        ..GantryConfig::default()
    };
    let driver = TinyHttpDriver::new(config);
    let err = driver.initialize().unwrap_err();
    assert!(matches!(err, DriverError::MissingDependency { .. }), "got: {err:?}");
    assert_eq!(driver.state(), DriverState::Initialized);
}

#[test]
fn test_may_http_start_requires_registered_routes() {
    let driver = MayHttpDriver::new(GantryConfig::default());
    let err = driver.start("127.0.0.1:0").unwrap_err();
    assert!(err.to_string().contains("Uninitialized"), "got: {err}");
    assert_eq!(driver.state(), DriverState::Uninitialized);
}

#[test]
fn test_may_http_serves_requests_with_cors() {
    init_tracing();
    let config = GantryConfig {
        cors: Some(CorsConfig::default()),
        ..GantryConfig::default()
    };
    let driver = Arc::new(MayHttpDriver::new(config.clone()));
    let mut executor = Executor::new(driver.clone());
    executor.add_controller(pets_controller(&config));
    executor.mount().expect("mount");

    let addr: SocketAddr = format!("127.0.0.1:{}", free_port()).parse().expect("addr");
    let handle = driver.start(addr).expect("start");
    handle.wait_ready().expect("server ready");

    let ok = raw_request(
        addr,
        "GET /pets/7 HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
    );
    assert!(ok.starts_with("HTTP/1.1 200"), "got: {ok}");
    assert!(ok.contains(r#"{"id":"7"}"#), "got: {ok}");
    assert!(ok.contains("Access-Control-Allow-Origin: *"), "got: {ok}");

    let preflight = raw_request(
        addr,
        "OPTIONS /pets/7 HTTP/1.1\r\nHost: localhost\r\nOrigin: http://example.com\r\nConnection: close\r\n\r\n",
    );
    assert!(preflight.starts_with("HTTP/1.1 204"), "got: {preflight}");
    assert!(
        preflight.contains("Access-Control-Allow-Methods"),
        "got: {preflight}"
    );

    handle.stop();
}
