//! Tests for the metadata builders: route composition, directive resolution
//! and build idempotence.

mod common;

use std::sync::Arc;

use gantry::driver::Outcome;
use gantry::metadata::{
    append_base_route, ActionFn, ControllerBuilder, MethodBuilder, MethodMetadata, ParamMetadata,
    ParamSource, ResponseDirective, ResultPolicy, RoutePath,
};
use gantry::runtime_config::GantryConfig;
use gantry::transform::TransformOptions;
use http::Method;

use common::tracing_util::init_tracing;

fn noop_action() -> ActionFn {
    Arc::new(|_req, _res, _args| Ok(Outcome::Empty))
}

fn method_with(route: RoutePath) -> MethodMetadata {
    MethodMetadata::new(
        Arc::from("math"),
        "add",
        Method::GET,
        route,
        Vec::new(),
        noop_action(),
    )
}

#[test]
fn test_literal_composition_is_plain_concatenation() {
    assert_eq!(
        append_base_route("math", &RoutePath::literal("add")),
        RoutePath::Literal("mathadd".to_string())
    );
    assert_eq!(
        append_base_route("math", &RoutePath::literal("/add")),
        RoutePath::Literal("math/add".to_string())
    );
    assert_eq!(
        append_base_route("", &RoutePath::literal("/add")),
        RoutePath::Literal("/add".to_string())
    );
}

#[test]
fn test_pattern_with_empty_base_is_unchanged() {
    let fragment = RoutePath::pattern(r"(?i)^/items/\d+$");
    assert_eq!(append_base_route("", &fragment), fragment);
}

#[test]
fn test_pattern_composition_preserves_flags() {
    assert_eq!(
        append_base_route("/math", &RoutePath::pattern(r"(?i)^/Add$")),
        RoutePath::Pattern(r"(?i)^/math/Add?$".to_string())
    );
}

#[test]
fn test_build_is_idempotent() {
    init_tracing();
    let directives = vec![
        ResponseDirective::SuccessCode(201),
        ResponseDirective::ContentType("application/json".to_string()),
        ResponseDirective::header("X-Custom", "one"),
    ];
    let defaults = GantryConfig::default();

    let mut meta = method_with(RoutePath::literal("/add"));
    meta.build("/math", &directives, &defaults);
    let first = format!("{meta:?}");

    meta.build("/math", &directives, &defaults);
    let second = format!("{meta:?}");

    assert_eq!(first, second);
    assert_eq!(meta.full_route, RoutePath::Literal("/math/add".to_string()));
    assert_eq!(meta.success_status, Some(201));
}

#[test]
fn test_single_valued_directives_take_first_declaration() {
    let directives = vec![
        ResponseDirective::SuccessCode(201),
        ResponseDirective::SuccessCode(418),
        ResponseDirective::OnUndefined(ResultPolicy::Status(404)),
        ResponseDirective::OnUndefined(ResultPolicy::Status(410)),
        ResponseDirective::TransformOptions(TransformOptions::exclude(&["a"])),
        ResponseDirective::TransformOptions(TransformOptions::exclude(&["b"])),
    ];
    let mut meta = method_with(RoutePath::literal("/add"));
    meta.build("", &directives, &GantryConfig::default());

    assert_eq!(meta.success_status, Some(201));
    assert!(matches!(meta.on_undefined, Some(ResultPolicy::Status(404))));
    assert_eq!(
        meta.transform_options,
        Some(TransformOptions::exclude(&["a"]))
    );
}

#[test]
fn test_headers_accumulate_with_later_declarations_winning() {
    let directives = vec![
        ResponseDirective::header("X-Custom", "one"),
        ResponseDirective::header("X-Other", "keep"),
        ResponseDirective::header("X-Custom", "two"),
        ResponseDirective::ContentType("text/csv".to_string()),
    ];
    let mut meta = method_with(RoutePath::literal("/export"));
    meta.build("", &directives, &GantryConfig::default());

    assert_eq!(meta.headers.get("X-Custom"), Some(&"two".to_string()));
    assert_eq!(meta.headers.get("X-Other"), Some(&"keep".to_string()));
    // The content-type directive materializes with exactly this casing.
    assert_eq!(meta.headers.get("Content-type"), Some(&"text/csv".to_string()));
    assert!(!meta.headers.contains_key("Content-Type"));
}

#[test]
fn test_controller_builder_applies_process_defaults() {
    let config = GantryConfig {
        undefined_result_code: Some(404),
        null_result_code: Some(204),
        ..GantryConfig::default()
    };
    let controller = ControllerBuilder::new("users", "/users")
        .method(
            MethodBuilder::new(Method::GET, "/{id}", "get_user")
                .param(ParamMetadata::named(ParamSource::RouteParam, "id").required()),
        )
        .method(
            MethodBuilder::new(Method::GET, "/all", "list_users")
                .on_undefined(ResultPolicy::Status(410)),
        )
        .build(&config);

    assert_eq!(controller.methods.len(), 2);
    let get_user = &controller.methods[0];
    assert!(matches!(
        get_user.on_undefined,
        Some(ResultPolicy::Status(404))
    ));
    assert!(matches!(get_user.on_null, Some(ResultPolicy::Status(204))));
    assert_eq!(
        get_user.full_route,
        RoutePath::Literal("/users/{id}".to_string())
    );

    // Method-level directive wins over the process default.
    let list_users = &controller.methods[1];
    assert!(matches!(
        list_users.on_undefined,
        Some(ResultPolicy::Status(410))
    ));
}
