//! Tests for error-envelope normalization.

use gantry::error::{
    process_json_error, ActionError, HttpError, INTERNAL_ERROR_CODE, SERVER_ERROR_CODE,
};
use gantry::runtime_config::GantryConfig;
use serde_json::{json, Map};

#[test]
fn test_plain_string_error_is_internal() {
    let err = ActionError::from("boom");
    let envelope = process_json_error(&err, &GantryConfig::default());
    assert_eq!(envelope["code"], json!(INTERNAL_ERROR_CODE));
    assert_eq!(envelope["message"], json!("boom"));
}

#[test]
fn test_unclassified_error_is_server_error() {
    let err = ActionError::Custom {
        name: "WeirdError".to_string(),
        message: Some("something odd".to_string()),
        data: Map::new(),
        json: None,
        stack: None,
    };
    let envelope = process_json_error(&err, &GantryConfig::default());
    assert_eq!(envelope["code"], json!(SERVER_ERROR_CODE));
}

#[test]
fn test_domain_error_code_takes_precedence() {
    let err = ActionError::Http(HttpError::new(400, "bad input").with_code(-32001));
    let envelope = process_json_error(&err, &GantryConfig::default());
    assert_eq!(envelope["code"], json!(-32001));
}

#[test]
fn test_own_serialization_is_used_verbatim() {
    let own = json!({ "totally": "custom", "shape": [1, 2, 3] });
    let err = ActionError::Http(HttpError::new(500, "ignored").with_json(own.clone()));
    let envelope = process_json_error(&err, &GantryConfig::default());
    assert_eq!(envelope, own);
}

#[test]
fn test_reserved_props_never_reach_data() {
    let err = ActionError::Http(
        HttpError::new(400, "bad")
            .with_data("stack", json!("secret"))
            .with_data("name", json!("shadow"))
            .with_data("httpCode", json!(999))
            .with_data("field", json!("email")),
    );
    let envelope = process_json_error(&err, &GantryConfig::default());
    assert_eq!(envelope["data"], json!({ "field": "email" }));
}

#[test]
fn test_stack_only_in_development_mode() {
    let err = ActionError::Http(HttpError::new(500, "oops").with_stack("at main.rs:1"));

    let production = process_json_error(&err, &GantryConfig::default());
    assert!(production.get("stack").is_none());

    let config = GantryConfig {
        development: true,
        ..GantryConfig::default()
    };
    let development = process_json_error(&err, &config);
    assert_eq!(development["stack"], json!("at main.rs:1"));
}

#[test]
fn test_overrides_deep_merge_by_error_name() {
    let mut config = GantryConfig::default();
    config.error_overrides.insert(
        "NotFoundError".to_string(),
        json!({ "message": "nothing here", "data": { "hint": "check the id" } }),
    );

    let err = ActionError::Http(
        HttpError::not_found("user 7 not found").with_data("resource", json!("user")),
    );
    let envelope = process_json_error(&err, &config);

    // Overlay wins on conflicts, untouched keys survive.
    assert_eq!(envelope["message"], json!("nothing here"));
    assert_eq!(envelope["data"]["hint"], json!("check the id"));
    assert_eq!(envelope["data"]["resource"], json!("user"));

    // Overrides for other names do not apply.
    let other = ActionError::from("boom");
    let untouched = process_json_error(&other, &config);
    assert_eq!(untouched["message"], json!("boom"));
}
