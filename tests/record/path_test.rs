//! Dotted-path access tests.

use pdh::record::{get_path, get_path_or, set_path, value_to_display, PathError, Record};
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

#[test]
fn nested_lookup_returns_inner_value() {
    let r = record(json!({"dictfield": {"inside": "worm"}}));
    assert_eq!(get_path(&r, "dictfield.inside"), Ok(&json!("worm")));
}

#[test]
fn default_applies_only_to_missing_segments() {
    let r = record(json!({"dictfield": {"inside": "worm"}, "text": "x"}));
    let fallback = json!("-x-");

    assert_eq!(get_path_or(&r, "dictfield.inside", &fallback), Ok(json!("worm")));
    assert_eq!(get_path_or(&r, "dictfield.nothere", &fallback), Ok(fallback.clone()));
    assert!(matches!(
        get_path_or(&r, "text.deeper", &fallback),
        Err(PathError::NotAnObject { .. })
    ));
}

#[test]
fn arrays_are_not_traversed() {
    let r = record(json!({"assignments": [{"assignee": {"summary": "Ann"}}]}));
    assert!(matches!(
        get_path(&r, "assignments.assignee"),
        Err(PathError::NotAnObject { segment, .. }) if segment == "assignments"
    ));
}

#[test]
fn set_then_get_round_trips_nested_path() {
    let mut r = record(json!({"a": {"keep": true}}));
    set_path(&mut r, "a.b.c", json!(7)).expect("set should succeed");
    assert_eq!(get_path(&r, "a.b.c"), Ok(&json!(7)));
    assert_eq!(get_path(&r, "a.keep"), Ok(&json!(true)));
}

#[test]
fn set_refuses_to_overwrite_a_scalar_parent() {
    let mut r = record(json!({"a": 1}));
    let result = set_path(&mut r, "a.b", json!(2));
    assert!(matches!(result, Err(PathError::NotAnObject { .. })));
    assert_eq!(r.get("a"), Some(&json!(1)));
}

#[test]
fn missing_error_names_the_full_path() {
    let r = Record::new();
    let err = get_path(&r, "service.summary").expect_err("path is absent");
    assert_eq!(err.to_string(), "field 'service.summary' not found");
}

#[test]
fn display_values_are_human_readable() {
    assert_eq!(value_to_display(&json!("text")), "text");
    assert_eq!(value_to_display(&Value::Null), "");
    assert_eq!(value_to_display(&json!(23)), "23");
    assert_eq!(value_to_display(&json!([1, 2])), "[1,2]");
}
