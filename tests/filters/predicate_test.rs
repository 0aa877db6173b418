//! Predicate factory tests.

use pdh::filters::{
    custom, eq, ge, gt, ieq, in_list, in_str, le, lt, not_regexp, regexp, FilterError,
};
use pdh::record::Record;
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn fruit() -> Record {
    record(json!({
        "title": "apple",
        "intfield": 23,
        "status": "Triggered",
        "service": {"summary": "db-primary"}
    }))
}

fn check(result: Result<bool, FilterError>) -> bool {
    match result {
        Ok(b) => b,
        Err(e) => panic!("predicate failed: {e}"),
    }
}

#[test]
fn numeric_comparisons_are_inclusive_where_named() {
    let r = fruit();
    assert!(check(ge("intfield", 23).test(&r)));
    assert!(check(le("intfield", 23).test(&r)));
    assert!(!check(gt("intfield", 23).test(&r)));
    assert!(!check(lt("intfield", 23).test(&r)));
    assert!(check(lt("intfield", 23.5).test(&r)));
}

#[test]
fn equality_and_case_insensitive_equality() {
    let r = fruit();
    assert!(check(eq("title", "apple").test(&r)));
    assert!(!check(eq("title", "Apple").test(&r)));
    assert!(check(ieq("status", "triggered").test(&r)));
    assert!(check(eq("intfield", 23.0).test(&r)));
}

#[test]
fn membership_in_list_and_substring() {
    let r = fruit();
    assert!(check(in_list("title", ["pear", "apple"]).test(&r)));
    assert!(!check(in_list("title", ["pear"]).test(&r)));
    assert!(check(in_str("service.summary", "PRIMARY").test(&r)));
}

#[test]
fn regexps_search_anywhere_and_negate() {
    let r = fruit();
    let found = match regexp("title", "pl") {
        Ok(p) => p,
        Err(e) => panic!("pattern should compile: {e}"),
    };
    assert!(check(found.test(&r)));

    let excluded = match not_regexp("service.summary", "^db-") {
        Ok(p) => p,
        Err(e) => panic!("pattern should compile: {e}"),
    };
    assert!(!check(excluded.test(&r)));
}

#[test]
fn invalid_pattern_is_reported_at_construction() {
    let err = regexp("title", "(unclosed").expect_err("pattern is invalid");
    assert!(matches!(err, FilterError::InvalidRegex { pattern, .. } if pattern == "(unclosed"));
}

#[test]
fn missing_field_fails_instead_of_rejecting() {
    let r = fruit();
    assert!(matches!(eq("nothere", 1).test(&r), Err(FilterError::Path(_))));
}

#[test]
fn string_predicates_reject_non_strings() {
    let r = fruit();
    assert!(matches!(
        in_str("intfield", "2").test(&r),
        Err(FilterError::NotAString { found: "number", .. })
    ));
}

#[test]
fn mismatched_comparison_is_an_error() {
    let r = fruit();
    assert!(matches!(
        ge("title", 3).test(&r),
        Err(FilterError::NotComparable { .. })
    ));
}

#[test]
fn custom_predicates_see_the_whole_record() {
    let p = custom("has_service", |r| r.contains_key("service"));
    assert!(check(p.test(&fruit())));
    assert_eq!(p.to_string(), "custom(has_service)");
}

#[test]
fn predicates_describe_themselves() {
    assert_eq!(ge("intfield", 23).to_string(), "intfield >= 23");
    let p = match not_regexp("title", "^x") {
        Ok(p) => p,
        Err(e) => panic!("pattern should compile: {e}"),
    };
    assert_eq!(p.to_string(), "title !~ /^x/");
}
