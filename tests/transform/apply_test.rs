//! Projection and augmentation tests.

use pdh::record::Record;
use pdh::transform::{apply, extract, extract_from_dict, Extractor, Mode, Transformations};
use serde_json::{json, Value};

fn records(value: Value) -> Vec<Record> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => map,
                other => panic!("expected an object, got {other}"),
            })
            .collect(),
        other => panic!("expected an array, got {other}"),
    }
}

fn input() -> Vec<Record> {
    records(json!([
        {"id": "P1", "title": "a", "service": {"summary": "db"}},
        {"id": "P2", "title": "b", "service": {"summary": "web"}}
    ]))
}

#[test]
fn fresh_mode_projects_in_declared_order() {
    let t = Transformations::new()
        .with("name", extract("title"))
        .with("id", extract("id"));
    let out = apply(input(), &t, Mode::Fresh).expect("projection should succeed");

    let keys: Vec<&str> = out[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["name", "id"]);
    assert_eq!(out[1]["name"], json!("b"));
}

#[test]
fn preserve_mode_keeps_other_fields() {
    let t = Transformations::new().with("svc", extract_from_dict("service", "summary", ""));
    let out = apply(input(), &t, Mode::Preserve).expect("augmentation should succeed");

    assert_eq!(out[0]["svc"], json!("db"));
    assert_eq!(out[0]["title"], json!("a"));
    assert_eq!(out.len(), 2);
}

#[test]
fn nested_output_paths_build_objects() {
    let t = Transformations::new().with("meta.id", extract("id"));
    let out = apply(input(), &t, Mode::Fresh).expect("projection should succeed");
    assert_eq!(Value::Object(out[0].clone()), json!({"meta": {"id": "P1"}}));
}

#[test]
fn extractors_read_the_untouched_input() {
    // The second extractor must see the original title, not the overwrite.
    let t = Transformations::new()
        .with("title", Extractor::new(|_| Ok(json!("replaced"))))
        .with("copy", extract("title"));
    let out = apply(input(), &t, Mode::Preserve).expect("augmentation should succeed");
    assert_eq!(out[0]["title"], json!("replaced"));
    assert_eq!(out[0]["copy"], json!("a"));
}

#[test]
fn empty_transformations_yield_empty_records() {
    let out = apply(input(), &Transformations::new(), Mode::Fresh).expect("nothing to fail");
    assert_eq!(out.len(), 2);
    assert!(out.iter().all(Record::is_empty));
}

#[test]
fn first_failure_aborts_the_whole_set() {
    let mut data = input();
    data[1].remove("title");
    let t = Transformations::new().with("title", extract("title"));
    assert!(apply(data, &t, Mode::Fresh).is_err());
}
