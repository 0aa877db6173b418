//! Extractor factory tests.

use chrono::{Duration, FixedOffset, Utc};
use pdh::markup::strip;
use pdh::record::Record;
use pdh::transform::{
    color_when, extract, extract_alerts, extract_assignees, extract_change, extract_change_or,
    extract_date, extract_date_with, extract_decorate, extract_from_dict, extract_or,
    extract_pending_actions, extract_teams, ChangeMap, Extractor, TransformError,
    DEFAULT_DATE_FORMAT,
};
use serde_json::{json, Value};

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

fn run(extractor: &Extractor, r: &Record) -> Value {
    match extractor.run(r) {
        Ok(v) => v,
        Err(e) => panic!("extractor failed: {e}"),
    }
}

fn text(extractor: &Extractor, r: &Record) -> String {
    match run(extractor, r) {
        Value::String(s) => s,
        other => panic!("expected a string, got {other}"),
    }
}

fn incident() -> Record {
    record(json!({
        "id": "P1",
        "title": "disk [full] on db-1",
        "status": "triggered",
        "urgency": "high",
        "dictfield": {"inside": "worm"},
        "assignments": [
            {"assignee": {"summary": "Ann"}},
            {"assignee": {"summary": "Bob"}}
        ],
        "pending_actions": [
            {"type": "escalate", "at": "2024-01-01T10:00:00Z"},
            {"type": "resolve", "at": "2024-01-02T10:00:00Z"}
        ]
    }))
}

#[test]
fn nested_extraction_with_default() {
    let r = incident();
    assert_eq!(run(&extract("dictfield.inside"), &r), json!("worm"));
    assert_eq!(run(&extract_or("dictfield.nothere", "-x-"), &r), json!("-x-"));
    assert!(matches!(
        extract("dictfield.nothere").run(&r),
        Err(TransformError::Path(_))
    ));
}

#[test]
fn change_with_empty_map_equals_plain_extract() {
    let r = incident();
    for path in ["status", "dictfield.inside", "urgency"] {
        assert_eq!(
            run(&extract_change(path, ChangeMap::new()), &r),
            run(&extract(path), &r)
        );
    }
}

#[test]
fn change_map_relabels_known_values() {
    let r = incident();
    let mut labels = ChangeMap::new();
    labels.insert("triggered".to_owned(), "✘".to_owned());
    assert_eq!(run(&extract_change("status", labels.clone()), &r), json!("✘"));
    assert_eq!(
        run(&extract_change_or("missing", labels, "triggered"), &r),
        json!("✘")
    );
}

#[test]
fn decoration_escapes_and_colors() {
    let r = incident();
    let ex = extract_decorate("title")
        .map_func(color_when("urgency", "high", "red", "cyan"))
        .build();
    let out = text(&ex, &r);
    assert_eq!(out, "[red]disk \\[full] on db-1[/red]");
    assert_eq!(strip(&out), "disk [full] on db-1");
}

#[test]
fn trailing_backslash_does_not_swallow_the_closing_marker() {
    let r = record(json!({"path": "C:\\"}));
    let out = text(&extract_decorate("path").default_color("red").build(), &r);
    assert_eq!(out, "[red]C:\\\\[/red]");
    assert_eq!(strip(&out), "C:\\");

    colored::control::set_override(false);
    assert_eq!(pdh::markup::render(&out), "C:\\");
}

#[test]
fn decoration_is_idempotent() {
    let r = incident();
    let mut labels = ChangeMap::new();
    labels.insert("triggered".to_owned(), "✘".to_owned());
    let ex = extract_decorate("status")
        .change_map(labels)
        .map_func(color_when("status", "triggered", "red", "yellow"))
        .default_color("bold")
        .build();

    let first = text(&ex, &r);
    let second = text(&ex, &r);
    assert_eq!(first, second);
    assert_eq!(first, "[bold][red]✘[/red][/bold]");
}

#[test]
fn color_map_is_keyed_by_original_value() {
    let r = incident();
    let mut labels = ChangeMap::new();
    labels.insert("triggered".to_owned(), "T".to_owned());
    let mut colors = std::collections::HashMap::new();
    colors.insert("triggered".to_owned(), "red".to_owned());
    let ex = extract_decorate("status")
        .change_map(labels)
        .color_map(colors)
        .build();
    assert_eq!(text(&ex, &r), "[red]T[/red]");
}

#[test]
fn relative_dates_name_each_unit() {
    let created = Utc::now() - (Duration::days(22) + Duration::hours(12) + Duration::minutes(22) + Duration::seconds(30));
    let r = record(json!({"created_at": created.format(DEFAULT_DATE_FORMAT).to_string()}));

    let out = text(&extract_date("created_at"), &r);
    assert!(out.contains("22d"), "got {out}");
    assert!(out.contains("12h"), "got {out}");
    assert!(out.ends_with("ago"), "got {out}");
}

#[test]
fn recent_and_future_dates_are_less_than_a_minute() {
    let future = Utc::now() + Duration::hours(1);
    let r = record(json!({"at": future.format(DEFAULT_DATE_FORMAT).to_string()}));
    assert_eq!(text(&extract_date("at"), &r), "less than 1m ago");
}

#[test]
fn custom_format_and_offset_are_honored() {
    let created = Utc::now() - Duration::hours(3);
    let east_two = FixedOffset::east_opt(2 * 3600).expect("valid offset");
    let local = created.with_timezone(&east_two);
    let r = record(json!({"when": local.format("%d/%m/%Y %H:%M").to_string()}));

    let out = text(&extract_date_with("when", "%d/%m/%Y %H:%M", Some(east_two)), &r);
    assert!(out.starts_with("3h") || out.starts_with("2h 59m"), "got {out}");
}

#[test]
fn unparseable_dates_are_errors() {
    let r = record(json!({"created_at": "yesterday"}));
    assert!(matches!(
        extract_date("created_at").run(&r),
        Err(TransformError::Date { .. })
    ));
}

#[test]
fn assignees_are_joined_and_wrapped() {
    let out = text(&extract_assignees("magenta"), &incident());
    assert_eq!(out, "[magenta]Ann, Bob[/magenta]");
}

#[test]
fn teams_are_comma_joined() {
    let user = record(json!({"teams": [{"summary": "SRE"}, {"summary": "DBA"}]}));
    assert_eq!(text(&extract_teams(), &user), "SRE,DBA");
    let lonely = record(json!({"teams": []}));
    assert_eq!(text(&extract_teams(), &lonely), "");
}

#[test]
fn pending_actions_describe_type_and_time() {
    let out = text(&extract_pending_actions(), &incident());
    assert_eq!(
        out,
        "escalate at 2024-01-01T10:00:00Z, resolve at 2024-01-02T10:00:00Z"
    );
}

#[test]
fn alert_summaries_are_keyed_by_id() {
    let r = record(json!({
        "alerts": [
            {"id": "A1", "status": "triggered", "body": {"details": {"Condition": "cpu > 90"}}},
            {"id": "A2", "status": "resolved"}
        ]
    }));
    let out = text(&extract_alerts("alerts", &["status", "body.details.Condition"]), &r);
    let parsed: Value = serde_json::from_str(&strip(&out)).expect("summary is JSON");
    assert_eq!(
        parsed,
        json!({
            "A1": {"status": "triggered", "body.details.Condition": "cpu > 90"},
            "A2": {"status": "resolved"}
        })
    );
}

#[test]
fn list_extractors_reject_non_lists() {
    let r = record(json!({"teams": "SRE"}));
    assert!(matches!(
        extract_teams().run(&r),
        Err(TransformError::Shape { .. })
    ));
}

#[test]
fn from_dict_handles_absent_and_non_object_fields() {
    let ex = extract_from_dict("service", "summary", "n/a");
    assert_eq!(run(&ex, &record(json!({}))), json!("n/a"));
    assert_eq!(run(&ex, &record(json!({"service": "flat"}))), json!(""));
    assert_eq!(
        run(&ex, &record(json!({"service": {"summary": "db"}}))),
        json!("db")
    );
}
