//! Table layout tests.

use pdh::output::{build_table, table_layout};
use pdh::record::Record;
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

#[test]
fn single_record_gives_one_row_and_its_columns() {
    let data = records(json!([{"Title": "disk full", "Url": "https://pd.example/P1"}]));
    let (headers, rows) = table_layout(&data, &[], true);
    assert_eq!(headers, vec!["Title".to_owned(), "Url".to_owned()]);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].len(), 2);

    let mut table = build_table(&headers, &rows, "white", "white");
    assert_eq!(table.column_count(), 2);
    assert_eq!(table.row_iter().count(), 1);
}

#[test]
fn columns_come_from_the_first_record() {
    let data = records(json!([
        {"id": "P1", "title": "a"},
        {"id": "P2", "extra": "ignored"}
    ]));
    let (headers, rows) = table_layout(&data, &[], true);
    assert_eq!(headers, vec!["id".to_owned(), "title".to_owned()]);
    assert_eq!(rows[1], vec!["P2".to_owned(), String::new()]);
}

#[test]
fn skipped_columns_are_left_out() {
    let data = records(json!([{"id": "P1", "title": "a", "url": "u"}]));
    let (headers, rows) = table_layout(&data, &["url".to_owned()], true);
    assert_eq!(headers, vec!["id".to_owned(), "title".to_owned()]);
    assert_eq!(rows[0], vec!["P1".to_owned(), "a".to_owned()]);
}

#[test]
fn empty_input_has_no_layout() {
    let (headers, rows) = table_layout(&[], &[], true);
    assert!(headers.is_empty());
    assert!(rows.is_empty());
}

#[test]
fn non_string_cells_are_escaped_display_text() {
    let data = records(json!([{"id": 7, "tags": ["[red]x"]}]));
    let (_, rows) = table_layout(&data, &[], true);
    assert_eq!(rows[0][0], "7");
    assert_eq!(rows[0][1], r#"\["\[red]x"]"#);
    assert_eq!(pdh::markup::strip(&rows[0][1]), r#"["[red]x"]"#);
}

#[test]
fn plain_data_cells_are_escaped() {
    let data = records(json!([{"summary": "[red]disk[/red] C:\\"}]));
    let (_, rows) = table_layout(&data, &[], false);
    assert_eq!(rows[0][0], "\\[red]disk\\[/red] C:\\\\");
    assert_eq!(pdh::markup::strip(&rows[0][0]), "[red]disk[/red] C:\\");
}
