//! Table layout and construction.

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};

use super::cell_text;
use crate::markup::{render, wrap};
use crate::record::Record;

/// Headers and markup cell text for a record set.
///
/// Columns come from the first record only, minus `skip_columns`; a later
/// record lacking a column gets an empty cell. String values are taken as
/// markup only when `markup` is set.
pub fn table_layout(
    records: &[Record],
    skip_columns: &[String],
    markup: bool,
) -> (Vec<String>, Vec<Vec<String>>) {
    let Some(first) = records.first() else {
        return (Vec::new(), Vec::new());
    };

    let headers: Vec<String> = first
        .keys()
        .filter(|k| !skip_columns.contains(k))
        .cloned()
        .collect();

    let rows = records
        .iter()
        .map(|record| {
            headers
                .iter()
                .map(|h| record.get(h).map(|v| cell_text(v, markup)).unwrap_or_default())
                .collect()
        })
        .collect();

    (headers, rows)
}

/// Build a styled table; rows alternate between `even_style` (index 0, 2, ...)
/// and `odd_style`.
pub fn build_table(headers: &[String], rows: &[Vec<String>], odd_style: &str, even_style: &str) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        headers
            .iter()
            .map(|h| Cell::new(h).fg(Color::Magenta).add_attribute(Attribute::Bold)),
    );

    for (idx, row) in rows.iter().enumerate() {
        let style = if idx % 2 == 1 { odd_style } else { even_style };
        table.add_row(row.iter().map(|cell| Cell::new(render(&wrap(style, cell)))));
    }
    table
}
