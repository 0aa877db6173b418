//! Markup parsing, stripping and rendering tests.

use colored::Color;
use pdh::markup::{escape, parse_style, render, strip, wrap};

#[test]
fn wrap_then_strip_returns_text() {
    assert_eq!(strip(&wrap("magenta", "Ann, Bob")), "Ann, Bob");
    assert_eq!(strip(&wrap("grey50 on black", &wrap("red", "✘"))), "✘");
}

#[test]
fn escaped_values_cannot_inject_markers() {
    let hostile = "[red]fake[/red]";
    let wrapped = wrap("cyan", &escape(hostile));
    assert_eq!(strip(&wrapped), hostile);
}

#[test]
fn unknown_tags_are_literal_text() {
    assert_eq!(strip("[INC-1] db down"), "[INC-1] db down");
    assert_eq!(strip("array [1, 2]"), "array [1, 2]");
    assert_eq!(strip("unclosed [red"), "unclosed [red");
}

#[test]
fn styles_combine_colors_and_attributes() {
    let style = parse_style("bold yellow on blue").expect("valid style");
    assert_eq!(style.fg, Some(Color::Yellow));
    assert_eq!(style.bg, Some(Color::Blue));
    assert!(style.bold);
    assert!(!style.italic);
}

#[test]
fn grey_levels_map_to_true_color() {
    let style = parse_style("grey100").expect("valid style");
    assert_eq!(style.fg, Some(Color::TrueColor { r: 255, g: 255, b: 255 }));
    let style = parse_style("gray0").expect("valid style");
    assert_eq!(style.fg, Some(Color::TrueColor { r: 0, g: 0, b: 0 }));
}

#[test]
fn render_emits_ansi_when_forced() {
    colored::control::set_override(true);
    let out = render("[red]✘[/red] ok");
    colored::control::unset_override();
    assert!(out.contains("\u{1b}["), "got {out:?}");
    assert!(out.ends_with(" ok"));
    assert!(!out.contains("[red]"));
}
