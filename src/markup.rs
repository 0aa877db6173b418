//! Inline decoration markup.
//!
//! Extractors decorate values with `[style]text[/style]` markers, for example
//! `[red]✘[/red]` or `[grey50 on black]row[/grey50 on black]`. Renderers turn
//! the markers into ANSI sequences for terminals ([`render`]) or drop them for
//! machine formats ([`strip`]).
//!
//! A bracket that does not open a known style is kept as literal text;
//! `\[` stands for a literal `[` and `\\` for a literal `\`. [`escape`] must
//! be applied to data before it is wrapped so that values never inject
//! markers of their own.

use colored::{Color, ColoredString, Colorize};

/// Escape `\` and `[` so the text renders verbatim.
pub fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('[', "\\[")
}

/// Wrap already-escaped `text` in a style marker.
pub fn wrap(style: &str, text: &str) -> String {
    format!("[{style}]{text}[/{style}]")
}

/// Resolved terminal style of a marker.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Style {
    /// Foreground color.
    pub fg: Option<Color>,
    /// Background color.
    pub bg: Option<Color>,
    /// Bold attribute.
    pub bold: bool,
    /// Dimmed attribute.
    pub dim: bool,
    /// Italic attribute.
    pub italic: bool,
    /// Underline attribute.
    pub underline: bool,
}

impl Style {
    fn merge(self, inner: Self) -> Self {
        Self {
            fg: inner.fg.or(self.fg),
            bg: inner.bg.or(self.bg),
            bold: self.bold || inner.bold,
            dim: self.dim || inner.dim,
            italic: self.italic || inner.italic,
            underline: self.underline || inner.underline,
        }
    }

    fn paint(&self, text: &str) -> ColoredString {
        let mut out = text.normal();
        if let Some(fg) = self.fg {
            out = out.color(fg);
        }
        if let Some(bg) = self.bg {
            out = out.on_color(bg);
        }
        if self.bold {
            out = out.bold();
        }
        if self.dim {
            out = out.dimmed();
        }
        if self.italic {
            out = out.italic();
        }
        if self.underline {
            out = out.underline();
        }
        out
    }
}

fn parse_color(name: &str) -> Option<Color> {
    let color = match name {
        "black" => Color::Black,
        "red" => Color::Red,
        "green" => Color::Green,
        "yellow" => Color::Yellow,
        "blue" => Color::Blue,
        "magenta" => Color::Magenta,
        "cyan" => Color::Cyan,
        "white" => Color::White,
        "bright_black" => Color::BrightBlack,
        "bright_red" => Color::BrightRed,
        "bright_green" => Color::BrightGreen,
        "bright_yellow" => Color::BrightYellow,
        "bright_blue" => Color::BrightBlue,
        "bright_magenta" => Color::BrightMagenta,
        "bright_cyan" => Color::BrightCyan,
        "bright_white" => Color::BrightWhite,
        other => {
            let level = other
                .strip_prefix("grey")
                .or_else(|| other.strip_prefix("gray"))?
                .parse::<u16>()
                .ok()
                .filter(|n| *n <= 100)?;
            let scaled = level.saturating_mul(255).checked_div(100)?;
            let v = u8::try_from(scaled).ok()?;
            Color::TrueColor { r: v, g: v, b: v }
        }
    };
    Some(color)
}

/// Parse a style specification such as `bold red` or `grey93 on black`.
///
/// Returns `None` when any word is not a known color or attribute.
pub fn parse_style(spec: &str) -> Option<Style> {
    let (fg_part, bg_part) = match spec.split_once(" on ") {
        Some((fg, bg)) => (fg, Some(bg)),
        None => (spec, None),
    };

    let mut style = Style::default();
    let mut words = 0usize;
    for word in fg_part.split_whitespace() {
        words = words.saturating_add(1);
        match word {
            "bold" => style.bold = true,
            "dim" => style.dim = true,
            "italic" => style.italic = true,
            "underline" => style.underline = true,
            color => style.fg = Some(parse_color(color)?),
        }
    }
    if let Some(bg) = bg_part {
        style.bg = Some(parse_color(bg.trim())?);
        words = words.saturating_add(1);
    }

    (words > 0).then_some(style)
}

#[derive(Debug, PartialEq)]
enum Token {
    Text(String),
    Open(Style),
    Close,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut rest = input;

    while let Some(c) = rest.chars().next() {
        if let Some(after) = rest.strip_prefix("\\\\") {
            text.push('\\');
            rest = after;
            continue;
        }
        if let Some(after) = rest.strip_prefix("\\[") {
            text.push('[');
            rest = after;
            continue;
        }
        if c == '[' {
            if let Some(end) = rest.find(']') {
                let tag = &rest[1..end];
                let token = match tag.strip_prefix('/') {
                    Some(closing) if closing.is_empty() || parse_style(closing).is_some() => {
                        Some(Token::Close)
                    }
                    Some(_) => None,
                    None => parse_style(tag).map(Token::Open),
                };
                if let Some(token) = token {
                    if !text.is_empty() {
                        tokens.push(Token::Text(std::mem::take(&mut text)));
                    }
                    tokens.push(token);
                    rest = &rest[end.saturating_add(1)..];
                    continue;
                }
            }
        }
        text.push(c);
        rest = &rest[c.len_utf8()..];
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    tokens
}

/// Render markup to a terminal string with ANSI styling.
///
/// Coloring follows `colored`'s global switch, so `NO_COLOR` and non-tty
/// detection apply.
pub fn render(input: &str) -> String {
    let mut stack: Vec<Style> = Vec::new();
    let mut out = String::with_capacity(input.len());
    for token in tokenize(input) {
        match token {
            Token::Open(style) => {
                let current = stack.last().copied().unwrap_or_default();
                stack.push(current.merge(style));
            }
            Token::Close => {
                stack.pop();
            }
            Token::Text(text) => match stack.last() {
                Some(style) => out.push_str(&style.paint(&text).to_string()),
                None => out.push_str(&text),
            },
        }
    }
    out
}

/// Remove all markers, leaving the plain text.
pub fn strip(input: &str) -> String {
    tokenize(input)
        .into_iter()
        .filter_map(|t| match t {
            Token::Text(text) => Some(text),
            _ => None,
        })
        .collect()
}
