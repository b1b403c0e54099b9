//! Syntax highlighting via syntect.
//!
//! The syntax and theme sets are loaded once at startup and shared by both
//! front ends: the TUI renderer asks for styled spans, the serve-mode HTML
//! renderer for a highlighted `<pre>` fragment. Unknown fence languages and
//! highlighter errors degrade to plain text — highlighting is cosmetic and
//! never fails the render.

use std::sync::OnceLock;

use ratatui::{
    style::{Color, Style},
    text::Span,
};
use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

/// Theme used for both terminal and HTML output. Part of syntect's bundled
/// default set.
const THEME_NAME: &str = "base16-ocean.dark";

static SYNTAXES: OnceLock<SyntaxSet> = OnceLock::new();
static THEMES: OnceLock<ThemeSet> = OnceLock::new();

/// Initialize the highlighting collaborator. Called once at startup; later
/// calls are no-ops.
pub fn init() {
    let syntaxes = syntax_set();
    eprintln!("[highlight] syntaxes={} theme={THEME_NAME}", syntaxes.syntaxes().len());
}

fn syntax_set() -> &'static SyntaxSet {
    SYNTAXES.get_or_init(SyntaxSet::load_defaults_newlines)
}

fn theme() -> &'static Theme {
    let themes = THEMES.get_or_init(ThemeSet::load_defaults);
    themes
        .themes
        .get(THEME_NAME)
        .or_else(|| themes.themes.values().next())
        .expect("syntect default theme set is never empty")
}

/// Resolve a fence language token to a syntax definition, if known.
fn find_syntax(lang: Option<&str>) -> Option<&'static SyntaxReference> {
    let token = lang?;
    syntax_set().find_syntax_by_token(token)
}

fn to_ratatui_color(c: syntect::highlighting::Color) -> Color {
    Color::Rgb(c.r, c.g, c.b)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Highlight `code` into one `Vec<Span>` per line (without trailing
/// newlines), for the TUI renderer.
///
/// Falls back to unstyled spans when the language is unknown or a line
/// fails to highlight.
pub fn terminal_spans(code: &str, lang: Option<&str>) -> Vec<Vec<Span<'static>>> {
    let Some(syntax) = find_syntax(lang) else {
        return code
            .lines()
            .map(|line| vec![Span::raw(line.to_owned())])
            .collect();
    };

    let mut highlighter = HighlightLines::new(syntax, theme());
    let mut lines = Vec::new();
    for line in LinesWithEndings::from(code) {
        let spans = match highlighter.highlight_line(line, syntax_set()) {
            Ok(regions) => regions
                .into_iter()
                .map(|(style, text)| {
                    Span::styled(
                        text.trim_end_matches('\n').to_owned(),
                        Style::default().fg(to_ratatui_color(style.foreground)),
                    )
                })
                .collect(),
            Err(_) => vec![Span::raw(line.trim_end_matches('\n').to_owned())],
        };
        lines.push(spans);
    }
    lines
}

/// Highlight `code` into a standalone `<pre>` HTML fragment for serve mode.
///
/// Returns `None` when the language is unknown or highlighting fails, in
/// which case the caller keeps the renderer's plain code block.
pub fn html_pre(code: &str, lang: Option<&str>) -> Option<String> {
    let syntax = find_syntax(lang)?;
    highlighted_html_for_string(code, syntax_set(), syntax, theme()).ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_language_produces_styled_spans() {
        let lines = terminal_spans("fn main() {}\n", Some("rust"));
        assert_eq!(lines.len(), 1);
        let styled = lines[0].iter().any(|s| s.style.fg.is_some());
        assert!(styled, "rust source should get at least one colored span");
    }

    #[test]
    fn unknown_language_falls_back_to_plain_lines() {
        let lines = terminal_spans("abc\ndef\n", Some("no-such-lang"));
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.len() == 1 && l[0].style.fg.is_none()));
        assert_eq!(lines[0][0].content.as_ref(), "abc");
    }

    #[test]
    fn missing_language_falls_back_to_plain_lines() {
        let lines = terminal_spans("plain\n", None);
        assert_eq!(lines.len(), 1);
        assert!(lines[0][0].style.fg.is_none());
    }

    #[test]
    fn spans_carry_no_trailing_newlines() {
        let lines = terminal_spans("let x = 1;\nlet y = 2;\n", Some("rust"));
        for line in &lines {
            for span in line {
                assert!(!span.content.contains('\n'));
            }
        }
    }

    #[test]
    fn html_fragment_for_known_language() {
        let html = html_pre("fn main() {}\n", Some("rust")).expect("rust is bundled");
        assert!(html.contains("<pre"));
        assert!(html.contains("main"));
    }

    #[test]
    fn html_fragment_none_for_unknown_language() {
        assert!(html_pre("x\n", Some("no-such-lang")).is_none());
        assert!(html_pre("x\n", None).is_none());
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
        assert!(syntax_set().find_syntax_by_token("rust").is_some());
    }
}
