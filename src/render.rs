//! Markdown rendering module.
//!
//! Converts a [`ParsedDocument`] plus the engine's visibility state into
//! styled ratatui [`Text`] for display in the terminal viewport.
//!
//! The layout is stable by construction: a hidden block occupies exactly the
//! same rows as its revealed form (a veiled placeholder line per content
//! line), so the line spans fed to the viewport adapter never shift when a
//! flag flips. What "hidden" looks like is decided entirely here — the
//! engine only owns the flags.

use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

use crate::engine::Visibility;
use crate::highlight;
use crate::parse::{BlockKind, ContentBlock, ParsedDocument};
use crate::viewport::LineSpan;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading's position in the rendered output, for the sidebar and
/// navigation keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingPosition {
    /// Heading level (1–6).
    pub level: u8,
    /// Flattened heading text.
    pub text: String,
    /// 0-based line index in the rendered output.
    pub rendered_line: usize,
}

/// The rendered document plus the line geometry the viewport adapter needs.
pub struct RenderedDocument {
    pub text: Text<'static>,
    /// One span per content block, in block order.
    pub block_spans: Vec<LineSpan>,
    /// One span per section, in section order.
    pub section_spans: Vec<LineSpan>,
    /// Headings with their rendered line positions.
    pub heading_lines: Vec<HeadingPosition>,
}

// ---------------------------------------------------------------------------
// Styles
// ---------------------------------------------------------------------------

/// Style for a heading of the given level. Also used by the sidebar.
pub fn heading_style(level: u8) -> Style {
    let base = Style::default().add_modifier(Modifier::BOLD);
    match level {
        1 => base.fg(Color::Magenta),
        2 => base.fg(Color::Cyan),
        3 => base.fg(Color::Green),
        4 => base.fg(Color::Yellow),
        _ => base.fg(Color::White),
    }
}

fn veil_style() -> Style {
    Style::default().fg(Color::DarkGray).add_modifier(Modifier::DIM)
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render the document with the given per-block visibility.
///
/// `visibility` is indexed by block; missing entries read as hidden, so a
/// caller passing an empty slice gets a fully veiled document.
pub fn render_document(doc: &ParsedDocument, visibility: &[Visibility]) -> RenderedDocument {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut block_spans: Vec<LineSpan> = Vec::new();
    let mut heading_lines: Vec<HeadingPosition> = Vec::new();

    for (i, block) in doc.blocks.iter().enumerate() {
        if i > 0 {
            // Blank line between blocks
            lines.push(Line::default());
        }

        let start = lines.len();
        let mut block_lines: Vec<Line<'static>> = Vec::new();
        render_block(block, &mut block_lines);

        if let BlockKind::Heading(level) = block.kind {
            heading_lines.push(HeadingPosition {
                level,
                text: block.content.lines().next().unwrap_or("").to_owned(),
                rendered_line: start,
            });
        }

        let revealed = visibility
            .get(i)
            .copied()
            .unwrap_or(Visibility::Hidden)
            == Visibility::Revealed;
        if revealed {
            lines.append(&mut block_lines);
        } else {
            // Same row count as the revealed form, veiled.
            for line in &block_lines {
                lines.push(veil_line(line));
            }
        }

        block_spans.push(LineSpan::new(start, lines.len() - start));
    }

    let section_spans = doc
        .sections
        .iter()
        .map(|section| {
            let start = block_spans[section.block_start].start;
            let last = &block_spans[section.block_end - 1];
            LineSpan::new(start, last.start + last.len - start)
        })
        .collect();

    RenderedDocument {
        text: Text::from(lines),
        block_spans,
        section_spans,
        heading_lines,
    }
}

/// Replace a rendered line with a veiled placeholder of matching width.
fn veil_line(line: &Line<'_>) -> Line<'static> {
    let width = line.spans.iter().map(|s| s.content.chars().count()).sum::<usize>();
    if width == 0 {
        return Line::default();
    }
    Line::from(Span::styled("\u{00b7}".repeat(width.min(60)), veil_style()))
}

// ---------------------------------------------------------------------------
// Block renderers
// ---------------------------------------------------------------------------

fn render_block(block: &ContentBlock, lines: &mut Vec<Line<'static>>) {
    match &block.kind {
        BlockKind::Heading(level) => render_heading(*level, &block.content, lines),
        BlockKind::Paragraph => render_paragraph(&block.content, lines),
        BlockKind::CodeBlock(lang) => render_code_block(&block.content, lang.as_deref(), lines),
        BlockKind::List => render_list(&block.content, lines),
        BlockKind::BlockQuote => render_block_quote(&block.content, lines),
        BlockKind::ThematicBreak => render_thematic_break(lines),
        BlockKind::HtmlBlock => render_paragraph(&block.content, lines),
        BlockKind::Table => render_table(&block.content, lines),
    }
}

fn heading_prefix(level: u8) -> &'static str {
    match level {
        1 => "# ",
        2 => "## ",
        3 => "### ",
        4 => "#### ",
        5 => "##### ",
        6 => "###### ",
        _ => "# ",
    }
}

fn render_heading(level: u8, content: &str, lines: &mut Vec<Line<'static>>) {
    let style = heading_style(level);
    let prefix = heading_prefix(level);
    for text_line in content.lines() {
        lines.push(Line::from(Span::styled(
            format!("{prefix}{text_line}"),
            style,
        )));
    }
}

fn render_paragraph(content: &str, lines: &mut Vec<Line<'static>>) {
    for text_line in content.lines() {
        lines.push(Line::from(Span::raw(text_line.to_owned())));
    }
}

fn render_code_block(content: &str, lang: Option<&str>, lines: &mut Vec<Line<'static>>) {
    let border_style = Style::default().fg(Color::DarkGray);

    let header = match lang {
        Some(lang) => format!("\u{250c}\u{2500}\u{2500}\u{2500} {lang}"),
        None => "\u{250c}\u{2500}\u{2500}\u{2500}".to_owned(),
    };
    lines.push(Line::from(Span::styled(header, border_style)));

    for spans in highlight::terminal_spans(content, lang) {
        let mut row: Vec<Span<'static>> = vec![Span::styled("\u{2502} ", border_style)];
        row.extend(spans);
        lines.push(Line::from(row));
    }

    lines.push(Line::from(Span::styled(
        "\u{2514}\u{2500}\u{2500}\u{2500}",
        border_style,
    )));
}

fn render_list(content: &str, lines: &mut Vec<Line<'static>>) {
    let bullet_style = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    for text_line in content.lines() {
        let trimmed = text_line.trim();
        if !trimmed.is_empty() {
            lines.push(Line::from(vec![
                Span::styled("  \u{2022} ", bullet_style),
                Span::raw(trimmed.to_owned()),
            ]));
        }
    }
}

fn render_block_quote(content: &str, lines: &mut Vec<Line<'static>>) {
    let bar_style = Style::default().fg(Color::DarkGray);
    let text_style = Style::default()
        .add_modifier(Modifier::ITALIC)
        .fg(Color::Gray);
    for text_line in content.lines() {
        lines.push(Line::from(vec![
            Span::styled("  \u{258c} ", bar_style),
            Span::styled(text_line.to_owned(), text_style),
        ]));
    }
}

fn render_thematic_break(lines: &mut Vec<Line<'static>>) {
    let style = Style::default().fg(Color::DarkGray);
    lines.push(Line::from(Span::styled(
        "\u{2500}".repeat(40),
        style,
    )));
}

fn render_table(content: &str, lines: &mut Vec<Line<'static>>) {
    let style = Style::default().fg(Color::White);
    for text_line in content.lines() {
        let trimmed = text_line.trim();
        if !trimmed.is_empty() {
            lines.push(Line::from(Span::styled(format!("  {trimmed}"), style)));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
