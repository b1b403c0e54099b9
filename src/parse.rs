//! Markdown parsing module.
//!
//! Parses markdown text into a structured representation containing:
//! - A flat list of content blocks with their line ranges and reveal kinds
//! - A heading list with level, text, and line position
//! - Section groupings (a heading plus everything until the next heading)
//! - Optional YAML frontmatter carrying per-document reveal overrides

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// The kind of a top-level content block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    /// Fenced or indented code block with the fence language, if any.
    CodeBlock(Option<String>),
    List,
    BlockQuote,
    ThematicBreak,
    HtmlBlock,
    Table,
}

/// Reveal category of a block — decides which animation class the rendering
/// layers attach. The engine itself is indifferent to the kind; it only
/// flips visibility flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealKind {
    Title,
    Subtitle,
    Fade,
    Zoom,
}

impl BlockKind {
    pub fn reveal_kind(&self) -> RevealKind {
        match self {
            BlockKind::Heading(1) => RevealKind::Title,
            BlockKind::Heading(_) => RevealKind::Subtitle,
            BlockKind::CodeBlock(_) | BlockKind::Table => RevealKind::Zoom,
            _ => RevealKind::Fade,
        }
    }
}

/// A top-level content block in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentBlock {
    pub kind: BlockKind,
    /// 1-based starting line number.
    pub line_start: usize,
    /// 1-based ending line number (inclusive).
    pub line_end: usize,
    /// Flattened text content of the block.
    pub content: String,
}

/// A heading extracted from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heading {
    /// Heading level (1–6).
    pub level: u8,
    /// Flattened text content of the heading.
    pub text: String,
    /// 1-based line number where the heading appears.
    pub line: usize,
}

/// A section: a heading block plus every block until the next heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub level: u8,
    /// Index of the first block (the heading itself).
    pub block_start: usize,
    /// Index one past the last block of the section.
    pub block_end: usize,
}

/// Per-document overrides for the reveal timing, parsed from frontmatter.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RevealOverrides {
    pub base_delay_ms: Option<u64>,
    pub step_delay_ms: Option<u64>,
    pub threshold: Option<f64>,
}

/// The fully parsed representation of a markdown document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub blocks: Vec<ContentBlock>,
    pub headings: Vec<Heading>,
    pub sections: Vec<Section>,
    pub overrides: RevealOverrides,
}

impl ParsedDocument {
    /// Block indices of the hero region: everything before the second
    /// section boundary (the document preamble plus the lead section).
    /// These blocks are staggered by the hero sequencer at startup.
    pub fn hero_blocks(&self) -> std::ops::Range<usize> {
        match self.sections.get(1) {
            Some(second) => 0..second.block_start,
            None => 0..self.blocks.len(),
        }
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Maps byte offsets into a source string to 1-based line numbers.
struct LineIndex {
    /// Byte offsets of each `\n` character in the source.
    newline_offsets: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let newline_offsets = source
            .bytes()
            .enumerate()
            .filter_map(|(i, b)| if b == b'\n' { Some(i) } else { None })
            .collect();
        Self { newline_offsets }
    }

    /// Convert a byte offset to a 1-based line number.
    fn line_at(&self, offset: usize) -> usize {
        match self.newline_offsets.binary_search(&offset) {
            Ok(idx) | Err(idx) => idx + 1,
        }
    }
}

fn heading_level_to_u8(level: &HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

/// Returns `true` for block-level tags (as opposed to inline spans).
fn is_block_level(tag: &Tag) -> bool {
    !matches!(
        tag,
        Tag::Emphasis | Tag::Strong | Tag::Strikethrough | Tag::Link { .. } | Tag::Image { .. }
    )
}

fn is_block_level_end(tag: &TagEnd) -> bool {
    !matches!(
        tag,
        TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough | TagEnd::Link | TagEnd::Image
    )
}

/// First whitespace-delimited token of a fence info string, lowercased.
fn fence_language(info: &str) -> Option<String> {
    info.split_whitespace()
        .next()
        .filter(|lang| !lang.is_empty())
        .map(|lang| lang.to_lowercase())
}

/// Map a *top-level* block tag to its [`BlockKind`].
///
/// Returns `None` for block tags that only appear nested (e.g. `Item`,
/// `TableRow`) and for types we intentionally skip (e.g. metadata blocks).
fn tag_to_block_kind(tag: &Tag) -> Option<BlockKind> {
    match tag {
        Tag::Paragraph => Some(BlockKind::Paragraph),
        Tag::Heading { level, .. } => Some(BlockKind::Heading(heading_level_to_u8(level))),
        Tag::CodeBlock(CodeBlockKind::Fenced(info)) => {
            Some(BlockKind::CodeBlock(fence_language(info)))
        }
        Tag::CodeBlock(CodeBlockKind::Indented) => Some(BlockKind::CodeBlock(None)),
        Tag::BlockQuote(..) => Some(BlockKind::BlockQuote),
        Tag::List(_) => Some(BlockKind::List),
        Tag::Table(_) => Some(BlockKind::Table),
        _ => None,
    }
}

/// Group blocks into sections: each heading starts one and owns everything
/// up to the next heading. Blocks before the first heading belong to no
/// section.
fn build_sections(blocks: &[ContentBlock]) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    for (idx, block) in blocks.iter().enumerate() {
        if let BlockKind::Heading(level) = block.kind {
            if let Some(open) = sections.last_mut() {
                open.block_end = idx;
            }
            sections.push(Section {
                title: block.content.clone(),
                level,
                block_start: idx,
                block_end: blocks.len(),
            });
        }
    }
    sections
}

// ---------------------------------------------------------------------------
// Frontmatter
// ---------------------------------------------------------------------------

/// Split a leading `---` YAML frontmatter block off `source`.
///
/// Returns `(yaml, rest)`; `yaml` is `None` when the document has no
/// frontmatter. The closing fence line is consumed.
fn split_frontmatter(source: &str) -> (Option<&str>, &str) {
    let Some(after_open) = source.strip_prefix("---\n") else {
        return (None, source);
    };
    for (pos, line) in line_offsets(after_open) {
        if line.trim_end() == "---" {
            let yaml = &after_open[..pos];
            let rest_start = pos + line.len();
            let rest = after_open[rest_start..].strip_prefix('\n').unwrap_or("");
            return (Some(yaml), rest);
        }
    }
    (None, source)
}

/// Iterate `(byte_offset, line_without_newline)` pairs.
fn line_offsets(s: &str) -> impl Iterator<Item = (usize, &str)> {
    s.split_inclusive('\n').scan(0usize, |offset, raw| {
        let pos = *offset;
        *offset += raw.len();
        Some((pos, raw.strip_suffix('\n').unwrap_or(raw)))
    })
}

/// Parse reveal overrides out of a frontmatter YAML block.
///
/// Reads `reveal: {base_delay_ms, step_delay_ms, threshold}`. A document
/// whose frontmatter fails to parse keeps the defaults; the failure is
/// logged and otherwise ignored.
fn parse_overrides(yaml: &str) -> RevealOverrides {
    let value: serde_yml::Value = match serde_yml::from_str(yaml) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("[frontmatter] branch=ignored reason=yaml-error error={e}");
            return RevealOverrides::default();
        }
    };
    let Some(reveal) = value.get("reveal") else {
        return RevealOverrides::default();
    };
    RevealOverrides {
        base_delay_ms: reveal.get("base_delay_ms").and_then(|v| v.as_u64()),
        step_delay_ms: reveal.get("step_delay_ms").and_then(|v| v.as_u64()),
        threshold: reveal.get("threshold").and_then(|v| v.as_f64()),
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Strip frontmatter off `source`, returning any reveal overrides it
/// carried plus the markdown body. Shared by both front ends; the HTML path
/// renders the body with comrak instead of going through [`parse`].
pub fn strip_frontmatter(source: &str) -> (RevealOverrides, &str) {
    let (yaml, body) = split_frontmatter(source);
    (yaml.map(parse_overrides).unwrap_or_default(), body)
}

/// Parse a markdown source string into a [`ParsedDocument`].
///
/// Frontmatter is stripped before markdown parsing; block line numbers are
/// relative to the stripped content.
pub fn parse(source: &str) -> ParsedDocument {
    let (overrides, body) = strip_frontmatter(source);

    let line_index = LineIndex::new(body);

    let options =
        Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(body, options);

    let mut blocks: Vec<ContentBlock> = Vec::new();
    let mut headings: Vec<Heading> = Vec::new();

    // Block tracking
    let mut block_depth: usize = 0;
    let mut current_block: Option<(BlockKind, usize)> = None; // (kind, start_offset)
    let mut text_buf = String::new();

    // Heading tracking
    let mut in_heading: Option<u8> = None;
    let mut heading_line: usize = 0;
    let mut heading_text_buf = String::new();

    for (event, range) in parser.into_offset_iter() {
        match &event {
            Event::Start(tag) => {
                if is_block_level(tag) {
                    if block_depth == 0 {
                        if let Some(kind) = tag_to_block_kind(tag) {
                            current_block = Some((kind, range.start));
                            text_buf.clear();
                        }
                    }
                    // Insert newlines between list items / table rows for
                    // cleaner flattened content.
                    if block_depth >= 1
                        && matches!(tag, Tag::Item | Tag::TableRow)
                        && !text_buf.is_empty()
                        && !text_buf.ends_with('\n')
                    {
                        text_buf.push('\n');
                    }
                    block_depth += 1;
                }

                if let Tag::Heading { level, .. } = tag {
                    in_heading = Some(heading_level_to_u8(level));
                    heading_line = line_index.line_at(range.start);
                    heading_text_buf.clear();
                }
            }

            Event::End(tag_end) => {
                if is_block_level_end(tag_end) {
                    block_depth = block_depth.saturating_sub(1);
                    if block_depth == 0 {
                        if let Some((kind, start_offset)) = current_block.take() {
                            let start_line = line_index.line_at(start_offset);
                            let end_line =
                                line_index.line_at(range.end.saturating_sub(1).max(start_offset));
                            blocks.push(ContentBlock {
                                kind,
                                line_start: start_line,
                                line_end: end_line,
                                content: text_buf.clone(),
                            });
                        }
                        text_buf.clear();
                    }
                }

                if let TagEnd::Heading(_) = tag_end {
                    if let Some(level) = in_heading.take() {
                        headings.push(Heading {
                            level,
                            text: heading_text_buf.clone(),
                            line: heading_line,
                        });
                        heading_text_buf.clear();
                    }
                }
            }

            Event::Text(text) => {
                text_buf.push_str(text);
                if in_heading.is_some() {
                    heading_text_buf.push_str(text);
                }
            }

            Event::Code(code) => {
                text_buf.push_str(code);
                if in_heading.is_some() {
                    heading_text_buf.push_str(code);
                }
            }

            Event::SoftBreak | Event::HardBreak => {
                text_buf.push('\n');
                if in_heading.is_some() {
                    heading_text_buf.push('\n');
                }
            }

            Event::Html(html) => {
                if block_depth == 0 {
                    blocks.push(ContentBlock {
                        kind: BlockKind::HtmlBlock,
                        line_start: line_index.line_at(range.start),
                        line_end: line_index.line_at(range.end.saturating_sub(1).max(range.start)),
                        content: html.to_string(),
                    });
                } else {
                    text_buf.push_str(html);
                }
            }

            Event::InlineHtml(html) => {
                text_buf.push_str(html);
            }

            Event::Rule => {
                let line = line_index.line_at(range.start);
                blocks.push(ContentBlock {
                    kind: BlockKind::ThematicBreak,
                    line_start: line,
                    line_end: line,
                    content: String::new(),
                });
            }

            _ => {}
        }
    }

    let sections = build_sections(&blocks);

    ParsedDocument {
        blocks,
        headings,
        sections,
        overrides,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document() {
        let doc = parse("");
        assert!(doc.blocks.is_empty());
        assert!(doc.headings.is_empty());
        assert!(doc.sections.is_empty());
        assert_eq!(doc.overrides, RevealOverrides::default());
    }

    #[test]
    fn single_paragraph() {
        let doc = parse("Hello world.\n");
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(doc.blocks[0].kind, BlockKind::Paragraph);
        assert_eq!(doc.blocks[0].content, "Hello world.");
        assert_eq!(doc.blocks[0].line_start, 1);
    }

    #[test]
    fn headings_extracted() {
        let src = "# Title\n\nBody\n\n## Section\n\nMore\n\n### Sub\n";
        let doc = parse(src);

        assert_eq!(doc.headings.len(), 3);

        assert_eq!(doc.headings[0].level, 1);
        assert_eq!(doc.headings[0].text, "Title");
        assert_eq!(doc.headings[0].line, 1);

        assert_eq!(doc.headings[1].level, 2);
        assert_eq!(doc.headings[1].text, "Section");
        assert_eq!(doc.headings[1].line, 5);

        assert_eq!(doc.headings[2].level, 3);
        assert_eq!(doc.headings[2].text, "Sub");
        assert_eq!(doc.headings[2].line, 9);
    }

    #[test]
    fn sections_group_blocks_until_next_heading() {
        let src = "# Intro\n\nOne\n\nTwo\n\n## Setup\n\nThree\n";
        let doc = parse(src);

        assert_eq!(doc.sections.len(), 2);

        assert_eq!(doc.sections[0].title, "Intro");
        assert_eq!(doc.sections[0].block_start, 0);
        assert_eq!(doc.sections[0].block_end, 3); // heading + two paragraphs

        assert_eq!(doc.sections[1].title, "Setup");
        assert_eq!(doc.sections[1].block_start, 3);
        assert_eq!(doc.sections[1].block_end, doc.blocks.len());
    }

    #[test]
    fn preamble_blocks_belong_to_no_section() {
        let src = "Lead paragraph.\n\n# First\n\nBody\n";
        let doc = parse(src);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].block_start, 1);
    }

    #[test]
    fn hero_blocks_cover_preamble_and_lead_section() {
        let src = "Lead.\n\n# Intro\n\nWelcome\n\n## Setup\n\nBody\n";
        let doc = parse(src);
        // Lead, # Intro, Welcome — everything before "## Setup".
        assert_eq!(doc.hero_blocks(), 0..3);
    }

    #[test]
    fn hero_blocks_cover_whole_single_section_document() {
        let doc = parse("# Only\n\nBody\n");
        assert_eq!(doc.hero_blocks(), 0..2);
    }

    #[test]
    fn code_block_language_captured() {
        let doc = parse("```rust\nfn main() {}\n```\n");
        assert_eq!(doc.blocks.len(), 1);
        assert_eq!(
            doc.blocks[0].kind,
            BlockKind::CodeBlock(Some("rust".to_owned()))
        );
        assert_eq!(doc.blocks[0].content, "fn main() {}\n");
    }

    #[test]
    fn bare_fence_has_no_language() {
        let doc = parse("```\nhello\n```\n");
        assert_eq!(doc.blocks[0].kind, BlockKind::CodeBlock(None));
    }

    #[test]
    fn fence_language_is_lowercased_first_token() {
        let doc = parse("```Rust title=x\nfn f() {}\n```\n");
        assert_eq!(
            doc.blocks[0].kind,
            BlockKind::CodeBlock(Some("rust".to_owned()))
        );
    }

    #[test]
    fn reveal_kinds_follow_block_kinds() {
        assert_eq!(BlockKind::Heading(1).reveal_kind(), RevealKind::Title);
        assert_eq!(BlockKind::Heading(2).reveal_kind(), RevealKind::Subtitle);
        assert_eq!(BlockKind::Heading(4).reveal_kind(), RevealKind::Subtitle);
        assert_eq!(BlockKind::CodeBlock(None).reveal_kind(), RevealKind::Zoom);
        assert_eq!(BlockKind::Table.reveal_kind(), RevealKind::Zoom);
        assert_eq!(BlockKind::Paragraph.reveal_kind(), RevealKind::Fade);
        assert_eq!(BlockKind::List.reveal_kind(), RevealKind::Fade);
    }

    #[test]
    fn unordered_list() {
        let src = "- alpha\n- beta\n- gamma\n";
        let doc = parse(src);

        let lists: Vec<&ContentBlock> = doc
            .blocks
            .iter()
            .filter(|b| b.kind == BlockKind::List)
            .collect();
        assert_eq!(lists.len(), 1);
        assert!(lists[0].content.contains("alpha"));
        assert!(lists[0].content.contains("gamma"));
    }

    #[test]
    fn block_quote() {
        let src = "> quoted text\n";
        let doc = parse(src);

        let bqs: Vec<&ContentBlock> = doc
            .blocks
            .iter()
            .filter(|b| b.kind == BlockKind::BlockQuote)
            .collect();
        assert_eq!(bqs.len(), 1);
        assert!(bqs[0].content.contains("quoted text"));
    }

    #[test]
    fn thematic_break() {
        let src = "above\n\n---\n\nbelow\n";
        let doc = parse(src);

        let breaks: Vec<&ContentBlock> = doc
            .blocks
            .iter()
            .filter(|b| b.kind == BlockKind::ThematicBreak)
            .collect();
        assert_eq!(breaks.len(), 1);
    }

    #[test]
    fn table_block() {
        let src = "| A | B |\n|---|---|\n| 1 | 2 |\n";
        let doc = parse(src);

        let tables: Vec<&ContentBlock> = doc
            .blocks
            .iter()
            .filter(|b| b.kind == BlockKind::Table)
            .collect();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].content.contains("A"));
        assert!(tables[0].content.contains("2"));
    }

    #[test]
    fn line_ranges_increase() {
        let src = "# A\n\nPara 1\n\n## B\n\nPara 2\n";
        let doc = parse(src);

        for window in doc.blocks.windows(2) {
            assert!(
                window[0].line_start <= window[1].line_start,
                "blocks should appear in source order"
            );
        }
    }

    // --- Frontmatter ---

    #[test]
    fn frontmatter_reveal_overrides_parsed() {
        let src = "---\nreveal:\n  base_delay_ms: 120\n  step_delay_ms: 100\n  threshold: 0.15\n---\n# Title\n";
        let doc = parse(src);
        assert_eq!(doc.overrides.base_delay_ms, Some(120));
        assert_eq!(doc.overrides.step_delay_ms, Some(100));
        assert_eq!(doc.overrides.threshold, Some(0.15));
        // Frontmatter is stripped: the heading is the first block.
        assert_eq!(doc.blocks[0].kind, BlockKind::Heading(1));
        assert_eq!(doc.headings[0].line, 1);
    }

    #[test]
    fn frontmatter_without_reveal_key_keeps_defaults() {
        let src = "---\ntitle: hello\n---\n# Title\n";
        let doc = parse(src);
        assert_eq!(doc.overrides, RevealOverrides::default());
        assert_eq!(doc.headings[0].text, "Title");
    }

    #[test]
    fn malformed_frontmatter_is_ignored() {
        let src = "---\nreveal: [unclosed\n---\nBody\n";
        let doc = parse(src);
        assert_eq!(doc.overrides, RevealOverrides::default());
        assert_eq!(doc.blocks.len(), 1);
    }

    #[test]
    fn unterminated_frontmatter_is_treated_as_content() {
        let src = "---\nreveal:\n  base_delay_ms: 5\n";
        let doc = parse(src);
        assert_eq!(doc.overrides, RevealOverrides::default());
        assert!(!doc.blocks.is_empty());
    }

    #[test]
    fn document_without_frontmatter_is_unchanged() {
        let doc = parse("# Plain\n\nBody\n");
        assert_eq!(doc.overrides, RevealOverrides::default());
        assert_eq!(doc.headings[0].line, 1);
    }

    #[test]
    fn mixed_document() {
        let src = "\
# Introduction

Welcome to **mdglow**.

## Features

- Progressive [reveal](https://example.com)
- Scroll-spy sidebar

```bash
mdglow README.md
```

---

> Note: still in development.
";
        let doc = parse(src);

        assert_eq!(doc.headings.len(), 2);
        assert_eq!(doc.headings[0].text, "Introduction");
        assert_eq!(doc.headings[1].text, "Features");

        assert_eq!(doc.sections.len(), 2);
        assert_eq!(doc.sections[1].title, "Features");

        let kinds: Vec<&BlockKind> = doc.blocks.iter().map(|b| &b.kind).collect();
        assert!(kinds.contains(&&BlockKind::Heading(1)));
        assert!(kinds.contains(&&BlockKind::Heading(2)));
        assert!(kinds.contains(&&BlockKind::Paragraph));
        assert!(kinds.contains(&&BlockKind::List));
        assert!(kinds.contains(&&BlockKind::CodeBlock(Some("bash".to_owned()))));
        assert!(kinds.contains(&&BlockKind::ThematicBreak));
        assert!(kinds.contains(&&BlockKind::BlockQuote));
    }
}
