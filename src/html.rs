//! HTML rendering module for serve mode.
//!
//! Converts markdown text to HTML using comrak with GFM extensions, then
//! post-processes the output for the reveal pipeline: heading anchors,
//! section wrappers for the scroll-spy, syntect-highlighted code blocks, and
//! math placeholders for KaTeX. The page shell embeds the client reveal
//! configuration as JSON so the served script and the TUI agree on timing.
//!
//! The TUI parse/render path (`parse.rs`, `render.rs`) is not touched here.

use std::collections::HashMap;
use std::path::Path;

use comrak::{
    arena_tree::NodeEdge,
    format_html,
    nodes::{AstNode, NodeValue},
    parse_document, Arena, Options,
};

use crate::engine;
use crate::highlight;
use crate::parse::RevealOverrides;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// A heading extracted from the document for TOC construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadingEntry {
    /// Heading level (1–6).
    pub level: u8,
    /// Plain-text content of the heading.
    pub text: String,
    /// URL-safe anchor ID, deduplicated within the document.
    ///
    /// The first occurrence of a heading slug is bare (e.g. `my-heading`);
    /// subsequent occurrences receive a numeric suffix (`my-heading-1`,
    /// `my-heading-2`).
    pub anchor_id: String,
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// Build comrak render options with GFM extensions and secure defaults.
///
/// Raw HTML from input is stripped and replaced with
/// `<!-- raw HTML omitted -->` (`render.unsafe_ = false`).
fn make_options() -> Options<'static> {
    let mut options = Options::default();
    options.extension.strikethrough = true;
    options.extension.table = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.unsafe_ = false;
    options
}

/// Convert heading text to a URL-safe anchor slug.
///
/// Algorithm: lowercase the text, map spaces/hyphens/underscores to `-`,
/// strip all other non-alphanumeric characters, collapse consecutive
/// hyphens, and trim leading/trailing hyphens.
fn slugify(text: &str) -> String {
    let mut slug = String::new();
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if c == ' ' || c == '-' || c == '_' {
            if !slug.ends_with('-') {
                slug.push('-');
            }
        }
        // all other characters are dropped
    }
    slug.trim_matches('-').to_owned()
}

/// Recursively collect plain-text content of a heading AST node.
fn collect_heading_text<'a>(node: &'a AstNode<'a>) -> String {
    let mut text = String::new();
    for child in node.children() {
        match &child.data.borrow().value {
            NodeValue::Text(s) => text.push_str(s),
            NodeValue::Code(c) => text.push_str(&c.literal),
            NodeValue::SoftBreak | NodeValue::LineBreak => text.push(' '),
            _ => text.push_str(&collect_heading_text(child)),
        }
    }
    text
}

/// Minimal HTML entity escaping for text content and attribute values.
fn html_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inject `id` attributes into heading elements in the rendered HTML
/// fragment.
///
/// Performs sequential first-occurrence replacements: `<hN>` → `<hN id="...">`.
/// Because `render.unsafe_ = false` is set, comrak will never emit bare
/// `<hN>` tags from raw-HTML inputs in the markdown source, so replacements
/// only hit genuine heading elements generated from markdown headings.
fn inject_heading_ids(html: &str, headings: &[HeadingEntry]) -> String {
    let mut result = html.to_owned();
    for heading in headings {
        let tag = format!("<h{}>", heading.level);
        let with_id = format!("<h{} id=\"{}\">", heading.level, heading.anchor_id);
        result = result.replacen(&tag, &with_id, 1);
    }
    result
}

/// Build the `<ul>…</ul>` HTML for the TOC sidebar.
///
/// Each entry links to its heading anchor; the served script resolves a
/// section's nav link by matching this href against the section's anchor.
/// Returns an empty string when `headings` is empty.
fn build_toc_html(headings: &[HeadingEntry]) -> String {
    if headings.is_empty() {
        return String::new();
    }
    let mut html = String::from("<ul>\n");
    for heading in headings {
        let class = format!("toc-h{}", heading.level);
        let anchor = heading.anchor_id.as_str(); // anchor_id is already a URL-safe slug
        let text = html_escape(&heading.text);
        html.push_str(&format!(
            "<li class=\"{class}\"><a class=\"toc-link\" href=\"#{anchor}\">{text}</a></li>\n",
        ));
    }
    html.push_str("</ul>\n");
    html
}

/// Returns true when a fenced code block info string denotes math.
///
/// Matching is case-insensitive and based on the first whitespace-delimited
/// token of the info string.
fn is_math_info(info: &str) -> bool {
    info.split_whitespace()
        .next()
        .map(|lang| lang.eq_ignore_ascii_case("math"))
        .unwrap_or(false)
}

/// Rewrite `math` fenced code blocks into display-math placeholders:
/// `<div class="math-block">$$…$$</div>`.
///
/// The KaTeX auto-render pass picks up the `$$` delimiters client-side.
/// Math source is HTML-escaped before insertion so it is never injected as
/// raw HTML; malformed math is KaTeX's problem and is configured not to
/// throw.
fn rewrite_math_code_blocks<'a>(root: &'a AstNode<'a>) -> usize {
    let mut rewritten = 0usize;

    for node in root.descendants() {
        let replacement = {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::CodeBlock(ncb) if ncb.fenced && is_math_info(&ncb.info) => {
                    Some(format!(
                        "<div class=\"math-block\">$${}$$</div>\n",
                        html_escape(ncb.literal.trim_end())
                    ))
                }
                _ => None,
            }
        };

        if let Some(raw_html) = replacement {
            node.data.borrow_mut().value = NodeValue::Raw(raw_html);
            rewritten += 1;
        }
    }

    rewritten
}

/// Rewrite fenced code blocks with a known language into syntect-highlighted
/// `<pre>` fragments. Unknown languages keep comrak's plain rendering.
///
/// # Returns
/// `(rewritten, skipped)` — counts of code blocks highlighted and left as-is.
fn rewrite_highlighted_code_blocks<'a>(root: &'a AstNode<'a>) -> (usize, usize) {
    let mut rewritten = 0usize;
    let mut skipped = 0usize;

    for node in root.descendants() {
        let replacement = {
            let data = node.data.borrow();
            match &data.value {
                NodeValue::CodeBlock(ncb) if ncb.fenced && !is_math_info(&ncb.info) => {
                    let lang = ncb.info.split_whitespace().next();
                    match highlight::html_pre(&ncb.literal, lang) {
                        Some(pre) => Some(pre),
                        None => {
                            skipped += 1;
                            None
                        }
                    }
                }
                _ => None,
            }
        };

        if let Some(raw_html) = replacement {
            node.data.borrow_mut().value = NodeValue::Raw(raw_html);
            rewritten += 1;
        }
    }

    (rewritten, skipped)
}

/// Wrap the rendered fragment into `<section>` elements at heading
/// boundaries.
///
/// The first section (document preamble plus the lead heading's content, up
/// to the second heading) is the hero and carries `class="doc-section hero"`.
/// Every section records the anchor of its first heading as `data-anchor`,
/// which the served script uses to resolve the section's nav link. A
/// document with no headings becomes a single hero section with no anchor.
fn wrap_sections(html: &str, headings: &[HeadingEntry]) -> String {
    fn open_tag(hero: bool, anchor: Option<&str>) -> String {
        let class = if hero { "doc-section hero" } else { "doc-section" };
        match anchor {
            Some(anchor) => format!("<section class=\"{class}\" data-anchor=\"{anchor}\">\n"),
            None => format!("<section class=\"{class}\">\n"),
        }
    }

    if headings.is_empty() {
        return format!("{}{html}</section>\n", open_tag(true, None));
    }

    // Byte offsets of each heading's (id-injected) open tag, in order.
    let mut offsets: Vec<usize> = Vec::with_capacity(headings.len());
    let mut search_from = 0usize;
    for heading in headings {
        let tag = format!("<h{} id=\"{}\">", heading.level, heading.anchor_id);
        match html[search_from..].find(&tag) {
            Some(rel) => {
                let pos = search_from + rel;
                offsets.push(pos);
                search_from = pos + tag.len();
            }
            None => {
                // Injection and extraction disagree; serve the fragment
                // unwrapped rather than corrupt it.
                return html.to_owned();
            }
        }
    }

    let mut out = String::with_capacity(html.len() + headings.len() * 64);
    out.push_str(&open_tag(true, Some(&headings[0].anchor_id)));
    // The hero runs until the second heading; each later heading starts a
    // fresh section.
    for (i, heading) in headings.iter().enumerate().skip(1) {
        let prev_end = offsets[i];
        let prev_start = if i == 1 { 0 } else { offsets[i - 1] };
        out.push_str(&html[prev_start..prev_end]);
        out.push_str("</section>\n");
        out.push_str(&open_tag(false, Some(&heading.anchor_id)));
    }
    let tail_start = if headings.len() == 1 { 0 } else { offsets[headings.len() - 1] };
    out.push_str(&html[tail_start..]);
    out.push_str("</section>\n");
    out
}

/// Serialize the client reveal configuration, applying frontmatter
/// overrides. The shell embeds this as `window.mdglowConfig`.
fn client_config_json(overrides: &RevealOverrides) -> String {
    let hero = engine::HeroConfig::default();
    let base_delay_ms = overrides
        .base_delay_ms
        .unwrap_or(hero.base_delay.as_millis() as u64);
    let step_delay_ms = overrides
        .step_delay_ms
        .unwrap_or(hero.step_delay.as_millis() as u64);
    let threshold = overrides.threshold.unwrap_or(0.1);

    serde_json::json!({
        "hero": {
            "baseDelayMs": base_delay_ms,
            "stepDelayMs": step_delay_ms,
        },
        "reveal": {
            "threshold": threshold,
            "rootMargin": "0px 0px -100px 0px",
        },
        "spy": {
            "threshold": 0,
            "rootMargin": "-100px 0px -70% 0px",
        },
    })
    .to_string()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Render a markdown string (frontmatter already stripped) to HTML and
/// extract heading metadata.
///
/// # Returns
/// `(html, headings)` where `html` is the section-wrapped fragment and
/// `headings` is the ordered list of [`HeadingEntry`] values for TOC
/// construction.
pub fn render_markdown(input: &str, file_path: &Path) -> (String, Vec<HeadingEntry>) {
    let arena = Arena::new();
    let options = make_options();
    let root = parse_document(&arena, input, &options);

    let math_rewritten = rewrite_math_code_blocks(root);
    let (code_rewritten, code_skipped) = rewrite_highlighted_code_blocks(root);
    eprintln!(
        "[rewrite] file={} math={} highlighted={} plain={}",
        file_path.display(),
        math_rewritten,
        code_rewritten,
        code_skipped
    );

    // --- Extract headings with per-document slug deduplication ---
    let mut entries: Vec<HeadingEntry> = Vec::new();
    // Maps base slug → number of times it has been seen so far.
    let mut slug_counter: HashMap<String, usize> = HashMap::new();

    for edge in root.traverse() {
        if let NodeEdge::Start(node) = edge {
            if let NodeValue::Heading(nh) = &node.data.borrow().value {
                let level = nh.level;
                let text = collect_heading_text(node);
                let base_slug = slugify(&text);

                let count = slug_counter.entry(base_slug.clone()).or_insert(0);
                let anchor_id = if *count == 0 {
                    // First occurrence: bare slug.
                    *count = 1;
                    base_slug.clone()
                } else {
                    // Subsequent occurrences: slug-N where N starts at 1.
                    let n = *count;
                    *count += 1;
                    format!("{}-{}", base_slug, n)
                };

                entries.push(HeadingEntry {
                    level,
                    text,
                    anchor_id,
                });
            }
        }
    }

    // --- Render to HTML ---
    let mut html_bytes = Vec::new();
    format_html(root, &options, &mut html_bytes).expect("comrak HTML formatting should not fail");
    let html = String::from_utf8(html_bytes).expect("comrak output must be valid UTF-8");

    let html = inject_heading_ids(&html, &entries);
    let html = wrap_sections(&html, &entries);

    eprintln!(
        "[render] path={} headings={} sections={}",
        file_path.display(),
        entries.len(),
        entries.len().max(1)
    );

    (html, entries)
}

/// Build the full HTML page shell: `<!DOCTYPE html>` with sticky TOC
/// sidebar, section-wrapped content, KaTeX math rendering, and the embedded
/// reveal assets.
///
/// # Parameters
/// - `body_html`: the section-wrapped fragment from [`render_markdown`].
/// - `headings`: ordered heading entries for the TOC.
/// - `file_path`: absolute path to the source `.md` file (title fallback).
/// - `overrides`: frontmatter reveal overrides folded into the client
///   config.
pub fn build_page_shell(
    body_html: &str,
    headings: &[HeadingEntry],
    file_path: &Path,
    overrides: &RevealOverrides,
) -> String {
    // Page title: first H1 text, then file stem, then a safe default.
    let title_raw = headings
        .iter()
        .find(|h| h.level == 1)
        .map(|h| h.text.as_str())
        .or_else(|| file_path.file_stem().and_then(|s| s.to_str()))
        .unwrap_or("Document");

    let title = html_escape(title_raw);
    let toc_html = build_toc_html(headings);
    let config_json = client_config_json(overrides);

    // KaTeX is pinned (not @latest) for reproducibility and to avoid silent
    // breakage from upstream CDN updates. auto-render scans the page once at
    // startup; throwOnError=false swallows malformed math instead of
    // breaking the render (configured in mdglow.js).
    const KATEX_CSS_URL: &str =
        "https://cdn.jsdelivr.net/npm/katex@0.16.21/dist/katex.min.css";
    const KATEX_JS_URL: &str = "https://cdn.jsdelivr.net/npm/katex@0.16.21/dist/katex.min.js";
    const KATEX_AUTORENDER_URL: &str =
        "https://cdn.jsdelivr.net/npm/katex@0.16.21/dist/contrib/auto-render.min.js";

    format!(
        "<!DOCTYPE html>\n\
<html lang=\"en\">\n\
<head>\n\
<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
<title>{title} · mdglow serve</title>\n\
<link rel=\"stylesheet\" href=\"{KATEX_CSS_URL}\">\n\
<link rel=\"stylesheet\" href=\"/assets/mdglow.css\">\n\
<script>window.mdglowConfig = {config_json};</script>\n\
</head>\n\
<body>\n\
<div class=\"layout\">\n\
<nav class=\"toc-sidebar\">\n\
{toc_html}</nav>\n\
<main class=\"content\">\n\
{body_html}</main>\n\
</div>\n\
<script defer src=\"{KATEX_JS_URL}\"></script>\n\
<script defer src=\"{KATEX_AUTORENDER_URL}\"></script>\n\
<script src=\"/assets/mdglow.js\"></script>\n\
</body>\n\
</html>\n"
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
