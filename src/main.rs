mod engine;
mod highlight;
mod html;
mod parse;
mod render;
mod serve;
mod viewport;
mod web_assets;

use std::{
    fs, io,
    path::Path,
    process,
    time::{Duration, Instant},
};

use clap::{Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    DefaultTerminal, Frame,
};

use engine::{HeroConfig, HeroSequencer, RevealObserver, ScrollSpy, Visibility};
use parse::ParsedDocument;
use render::RenderedDocument;
use viewport::{RevealBand, SpyBand};

/// Poll timeout while no hero reveal is pending.
const IDLE_TICK: Duration = Duration::from_millis(500);

/// View-mode animation options from the CLI.
#[derive(Clone, Copy, Default)]
struct ViewOptions {
    base_delay_ms: Option<u64>,
    step_delay_ms: Option<u64>,
    no_animate: bool,
}

/// Explicit subcommands.
#[derive(Subcommand)]
enum Commands {
    /// View a markdown file in TUI mode (equivalent to legacy positional form)
    View {
        /// Path to the markdown file
        file: String,
        /// Milliseconds before the first hero block reveals
        #[arg(long)]
        base_delay: Option<u64>,
        /// Additional milliseconds per hero block position
        #[arg(long)]
        step_delay: Option<u64>,
        /// Reveal everything immediately, skipping all animations
        #[arg(long)]
        no_animate: bool,
    },
    /// Serve a markdown file over HTTP
    Serve {
        /// Path to the markdown file
        file: String,
        /// Interface address to bind to
        #[arg(long, default_value = "127.0.0.1")]
        bind: String,
        /// Starting port number for the HTTP server
        #[arg(long, default_value = "3333")]
        port: u16,
    },
}

/// Full CLI with explicit subcommands.
#[derive(Parser)]
#[command(
    name = "mdglow",
    version,
    about = "A TUI markdown viewer with progressive reveal and scroll-spy navigation",
    after_help = "INVOCATION FORMS:\n  mdglow <file>                    View file in TUI mode (legacy)\n  mdglow view [OPTIONS] <file>     View file in TUI mode\n  mdglow serve [OPTIONS] <file>    Serve file over HTTP"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Legacy positional form: mdglow <file>
#[derive(Parser)]
#[command(
    name = "mdglow",
    version,
    about = "A TUI markdown viewer with progressive reveal and scroll-spy navigation"
)]
struct LegacyCli {
    /// Path to a markdown file to view
    file: String,
}

/// Resolved dispatch mode after CLI argument parsing.
enum DispatchMode {
    Legacy {
        file: String,
    },
    View {
        file: String,
        options: ViewOptions,
    },
    Serve {
        file: String,
        bind: String,
        port: u16,
    },
}

fn resolve_dispatch_mode() -> DispatchMode {
    match Cli::try_parse() {
        Ok(cli) => match cli.command {
            Commands::View {
                file,
                base_delay,
                step_delay,
                no_animate,
            } => DispatchMode::View {
                file,
                options: ViewOptions {
                    base_delay_ms: base_delay,
                    step_delay_ms: step_delay,
                    no_animate,
                },
            },
            Commands::Serve { file, bind, port } => DispatchMode::Serve { file, bind, port },
        },
        Err(clap_err) => {
            // Pass --help, --version, and subcommand-level help through to the full Cli handler.
            use clap::error::ErrorKind;
            if matches!(
                clap_err.kind(),
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
            ) {
                clap_err.exit();
            }
            // Fall back to legacy positional parse: mdglow <file>
            match LegacyCli::try_parse() {
                Ok(legacy) => DispatchMode::Legacy { file: legacy.file },
                Err(legacy_err) => legacy_err.exit(),
            }
        }
    }
}

fn main() -> io::Result<()> {
    match resolve_dispatch_mode() {
        DispatchMode::Legacy { file } => {
            eprintln!("[legacy] TUI viewer dispatched for: {file}");
            run_tui_file(&file, ViewOptions::default())
        }
        DispatchMode::View { file, options } => {
            eprintln!("[view] TUI viewer dispatched for: {file}");
            run_tui_file(&file, options)
        }
        DispatchMode::Serve { file, bind, port } => {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            rt.block_on(serve::run_serve(file, bind, port))
        }
    }
}

fn run_tui_file(file_arg: &str, options: ViewOptions) -> io::Result<()> {
    let path = Path::new(file_arg);

    // Check the file extension before attempting to read.
    match path.extension().and_then(|e| e.to_str()) {
        Some("md" | "markdown" | "mdx" | "mdown" | "mkd" | "mkdn") => {}
        Some(ext) => {
            eprintln!("Error: '{ext}' is not a recognized markdown extension.");
            eprintln!("Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn).");
            process::exit(1);
        }
        None => {
            eprintln!("Error: '{file_arg}' has no file extension.");
            eprintln!("Expected a markdown file (.md, .markdown, .mdx, .mdown, .mkd, .mkdn).");
            process::exit(1);
        }
    }

    let source = fs::read_to_string(path).unwrap_or_else(|e| {
        match e.kind() {
            io::ErrorKind::NotFound => {
                eprintln!("Error: file not found: {file_arg}");
            }
            io::ErrorKind::PermissionDenied => {
                eprintln!("Error: permission denied: {file_arg}");
            }
            _ => {
                eprintln!("Error reading '{file_arg}': {e}");
            }
        }
        process::exit(1);
    });

    highlight::init();
    let doc = parse::parse(&source);

    ratatui::run(|terminal| run(terminal, doc, options))
}

/// Resolve the hero timing: defaults, then frontmatter, then CLI flags.
fn resolve_hero_config(doc: &ParsedDocument, options: &ViewOptions) -> HeroConfig {
    let defaults = HeroConfig::default();
    let base_ms = options
        .base_delay_ms
        .or(doc.overrides.base_delay_ms)
        .unwrap_or(defaults.base_delay.as_millis() as u64);
    let step_ms = options
        .step_delay_ms
        .or(doc.overrides.step_delay_ms)
        .unwrap_or(defaults.step_delay.as_millis() as u64);
    HeroConfig {
        base_delay: Duration::from_millis(base_ms),
        step_delay: Duration::from_millis(step_ms),
    }
}

fn visibility_vec(reveal: &RevealObserver, count: usize) -> Vec<Visibility> {
    (0..count).map(|i| reveal.visibility(i)).collect()
}

fn run(terminal: &mut DefaultTerminal, doc: ParsedDocument, options: ViewOptions) -> io::Result<()> {
    let hero_config = resolve_hero_config(&doc, &options);
    let reveal_band = RevealBand {
        bottom_inset: 3,
        threshold: doc.overrides.threshold.unwrap_or(0.1) as f32,
    };
    let spy_band = SpyBand::default();

    // Engine state: one reveal target per block, one spy target per section.
    let mut reveal = RevealObserver::new(doc.blocks.len());
    let mut spy = ScrollSpy::with_full_nav(doc.sections.len());
    let hero_targets: Vec<usize> = doc.hero_blocks().collect();
    let mut hero = if options.no_animate {
        HeroSequencer::new(&[], hero_config)
    } else {
        HeroSequencer::new(&hero_targets, hero_config)
    };
    if options.no_animate {
        reveal.reveal_all();
    }

    let started = Instant::now();
    let mut rendered = render::render_document(&doc, &visibility_vec(&reveal, doc.blocks.len()));
    let mut total_lines = rendered.text.lines.len();
    let mut scroll_offset: usize = 0;
    let mut sidebar_visible = true;

    // Initial batch: blocks already inside the band reveal without waiting
    // for a scroll event, exactly like an intersection watch reporting its
    // registered elements once up front.
    {
        let viewport_height = terminal.size()?.height.saturating_sub(1) as usize;
        let reveal_batch =
            viewport::reveal_updates(&rendered.block_spans, 0, viewport_height, reveal_band);
        let newly = reveal.apply(&reveal_batch);
        let spy_batch = viewport::spy_updates(&rendered.section_spans, 0, viewport_height, spy_band);
        spy.apply(&spy_batch);
        if !newly.is_empty() {
            rendered = render::render_document(&doc, &visibility_vec(&reveal, doc.blocks.len()));
        }
    }

    loop {
        terminal.draw(|frame| {
            ui(
                frame,
                &doc,
                &rendered,
                scroll_offset,
                total_lines,
                spy.active(),
                sidebar_visible,
            );
        })?;

        // Sleep until input or the next hero deadline, whichever comes first.
        let timeout = match hero.next_deadline() {
            Some(at) => at
                .checked_sub(started.elapsed())
                .unwrap_or(Duration::ZERO)
                .max(Duration::from_millis(10)),
            None => IDLE_TICK,
        };

        let mut dirty = false;
        let mut visibility_changed = false;

        if event::poll(timeout)? {
            let ev = event::read()?;

            // Recalculate bounds and clamp scroll offset on every event,
            // including Event::Resize, so the view stays valid after terminal
            // resize.
            let viewport_height = terminal.size()?.height.saturating_sub(1) as usize;
            let max_scroll = total_lines.saturating_sub(viewport_height);
            scroll_offset = scroll_offset.min(max_scroll);

            if let Event::Key(key) = ev {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                match key.code {
                    KeyCode::Char('q') => return Ok(()),

                    // Single line down
                    KeyCode::Char('j') | KeyCode::Down => {
                        scroll_offset = (scroll_offset + 1).min(max_scroll);
                    }

                    // Single line up
                    KeyCode::Char('k') | KeyCode::Up => {
                        scroll_offset = scroll_offset.saturating_sub(1);
                    }

                    // Half page down
                    KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        scroll_offset = (scroll_offset + viewport_height / 2).min(max_scroll);
                    }
                    KeyCode::PageDown => {
                        scroll_offset = (scroll_offset + viewport_height / 2).min(max_scroll);
                    }

                    // Half page up
                    KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        scroll_offset = scroll_offset.saturating_sub(viewport_height / 2);
                    }
                    KeyCode::PageUp => {
                        scroll_offset = scroll_offset.saturating_sub(viewport_height / 2);
                    }

                    // Jump to top
                    KeyCode::Char('g') | KeyCode::Home => {
                        scroll_offset = 0;
                    }

                    // Jump to bottom
                    KeyCode::Char('G') | KeyCode::End => {
                        scroll_offset = max_scroll;
                    }

                    // Next heading
                    KeyCode::Char('n') => {
                        if let Some(pos) = rendered
                            .heading_lines
                            .iter()
                            .find(|h| h.rendered_line > scroll_offset)
                        {
                            scroll_offset = pos.rendered_line.min(max_scroll);
                        }
                    }

                    // Previous heading
                    KeyCode::Char('p') => {
                        if let Some(pos) = rendered
                            .heading_lines
                            .iter()
                            .rev()
                            .find(|h| h.rendered_line < scroll_offset)
                        {
                            scroll_offset = pos.rendered_line.min(max_scroll);
                        }
                    }

                    // Toggle the section sidebar
                    KeyCode::Char('s') => {
                        sidebar_visible = !sidebar_visible;
                    }

                    _ => {}
                }
            }
            dirty = true;
        }

        // Fire due hero reveals regardless of whether we woke for input or
        // on the timer; a held-down key must not starve the sequencer.
        for target in hero.due(started.elapsed()) {
            if reveal.reveal(target) {
                visibility_changed = true;
            }
        }

        if dirty {
            // Feed both watches for the (possibly moved) viewport. The
            // batches are independent; neither depends on the other's
            // output.
            let viewport_height = terminal.size()?.height.saturating_sub(1) as usize;
            let reveal_batch = viewport::reveal_updates(
                &rendered.block_spans,
                scroll_offset,
                viewport_height,
                reveal_band,
            );
            if !reveal.apply(&reveal_batch).is_empty() {
                visibility_changed = true;
            }

            let spy_batch = viewport::spy_updates(
                &rendered.section_spans,
                scroll_offset,
                viewport_height,
                spy_band,
            );
            spy.apply(&spy_batch);
        }

        if visibility_changed {
            // The veil layout is stable, so spans and line counts survive the
            // re-render unchanged.
            rendered = render::render_document(&doc, &visibility_vec(&reveal, doc.blocks.len()));
            total_lines = rendered.text.lines.len();
        }
    }
}

// ---------------------------------------------------------------------------
// UI
// ---------------------------------------------------------------------------

const SIDEBAR_WIDTH: u16 = 28;

fn ui(
    frame: &mut Frame,
    doc: &ParsedDocument,
    rendered: &RenderedDocument,
    scroll_offset: usize,
    total_lines: usize,
    active_section: Option<usize>,
    sidebar_visible: bool,
) {
    let area = frame.area();

    // Minimum usable terminal size: need width for content and height for
    // viewport + status bar.
    const MIN_WIDTH: u16 = 20;
    const MIN_HEIGHT: u16 = 5;
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let msg = "Terminal too small";
        let msg_len = msg.len() as u16;
        let x = area.x + area.width.saturating_sub(msg_len) / 2;
        let y = area.y + area.height / 2;
        let w = msg_len.min(area.width);
        if w > 0 && area.height > 0 {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    msg,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Rect::new(x, y, w, 1),
            );
        }
        return;
    }

    let rows = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(area);

    let show_sidebar = sidebar_visible && !doc.sections.is_empty() && area.width > SIDEBAR_WIDTH + MIN_WIDTH;
    let content_area = if show_sidebar {
        let cols =
            Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Min(1)]).split(rows[0]);
        render_sidebar(frame, doc, active_section, cols[0]);
        cols[1]
    } else {
        rows[0]
    };

    // Render scrolled content
    let widget = Paragraph::new(rendered.text.clone()).scroll((scroll_offset as u16, 0));
    frame.render_widget(widget, content_area);

    render_status_bar(
        frame,
        doc,
        scroll_offset,
        total_lines,
        content_area.height as usize,
        active_section,
        rows[1],
    );
}

/// Render the persistent section sidebar with the scroll-spy highlight.
fn render_sidebar(frame: &mut Frame, doc: &ParsedDocument, active: Option<usize>, area: Rect) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    lines.push(Line::from(Span::styled(
        " Sections",
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD),
    )));
    lines.push(Line::from(""));

    for (idx, section) in doc.sections.iter().enumerate() {
        let indent = "  ".repeat((section.level as usize).saturating_sub(1));
        let text = format!(" {indent}{}", section.title);
        let style = if active == Some(idx) {
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        } else {
            render::heading_style(section.level).remove_modifier(Modifier::BOLD)
        };
        lines.push(Line::from(Span::styled(text, style)));
    }

    // Keep the active entry in view when the outline outgrows the pane.
    let inner_height = area.height as usize;
    let scroll = match active {
        Some(idx) if doc.sections.len() + 2 > inner_height => {
            let entry_line = idx + 2;
            entry_line.saturating_sub(inner_height / 2)
        }
        _ => 0,
    };

    let paragraph = Paragraph::new(lines).scroll((scroll as u16, 0));
    frame.render_widget(paragraph, area);
}

fn render_status_bar(
    frame: &mut Frame,
    doc: &ParsedDocument,
    scroll_offset: usize,
    total_lines: usize,
    viewport_height: usize,
    active_section: Option<usize>,
    area: Rect,
) {
    let position = if total_lines == 0 {
        "Empty".to_owned()
    } else if total_lines <= viewport_height {
        "All".to_owned()
    } else if scroll_offset == 0 {
        "Top".to_owned()
    } else if scroll_offset >= total_lines.saturating_sub(viewport_height) {
        "Bot".to_owned()
    } else {
        let pct = (scroll_offset * 100) / total_lines;
        format!("{pct}%")
    };

    let section_ctx = active_section
        .and_then(|idx| doc.sections.get(idx))
        .map(|s| format!(" \u{00a7} {}", s.title))
        .unwrap_or_default();

    let status = format!(
        " Line {}/{} \u{2014} {}{}",
        scroll_offset + 1,
        total_lines,
        position,
        section_ctx,
    );
    let status_bar = Paragraph::new(Span::styled(
        status,
        Style::default().fg(Color::Black).bg(Color::White),
    ))
    .style(Style::default().bg(Color::White));
    frame.render_widget(status_bar, area);
}
