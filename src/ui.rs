use std::collections::HashMap;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{
        Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Scrollbar, ScrollbarOrientation,
        ScrollbarState, Tabs,
    },
};

use loglens::highlight::StyledSpan;
use loglens::palette::SpanStyle;
use loglens::viewport::line_prefix;

use crate::app::{AppState, InputMode, LoadStatus};

const SIDE_PANEL_WIDTH: u16 = 28;

/// Rows taken by the header, tab bar, status bar and input bar
pub const CHROME_HEIGHT: u16 = 4;

/// Draw the entire UI
pub fn draw(frame: &mut Frame, state: &mut AppState) {
    // Main layout: optional side panel + main content
    let main_chunks = if state.show_side_panel {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(SIDE_PANEL_WIDTH), Constraint::Min(20)])
            .split(frame.area())
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20)])
            .split(frame.area())
    };

    if state.show_side_panel {
        draw_side_panel(frame, state, main_chunks[0]);
    }

    let content_area = if state.show_side_panel {
        main_chunks[1]
    } else {
        main_chunks[0]
    };

    let content_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Length(1), // Tabs
            Constraint::Min(3),    // Log view
            Constraint::Length(1), // Status bar
            Constraint::Length(1), // Input bar
        ])
        .split(content_area);

    draw_header(frame, state, content_chunks[0]);
    draw_tabs(frame, state, content_chunks[1]);
    draw_log_view(frame, state, content_chunks[2]);
    draw_status_bar(frame, state, content_chunks[3]);
    draw_input_bar(frame, state, content_chunks[4]);

    if state.show_help {
        draw_help_overlay(frame);
    }
}

/// Templates and keywords
fn draw_side_panel(frame: &mut Frame, state: &AppState, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(state.templates.all().len() as u16 + 2),
            Constraint::Min(3),
        ])
        .split(area);

    let current = state.templates.current_id();
    let items: Vec<ListItem> = state
        .templates
        .all()
        .iter()
        .map(|t| {
            let active = t.id == current;
            let prefix = if active { "▶ " } else { "  " };
            let style = if active {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            ListItem::new(format!("{}{}", prefix, t.name)).style(style)
        })
        .collect();
    let block = Block::default()
        .title(" Templates ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(List::new(items).block(block), chunks[0]);

    let block = Block::default()
        .title(" Keywords ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    if state.keywords.keywords().is_empty() {
        let msg = Paragraph::new("  (none)")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(msg, chunks[1]);
    } else {
        let items: Vec<ListItem> = state
            .keywords
            .keywords()
            .iter()
            .map(|kw| {
                let mut style = SpanStyle::from_hex(&kw.fg_color, &kw.bg_color)
                    .bold(kw.bold)
                    .to_style();
                if !kw.enabled {
                    style = style.add_modifier(Modifier::CROSSED_OUT);
                }
                ListItem::new(format!(" {} ", kw.keyword)).style(style)
            })
            .collect();
        frame.render_widget(List::new(items).block(block), chunks[1]);
    }
}

/// Header showing the file and its load details
fn draw_header(frame: &mut Frame, state: &AppState, area: Rect) {
    let details = match &state.load {
        LoadStatus::Loading { bytes_read, total } => {
            format!(" loading {}/{}", format_size(*bytes_read), format_size(*total))
        }
        LoadStatus::Ready {
            encoding,
            file_size,
            line_count,
        } => format!(" {} lines · {} · {}", line_count, format_size(*file_size), encoding),
        LoadStatus::Failed(_) => " failed".to_string(),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            " loglens ",
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
        ),
        Span::raw("| "),
        Span::styled(
            state.path.display().to_string(),
            Style::default().fg(Color::Cyan),
        ),
        Span::styled(details, Style::default().fg(Color::Gray)),
        Span::styled(
            format!("  [{}]", state.templates.current().name),
            Style::default().fg(Color::Yellow),
        ),
    ]))
    .style(Style::default().bg(Color::DarkGray));

    frame.render_widget(header, area);
}

fn draw_tabs(frame: &mut Frame, state: &AppState, area: Rect) {
    let titles: Vec<String> = state
        .tabs
        .iter()
        .map(|tab| match &tab.grep {
            Some(view) => format!("{} ({})", tab.title, view.count_label()),
            None => tab.title.clone(),
        })
        .collect();
    let tabs = Tabs::new(titles)
        .select(state.active_tab)
        .style(Style::default().fg(Color::Gray))
        .highlight_style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD))
        .divider("│");
    frame.render_widget(tabs, area);
}

/// Draw the main log view
fn draw_log_view(frame: &mut Frame, state: &AppState, area: Rect) {
    let block = Block::default()
        .borders(if state.show_side_panel {
            Borders::LEFT
        } else {
            Borders::NONE
        })
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);
    if inner.height == 0 {
        return;
    }

    let Some(tab) = state.active() else {
        match &state.load {
            LoadStatus::Loading { bytes_read, total } => {
                let ratio = if *total == 0 {
                    0.0
                } else {
                    (*bytes_read as f64 / *total as f64).clamp(0.0, 1.0)
                };
                let gauge = Gauge::default()
                    .gauge_style(Style::default().fg(Color::Green))
                    .ratio(ratio)
                    .label(format!("Loading {:.0}%", ratio * 100.0));
                frame.render_widget(gauge, Rect { height: 1, ..inner });
            }
            LoadStatus::Failed(msg) => {
                let msg = Paragraph::new(format!("Could not open file: {msg}"))
                    .style(Style::default().fg(Color::Red));
                frame.render_widget(msg, inner);
            }
            LoadStatus::Ready { .. } => {}
        }
        return;
    };

    let lines = tab.viewer.lines();
    if lines.is_empty() {
        let msg = Paragraph::new("(empty file)").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(msg, inner);
        return;
    }

    let visible = tab.viewer.visible_range();
    let mut by_line: HashMap<usize, Vec<&StyledSpan>> = HashMap::new();
    for span in tab.viewer.overlay() {
        if visible.contains(&span.line) {
            by_line.entry(span.line).or_default().push(span);
        }
    }

    let cursor = tab.viewer.cursor();
    let rows: Vec<Line<'static>> = visible
        .clone()
        .map(|i| {
            let text = lines.get(i).unwrap_or_default();
            let spans = by_line.get(&i).map(Vec::as_slice).unwrap_or_default();
            let cursor_col = (i == cursor).then_some(state.cursor_col);
            styled_line(i, text, spans, text_width(inner.width, i), cursor_col)
        })
        .collect();
    frame.render_widget(Paragraph::new(rows), inner);

    let total = lines.len();
    if total > inner.height as usize {
        let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
            .begin_symbol(Some("▲"))
            .end_symbol(Some("▼"));
        let mut scrollbar_state = ScrollbarState::new(total).position(visible.start);
        frame.render_stateful_widget(scrollbar, area, &mut scrollbar_state);
    }
}

/// Columns left for line text once the gutter for line `index` is drawn
fn text_width(pane_width: u16, index: usize) -> usize {
    (pane_width as usize).saturating_sub(line_prefix(index).chars().count())
}

/// One display row: line-number gutter plus text styled by the overlay.
///
/// Spans are applied in order, so later layers win where they overlap.
fn styled_line(
    index: usize,
    text: &str,
    spans: &[&StyledSpan],
    max_chars: usize,
    cursor_col: Option<usize>,
) -> Line<'static> {
    let chars: Vec<char> = text.chars().take(max_chars).collect();
    let mut styles = vec![Style::default(); chars.len()];
    let mut row_style = Style::default();

    for span in spans {
        let style = span.style.to_style();
        if span.whole_line {
            row_style = row_style.patch(style);
        }
        let end = span.end.min(chars.len());
        for cell in styles.iter_mut().take(end).skip(span.start) {
            *cell = cell.patch(style);
        }
    }
    if let Some(col) = cursor_col.filter(|col| *col < chars.len()) {
        styles[col] = styles[col].add_modifier(Modifier::REVERSED);
    }

    let mut out = vec![Span::styled(
        line_prefix(index),
        Style::default().fg(Color::DarkGray),
    )];
    let mut run = String::new();
    let mut run_style = Style::default();
    for (c, style) in chars.into_iter().zip(styles) {
        if style != run_style && !run.is_empty() {
            out.push(Span::styled(std::mem::take(&mut run), run_style));
        }
        run_style = style;
        run.push(c);
    }
    if !run.is_empty() {
        out.push(Span::styled(run, run_style));
    }
    Line::from(out).style(row_style)
}

fn draw_status_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    let mode_str = match state.mode {
        InputMode::Normal => "NORMAL",
        InputMode::Search => "SEARCH",
        InputMode::Grep | InputMode::GrepAdd => "GREP",
        InputMode::Keyword | InputMode::SaveKeywords => "KEYWORD",
        InputMode::GotoLine => "GOTO",
    };

    let position = state
        .active()
        .map(|tab| {
            let mut s = format!(
                " {}:{}/{}",
                tab.viewer.cursor() + 1,
                state.cursor_col + 1,
                tab.viewer.lines().len()
            );
            if let Some(i) = tab.search.current_index() {
                s.push_str(&format!(" | match {}/{}", i + 1, tab.search.match_count()));
            }
            s
        })
        .unwrap_or_default();

    let indicators: Vec<&str> = [
        if state.search_is_regex { "[.*]" } else { "" },
        if state.case_sensitive { "[Aa]" } else { "" },
        if state.active().is_some_and(|tab| tab.viewer.is_virtual()) {
            "[V]"
        } else {
            ""
        },
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect();
    let indicators_str = if indicators.is_empty() {
        String::new()
    } else {
        format!(" {}", indicators.join(" "))
    };

    let help_text = match state.mode {
        InputMode::Normal => " ?:help  /:search  f:grep  m:mark  t:template ",
        InputMode::Search => " Enter:apply  Esc:cancel  Ctrl+r:regex ",
        _ => " Enter:apply  Esc:cancel ",
    };

    let status = Line::from(vec![
        Span::styled(
            format!(" {} ", mode_str),
            Style::default().bg(Color::Blue).fg(Color::White),
        ),
        Span::raw(format!("{}{} ", position, indicators_str)),
        Span::styled(help_text, Style::default().fg(Color::DarkGray)),
    ]);

    let paragraph = Paragraph::new(status).style(Style::default().bg(Color::Black));
    frame.render_widget(paragraph, area);
}

/// Draw the input bar, or the status message outside input modes
fn draw_input_bar(frame: &mut Frame, state: &AppState, area: Rect) {
    if state.mode == InputMode::Normal {
        if let Some(msg) = &state.status_message {
            let content = Line::from(Span::styled(
                msg.as_str(),
                Style::default().fg(Color::Yellow),
            ));
            frame.render_widget(Paragraph::new(content), area);
        }
        return;
    }

    let prompt = state.mode.prompt();
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(prompt.chars().count() as u16),
            Constraint::Min(1),
        ])
        .split(area);

    let prefix = Paragraph::new(prompt).style(Style::default().fg(Color::Yellow));
    frame.render_widget(prefix, chunks[0]);
    frame.render_widget(&state.input, chunks[1]);
}

fn draw_help_overlay(frame: &mut Frame) {
    let area = frame.area();

    let width = 54.min(area.width.saturating_sub(4));
    let height = 34.min(area.height.saturating_sub(4));
    let x = (area.width - width) / 2;
    let y = (area.height - height) / 2;
    let help_area = Rect::new(x, y, width, height);

    frame.render_widget(Clear, help_area);

    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Navigation:"),
        Line::from("  j/k, ↑/↓     Move cursor line"),
        Line::from("  h/l, ←/→     Move cursor column"),
        Line::from("  g/G          Go to top/bottom"),
        Line::from("  :            Go to line number"),
        Line::from("  Ctrl+e/y     Scroll view without moving cursor"),
        Line::from("  Ctrl+u/d     Page up/down"),
        Line::from("  Mouse wheel  Scroll"),
        Line::from(""),
        Line::from("Search:"),
        Line::from("  /            Search"),
        Line::from("  n/N          Next/previous match"),
        Line::from("  r / i        Toggle regex / case sensitivity"),
        Line::from("  *            Highlight word under cursor"),
        Line::from("  Esc          Clear search highlights"),
        Line::from(""),
        Line::from("Grep tabs:"),
        Line::from("  f / F        Grep to new tab / add to this tab"),
        Line::from("  Tab          Next tab"),
        Line::from("  Enter        Jump to line in main view"),
        Line::from("  x            Close grep tab"),
        Line::from(""),
        Line::from("Highlighting:"),
        Line::from("  t            Next template"),
        Line::from("  m / M        Mark keyword / clear keywords"),
        Line::from("  S / L        Save / load keyword set"),
        Line::from(""),
        Line::from("  e  export   y  copy line   b  side panel   q  quit"),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .style(Style::default().bg(Color::Black));

    frame.render_widget(Paragraph::new(help_text).block(block), help_area);
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}
