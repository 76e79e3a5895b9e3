use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context;
use ratatui::style::{Color, Style};
use tracing::{info, warn};
use tui_textarea::TextArea;

use loglens::config::Config;
use loglens::encoding::TextEncoding;
use loglens::export::export_lines;
use loglens::grep::GrepView;
use loglens::highlight::HighlightApplier;
use loglens::keywords::{KeywordManager, compile_keywords};
use loglens::loader::{LineStore, LoadResult};
use loglens::palette::PRESET_COLORS;
use loglens::rules::compile_rules;
use loglens::search::{SearchEngine, SearchMode};
use loglens::sources::LoadEvent;
use loglens::templates::TemplateStore;
use loglens::viewer::{LogViewer, viewer_for};

/// Default file name for exported lines
const EXPORT_FILE: &str = "loglens-export.txt";

/// Quiet period before an edited search pattern is re-run
const INPUT_DEBOUNCE_MS: u128 = 150;

/// Input mode for the application
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Typing a search pattern
    Search,
    /// Typing a keyword to grep into a new tab
    Grep,
    /// Typing a keyword to add to the current grep tab
    GrepAdd,
    /// Typing a keyword to highlight
    Keyword,
    /// Typing a name for the current keyword set
    SaveKeywords,
    /// Typing a 1-based line number to jump to
    GotoLine,
}

impl InputMode {
    pub fn prompt(&self) -> &'static str {
        match self {
            InputMode::Normal => "",
            InputMode::Search => "/",
            InputMode::Grep => "grep: ",
            InputMode::GrepAdd => "grep +",
            InputMode::Keyword => "highlight: ",
            InputMode::SaveKeywords => "save keywords as: ",
            InputMode::GotoLine => "go to line: ",
        }
    }
}

/// Where loading stands
#[derive(Debug)]
pub enum LoadStatus {
    Loading { bytes_read: u64, total: u64 },
    Ready {
        encoding: TextEncoding,
        file_size: u64,
        line_count: usize,
    },
    Failed(String),
}

/// One open view: the main file or a grep result
pub struct Tab {
    pub title: String,
    pub viewer: Box<dyn LogViewer>,
    pub search: SearchEngine,
    pub applier: HighlightApplier,
    pub grep: Option<GrepView>,
}

impl Tab {
    fn new(
        title: String,
        mut viewer: Box<dyn LogViewer>,
        grep: Option<GrepView>,
        config: &Config,
        height: u32,
        now: Instant,
    ) -> Self {
        viewer.resize(height);
        let mut applier = HighlightApplier::from_config(config);
        applier.set_document(viewer.lines(), viewer.window(), now);
        Self {
            title,
            viewer,
            search: SearchEngine::new(),
            applier,
            grep,
        }
    }

    fn lines(&self) -> &LineStore {
        self.viewer.lines()
    }

    /// Let the applier catch up with the viewport
    fn view_changed(&mut self, now: Instant) {
        self.applier
            .on_scroll(self.viewer.lines(), self.viewer.window(), &self.search, now);
    }

    fn cursor_moved(&mut self, now: Instant) {
        let cursor = self.viewer.cursor();
        self.applier
            .set_current_line(self.viewer.lines(), Some(cursor), now);
        self.view_changed(now);
    }

    /// Apply the merged overlay now instead of waiting for the debounce
    fn refresh_now(&mut self) {
        let overlay = self.applier.force_refresh(self.viewer.lines()).to_vec();
        self.viewer.apply_overlay(overlay);
    }

    fn highlight_enabled(&self) -> bool {
        self.grep.as_ref().is_none_or(GrepView::highlight_enabled)
    }
}

/// Main application state
pub struct AppState<'a> {
    pub config: Config,
    pub path: PathBuf,
    pub load: LoadStatus,
    /// Tab 0 is the loaded file; the rest are grep views of it
    pub tabs: Vec<Tab>,
    pub active_tab: usize,
    pub templates: TemplateStore,
    pub keywords: KeywordManager,
    keywords_dirty: Rc<Cell<bool>>,
    pub mode: InputMode,
    pub input: TextArea<'a>,
    pub search_is_regex: bool,
    pub case_sensitive: bool,
    /// Last time the search input changed (for debounce)
    pub input_last_change: Option<Instant>,
    pub input_needs_apply: bool,
    /// Character column of the cursor on the cursor line
    pub cursor_col: usize,
    pub view_height: u32,
    pub show_help: bool,
    pub show_side_panel: bool,
    pub should_quit: bool,
    pub status_message: Option<String>,
    clipboard: Option<arboard::Clipboard>,
    next_color: usize,
    next_keyword_set: usize,
}

impl<'a> AppState<'a> {
    pub fn new(
        config: Config,
        path: PathBuf,
        templates: TemplateStore,
        mut keywords: KeywordManager,
    ) -> Self {
        let keywords_dirty = Rc::new(Cell::new(false));
        let dirty = Rc::clone(&keywords_dirty);
        keywords.on_change(move |_| {
            dirty.set(true);
            Ok(())
        });

        Self {
            config,
            path,
            load: LoadStatus::Loading {
                bytes_read: 0,
                total: 0,
            },
            tabs: Vec::new(),
            active_tab: 0,
            templates,
            keywords,
            keywords_dirty,
            mode: InputMode::Normal,
            input: new_textarea(""),
            search_is_regex: false,
            case_sensitive: false,
            input_last_change: None,
            input_needs_apply: false,
            cursor_col: 0,
            view_height: 10,
            show_help: false,
            show_side_panel: false,
            should_quit: false,
            status_message: None,
            clipboard: None,
            next_color: 0,
            next_keyword_set: 0,
        }
    }

    pub fn handle_load_event(&mut self, event: LoadEvent) {
        match event {
            LoadEvent::Progress { bytes_read, total } => {
                self.load = LoadStatus::Loading { bytes_read, total };
            }
            LoadEvent::Finished(result) => self.finish_load(*result),
            LoadEvent::Error(e) => {
                self.status_message = Some(format!("Error: {e}"));
                self.load = LoadStatus::Failed(e.to_string());
            }
        }
    }

    fn finish_load(&mut self, result: LoadResult) {
        let now = Instant::now();
        let title = result
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| result.path.display().to_string());
        self.load = LoadStatus::Ready {
            encoding: result.encoding,
            file_size: result.file_size,
            line_count: result.line_count,
        };

        let viewer = viewer_for(result.lines, result.file_size, &self.config);
        let tab = Tab::new(title, viewer, None, &self.config, self.view_height, now);
        self.tabs = vec![tab];
        self.active_tab = 0;
        self.cursor_col = 0;
        self.apply_rules(now);
        if let Some(tab) = self.tabs.first_mut() {
            tab.cursor_moved(now);
            tab.refresh_now();
        }
        self.status_message = Some(format!(
            "Loaded {} lines ({})",
            result.line_count, result.encoding
        ));
    }

    pub fn active(&self) -> Option<&Tab> {
        self.tabs.get(self.active_tab)
    }

    pub fn active_mut(&mut self) -> Option<&mut Tab> {
        self.tabs.get_mut(self.active_tab)
    }

    /// Recompile template and keyword rules into every tab's keyword layer
    fn apply_rules(&mut self, now: Instant) {
        let template_rules = &self.templates.current().rules;
        let keywords = self.keywords.keywords();
        for tab in &mut self.tabs {
            if tab.highlight_enabled() {
                tab.applier.set_keyword_rules(
                    compile_rules(template_rules),
                    compile_keywords(keywords),
                    tab.viewer.lines(),
                    now,
                );
            } else {
                tab.applier.clear_keyword_rules(now);
            }
        }
    }

    /// Run pending debounced work; called once per event-loop turn
    pub fn tick(&mut self, now: Instant) {
        if self.keywords_dirty.replace(false) {
            self.apply_rules(now);
        }
        self.check_input_debounce();
        if let Some(tab) = self.tabs.get_mut(self.active_tab) {
            if let Some(overlay) = tab.applier.tick(now).map(<[_]>::to_vec) {
                tab.viewer.apply_overlay(overlay);
            }
        }
    }

    pub fn resize_view(&mut self, height: u32) {
        if height == self.view_height {
            return;
        }
        self.view_height = height;
        let now = Instant::now();
        for tab in &mut self.tabs {
            tab.viewer.resize(height);
            tab.view_changed(now);
        }
    }

    // Navigation

    pub fn scroll_lines(&mut self, delta: isize) {
        if let Some(tab) = self.active_mut() {
            tab.viewer.scroll_lines(delta);
            tab.view_changed(Instant::now());
        }
    }

    pub fn scroll_by_wheel(&mut self, delta: i32) {
        if let Some(tab) = self.active_mut() {
            tab.viewer.scroll_by_wheel(delta);
            tab.view_changed(Instant::now());
        }
    }

    /// Move the cursor line, scrolling to keep it on screen
    pub fn move_cursor(&mut self, delta: isize) {
        if let Some(tab) = self.active_mut() {
            let target = tab.viewer.cursor().saturating_add_signed(delta);
            tab.viewer.set_cursor(target);
            let cursor = tab.viewer.cursor();
            tab.viewer.ensure_visible(cursor);
            tab.cursor_moved(Instant::now());
        }
        self.clamp_cursor_col();
    }

    pub fn go_to_top(&mut self) {
        self.move_cursor(isize::MIN);
    }

    pub fn go_to_bottom(&mut self) {
        self.move_cursor(isize::MAX);
    }

    pub fn move_cursor_col(&mut self, delta: isize) {
        self.cursor_col = self.cursor_col.saturating_add_signed(delta);
        self.clamp_cursor_col();
    }

    fn clamp_cursor_col(&mut self) {
        let len = self
            .current_line()
            .map(|line| line.chars().count())
            .unwrap_or(0);
        self.cursor_col = self.cursor_col.min(len.saturating_sub(1));
    }

    pub fn current_line(&self) -> Option<&str> {
        self.active()
            .and_then(|tab| tab.lines().get(tab.viewer.cursor()))
    }

    /// Center the 1-based line `text` on screen, clamped to the document
    pub fn goto_line(&mut self, text: &str) {
        let Ok(n) = text.trim().parse::<usize>() else {
            self.status_message = Some(format!("Not a line number: '{}'", text.trim()));
            return;
        };
        let Some(tab) = self.active_mut() else {
            return;
        };
        let line = n.saturating_sub(1).min(tab.lines().len().saturating_sub(1));
        tab.viewer.set_cursor(line);
        tab.viewer.center_on(line);
        tab.cursor_moved(Instant::now());
        self.cursor_col = 0;
        self.status_message = Some(format!("Line {}", line + 1));
    }

    fn jump_to(&mut self, line: usize, col: usize) {
        if let Some(tab) = self.active_mut() {
            tab.viewer.set_cursor(line);
            tab.viewer.ensure_visible(line);
            tab.cursor_moved(Instant::now());
        }
        self.cursor_col = col;
        self.clamp_cursor_col();
    }

    // Input line

    pub fn begin_input(&mut self, mode: InputMode) {
        if self.tabs.is_empty() {
            self.status_message = Some("Still loading".to_string());
            return;
        }
        if mode == InputMode::GrepAdd && self.active().is_none_or(|tab| tab.grep.is_none()) {
            self.status_message = Some("Not a grep tab".to_string());
            return;
        }
        let initial = match mode {
            InputMode::Search => self
                .active()
                .map(|tab| tab.search.pattern().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        self.input = new_textarea(&initial);
        self.input.move_cursor(tui_textarea::CursorMove::End);
        self.mode = mode;
    }

    pub fn input_text(&self) -> String {
        self.input.lines().join("\n")
    }

    /// Mark that the input changed (for debounce)
    pub fn input_changed(&mut self) {
        if self.mode == InputMode::Search {
            self.input_last_change = Some(Instant::now());
            self.input_needs_apply = true;
        }
    }

    /// Re-run an edited search once typing pauses
    pub fn check_input_debounce(&mut self) {
        if let Some(last_change) = self.input_last_change {
            if last_change.elapsed().as_millis() >= INPUT_DEBOUNCE_MS && self.input_needs_apply {
                let pattern = self.input_text();
                self.run_search(&pattern);
                self.input_needs_apply = false;
            }
        }
    }

    pub fn submit_input(&mut self) {
        let text = self.input_text();
        let mode = self.mode;
        self.mode = InputMode::Normal;
        self.input_last_change = None;
        self.input_needs_apply = false;

        match mode {
            InputMode::Normal => {}
            InputMode::Search => self.run_search(&text),
            InputMode::Grep => self.open_grep_tab(&text),
            InputMode::GrepAdd => self.add_grep_keyword(&text),
            InputMode::Keyword => self.add_keyword(&text),
            InputMode::SaveKeywords => self.save_keywords(&text),
            InputMode::GotoLine => self.goto_line(&text),
        }
    }

    pub fn cancel_input(&mut self) {
        self.mode = InputMode::Normal;
        self.input_last_change = None;
        self.input_needs_apply = false;
    }

    // Search

    pub fn run_search(&mut self, pattern: &str) {
        let mode = if self.search_is_regex {
            SearchMode::Regex
        } else {
            SearchMode::Plain
        };
        let case_sensitive = self.case_sensitive;
        let Some(tab) = self.active_mut() else {
            return;
        };
        let now = Instant::now();
        let count = tab
            .search
            .search(tab.viewer.lines().lines(), pattern, mode, case_sensitive)
            .len();
        if pattern.is_empty() {
            tab.applier.clear_search(now);
            self.status_message = None;
            return;
        }
        self.status_message = Some(if count == 0 {
            format!("No matches for '{pattern}'")
        } else {
            format!("{count} matches")
        });
        if let Some(m) = self.active().and_then(|tab| tab.search.current()) {
            self.jump_to(m.line, m.start);
        }
        if let Some(tab) = self.active_mut() {
            tab.applier.set_search(tab.viewer.lines(), &tab.search, now);
        }
    }

    pub fn next_match(&mut self) {
        self.step_match(true);
    }

    pub fn prev_match(&mut self) {
        self.step_match(false);
    }

    fn step_match(&mut self, forward: bool) {
        let Some(tab) = self.active_mut() else {
            return;
        };
        let found = if forward {
            tab.search.next()
        } else {
            tab.search.prev()
        };
        let Some(m) = found else {
            self.status_message = Some("No search results".to_string());
            return;
        };
        let position = tab.search.current_index().map_or(0, |i| i + 1);
        let total = tab.search.match_count();
        self.jump_to(m.line, m.start);
        if let Some(tab) = self.active_mut() {
            tab.applier
                .set_search(tab.viewer.lines(), &tab.search, Instant::now());
        }
        self.status_message = Some(format!("Match {position}/{total}"));
    }

    pub fn clear_search(&mut self) {
        if let Some(tab) = self.active_mut() {
            let now = Instant::now();
            tab.search.clear();
            tab.applier.clear_search(now);
            tab.applier.clear_selection(now);
        }
    }

    pub fn toggle_regex_mode(&mut self) {
        self.search_is_regex = !self.search_is_regex;
        self.status_message = Some(format!(
            "Search mode: {}",
            if self.search_is_regex { "regex" } else { "plain" }
        ));
    }

    pub fn toggle_case_sensitive(&mut self) {
        self.case_sensitive = !self.case_sensitive;
        self.status_message = Some(format!(
            "Case sensitive: {}",
            if self.case_sensitive { "on" } else { "off" }
        ));
    }

    /// Echo every visible occurrence of the word under the cursor
    pub fn echo_word_at_cursor(&mut self) {
        let col = self.cursor_col;
        let Some(tab) = self.active_mut() else {
            return;
        };
        let line = tab.viewer.cursor();
        let word = tab
            .lines()
            .get(line)
            .and_then(|text| word_at(text, col))
            .unwrap_or_default();
        tab.applier
            .set_selection(tab.viewer.lines(), &word, Some((line, col)), Instant::now());
    }

    // Tabs

    pub fn open_grep_tab(&mut self, keyword: &str) {
        if keyword.is_empty() {
            return;
        }
        let Some(main) = self.tabs.first() else {
            return;
        };
        let view = GrepView::new(main.lines(), keyword);
        if view.is_empty() {
            self.status_message = Some(format!("No lines contain '{keyword}'"));
            return;
        }
        let tab = self.grep_tab(view, Instant::now());
        self.tabs.push(tab);
        self.active_tab = self.tabs.len() - 1;
        self.apply_rules(Instant::now());
        if let Some(tab) = self.active_mut() {
            tab.refresh_now();
        }
        let status = self
            .active()
            .and_then(|tab| tab.grep.as_ref())
            .map(|view| format!("{} matches", view.count_label()));
        self.status_message = status;
    }

    pub fn add_grep_keyword(&mut self, keyword: &str) {
        if keyword.is_empty() || self.active_tab == 0 {
            return;
        }
        let Some(mut view) = self.active_mut().and_then(|tab| tab.grep.take()) else {
            return;
        };
        if let Some(main) = self.tabs.first() {
            view.add_keyword(main.lines(), keyword);
        }
        let status = format!("Added: {} matches", view.len());
        let tab = self.grep_tab(view, Instant::now());
        if let Some(slot) = self.tabs.get_mut(self.active_tab) {
            *slot = tab;
        }
        self.apply_rules(Instant::now());
        if let Some(tab) = self.active_mut() {
            tab.refresh_now();
        }
        self.status_message = Some(status);
    }

    fn grep_tab(&self, view: GrepView, now: Instant) -> Tab {
        let lines = view.lines().clone();
        let bytes = lines.iter().map(|l| l.len() as u64 + 1).sum();
        let viewer = viewer_for(lines, bytes, &self.config);
        Tab::new(view.title(), viewer, Some(view), &self.config, self.view_height, now)
    }

    pub fn close_tab(&mut self) {
        if self.active_tab == 0 || self.active_tab >= self.tabs.len() {
            return;
        }
        self.tabs.remove(self.active_tab);
        self.active_tab -= 1;
        self.refresh_active();
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active_tab = (self.active_tab + 1) % self.tabs.len();
            self.refresh_active();
        }
    }

    pub fn prev_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active_tab = (self.active_tab + self.tabs.len() - 1) % self.tabs.len();
            self.refresh_active();
        }
    }

    fn refresh_active(&mut self) {
        if let Some(tab) = self.active_mut() {
            tab.refresh_now();
        }
        self.clamp_cursor_col();
    }

    /// From a grep tab, jump to the cursor line in the main view
    pub fn jump_to_source(&mut self) {
        let Some(source) = self
            .active()
            .filter(|tab| tab.grep.is_some())
            .and_then(|tab| tab.lines().source_index(tab.viewer.cursor()))
        else {
            return;
        };
        self.active_tab = 0;
        self.jump_to(source, 0);
        self.refresh_active();
    }

    // Keywords and templates

    pub fn add_keyword(&mut self, keyword: &str) {
        if keyword.is_empty() {
            return;
        }
        let color = &PRESET_COLORS[self.next_color % PRESET_COLORS.len()];
        self.next_color += 1;
        self.keywords.add_keyword(keyword, color.fg, color.bg, true);
        self.status_message = Some(format!("Highlighting '{keyword}' ({})", color.name));
    }

    pub fn clear_keywords(&mut self) {
        self.keywords.clear_all();
        self.status_message = Some("Keywords cleared".to_string());
    }

    fn save_keywords(&mut self, name: &str) {
        if name.is_empty() {
            return;
        }
        self.status_message = Some(match self.keywords.save_as_template(name) {
            Ok(()) => format!("Saved keyword set '{name}'"),
            Err(e) => format!("Error: {e}"),
        });
    }

    /// Load the saved keyword set after the one last loaded
    pub fn cycle_keyword_set(&mut self) {
        let names: Vec<String> = self
            .keywords
            .template_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        if names.is_empty() {
            self.status_message = Some("No saved keyword sets".to_string());
            return;
        }
        let name = &names[self.next_keyword_set % names.len()];
        self.next_keyword_set += 1;
        if self.keywords.load_template(name) {
            self.status_message = Some(format!("Loaded keyword set '{name}'"));
        }
    }

    /// Switch to the next template in catalog order
    pub fn cycle_template(&mut self) {
        let ids: Vec<&str> = self.templates.all().iter().map(|t| t.id.as_str()).collect();
        let current = ids
            .iter()
            .position(|id| *id == self.templates.current_id())
            .unwrap_or(0);
        let next = ids[(current + 1) % ids.len()].to_string();
        match self.templates.switch_template(&next) {
            Ok(()) => {
                let now = Instant::now();
                self.apply_rules(now);
                self.refresh_active();
                self.status_message = Some(format!("Template: {}", self.templates.current().name));
            }
            Err(e) => self.status_message = Some(format!("Error: {e}")),
        }
    }

    // Actions

    pub fn export_active(&mut self) {
        let Some(tab) = self.active() else {
            return;
        };
        let path = PathBuf::from(EXPORT_FILE);
        let message = match export_lines(tab.lines(), &path) {
            Ok(()) => format!("Exported {} lines to {}", tab.lines().len(), path.display()),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "export failed");
                format!("Export failed: {e}")
            }
        };
        self.status_message = Some(message);
    }

    pub fn copy_current_line(&mut self) -> anyhow::Result<()> {
        let Some(line) = self.current_line().map(str::to_string) else {
            return Ok(());
        };
        if self.clipboard.is_none() {
            self.clipboard = Some(arboard::Clipboard::new().context("clipboard unavailable")?);
        }
        if let Some(clipboard) = self.clipboard.as_mut() {
            clipboard.set_text(line).context("copy to clipboard")?;
        }
        info!("copied cursor line to clipboard");
        self.status_message = Some("Copied line".to_string());
        Ok(())
    }

    pub fn toggle_side_panel(&mut self) {
        self.show_side_panel = !self.show_side_panel;
    }
}

fn new_textarea<'a>(initial: &str) -> TextArea<'a> {
    let mut textarea = TextArea::new(vec![initial.to_string()]);
    textarea.set_cursor_line_style(Style::default());
    textarea.set_placeholder_text("type and press Enter...");
    textarea.set_placeholder_style(Style::default().fg(Color::DarkGray));
    textarea
}

/// The run of word characters around character column `col`
fn word_at(text: &str, col: usize) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let is_word = |c: &char| c.is_alphanumeric() || *c == '_';
    if !chars.get(col).is_some_and(is_word) {
        return None;
    }
    let start = chars[..col]
        .iter()
        .rposition(|c| !is_word(c))
        .map_or(0, |i| i + 1);
    let end = chars[col..]
        .iter()
        .position(|c| !is_word(c))
        .map_or(chars.len(), |i| col + i);
    Some(chars[start..end].iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loglens::loader::ChunkedLoader;

    fn state(dir: &std::path::Path, body: &str) -> AppState<'static> {
        let path = dir.join("app.log");
        std::fs::write(&path, body).unwrap();
        let config = Config {
            line_height: 1,
            ..Config::default()
        };
        let mut state = AppState::new(
            config,
            path.clone(),
            TemplateStore::open(dir),
            KeywordManager::open(dir),
        );
        let result = ChunkedLoader::default().load(&path, |_, _| {}).unwrap();
        state.handle_load_event(LoadEvent::Finished(Box::new(result)));
        state
    }

    #[test]
    fn test_word_at() {
        assert_eq!(word_at("disk full_now!", 2).as_deref(), Some("disk"));
        assert_eq!(word_at("disk full_now!", 7).as_deref(), Some("full_now"));
        assert_eq!(word_at("disk full_now!", 4), None);
        assert_eq!(word_at("", 0), None);
    }

    #[test]
    fn test_load_then_search_moves_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path(), "boot\nok\nERROR disk\nok\nERROR net");
        assert!(matches!(state.load, LoadStatus::Ready { line_count: 5, .. }));

        state.run_search("ERROR");
        assert_eq!(state.active().unwrap().viewer.cursor(), 2);
        state.next_match();
        assert_eq!(state.active().unwrap().viewer.cursor(), 4);
        state.next_match();
        assert_eq!(state.active().unwrap().viewer.cursor(), 2);
        assert_eq!(state.status_message.as_deref(), Some("Match 1/2"));
    }

    #[test]
    fn test_grep_tab_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path(), "a\nERROR one\nb\nWARN two\nERROR three");
        state.open_grep_tab("ERROR");
        assert_eq!(state.tabs.len(), 2);
        assert_eq!(state.active().unwrap().lines().len(), 2);

        state.add_grep_keyword("WARN");
        assert_eq!(state.active().unwrap().lines().len(), 3);
        assert_eq!(state.active().unwrap().title, "ERROR + WARN");

        state.move_cursor(2);
        state.jump_to_source();
        assert_eq!(state.active_tab, 0);
        assert_eq!(state.active().unwrap().viewer.cursor(), 4);

        state.active_tab = 1;
        state.close_tab();
        assert_eq!(state.tabs.len(), 1);
        state.close_tab();
        assert_eq!(state.tabs.len(), 1);
    }

    #[test]
    fn test_keyword_change_reaches_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = state(dir.path(), "plain text\nneedle here");
        state.add_keyword("needle");

        let later = Instant::now() + std::time::Duration::from_secs(1);
        state.tick(later);
        state.tick(later + std::time::Duration::from_secs(1));
        let overlay = state.active().unwrap().viewer.overlay();
        assert!(overlay.iter().any(|s| s.line == 1 && s.start == 0 && s.end == 6));
    }

    #[test]
    fn test_goto_line_centers_in_virtual_view() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.log");
        let body: Vec<String> = (1..=1000).map(|i| format!("entry {i}")).collect();
        std::fs::write(&path, body.join("\n")).unwrap();
        let config = Config {
            line_height: 1,
            large_file_threshold: 10,
            ..Config::default()
        };
        let mut state = AppState::new(
            config,
            path.clone(),
            TemplateStore::open(dir.path()),
            KeywordManager::open(dir.path()),
        );
        let result = ChunkedLoader::default().load(&path, |_, _| {}).unwrap();
        state.handle_load_event(LoadEvent::Finished(Box::new(result)));
        assert!(state.active().unwrap().viewer.is_virtual());

        state.goto_line("500");
        let tab = state.active().unwrap();
        assert_eq!(tab.viewer.cursor(), 499);
        assert_eq!(tab.viewer.visible_range(), 494..504);
        assert_eq!(tab.applier.current_line(), Some(499));

        state.goto_line("99999");
        assert_eq!(state.active().unwrap().viewer.cursor(), 999);
        assert_eq!(state.active().unwrap().viewer.visible_range(), 990..1000);

        state.goto_line("abc");
        assert_eq!(state.active().unwrap().viewer.cursor(), 999);
        assert_eq!(state.status_message.as_deref(), Some("Not a line number: 'abc'"));
    }

    #[test]
    fn test_scroll_lines_leaves_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let body: Vec<String> = (0..100).map(|i| format!("row {i}")).collect();
        let mut state = state(dir.path(), &body.join("\n"));
        state.scroll_lines(5);
        let tab = state.active().unwrap();
        assert_eq!(tab.viewer.visible_range().start, 5);
        assert_eq!(tab.viewer.cursor(), 0);
    }

    #[test]
    fn test_missing_file_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = AppState::new(
            Config::default(),
            dir.path().join("missing.log"),
            TemplateStore::open(dir.path()),
            KeywordManager::open(dir.path()),
        );
        let err = ChunkedLoader::default()
            .load(&dir.path().join("missing.log"), |_, _| {})
            .unwrap_err();
        state.handle_load_event(LoadEvent::Error(err));
        assert!(matches!(state.load, LoadStatus::Failed(_)));
        assert!(state.tabs.is_empty());
    }
}
