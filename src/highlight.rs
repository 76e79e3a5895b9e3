//! Layered, debounced highlight overlay.
//!
//! Each layer holds its own spans. Layer updates only schedule an apply; the
//! merged overlay is rebuilt when the [`Debouncer`] fires, so a burst of
//! scroll or keystroke events costs one merge.

use std::ops::Range;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::config::Config;
use crate::loader::LineStore;
use crate::palette::{
    CURRENT_LINE_BG, CURRENT_MATCH_BG, CURRENT_SELECTION_FG, SEARCH_BG, SEARCH_FG, SELECTION_BG,
    SELECTION_FG, SpanStyle,
};
use crate::rules::CompiledRule;
use crate::search::{SearchEngine, SearchMode, build_matcher, char_ranges};

/// Shortest selected word that gets echoed
const MIN_SELECTION_CHARS: usize = 2;

/// Single-shot timer whose deadline moves on every reschedule
#[derive(Clone, Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Start the timer, or push back a pending deadline
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// True once per schedule, the first time `now` reaches the deadline
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Highlight layers, lowest priority first
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayerKind {
    CurrentLine,
    Keyword,
    Selection,
    Search,
}

impl LayerKind {
    pub const ALL: [LayerKind; 4] = [
        LayerKind::CurrentLine,
        LayerKind::Keyword,
        LayerKind::Selection,
        LayerKind::Search,
    ];

    /// Merge rank; higher layers are applied later and win on overlap
    pub fn priority(self) -> i32 {
        match self {
            LayerKind::CurrentLine => 5,
            LayerKind::Keyword => 10,
            LayerKind::Selection => 20,
            LayerKind::Search => 30,
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// A styled character range within one line
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StyledSpan {
    pub line: usize,
    pub start: usize,
    pub end: usize,
    pub style: SpanStyle,
    /// Tints the whole row, not just the characters
    pub whole_line: bool,
}

impl StyledSpan {
    pub fn new(line: usize, start: usize, end: usize, style: SpanStyle) -> Self {
        Self {
            line,
            start,
            end,
            style,
            whole_line: false,
        }
    }

    /// Row tint covering all of `text` on `line`
    pub fn full_line(line: usize, text: &str, style: SpanStyle) -> Self {
        Self {
            whole_line: true,
            ..Self::new(line, 0, text.chars().count(), style)
        }
    }
}

#[derive(Debug)]
struct Layer {
    spans: Vec<StyledSpan>,
    enabled: bool,
}

impl Default for Layer {
    fn default() -> Self {
        Self {
            spans: Vec::new(),
            enabled: true,
        }
    }
}

#[derive(Debug)]
struct SelectionEcho {
    word: String,
    cursor: Option<(usize, usize)>,
}

fn line_tint() -> SpanStyle {
    SpanStyle {
        bg: Some(CURRENT_LINE_BG),
        ..SpanStyle::default()
    }
}

fn search_style() -> SpanStyle {
    SpanStyle {
        fg: Some(SEARCH_FG),
        bg: Some(SEARCH_BG),
        ..SpanStyle::default()
    }
}

fn current_match_style() -> SpanStyle {
    SpanStyle {
        fg: Some(SEARCH_FG),
        bg: Some(CURRENT_MATCH_BG),
        bold: true,
        underline: true,
        ..SpanStyle::default()
    }
}

fn selection_style(current: bool) -> SpanStyle {
    if current {
        SpanStyle {
            fg: Some(CURRENT_SELECTION_FG),
            bg: Some(CURRENT_MATCH_BG),
            bold: true,
            underline: true,
            ..SpanStyle::default()
        }
    } else {
        SpanStyle {
            fg: Some(SELECTION_FG),
            bg: Some(SELECTION_BG),
            ..SpanStyle::default()
        }
    }
}

/// Spans for every rule hit in `range`, line by line.
///
/// `rules` must be in ascending priority so stronger rules land later.
fn rule_spans(rules: &[CompiledRule], lines: &LineStore, range: Range<usize>) -> Vec<StyledSpan> {
    let mut spans = Vec::new();
    for (offset, text) in lines.range(range.start, range.end).iter().enumerate() {
        let line = range.start + offset;
        for rule in rules {
            spans.extend(
                rule.find(text)
                    .into_iter()
                    .map(|(start, end)| StyledSpan::new(line, start, end, rule.style)),
            );
        }
    }
    spans
}

/// Builds the merged overlay from the current-line, keyword, selection, and
/// search layers.
#[derive(Debug)]
pub struct HighlightApplier {
    layers: [Layer; 4],
    debounce: Debouncer,
    /// Template rules then user keywords, ascending priority
    rules: Vec<CompiledRule>,
    full_scan_limit: usize,
    /// Keyword layer holds the whole document for the current rules
    keywords_cached: bool,
    window: Range<usize>,
    current_line: Option<usize>,
    selection: Option<SelectionEcho>,
    search_active: bool,
    overlay: Vec<StyledSpan>,
}

impl HighlightApplier {
    pub fn new(debounce: Duration, full_scan_limit: usize) -> Self {
        Self {
            layers: Default::default(),
            debounce: Debouncer::new(debounce),
            rules: Vec::new(),
            full_scan_limit,
            keywords_cached: false,
            window: 0..0,
            current_line: None,
            selection: None,
            search_active: false,
            overlay: Vec::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Duration::from_millis(config.debounce_ms),
            config.keyword_full_scan_limit,
        )
    }

    /// Drop all per-document state after new content is loaded
    pub fn set_document(&mut self, lines: &LineStore, window: Range<usize>, now: Instant) {
        for layer in &mut self.layers {
            layer.spans.clear();
        }
        self.window = window;
        self.current_line = None;
        self.selection = None;
        self.search_active = false;
        self.keywords_cached = false;
        self.refresh_keywords(lines);
        self.request_apply(now);
    }

    /// Install template rules and user keyword rules for the keyword layer.
    ///
    /// Both lists arrive in descending priority, as compiled. User keywords
    /// are applied after every template rule.
    pub fn set_keyword_rules(
        &mut self,
        template_rules: Vec<CompiledRule>,
        keyword_rules: Vec<CompiledRule>,
        lines: &LineStore,
        now: Instant,
    ) {
        self.rules = template_rules
            .into_iter()
            .rev()
            .chain(keyword_rules.into_iter().rev())
            .collect();
        self.keywords_cached = false;
        self.refresh_keywords(lines);
        self.request_apply(now);
    }

    pub fn clear_keyword_rules(&mut self, now: Instant) {
        self.rules.clear();
        self.keywords_cached = false;
        self.layer_mut(LayerKind::Keyword).spans.clear();
        self.request_apply(now);
    }

    /// Echo every visible occurrence of `word`; the one under `cursor` is marked current
    pub fn set_selection(
        &mut self,
        lines: &LineStore,
        word: &str,
        cursor: Option<(usize, usize)>,
        now: Instant,
    ) {
        let word = word.trim();
        if word.chars().count() < MIN_SELECTION_CHARS {
            self.clear_selection(now);
            return;
        }
        self.selection = Some(SelectionEcho {
            word: word.to_string(),
            cursor,
        });
        self.refresh_selection(lines);
        self.request_apply(now);
    }

    pub fn clear_selection(&mut self, now: Instant) {
        self.selection = None;
        self.layer_mut(LayerKind::Selection).spans.clear();
        self.request_apply(now);
    }

    /// Show the engine's matches for the rendered lines
    pub fn set_search(&mut self, lines: &LineStore, search: &SearchEngine, now: Instant) {
        self.search_active = true;
        self.refresh_search(lines, search);
        self.request_apply(now);
    }

    pub fn clear_search(&mut self, now: Instant) {
        self.search_active = false;
        self.layer_mut(LayerKind::Search).spans.clear();
        self.request_apply(now);
    }

    pub fn set_current_line(&mut self, lines: &LineStore, line: Option<usize>, now: Instant) {
        self.current_line = line;
        let spans = line
            .and_then(|i| lines.get(i).map(|text| StyledSpan::full_line(i, text, line_tint())))
            .into_iter()
            .collect();
        self.layer_mut(LayerKind::CurrentLine).spans = spans;
        self.request_apply(now);
    }

    pub fn set_layer_enabled(&mut self, kind: LayerKind, enabled: bool, now: Instant) {
        self.layer_mut(kind).enabled = enabled;
        self.request_apply(now);
    }

    /// Recompute the window-bound layers after the viewport moved
    pub fn on_scroll(
        &mut self,
        lines: &LineStore,
        window: Range<usize>,
        search: &SearchEngine,
        now: Instant,
    ) {
        if window == self.window {
            return;
        }
        self.window = window;
        let keywords_windowed = !self.rules.is_empty() && !self.keywords_cached;
        if keywords_windowed {
            self.refresh_keywords(lines);
        }
        if self.selection.is_some() {
            self.refresh_selection(lines);
        }
        if self.search_active {
            self.refresh_search(lines, search);
        }
        if keywords_windowed || self.selection.is_some() || self.search_active {
            self.request_apply(now);
        }
    }

    pub fn request_apply(&mut self, now: Instant) {
        self.debounce.schedule(now);
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// Merge the layers if the debounce timer has fired
    pub fn tick(&mut self, now: Instant) -> Option<&[StyledSpan]> {
        if !self.debounce.fire_if_due(now) {
            return None;
        }
        self.merge();
        Some(&self.overlay)
    }

    /// Rebuild keywords and merge immediately, bypassing the timer
    pub fn force_refresh(&mut self, lines: &LineStore) -> &[StyledSpan] {
        self.debounce.cancel();
        self.keywords_cached = false;
        self.refresh_keywords(lines);
        self.merge();
        &self.overlay
    }

    pub fn current_line(&self) -> Option<usize> {
        self.current_line
    }

    /// Last merged overlay
    pub fn overlay(&self) -> &[StyledSpan] {
        &self.overlay
    }

    pub fn layer(&self, kind: LayerKind) -> &[StyledSpan] {
        &self.layers[kind.index()].spans
    }

    fn layer_mut(&mut self, kind: LayerKind) -> &mut Layer {
        &mut self.layers[kind.index()]
    }

    fn merge(&mut self) {
        self.overlay.clear();
        for kind in LayerKind::ALL {
            let layer = &self.layers[kind.index()];
            if layer.enabled {
                self.overlay.extend_from_slice(&layer.spans);
            }
        }
        trace!(spans = self.overlay.len(), "overlay merged");
    }

    fn refresh_keywords(&mut self, lines: &LineStore) {
        if self.rules.is_empty() {
            self.layer_mut(LayerKind::Keyword).spans.clear();
            return;
        }
        if lines.len() < self.full_scan_limit {
            if !self.keywords_cached {
                let spans = rule_spans(&self.rules, lines, 0..lines.len());
                debug!(spans = spans.len(), "keyword layer scanned whole document");
                self.layer_mut(LayerKind::Keyword).spans = spans;
                self.keywords_cached = true;
            }
        } else {
            let spans = rule_spans(&self.rules, lines, self.window.clone());
            self.layer_mut(LayerKind::Keyword).spans = spans;
            self.keywords_cached = false;
        }
    }

    fn refresh_selection(&mut self, lines: &LineStore) {
        let Some(echo) = &self.selection else {
            return;
        };
        let spans = match build_matcher(&echo.word, SearchMode::Plain, false) {
            Ok(regex) => {
                let mut spans = Vec::new();
                for (offset, text) in lines
                    .range(self.window.start, self.window.end)
                    .iter()
                    .enumerate()
                {
                    let line = self.window.start + offset;
                    for (start, end) in char_ranges(&regex, text) {
                        let current = echo
                            .cursor
                            .is_some_and(|(l, col)| l == line && start <= col && col <= end);
                        spans.push(StyledSpan::new(line, start, end, selection_style(current)));
                    }
                }
                spans
            }
            Err(_) => Vec::new(),
        };
        self.layer_mut(LayerKind::Selection).spans = spans;
    }

    fn refresh_search(&mut self, lines: &LineStore, search: &SearchEngine) {
        let current = search.current();
        let mut spans = Vec::new();
        if let Some(m) = current.filter(|m| self.window.contains(&m.line)) {
            if let Some(text) = lines.get(m.line) {
                spans.push(StyledSpan::full_line(m.line, text, line_tint()));
            }
        }
        for m in search.matches_in(self.window.clone()) {
            let style = if Some(*m) == current {
                current_match_style()
            } else {
                search_style()
            };
            spans.push(StyledSpan::new(m.line, m.start, m.end, style));
        }
        self.layer_mut(LayerKind::Search).spans = spans;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::{KeywordHighlight, compile_keywords};
    use crate::rules::compile_rules;
    use crate::template::HighlightRule;

    const DELAY: Duration = Duration::from_millis(16);

    fn store(lines: &[&str]) -> LineStore {
        LineStore::from_lines(lines.iter().map(|s| s.to_string()).collect())
    }

    fn big_store(n: usize) -> LineStore {
        LineStore::from_lines((0..n).map(|i| format!("{i} ERROR here")).collect())
    }

    fn applier(limit: usize) -> HighlightApplier {
        HighlightApplier::new(DELAY, limit)
    }

    fn error_rules() -> Vec<CompiledRule> {
        compile_rules(&[HighlightRule::regex("err", "ERROR", "#FF0000", "", 10)])
    }

    #[test]
    fn test_debouncer_reschedule_resets_deadline() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(DELAY);
        assert!(!d.fire_if_due(t0));

        d.schedule(t0);
        d.schedule(t0 + Duration::from_millis(10));
        assert!(!d.fire_if_due(t0 + Duration::from_millis(20)));
        assert!(d.fire_if_due(t0 + Duration::from_millis(26)));
        assert!(!d.fire_if_due(t0 + Duration::from_millis(100)));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_burst_collapses_into_one_apply() {
        let lines = store(&["ERROR one", "two"]);
        let t0 = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..2, t0);
        a.set_keyword_rules(error_rules(), Vec::new(), &lines, t0);
        a.set_current_line(&lines, Some(1), t0 + Duration::from_millis(5));
        a.set_selection(&lines, "two", None, t0 + Duration::from_millis(8));

        assert!(a.tick(t0 + Duration::from_millis(20)).is_none());
        let overlay = a.tick(t0 + Duration::from_millis(24)).unwrap().to_vec();
        assert_eq!(overlay.len(), 3);
        assert!(a.tick(t0 + Duration::from_millis(50)).is_none());
    }

    #[test]
    fn test_layers_merge_in_priority_order() {
        let lines = store(&["ERROR disk", "disk ok"]);
        let mut search = SearchEngine::new();
        search.search(lines.lines(), "ok", SearchMode::Plain, true);

        let now = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..2, now);
        a.set_search(&lines, &search, now);
        a.set_selection(&lines, "disk", None, now);
        a.set_keyword_rules(error_rules(), Vec::new(), &lines, now);
        a.set_current_line(&lines, Some(0), now);

        let overlay = a.force_refresh(&lines).to_vec();
        assert_eq!(overlay.len(), 6);
        let ranks: Vec<i32> = overlay
            .iter()
            .filter_map(|span| {
                LayerKind::ALL
                    .into_iter()
                    .find(|kind| a.layer(*kind).contains(span))
                    .map(LayerKind::priority)
            })
            .collect();
        assert_eq!(ranks, [5, 10, 20, 20, 30, 30]);
        assert!(!a.is_pending());
    }

    #[test]
    fn test_disabled_layer_left_out() {
        let lines = store(&["ERROR"]);
        let now = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..1, now);
        a.set_keyword_rules(error_rules(), Vec::new(), &lines, now);
        assert_eq!(a.force_refresh(&lines).len(), 1);

        a.set_layer_enabled(LayerKind::Keyword, false, now);
        assert!(a.force_refresh(&lines).is_empty());
        assert_eq!(a.layer(LayerKind::Keyword).len(), 1);
    }

    #[test]
    fn test_small_document_scanned_once() {
        let lines = big_store(100);
        let mut a = applier(3000);
        let search = SearchEngine::new();
        let now = Instant::now();
        a.set_document(&lines, 0..10, now);
        a.set_keyword_rules(error_rules(), Vec::new(), &lines, now);
        assert_eq!(a.layer(LayerKind::Keyword).len(), 100);

        a.on_scroll(&lines, 50..60, &search, now);
        assert_eq!(a.layer(LayerKind::Keyword).len(), 100);
    }

    #[test]
    fn test_large_document_scans_window() {
        let lines = big_store(5000);
        let mut a = applier(3000);
        let search = SearchEngine::new();
        let now = Instant::now();
        a.set_document(&lines, 0..60, now);
        a.set_keyword_rules(error_rules(), Vec::new(), &lines, now);
        assert_eq!(a.layer(LayerKind::Keyword).len(), 60);

        a.on_scroll(&lines, 4000..4060, &search, now);
        let layer = a.layer(LayerKind::Keyword);
        assert_eq!(layer.len(), 60);
        assert!(layer.iter().all(|s| (4000..4060).contains(&s.line)));
    }

    #[test]
    fn test_user_keywords_applied_after_template_rules() {
        let lines = store(&["ERROR"]);
        let keywords = compile_keywords(&[KeywordHighlight::new("error", "#00FF00", "", false)]);
        let low = compile_rules(&[HighlightRule::regex("low", "ERR", "#0000FF", "", 1)]);
        let mut rules = error_rules();
        rules.extend(low);

        let now = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..1, now);
        a.set_keyword_rules(rules, keywords, &lines, now);
        let ranges: Vec<_> = a
            .layer(LayerKind::Keyword)
            .iter()
            .map(|s| (s.start, s.end))
            .collect();
        assert_eq!(ranges, [(0, 3), (0, 5), (0, 5)]);
        let last = a.layer(LayerKind::Keyword)[2];
        assert_eq!(last.style, SpanStyle::from_hex("#00FF00", ""));
    }

    #[test]
    fn test_selection_echo() {
        let lines = store(&["Disk full", "disk again disk", "x"]);
        let now = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..3, now);

        a.set_selection(&lines, "disk", Some((1, 12)), now);
        let spans = a.layer(LayerKind::Selection).to_vec();
        assert_eq!(spans.len(), 3);
        assert_eq!(spans.iter().filter(|s| s.style == selection_style(true)).count(), 1);
        assert_eq!((spans[2].line, spans[2].start), (1, 11));
        assert_eq!(spans[2].style, selection_style(true));

        a.set_selection(&lines, "d", None, now);
        assert!(a.layer(LayerKind::Selection).is_empty());
    }

    #[test]
    fn test_selection_limited_to_window() {
        let lines = big_store(200);
        let search = SearchEngine::new();
        let now = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..20, now);
        a.set_selection(&lines, "error", None, now);
        assert_eq!(a.layer(LayerKind::Selection).len(), 20);

        a.on_scroll(&lines, 100..110, &search, now);
        let layer = a.layer(LayerKind::Selection);
        assert_eq!(layer.len(), 10);
        assert_eq!(layer[0].line, 100);
    }

    #[test]
    fn test_search_layer_follows_window_and_current() {
        let lines = big_store(500);
        let mut search = SearchEngine::new();
        search.search(lines.lines(), "ERROR", SearchMode::Plain, true);
        let now = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..10, now);

        a.set_search(&lines, &search, now);
        let layer = a.layer(LayerKind::Search);
        assert_eq!(layer.len(), 11);
        assert_eq!(layer[0].style, line_tint());
        assert_eq!(layer[1].style, current_match_style());
        assert!(layer[2..].iter().all(|s| s.style == search_style()));

        a.on_scroll(&lines, 300..310, &search, now);
        let layer = a.layer(LayerKind::Search);
        assert_eq!(layer.len(), 10);
        assert_eq!(layer[0].line, 300);

        a.clear_search(now);
        a.on_scroll(&lines, 0..10, &search, now);
        assert!(a.layer(LayerKind::Search).is_empty());
    }

    #[test]
    fn test_current_line_span() {
        let lines = store(&["日志 line", ""]);
        let now = Instant::now();
        let mut a = applier(3000);
        a.set_document(&lines, 0..2, now);
        a.set_current_line(&lines, Some(0), now);
        let layer = a.layer(LayerKind::CurrentLine);
        assert_eq!(layer, [StyledSpan::full_line(0, "日志 line", line_tint())]);
        assert!(layer[0].whole_line);
        assert_eq!((layer[0].start, layer[0].end), (0, 7));
        a.set_current_line(&lines, Some(99), now);
        assert!(a.layer(LayerKind::CurrentLine).is_empty());
    }
}
