//! Windowed view over a large line array.
//!
//! Only `[top, top + visible + margin)` is ever formatted for display.

use std::fmt::Write as _;
use std::ops::Range;

use crate::config::{DEFAULT_BUFFER_MARGIN, DEFAULT_LINE_HEIGHT};
use crate::loader::LineStore;

/// Default floor on the rows a viewport reports as visible
pub const MIN_VISIBLE: usize = 10;

/// Display prefix for a 0-based line index
pub fn line_prefix(index: usize) -> String {
    format!("{:6} │ ", index + 1)
}

/// Format `range` of `lines` with line-number prefixes, one per row
pub fn render_lines(lines: &LineStore, range: Range<usize>) -> String {
    let mut out = String::new();
    for (i, line) in lines.range(range.start, range.end).iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = write!(out, "{}{}", line_prefix(range.start + i), line);
    }
    out
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Viewport {
    top: usize,
    visible: usize,
    min_visible: usize,
    margin: usize,
    line_height: u32,
    line_count: usize,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_HEIGHT, DEFAULT_BUFFER_MARGIN)
    }
}

impl Viewport {
    pub fn new(line_height: u32, margin: usize) -> Self {
        Self {
            top: 0,
            visible: MIN_VISIBLE,
            min_visible: MIN_VISIBLE,
            margin,
            line_height: line_height.max(1),
            line_count: 0,
        }
    }

    /// Lower the visible-row floor, for displays shorter than `MIN_VISIBLE` rows
    pub fn with_min_visible(mut self, min_visible: usize) -> Self {
        self.min_visible = min_visible.max(1);
        self.visible = self.visible.max(self.min_visible);
        self
    }

    /// Point the viewport at a new backing array and return to the top
    pub fn set_lines(&mut self, lines: &LineStore) {
        self.set_line_count(lines.len());
    }

    pub fn set_line_count(&mut self, line_count: usize) {
        self.line_count = line_count;
        self.top = 0;
    }

    /// Recompute the visible row count from a widget height
    pub fn resize(&mut self, height: u32) -> Range<usize> {
        self.visible = ((height / self.line_height) as usize).max(self.min_visible);
        self.top = self.top.min(self.scroll_range());
        self.window()
    }

    /// Largest valid `top`
    pub fn scroll_range(&self) -> usize {
        self.line_count.saturating_sub(self.visible)
    }

    /// Move the top of the window, clamped, and return the new render window
    pub fn on_scroll(&mut self, new_top: usize) -> Range<usize> {
        self.top = new_top.min(self.scroll_range());
        self.window()
    }

    /// Scroll by a signed number of lines
    pub fn scroll_by(&mut self, delta: isize) -> Range<usize> {
        self.on_scroll(self.top.saturating_add_signed(delta))
    }

    /// Center line `n` in the visible rows
    pub fn scroll_to_line(&mut self, n: usize) -> Range<usize> {
        let n = n.min(self.line_count.saturating_sub(1));
        self.on_scroll(n.saturating_sub(self.visible / 2))
    }

    pub fn top(&self) -> usize {
        self.top
    }

    pub fn visible_count(&self) -> usize {
        self.visible
    }

    pub fn buffer_margin(&self) -> usize {
        self.margin
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    /// Rows on screen
    pub fn visible_range(&self) -> Range<usize> {
        self.top..(self.top + self.visible).min(self.line_count)
    }

    /// Rows on screen plus the trailing margin
    pub fn window(&self) -> Range<usize> {
        self.top..(self.top + self.visible + self.margin).min(self.line_count)
    }

    pub fn contains(&self, line: usize) -> bool {
        self.visible_range().contains(&line)
    }

    /// Format the render window with line-number prefixes
    pub fn render(&self, lines: &LineStore) -> String {
        render_lines(lines, self.window())
    }
}
