//! Display-side views over a loaded document.
//!
//! Small files use [`PlainViewer`], which renders the whole document.
//! Files past the large-file threshold use [`VirtualViewer`], which only
//! materializes the viewport window. Both report the on-screen rows plus a
//! trailing margin as their highlight window.

use std::ops::Range;

use crate::config::Config;
use crate::highlight::StyledSpan;
use crate::loader::LineStore;
use crate::viewport::{MIN_VISIBLE, Viewport, render_lines};

/// Pixels per wheel notch step
const WHEEL_STEP: i32 = 40;

/// What the highlight applier and front-end need from a viewer
pub trait LogViewer {
    fn lines(&self) -> &LineStore;

    /// On-screen lines plus the trailing margin; highlight layers stay inside it
    fn window(&self) -> Range<usize>;

    /// Lines on screen
    fn visible_range(&self) -> Range<usize>;

    /// Materialized lines as prefixed text
    fn render(&self) -> String;

    fn cursor(&self) -> usize;

    fn set_cursor(&mut self, line: usize);

    /// Scroll so `line` is on screen
    fn ensure_visible(&mut self, line: usize);

    /// Scroll so `line` sits in the middle of the screen
    fn center_on(&mut self, line: usize);

    fn scroll_lines(&mut self, delta: isize);

    fn resize(&mut self, height: u32);

    /// Replace the transient style overlay
    fn apply_overlay(&mut self, spans: Vec<StyledSpan>);

    fn overlay(&self) -> &[StyledSpan];

    /// Scroll for a wheel delta in pixels; positive scrolls up
    fn scroll_by_wheel(&mut self, delta: i32) {
        self.scroll_lines(-(delta / WHEEL_STEP) as isize);
    }

    fn is_virtual(&self) -> bool {
        false
    }
}

/// Whole-document viewer for small files
#[derive(Debug)]
pub struct PlainViewer {
    lines: LineStore,
    top: usize,
    height: usize,
    margin: usize,
    cursor: usize,
    overlay: Vec<StyledSpan>,
}

impl PlainViewer {
    pub fn new(lines: LineStore, margin: usize) -> Self {
        Self {
            lines,
            top: 0,
            height: MIN_VISIBLE,
            margin,
            cursor: 0,
            overlay: Vec::new(),
        }
    }

    fn max_top(&self) -> usize {
        self.lines.len().saturating_sub(self.height)
    }
}

impl LogViewer for PlainViewer {
    fn lines(&self) -> &LineStore {
        &self.lines
    }

    fn window(&self) -> Range<usize> {
        self.top..(self.top + self.height + self.margin).min(self.lines.len())
    }

    fn visible_range(&self) -> Range<usize> {
        self.top..(self.top + self.height).min(self.lines.len())
    }

    fn render(&self) -> String {
        render_lines(&self.lines, 0..self.lines.len())
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, line: usize) {
        self.cursor = line.min(self.lines.len().saturating_sub(1));
    }

    fn ensure_visible(&mut self, line: usize) {
        if line < self.top {
            self.top = line;
        } else if line >= self.top + self.height {
            self.top = line + 1 - self.height;
        }
        self.top = self.top.min(self.max_top());
    }

    fn center_on(&mut self, line: usize) {
        self.top = line.saturating_sub(self.height / 2).min(self.max_top());
    }

    fn scroll_lines(&mut self, delta: isize) {
        self.top = self.top.saturating_add_signed(delta).min(self.max_top());
    }

    fn resize(&mut self, height: u32) {
        self.height = (height as usize).max(1);
        self.top = self.top.min(self.max_top());
    }

    fn apply_overlay(&mut self, spans: Vec<StyledSpan>) {
        self.overlay = spans;
    }

    fn overlay(&self) -> &[StyledSpan] {
        &self.overlay
    }
}

/// Windowed viewer for large files
#[derive(Debug)]
pub struct VirtualViewer {
    lines: LineStore,
    viewport: Viewport,
    cursor: usize,
    overlay: Vec<StyledSpan>,
}

impl VirtualViewer {
    pub fn new(lines: LineStore, mut viewport: Viewport) -> Self {
        viewport.set_lines(&lines);
        Self {
            lines,
            viewport,
            cursor: 0,
            overlay: Vec::new(),
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }
}

impl LogViewer for VirtualViewer {
    fn lines(&self) -> &LineStore {
        &self.lines
    }

    fn window(&self) -> Range<usize> {
        self.viewport.window()
    }

    fn visible_range(&self) -> Range<usize> {
        self.viewport.visible_range()
    }

    fn render(&self) -> String {
        self.viewport.render(&self.lines)
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn set_cursor(&mut self, line: usize) {
        self.cursor = line.min(self.lines.len().saturating_sub(1));
    }

    fn ensure_visible(&mut self, line: usize) {
        if !self.viewport.contains(line) {
            self.viewport.scroll_to_line(line);
        }
    }

    fn center_on(&mut self, line: usize) {
        self.viewport.scroll_to_line(line);
    }

    fn scroll_lines(&mut self, delta: isize) {
        self.viewport.scroll_by(delta);
    }

    fn resize(&mut self, height: u32) {
        self.viewport.resize(height);
    }

    fn apply_overlay(&mut self, spans: Vec<StyledSpan>) {
        self.overlay = spans;
    }

    fn overlay(&self) -> &[StyledSpan] {
        &self.overlay
    }

    fn is_virtual(&self) -> bool {
        true
    }
}

/// Pick the viewer variant for a file of `file_size` bytes
pub fn viewer_for(lines: LineStore, file_size: u64, config: &Config) -> Box<dyn LogViewer> {
    if file_size > config.large_file_threshold {
        let viewport = Viewport::new(config.line_height, config.buffer_margin)
            .with_min_visible(config.min_visible_lines);
        Box::new(VirtualViewer::new(lines, viewport))
    } else {
        Box::new(PlainViewer::new(lines, config.buffer_margin))
    }
}
