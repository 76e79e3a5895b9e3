use std::ops::Range;

use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

/// How a search pattern is interpreted
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SearchMode {
    /// Every character is literal
    #[default]
    Plain,
    /// The pattern is a regular expression
    Regex,
}

/// One search hit: line index plus a character range within that line
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Match {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

impl Match {
    pub fn new(line: usize, start: usize, end: usize) -> Self {
        Self { line, start, end }
    }
}

/// Compile a pattern the same way for searching and for highlight rules
pub fn build_matcher(
    pattern: &str,
    mode: SearchMode,
    case_sensitive: bool,
) -> Result<Regex, regex::Error> {
    let source = match mode {
        SearchMode::Plain => regex::escape(pattern),
        SearchMode::Regex => pattern.to_string(),
    };
    RegexBuilder::new(&source)
        .case_insensitive(!case_sensitive)
        .build()
}

/// Non-empty matches of `regex` in `text` as character offsets, left to right.
///
/// Zero-length matches are skipped; the regex iterator already steps past them.
pub fn char_ranges(regex: &Regex, text: &str) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    let mut byte_pos = 0;
    let mut char_pos = 0;
    for m in regex.find_iter(text) {
        if m.start() == m.end() {
            continue;
        }
        char_pos += text[byte_pos..m.start()].chars().count();
        let start = char_pos;
        char_pos += text[m.start()..m.end()].chars().count();
        byte_pos = m.end();
        ranges.push((start, char_pos));
    }
    ranges
}

/// Full-document search with a wrapping "current match" cursor
#[derive(Debug, Default)]
pub struct SearchEngine {
    pattern: String,
    matches: Vec<Match>,
    current: Option<usize>,
}

impl SearchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan every line for `pattern`, replacing any previous result.
    ///
    /// An empty or invalid pattern yields no matches.
    pub fn search<S: AsRef<str>>(
        &mut self,
        lines: &[S],
        pattern: &str,
        mode: SearchMode,
        case_sensitive: bool,
    ) -> &[Match] {
        self.pattern = pattern.to_string();
        self.matches.clear();
        self.current = None;

        if pattern.is_empty() {
            return &self.matches;
        }

        let regex = match build_matcher(pattern, mode, case_sensitive) {
            Ok(regex) => regex,
            Err(e) => {
                warn!(pattern, error = %e, "invalid search pattern");
                return &self.matches;
            }
        };

        for (line_idx, line) in lines.iter().enumerate() {
            for (start, end) in char_ranges(&regex, line.as_ref()) {
                self.matches.push(Match::new(line_idx, start, end));
            }
        }

        if !self.matches.is_empty() {
            self.current = Some(0);
        }
        debug!(pattern, count = self.matches.len(), "search finished");
        &self.matches
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn match_count(&self) -> usize {
        self.matches.len()
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current(&self) -> Option<Match> {
        self.current.and_then(|i| self.matches.get(i).copied())
    }

    /// Advance to the next match, wrapping to the first
    pub fn next(&mut self) -> Option<Match> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len();
        self.current = Some(self.current.map_or(0, |i| (i + 1) % len));
        self.current()
    }

    /// Step back to the previous match, wrapping to the last
    pub fn prev(&mut self) -> Option<Match> {
        if self.matches.is_empty() {
            return None;
        }
        let len = self.matches.len();
        self.current = Some(self.current.map_or(len - 1, |i| (i + len - 1) % len));
        self.current()
    }

    pub fn clear(&mut self) {
        self.pattern.clear();
        self.matches.clear();
        self.current = None;
    }

    /// Matches whose line falls inside `lines`
    pub fn matches_in(&self, lines: Range<usize>) -> &[Match] {
        let start = self.matches.partition_point(|m| m.line < lines.start);
        let end = self.matches.partition_point(|m| m.line < lines.end);
        &self.matches[start..end.max(start)]
    }
}
