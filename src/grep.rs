use crate::loader::LineStore;

/// Grep views past this size are shown without template highlighting
pub const GREP_HIGHLIGHT_LIMIT: usize = 5000;

/// Longest title before it collapses to a filter count
const MAX_TITLE_CHARS: usize = 40;

/// Lines of `source` containing any of `keywords`, with back-references
pub fn grep<S: AsRef<str>>(source: &LineStore, keywords: &[S]) -> LineStore {
    let mut lines = Vec::new();
    let mut origin = Vec::new();
    for (i, line) in source.iter().enumerate() {
        if keywords
            .iter()
            .any(|kw| !kw.as_ref().is_empty() && line.contains(kw.as_ref()))
        {
            lines.push(line.to_string());
            origin.push(i);
        }
    }
    LineStore::derived(lines, origin)
}

/// A derived view of the lines matching one or more keywords (OR)
#[derive(Clone, Debug)]
pub struct GrepView {
    keywords: Vec<String>,
    source_len: usize,
    store: LineStore,
}

impl GrepView {
    pub fn new(source: &LineStore, keyword: &str) -> Self {
        let keywords = vec![keyword.to_string()];
        Self {
            store: grep(source, &keywords),
            source_len: source.len(),
            keywords,
        }
    }

    /// Widen the view with another keyword and refilter
    pub fn add_keyword(&mut self, source: &LineStore, keyword: &str) {
        if keyword.is_empty() || self.keywords.iter().any(|k| k == keyword) {
            return;
        }
        self.keywords.push(keyword.to_string());
        self.store = grep(source, &self.keywords);
        self.source_len = source.len();
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn lines(&self) -> &LineStore {
        &self.store
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Line in the source view that line `index` of this view came from
    pub fn source_index(&self, index: usize) -> Option<usize> {
        self.store.source_index(index)
    }

    pub fn title(&self) -> String {
        let title = self.keywords.join(" + ");
        if title.chars().count() > MAX_TITLE_CHARS {
            format!("{} filters", self.keywords.len())
        } else {
            title
        }
    }

    /// "matched/total" counter
    pub fn count_label(&self) -> String {
        format!("{}/{}", self.store.len(), self.source_len)
    }

    pub fn highlight_enabled(&self) -> bool {
        self.store.len() <= GREP_HIGHLIGHT_LIMIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> LineStore {
        LineStore::from_lines(
            [
                "INFO boot",
                "ERROR disk",
                "WARN slow",
                "ERROR net",
                "INFO done",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }

    #[test]
    fn test_grep_keeps_back_references() {
        let view = GrepView::new(&source(), "ERROR");
        assert_eq!(view.lines().lines(), ["ERROR disk", "ERROR net"]);
        assert_eq!(view.source_index(0), Some(1));
        assert_eq!(view.source_index(1), Some(3));
        assert_eq!(view.source_index(2), None);
        assert!(view.lines().is_derived());
    }

    #[test]
    fn test_add_keyword_is_or() {
        let src = source();
        let mut view = GrepView::new(&src, "ERROR");
        view.add_keyword(&src, "WARN");
        assert_eq!(view.len(), 3);
        assert_eq!(
            (0..3).map(|i| view.source_index(i).unwrap()).collect::<Vec<_>>(),
            [1, 2, 3]
        );
        assert_eq!(view.title(), "ERROR + WARN");
        assert_eq!(view.count_label(), "3/5");

        view.add_keyword(&src, "WARN");
        assert_eq!(view.keywords().len(), 2);
    }

    #[test]
    fn test_case_sensitive_substring() {
        let view = GrepView::new(&source(), "error");
        assert!(view.is_empty());
        assert!(grep::<&str>(&source(), &[]).is_empty());
        assert!(grep(&source(), &[""]).is_empty());
    }

    #[test]
    fn test_long_title_collapses() {
        let src = source();
        let mut view = GrepView::new(&src, "a-very-long-keyword-number-one");
        view.add_keyword(&src, "another-long-keyword");
        assert_eq!(view.title(), "2 filters");
    }
}
