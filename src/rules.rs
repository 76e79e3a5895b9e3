use regex::Regex;
use tracing::warn;

use crate::palette::SpanStyle;
use crate::search::{SearchMode, build_matcher, char_ranges};
use crate::template::HighlightRule;

/// A highlight rule ready for matching
#[derive(Clone, Debug)]
pub struct CompiledRule {
    pub name: String,
    pub regex: Regex,
    pub style: SpanStyle,
    pub priority: i32,
}

impl CompiledRule {
    /// Character ranges this rule covers in `text`
    pub fn find(&self, text: &str) -> Vec<(usize, usize)> {
        char_ranges(&self.regex, text)
    }
}

/// Compile `rules` into matchers sorted by descending priority.
///
/// Ties keep their original order. Disabled rules and rules whose regex
/// does not compile are left out.
pub fn compile_rules(rules: &[HighlightRule]) -> Vec<CompiledRule> {
    let mut compiled: Vec<CompiledRule> = rules
        .iter()
        .filter(|rule| rule.enabled)
        .filter_map(|rule| {
            let mode = if rule.is_regex {
                SearchMode::Regex
            } else {
                SearchMode::Plain
            };
            match build_matcher(&rule.pattern, mode, true) {
                Ok(regex) => Some(CompiledRule {
                    name: rule.name.clone(),
                    regex,
                    style: SpanStyle::from_hex(&rule.foreground, &rule.background)
                        .bold(rule.bold)
                        .italic(rule.italic)
                        .underline(rule.underline),
                    priority: rule.priority,
                }),
                Err(e) => {
                    warn!(rule = %rule.name, pattern = %rule.pattern, error = %e, "skipping highlight rule");
                    None
                }
            }
        })
        .collect();

    compiled.sort_by(|a, b| b.priority.cmp(&a.priority));
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(compiled: &[CompiledRule]) -> Vec<&str> {
        compiled.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_sorted_by_priority_stable() {
        let rules = vec![
            HighlightRule::regex("low", "a", "#111111", "", 1),
            HighlightRule::regex("high-1", "b", "#111111", "", 9),
            HighlightRule::regex("mid", "c", "#111111", "", 5),
            HighlightRule::regex("high-2", "d", "#111111", "", 9),
        ];
        assert_eq!(names(&compile_rules(&rules)), ["high-1", "high-2", "mid", "low"]);
    }

    #[test]
    fn test_disabled_and_invalid_skipped() {
        let mut disabled = HighlightRule::plain("off", "x");
        disabled.enabled = false;
        let rules = vec![
            disabled,
            HighlightRule::regex("broken", "([a-", "#111111", "", 5),
            HighlightRule::plain("ok", "y"),
        ];
        assert_eq!(names(&compile_rules(&rules)), ["ok"]);
    }

    #[test]
    fn test_plain_pattern_is_literal() {
        let compiled = compile_rules(&[HighlightRule::plain("price", "$100")]);
        assert_eq!(compiled[0].find("Price: $100.00"), [(7, 11)]);
        assert!(compiled[0].find("100").is_empty());
    }

    #[test]
    fn test_rule_style() {
        let mut rule = HighlightRule::regex("e", "E", "#FF0000", "#00FF00", 3).bold();
        rule.underline = true;
        let compiled = compile_rules(&[rule]);
        let style = compiled[0].style;
        assert!(style.bold && style.underline && !style.italic);
        assert!(style.fg.is_some() && style.bg.is_some());
    }

    #[test]
    fn test_rules_are_case_sensitive() {
        let compiled = compile_rules(&[HighlightRule::regex("err", r"\bERROR\b", "#FF0000", "", 1)]);
        assert_eq!(compiled[0].find("error ERROR"), [(6, 11)]);
    }
}
