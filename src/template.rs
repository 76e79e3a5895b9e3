//! Highlight rules, templates, and the builtin template catalog.
//!
//! The JSON field names here are the on-disk format for user templates.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;

fn default_foreground() -> String {
    "#FFFFFF".to_string()
}

fn default_priority() -> i32 {
    5
}

fn default_true() -> bool {
    true
}

/// A single (pattern, style) highlight rule
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HighlightRule {
    pub name: String,
    pub pattern: String,
    #[serde(default)]
    pub is_regex: bool,
    #[serde(default = "default_foreground")]
    pub foreground: String,
    #[serde(default)]
    pub background: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    /// Higher wins when rules overlap
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl HighlightRule {
    /// A literal rule with default styling
    pub fn plain(name: &str, pattern: &str) -> Self {
        Self {
            name: name.to_string(),
            pattern: pattern.to_string(),
            is_regex: false,
            foreground: default_foreground(),
            background: String::new(),
            bold: false,
            italic: false,
            underline: false,
            priority: default_priority(),
            enabled: true,
        }
    }

    /// A regex rule with explicit colors and priority
    pub fn regex(name: &str, pattern: &str, fg: &str, bg: &str, priority: i32) -> Self {
        Self {
            is_regex: true,
            foreground: fg.to_string(),
            background: bg.to_string(),
            priority,
            ..Self::plain(name, pattern)
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }
}

/// A named, ordered set of highlight rules
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rules: Vec<HighlightRule>,
    #[serde(default)]
    pub is_builtin: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Template {
    pub fn new(id: &str, name: &str, description: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            rules: Vec::new(),
            is_builtin: false,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    pub fn to_json(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, TemplateError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), TemplateError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self, TemplateError> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}

static BUILTINS: LazyLock<Vec<Template>> = LazyLock::new(|| {
    vec![
        general_template(),
        spring_boot_template(),
        nginx_template(),
        docker_template(),
        test_log_template(),
    ]
});

/// All builtin templates in catalog order
pub fn builtin_templates() -> &'static [Template] {
    &BUILTINS
}

/// Look up a builtin template by id
pub fn builtin_template(id: &str) -> Option<&'static Template> {
    BUILTINS.iter().find(|t| t.id == id)
}

fn builtin(id: &str, name: &str, description: &str, rules: Vec<HighlightRule>) -> Template {
    Template {
        rules,
        is_builtin: true,
        ..Template::new(id, name, description)
    }
}

fn error_rule(priority: i32) -> HighlightRule {
    HighlightRule::regex("ERROR", r"\bERROR\b", "#FF6B6B", "#4A1D1D", priority).bold()
}

fn warn_rule() -> HighlightRule {
    HighlightRule::regex("WARN", r"\bWARN\b", "#FFD93D", "#3D3020", 9).bold()
}

fn general_template() -> Template {
    builtin(
        "general",
        "General",
        "Level-based coloring for most application logs",
        vec![
            error_rule(10),
            warn_rule(),
            HighlightRule::regex("INFO", r"\bINFO\b", "#6BCF7F", "", 7),
            HighlightRule::regex("DEBUG", r"\bDEBUG\b", "#A8A8A8", "", 5),
            HighlightRule::regex(
                "Timestamp",
                r"\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}:\d{2}",
                "#7A7A7A",
                "",
                3,
            )
            .italic(),
        ],
    )
}

fn spring_boot_template() -> Template {
    builtin(
        "spring-boot",
        "Spring Boot",
        "Spring Boot application logs",
        vec![
            error_rule(10),
            warn_rule(),
            HighlightRule::regex("Tomcat started", r"Tomcat started on port", "#6BCF7F", "#1D4A1D", 8)
                .bold(),
            HighlightRule::regex(
                "SQL",
                r"\b(SELECT|INSERT|UPDATE|DELETE|CREATE|ALTER|DROP)\b",
                "#A78BFA",
                "",
                7,
            ),
            HighlightRule::regex("Stack frame", r"^\s+at\s+", "#EF4444", "#3D1D1D", 8),
            HighlightRule::regex("Bean wiring", r"Creating bean|Autowiring by", "#60A5FA", "", 6),
            HighlightRule::regex("Controller mapping", r#"Mapped ".*" onto"#, "#34D399", "", 5),
        ],
    )
}

fn nginx_template() -> Template {
    builtin(
        "nginx",
        "Nginx access log",
        "Nginx access.log format",
        vec![
            HighlightRule::regex("5xx", r#"" 5\d{2} "#, "#FF6B6B", "#4A1D1D", 10).bold(),
            HighlightRule::regex("4xx", r#"" 4\d{2} "#, "#FFD93D", "#3D3020", 9),
            HighlightRule::regex("2xx", r#"" 2\d{2} "#, "#6BCF7F", "", 7),
            HighlightRule::regex("3xx", r#"" 3\d{2} "#, "#60A5FA", "", 7),
            HighlightRule::regex(
                "IP address",
                r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b",
                "#A78BFA",
                "",
                5,
            ),
            HighlightRule::regex("HTTP method", r#""(GET|POST|PUT|DELETE|PATCH) "#, "#FFFFFF", "", 6)
                .bold(),
            HighlightRule::regex(
                "Slow response",
                r" ([1-9]\d{3,}|\d{4,}\.\d+)$",
                "#FB923C",
                "#3D2D20",
                7,
            ),
        ],
    )
}

fn docker_template() -> Template {
    builtin(
        "docker",
        "Docker container",
        "Container runtime logs",
        vec![
            HighlightRule::regex("Container ID", r"[a-f0-9]{12}", "#60A5FA", "", 6),
            HighlightRule::regex("stdout", r"\[stdout\]", "#6BCF7F", "", 7),
            HighlightRule::regex("stderr", r"\[stderr\]", "#FF6B6B", "", 7),
            HighlightRule::regex("Exit code", r"exited with code \d+", "#FFD93D", "", 8).bold(),
            error_rule(9),
        ],
    )
}

fn test_log_template() -> Template {
    builtin(
        "test-log",
        "Test run",
        "Unit and integration test output",
        vec![
            HighlightRule::regex("PASS", r"\b(PASS|PASSED)\b|✓|✅", "#6BCF7F", "#1D4A1D", 10).bold(),
            HighlightRule::regex("FAIL", r"\b(FAIL|FAILED)\b|✗|❌", "#FF6B6B", "#4A1D1D", 10).bold(),
            HighlightRule::regex("SKIP", r"\b(SKIP|SKIPPED)\b|⊘", "#FFD93D", "", 8),
            HighlightRule::regex("Test case", r"(test_\w+|Test\w+::)", "#60A5FA", "", 7).bold(),
            HighlightRule::regex("Assertion", r"Assert(ion)?Error", "#EF4444", "", 9),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::compile_rules;

    #[test]
    fn test_builtin_registry() {
        let ids: Vec<&str> = builtin_templates().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["general", "spring-boot", "nginx", "docker", "test-log"]);
        assert!(builtin_templates().iter().all(|t| t.is_builtin));
        assert_eq!(builtin_template("nginx").map(|t| t.rules.len()), Some(7));
        assert!(builtin_template("missing").is_none());
    }

    #[test]
    fn test_builtin_rules_all_compile() {
        for template in builtin_templates() {
            let compiled = compile_rules(&template.rules);
            assert_eq!(compiled.len(), template.rules.len(), "template {}", template.id);
        }
    }

    #[test]
    fn test_json_round_trip() {
        let mut template = Template::new("custom_1", "Mine", "my rules");
        template.rules.push(HighlightRule::regex("Timeout", r"timeout=\d+", "#FF0000", "#000000", 12).bold());
        let mut disabled = HighlightRule::plain("literal", "a.b");
        disabled.enabled = false;
        disabled.underline = true;
        disabled.italic = true;
        template.rules.push(disabled);
        template.created_at = "2024-12-16T10:00:00".to_string();

        let json = template.to_json().unwrap();
        let back = Template::from_json(&json).unwrap();
        assert_eq!(back, template);
        assert_eq!(back.rules, template.rules);
    }

    #[test]
    fn test_json_field_names() {
        let template = builtin_template("general").unwrap();
        let value: serde_json::Value = serde_json::from_str(&template.to_json().unwrap()).unwrap();
        for key in ["id", "name", "description", "rules", "is_builtin", "created_at", "updated_at"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        let rule = &value["rules"][0];
        for key in [
            "name", "pattern", "is_regex", "foreground", "background", "bold", "italic",
            "underline", "priority", "enabled",
        ] {
            assert!(rule.get(key).is_some(), "missing rule field {key}");
        }
    }

    #[test]
    fn test_missing_rule_fields_use_defaults() {
        let json = r#"{"id":"x","name":"X","rules":[{"name":"n","pattern":"p"}]}"#;
        let template = Template::from_json(json).unwrap();
        let rule = &template.rules[0];
        assert!(!rule.is_regex);
        assert_eq!(rule.foreground, "#FFFFFF");
        assert_eq!(rule.priority, 5);
        assert!(rule.enabled);
        assert!(!template.is_builtin);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.json");
        let template = builtin_template("docker").unwrap().clone();
        template.save_to_file(&path).unwrap();
        assert_eq!(Template::load_from_file(&path).unwrap(), template);
    }
}
