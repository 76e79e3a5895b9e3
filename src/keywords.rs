//! User keyword highlights with change notification and named keyword sets.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::TemplateError;
use crate::palette::SpanStyle;
use crate::rules::CompiledRule;
use crate::search::{SearchMode, build_matcher};

const KEYWORD_TEMPLATES_FILE: &str = "keyword_templates.json";

/// User keywords rank above every template rule
pub const USER_KEYWORD_PRIORITY: i32 = 100;

fn default_fg() -> String {
    "#FF6B6B".to_string()
}

fn default_bg() -> String {
    "#4A1D1D".to_string()
}

fn default_true() -> bool {
    true
}

/// One highlighted keyword
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordHighlight {
    pub keyword: String,
    #[serde(default = "default_fg")]
    pub fg_color: String,
    #[serde(default = "default_bg")]
    pub bg_color: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl KeywordHighlight {
    pub fn new(keyword: &str, fg_color: &str, bg_color: &str, bold: bool) -> Self {
        Self {
            keyword: keyword.to_string(),
            fg_color: fg_color.to_string(),
            bg_color: bg_color.to_string(),
            bold,
            enabled: true,
        }
    }
}

/// A saved set of keywords
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordTemplate {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<KeywordHighlight>,
}

/// Compile enabled keywords into case-insensitive literal matchers
pub fn compile_keywords(keywords: &[KeywordHighlight]) -> Vec<CompiledRule> {
    keywords
        .iter()
        .filter(|kw| kw.enabled && !kw.keyword.is_empty())
        .filter_map(|kw| match build_matcher(&kw.keyword, SearchMode::Plain, false) {
            Ok(regex) => Some(CompiledRule {
                name: kw.keyword.clone(),
                regex,
                style: SpanStyle::from_hex(&kw.fg_color, &kw.bg_color).bold(kw.bold),
                priority: USER_KEYWORD_PRIORITY,
            }),
            Err(e) => {
                warn!(keyword = %kw.keyword, error = %e, "skipping keyword");
                None
            }
        })
        .collect()
}

type Observer = Box<dyn FnMut(&[KeywordHighlight]) -> anyhow::Result<()>>;

/// Active keyword list plus persisted keyword templates
pub struct KeywordManager {
    keywords: Vec<KeywordHighlight>,
    templates: BTreeMap<String, KeywordTemplate>,
    observers: Vec<Observer>,
    file: PathBuf,
}

impl KeywordManager {
    /// Open the manager, reading saved keyword templates from `dir`
    pub fn open(dir: &Path) -> Self {
        let mut manager = Self {
            keywords: Vec::new(),
            templates: BTreeMap::new(),
            observers: Vec::new(),
            file: dir.join(KEYWORD_TEMPLATES_FILE),
        };
        manager.load_templates();
        manager
    }

    /// Add a keyword, or restyle and re-enable it if already present
    pub fn add_keyword(&mut self, keyword: &str, fg_color: &str, bg_color: &str, bold: bool) {
        match self.keywords.iter_mut().find(|kw| kw.keyword == keyword) {
            Some(existing) => {
                existing.fg_color = fg_color.to_string();
                existing.bg_color = bg_color.to_string();
                existing.bold = bold;
                existing.enabled = true;
            }
            None => self
                .keywords
                .push(KeywordHighlight::new(keyword, fg_color, bg_color, bold)),
        }
        self.notify();
    }

    pub fn remove_keyword(&mut self, keyword: &str) -> bool {
        let Some(pos) = self.keywords.iter().position(|kw| kw.keyword == keyword) else {
            return false;
        };
        self.keywords.remove(pos);
        self.notify();
        true
    }

    pub fn toggle_keyword(&mut self, keyword: &str) -> bool {
        let Some(kw) = self.keywords.iter_mut().find(|kw| kw.keyword == keyword) else {
            return false;
        };
        kw.enabled = !kw.enabled;
        self.notify();
        true
    }

    pub fn find_keyword(&self, keyword: &str) -> Option<&KeywordHighlight> {
        self.keywords.iter().find(|kw| kw.keyword == keyword)
    }

    pub fn clear_all(&mut self) {
        self.keywords.clear();
        self.notify();
    }

    pub fn keywords(&self) -> &[KeywordHighlight] {
        &self.keywords
    }

    pub fn enabled_keywords(&self) -> Vec<&KeywordHighlight> {
        self.keywords.iter().filter(|kw| kw.enabled).collect()
    }

    /// Register a callback run after every change to the keyword list
    pub fn on_change(
        &mut self,
        observer: impl FnMut(&[KeywordHighlight]) -> anyhow::Result<()> + 'static,
    ) {
        self.observers.push(Box::new(observer));
    }

    fn notify(&mut self) {
        for (i, observer) in self.observers.iter_mut().enumerate() {
            if let Err(e) = observer(&self.keywords) {
                warn!(observer = i, error = %e, "keyword observer failed");
            }
        }
    }

    /// Save the current keywords under `name`
    pub fn save_as_template(&mut self, name: &str) -> Result<(), TemplateError> {
        self.templates.insert(
            name.to_string(),
            KeywordTemplate {
                name: name.to_string(),
                keywords: self.keywords.clone(),
            },
        );
        self.save_templates()
    }

    /// Replace the current keywords with a saved set
    pub fn load_template(&mut self, name: &str) -> bool {
        let Some(template) = self.templates.get(name) else {
            return false;
        };
        self.keywords = template.keywords.clone();
        self.notify();
        true
    }

    pub fn delete_template(&mut self, name: &str) -> Result<bool, TemplateError> {
        if self.templates.remove(name).is_none() {
            return Ok(false);
        }
        self.save_templates()?;
        Ok(true)
    }

    pub fn template_names(&self) -> Vec<&str> {
        self.templates.keys().map(String::as_str).collect()
    }

    fn load_templates(&mut self) {
        let Ok(text) = fs::read_to_string(&self.file) else {
            return;
        };
        match serde_json::from_str::<BTreeMap<String, KeywordTemplate>>(&text) {
            Ok(templates) => self.templates = templates,
            Err(e) => warn!(path = %self.file.display(), error = %e, "malformed keyword templates"),
        }
    }

    fn save_templates(&self) -> Result<(), TemplateError> {
        if let Some(parent) = self.file.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.file, serde_json::to_string_pretty(&self.templates)?)?;
        Ok(())
    }
}
