use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::viewport::MIN_VISIBLE;

/// Bytes read per chunk while loading
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024 * 1024;
/// Files larger than this open in the virtual viewer
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;
/// Extra lines rendered past the bottom of the viewport
pub const DEFAULT_BUFFER_MARGIN: usize = 50;
/// Documents at or above this many lines only get keyword spans for the viewport
pub const DEFAULT_KEYWORD_FULL_SCAN_LIMIT: usize = 3000;
/// Roughly one frame at 60fps
pub const DEFAULT_DEBOUNCE_MS: u64 = 16;
/// Pixel height of a line in pixel-based displays
pub const DEFAULT_LINE_HEIGHT: u32 = 18;
pub const DEFAULT_CHANNEL_BUFFER: usize = 64;
/// Builtin template used when nothing else is selected
pub const DEFAULT_TEMPLATE_ID: &str = "general";

/// Configuration for loglens
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub chunk_size: usize,
    pub large_file_threshold: u64,
    pub buffer_margin: usize,
    pub keyword_full_scan_limit: usize,
    pub debounce_ms: u64,
    pub line_height: u32,
    /// Floor on the rows a virtual viewport treats as visible
    pub min_visible_lines: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
            buffer_margin: DEFAULT_BUFFER_MARGIN,
            keyword_full_scan_limit: DEFAULT_KEYWORD_FULL_SCAN_LIMIT,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            line_height: DEFAULT_LINE_HEIGHT,
            min_visible_lines: MIN_VISIBLE,
        }
    }
}

impl Config {
    /// Read `settings.toml` from the config directory, then apply env overrides
    pub fn from_env() -> Self {
        let mut config = config_dir()
            .map(|dir| Self::from_file(&dir.join("settings.toml")))
            .unwrap_or_default();
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Parse a settings file. A missing or malformed file yields the defaults.
    pub fn from_file(path: &Path) -> Self {
        let Ok(text) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        Self::from_toml_str(&text).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
            Self::default()
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        let config: Self = toml::from_str(text)?;
        Ok(config.sanitized())
    }

    /// Apply `LOGLENS_*` overrides looked up through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());

        if let Some(v) = parse("LOGLENS_CHUNK_SIZE") {
            self.chunk_size = v as usize;
        }
        if let Some(v) = parse("LOGLENS_LARGE_FILE") {
            self.large_file_threshold = v;
        }
        if let Some(v) = parse("LOGLENS_BUFFER_MARGIN") {
            self.buffer_margin = v as usize;
        }
        if let Some(v) = parse("LOGLENS_DEBOUNCE_MS") {
            self.debounce_ms = v;
        }
        *self = self.clone().sanitized();
    }

    fn sanitized(mut self) -> Self {
        if self.chunk_size == 0 {
            self.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        if self.line_height == 0 {
            self.line_height = 1;
        }
        self.min_visible_lines = self.min_visible_lines.max(1);
        self
    }
}

/// Per-user directory holding templates, settings and the log file
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("loglens"))
        .or_else(|| dirs::home_dir().map(|home| home.join(".loglens")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.buffer_margin, 50);
        assert_eq!(config.keyword_full_scan_limit, 3000);
        assert_eq!(config.debounce_ms, 16);
        assert_eq!(config.min_visible_lines, 10);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str("chunk_size = 4096\nline_height = 1\n").unwrap();
        assert_eq!(config.chunk_size, 4096);
        assert_eq!(config.line_height, 1);
        assert_eq!(config.large_file_threshold, DEFAULT_LARGE_FILE_THRESHOLD);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let config = Config::from_toml_str("chunk_size = 0").unwrap();
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_overrides(|key| match key {
            "LOGLENS_CHUNK_SIZE" => Some("1024".to_string()),
            "LOGLENS_DEBOUNCE_MS" => Some("not a number".to_string()),
            _ => None,
        });
        assert_eq!(config.chunk_size, 1024);
        assert_eq!(config.debounce_ms, DEFAULT_DEBOUNCE_MS);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = Config::from_file(Path::new("/nope/settings.toml"));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
    }
}
