use ratatui::style::{Color, Modifier, Style};

/// A preset foreground/background pair offered for keyword highlights
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PresetColor {
    pub name: &'static str,
    pub fg: &'static str,
    pub bg: &'static str,
}

/// Warm presets tuned for dark backgrounds
pub const PRESET_COLORS: &[PresetColor] = &[
    PresetColor { name: "Red", fg: "#FF6B6B", bg: "#4A1D1D" },
    PresetColor { name: "Orange", fg: "#FF9F43", bg: "#4A2D1D" },
    PresetColor { name: "Yellow", fg: "#FFD93D", bg: "#3D3020" },
    PresetColor { name: "Green", fg: "#6BCF7F", bg: "#1D4A1D" },
    PresetColor { name: "Cyan", fg: "#4ECDC4", bg: "#1D3D3D" },
    PresetColor { name: "Blue", fg: "#60A5FA", bg: "#1D2D4A" },
    PresetColor { name: "Purple", fg: "#A78BFA", bg: "#2D1D4A" },
    PresetColor { name: "Pink", fg: "#F472B6", bg: "#4A1D3D" },
    PresetColor { name: "White", fg: "#FFFFFF", bg: "#3A3A3A" },
    PresetColor { name: "Gray", fg: "#A8A8A8", bg: "#2A2A2A" },
];

/// Look up a preset by name, ignoring case
pub fn preset(name: &str) -> Option<&'static PresetColor> {
    PRESET_COLORS.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Parse `#RRGGBB` (or `RRGGBB`). Empty or malformed strings give `None`.
pub fn parse_hex(color: &str) -> Option<Color> {
    let hex = color.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::Rgb(channel(0)?, channel(2)?, channel(4)?))
}

/// Visual attributes attached to a highlight span
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl SpanStyle {
    pub fn from_hex(fg: &str, bg: &str) -> Self {
        Self {
            fg: parse_hex(fg),
            bg: parse_hex(bg),
            ..Self::default()
        }
    }

    pub fn bold(mut self, bold: bool) -> Self {
        self.bold = bold;
        self
    }

    pub fn italic(mut self, italic: bool) -> Self {
        self.italic = italic;
        self
    }

    pub fn underline(mut self, underline: bool) -> Self {
        self.underline = underline;
        self
    }

    /// Convert to a ratatui style for the terminal front-end
    pub fn to_style(&self) -> Style {
        let mut style = Style::default();
        if let Some(fg) = self.fg {
            style = style.fg(fg);
        }
        if let Some(bg) = self.bg {
            style = style.bg(bg);
        }
        if self.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.underline {
            style = style.add_modifier(Modifier::UNDERLINED);
        }
        style
    }
}

// Styles for the transient highlight layers
pub const CURRENT_LINE_BG: Color = Color::Rgb(58, 50, 24);
pub const SEARCH_FG: Color = Color::Rgb(0, 0, 0);
pub const SEARCH_BG: Color = Color::Rgb(255, 230, 109);
pub const CURRENT_MATCH_BG: Color = Color::Rgb(255, 149, 0);
pub const SELECTION_FG: Color = Color::Rgb(26, 26, 26);
pub const SELECTION_BG: Color = Color::Rgb(255, 235, 59);
pub const CURRENT_SELECTION_FG: Color = Color::Rgb(255, 255, 255);
