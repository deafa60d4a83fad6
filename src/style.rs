use std::path::Path;

use ratatui::style::{Color, Modifier, Style as RatStyle};
use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::table::display::Rgb;

/// Color that can be serialized/deserialized
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThemeColor {
    /// Named color: "red", "blue", "cyan", etc.
    Named(NamedColor),
    /// RGB color: [255, 128, 0]
    Rgb([u8; 3]),
    /// 256-color index: 42
    Indexed(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    Gray,
    DarkGray,
    LightBlue,
    LightCyan,
    LightYellow,
    White,
    Reset,
}

impl From<ThemeColor> for Color {
    fn from(tc: ThemeColor) -> Color {
        match tc {
            ThemeColor::Named(n) => match n {
                NamedColor::Black => Color::Black,
                NamedColor::Red => Color::Red,
                NamedColor::Green => Color::Green,
                NamedColor::Yellow => Color::Yellow,
                NamedColor::Blue => Color::Blue,
                NamedColor::Magenta => Color::Magenta,
                NamedColor::Cyan => Color::Cyan,
                NamedColor::Gray => Color::Gray,
                NamedColor::DarkGray => Color::DarkGray,
                NamedColor::LightBlue => Color::LightBlue,
                NamedColor::LightCyan => Color::LightCyan,
                NamedColor::LightYellow => Color::LightYellow,
                NamedColor::White => Color::White,
                NamedColor::Reset => Color::Reset,
            },
            ThemeColor::Rgb([r, g, b]) => Color::Rgb(r, g, b),
            ThemeColor::Indexed(i) => Color::Indexed(i),
        }
    }
}

/// Terminal color for a cell's display color
pub fn cell_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

/// Style definition for a single element
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ElementStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<ThemeColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<ThemeColor>,
    pub bold: bool,
    pub italic: bool,
    pub dim: bool,
}

impl ElementStyle {
    pub fn fg(color: NamedColor) -> Self {
        Self { fg: Some(ThemeColor::Named(color)), ..Default::default() }
    }

    pub fn with_bg(mut self, color: NamedColor) -> Self {
        self.bg = Some(ThemeColor::Named(color));
        self
    }

    pub fn with_bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn with_italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn with_dim(mut self) -> Self {
        self.dim = true;
        self
    }

    pub fn to_ratatui(&self) -> RatStyle {
        let mut style = RatStyle::default();
        if let Some(fg) = self.fg {
            style = style.fg(fg.into());
        }
        if let Some(bg) = self.bg {
            style = style.bg(bg.into());
        }
        if self.bold {
            style = style.add_modifier(Modifier::BOLD);
        }
        if self.italic {
            style = style.add_modifier(Modifier::ITALIC);
        }
        if self.dim {
            style = style.add_modifier(Modifier::DIM);
        }
        style
    }
}

/// Styles for every grid element. Missing keys in a theme file fall back to
/// the light theme.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    pub name: String,
    pub header: ElementStyle,
    pub header_sorted: ElementStyle,
    pub header_filtered: ElementStyle,
    pub cell: ElementStyle,
    pub row_highlight: ElementStyle,
    pub row_number: ElementStyle,
    pub expander: ElementStyle,
    pub nested: ElementStyle,
    pub footer: ElementStyle,
    pub gauge: ElementStyle,
    pub link: ElementStyle,
    pub empty_state: ElementStyle,
    pub scrollbar: ElementStyle,
    pub status_bar: ElementStyle,
    pub message: ElementStyle,
}

impl Default for Theme {
    fn default() -> Self {
        Self::light()
    }
}

impl Theme {
    pub fn dark() -> Self {
        use NamedColor::*;
        Self {
            name: "dark".to_string(),
            header: ElementStyle::fg(LightCyan).with_bold(),
            header_sorted: ElementStyle::fg(LightYellow).with_bold(),
            header_filtered: ElementStyle::fg(Magenta).with_bold(),
            cell: ElementStyle::fg(White),
            row_highlight: ElementStyle::fg(Black).with_bg(LightCyan),
            row_number: ElementStyle::fg(Gray),
            expander: ElementStyle::fg(LightBlue),
            nested: ElementStyle::fg(Gray).with_dim(),
            footer: ElementStyle::fg(White).with_bg(DarkGray).with_bold(),
            gauge: ElementStyle::fg(Green),
            link: ElementStyle::fg(LightBlue).with_italic(),
            empty_state: ElementStyle::fg(Gray).with_italic(),
            scrollbar: ElementStyle::fg(DarkGray),
            status_bar: ElementStyle::fg(White).with_bg(DarkGray),
            message: ElementStyle::fg(LightYellow),
        }
    }

    pub fn light() -> Self {
        use NamedColor::*;
        Self {
            name: "light".to_string(),
            header: ElementStyle::fg(Blue).with_bold(),
            header_sorted: ElementStyle::fg(Magenta).with_bold(),
            header_filtered: ElementStyle::fg(Red).with_bold(),
            cell: ElementStyle::fg(Black),
            row_highlight: ElementStyle::fg(White).with_bg(Blue),
            row_number: ElementStyle::fg(Gray),
            expander: ElementStyle::fg(Blue),
            nested: ElementStyle::fg(DarkGray),
            footer: ElementStyle::fg(Black).with_bg(Gray).with_bold(),
            gauge: ElementStyle::fg(Green),
            link: ElementStyle::fg(Blue).with_italic(),
            empty_state: ElementStyle::fg(DarkGray).with_italic(),
            scrollbar: ElementStyle::fg(Gray),
            status_bar: ElementStyle::fg(Black).with_bg(Gray),
            message: ElementStyle::fg(Red),
        }
    }

    /// Load theme from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, GridError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| GridError::Read { path: path.to_path_buf(), source })?;
        toml::from_str(&content).map_err(|source| GridError::Config { path: path.to_path_buf(), source })
    }

    /// Get theme by name
    pub fn by_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "dark" => Some(Self::dark()),
            "light" => Some(Self::light()),
            _ => None,
        }
    }

    /// A built-in name, otherwise a theme file path
    pub fn resolve(name: &str) -> Result<Self, GridError> {
        match Self::by_name(name) {
            Some(theme) => Ok(theme),
            None => Self::from_file(Path::new(name)),
        }
    }
}

/// Runtime style manager
pub struct Style {
    pub theme: Theme,
}

impl Style {
    pub fn with_theme(theme: Theme) -> Self {
        Self { theme }
    }

    pub fn header(&self, sorted: bool, filtered: bool) -> RatStyle {
        match (sorted, filtered) {
            (_, true) => self.theme.header_filtered.to_ratatui(),
            (true, false) => self.theme.header_sorted.to_ratatui(),
            (false, false) => self.theme.header.to_ratatui(),
        }
    }

    pub fn cell(&self) -> RatStyle {
        self.theme.cell.to_ratatui()
    }

    pub fn row_highlight(&self) -> RatStyle {
        self.theme.row_highlight.to_ratatui()
    }

    pub fn row_number(&self) -> RatStyle {
        self.theme.row_number.to_ratatui()
    }

    pub fn expander(&self) -> RatStyle {
        self.theme.expander.to_ratatui()
    }

    pub fn nested(&self) -> RatStyle {
        self.theme.nested.to_ratatui()
    }

    pub fn footer(&self) -> RatStyle {
        self.theme.footer.to_ratatui()
    }

    pub fn gauge(&self) -> RatStyle {
        self.theme.gauge.to_ratatui()
    }

    pub fn link(&self) -> RatStyle {
        self.theme.link.to_ratatui()
    }

    pub fn empty_state(&self) -> RatStyle {
        self.theme.empty_state.to_ratatui()
    }

    pub fn scrollbar(&self) -> RatStyle {
        self.theme.scrollbar.to_ratatui()
    }

    pub fn status_bar(&self) -> RatStyle {
        self.theme.status_bar.to_ratatui()
    }

    pub fn message(&self) -> RatStyle {
        self.theme.message.to_ratatui()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builtin_names() {
        assert_eq!(Theme::by_name("DARK").map(|t| t.name), Some("dark".to_string()));
        assert!(Theme::by_name("neon").is_none());
    }

    #[test]
    fn test_partial_theme_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "name = \"mine\"").unwrap();
        writeln!(file, "[cell]").unwrap();
        writeln!(file, "fg = [10, 20, 30]").unwrap();
        writeln!(file, "bold = true").unwrap();

        let theme = Theme::resolve(&file.path().display().to_string()).unwrap();
        assert_eq!(theme.name, "mine");
        assert_eq!(theme.cell.fg, Some(ThemeColor::Rgb([10, 20, 30])));
        assert!(theme.cell.bold);
        assert_eq!(theme.header, Theme::light().header);
    }

    #[test]
    fn test_header_style_precedence() {
        let style = Style::with_theme(Theme::dark());
        assert_eq!(style.header(true, true), Theme::dark().header_filtered.to_ratatui());
        assert_eq!(style.header(true, false), Theme::dark().header_sorted.to_ratatui());
    }
}
