//! Grid configuration loaded from TOML

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GridError;
use crate::table::columns::ColumnLayout;
use crate::table::footer::FooterOptions;
use crate::table::rowheight::{FontSpec, HeightOptions};
use crate::table::sort::{SortKey, SortState};
use crate::table::tableview::ViewOptions;

/// Row height presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellHeight {
    #[default]
    Sm,
    Md,
    Lg,
}

impl CellHeight {
    pub fn pixels(self) -> f32 {
        match self {
            CellHeight::Sm => 36.0,
            CellHeight::Md => 42.0,
            CellHeight::Lg => 48.0,
        }
    }

    /// Terminal lines per row
    pub fn lines(self) -> f32 {
        match self {
            CellHeight::Sm | CellHeight::Md => 1.0,
            CellHeight::Lg => 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub cell_height: CellHeight,
    /// Overrides the preset when set
    pub row_height: Option<f32>,
    pub cell_padding: f32,
    pub min_column_width: f32,
    pub show_row_numbers: bool,
    pub wrap_text: bool,
    pub wrap_column: Option<String>,
    pub pagination: bool,
    pub overscan: usize,
    pub footer: FooterOptions,
    pub hover_sync: bool,
    pub initial_sort: Vec<SortKey>,
    pub font: FontSpec,
    pub nested_gutter: f32,
    /// Built-in theme name or a path to a theme file
    pub theme: Option<String>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_height: CellHeight::default(),
            row_height: None,
            cell_padding: 6.0,
            min_column_width: 150.0,
            show_row_numbers: false,
            wrap_text: false,
            wrap_column: None,
            pagination: false,
            overscan: 5,
            footer: FooterOptions::default(),
            hover_sync: true,
            initial_sort: Vec::new(),
            font: FontSpec::default(),
            nested_gutter: 8.0,
            theme: None,
        }
    }
}

impl GridConfig {
    /// Load config from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, GridError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| GridError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&content).map_err(|source| GridError::Config { path: path.to_path_buf(), source })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    pub fn row_height(&self) -> f32 {
        self.row_height.unwrap_or_else(|| self.cell_height.pixels())
    }

    pub fn initial_sort(&self) -> SortState {
        SortState::from_keys(self.initial_sort.clone())
    }

    /// Options for a pixel-based host
    pub fn view_options(&self) -> ViewOptions {
        let row_height = self.row_height();
        ViewOptions {
            layout: ColumnLayout {
                min_column_width: self.min_column_width,
                show_row_numbers: self.show_row_numbers,
                ..ColumnLayout::default()
            },
            heights: HeightOptions {
                row_height,
                cell_padding: self.cell_padding,
                font: self.font.clone(),
                wrap: self.wrap_text,
                wrap_column: self.wrap_column.clone(),
                nested_gutter: self.nested_gutter,
            },
            overscan: self.overscan,
            paginate: self.pagination,
            footer: self.footer.clone(),
            initial_sort: self.initial_sort(),
            header_height: row_height,
            footer_height: row_height * self.footer_lines(),
            pager_height: row_height,
        }
    }

    /// Options in terminal cells: one unit per column and per line
    pub fn terminal_options(&self) -> ViewOptions {
        let char_width = if self.font.char_width > 0.0 { self.font.char_width } else { 1.0 };
        let cell = FontSpec { family: "terminal".to_string(), size: 1.0, char_width: 1.0, line_height: 1.0 };
        ViewOptions {
            layout: ColumnLayout {
                container_width: 80.0,
                min_column_width: (self.min_column_width / char_width).round().max(4.0),
                show_row_numbers: self.show_row_numbers,
                row_number_width: 6.0,
                expander_width: 3.0,
            },
            heights: HeightOptions {
                row_height: self.cell_height.lines(),
                cell_padding: 0.0,
                font: cell,
                wrap: self.wrap_text,
                wrap_column: self.wrap_column.clone(),
                nested_gutter: 1.0,
            },
            overscan: self.overscan,
            paginate: self.pagination,
            footer: self.footer.clone(),
            initial_sort: self.initial_sort(),
            header_height: 1.0,
            footer_height: self.footer_lines(),
            pager_height: 1.0,
        }
    }

    fn footer_lines(&self) -> f32 {
        if self.footer.count_rows {
            1.0
        } else {
            self.footer.canonical_reducers().len().max(1) as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::footer::Reducer;
    use crate::table::sort::SortDirection;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = GridConfig::default();
        assert_eq!(config.row_height(), 36.0);
        assert_eq!(config.view_options().heights.row_height, 36.0);
        assert!(config.initial_sort().is_empty());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = GridConfig::from_toml("cell_height = \"lg\"\npagination = true").unwrap();
        assert_eq!(config.row_height(), 48.0);
        assert!(config.pagination);
        assert_eq!(config.min_column_width, 150.0);
        assert_eq!(config.overscan, 5);
    }

    #[test]
    fn test_full_toml() {
        let toml = r#"
            row_height = 30
            show_row_numbers = true
            wrap_text = true
            wrap_column = "message"

            [footer]
            reducers = ["max", "sum"]
            fields = ["bytes"]

            [[initial_sort]]
            column = "time"
            direction = "descending"

            [font]
            family = "Roboto"
            size = 12
        "#;
        let config = GridConfig::from_toml(toml).unwrap();
        assert_eq!(config.row_height(), 30.0);
        assert_eq!(config.footer.canonical_reducers(), vec![Reducer::Sum, Reducer::Max]);
        assert_eq!(config.initial_sort().direction("time"), Some(SortDirection::Descending));
        assert_eq!(config.font.family, "Roboto");
        assert_eq!(config.font.line_height, 21.0);

        let options = config.view_options();
        assert!(options.heights.wrap);
        assert_eq!(options.heights.wrap_column.as_deref(), Some("message"));
        assert_eq!(options.footer_height, 60.0);
    }

    #[test]
    fn test_terminal_options_use_cells() {
        let config = GridConfig::default();
        let options = config.terminal_options();
        assert_eq!(options.heights.row_height, 1.0);
        assert_eq!(options.layout.min_column_width, 20.0);
        assert_eq!(options.header_height, 1.0);
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "min_column_width = 100").unwrap();
        let config = GridConfig::from_file(file.path()).unwrap();
        assert_eq!(config.min_column_width, 100.0);
    }

    #[test]
    fn test_from_file_errors() {
        let missing = GridConfig::from_file(Path::new("/nonexistent/gridview.toml"));
        assert!(matches!(missing, Err(GridError::Read { .. })));

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "overscan = \"lots\"").unwrap();
        assert!(matches!(GridConfig::from_file(file.path()), Err(GridError::Config { .. })));
    }
}
