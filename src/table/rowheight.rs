//! Row height resolution: fixed rows, wrapped text and expanded sub-tables

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use super::columns::{find_column, ColumnDescriptor};
use super::display::DisplayProcessor;
use super::expansion::ExpansionState;
use super::frame::{DataFrame, FieldType};

/// Number of rows sampled when guessing the longest text column
const LONGEST_FIELD_SAMPLE: usize = 30;

/// Font metrics used for text measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FontSpec {
    pub family: String,
    pub size: f32,
    /// Advance of a single-width character
    pub char_width: f32,
    pub line_height: f32,
}

impl Default for FontSpec {
    fn default() -> Self {
        Self {
            family: "Inter".to_string(),
            size: 14.0,
            char_width: 7.5,
            line_height: 21.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextMetrics {
    pub lines: usize,
    pub height: f32,
}

/// Off-screen text measurement. `None` means measurement is unavailable.
pub trait TextMeasurer {
    fn measure(&self, text: &str, font: &FontSpec, max_width: f32) -> Option<TextMetrics>;
}

/// Measures by unicode display width on a fixed-advance grid
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeMeasurer;

impl UnicodeMeasurer {
    /// Greedy word wrap; words longer than a line are broken by character
    fn wrapped_lines(text: &str, columns: usize) -> usize {
        let columns = columns.max(1);
        text.split('\n')
            .map(|paragraph| {
                let mut lines = 1;
                let mut used = 0;
                for word in paragraph.split_whitespace() {
                    let width = word.width();
                    let needed = if used == 0 { width } else { used + 1 + width };
                    if needed <= columns {
                        used = needed;
                        continue;
                    }
                    if used > 0 {
                        lines += 1;
                        used = 0;
                    }
                    if width <= columns {
                        used = width;
                    } else {
                        for c in word.chars() {
                            let w = c.width().unwrap_or(0);
                            if used + w > columns {
                                lines += 1;
                                used = 0;
                            }
                            used += w;
                        }
                    }
                }
                lines
            })
            .sum()
    }
}

impl TextMeasurer for UnicodeMeasurer {
    fn measure(&self, text: &str, font: &FontSpec, max_width: f32) -> Option<TextMetrics> {
        if font.char_width <= 0.0 {
            return None;
        }
        let columns = (max_width / font.char_width).floor().max(1.0) as usize;
        let lines = Self::wrapped_lines(text, columns);
        Some(TextMetrics { lines, height: lines as f32 * font.line_height })
    }
}

/// Measurer for environments without a measurement surface
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl TextMeasurer for Unavailable {
    fn measure(&self, _text: &str, _font: &FontSpec, _max_width: f32) -> Option<TextMetrics> {
        None
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeightOptions {
    pub row_height: f32,
    pub cell_padding: f32,
    pub font: FontSpec,
    pub wrap: bool,
    /// Column to measure when wrapping; the longest text column when unset
    pub wrap_column: Option<String>,
    /// Space between stacked sub-tables of an expanded row
    pub nested_gutter: f32,
}

impl Default for HeightOptions {
    fn default() -> Self {
        Self {
            row_height: 36.0,
            cell_padding: 6.0,
            font: FontSpec::default(),
            wrap: false,
            wrap_column: None,
            nested_gutter: 8.0,
        }
    }
}

/// Everything a cached height depends on besides the row itself
#[derive(Debug, Clone, PartialEq)]
struct HeightKey {
    revision: u64,
    options: HeightOptions,
    target: Option<(usize, u32)>,
}

/// Heights per original row index, cached for one key
pub struct RowHeightResolver {
    options: HeightOptions,
    measurer: Box<dyn TextMeasurer>,
    key: Option<HeightKey>,
    /// Field to measure and its pixel width
    target: Option<(usize, f32)>,
    cache: HashMap<usize, f32>,
    warned_unavailable: bool,
}

impl RowHeightResolver {
    pub fn new(options: HeightOptions, measurer: Box<dyn TextMeasurer>) -> Self {
        Self {
            options,
            measurer,
            key: None,
            target: None,
            cache: HashMap::new(),
            warned_unavailable: false,
        }
    }

    pub fn options(&self) -> &HeightOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: HeightOptions) {
        self.options = options;
    }

    pub fn set_measurer(&mut self, measurer: Box<dyn TextMeasurer>) {
        self.measurer = measurer;
        self.key = None;
        self.cache.clear();
    }

    /// Uniform height of a plain row
    pub fn row_height(&self) -> f32 {
        self.options.row_height
    }

    /// Bring the cache in line with the current inputs. Returns true when the
    /// cache was dropped, meaning every cached layout offset is stale.
    pub fn prepare(&mut self, revision: u64, frame: &DataFrame, columns: &[ColumnDescriptor]) -> bool {
        self.target = if self.options.wrap {
            resolve_wrap_target(frame, columns, self.options.wrap_column.as_deref())
        } else {
            None
        };
        let key = HeightKey {
            revision,
            options: self.options.clone(),
            target: self.target.map(|(field, width)| (field, width.to_bits())),
        };
        if self.key.as_ref() == Some(&key) {
            return false;
        }
        debug!(revision, wrap = self.options.wrap, "row height cache invalidated");
        self.key = Some(key);
        self.cache.clear();
        true
    }

    /// Drop one row's cached height (after an expansion toggle)
    pub fn invalidate_row(&mut self, row: usize) {
        self.cache.remove(&row);
    }

    pub fn invalidate_all(&mut self) {
        self.key = None;
        self.cache.clear();
    }

    /// Height of an original row
    pub fn height(
        &mut self,
        row: usize,
        frame: &DataFrame,
        expansion: &ExpansionState,
        display: &dyn DisplayProcessor,
    ) -> f32 {
        if let Some(&h) = self.cache.get(&row) {
            return h;
        }

        let mut height = self.base_height(row, frame, display);
        if expansion.is_expanded(row) {
            height += self.nested_height(frame.nested_frames(row));
        }

        self.cache.insert(row, height);
        height
    }

    fn base_height(&mut self, row: usize, frame: &DataFrame, display: &dyn DisplayProcessor) -> f32 {
        let fixed = self.options.row_height;
        let Some((field_index, width)) = self.target else {
            return fixed;
        };
        let Some(field) = frame.field(field_index) else {
            return fixed;
        };

        let text = display.display(field, field.value(row)).text;
        let padding = self.options.cell_padding;
        match self.measurer.measure(&text, &self.options.font, (width - 2.0 * padding).max(1.0)) {
            Some(metrics) => (metrics.lines as f32 * self.options.font.line_height + 2.0 * padding).max(fixed),
            None => {
                if !self.warned_unavailable {
                    warn!("text measurement unavailable, using single-line row height");
                    self.warned_unavailable = true;
                }
                fixed
            }
        }
    }

    /// Extra height of an expanded row's stacked sub-tables
    pub fn nested_height(&self, frames: &[Arc<DataFrame>]) -> f32 {
        if frames.is_empty() {
            return 0.0;
        }
        let tables: f32 = frames.iter()
            .map(|f| {
                let header = if f.show_header { 1 } else { 0 };
                self.options.row_height * (f.row_count() + header) as f32
            })
            .sum();
        tables + self.options.nested_gutter * (frames.len() - 1) as f32
    }
}

/// Field to measure for wrapped rows and the width of its column
pub fn resolve_wrap_target(
    frame: &DataFrame,
    columns: &[ColumnDescriptor],
    explicit: Option<&str>,
) -> Option<(usize, f32)> {
    let field_index = match explicit {
        Some(name) => frame.field_index(name),
        None => guess_longest_field(frame),
    }?;
    let column = find_column(columns, &frame.fields[field_index].name)?;
    Some((field_index, column.width))
}

/// String field with the longest average text over a sample of rows
pub fn guess_longest_field(frame: &DataFrame) -> Option<usize> {
    let sample = frame.row_count().min(LONGEST_FIELD_SAMPLE);
    if sample == 0 {
        return None;
    }
    frame.fields.iter()
        .enumerate()
        .filter(|(_, f)| f.field_type == FieldType::String && !f.config.hidden)
        .map(|(i, f)| {
            let total: usize = f.values.iter().take(sample).map(|v| v.to_string().width()).sum();
            (i, total as f32 / sample as f32)
        })
        .filter(|(_, avg)| *avg > 0.0)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
}
