//! Column model: render-ready column descriptors derived from field metadata

use std::collections::HashMap;

use tracing::debug;

use super::display::Justify;
use super::frame::{DataFrame, FieldType};

pub type ColumnId = String;

pub const ROW_NUMBER_ID: &str = "__row_number";
pub const EXPANDER_ID: &str = "__expander";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    RowNumber,
    Expander,
    Data { field: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub kind: ColumnKind,
    pub header: String,
    pub width: f32,
    pub min_width: f32,
    /// Always resolved; never `Justify::Auto`
    pub justify: Justify,
    pub sortable: bool,
    pub filterable: bool,
    pub resizable: bool,
}

impl ColumnDescriptor {
    pub fn field_index(&self) -> Option<usize> {
        match self.kind {
            ColumnKind::Data { field } => Some(field),
            _ => None,
        }
    }
}

/// Inputs that shape the column model besides the data itself
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    pub container_width: f32,
    pub min_column_width: f32,
    pub show_row_numbers: bool,
    pub row_number_width: f32,
    pub expander_width: f32,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            container_width: 800.0,
            min_column_width: 150.0,
            show_row_numbers: false,
            row_number_width: 50.0,
            expander_width: 50.0,
        }
    }
}

/// Widths set by the user dragging column edges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnWidths {
    overrides: HashMap<ColumnId, f32>,
}

impl ColumnWidths {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<f32> {
        self.overrides.get(id).copied()
    }

    /// Record a resize, returning the width actually stored
    pub fn set(&mut self, id: &str, width: f32, min_width: f32) -> f32 {
        let width = width.max(min_width);
        self.overrides.insert(id.to_string(), width);
        width
    }

    /// Forget a column's override, returning whether it had one
    pub fn remove(&mut self, id: &str) -> bool {
        self.overrides.remove(id).is_some()
    }

    /// Forget overrides for columns that no longer exist
    pub fn retain_columns(&mut self, frame: &DataFrame) {
        self.overrides.retain(|id, _| frame.field_index(id).is_some());
    }
}

/// Build the ordered column descriptors for a frame.
///
/// Columns with a configured or user-set width keep it; the rest split the
/// remaining container width equally, never going below their minimum. The
/// result may be wider than the container.
pub fn build_columns(frame: &DataFrame, layout: &ColumnLayout, widths: &ColumnWidths) -> Vec<ColumnDescriptor> {
    let visible: Vec<usize> = frame.fields.iter()
        .enumerate()
        .filter(|(_, f)| !f.config.hidden && f.field_type != FieldType::NestedTable)
        .map(|(i, _)| i)
        .collect();

    if visible.is_empty() {
        return Vec::new();
    }

    let mut columns = Vec::with_capacity(visible.len() + 2);

    if layout.show_row_numbers {
        columns.push(pseudo_column(ROW_NUMBER_ID, ColumnKind::RowNumber, layout.row_number_width));
    }
    if frame.nested_field_index().is_some() {
        columns.push(pseudo_column(EXPANDER_ID, ColumnKind::Expander, layout.expander_width));
    }

    let pseudo_width: f32 = columns.iter().map(|c| c.width).sum();

    let min_width_of = |i: usize| frame.fields[i].config.min_width.unwrap_or(layout.min_column_width);
    let fixed_width_of = |i: usize| {
        let field = &frame.fields[i];
        widths.get(&field.name).or(field.config.width).map(|w| w.max(min_width_of(i)))
    };

    let fixed_total: f32 = visible.iter().filter_map(|&i| fixed_width_of(i)).sum();
    let flex_count = visible.iter().filter(|&&i| fixed_width_of(i).is_none()).count();
    let leftover = (layout.container_width - pseudo_width - fixed_total).max(0.0);
    let share = if flex_count > 0 { leftover / flex_count as f32 } else { 0.0 };

    for &i in &visible {
        let field = &frame.fields[i];
        let min_width = min_width_of(i);
        let width = fixed_width_of(i).unwrap_or_else(|| share.max(min_width));
        let justify = match field.config.align {
            Justify::Auto => match field.field_type {
                FieldType::Number | FieldType::Time => Justify::Right,
                _ => Justify::Left,
            },
            other => other,
        };
        columns.push(ColumnDescriptor {
            id: field.name.clone(),
            kind: ColumnKind::Data { field: i },
            header: field.display_name().to_string(),
            width,
            min_width,
            justify,
            sortable: field.config.sortable,
            filterable: field.config.filterable,
            resizable: true,
        });
    }

    debug!(columns = columns.len(), share, "built column model");
    columns
}

fn pseudo_column(id: &str, kind: ColumnKind, width: f32) -> ColumnDescriptor {
    ColumnDescriptor {
        id: id.to_string(),
        kind,
        header: String::new(),
        width,
        min_width: width,
        justify: Justify::Left,
        sortable: false,
        filterable: false,
        resizable: false,
    }
}

pub fn total_width(columns: &[ColumnDescriptor]) -> f32 {
    columns.iter().map(|c| c.width).sum()
}

pub fn find_column<'a>(columns: &'a [ColumnDescriptor], id: &str) -> Option<&'a ColumnDescriptor> {
    columns.iter().find(|c| c.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::frame::{Field, FieldConfig};

    fn layout(width: f32) -> ColumnLayout {
        ColumnLayout {
            container_width: width,
            min_column_width: 50.0,
            ..ColumnLayout::default()
        }
    }

    #[test]
    fn test_flex_columns_share_leftover() {
        let frame = DataFrame::new(vec![
            Field::numbers("a", &[1.0]),
            Field::strings("b", &["x"]),
        ]);
        let cols = build_columns(&frame, &layout(400.0), &ColumnWidths::new());
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].width, 200.0);
        assert_eq!(cols[1].width, 200.0);
        assert_eq!(cols[0].justify, Justify::Right);
        assert_eq!(cols[1].justify, Justify::Left);
    }

    #[test]
    fn test_fixed_width_is_kept() {
        let frame = DataFrame::new(vec![
            Field::numbers("a", &[1.0]).with_config(FieldConfig { width: Some(100.0), ..FieldConfig::default() }),
            Field::numbers("b", &[1.0]),
            Field::numbers("c", &[1.0]),
        ]);
        let cols = build_columns(&frame, &layout(500.0), &ColumnWidths::new());
        assert_eq!(cols[0].width, 100.0);
        assert_eq!(cols[1].width, 200.0);
        assert_eq!(cols[2].width, 200.0);
    }

    #[test]
    fn test_floor_to_min_width_overflows() {
        let frame = DataFrame::new(vec![
            Field::numbers("a", &[1.0]),
            Field::numbers("b", &[1.0]),
            Field::numbers("c", &[1.0]),
        ]);
        let cols = build_columns(&frame, &layout(90.0), &ColumnWidths::new());
        assert!(cols.iter().all(|c| c.width == 50.0));
        assert!(total_width(&cols) > 90.0);
    }

    #[test]
    fn test_pseudo_columns_prepended() {
        let sub = DataFrame::new(vec![Field::numbers("x", &[1.0])]);
        let frame = DataFrame::new(vec![
            Field::numbers("a", &[1.0]),
            Field::nested("nested", vec![vec![sub]]),
        ]);
        let mut l = layout(500.0);
        l.show_row_numbers = true;
        let cols = build_columns(&frame, &l, &ColumnWidths::new());
        assert_eq!(cols.len(), 3);
        assert_eq!(cols[0].kind, ColumnKind::RowNumber);
        assert_eq!(cols[1].kind, ColumnKind::Expander);
        assert_eq!(cols[2].kind, ColumnKind::Data { field: 0 });
        assert_eq!(cols[2].width, 400.0);
    }

    #[test]
    fn test_empty_frame_yields_no_columns() {
        let frame = DataFrame::new(vec![]);
        assert!(build_columns(&frame, &layout(500.0), &ColumnWidths::new()).is_empty());
    }

    #[test]
    fn test_resize_override_fixes_column() {
        let frame = DataFrame::new(vec![
            Field::numbers("a", &[1.0]),
            Field::numbers("b", &[1.0]),
        ]);
        let mut widths = ColumnWidths::new();
        assert_eq!(widths.set("a", 10.0, 50.0), 50.0);
        widths.set("a", 120.0, 50.0);
        let cols = build_columns(&frame, &layout(400.0), &widths);
        assert_eq!(cols[0].width, 120.0);
        assert_eq!(cols[1].width, 280.0);
    }

    #[test]
    fn test_container_resize_redistributes() {
        let frame = DataFrame::new(vec![
            Field::numbers("a", &[1.0]),
            Field::numbers("b", &[1.0]),
        ]);
        let narrow = build_columns(&frame, &layout(200.0), &ColumnWidths::new());
        let wide = build_columns(&frame, &layout(600.0), &ColumnWidths::new());
        assert_eq!(narrow[0].width / narrow[1].width, wide[0].width / wide[1].width);
        assert_eq!(total_width(&wide), 600.0);
    }
}
