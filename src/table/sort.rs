//! Sorting functionality for row index sequences

use std::cmp::Ordering;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::columns::ColumnId;
use super::frame::{DataFrame, FieldType, Value};

/// Threshold for using parallel processing
const PARALLEL_THRESHOLD: usize = 10_000;

/// Sorting direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub column: ColumnId,
    pub direction: SortDirection,
}

/// Ordered sort keys; position is priority
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortState {
    keys: Vec<SortKey>,
}

impl SortState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from keys, keeping the first key seen for each column
    pub fn from_keys(keys: Vec<SortKey>) -> Self {
        let mut state = Self::new();
        for key in keys {
            if state.direction(&key.column).is_none() {
                state.keys.push(key);
            }
        }
        state
    }

    pub fn single(column: &str, direction: SortDirection) -> Self {
        Self { keys: vec![SortKey { column: column.to_string(), direction }] }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn direction(&self, column: &str) -> Option<SortDirection> {
        self.keys.iter().find(|k| k.column == column).map(|k| k.direction)
    }

    /// Zero-based priority of a column's key
    pub fn priority(&self, column: &str) -> Option<usize> {
        self.keys.iter().position(|k| k.column == column)
    }
}

/// Next step of a column's `unsorted -> ascending -> descending -> unsorted` cycle
fn next_direction(current: Option<SortDirection>) -> Option<SortDirection> {
    match current {
        None => Some(SortDirection::Ascending),
        Some(SortDirection::Ascending) => Some(SortDirection::Descending),
        Some(SortDirection::Descending) => None,
    }
}

/// Advance a column's sort cycle.
///
/// In multi-key mode the other keys keep their place and the column is cycled
/// in place (or appended). Otherwise the state collapses to this column alone.
pub fn toggle_sort(state: &SortState, column: &str, multi: bool) -> SortState {
    let next = next_direction(state.direction(column));

    if !multi {
        return match next {
            Some(direction) => SortState::single(column, direction),
            None => SortState::new(),
        };
    }

    let mut keys = state.keys.clone();
    match (keys.iter().position(|k| k.column == column), next) {
        (Some(i), Some(direction)) => keys[i].direction = direction,
        (Some(i), None) => {
            keys.remove(i);
        }
        (None, Some(direction)) => keys.push(SortKey { column: column.to_string(), direction }),
        (None, None) => {}
    }
    SortState { keys }
}

/// Per-row sort keys for one column
enum KeyColumn {
    /// NaN marks missing values
    Numeric(Vec<f64>),
    Text(Vec<String>),
}

impl KeyColumn {
    fn build(frame: &DataFrame, field_index: usize) -> Option<Self> {
        let field = frame.field(field_index)?;
        let keys = match field.field_type {
            FieldType::NestedTable => return None,
            FieldType::Number | FieldType::Time | FieldType::Boolean => KeyColumn::Numeric(
                field.values.iter()
                    .map(|v| if v.is_null() { f64::NAN } else { v.as_f64().unwrap_or(f64::NAN) })
                    .collect(),
            ),
            FieldType::String | FieldType::Other => {
                let case_sensitive = field.config.case_sensitive_sort;
                KeyColumn::Text(
                    field.values.iter()
                        .map(|v| {
                            let s = match v {
                                Value::Null => String::new(),
                                other => other.to_string(),
                            };
                            if case_sensitive { s } else { s.to_lowercase() }
                        })
                        .collect(),
                )
            }
        };
        Some(keys)
    }

    fn compare(&self, a: usize, b: usize, direction: SortDirection) -> Ordering {
        match self {
            KeyColumn::Numeric(values) => {
                let (x, y) = (values[a], values[b]);
                // missing values trail in both directions
                match (x.is_nan(), y.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => apply(x.partial_cmp(&y).unwrap_or(Ordering::Equal), direction),
                }
            }
            KeyColumn::Text(values) => apply(values[a].cmp(&values[b]), direction),
        }
    }
}

fn apply(ordering: Ordering, direction: SortDirection) -> Ordering {
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}

/// Order `rows` by the sort state. Rows with equal keys keep their input
/// order, so the result is stable and sorting twice changes nothing.
/// Uses parallel processing for large inputs.
pub fn sort_rows(rows: &[usize], state: &SortState, frame: &DataFrame) -> Vec<usize> {
    let row_count = frame.row_count();
    let keys: Vec<(KeyColumn, SortDirection)> = state.keys.iter()
        .filter_map(|key| {
            let built = frame.field_index(&key.column)
                .filter(|&i| frame.fields[i].config.sortable)
                .and_then(|i| KeyColumn::build(frame, i));
            if built.is_none() {
                debug!(column = %key.column, "skipping unsortable sort key");
            }
            built.map(|k| (k, key.direction))
        })
        .collect();

    if keys.is_empty() || rows.iter().any(|&r| r >= row_count) {
        return rows.to_vec();
    }

    let mut keyed: Vec<(usize, usize)> = rows.iter().copied().enumerate().collect();

    let cmp_fn = |&(pos_a, row_a): &(usize, usize), &(pos_b, row_b): &(usize, usize)| -> Ordering {
        keys.iter()
            .map(|(column, direction)| column.compare(row_a, row_b, *direction))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
            .then(pos_a.cmp(&pos_b))
    };

    if keyed.len() >= PARALLEL_THRESHOLD {
        keyed.par_sort_unstable_by(cmp_fn);
    } else {
        keyed.sort_unstable_by(cmp_fn);
    }

    keyed.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::frame::{Field, FieldConfig};

    fn numbers(values: &[f64]) -> DataFrame {
        DataFrame::new(vec![Field::numbers("n", values)])
    }

    fn all_rows(frame: &DataFrame) -> Vec<usize> {
        (0..frame.row_count()).collect()
    }

    #[test]
    fn test_nan_ordering() {
        let frame = numbers(&[3.0, f64::NAN, 1.0]);
        let asc = sort_rows(&all_rows(&frame), &SortState::single("n", SortDirection::Ascending), &frame);
        assert_eq!(asc, vec![2, 0, 1]);
        let desc = sort_rows(&all_rows(&frame), &SortState::single("n", SortDirection::Descending), &frame);
        assert_eq!(desc, vec![0, 2, 1]);
    }

    #[test]
    fn test_null_numbers_trail() {
        let frame = DataFrame::new(vec![Field::new(
            "n",
            FieldType::Number,
            vec![Value::Null, Value::Number(2.0), Value::Number(1.0)],
        )]);
        let asc = sort_rows(&all_rows(&frame), &SortState::single("n", SortDirection::Ascending), &frame);
        assert_eq!(asc, vec![2, 1, 0]);
    }

    #[test]
    fn test_multi_key_tie_break() {
        let frame = DataFrame::new(vec![
            Field::numbers("A", &[1.0, 1.0]),
            Field::numbers("B", &[2.0, 1.0]),
        ]);
        let state = SortState::from_keys(vec![
            SortKey { column: "A".to_string(), direction: SortDirection::Ascending },
            SortKey { column: "B".to_string(), direction: SortDirection::Ascending },
        ]);
        assert_eq!(sort_rows(&all_rows(&frame), &state, &frame), vec![1, 0]);
    }

    #[test]
    fn test_text_case_insensitive_by_default() {
        let frame = DataFrame::new(vec![Field::strings("s", &["b", "A", "a", "B"])]);
        let sorted = sort_rows(&all_rows(&frame), &SortState::single("s", SortDirection::Ascending), &frame);
        // equal keys keep input order
        assert_eq!(sorted, vec![1, 2, 0, 3]);
    }

    #[test]
    fn test_text_case_sensitive_when_configured() {
        let frame = DataFrame::new(vec![Field::strings("s", &["b", "A", "a", "B"]).with_config(FieldConfig {
            case_sensitive_sort: true,
            ..FieldConfig::default()
        })]);
        let sorted = sort_rows(&all_rows(&frame), &SortState::single("s", SortDirection::Ascending), &frame);
        assert_eq!(sorted, vec![1, 3, 2, 0]);
    }

    #[test]
    fn test_time_sorts_numerically() {
        let frame = DataFrame::new(vec![Field::times("t", &[300, 100, 200])]);
        let sorted = sort_rows(&all_rows(&frame), &SortState::single("t", SortDirection::Descending), &frame);
        assert_eq!(sorted, vec![0, 2, 1]);
    }

    #[test]
    fn test_stable_on_equal_keys() {
        let frame = numbers(&[1.0, 0.0, 1.0, 0.0, 1.0]);
        let input = vec![4, 3, 2, 1, 0];
        let sorted = sort_rows(&input, &SortState::single("n", SortDirection::Ascending), &frame);
        assert_eq!(sorted, vec![3, 1, 4, 2, 0]);
    }

    #[test]
    fn test_unknown_column_keeps_order() {
        let frame = numbers(&[2.0, 1.0]);
        let sorted = sort_rows(&[1, 0], &SortState::single("missing", SortDirection::Ascending), &frame);
        assert_eq!(sorted, vec![1, 0]);
    }

    #[test]
    fn test_unsortable_column_keeps_order() {
        let frame = DataFrame::new(vec![Field::numbers("n", &[2.0, 1.0]).with_config(FieldConfig {
            sortable: false,
            ..FieldConfig::default()
        })]);
        let sorted = sort_rows(&[0, 1], &SortState::single("n", SortDirection::Ascending), &frame);
        assert_eq!(sorted, vec![0, 1]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let values: Vec<f64> = (0..PARALLEL_THRESHOLD + 10).map(|i| ((i * 7919) % 101) as f64).collect();
        let frame = numbers(&values);
        let rows = all_rows(&frame);
        let state = SortState::single("n", SortDirection::Ascending);
        let sorted = sort_rows(&rows, &state, &frame);
        let mut expected = rows.clone();
        expected.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
        assert_eq!(sorted, expected);
    }

    #[test]
    fn test_toggle_cycle_single() {
        let s = toggle_sort(&SortState::new(), "a", false);
        assert_eq!(s.direction("a"), Some(SortDirection::Ascending));
        let s = toggle_sort(&s, "a", false);
        assert_eq!(s.direction("a"), Some(SortDirection::Descending));
        let s = toggle_sort(&s, "a", false);
        assert!(s.is_empty());
    }

    #[test]
    fn test_toggle_multi_preserves_positions() {
        let s = toggle_sort(&SortState::new(), "a", true);
        let s = toggle_sort(&s, "b", true);
        assert_eq!(s.priority("a"), Some(0));
        assert_eq!(s.priority("b"), Some(1));

        let s = toggle_sort(&s, "a", true);
        assert_eq!(s.priority("a"), Some(0));
        assert_eq!(s.direction("a"), Some(SortDirection::Descending));

        let s = toggle_sort(&s, "a", true);
        assert_eq!(s.direction("a"), None);
        assert_eq!(s.priority("b"), Some(0));
    }

    #[test]
    fn test_toggle_without_multi_collapses() {
        let s = toggle_sort(&SortState::new(), "a", true);
        let s = toggle_sort(&s, "b", true);
        let s = toggle_sort(&s, "b", false);
        assert_eq!(s.keys().len(), 1);
        assert_eq!(s.direction("b"), Some(SortDirection::Descending));
    }

    #[test]
    fn test_from_keys_dedupes_columns() {
        let s = SortState::from_keys(vec![
            SortKey { column: "a".to_string(), direction: SortDirection::Ascending },
            SortKey { column: "a".to_string(), direction: SortDirection::Descending },
        ]);
        assert_eq!(s.keys().len(), 1);
        assert_eq!(s.direction("a"), Some(SortDirection::Ascending));
    }
}
