//! Footer aggregation over the filtered row set

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::columns::{ColumnDescriptor, ColumnId};
use super::filter::FilterState;
use super::frame::DataFrame;

/// Footer reducers in their canonical display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reducer {
    Sum,
    Mean,
    Min,
    Max,
    Count,
}

impl Reducer {
    pub const ALL: [Reducer; 5] = [Reducer::Sum, Reducer::Mean, Reducer::Min, Reducer::Max, Reducer::Count];

    pub fn label(&self) -> &'static str {
        match self {
            Reducer::Sum => "Total",
            Reducer::Mean => "Mean",
            Reducer::Min => "Min",
            Reducer::Max => "Max",
            Reducer::Count => "Count",
        }
    }

    /// Whether the reducer needs numeric values
    pub fn is_numeric(&self) -> bool {
        !matches!(self, Reducer::Count)
    }

    /// Reduce the non-missing values. Empty input gives 0 for sum and count,
    /// NaN for the rest.
    pub fn reduce(&self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return match self {
                Reducer::Sum | Reducer::Count => 0.0,
                _ => f64::NAN,
            };
        }
        match self {
            Reducer::Sum => values.iter().sum(),
            Reducer::Mean => values.iter().sum::<f64>() / values.len() as f64,
            Reducer::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Reducer::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Reducer::Count => values.len() as f64,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct FooterOptions {
    pub reducers: Vec<Reducer>,
    /// Show the filtered row count in the first data column and nothing else
    pub count_rows: bool,
    /// Restrict reducers to these fields; all fields when unset
    pub fields: Option<Vec<String>>,
}

impl FooterOptions {
    pub fn is_enabled(&self) -> bool {
        self.count_rows || !self.reducers.is_empty()
    }

    /// Selected reducers, deduplicated, in canonical order
    pub fn canonical_reducers(&self) -> Vec<Reducer> {
        let mut reducers = self.reducers.clone();
        reducers.sort();
        reducers.dedup();
        reducers
    }

    fn includes_field(&self, name: &str) -> bool {
        self.fields.as_ref().map_or(true, |f| f.iter().any(|n| n == name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FooterValue {
    pub reducer: Reducer,
    pub value: f64,
}

/// One column's footer cell
#[derive(Debug, Clone, PartialEq)]
pub enum FooterItem {
    Empty,
    RowCount(usize),
    Values(Vec<FooterValue>),
}

/// Compute the footer for every column over the filtered rows
pub fn aggregate(
    rows: &[usize],
    options: &FooterOptions,
    frame: &DataFrame,
    columns: &[ColumnDescriptor],
) -> Vec<FooterItem> {
    if options.count_rows {
        let first_data = columns.iter().position(|c| c.field_index().is_some());
        return (0..columns.len())
            .map(|i| if Some(i) == first_data { FooterItem::RowCount(rows.len()) } else { FooterItem::Empty })
            .collect();
    }

    let reducers = options.canonical_reducers();
    columns.iter()
        .map(|column| {
            let Some(field) = column.field_index().and_then(|i| frame.field(i)) else {
                return FooterItem::Empty;
            };
            if reducers.is_empty() || !options.includes_field(&field.name) {
                return FooterItem::Empty;
            }

            let applicable: Vec<Reducer> = reducers.iter()
                .copied()
                .filter(|r| !r.is_numeric() || field.field_type.is_numeric())
                .collect();
            if applicable.is_empty() {
                return FooterItem::Empty;
            }

            let values: Vec<f64> = rows.iter()
                .map(|&r| field.value(r))
                .filter(|v| !v.is_null())
                .map(|v| v.as_f64().unwrap_or(f64::NAN))
                .collect();

            FooterItem::Values(
                applicable.into_iter()
                    .map(|reducer| {
                        let value = if reducer == Reducer::Count {
                            values.len() as f64
                        } else {
                            let numeric: Vec<f64> = values.iter().copied().filter(|n| !n.is_nan()).collect();
                            reducer.reduce(&numeric)
                        };
                        FooterValue { reducer, value }
                    })
                    .collect(),
            )
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
struct FooterKey {
    revision: u64,
    filters: FilterState,
    options: FooterOptions,
    columns: Vec<ColumnId>,
}

/// Memoized footer; recomputes only when data, filters, reducers or the
/// column set change. Sort order is not part of the key.
#[derive(Debug, Clone, Default)]
pub struct FooterCache {
    key: Option<FooterKey>,
    items: Vec<FooterItem>,
    computations: usize,
}

impl FooterCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(
        &mut self,
        revision: u64,
        filters: &FilterState,
        filtered_rows: &[usize],
        options: &FooterOptions,
        frame: &DataFrame,
        columns: &[ColumnDescriptor],
    ) -> &[FooterItem] {
        let key = FooterKey {
            revision,
            filters: filters.selections(),
            options: options.clone(),
            columns: columns.iter().map(|c| c.id.clone()).collect(),
        };
        if self.key.as_ref() != Some(&key) {
            debug!(revision, rows = filtered_rows.len(), "recomputing footer");
            self.items = aggregate(filtered_rows, options, frame, columns);
            self.key = Some(key);
            self.computations += 1;
        }
        &self.items
    }

    pub fn invalidate(&mut self) {
        self.key = None;
    }

    /// Number of times the footer was actually computed
    pub fn computations(&self) -> usize {
        self.computations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::columns::{build_columns, ColumnLayout, ColumnWidths};
    use crate::table::filter::{filter_rows, ColumnFilter};
    use crate::table::frame::{Field, FieldType, Value};

    fn columns(frame: &DataFrame) -> Vec<ColumnDescriptor> {
        build_columns(frame, &ColumnLayout::default(), &ColumnWidths::new())
    }

    fn sum_only() -> FooterOptions {
        FooterOptions { reducers: vec![Reducer::Sum], ..FooterOptions::default() }
    }

    fn first_value(item: &FooterItem) -> f64 {
        match item {
            FooterItem::Values(v) => v[0].value,
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sum_over_filtered_rows() {
        let frame = DataFrame::new(vec![Field::numbers("n", &[1.0, 1.0, 1.0, 2.0, 2.0])]);
        let cols = columns(&frame);
        let all: Vec<usize> = (0..5).collect();
        assert_eq!(first_value(&aggregate(&all, &sum_only(), &frame, &cols)[0]), 7.0);

        let mut state = FilterState::new();
        state.set("n", ColumnFilter::from_values([&Value::Number(1.0)]));
        let filtered = filter_rows(&all, &state, &frame);
        assert_eq!(first_value(&aggregate(&filtered, &sum_only(), &frame, &cols)[0]), 3.0);
    }

    #[test]
    fn test_sum_filtered_to_two_values() {
        let frame = DataFrame::new(vec![Field::numbers("n", &[1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0])]);
        let cols = columns(&frame);
        let all: Vec<usize> = (0..7).collect();
        assert_eq!(first_value(&aggregate(&all, &sum_only(), &frame, &cols)[0]), 13.0);

        let mut state = FilterState::new();
        state.set("n", ColumnFilter::from_values([&Value::Number(2.0), &Value::Number(3.0)]));
        let filtered = filter_rows(&all, &state, &frame);
        assert_eq!(first_value(&aggregate(&filtered, &sum_only(), &frame, &cols)[0]), 10.0);
    }

    #[test]
    fn test_count_skips_nulls() {
        let frame = DataFrame::new(vec![Field::new(
            "n",
            FieldType::Number,
            vec![1.0.into(), 1.0.into(), 1.0.into(), 2.0.into(), Value::Null],
        )]);
        let options = FooterOptions { reducers: vec![Reducer::Count], ..FooterOptions::default() };
        let items = aggregate(&[0, 1, 2, 3, 4], &options, &frame, &columns(&frame));
        assert_eq!(first_value(&items[0]), 4.0);
    }

    #[test]
    fn test_count_rows_mode() {
        let frame = DataFrame::new(vec![
            Field::new("n", FieldType::Number, vec![1.0.into(), Value::Null, 3.0.into(), Value::Null, 5.0.into()]),
            Field::strings("s", &["a", "b", "c", "d", "e"]),
        ]);
        let options = FooterOptions { count_rows: true, ..FooterOptions::default() };
        let items = aggregate(&[0, 1, 2, 3, 4], &options, &frame, &columns(&frame));
        assert_eq!(items, vec![FooterItem::RowCount(5), FooterItem::Empty]);
    }

    #[test]
    fn test_reducers_in_canonical_order() {
        let frame = DataFrame::new(vec![Field::numbers("n", &[4.0, f64::NAN, 2.0])]);
        let options = FooterOptions { reducers: vec![Reducer::Min, Reducer::Sum, Reducer::Min], ..FooterOptions::default() };
        let items = aggregate(&[0, 1, 2], &options, &frame, &columns(&frame));
        assert_eq!(items[0], FooterItem::Values(vec![
            FooterValue { reducer: Reducer::Sum, value: 6.0 },
            FooterValue { reducer: Reducer::Min, value: 2.0 },
        ]));
    }

    #[test]
    fn test_numeric_reducers_skip_text_fields() {
        let frame = DataFrame::new(vec![Field::strings("s", &["a", "b"])]);
        let options = FooterOptions { reducers: vec![Reducer::Sum, Reducer::Count], ..FooterOptions::default() };
        let items = aggregate(&[0, 1], &options, &frame, &columns(&frame));
        assert_eq!(items[0], FooterItem::Values(vec![FooterValue { reducer: Reducer::Count, value: 2.0 }]));
    }

    #[test]
    fn test_field_allow_list() {
        let frame = DataFrame::new(vec![Field::numbers("a", &[1.0]), Field::numbers("b", &[2.0])]);
        let options = FooterOptions {
            reducers: vec![Reducer::Max],
            fields: Some(vec!["b".to_string()]),
            ..FooterOptions::default()
        };
        let items = aggregate(&[0], &options, &frame, &columns(&frame));
        assert_eq!(items[0], FooterItem::Empty);
        assert_eq!(first_value(&items[1]), 2.0);
    }

    #[test]
    fn test_mean_of_empty_is_nan() {
        assert!(Reducer::Mean.reduce(&[]).is_nan());
        assert_eq!(Reducer::Sum.reduce(&[]), 0.0);
    }

    #[test]
    fn test_cache_ignores_row_order() {
        let frame = DataFrame::new(vec![Field::numbers("n", &[3.0, 1.0, 2.0])]);
        let cols = columns(&frame);
        let filters = FilterState::new();
        let mut cache = FooterCache::new();
        cache.get_or_compute(1, &filters, &[0, 1, 2], &sum_only(), &frame, &cols);
        cache.get_or_compute(1, &filters, &[1, 2, 0], &sum_only(), &frame, &cols);
        assert_eq!(cache.computations(), 1);

        cache.get_or_compute(2, &filters, &[0, 1, 2], &sum_only(), &frame, &cols);
        assert_eq!(cache.computations(), 2);
    }

    #[test]
    fn test_cache_ignores_picker_search() {
        let frame = DataFrame::new(vec![Field::numbers("n", &[1.0, 1.0, 2.0])]);
        let cols = columns(&frame);
        let mut filters = FilterState::new();
        filters.set("n", ColumnFilter::from_values([&Value::Number(1.0)]));
        let rows = filter_rows(&[0, 1, 2], &filters, &frame);

        let mut cache = FooterCache::new();
        cache.get_or_compute(1, &filters, &rows, &sum_only(), &frame, &cols);
        filters.set_search("n", Some("^1"));
        cache.get_or_compute(1, &filters, &rows, &sum_only(), &frame, &cols);
        assert_eq!(cache.computations(), 1);
    }
}
