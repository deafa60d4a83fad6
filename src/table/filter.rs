//! Per-column value-set filtering over row index sequences

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use tracing::{debug, warn};

use crate::error::GridError;
use super::columns::ColumnId;
use super::display::DisplayProcessor;
use super::frame::{DataFrame, Value, ValueKey};

/// Threshold for using parallel processing
const PARALLEL_THRESHOLD: usize = 10_000;

/// Selection for one column: a row passes when its raw value is selected
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ColumnFilter {
    pub selected: BTreeSet<ValueKey>,
    /// Narrows the option list in a picker; never applied to rows
    pub search: Option<String>,
}

impl ColumnFilter {
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        Self {
            selected: values.into_iter().map(Value::key).collect(),
            search: None,
        }
    }

    pub fn with_search(mut self, pattern: &str) -> Self {
        self.search = Some(pattern.to_string());
        self
    }

    pub fn matches(&self, value: &Value) -> bool {
        self.selected.contains(&value.key())
    }
}

/// Active filters keyed by column. A missing entry means "no filter";
/// an entry with an empty selection matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterState {
    filters: BTreeMap<ColumnId, ColumnFilter>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, column: &str) -> Option<&ColumnFilter> {
        self.filters.get(column)
    }

    pub fn set(&mut self, column: &str, filter: ColumnFilter) {
        self.filters.insert(column.to_string(), filter);
    }

    /// Remove a column's filter, returning whether one was active
    pub fn clear(&mut self, column: &str) -> bool {
        self.filters.remove(column).is_some()
    }

    pub fn clear_all(&mut self) {
        self.filters.clear();
    }

    pub fn columns(&self) -> impl Iterator<Item = &ColumnId> {
        self.filters.keys()
    }

    /// Store a picker search on an existing column filter. Returns false when
    /// the column has no filter to carry it.
    pub fn set_search(&mut self, column: &str, pattern: Option<&str>) -> bool {
        match self.filters.get_mut(column) {
            Some(filter) => {
                filter.search = pattern.map(str::to_string);
                true
            }
            None => false,
        }
    }

    /// The row-affecting part of the state: selections only, searches dropped
    pub fn selections(&self) -> Self {
        let filters = self.filters.iter()
            .map(|(column, filter)| (column.clone(), ColumnFilter { selected: filter.selected.clone(), search: None }))
            .collect();
        Self { filters }
    }

    /// The same state without `column`'s own filter
    pub fn without(&self, column: &str) -> Self {
        let mut other = self.clone();
        other.filters.remove(column);
        other
    }
}

/// Keep the rows whose values satisfy every active column filter, in input order
pub fn filter_rows(rows: &[usize], state: &FilterState, frame: &DataFrame) -> Vec<usize> {
    let active: Vec<(usize, &ColumnFilter)> = state.filters.iter()
        .filter_map(|(column, filter)| {
            let index = frame.field_index(column);
            if index.is_none() {
                debug!(column = %column, "ignoring filter on unknown column");
            }
            index.map(|i| (i, filter))
        })
        .collect();

    if active.is_empty() {
        return rows.to_vec();
    }

    let passes = |row: usize| -> bool {
        active.iter().all(|(i, filter)| filter.matches(frame.fields[*i].value(row)))
    };

    if rows.len() >= PARALLEL_THRESHOLD {
        rows.par_iter().copied().filter(|&r| passes(r)).collect()
    } else {
        rows.iter().copied().filter(|&r| passes(r)).collect()
    }
}

/// A distinct value offered in a column's filter picker
#[derive(Debug, Clone, PartialEq)]
pub struct FilterOption {
    pub value: Value,
    pub label: String,
    /// Rows carrying this value among the rows the other filters keep
    pub count: usize,
}

/// Distinct values of `column`, computed from `rows` narrowed by every
/// active filter except the column's own. Sorted by label.
pub fn filter_options(
    frame: &DataFrame,
    rows: &[usize],
    state: &FilterState,
    column: &str,
    display: &dyn DisplayProcessor,
) -> Result<Vec<FilterOption>, GridError> {
    let index = frame.field_index(column)
        .ok_or_else(|| GridError::UnknownColumn(column.to_string()))?;
    let field = &frame.fields[index];

    let candidates = filter_rows(rows, &state.without(column), frame);

    let mut seen: HashMap<ValueKey, usize> = HashMap::new();
    let mut options: Vec<FilterOption> = Vec::new();
    for row in candidates {
        let value = field.value(row);
        match seen.get(&value.key()) {
            Some(&i) => options[i].count += 1,
            None => {
                seen.insert(value.key(), options.len());
                options.push(FilterOption {
                    value: value.clone(),
                    label: display.display(field, value).text,
                    count: 1,
                });
            }
        }
    }

    options.sort_by(|a, b| {
        a.label.to_lowercase().cmp(&b.label.to_lowercase())
            .then_with(|| a.value.key().cmp(&b.value.key()))
    });
    Ok(options)
}

/// Compile a case-insensitive search pattern
pub fn compile_search(pattern: &str) -> Result<Regex, GridError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| GridError::InvalidPattern { pattern: pattern.to_string(), source })
}

/// Options whose label matches `pattern`. An invalid pattern matches nothing.
pub fn search_options<'a>(options: &'a [FilterOption], pattern: &str) -> Vec<&'a FilterOption> {
    if pattern.is_empty() {
        return options.iter().collect();
    }
    match compile_search(pattern) {
        Ok(re) => options.iter().filter(|o| re.is_match(&o.label)).collect(),
        Err(e) => {
            warn!(error = %e, "invalid filter search pattern");
            Vec::new()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    Equal,
    NotEqual,
}

/// Quick filter requested from a cell's context action
#[derive(Debug, Clone, PartialEq)]
pub struct CellFilter {
    pub column: ColumnId,
    pub operator: FilterOperator,
    pub value: Value,
}

/// Turn a cell filter request into the next filter state.
///
/// `=` selects exactly the value; `!=` selects every other option the column
/// currently offers.
pub fn apply_cell_filter(
    state: &FilterState,
    request: &CellFilter,
    frame: &DataFrame,
    rows: &[usize],
    display: &dyn DisplayProcessor,
) -> Result<FilterState, GridError> {
    if frame.field_index(&request.column).is_none() {
        return Err(GridError::UnknownColumn(request.column.clone()));
    }
    let filter = match request.operator {
        FilterOperator::Equal => ColumnFilter::from_values([&request.value]),
        FilterOperator::NotEqual => {
            let excluded = request.value.key();
            let options = filter_options(frame, rows, state, &request.column, display)?;
            ColumnFilter::from_values(
                options.iter().map(|o| &o.value).filter(|v| v.key() != excluded),
            )
        }
    };

    let mut next = state.clone();
    next.set(&request.column, filter);
    Ok(next)
}
