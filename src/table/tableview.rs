//! Grid state: owns the dataset and the user-facing state (sort, filters,
//! expansion, widths, page, scroll) and runs the filter, sort, paginate and
//! window stages in that order. Every derived sequence is stamped with the
//! data revision it came from and recomputed when the stamp goes stale.

use std::ops::Range;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::GridError;
use crate::events::{EventBus, GridEvent, GridListener, HoverSync};
use super::columns::{build_columns, find_column, ColumnDescriptor, ColumnKind, ColumnLayout, ColumnWidths};
use super::display::{
    cell_content, resolve_links, CellContent, DefaultDisplay, DisplayProcessor, Justify, NoVariables,
    ResolvedLink, VariableResolver,
};
use super::expansion::ExpansionState;
use super::filter::{
    apply_cell_filter, filter_options, filter_rows, search_options, CellFilter, ColumnFilter, FilterOption,
    FilterState,
};
use super::footer::{FooterCache, FooterItem, FooterOptions, FooterValue, Reducer};
use super::frame::{DataFrame, Field, FieldType, Value};
use super::pagination::Pagination;
use super::rowheight::{HeightOptions, RowHeightResolver, TextMeasurer, UnicodeMeasurer};
use super::sort::{sort_rows, SortDirection, SortState};
use super::window::WindowController;

/// Layout and behaviour settings for a view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOptions {
    pub layout: ColumnLayout,
    pub heights: HeightOptions,
    pub overscan: usize,
    pub paginate: bool,
    pub footer: FooterOptions,
    pub initial_sort: SortState,
    /// Vertical space taken by the header row
    pub header_height: f32,
    /// Vertical space taken by the footer when it is shown
    pub footer_height: f32,
    /// Vertical space taken by the pager when pagination is on
    pub pager_height: f32,
}

impl Default for ViewOptions {
    fn default() -> Self {
        let heights = HeightOptions::default();
        Self {
            layout: ColumnLayout::default(),
            overscan: 5,
            paginate: false,
            footer: FooterOptions::default(),
            initial_sort: SortState::new(),
            header_height: heights.row_height,
            footer_height: heights.row_height,
            pager_height: heights.row_height,
            heights,
        }
    }
}

/// What the body should show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridState {
    /// Empty, malformed or field-less data
    NoData,
    /// Data exists but the filters reject every row
    NoMatches,
    Rows,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeaderCell {
    pub id: String,
    pub kind: ColumnKind,
    pub title: String,
    pub width: f32,
    pub justify: Justify,
    pub sort: Option<SortDirection>,
    /// Position among several sort keys; `None` for single-key sorts
    pub sort_priority: Option<usize>,
    pub filtered: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedCell {
    pub content: CellContent,
    pub links: Vec<ResolvedLink>,
}

impl RenderedCell {
    fn plain(content: CellContent) -> Self {
        Self { content, links: Vec::new() }
    }
}

/// A sub-table drawn under an expanded row
#[derive(Debug, Clone, PartialEq)]
pub struct NestedTable {
    pub name: Option<String>,
    pub header: Option<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRow {
    /// Original row index in the frame
    pub row: usize,
    /// Position in the ordered (filtered and sorted) sequence
    pub display_index: usize,
    /// Top edge within the scrollable body
    pub top: f32,
    pub height: f32,
    pub highlighted: bool,
    pub expanded: bool,
    pub cells: Vec<RenderedCell>,
    pub nested: Vec<NestedTable>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    pub index: usize,
    pub count: usize,
    pub size: usize,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct GridSnapshot {
    pub state: GridState,
    pub header: Vec<HeaderCell>,
    pub rows: Vec<RenderedRow>,
    /// Footer lines per column, `None` when the footer is off
    pub footer: Option<Vec<Vec<String>>>,
    pub scroll_offset: f32,
    pub total_height: f32,
    pub viewport_height: f32,
    pub page: Option<PageInfo>,
    pub total_rows: usize,
    pub filtered_rows: usize,
}

pub struct TableView {
    options: ViewOptions,
    display: Box<dyn DisplayProcessor>,
    variables: Box<dyn VariableResolver>,
    listener: Option<Box<dyn GridListener>>,
    hover: Option<HoverSync>,

    frame: Arc<DataFrame>,
    revision: u64,
    valid: bool,
    container_height: f32,
    widths: ColumnWidths,
    columns: Vec<ColumnDescriptor>,

    sort: SortState,
    filters: FilterState,
    expansion: ExpansionState,
    highlighted: Option<usize>,

    filtered: Vec<usize>,
    filtered_stamp: Option<(u64, FilterState)>,
    ordered: Vec<usize>,
    ordered_stamp: Option<(u64, FilterState, SortState)>,
    /// Rows handed to the window: the current page, or everything
    rows: Vec<usize>,

    footer: FooterCache,
    heights: RowHeightResolver,
    window: WindowController,
    pagination: Pagination,
}

impl TableView {
    pub fn new(options: ViewOptions) -> Self {
        let heights = RowHeightResolver::new(options.heights.clone(), Box::new(UnicodeMeasurer));
        let window = WindowController::new(0.0, options.heights.row_height, options.overscan);
        let pagination = Pagination::new(options.paginate);
        let sort = options.initial_sort.clone();
        Self {
            options,
            display: Box::new(DefaultDisplay::new()),
            variables: Box::new(NoVariables),
            listener: None,
            hover: None,
            frame: Arc::new(DataFrame::new(Vec::new())),
            revision: 0,
            valid: true,
            container_height: 0.0,
            widths: ColumnWidths::new(),
            columns: Vec::new(),
            sort,
            filters: FilterState::new(),
            expansion: ExpansionState::new(),
            highlighted: None,
            filtered: Vec::new(),
            filtered_stamp: None,
            ordered: Vec::new(),
            ordered_stamp: None,
            rows: Vec::new(),
            footer: FooterCache::new(),
            heights,
            window,
            pagination,
        }
    }

    pub fn with_display(mut self, display: Box<dyn DisplayProcessor>) -> Self {
        self.display = display;
        self.invalidate_derived();
        self
    }

    pub fn with_variables(mut self, variables: Box<dyn VariableResolver>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_measurer(mut self, measurer: Box<dyn TextMeasurer>) -> Self {
        self.heights.set_measurer(measurer);
        self.window.reset();
        self
    }

    pub fn with_listener(mut self, listener: Box<dyn GridListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Share hovered rows with other views on the same bus
    pub fn with_hover_sync(mut self, bus: Rc<dyn EventBus>, source: &str) -> Self {
        self.hover = Some(HoverSync::new(bus, source));
        self
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn sort_state(&self) -> &SortState {
        &self.sort
    }

    pub fn filter_state(&self) -> &FilterState {
        &self.filters
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn scroll_offset(&self) -> f32 {
        self.window.scroll_offset()
    }

    /// Rows passing the filters, in frame order
    pub fn filtered_rows(&self) -> &[usize] {
        &self.filtered
    }

    /// Filtered rows in sort order
    pub fn ordered_rows(&self) -> &[usize] {
        &self.ordered
    }

    /// Rows of the current page (every ordered row without pagination)
    pub fn page_rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn footer_computations(&self) -> usize {
        self.footer.computations()
    }

    /// Replace the dataset. Derived state from the previous data is dropped;
    /// user state (sort, filters, widths, expansion) carries over where it
    /// still applies.
    pub fn set_data(&mut self, frame: impl Into<Arc<DataFrame>>) {
        let frame = frame.into();
        self.revision = self.revision.wrapping_add(1);
        self.valid = match frame.validate() {
            Ok(rows) => {
                debug!(revision = self.revision, rows, fields = frame.field_count(), "data replaced");
                true
            }
            Err(e) => {
                warn!(error = %e, "malformed frame, rendering no data");
                false
            }
        };
        self.widths.retain_columns(&frame);
        self.expansion.retain_valid(&frame);
        self.frame = frame;
        if self.highlighted.is_some_and(|row| row >= self.frame.row_count()) {
            self.highlighted = None;
        }
        self.rebuild_columns();
        self.window.reset();
        self.sync();
    }

    pub fn set_container_size(&mut self, width: f32, height: f32) {
        self.options.layout.container_width = width;
        self.container_height = height;
        self.rebuild_columns();
        self.sync();
    }

    pub fn set_show_row_numbers(&mut self, show: bool) {
        self.options.layout.show_row_numbers = show;
        self.rebuild_columns();
        self.sync();
    }

    pub fn set_wrap(&mut self, wrap: bool) {
        self.options.heights.wrap = wrap;
        self.apply_height_options();
    }

    pub fn set_wrap_column(&mut self, column: Option<String>) {
        self.options.heights.wrap_column = column;
        self.apply_height_options();
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.options.overscan = overscan;
        self.sync();
    }

    pub fn set_footer_options(&mut self, footer: FooterOptions) {
        self.options.footer = footer;
        self.sync();
    }

    pub fn set_paginate(&mut self, enabled: bool) {
        self.options.paginate = enabled;
        self.pagination.set_enabled(enabled);
        self.sync();
    }

    fn apply_height_options(&mut self) {
        self.heights.set_options(self.options.heights.clone());
        self.sync();
    }

    /// Advance a column's sort cycle; see `sort::toggle_sort`
    pub fn toggle_sort(&mut self, column: &str, multi: bool) {
        match find_column(&self.columns, column) {
            Some(c) if c.sortable => {}
            _ => {
                debug!(column, "ignoring sort on unsortable column");
                return;
            }
        }
        let next = super::sort::toggle_sort(&self.sort, column, multi);
        self.set_sort(next);
    }

    pub fn set_sort(&mut self, sort: SortState) {
        if sort == self.sort {
            return;
        }
        self.sort = sort;
        let sort = self.sort.clone();
        self.notify(|l| l.on_sort_change(&sort));
        self.sync();
    }

    pub fn set_filter(&mut self, column: &str, filter: ColumnFilter) {
        if !self.is_filterable(column) {
            return;
        }
        let same_selection = self.filters.get(column).is_some_and(|f| f.selected == filter.selected);
        self.filters.set(column, filter);
        if !same_selection {
            self.filters_changed();
        }
    }

    /// Keep a picker search with the column's filter. Rows are unaffected.
    pub fn set_filter_search(&mut self, column: &str, pattern: Option<&str>) -> bool {
        self.filters.set_search(column, pattern)
    }

    fn is_filterable(&self, column: &str) -> bool {
        if find_column(&self.columns, column).is_some_and(|c| !c.filterable) {
            debug!(column, "ignoring filter on unfilterable column");
            return false;
        }
        true
    }

    pub fn clear_filter(&mut self, column: &str) {
        if self.filters.clear(column) {
            self.filters_changed();
        }
    }

    pub fn clear_all_filters(&mut self) {
        if !self.filters.is_empty() {
            self.filters.clear_all();
            self.filters_changed();
        }
    }

    /// Quick filter from a cell (`=` keeps the value, `!=` drops it)
    pub fn add_cell_filter(&mut self, request: &CellFilter) -> Result<(), GridError> {
        if !self.is_filterable(&request.column) {
            return Ok(());
        }
        let all = self.all_rows();
        self.filters = apply_cell_filter(&self.filters, request, &self.frame, &all, self.display.as_ref())?;
        self.filters_changed();
        Ok(())
    }

    fn filters_changed(&mut self) {
        let filters = self.filters.clone();
        self.notify(|l| l.on_filter_change(&filters));
        self.sync();
    }

    /// Values a column's filter picker offers under the other active filters
    pub fn filter_options(&self, column: &str) -> Result<Vec<FilterOption>, GridError> {
        filter_options(&self.frame, &self.all_rows(), &self.filters, column, self.display.as_ref())
    }

    /// Filter options whose label matches the column's stored picker search
    /// (case-insensitive regex). Every option when no search is stored.
    pub fn search_filter_options(&self, column: &str) -> Result<Vec<FilterOption>, GridError> {
        let options = self.filter_options(column)?;
        let pattern = self.filters.get(column).and_then(|f| f.search.as_deref()).unwrap_or("");
        Ok(search_options(&options, pattern).into_iter().cloned().collect())
    }

    pub fn resize_column(&mut self, column: &str, width: f32) {
        let Some(min_width) = find_column(&self.columns, column)
            .filter(|c| c.resizable)
            .map(|c| c.min_width)
        else {
            return;
        };
        let stored = self.widths.set(column, width, min_width);
        self.rebuild_columns();
        self.notify(|l| l.on_column_resize(column, stored));
        self.sync();
    }

    pub fn set_page(&mut self, page: usize) {
        if self.pagination.set_page(page, self.ordered.len()) {
            let index = self.pagination.page_index();
            self.notify(|l| l.on_page_change(index));
            self.sync();
        }
    }

    pub fn next_page(&mut self) {
        self.set_page(self.pagination.page_index() + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.pagination.page_index().saturating_sub(1));
    }

    /// Expand or collapse an original row, returning whether it is now expanded
    pub fn toggle_expanded(&mut self, row: usize) -> bool {
        let expanded = self.expansion.toggle(row, &self.frame);
        self.heights.invalidate_row(row);
        let first_affected = self.rows.iter().position(|&r| r == row).unwrap_or(0);
        self.window.reset_after_index(first_affected);
        self.with_heights(|window, heights| window.clamp(heights));
        expanded
    }

    pub fn collapse_all(&mut self) {
        if self.expansion.is_empty() {
            return;
        }
        self.expansion.collapse_all();
        self.heights.invalidate_all();
        self.window.reset();
        self.with_heights(|window, heights| window.clamp(heights));
    }

    /// Drop a user-set width so the column is laid out automatically again
    pub fn reset_column_width(&mut self, column: &str) {
        if self.widths.remove(column) {
            self.rebuild_columns();
            self.sync();
        }
    }

    pub fn scroll_to(&mut self, offset: f32) {
        self.with_heights(|window, heights| window.scroll_to(offset, heights));
    }

    pub fn scroll_by(&mut self, delta: f32) {
        self.with_heights(|window, heights| window.scroll_by(delta, heights));
    }

    /// Highlight an original row, scroll it into view at the end of the tick
    /// and tell the other views on the bus
    pub fn highlight_row(&mut self, row: Option<usize>) {
        self.set_highlight(row);
        if let Some(hover) = &self.hover {
            match self.highlighted {
                Some(r) => hover.publish_hover(Some(r), self.row_time(r)),
                None => hover.publish_clear(),
            }
        }
    }

    /// Move the highlight by `delta` rows within the current page
    pub fn move_highlight(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() as isize - 1;
        let next = match self.highlighted.and_then(|r| self.position_of(r)) {
            Some(i) => (i as isize + delta).clamp(0, last),
            None => 0,
        };
        self.highlight_row(self.rows.get(next as usize).copied());
    }

    fn set_highlight(&mut self, row: Option<usize>) {
        self.highlighted = row.filter(|&r| r < self.frame.row_count());
        let Some(row) = self.highlighted else {
            return;
        };
        // a row on another page brings its page up first
        if self.pagination.is_enabled() && self.position_of(row).is_none() {
            if let Some(index) = self.ordered.iter().position(|&r| r == row) {
                self.set_page(index / self.pagination.page_size());
            }
        }
        if let Some(index) = self.position_of(row) {
            self.window.request_scroll_to_row(index);
        }
    }

    fn position_of(&self, row: usize) -> Option<usize> {
        self.rows.iter().position(|&r| r == row)
    }

    fn row_time(&self, row: usize) -> Option<i64> {
        let field = self.frame.field(self.frame.time_field_index()?)?;
        match field.value(row) {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    /// Filtered row whose timestamp is closest to `time`
    fn nearest_row_by_time(&self, time: i64) -> Option<usize> {
        let field = self.frame.field(self.frame.time_field_index()?)?;
        self.filtered.iter()
            .filter_map(|&r| match field.value(r) {
                Value::Time(t) => Some((r, t.abs_diff(time))),
                _ => None,
            })
            .min_by_key(|&(_, distance)| distance)
            .map(|(r, _)| r)
    }

    /// Settle the tick: apply hovers from other views, then any pending
    /// auto-scroll. Returns whether the scroll offset moved.
    pub fn end_tick(&mut self) -> bool {
        let events = self.hover.as_ref().map(|h| h.drain()).unwrap_or_default();
        for event in events {
            match event {
                GridEvent::DataHover { row, time, .. } => {
                    let target = match time {
                        Some(t) => self.nearest_row_by_time(t),
                        None => row,
                    };
                    self.set_highlight(target);
                }
                GridEvent::DataHoverClear { .. } => self.highlighted = None,
            }
        }
        self.with_heights(|window, heights| window.end_tick(heights))
    }

    /// Raw value under a column for an original row
    pub fn cell_value(&self, row: usize, column: &str) -> Option<Value> {
        let field = self.frame.field(find_column(&self.columns, column)?.field_index()?)?;
        Some(field.value(row).clone())
    }

    /// Footer items for the filtered rows; memoized, so re-sorting is free
    pub fn footer(&mut self) -> Vec<FooterItem> {
        if !self.options.footer.is_enabled() {
            return Vec::new();
        }
        self.footer
            .get_or_compute(self.revision, &self.filters, &self.filtered, &self.options.footer, &self.frame, &self.columns)
            .to_vec()
    }

    pub fn snapshot(&mut self) -> GridSnapshot {
        let state = if !self.valid || self.columns.is_empty() || self.frame.row_count() == 0 {
            GridState::NoData
        } else if self.ordered.is_empty() {
            GridState::NoMatches
        } else {
            GridState::Rows
        };

        let header = self.header_cells();
        let footer = self.footer_lines();

        // a page is rendered whole
        let range = if self.pagination.is_enabled() {
            (!self.rows.is_empty()).then(|| 0..self.rows.len())
        } else {
            self.with_heights(|window, heights| window.visible_range(heights))
        };
        let rows = match range {
            Some(range) => self.render_rows(range),
            None => Vec::new(),
        };

        let page = self.pagination.is_enabled().then(|| PageInfo {
            index: self.pagination.page_index(),
            count: self.pagination.page_count(self.ordered.len()),
            size: self.pagination.page_size(),
        });

        GridSnapshot {
            state,
            header,
            rows,
            footer,
            scroll_offset: self.window.scroll_offset(),
            total_height: self.window.total_height(),
            viewport_height: self.window.viewport_height(),
            page,
            total_rows: if self.valid { self.frame.row_count() } else { 0 },
            filtered_rows: self.filtered.len(),
        }
    }

    fn header_cells(&self) -> Vec<HeaderCell> {
        let multi = self.sort.keys().len() > 1;
        self.columns.iter()
            .map(|c| HeaderCell {
                id: c.id.clone(),
                kind: c.kind,
                title: c.header.clone(),
                width: c.width,
                justify: c.justify,
                sort: self.sort.direction(&c.id),
                sort_priority: if multi { self.sort.priority(&c.id) } else { None },
                filtered: self.filters.get(&c.id).is_some(),
            })
            .collect()
    }

    fn footer_lines(&mut self) -> Option<Vec<Vec<String>>> {
        if !self.options.footer.is_enabled() || self.columns.is_empty() {
            return None;
        }
        let items = self.footer();
        Some(items.iter()
            .zip(&self.columns)
            .map(|(item, column)| self.format_footer(item, column))
            .collect())
    }

    fn format_footer(&self, item: &FooterItem, column: &ColumnDescriptor) -> Vec<String> {
        let field = column.field_index().and_then(|i| self.frame.field(i));
        let format = |v: &FooterValue| match (v.reducer, field) {
            (Reducer::Count, _) => format!("{}", v.value as u64),
            (_, Some(field)) => self.display.display(field, &Value::Number(v.value)).text,
            (_, None) => v.value.to_string(),
        };
        match item {
            FooterItem::Empty => Vec::new(),
            FooterItem::RowCount(n) => vec![format!("Count: {n}")],
            FooterItem::Values(values) if values.len() == 1 => vec![format(&values[0])],
            FooterItem::Values(values) => values.iter()
                .map(|v| format!("{}: {}", v.reducer.label(), format(v)))
                .collect(),
        }
    }

    fn render_rows(&mut self, range: Range<usize>) -> Vec<RenderedRow> {
        let page_start = self.pagination.page_range(self.ordered.len()).start;
        let mut rendered = Vec::with_capacity(range.len());
        for index in range {
            let Some(&row) = self.rows.get(index) else {
                continue;
            };
            let (top, height) = self.with_heights(|window, heights| {
                (window.row_offset(index, heights), window.row_size(index, heights))
            });
            let display_index = page_start + index;
            let expanded = self.expansion.is_expanded(row);
            let cells = self.columns.iter()
                .map(|column| self.render_cell(column, row, display_index))
                .collect();
            let nested = if expanded {
                self.frame.nested_frames(row).iter().map(|f| self.nested_table(f)).collect()
            } else {
                Vec::new()
            };
            rendered.push(RenderedRow {
                row,
                display_index,
                top,
                height,
                highlighted: self.highlighted == Some(row),
                expanded,
                cells,
                nested,
            });
        }
        rendered
    }

    fn render_cell(&self, column: &ColumnDescriptor, row: usize, display_index: usize) -> RenderedCell {
        match column.kind {
            ColumnKind::RowNumber => RenderedCell::plain(CellContent::RowNumber(display_index + 1)),
            ColumnKind::Expander => RenderedCell::plain(CellContent::Expander {
                expanded: self.expansion.is_expanded(row),
                available: ExpansionState::can_expand(row, &self.frame),
            }),
            ColumnKind::Data { field } => {
                let Some(field) = self.frame.field(field) else {
                    return RenderedCell::plain(CellContent::Text { text: String::new(), color: None });
                };
                let value = field.value(row);
                let display = self.display.display(field, value);
                let links = resolve_links(field, value, &display, self.variables.as_ref());
                RenderedCell { content: cell_content(field, value, display), links }
            }
        }
    }

    fn nested_table(&self, frame: &DataFrame) -> NestedTable {
        let fields: Vec<&Field> = frame.fields.iter()
            .filter(|f| !f.config.hidden && f.field_type != FieldType::NestedTable)
            .collect();
        NestedTable {
            name: frame.name.clone(),
            header: frame.show_header.then(|| fields.iter().map(|f| f.display_name().to_string()).collect()),
            rows: (0..frame.row_count())
                .map(|r| fields.iter().map(|f| self.display.display(f, f.value(r)).text).collect())
                .collect(),
        }
    }

    fn all_rows(&self) -> Vec<usize> {
        if self.valid {
            (0..self.frame.row_count()).collect()
        } else {
            Vec::new()
        }
    }

    fn rebuild_columns(&mut self) {
        self.columns = if self.valid {
            build_columns(&self.frame, &self.options.layout, &self.widths)
        } else {
            Vec::new()
        };
    }

    fn invalidate_derived(&mut self) {
        self.filtered_stamp = None;
        self.ordered_stamp = None;
        self.footer.invalidate();
        self.heights.invalidate_all();
        self.window.reset();
    }

    fn body_height(&self) -> f32 {
        let mut chrome = self.options.header_height;
        if self.options.footer.is_enabled() {
            chrome += self.options.footer_height;
        }
        if self.pagination.is_enabled() {
            chrome += self.options.pager_height;
        }
        (self.container_height - chrome).max(0.0)
    }

    fn notify(&mut self, f: impl FnOnce(&mut dyn GridListener)) {
        if let Some(listener) = self.listener.as_mut() {
            f(&mut **listener);
        }
    }

    /// Run a window operation with row heights for the current sequence
    fn with_heights<R>(&mut self, f: impl FnOnce(&mut WindowController, &mut dyn FnMut(usize) -> f32) -> R) -> R {
        let Self { window, heights, frame, expansion, display, rows, .. } = self;
        let mut height = |index: usize| match rows.get(index) {
            Some(&row) => heights.height(row, &**frame, &*expansion, &**display),
            None => 0.0,
        };
        f(window, &mut height)
    }

    /// Bring every derived stage up to date with the current inputs
    fn sync(&mut self) {
        let selections = self.filters.selections();
        let filter_stamp = (self.revision, selections.clone());
        if self.filtered_stamp.as_ref() != Some(&filter_stamp) {
            let all = if self.columns.is_empty() { Vec::new() } else { self.all_rows() };
            self.filtered = filter_rows(&all, &self.filters, &self.frame);
            debug!(revision = self.revision, rows = self.filtered.len(), "filter stage recomputed");
            self.filtered_stamp = Some(filter_stamp);
        }

        let order_stamp = (self.revision, selections, self.sort.clone());
        if self.ordered_stamp.as_ref() != Some(&order_stamp) {
            self.ordered = sort_rows(&self.filtered, &self.sort, &self.frame);
            debug!(keys = self.sort.keys().len(), "sort stage recomputed");
            self.ordered_stamp = Some(order_stamp);
        }

        let body = self.body_height();
        let row_height = self.heights.row_height();
        let before = self.pagination.page_index();
        self.pagination.set_page_size(Pagination::page_size_for(body, row_height), self.ordered.len());
        if self.pagination.is_enabled() && self.pagination.page_index() != before {
            let index = self.pagination.page_index();
            self.notify(|l| l.on_page_change(index));
        }

        let rows = self.pagination.slice(&self.ordered).to_vec();
        if rows != self.rows {
            let first_changed = self.rows.iter()
                .zip(&rows)
                .position(|(a, b)| a != b)
                .unwrap_or(self.rows.len().min(rows.len()));
            self.window.set_row_count(rows.len());
            self.window.reset_after_index(first_changed);
            self.rows = rows;
        }

        if self.heights.prepare(self.revision, &self.frame, &self.columns) {
            self.window.reset();
        }
        self.window.set_viewport_height(body);
        self.window.set_estimated_row_height(row_height);
        self.window.set_overscan(self.options.overscan);
        self.with_heights(|window, heights| window.clamp(heights));
    }
}
