//! Fixed-size pages over the ordered row sequence

use std::ops::Range;

use tracing::debug;

/// Splits the ordered row sequence into fixed-size pages
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    enabled: bool,
    page_index: usize,
    page_size: usize,
}

impl Pagination {
    pub fn new(enabled: bool) -> Self {
        Self { enabled, page_index: 0, page_size: 1 }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.page_index = 0;
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Rows that fit in the body, never fewer than one
    pub fn page_size_for(body_height: f32, row_height: f32) -> usize {
        if row_height <= 0.0 || !body_height.is_finite() {
            return 1;
        }
        ((body_height / row_height).floor() as usize).max(1)
    }

    pub fn page_count(&self, total_rows: usize) -> usize {
        total_rows.div_ceil(self.page_size).max(1)
    }

    /// Change the page size and clamp the page index into range.
    /// Returns whether the page index moved.
    pub fn set_page_size(&mut self, page_size: usize, total_rows: usize) -> bool {
        self.page_size = page_size.max(1);
        self.clamp(total_rows)
    }

    /// Pull the page index back onto the last page if it ran past it
    pub fn clamp(&mut self, total_rows: usize) -> bool {
        let last = self.page_count(total_rows) - 1;
        if self.page_index > last {
            debug!(from = self.page_index, to = last, "page index clamped");
            self.page_index = last;
            return true;
        }
        false
    }

    /// Go to a page (clamped). Returns whether the page changed.
    pub fn set_page(&mut self, page_index: usize, total_rows: usize) -> bool {
        let last = self.page_count(total_rows) - 1;
        let target = page_index.min(last);
        let changed = target != self.page_index;
        self.page_index = target;
        changed
    }

    /// Positions of the current page within the ordered sequence; the whole
    /// sequence when pagination is off
    pub fn page_range(&self, total_rows: usize) -> Range<usize> {
        if !self.enabled {
            return 0..total_rows;
        }
        let start = (self.page_index * self.page_size).min(total_rows);
        let end = (start + self.page_size).min(total_rows);
        start..end
    }

    pub fn slice<'a>(&self, rows: &'a [usize]) -> &'a [usize] {
        &rows[self.page_range(rows.len())]
    }
}
