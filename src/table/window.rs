//! Viewport windowing over variable-height rows
//!
//! Row tops are kept as an incrementally grown prefix sum. Rows are measured
//! lazily, only as far as a query needs, and the unmeasured tail is
//! estimated from the measured average. Indices here are display positions
//! in the sequence the controller was given, never original row indices.

use std::ops::Range;

use tracing::debug;

#[derive(Debug, Clone)]
pub struct WindowController {
    row_count: usize,
    viewport_height: f32,
    overscan: usize,
    estimated_row_height: f32,
    scroll_offset: f32,
    /// `offsets[i]` is the top of row `i`; `offsets.len() - 1` rows are measured
    offsets: Vec<f32>,
    pending_target: Option<usize>,
    manual_scroll: bool,
}

impl WindowController {
    pub fn new(viewport_height: f32, estimated_row_height: f32, overscan: usize) -> Self {
        Self {
            row_count: 0,
            viewport_height,
            overscan,
            estimated_row_height,
            scroll_offset: 0.0,
            offsets: vec![0.0],
            pending_target: None,
            manual_scroll: false,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(0.0);
    }

    pub fn set_estimated_row_height(&mut self, height: f32) {
        self.estimated_row_height = height;
    }

    pub fn set_overscan(&mut self, overscan: usize) {
        self.overscan = overscan;
    }

    /// Change the number of rows; cached tops beyond the new end are dropped
    pub fn set_row_count(&mut self, count: usize) {
        if count != self.row_count {
            self.row_count = count;
            self.offsets.truncate(count + 1);
            if self.offsets.is_empty() {
                self.offsets.push(0.0);
            }
        }
    }

    /// Forget cached tops from `index` on; rows before it stay valid
    pub fn reset_after_index(&mut self, index: usize) {
        debug!(index, "window layout reset");
        self.offsets.truncate(index + 1);
        if self.offsets.is_empty() {
            self.offsets.push(0.0);
        }
    }

    pub fn reset(&mut self) {
        self.reset_after_index(0);
    }

    /// Number of rows whose height is known
    pub fn measured_rows(&self) -> usize {
        self.offsets.len() - 1
    }

    fn measure_row(&mut self, heights: &mut dyn FnMut(usize) -> f32) {
        let index = self.measured_rows();
        let top = self.offsets[index];
        self.offsets.push(top + heights(index).max(0.0));
    }

    /// Measure rows until row `index` has a known bottom
    fn measure_through(&mut self, index: usize, heights: &mut dyn FnMut(usize) -> f32) {
        let last = index.min(self.row_count.saturating_sub(1));
        while self.measured_rows() < self.row_count && self.measured_rows() <= last {
            self.measure_row(heights);
        }
    }

    /// Measure rows until the known layout extends past `offset`
    fn measure_past(&mut self, offset: f32, heights: &mut dyn FnMut(usize) -> f32) {
        while self.measured_rows() < self.row_count && self.offsets[self.measured_rows()] <= offset {
            self.measure_row(heights);
        }
    }

    fn average_height(&self) -> f32 {
        let measured = self.measured_rows();
        if measured == 0 {
            self.estimated_row_height
        } else {
            self.offsets[measured] / measured as f32
        }
    }

    /// Measured height plus an estimate for rows not measured yet
    pub fn total_height(&self) -> f32 {
        let measured = self.measured_rows();
        let remaining = self.row_count.saturating_sub(measured);
        self.offsets[measured] + remaining as f32 * self.average_height()
    }

    fn max_offset(&self) -> f32 {
        (self.total_height() - self.viewport_height).max(0.0)
    }

    /// Top of a row, measuring up to it if needed
    pub fn row_offset(&mut self, index: usize, heights: &mut dyn FnMut(usize) -> f32) -> f32 {
        if index == 0 || self.row_count == 0 {
            return 0.0;
        }
        let index = index.min(self.row_count - 1);
        self.measure_through(index - 1, heights);
        self.offsets[index]
    }

    /// Height of a row, measuring up to it if needed
    pub fn row_size(&mut self, index: usize, heights: &mut dyn FnMut(usize) -> f32) -> f32 {
        if index >= self.row_count {
            return 0.0;
        }
        self.measure_through(index, heights);
        self.offsets[index + 1] - self.offsets[index]
    }

    /// User-driven scroll; clamps and takes precedence over any pending
    /// auto-scroll in the same tick
    pub fn scroll_to(&mut self, offset: f32, heights: &mut dyn FnMut(usize) -> f32) {
        self.manual_scroll = true;
        self.set_offset(offset, heights);
    }

    pub fn scroll_by(&mut self, delta: f32, heights: &mut dyn FnMut(usize) -> f32) {
        let target = self.scroll_offset + delta;
        self.scroll_to(target, heights);
    }

    fn set_offset(&mut self, offset: f32, heights: &mut dyn FnMut(usize) -> f32) {
        let offset = if offset.is_finite() { offset.max(0.0) } else { 0.0 };
        // measure far enough that the clamp sees the real bottom near the target
        self.measure_past(offset + self.viewport_height, heights);
        self.scroll_offset = offset.min(self.max_offset());
    }

    /// Re-apply the clamp after the row set or viewport changed
    pub fn clamp(&mut self, heights: &mut dyn FnMut(usize) -> f32) {
        let offset = self.scroll_offset;
        self.set_offset(offset, heights);
    }

    /// Ask for a row to be brought into view at the end of the tick
    pub fn request_scroll_to_row(&mut self, index: usize) {
        self.pending_target = Some(index);
    }

    pub fn pending_target(&self) -> Option<usize> {
        self.pending_target
    }

    /// Settle the tick. A pending auto-scroll is applied only when no manual
    /// scroll happened since the last tick. Returns whether the offset moved.
    pub fn end_tick(&mut self, heights: &mut dyn FnMut(usize) -> f32) -> bool {
        let target = self.pending_target.take();
        let manual = std::mem::replace(&mut self.manual_scroll, false);
        let Some(index) = target else {
            return false;
        };
        if manual || index >= self.row_count {
            return false;
        }

        let top = self.row_offset(index, heights);
        let bottom = top + self.row_size(index, heights);
        let before = self.scroll_offset;
        if top < self.scroll_offset {
            self.set_offset(top, heights);
        } else if bottom > self.scroll_offset + self.viewport_height {
            self.set_offset(bottom - self.viewport_height, heights);
        }
        self.scroll_offset != before
    }

    /// Rows intersecting the viewport, widened by the overscan.
    /// `None` when there are no rows at all.
    pub fn visible_range(&mut self, heights: &mut dyn FnMut(usize) -> f32) -> Option<Range<usize>> {
        if self.row_count == 0 {
            return None;
        }
        let top = self.scroll_offset;
        let bottom = top + self.viewport_height;
        self.measure_past(bottom, heights);

        let measured = self.measured_rows();
        // first row whose bottom is below the top edge
        let first = self.offsets[1..=measured].partition_point(|&b| b <= top).min(self.row_count - 1);
        // first row whose top is at or past the bottom edge
        let end = self.offsets[..measured].partition_point(|&t| t < bottom).max(first + 1);

        let start = first.saturating_sub(self.overscan);
        let end = (end + self.overscan).min(self.row_count);
        self.measure_through(end - 1, heights);
        Some(start..end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(h: f32) -> impl FnMut(usize) -> f32 {
        move |_| h
    }

    fn controller(rows: usize, viewport: f32) -> WindowController {
        let mut w = WindowController::new(viewport, 10.0, 0);
        w.set_row_count(rows);
        w
    }

    #[test]
    fn test_empty_has_no_range() {
        let mut w = controller(0, 100.0);
        assert_eq!(w.visible_range(&mut uniform(10.0)), None);
    }

    #[test]
    fn test_initial_range() {
        let mut w = controller(100, 50.0);
        assert_eq!(w.visible_range(&mut uniform(10.0)), Some(0..5));
    }

    #[test]
    fn test_partial_rows_included() {
        let mut w = controller(100, 50.0);
        let mut h = uniform(10.0);
        w.scroll_to(15.0, &mut h);
        assert_eq!(w.visible_range(&mut h), Some(1..7));
    }

    #[test]
    fn test_variable_heights() {
        let heights = [10.0, 30.0, 10.0, 10.0, 50.0, 10.0];
        let mut h = |i: usize| heights[i];
        let mut w = controller(heights.len(), 25.0);
        w.scroll_to(35.0, &mut h);
        // rows 1 (10..40) and 2 (40..50) intersect 35..60, as does row 3 (50..60)
        assert_eq!(w.visible_range(&mut h), Some(1..4));
    }

    #[test]
    fn test_overscan() {
        let mut w = WindowController::new(20.0, 10.0, 2);
        w.set_row_count(100);
        let mut h = uniform(10.0);
        w.scroll_to(50.0, &mut h);
        assert_eq!(w.visible_range(&mut h), Some(3..9));
    }

    #[test]
    fn test_scroll_clamps_past_end() {
        let mut w = controller(10, 30.0);
        let mut h = uniform(10.0);
        w.scroll_to(10_000.0, &mut h);
        assert_eq!(w.scroll_offset(), 70.0);
        assert_eq!(w.visible_range(&mut h), Some(7..10));
        w.scroll_to(-5.0, &mut h);
        assert_eq!(w.scroll_offset(), 0.0);
    }

    #[test]
    fn test_lazy_measurement() {
        let mut w = controller(1_000, 50.0);
        let mut calls = 0;
        let mut h = |_: usize| {
            calls += 1;
            10.0
        };
        w.visible_range(&mut h);
        assert!(calls < 20);
        assert_eq!(w.total_height(), 10_000.0);
    }

    #[test]
    fn test_reset_after_index_remeasures_tail() {
        let mut w = controller(5, 100.0);
        w.visible_range(&mut uniform(10.0));
        assert_eq!(w.row_offset(4, &mut uniform(10.0)), 40.0);

        w.reset_after_index(2);
        assert_eq!(w.measured_rows(), 2);
        let mut h = |i: usize| if i == 2 { 30.0 } else { 10.0 };
        assert_eq!(w.row_offset(4, &mut h), 60.0);
        assert_eq!(w.row_offset(1, &mut h), 10.0);
    }

    #[test]
    fn test_auto_scroll_brings_row_into_view() {
        let mut w = controller(100, 30.0);
        let mut h = uniform(10.0);
        w.request_scroll_to_row(50);
        assert!(w.end_tick(&mut h));
        assert_eq!(w.scroll_offset(), 480.0);
        assert_eq!(w.visible_range(&mut h), Some(48..51));

        w.request_scroll_to_row(10);
        assert!(w.end_tick(&mut h));
        assert_eq!(w.scroll_offset(), 100.0);
    }

    #[test]
    fn test_manual_scroll_wins_over_auto_scroll() {
        let mut w = controller(100, 30.0);
        let mut h = uniform(10.0);
        w.request_scroll_to_row(50);
        w.scroll_to(200.0, &mut h);
        assert!(!w.end_tick(&mut h));
        assert_eq!(w.scroll_offset(), 200.0);
        assert_eq!(w.pending_target(), None);
    }

    #[test]
    fn test_auto_scroll_visible_row_is_noop() {
        let mut w = controller(100, 30.0);
        let mut h = uniform(10.0);
        w.request_scroll_to_row(1);
        assert!(!w.end_tick(&mut h));
        assert_eq!(w.scroll_offset(), 0.0);
    }

    #[test]
    fn test_shrinking_row_count_clamps() {
        let mut w = controller(100, 30.0);
        let mut h = uniform(10.0);
        w.scroll_to(500.0, &mut h);
        w.set_row_count(5);
        w.clamp(&mut h);
        assert_eq!(w.scroll_offset(), 20.0);
        assert_eq!(w.visible_range(&mut h), Some(2..5));
    }
}
