//! Which rows show their nested sub-tables

use std::collections::BTreeSet;

use super::frame::DataFrame;

/// Expanded rows, tracked by original row index so that sorting and filtering
/// never move an expansion onto a different row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: BTreeSet<usize>,
}

impl ExpansionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, row: usize) -> bool {
        self.expanded.contains(&row)
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    /// Only rows carrying at least one sub-table can expand
    pub fn can_expand(row: usize, frame: &DataFrame) -> bool {
        !frame.nested_frames(row).is_empty()
    }

    /// Flip a row, returning whether it is now expanded
    pub fn toggle(&mut self, row: usize, frame: &DataFrame) -> bool {
        if self.expanded.remove(&row) {
            return false;
        }
        if !Self::can_expand(row, frame) {
            return false;
        }
        self.expanded.insert(row);
        true
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Drop rows that can no longer expand after the data changed
    pub fn retain_valid(&mut self, frame: &DataFrame) {
        self.expanded.retain(|&row| Self::can_expand(row, frame));
    }

    pub fn rows(&self) -> impl Iterator<Item = usize> + '_ {
        self.expanded.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::frame::Field;

    fn frame() -> DataFrame {
        let sub = DataFrame::new(vec![Field::numbers("x", &[1.0])]);
        DataFrame::new(vec![
            Field::numbers("n", &[1.0, 2.0, 3.0]),
            Field::nested("nested", vec![vec![sub.clone()], vec![], vec![sub]]),
        ])
    }

    #[test]
    fn test_toggle() {
        let frame = frame();
        let mut state = ExpansionState::new();
        assert!(state.toggle(0, &frame));
        assert!(state.is_expanded(0));
        assert!(!state.toggle(0, &frame));
        assert!(!state.is_expanded(0));
    }

    #[test]
    fn test_rows_without_nested_tables_do_not_expand() {
        let frame = frame();
        let mut state = ExpansionState::new();
        assert!(!state.toggle(1, &frame));
        assert!(!state.toggle(9, &frame));
        assert!(state.is_empty());
    }

    #[test]
    fn test_retain_valid() {
        let mut state = ExpansionState::new();
        state.toggle(0, &frame());
        state.toggle(2, &frame());
        let smaller = DataFrame::new(vec![
            Field::numbers("n", &[1.0]),
            Field::nested("nested", vec![vec![DataFrame::new(vec![])]]),
        ]);
        state.retain_valid(&smaller);
        assert_eq!(state.rows().collect::<Vec<_>>(), vec![0]);
    }
}
