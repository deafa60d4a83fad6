//! The grid engine: column model, row transforms and the view that drives them

pub mod columns;
pub mod display;
pub mod expansion;
pub mod filter;
pub mod footer;
pub mod frame;
pub mod pagination;
pub mod rowheight;
pub mod sort;
pub mod tableview;
pub mod window;

#[cfg(test)]
mod test;

pub use columns::{ColumnDescriptor, ColumnId, ColumnKind, ColumnLayout, ColumnWidths};
pub use display::{CellContent, CellDisplayMode, DefaultDisplay, DisplayProcessor, DisplayValue, VariableResolver};
pub use filter::{CellFilter, ColumnFilter, FilterOperator, FilterOption, FilterState};
pub use footer::{FooterItem, FooterOptions, Reducer};
pub use frame::{DataFrame, Field, FieldConfig, FieldType, Value};
pub use rowheight::{FontSpec, HeightOptions, TextMeasurer, UnicodeMeasurer, Unavailable};
pub use sort::{SortDirection, SortKey, SortState};
pub use tableview::{GridSnapshot, GridState, TableView, ViewOptions};
