//! Virtualized table grid: sorting, value-set filters, footer aggregation,
//! variable row heights and a windowed renderer, plus a terminal viewer.

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod fileio;
pub mod style;
pub mod table;
pub mod ui;

pub use error::{GridError, Result};
