use std::io;
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use tracing::debug;

use crate::config::GridConfig;
use crate::events::LocalBus;
use crate::style::Style;
use crate::table::filter::{CellFilter, FilterOperator};
use crate::table::footer::{FooterOptions, Reducer};
use crate::table::frame::DataFrame;
use crate::table::sort::SortDirection;
use crate::table::tableview::TableView;
use crate::ui::{self, StatusLine};

/// Footer reducer sets cycled with `f`
const FOOTER_PRESETS: [&[Reducer]; 7] = [
    &[],
    &[Reducer::Sum],
    &[Reducer::Mean],
    &[Reducer::Min],
    &[Reducer::Max],
    &[Reducer::Count],
    &[Reducer::Sum, Reducer::Mean, Reducer::Min, Reducer::Max, Reducer::Count],
];

/// Columns added or removed per `+`/`-`
const RESIZE_STEP: f32 = 2.0;

pub struct App {
    pub view: TableView,
    pub style: Style,
    pub file_name: String,
    pub message: Option<String>,
    pub should_quit: bool,
    /// Index among the data columns
    cursor_col: usize,
    footer_preset: usize,
    last_size: Option<Rect>,
}

impl App {
    pub fn new(config: &GridConfig, style: Style, frame: DataFrame, file_name: String) -> Self {
        let mut view = TableView::new(config.terminal_options());
        if config.hover_sync {
            view = view.with_hover_sync(Rc::new(LocalBus::new()), &file_name);
        }
        view.set_data(frame);

        let footer_preset = FOOTER_PRESETS.iter()
            .position(|p| *p == config.footer.canonical_reducers().as_slice())
            .unwrap_or(0);

        Self {
            view,
            style,
            file_name,
            message: None,
            should_quit: false,
            cursor_col: 0,
            footer_preset,
            last_size: None,
        }
    }

    pub fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
        while !self.should_quit {
            self.resize(terminal.size()?);
            self.view.end_tick();

            let snapshot = self.view.snapshot();
            let status = self.status_line();
            let cursor = self.cursor_column();
            terminal.draw(|f| ui::render(f, &snapshot, &status, &self.style, cursor.as_deref()))?;

            if poll(Duration::from_millis(16))? {
                if let Event::Key(key) = event::read()? {
                    self.message = None;
                    self.handle_key(key);
                }
            }
        }
        Ok(())
    }

    fn resize(&mut self, size: Rect) {
        if self.last_size == Some(size) {
            return;
        }
        let grid = ui::grid_area(size);
        self.view.set_container_size(grid.width as f32, grid.height as f32);
        self.last_size = Some(size);
    }

    /// Id of the data column under the cursor
    pub fn cursor_column(&self) -> Option<String> {
        self.view.columns().iter()
            .filter(|c| c.field_index().is_some())
            .nth(self.cursor_col)
            .map(|c| c.id.clone())
    }

    fn data_column_count(&self) -> usize {
        self.view.columns().iter().filter(|c| c.field_index().is_some()).count()
    }

    fn move_cursor(&mut self, delta: isize) {
        let count = self.data_column_count();
        if count == 0 {
            return;
        }
        self.cursor_col = (self.cursor_col as isize + delta).clamp(0, count as isize - 1) as usize;
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        let page = self.view.page_rows().len().max(1) as isize;
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if ctrl => self.should_quit = true,

            KeyCode::Char('j') | KeyCode::Down => self.view.move_highlight(1),
            KeyCode::Char('k') | KeyCode::Up => self.view.move_highlight(-1),
            KeyCode::Char('h') | KeyCode::Left => self.move_cursor(-1),
            KeyCode::Char('l') | KeyCode::Right => self.move_cursor(1),
            KeyCode::Char('g') | KeyCode::Home => self.view.move_highlight(isize::MIN / 2),
            KeyCode::Char('G') | KeyCode::End => self.view.move_highlight(isize::MAX / 2),
            KeyCode::PageDown => self.page_down(page),
            KeyCode::PageUp => self.page_up(page),
            KeyCode::Char('d') if ctrl => self.view.move_highlight(page / 2),
            KeyCode::Char('u') if ctrl => self.view.move_highlight(-page / 2),

            KeyCode::Char('s') => self.sort_cursor_column(false),
            KeyCode::Char('S') => self.sort_cursor_column(true),
            KeyCode::Char('=') => self.filter_on_cell(FilterOperator::Equal),
            KeyCode::Char('!') => self.filter_on_cell(FilterOperator::NotEqual),
            KeyCode::Char('c') => {
                if let Some(column) = self.cursor_column() {
                    self.view.clear_filter(&column);
                }
            }
            KeyCode::Char('C') => self.view.clear_all_filters(),

            KeyCode::Char('w') => {
                let wrap = !self.view.options().heights.wrap;
                self.view.set_wrap(wrap);
                self.message = Some(format!("Wrap {}", if wrap { "on" } else { "off" }));
            }
            KeyCode::Char('W') => {
                self.view.set_wrap_column(self.cursor_column());
            }
            KeyCode::Char('p') => {
                let paginate = !self.view.pagination().is_enabled();
                self.view.set_paginate(paginate);
            }
            KeyCode::Char(']') => self.view.next_page(),
            KeyCode::Char('[') => self.view.prev_page(),
            KeyCode::Char('f') => self.cycle_footer(),
            KeyCode::Char('r') => {
                let mut footer = self.view.options().footer.clone();
                footer.count_rows = !footer.count_rows;
                self.view.set_footer_options(footer);
            }
            KeyCode::Char('#') => {
                let show = !self.view.options().layout.show_row_numbers;
                self.view.set_show_row_numbers(show);
            }
            KeyCode::Char('+') => self.resize_cursor_column(RESIZE_STEP),
            KeyCode::Char('-') => self.resize_cursor_column(-RESIZE_STEP),
            KeyCode::Char('0') => {
                if let Some(column) = self.cursor_column() {
                    self.view.reset_column_width(&column);
                }
            }
            KeyCode::Char('E') => self.view.collapse_all(),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(row) = self.view.highlighted() {
                    if !self.view.toggle_expanded(row) {
                        self.message = Some("Row has no nested data".to_string());
                    }
                }
            }
            _ => {}
        }
    }

    fn page_down(&mut self, page: isize) {
        if self.view.pagination().is_enabled() {
            self.view.next_page();
        } else {
            self.view.move_highlight(page);
        }
    }

    fn page_up(&mut self, page: isize) {
        if self.view.pagination().is_enabled() {
            self.view.prev_page();
        } else {
            self.view.move_highlight(-page);
        }
    }

    fn sort_cursor_column(&mut self, multi: bool) {
        if let Some(column) = self.cursor_column() {
            self.view.toggle_sort(&column, multi);
        }
    }

    fn filter_on_cell(&mut self, operator: FilterOperator) {
        let (Some(row), Some(column)) = (self.view.highlighted(), self.cursor_column()) else {
            self.message = Some("No cell selected".to_string());
            return;
        };
        let Some(value) = self.view.cell_value(row, &column) else {
            return;
        };
        let request = CellFilter { column, operator, value };
        if let Err(e) = self.view.add_cell_filter(&request) {
            self.message = Some(e.to_string());
        }
    }

    fn cycle_footer(&mut self) {
        self.footer_preset = (self.footer_preset + 1) % FOOTER_PRESETS.len();
        let reducers = FOOTER_PRESETS[self.footer_preset].to_vec();
        let footer = FooterOptions { reducers, ..self.view.options().footer.clone() };
        debug!(preset = self.footer_preset, "footer reducers changed");
        self.view.set_footer_options(footer);
    }

    fn resize_cursor_column(&mut self, delta: f32) {
        let Some(column) = self.cursor_column() else {
            return;
        };
        let width = self.view.columns().iter()
            .find(|c| c.id == column)
            .map(|c| c.width)
            .unwrap_or(0.0);
        self.view.resize_column(&column, width + delta);
    }

    pub fn status_line(&self) -> StatusLine {
        let sort = self.view.sort_state().keys().iter()
            .map(|k| {
                let arrow = match k.direction {
                    SortDirection::Ascending => "▲",
                    SortDirection::Descending => "▼",
                };
                format!("{}{}", k.column, arrow)
            })
            .collect::<Vec<_>>()
            .join(",");

        let mut right = format!("{}/{} rows", self.view.filtered_rows().len(), self.view.frame().row_count());
        if !sort.is_empty() {
            right.push_str(&format!("  sort {}", sort));
        }
        let filters = self.view.filter_state().columns().count();
        if filters > 0 {
            right.push_str(&format!("  {} filtered", filters));
        }

        StatusLine {
            left: self.file_name.clone(),
            right,
            message: self.message.clone(),
        }
    }
}
