use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style as RatStyle},
    text::{Line, Span},
    widgets::{Block, Gauge, LineGauge, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::style::{cell_color, Style};
use crate::table::display::{CellContent, GaugeMode, Justify};
use crate::table::sort::SortDirection;
use crate::table::tableview::{GridSnapshot, GridState, HeaderCell, NestedTable, RenderedCell, RenderedRow};

/// Text shown below the grid
#[derive(Debug, Clone, Default)]
pub struct StatusLine {
    pub left: String,
    pub right: String,
    pub message: Option<String>,
}

/// Lines reserved under the grid for the status bar and message line
pub const STATUS_LINES: u16 = 2;

/// Part of the terminal the grid may use
pub fn grid_area(area: Rect) -> Rect {
    Rect { height: area.height.saturating_sub(STATUS_LINES), ..area }
}

pub fn render(frame: &mut Frame, snapshot: &GridSnapshot, status: &StatusLine, style: &Style, cursor: Option<&str>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_grid(frame, snapshot, style, cursor, chunks[0]);
    render_status_bar(frame, status, style, chunks[1]);
    if let Some(message) = &status.message {
        frame.render_widget(Paragraph::new(message.as_str()).style(style.message()), chunks[2]);
    }
}

fn render_grid(frame: &mut Frame, snapshot: &GridSnapshot, style: &Style, cursor: Option<&str>, area: Rect) {
    if area.height == 0 {
        return;
    }
    if snapshot.state == GridState::NoData {
        render_empty(frame, "No data", style, area);
        return;
    }

    let columns = layout_columns(&snapshot.header, cursor, area.width);
    render_header(frame, &snapshot.header, &columns, cursor, style, Rect { height: 1, ..area });

    let body_height = (snapshot.viewport_height.round() as u16).min(area.height.saturating_sub(1));
    let body = Rect { y: area.y + 1, height: body_height, ..area };

    if snapshot.state == GridState::NoMatches {
        render_empty(frame, "No results match your filter", style, body);
    } else {
        for row in &snapshot.rows {
            render_row(frame, row, &columns, snapshot.scroll_offset, style, body);
        }
        render_scrollbar(frame, snapshot, style, body);
    }

    let mut below = Rect {
        y: body.y + body.height,
        height: area.bottom().saturating_sub(body.y + body.height),
        ..area
    };
    if let Some(page) = &snapshot.page {
        if below.height > 0 {
            let pager = Rect { y: below.bottom() - 1, height: 1, ..below };
            let text = format!("Page {} of {}", page.index + 1, page.count);
            frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).style(style.footer()), pager);
            below.height -= 1;
        }
    }
    if let Some(footer) = &snapshot.footer {
        render_footer(frame, footer, &columns, style, below);
    }
}

/// Screen span (x offset, width) per column, scrolled so the cursor column is
/// visible. `None` for columns entirely off screen.
fn layout_columns(header: &[HeaderCell], cursor: Option<&str>, width: u16) -> Vec<Option<(u16, u16)>> {
    let mut edges = Vec::with_capacity(header.len());
    let mut x = 0.0f32;
    for cell in header {
        let start = x.round() as i32;
        x += cell.width;
        edges.push((start, x.round() as i32));
    }

    let width = width as i32;
    let shift = cursor
        .and_then(|id| header.iter().position(|c| c.id == id))
        .map(|i| {
            let (start, end) = edges[i];
            (end - width).max(0).min(start)
        })
        .unwrap_or(0);

    edges.into_iter()
        .map(|(start, end)| {
            let start = (start - shift).max(0);
            let end = (end - shift).min(width);
            (end > start).then(|| (start as u16, (end - start) as u16))
        })
        .collect()
}

fn column_rect(area: Rect, span: (u16, u16), y: u16, height: u16) -> Rect {
    // one blank cell between columns
    let width = if span.1 > 1 { span.1 - 1 } else { span.1 };
    Rect { x: area.x + span.0, y, width, height }
}

fn alignment(justify: Justify) -> Alignment {
    match justify {
        Justify::Right => Alignment::Right,
        Justify::Center => Alignment::Center,
        Justify::Auto | Justify::Left => Alignment::Left,
    }
}

fn render_header(
    frame: &mut Frame,
    header: &[HeaderCell],
    columns: &[Option<(u16, u16)>],
    cursor: Option<&str>,
    style: &Style,
    area: Rect,
) {
    for (cell, span) in header.iter().zip(columns) {
        let Some(span) = *span else {
            continue;
        };
        let mut title = cell.title.clone();
        match cell.sort {
            Some(SortDirection::Ascending) => title.push_str(" ▲"),
            Some(SortDirection::Descending) => title.push_str(" ▼"),
            None => {}
        }
        if let Some(priority) = cell.sort_priority {
            title.push_str(&(priority + 1).to_string());
        }
        if cell.filtered {
            title.push_str(" *");
        }

        let mut cell_style = style.header(cell.sort.is_some(), cell.filtered);
        if cursor == Some(cell.id.as_str()) {
            cell_style = cell_style.add_modifier(Modifier::UNDERLINED);
        }
        let paragraph = Paragraph::new(title).alignment(alignment(cell.justify)).style(cell_style);
        frame.render_widget(paragraph, column_rect(area, span, area.y, 1));
    }
}

/// Visible part of a band starting `top` lines into the body:
/// (screen y, height, lines clipped off the top)
fn clip(body: Rect, top: i32, height: i32) -> Option<(u16, u16, u16)> {
    let start = top.max(0);
    let end = (top + height).min(body.height as i32);
    (end > start).then(|| ((body.y as i32 + start) as u16, (end - start) as u16, (start - top) as u16))
}

fn nested_line_count(tables: &[NestedTable]) -> i32 {
    if tables.is_empty() {
        return 0;
    }
    let lines: usize = tables.iter().map(|t| t.rows.len() + usize::from(t.header.is_some())).sum();
    (lines + tables.len() - 1) as i32
}

fn render_row(
    frame: &mut Frame,
    row: &RenderedRow,
    columns: &[Option<(u16, u16)>],
    scroll_offset: f32,
    style: &Style,
    body: Rect,
) {
    let top = (row.top - scroll_offset).round() as i32;
    let height = row.height.round() as i32;
    let nested_height = nested_line_count(&row.nested).min(height - 1).max(0);
    let base_height = height - nested_height;

    if let Some((y, lines, skip)) = clip(body, top, base_height) {
        if row.highlighted {
            frame.render_widget(Block::default().style(style.row_highlight()), Rect { y, height: lines, ..body });
        }
        for (cell, span) in row.cells.iter().zip(columns) {
            if let Some(span) = *span {
                render_cell(frame, cell, column_rect(body, span, y, lines), skip, style);
            }
        }
    }

    if nested_height > 0 {
        if let Some((y, lines, skip)) = clip(body, top + base_height, nested_height) {
            let indent = 2.min(body.width);
            let area = Rect { x: body.x + indent, y, width: body.width - indent, height: lines };
            let paragraph = Paragraph::new(nested_lines(&row.nested, style)).scroll((skip, 0));
            frame.render_widget(paragraph, area);
        }
    }
}

/// Draw one cell; every display mode is handled here
fn render_cell(frame: &mut Frame, cell: &RenderedCell, area: Rect, skip: u16, style: &Style) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let base = if cell.links.is_empty() { style.cell() } else { style.link() };
    let text_cell = |text: &str, cell_style: RatStyle| {
        Paragraph::new(text.to_string())
            .style(cell_style)
            .wrap(Wrap { trim: true })
            .scroll((skip, 0))
    };

    match &cell.content {
        CellContent::Text { text, color } => {
            let cell_style = match color {
                Some(c) => base.fg(cell_color(*c)),
                None => base,
            };
            frame.render_widget(text_cell(text, cell_style), area);
        }
        CellContent::Background { text, color, gradient } => {
            let mut cell_style = match color {
                Some(c) => base.bg(cell_color(*c)),
                None => base,
            };
            if *gradient {
                cell_style = cell_style.add_modifier(Modifier::BOLD);
            }
            frame.render_widget(Block::default().style(cell_style), area);
            frame.render_widget(text_cell(text, cell_style), area);
        }
        CellContent::Gauge { text, fraction, color, mode } => {
            let gauge_style = match color {
                Some(c) => style.gauge().fg(cell_color(*c)),
                None => style.gauge(),
            };
            let line = Rect { height: 1, ..area };
            let ratio = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
            match mode {
                GaugeMode::Lcd => frame.render_widget(
                    LineGauge::default().ratio(ratio).label(text.as_str()).gauge_style(gauge_style),
                    line,
                ),
                GaugeMode::Basic | GaugeMode::Gradient => frame.render_widget(
                    Gauge::default().ratio(ratio).label(text.as_str()).gauge_style(gauge_style),
                    line,
                ),
            }
        }
        CellContent::Image { url } => {
            frame.render_widget(text_cell(&format!("[img] {url}"), style.link()), area);
        }
        CellContent::Json { text } => {
            frame.render_widget(text_cell(text, base.add_modifier(Modifier::DIM)), area);
        }
        CellContent::Custom { text, .. } => {
            frame.render_widget(text_cell(text, base), area);
        }
        CellContent::RowNumber(n) => {
            let paragraph = Paragraph::new(n.to_string()).alignment(Alignment::Right).style(style.row_number());
            frame.render_widget(paragraph, Rect { height: 1, ..area });
        }
        CellContent::Expander { expanded, available } => {
            let symbol = match (available, expanded) {
                (false, _) => " ",
                (true, true) => "▾",
                (true, false) => "▸",
            };
            frame.render_widget(Paragraph::new(symbol).style(style.expander()), Rect { height: 1, ..area });
        }
    }
}

/// Sub-tables as aligned text lines, one blank line between tables
fn nested_lines(tables: &[NestedTable], style: &Style) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for (i, table) in tables.iter().enumerate() {
        if i > 0 {
            lines.push(Line::default());
        }
        let count = table.header.as_ref().map(|h| h.len())
            .unwrap_or_else(|| table.rows.first().map(|r| r.len()).unwrap_or(0));
        let mut widths = vec![0; count];
        for cells in table.header.iter().chain(&table.rows) {
            for (w, text) in widths.iter_mut().zip(cells) {
                *w = (*w).max(text.width());
            }
        }
        let join = |cells: &[String]| {
            cells.iter()
                .zip(&widths)
                .map(|(text, w)| format!("{}{}", text, " ".repeat(w.saturating_sub(text.width()))))
                .collect::<Vec<_>>()
                .join(" │ ")
        };
        if let Some(header) = &table.header {
            lines.push(Line::from(Span::styled(join(header), style.nested().add_modifier(Modifier::BOLD))));
        }
        for cells in &table.rows {
            lines.push(Line::from(Span::styled(join(cells), style.nested())));
        }
    }
    lines
}

fn render_footer(frame: &mut Frame, footer: &[Vec<String>], columns: &[Option<(u16, u16)>], style: &Style, area: Rect) {
    if area.height == 0 {
        return;
    }
    frame.render_widget(Block::default().style(style.footer()), area);
    for (lines, span) in footer.iter().zip(columns) {
        let Some(span) = *span else {
            continue;
        };
        let text: Vec<Line> = lines.iter().map(|l| Line::from(l.as_str())).collect();
        frame.render_widget(Paragraph::new(text).style(style.footer()), column_rect(area, span, area.y, area.height));
    }
}

fn render_scrollbar(frame: &mut Frame, snapshot: &GridSnapshot, style: &Style, body: Rect) {
    if snapshot.total_height <= snapshot.viewport_height || body.height == 0 {
        return;
    }
    let max_offset = (snapshot.total_height - snapshot.viewport_height).max(1.0);
    let mut state = ScrollbarState::new(max_offset.round() as usize)
        .position(snapshot.scroll_offset.round() as usize)
        .viewport_content_length(snapshot.viewport_height.round() as usize);
    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight).style(style.scrollbar());
    frame.render_stateful_widget(scrollbar, body, &mut state);
}

fn render_empty(frame: &mut Frame, text: &str, style: &Style, area: Rect) {
    if area.height == 0 {
        return;
    }
    let middle = Rect { y: area.y + area.height / 2, height: 1, ..area };
    frame.render_widget(Paragraph::new(text).alignment(Alignment::Center).style(style.empty_state()), middle);
}

fn render_status_bar(frame: &mut Frame, status: &StatusLine, style: &Style, area: Rect) {
    let padding = (area.width as usize)
        .saturating_sub(status.left.width() + status.right.width() + 2);
    let line = Line::from(vec![
        Span::raw(" "),
        Span::styled(status.left.as_str(), style.status_bar().add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(padding)),
        Span::raw(status.right.as_str()),
        Span::raw(" "),
    ]);
    frame.render_widget(Paragraph::new(line).style(style.status_bar()), area);
}
