//! Generic data table.
//!
//! The table is a controlled component: rows, loading flag, sort and
//! pagination state arrive as a [`TableFrame`] on every render, and all
//! the widget owns is ephemeral UI state (row selection, search focus).
//! User intent leaves as [`TableEvent`]s for the page to apply to its
//! [`crate::grid::Browser`].

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState};

use crate::grid::{PAGE_SIZE_OPTIONS, Pagination, SortDirection, SortState, sort_indices};
use crate::theme::Theme;

use super::EventResult;

/// Placeholder for fields a row does not carry.
const MISSING_FIELD: &str = "-";
const SKELETON_CELL: &str = "░░░░░░░░░░░░";

/// Row view-model contract: a case-normalized field lookup. The table
/// reads rows only through this accessor (or a column's custom renderer),
/// so a malformed row degrades to placeholder dashes instead of panicking.
pub trait GridRow {
    /// Display value for a lowercase field key, `None` when absent.
    fn field(&self, key: &str) -> Option<String>;
}

/// How a column turns a row into a cell: either a custom render function,
/// or the default field lookup keyed by the column id.
pub enum CellRender<T> {
    Auto,
    With(fn(&T, &Theme) -> Cell<'static>),
}

pub struct Column<T> {
    pub id: &'static str,
    pub header: &'static str,
    pub constraint: Constraint,
    pub sortable: bool,
    pub render: CellRender<T>,
}

impl<T> Column<T> {
    pub fn new(id: &'static str, header: &'static str, constraint: Constraint) -> Self {
        Self {
            id,
            header,
            constraint,
            sortable: false,
            render: CellRender::Auto,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn with(mut self, render: fn(&T, &Theme) -> Cell<'static>) -> Self {
        self.render = CellRender::With(render);
        self
    }
}

/// Everything the table needs for one render, derived by the page from
/// its browser state.
pub struct TableFrame<'a, T> {
    pub rows: &'a [&'a T],
    pub loading: bool,
    pub empty_text: &'a str,
    /// Raw search text as the browser holds it, echoed under the table.
    pub search: &'a str,
    pub sort: &'a SortState,
    pub page: &'a Pagination,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    /// Row activated (Enter); the index refers to the rendered order.
    Activated(usize),
    /// The raw search text changed; the page owns debouncing.
    SearchEdited(String),
    NextPage,
    PrevPage,
    PageSizeChanged(usize),
    /// A sortable column header was toggled.
    SortToggled(&'static str),
}

pub struct DataTable<T> {
    title: String,
    columns: Vec<Column<T>>,
    state: TableState,
    searching: bool,
    query: String,
    // Snapshots from the last render, needed to interpret keys.
    row_count: usize,
    page_size: usize,
}

impl<T: GridRow> DataTable<T> {
    pub fn new(title: impl Into<String>, columns: Vec<Column<T>>) -> Self {
        Self {
            title: title.into(),
            columns,
            state: TableState::default(),
            searching: false,
            query: String::new(),
            row_count: 0,
            page_size: 0,
        }
    }

    pub fn selected(&self) -> Option<usize> {
        self.state.selected().filter(|&i| i < self.row_count)
    }

    pub const fn searching(&self) -> bool {
        self.searching
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> EventResult<TableEvent> {
        if self.searching {
            self.handle_search_key(key)
        } else {
            self.handle_navigation_key(key)
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) -> EventResult<TableEvent> {
        match key.code {
            KeyCode::Esc => {
                self.searching = false;
                if self.query.is_empty() {
                    EventResult::Consumed
                } else {
                    self.query.clear();
                    TableEvent::SearchEdited(String::new()).into()
                }
            }
            // Keep the filter, leave search mode.
            KeyCode::Enter => {
                self.searching = false;
                EventResult::Consumed
            }
            KeyCode::Backspace => {
                self.query.pop();
                TableEvent::SearchEdited(self.query.clone()).into()
            }
            KeyCode::Char(c) => {
                self.query.push(c);
                TableEvent::SearchEdited(self.query.clone()).into()
            }
            _ => EventResult::Consumed,
        }
    }

    fn handle_navigation_key(&mut self, key: KeyEvent) -> EventResult<TableEvent> {
        match key.code {
            KeyCode::Char('/') => {
                self.searching = true;
                EventResult::Consumed
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.select_next();
                EventResult::Consumed
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.select_previous();
                EventResult::Consumed
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.select_first();
                EventResult::Consumed
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.select_last();
                EventResult::Consumed
            }
            KeyCode::Enter => match self.selected() {
                Some(index) => TableEvent::Activated(index).into(),
                None => EventResult::Ignored,
            },
            KeyCode::Left | KeyCode::Char('h') => TableEvent::PrevPage.into(),
            KeyCode::Right | KeyCode::Char('l') => TableEvent::NextPage.into(),
            KeyCode::Char('+') | KeyCode::Char('=') => self.step_page_size(1),
            KeyCode::Char('-') => self.step_page_size(-1),
            KeyCode::Char(c @ '1'..='9') => {
                let n = c as usize - '1' as usize;
                match self.columns.iter().filter(|c| c.sortable).nth(n) {
                    Some(column) => TableEvent::SortToggled(column.id).into(),
                    None => EventResult::Ignored,
                }
            }
            KeyCode::Esc if !self.query.is_empty() => {
                self.query.clear();
                TableEvent::SearchEdited(String::new()).into()
            }
            _ => EventResult::Ignored,
        }
    }

    fn step_page_size(&mut self, step: isize) -> EventResult<TableEvent> {
        let position = PAGE_SIZE_OPTIONS
            .iter()
            .position(|&s| s >= self.page_size)
            .unwrap_or(0);
        let next = position.saturating_add_signed(step).min(PAGE_SIZE_OPTIONS.len() - 1);
        let size = PAGE_SIZE_OPTIONS[next];
        if size == self.page_size {
            EventResult::Consumed
        } else {
            TableEvent::PageSizeChanged(size).into()
        }
    }

    fn select_next(&mut self) {
        if self.row_count == 0 {
            return;
        }
        let next = match self.state.selected() {
            Some(i) => (i + 1).min(self.row_count - 1),
            None => 0,
        };
        self.state.select(Some(next));
    }

    fn select_previous(&mut self) {
        if self.row_count == 0 {
            return;
        }
        let prev = self.state.selected().map_or(0, |i| i.saturating_sub(1));
        self.state.select(Some(prev));
    }

    fn select_first(&mut self) {
        if self.row_count > 0 {
            self.state.select(Some(0));
        }
    }

    fn select_last(&mut self) {
        if self.row_count > 0 {
            self.state.select(Some(self.row_count - 1));
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme, view: &TableFrame<'_, T>) {
        self.row_count = if view.loading { 0 } else { view.rows.len() };
        self.page_size = view.page.page_size();
        // The browser owns the search text; the local copy only exists so
        // key handling can append and pop between renders.
        if self.query != view.search {
            self.query = view.search.to_string();
        }
        match self.state.selected() {
            Some(i) if i < self.row_count => {}
            _ if self.row_count > 0 => self.state.select(Some(0)),
            _ => self.state.select(None),
        }

        let show_search = self.searching || !self.query.is_empty();
        let [table_area, footer_area, search_area] = Layout::vertical([
            Constraint::Min(3),
            Constraint::Length(1),
            Constraint::Length(u16::from(show_search)),
        ])
        .areas(area);

        self.render_table(frame, table_area, theme, view);
        self.render_footer(frame, footer_area, theme, view);
        if show_search {
            self.render_search(frame, search_area, theme);
        }
    }

    fn render_table(&mut self, frame: &mut Frame, area: Rect, theme: &Theme, view: &TableFrame<'_, T>) {
        let header_cells: Vec<Cell> = self
            .columns
            .iter()
            .map(|column| {
                let mut spans = vec![Span::styled(
                    column.header,
                    Style::default()
                        .fg(theme.subtext0)
                        .add_modifier(Modifier::BOLD),
                )];
                match view.sort.direction_of(column.id) {
                    Some(SortDirection::Ascending) => {
                        spans.push(Span::styled(" ▲", Style::default().fg(theme.peach)));
                    }
                    Some(SortDirection::Descending) => {
                        spans.push(Span::styled(" ▼", Style::default().fg(theme.peach)));
                    }
                    None => {}
                }
                Cell::from(Line::from(spans))
            })
            .collect();
        let header = Row::new(header_cells)
            .height(1)
            .style(Style::default().bg(theme.surface0));

        let body: Vec<Row> = if view.loading {
            // One skeleton row per slot on the current page; stale rows
            // are never shown while a fetch is in flight.
            let skeleton = Style::default().fg(theme.surface2);
            (0..view.page.page_size())
                .map(|_| {
                    Row::new(
                        self.columns
                            .iter()
                            .map(|_| Cell::from(SKELETON_CELL).style(skeleton))
                            .collect::<Vec<_>>(),
                    )
                })
                .collect()
        } else {
            view.rows
                .iter()
                .map(|row| {
                    Row::new(
                        self.columns
                            .iter()
                            .map(|column| match column.render {
                                CellRender::With(render) => render(row, theme),
                                CellRender::Auto => Cell::from(
                                    field_of(*row, column.id)
                                        .unwrap_or_else(|| MISSING_FIELD.to_string()),
                                ),
                            })
                            .collect::<Vec<_>>(),
                    )
                    .style(Style::default().fg(theme.text))
                })
                .collect()
        };

        let widths: Vec<Constraint> = self.columns.iter().map(|c| c.constraint).collect();
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1))
            .title(format!(" {} ", self.title))
            .title_style(
                Style::default()
                    .fg(theme.mauve)
                    .add_modifier(Modifier::BOLD),
            );

        let table = Table::new(body, widths)
            .header(header)
            .row_highlight_style(
                Style::default()
                    .bg(theme.surface1)
                    .fg(theme.lavender)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol("▶ ")
            .block(block);

        frame.render_stateful_widget(table, area, &mut self.state);

        if !view.loading && view.rows.is_empty() {
            let y = area.y + area.height / 2;
            let message_area = Rect::new(area.x + 1, y, area.width.saturating_sub(2), 1);
            let message = Paragraph::new(view.empty_text)
                .style(Style::default().fg(theme.overlay0))
                .alignment(Alignment::Center);
            frame.render_widget(message, message_area);
        }
    }

    fn render_footer(&self, frame: &mut Frame, area: Rect, theme: &Theme, view: &TableFrame<'_, T>) {
        let page = view.page;
        let footer = Line::from(vec![
            Span::styled(
                format!(" Page {} of {}", page.page_index() + 1, page.page_count()),
                Style::default().fg(theme.subtext0),
            ),
            Span::styled(
                format!("  ·  {} rows  ·  {}/page", page.total_count(), page.page_size()),
                Style::default().fg(theme.overlay1),
            ),
        ]);
        frame.render_widget(Paragraph::new(footer), area);
    }

    fn render_search(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let (text, style) = if self.searching {
            (
                format!("/{}_", self.query),
                Style::default().fg(theme.yellow),
            )
        } else {
            (
                format!("/{}", self.query),
                Style::default().fg(theme.subtext0),
            )
        };
        frame.render_widget(Paragraph::new(text).style(style), area);
    }
}

/// Apply the active sort to a set of row references. Comparison uses the
/// same field accessor the default cell renderer uses, stable-sorted so
/// clearing the sort returns exactly the fetched order.
pub fn sorted_view<'a, T: GridRow>(rows: Vec<&'a T>, sort: &SortState) -> Vec<&'a T> {
    let Some((column, direction)) = sort.active() else {
        return rows;
    };
    let order = sort_indices(&rows, |row| field_of(*row, column), direction);
    order.into_iter().map(|i| rows[i]).collect()
}

fn field_of<T: GridRow>(row: &T, id: &str) -> Option<String> {
    row.field(id)
        .or_else(|| row.field(&id.to_ascii_lowercase()))
}

#[cfg(test)]
mod tests {
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::theme::MOCHA;

    use super::*;

    struct Item {
        name: &'static str,
        group: Option<&'static str>,
    }

    impl GridRow for Item {
        fn field(&self, key: &str) -> Option<String> {
            match key {
                "name" => Some(self.name.to_string()),
                "group" => self.group.map(str::to_string),
                _ => None,
            }
        }
    }

    fn columns() -> Vec<Column<Item>> {
        vec![
            Column::new("name", "Name", Constraint::Min(10)).sortable(),
            Column::new("group", "Group", Constraint::Min(10)).sortable(),
            Column::new("missing", "Missing", Constraint::Min(10)),
        ]
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    fn draw(table: &mut DataTable<Item>, view: &TableFrame<'_, Item>) -> ratatui::buffer::Buffer {
        let backend = TestBackend::new(60, 16);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| table.render(frame, frame.area(), &MOCHA, view))
            .unwrap();
        terminal.backend().buffer().clone()
    }

    fn buffer_text(buffer: &ratatui::buffer::Buffer) -> Vec<String> {
        (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect()
            })
            .collect()
    }

    #[test]
    fn loading_renders_one_skeleton_row_per_page_slot() {
        let mut table = DataTable::new("Items", columns());
        let mut page = Pagination::server(5);
        page.set_total(50);
        let sort = SortState::new();
        let view = TableFrame {
            rows: &[],
            loading: true,
            empty_text: "No data found.",
            search: "",
            sort: &sort,
            page: &page,
        };

        let lines = buffer_text(&draw(&mut table, &view));
        let skeleton_rows = lines.iter().filter(|l| l.contains('░')).count();
        assert_eq!(skeleton_rows, 5);
        assert!(!lines.iter().any(|l| l.contains("No data found.")));
    }

    #[test]
    fn empty_state_renders_caller_text() {
        let mut table = DataTable::new("Items", columns());
        let mut page = Pagination::server(9);
        page.set_total(0);
        let sort = SortState::new();
        let view = TableFrame {
            rows: &[],
            loading: false,
            empty_text: "No devices found.",
            search: "",
            sort: &sort,
            page: &page,
        };

        let lines = buffer_text(&draw(&mut table, &view));
        assert!(lines.iter().any(|l| l.contains("No devices found.")));
    }

    #[test]
    fn missing_fields_render_placeholder_dash() {
        let mut table = DataTable::new("Items", columns());
        let mut page = Pagination::server(9);
        page.set_total(1);
        let sort = SortState::new();
        let rows = [Item {
            name: "alpha",
            group: None,
        }];
        let refs: Vec<&Item> = rows.iter().collect();
        let view = TableFrame {
            rows: &refs,
            loading: false,
            empty_text: "",
            search: "",
            sort: &sort,
            page: &page,
        };

        let lines = buffer_text(&draw(&mut table, &view));
        let row_line = lines.iter().find(|l| l.contains("alpha")).unwrap();
        // Both the absent group and the unknown accessor fall back to "-".
        assert!(row_line.contains('-'));
    }

    #[test]
    fn digit_keys_toggle_nth_sortable_column() {
        let mut table = DataTable::new("Items", columns());
        assert_eq!(
            table.handle_key(key(KeyCode::Char('2'))),
            EventResult::Event(TableEvent::SortToggled("group"))
        );
        assert_eq!(
            table.handle_key(key(KeyCode::Char('9'))),
            EventResult::Ignored
        );
    }

    #[test]
    fn search_mode_echoes_keystrokes() {
        let mut table = DataTable::new("Items", columns());
        assert_eq!(
            table.handle_key(key(KeyCode::Char('/'))),
            EventResult::Consumed
        );
        assert!(table.searching());
        assert_eq!(
            table.handle_key(key(KeyCode::Char('a'))),
            EventResult::Event(TableEvent::SearchEdited("a".to_string()))
        );
        assert_eq!(
            table.handle_key(key(KeyCode::Char('b'))),
            EventResult::Event(TableEvent::SearchEdited("ab".to_string()))
        );
        assert_eq!(
            table.handle_key(key(KeyCode::Esc)),
            EventResult::Event(TableEvent::SearchEdited(String::new()))
        );
        assert!(!table.searching());
    }

    #[test]
    fn search_echo_follows_the_frame() {
        let mut table = DataTable::new("Items", columns());
        let mut page = Pagination::server(9);
        page.set_total(0);
        let sort = SortState::new();
        let view = TableFrame {
            rows: &[],
            loading: false,
            empty_text: "",
            search: "pump",
            sort: &sort,
            page: &page,
        };

        // No key events: the echo comes straight from the frame.
        let lines = buffer_text(&draw(&mut table, &view));
        assert!(lines.iter().any(|l| l.contains("/pump")));

        // The page cleared its search without a key event; the echo
        // follows on the next render instead of going stale.
        let cleared = TableFrame { search: "", ..view };
        let lines = buffer_text(&draw(&mut table, &cleared));
        assert!(!lines.iter().any(|l| l.contains("/pump")));
    }

    #[test]
    fn page_size_steps_through_options() {
        let mut table = DataTable::new("Items", columns());
        table.page_size = 9;
        assert_eq!(
            table.handle_key(key(KeyCode::Char('+'))),
            EventResult::Event(TableEvent::PageSizeChanged(15))
        );
        table.page_size = 5;
        assert_eq!(
            table.handle_key(key(KeyCode::Char('-'))),
            EventResult::Consumed,
            "already at the smallest option"
        );
    }

    #[test]
    fn sorted_view_applies_and_clears() {
        let rows = [
            Item { name: "b", group: Some("g1") },
            Item { name: "a", group: Some("g2") },
            Item { name: "c", group: None },
        ];
        let refs: Vec<&Item> = rows.iter().collect();

        let mut sort = SortState::new();
        sort.toggle("name");
        let sorted = sorted_view(refs.clone(), &sort);
        let names: Vec<&str> = sorted.iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        sort.toggle("name");
        sort.toggle("name");
        let unsorted = sorted_view(refs.clone(), &sort);
        // Identity, not value order: the exact same references in fetch order.
        assert!(
            unsorted
                .iter()
                .zip(refs.iter())
                .all(|(a, b)| std::ptr::eq(*a, *b))
        );
    }
}
