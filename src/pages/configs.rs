//! Modbus configuration page.
//!
//! Server-paginated list of Modbus configs. Enter opens a read-only
//! detail popup, `d` promotes the selected config to the group default
//! after confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::ApiClient;
use crate::api::models::ConfigRaw;
use crate::command::MutationCmd;
use crate::grid::{
    Browser, Commit, DEFAULT_PAGE_SIZE, DebounceTicket, FetchPageCmd, PageData, PageQuery,
    PageSource, SettleSearchCmd,
};
use crate::theme::Theme;
use crate::ui::{
    Column, ConfirmDialog, ConfirmEvent, Component, DataTable, EventResult, GridRow, Keybinding,
    TableEvent, TableFrame, Toast, popup_area, sorted_view,
};

use super::{Page, UpdateResult, is_auth_error};

#[derive(Debug, Clone)]
pub struct ConfigRow {
    id: String,
    name: String,
    interface: Option<String>,
    group: Option<String>,
    slave_id: Option<String>,
    slave_ip: Option<String>,
    is_default: bool,
    slaves: Option<String>,
}

impl ConfigRow {
    /// Surface the first slave's interface and address the way the list
    /// view shows them; the full set stays in `slaves`.
    fn from_raw(raw: ConfigRaw) -> Self {
        let first = raw.slaves_details.first();
        let slave_data = first.and_then(|s| s.slave_data.as_ref());
        let slaves: Vec<String> = raw
            .slaves_details
            .iter()
            .map(|s| {
                s.slave_data
                    .as_ref()
                    .and_then(|d| d.name.clone())
                    .unwrap_or_else(|| "-".to_string())
            })
            .collect();
        Self {
            interface: first.and_then(|s| s.interface.clone()),
            slave_id: slave_data.and_then(|d| d.slave_id.clone()),
            slave_ip: slave_data.and_then(|d| d.slave_ip.clone()),
            slaves: (!slaves.is_empty()).then(|| slaves.join(", ")),
            id: raw.id,
            name: raw.name,
            group: raw.group,
            is_default: raw.is_default,
        }
    }
}

impl GridRow for ConfigRow {
    fn field(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(self.name.clone()),
            "interface" => self.interface.clone(),
            "group" => self.group.clone(),
            "slave_id" => self.slave_id.clone(),
            "slave_ip" => self.slave_ip.clone(),
            "default" => Some(if self.is_default { "Yes" } else { "No" }.to_string()),
            "slaves" => self.slaves.clone(),
            _ => None,
        }
    }
}

fn default_cell(row: &ConfigRow, theme: &Theme) -> Cell<'static> {
    if row.is_default {
        Cell::from("Yes").style(Style::default().fg(theme.green).add_modifier(Modifier::BOLD))
    } else {
        Cell::from("No").style(Style::default().fg(theme.overlay1))
    }
}

fn columns() -> Vec<Column<ConfigRow>> {
    vec![
        Column::new("name", "Config Name", Constraint::Min(18)).sortable(),
        Column::new("interface", "Interface", Constraint::Length(10)).sortable(),
        Column::new("group", "Group", Constraint::Min(10)).sortable(),
        Column::new("slave_id", "Slave ID", Constraint::Length(9)),
        Column::new("slave_ip", "Slave IP", Constraint::Length(16)),
        Column::new("default", "Default", Constraint::Length(8)).with(default_cell),
        Column::new("slaves", "Slaves", Constraint::Min(14)),
    ]
}

struct ConfigSource {
    client: ApiClient,
}

#[async_trait]
impl PageSource for ConfigSource {
    type Row = ConfigRow;

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageData<ConfigRow>> {
        let envelope = self.client.configs(query).await?;
        Ok(envelope.into_page_data(ConfigRow::from_raw))
    }
}

enum ConfigsMsg {
    Refetch,
    PageLoaded(u64, Result<PageData<ConfigRow>>),
    SearchEdited(String),
    SearchSettled(DebounceTicket),
    NextPage,
    PrevPage,
    PageSize(usize),
    SortToggled(&'static str),
    ShowDetails(usize),
    AskSetDefault(usize),
    SetDefault { id: String, name: String },
    DefaultSet(Result<()>),
}

pub struct ConfigsPage {
    client: ApiClient,
    source: Arc<ConfigSource>,
    browser: Browser<ConfigRow>,
    table: DataTable<ConfigRow>,
    confirm: Option<(ConfirmDialog, String, String)>,
    details: Option<ConfigRow>,
    toasts: Vec<Toast>,
    msg_tx: UnboundedSender<ConfigsMsg>,
    msg_rx: UnboundedReceiver<ConfigsMsg>,
}

impl ConfigsPage {
    pub fn new(client: ApiClient) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            source: Arc::new(ConfigSource {
                client: client.clone(),
            }),
            client,
            browser: Browser::server(DEFAULT_PAGE_SIZE),
            table: DataTable::new("Modbus Configs", columns()),
            confirm: None,
            details: None,
            toasts: Vec::new(),
            msg_tx,
            msg_rx,
        }
    }

    fn queue(&self, msg: ConfigsMsg) {
        let _ = self.msg_tx.send(msg);
    }

    fn view_rows(&self) -> Vec<&ConfigRow> {
        Self::rows_of(&self.browser)
    }

    fn rows_of(browser: &Browser<ConfigRow>) -> Vec<&ConfigRow> {
        let window = browser.pagination().slice(browser.rows());
        sorted_view(window.iter().collect(), browser.sort())
    }

    fn refetch(&mut self) -> UpdateResult {
        let (seq, query) = self.browser.begin_fetch();
        FetchPageCmd::new(
            self.source.clone(),
            seq,
            query,
            self.msg_tx.clone(),
            ConfigsMsg::PageLoaded,
        )
        .into()
    }

    fn process_message(&mut self, msg: ConfigsMsg) -> UpdateResult {
        match msg {
            ConfigsMsg::Refetch => self.refetch(),

            ConfigsMsg::PageLoaded(seq, result) => {
                if let Err(err) = &result {
                    if is_auth_error(err) {
                        return UpdateResult::SessionExpired;
                    }
                }
                if self.browser.commit(seq, result) == Commit::Failed {
                    if let Some(error) = self.browser.error() {
                        self.toasts.push(Toast::error(error.to_string()));
                    }
                }
                UpdateResult::Idle
            }

            ConfigsMsg::SearchEdited(raw) => {
                let ticket = self.browser.edit_search(raw);
                SettleSearchCmd::new(ticket, self.msg_tx.clone(), ConfigsMsg::SearchSettled).into()
            }

            ConfigsMsg::SearchSettled(ticket) => {
                if self.browser.settle_search(ticket) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            ConfigsMsg::NextPage => {
                if self.browser.next_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            ConfigsMsg::PrevPage => {
                if self.browser.prev_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            ConfigsMsg::PageSize(size) => {
                if self.browser.set_page_size(size) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            ConfigsMsg::SortToggled(column) => {
                self.browser.sort_mut().toggle(column);
                UpdateResult::Idle
            }

            ConfigsMsg::ShowDetails(index) => {
                self.details = self.view_rows().get(index).map(|row| (*row).clone());
                UpdateResult::Idle
            }

            ConfigsMsg::AskSetDefault(index) => {
                if let Some(row) = self.view_rows().get(index) {
                    if row.is_default {
                        self.toasts
                            .push(Toast::info(format!("{} is already the default", row.name)));
                    } else {
                        let dialog = ConfirmDialog::new(
                            "Set default",
                            format!("Set \"{}\" as the default config?", row.name),
                        );
                        self.confirm = Some((dialog, row.id.clone(), row.name.clone()));
                    }
                }
                UpdateResult::Idle
            }

            ConfigsMsg::SetDefault { id, name } => {
                let client = self.client.clone();
                MutationCmd::new(
                    format!("set default config {name}"),
                    async move {
                        client.set_default_config(&id).await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    ConfigsMsg::DefaultSet,
                )
                .into()
            }

            ConfigsMsg::DefaultSet(result) => match result {
                Ok(()) => {
                    self.toasts.push(Toast::success("Config set as default"));
                    self.refetch()
                }
                Err(err) => {
                    if is_auth_error(&err) {
                        return UpdateResult::SessionExpired;
                    }
                    self.toasts.push(Toast::error(format!("{err:#}")));
                    UpdateResult::Idle
                }
            },
        }
    }

    fn render_details(&self, frame: &mut Frame, area: Rect, theme: &Theme, row: &ConfigRow) {
        let popup = popup_area(area, Constraint::Percentage(55), Constraint::Length(12));
        frame.render_widget(Clear, popup);

        let label = Style::default().fg(theme.overlay1);
        let value = Style::default().fg(theme.text);
        let field = |name: &'static str, content: Option<&str>| {
            Line::from(vec![
                Span::styled(format!("{name:>11}  "), label),
                Span::styled(content.unwrap_or("-").to_string(), value),
            ])
        };

        let lines = vec![
            Line::from(""),
            field("Name", Some(&row.name)),
            field("Group", row.group.as_deref()),
            field("Interface", row.interface.as_deref()),
            field("Slave ID", row.slave_id.as_deref()),
            field("Slave IP", row.slave_ip.as_deref()),
            field("Slaves", row.slaves.as_deref()),
            field("Default", Some(if row.is_default { "Yes" } else { "No" })),
            Line::from(""),
            Line::from(Span::styled("Press Esc to close", label)),
        ];

        let block = Block::default()
            .title(" Config Details ")
            .title_style(Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1))
            .style(Style::default().bg(theme.base));

        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

impl Page for ConfigsPage {
    fn init(&mut self) {
        self.queue(ConfigsMsg::Refetch);
    }

    fn handle_key(&mut self, key: KeyEvent) -> EventResult<()> {
        if self.details.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
                self.details = None;
            }
            return EventResult::Consumed;
        }

        if let Some((dialog, id, name)) = &mut self.confirm {
            match dialog.handle_key(key) {
                Ok(EventResult::Event(ConfirmEvent::Confirmed)) => {
                    let msg = ConfigsMsg::SetDefault {
                        id: id.clone(),
                        name: name.clone(),
                    };
                    self.confirm = None;
                    self.queue(msg);
                }
                Ok(EventResult::Event(ConfirmEvent::Cancelled)) => self.confirm = None,
                _ => {}
            }
            return EventResult::Consumed;
        }

        match self.table.handle_key(key) {
            EventResult::Event(event) => {
                self.queue(match event {
                    TableEvent::Activated(index) => ConfigsMsg::ShowDetails(index),
                    TableEvent::SearchEdited(raw) => ConfigsMsg::SearchEdited(raw),
                    TableEvent::NextPage => ConfigsMsg::NextPage,
                    TableEvent::PrevPage => ConfigsMsg::PrevPage,
                    TableEvent::PageSizeChanged(size) => ConfigsMsg::PageSize(size),
                    TableEvent::SortToggled(column) => ConfigsMsg::SortToggled(column),
                });
                EventResult::Consumed
            }
            EventResult::Consumed => EventResult::Consumed,
            EventResult::Ignored => match key.code {
                KeyCode::Char('d') => {
                    if let Some(index) = self.table.selected() {
                        self.queue(ConfigsMsg::AskSetDefault(index));
                    }
                    EventResult::Consumed
                }
                KeyCode::Char('r') => {
                    self.queue(ConfigsMsg::Refetch);
                    EventResult::Consumed
                }
                _ => EventResult::Ignored,
            },
        }
    }

    fn update(&mut self) -> UpdateResult {
        let mut commands = Vec::new();
        while let Ok(msg) = self.msg_rx.try_recv() {
            match self.process_message(msg) {
                UpdateResult::Idle => {}
                UpdateResult::Commands(cmds) => commands.extend(cmds),
                other => return other,
            }
        }
        if commands.is_empty() {
            UpdateResult::Idle
        } else {
            UpdateResult::Commands(commands)
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let rows = Self::rows_of(&self.browser);
        let view = TableFrame {
            rows: &rows,
            loading: self.browser.loading(),
            empty_text: "No configs found.",
            search: self.browser.search().raw(),
            sort: self.browser.sort(),
            page: self.browser.pagination(),
        };
        self.table.render(frame, area, theme, &view);

        if let Some(row) = self.details.clone() {
            self.render_details(frame, area, theme, &row);
        }
        if let Some((dialog, _, _)) = &mut self.confirm {
            dialog.render(frame, area, theme);
        }
    }

    fn keybindings(&self) -> Vec<Keybinding> {
        vec![
            Keybinding::new("/", "Search"),
            Keybinding::new("h/l", "Page"),
            Keybinding::new("1-9", "Sort"),
            Keybinding::new("Enter", "Details"),
            Keybinding::new("d", "Set default"),
            Keybinding::new("r", "Reload"),
        ]
    }

    fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }
}

#[cfg(test)]
mod tests {
    use crate::api::models::{SlaveData, SlaveDetail};

    use super::*;

    fn raw() -> ConfigRaw {
        ConfigRaw {
            id: "c1".to_string(),
            name: "boiler".to_string(),
            group: Some("plant-a".to_string()),
            is_default: true,
            slaves_details: vec![
                SlaveDetail {
                    interface: Some("RS485".to_string()),
                    slave_data: Some(SlaveData {
                        slave_id: Some("1".to_string()),
                        slave_ip: Some("10.0.0.5".to_string()),
                        name: Some("s1".to_string()),
                    }),
                },
                SlaveDetail {
                    interface: None,
                    slave_data: Some(SlaveData {
                        slave_id: None,
                        slave_ip: None,
                        name: None,
                    }),
                },
            ],
        }
    }

    #[test]
    fn row_surfaces_first_slave_and_joins_names() {
        let row = ConfigRow::from_raw(raw());
        assert_eq!(row.field("interface").as_deref(), Some("RS485"));
        assert_eq!(row.field("slave_id").as_deref(), Some("1"));
        assert_eq!(row.field("slaves").as_deref(), Some("s1, -"));
        assert_eq!(row.field("default").as_deref(), Some("Yes"));
    }

    #[test]
    fn row_without_slaves_yields_missing_fields() {
        let row = ConfigRow::from_raw(ConfigRaw {
            id: "c2".to_string(),
            name: "pump".to_string(),
            group: None,
            is_default: false,
            slaves_details: Vec::new(),
        });
        assert!(row.field("interface").is_none());
        assert!(row.field("slaves").is_none());
        assert_eq!(row.field("default").as_deref(), Some("No"));
    }
}
