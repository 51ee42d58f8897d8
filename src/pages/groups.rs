//! Group page.
//!
//! Server-paginated group list with the fleet-wide summary strip the
//! backend sends alongside it. Groups can be created (`a`), renamed
//! (`e`) and deleted (`x`, with a danger confirm).

use std::collections::HashMap;

use async_trait::async_trait;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::ApiClient;
use crate::api::models::{GroupRaw, GroupUpdate, NewGroup};
use crate::command::{Command, MutationCmd};
use crate::grid::{
    Browser, Commit, DEFAULT_PAGE_SIZE, DebounceTicket, PageData, PageQuery, SettleSearchCmd,
};
use crate::theme::Theme;
use crate::ui::{
    Column, ConfirmDialog, ConfirmEvent, Component, DataTable, EventResult, GridRow, Keybinding,
    TableEvent, TableFrame, TextInput, TextInputEvent, Toast, popup_area, sorted_view,
};

use super::{Page, UpdateResult, is_auth_error};

#[derive(Debug, Clone)]
pub struct GroupRow {
    id: String,
    name: String,
    wifi_configs: usize,
    ethernet_configs: usize,
    modbus_tcp_configs: usize,
    devices: usize,
    patches: usize,
    modbus_configs: usize,
}

impl GroupRow {
    fn from_raw(raw: GroupRaw) -> Self {
        let peripherals = raw.peripheral_configs.as_ref();
        Self {
            devices: raw.device_count(),
            wifi_configs: usize::from(peripherals.is_some_and(|p| p.wifi_config.is_some())),
            ethernet_configs: usize::from(peripherals.is_some_and(|p| p.ethernet_config.is_some())),
            modbus_tcp_configs: usize::from(
                peripherals.is_some_and(|p| p.modbustcp_config.is_some()),
            ),
            patches: raw.patches.len(),
            modbus_configs: raw.modbus_configs.len(),
            id: raw.id,
            name: raw.name,
        }
    }
}

impl GridRow for GroupRow {
    fn field(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(self.name.clone()),
            "wifi" => Some(self.wifi_configs.to_string()),
            "ethernet" => Some(self.ethernet_configs.to_string()),
            "modbus_tcp" => Some(self.modbus_tcp_configs.to_string()),
            "devices" => Some(self.devices.to_string()),
            "patches" => Some(self.patches.to_string()),
            "modbus_configs" => Some(self.modbus_configs.to_string()),
            _ => None,
        }
    }
}

fn columns() -> Vec<Column<GroupRow>> {
    vec![
        Column::new("name", "Name", Constraint::Min(16)).sortable(),
        Column::new("wifi", "WiFi", Constraint::Length(6)),
        Column::new("ethernet", "Ethernet", Constraint::Length(9)),
        Column::new("modbus_tcp", "Modbus TCP", Constraint::Length(11)),
        Column::new("devices", "Devices", Constraint::Length(8)),
        Column::new("patches", "Patches", Constraint::Length(8)),
        Column::new("modbus_configs", "Configs", Constraint::Length(8)),
    ]
}

/// Fleet-wide counters delivered next to the group page.
#[derive(Debug, Clone, Default)]
struct GroupStats {
    total_groups: usize,
    total_devices: usize,
    device_types: HashMap<String, usize>,
}

/// Group names are used in device provisioning paths, so the backend only
/// accepts a restricted character set.
fn validate_group_name(name: &str) -> Option<&'static str> {
    if name.is_empty() {
        return Some("Name must not be empty.");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Some("Name can only contain letters, numbers, hyphens and underscores.");
    }
    None
}

type GroupFetch = (PageData<GroupRow>, GroupStats);

struct FetchGroupsCmd {
    client: ApiClient,
    query: PageQuery,
    seq: u64,
    tx: UnboundedSender<GroupsMsg>,
}

#[async_trait]
impl Command for FetchGroupsCmd {
    fn name(&self) -> String {
        format!("fetch groups page {}", self.query.page_index + 1)
    }

    async fn execute(self: Box<Self>) -> Result<()> {
        let result = match self.client.groups(&self.query).await {
            Ok(envelope) => {
                let has_next = envelope.has_next();
                let has_previous = envelope.has_previous();
                let stats = GroupStats {
                    total_groups: envelope.results.total_groups,
                    total_devices: envelope.results.total_devices,
                    device_types: envelope.results.devices_count_info.clone(),
                };
                let page = PageData {
                    rows: envelope
                        .results
                        .groups_data
                        .into_iter()
                        .map(GroupRow::from_raw)
                        .collect(),
                    total_count: Some(envelope.count.unwrap_or(0)),
                    has_next,
                    has_previous,
                };
                Ok((page, stats))
            }
            Err(err) => Err(err.into()),
        };
        let _ = self.tx.send(GroupsMsg::PageLoaded(self.seq, result));
        Ok(())
    }
}

enum Modal {
    Add(TextInput),
    Rename { id: String, input: TextInput },
    ConfirmDelete { dialog: ConfirmDialog, id: String },
}

enum GroupsMsg {
    Refetch,
    PageLoaded(u64, Result<GroupFetch>),
    SearchEdited(String),
    SearchSettled(DebounceTicket),
    NextPage,
    PrevPage,
    PageSize(usize),
    SortToggled(&'static str),
    Create(String),
    Rename { id: String, name: String },
    Delete(String),
    Created(Result<()>),
    Renamed(Result<()>),
    Deleted(Result<()>),
}

pub struct GroupsPage {
    client: ApiClient,
    browser: Browser<GroupRow>,
    table: DataTable<GroupRow>,
    stats: GroupStats,
    modal: Option<Modal>,
    modal_error: Option<&'static str>,
    toasts: Vec<Toast>,
    msg_tx: UnboundedSender<GroupsMsg>,
    msg_rx: UnboundedReceiver<GroupsMsg>,
}

impl GroupsPage {
    pub fn new(client: ApiClient) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            client,
            browser: Browser::server(DEFAULT_PAGE_SIZE),
            table: DataTable::new("Groups", columns()),
            stats: GroupStats::default(),
            modal: None,
            modal_error: None,
            toasts: Vec::new(),
            msg_tx,
            msg_rx,
        }
    }

    fn queue(&self, msg: GroupsMsg) {
        let _ = self.msg_tx.send(msg);
    }

    fn view_rows(&self) -> Vec<&GroupRow> {
        Self::rows_of(&self.browser)
    }

    fn rows_of(browser: &Browser<GroupRow>) -> Vec<&GroupRow> {
        let window = browser.pagination().slice(browser.rows());
        sorted_view(window.iter().collect(), browser.sort())
    }

    fn refetch(&mut self) -> UpdateResult {
        let (seq, query) = self.browser.begin_fetch();
        FetchGroupsCmd {
            client: self.client.clone(),
            query,
            seq,
            tx: self.msg_tx.clone(),
        }
        .into()
    }

    fn open_add_modal(&mut self) {
        let mut input = TextInput::new("Group name");
        input.set_focused(true);
        self.modal = Some(Modal::Add(input));
        self.modal_error = None;
    }

    fn open_rename_modal(&mut self, index: usize) {
        let Some(row) = self.view_rows().get(index).map(|r| (*r).clone()) else {
            return;
        };
        let mut input = TextInput::new("New name");
        input.set_value(row.name);
        input.set_focused(true);
        self.modal = Some(Modal::Rename { id: row.id, input });
        self.modal_error = None;
    }

    fn open_delete_confirm(&mut self, index: usize) {
        if let Some(row) = self.view_rows().get(index) {
            let dialog = ConfirmDialog::new(
                "Delete group",
                format!("Delete group \"{}\"? This cannot be undone.", row.name),
            )
            .danger();
            self.modal = Some(Modal::ConfirmDelete {
                dialog,
                id: row.id.clone(),
            });
        }
    }

    fn mutation_finished(&mut self, result: Result<()>, success: &'static str) -> UpdateResult {
        match result {
            Ok(()) => {
                self.toasts.push(Toast::success(success));
                self.refetch()
            }
            Err(err) => {
                if is_auth_error(&err) {
                    return UpdateResult::SessionExpired;
                }
                self.toasts.push(Toast::error(format!("{err:#}")));
                UpdateResult::Idle
            }
        }
    }

    fn process_message(&mut self, msg: GroupsMsg) -> UpdateResult {
        match msg {
            GroupsMsg::Refetch => self.refetch(),

            GroupsMsg::PageLoaded(seq, result) => {
                if let Err(err) = &result {
                    if is_auth_error(err) {
                        return UpdateResult::SessionExpired;
                    }
                }
                let commit = match result {
                    Ok((page, stats)) => {
                        let commit = self.browser.commit(seq, Ok(page));
                        if commit == Commit::Committed {
                            self.stats = stats;
                        }
                        commit
                    }
                    Err(err) => {
                        let commit = self.browser.commit(seq, Err(err));
                        if commit == Commit::Failed {
                            self.stats = GroupStats::default();
                        }
                        commit
                    }
                };
                if commit == Commit::Failed {
                    if let Some(error) = self.browser.error() {
                        self.toasts.push(Toast::error(error.to_string()));
                    }
                }
                UpdateResult::Idle
            }

            GroupsMsg::SearchEdited(raw) => {
                let ticket = self.browser.edit_search(raw);
                SettleSearchCmd::new(ticket, self.msg_tx.clone(), GroupsMsg::SearchSettled).into()
            }

            GroupsMsg::SearchSettled(ticket) => {
                if self.browser.settle_search(ticket) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            GroupsMsg::NextPage => {
                if self.browser.next_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            GroupsMsg::PrevPage => {
                if self.browser.prev_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            GroupsMsg::PageSize(size) => {
                if self.browser.set_page_size(size) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            GroupsMsg::SortToggled(column) => {
                self.browser.sort_mut().toggle(column);
                UpdateResult::Idle
            }

            GroupsMsg::Create(name) => {
                let client = self.client.clone();
                MutationCmd::new(
                    format!("create group {name}"),
                    async move {
                        client
                            .create_group(&NewGroup {
                                name,
                                peripheral_configs: None,
                            })
                            .await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    GroupsMsg::Created,
                )
                .into()
            }

            GroupsMsg::Rename { id, name } => {
                let client = self.client.clone();
                MutationCmd::new(
                    format!("rename group {id}"),
                    async move {
                        client
                            .update_group(
                                &id,
                                &GroupUpdate {
                                    name: Some(name),
                                    peripheral_configs: None,
                                },
                            )
                            .await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    GroupsMsg::Renamed,
                )
                .into()
            }

            GroupsMsg::Delete(id) => {
                let client = self.client.clone();
                MutationCmd::new(
                    format!("delete group {id}"),
                    async move {
                        client.delete_group(&id).await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    GroupsMsg::Deleted,
                )
                .into()
            }

            GroupsMsg::Created(result) => self.mutation_finished(result, "Group added"),
            GroupsMsg::Renamed(result) => self.mutation_finished(result, "Group updated"),
            GroupsMsg::Deleted(result) => self.mutation_finished(result, "Group deleted"),
        }
    }

    fn handle_modal_key(&mut self, key: KeyEvent) -> EventResult<()> {
        let Some(modal) = &mut self.modal else {
            return EventResult::Ignored;
        };
        match modal {
            Modal::Add(input) => match input.handle_key(key) {
                Ok(EventResult::Event(TextInputEvent::Submitted(name))) => {
                    match validate_group_name(&name) {
                        Some(error) => self.modal_error = Some(error),
                        None => {
                            self.modal = None;
                            self.modal_error = None;
                            self.queue(GroupsMsg::Create(name));
                        }
                    }
                }
                Ok(EventResult::Event(TextInputEvent::Cancelled)) => {
                    self.modal = None;
                    self.modal_error = None;
                }
                _ => self.modal_error = None,
            },
            Modal::Rename { id, input } => match input.handle_key(key) {
                Ok(EventResult::Event(TextInputEvent::Submitted(name))) => {
                    match validate_group_name(&name) {
                        Some(error) => self.modal_error = Some(error),
                        None => {
                            let msg = GroupsMsg::Rename {
                                id: id.clone(),
                                name,
                            };
                            self.modal = None;
                            self.modal_error = None;
                            self.queue(msg);
                        }
                    }
                }
                Ok(EventResult::Event(TextInputEvent::Cancelled)) => {
                    self.modal = None;
                    self.modal_error = None;
                }
                _ => self.modal_error = None,
            },
            Modal::ConfirmDelete { dialog, id } => match dialog.handle_key(key) {
                Ok(EventResult::Event(ConfirmEvent::Confirmed)) => {
                    let msg = GroupsMsg::Delete(id.clone());
                    self.modal = None;
                    self.queue(msg);
                }
                Ok(EventResult::Event(ConfirmEvent::Cancelled)) => self.modal = None,
                _ => {}
            },
        }
        EventResult::Consumed
    }

    fn render_stats(&self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let label = Style::default().fg(theme.overlay1);
        let value = Style::default().fg(theme.lavender).add_modifier(Modifier::BOLD);

        let mut spans = vec![
            Span::styled(" Groups ", label),
            Span::styled(self.stats.total_groups.to_string(), value),
            Span::styled("   Devices ", label),
            Span::styled(self.stats.total_devices.to_string(), value),
        ];
        let mut types: Vec<_> = self.stats.device_types.iter().collect();
        types.sort_by(|a, b| a.0.cmp(b.0));
        for (name, count) in types {
            spans.push(Span::styled(format!("   {name} "), label));
            spans.push(Span::styled(count.to_string(), value));
        }

        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1));
        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }

    fn render_input_modal(
        frame: &mut Frame,
        area: Rect,
        theme: &Theme,
        title: &str,
        input: &mut TextInput,
        error: Option<&'static str>,
    ) {
        let popup = popup_area(area, Constraint::Percentage(40), Constraint::Length(7));
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(format!(" {title} "))
            .title_style(Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1))
            .style(Style::default().bg(theme.base));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let [input_area, message_area] =
            Layout::vertical([Constraint::Length(3), Constraint::Length(1)]).areas(inner);
        input.render(frame, input_area, theme);

        let message = match error {
            Some(error) => Span::styled(error, Style::default().fg(theme.red)),
            None => Span::styled(
                "Enter to save, Esc to cancel",
                Style::default().fg(theme.overlay1),
            ),
        };
        frame.render_widget(Paragraph::new(Line::from(message)), message_area);
    }
}

impl Page for GroupsPage {
    fn init(&mut self) {
        self.queue(GroupsMsg::Refetch);
    }

    fn handle_key(&mut self, key: KeyEvent) -> EventResult<()> {
        if self.modal.is_some() {
            return self.handle_modal_key(key);
        }

        match self.table.handle_key(key) {
            EventResult::Event(event) => {
                match event {
                    TableEvent::Activated(index) => self.open_rename_modal(index),
                    TableEvent::SearchEdited(raw) => self.queue(GroupsMsg::SearchEdited(raw)),
                    TableEvent::NextPage => self.queue(GroupsMsg::NextPage),
                    TableEvent::PrevPage => self.queue(GroupsMsg::PrevPage),
                    TableEvent::PageSizeChanged(size) => self.queue(GroupsMsg::PageSize(size)),
                    TableEvent::SortToggled(column) => self.queue(GroupsMsg::SortToggled(column)),
                }
                EventResult::Consumed
            }
            EventResult::Consumed => EventResult::Consumed,
            EventResult::Ignored => match key.code {
                KeyCode::Char('a') => {
                    self.open_add_modal();
                    EventResult::Consumed
                }
                KeyCode::Char('e') => {
                    if let Some(index) = self.table.selected() {
                        self.open_rename_modal(index);
                    }
                    EventResult::Consumed
                }
                KeyCode::Char('x') => {
                    if let Some(index) = self.table.selected() {
                        self.open_delete_confirm(index);
                    }
                    EventResult::Consumed
                }
                KeyCode::Char('r') => {
                    self.queue(GroupsMsg::Refetch);
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
        let [stats_area, table_area] =
            Layout::vertical([Constraint::Length(3), Constraint::Min(5)]).areas(area);
        self.render_stats(frame, stats_area, theme);

        // Same derivation the index-based modal openers use.
        let rows = Self::rows_of(&self.browser);
        let view = TableFrame {
            rows: &rows,
            loading: self.browser.loading(),
            empty_text: "No groups found.",
            search: self.browser.search().raw(),
            sort: self.browser.sort(),
            page: self.browser.pagination(),
        };
        self.table.render(frame, table_area, theme, &view);

        let error = self.modal_error;
        match &mut self.modal {
            Some(Modal::Add(input)) => {
                Self::render_input_modal(frame, area, theme, "Add Group", input, error);
            }
            Some(Modal::Rename { input, .. }) => {
                Self::render_input_modal(frame, area, theme, "Rename Group", input, error);
            }
            Some(Modal::ConfirmDelete { dialog, .. }) => dialog.render(frame, area, theme),
            None => {}
        }
    }

    fn keybindings(&self) -> Vec<Keybinding> {
        vec![
            Keybinding::new("/", "Search"),
            Keybinding::new("h/l", "Page"),
            Keybinding::new("a", "Add"),
            Keybinding::new("e", "Rename"),
            Keybinding::new("x", "Delete"),
            Keybinding::new("r", "Reload"),
        ]
    }

    fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use crate::api::models::{DeviceRef, PeripheralConfigs};
    use crate::theme::MOCHA;

    use super::*;

    #[test]
    fn group_name_validation() {
        assert!(validate_group_name("plant-a_2").is_none());
        assert!(validate_group_name("").is_some());
        assert!(validate_group_name("plant a").is_some());
        assert!(validate_group_name("plant/a").is_some());
    }

    #[test]
    fn row_counts_devices_across_types() {
        let raw = GroupRaw {
            id: "g1".to_string(),
            name: "plant-a".to_string(),
            peripheral_configs: Some(PeripheralConfigs {
                wifi_config: Some(serde_json::json!({"ssid": "x"})),
                ethernet_config: None,
                modbustcp_config: None,
            }),
            devices: [
                (
                    "meter".to_string(),
                    vec![
                        DeviceRef {
                            device_id: "d1".to_string(),
                        },
                        DeviceRef {
                            device_id: "d2".to_string(),
                        },
                    ],
                ),
                (
                    "inverter".to_string(),
                    vec![DeviceRef {
                        device_id: "d3".to_string(),
                    }],
                ),
            ]
            .into(),
            patches: vec![serde_json::json!({})],
            modbus_configs: Vec::new(),
        };
        let row = GroupRow::from_raw(raw);
        assert_eq!(row.field("devices").as_deref(), Some("3"));
        assert_eq!(row.field("wifi").as_deref(), Some("1"));
        assert_eq!(row.field("ethernet").as_deref(), Some("0"));
        assert_eq!(row.field("patches").as_deref(), Some("1"));
    }

    fn group_row(name: &str) -> GroupRow {
        GroupRow {
            id: format!("id-{name}"),
            name: name.to_string(),
            wifi_configs: 0,
            ethernet_configs: 0,
            modbus_tcp_configs: 0,
            devices: 0,
            patches: 0,
            modbus_configs: 0,
        }
    }

    #[test]
    fn rendered_order_matches_modal_row_indices() {
        let client = ApiClient::new("http://localhost:8000", Duration::from_secs(30))
            .expect("client");
        let mut page = GroupsPage::new(client);
        let (seq, _) = page.browser.begin_fetch();
        page.browser.commit(
            seq,
            Ok(PageData {
                rows: vec![group_row("beta"), group_row("alpha")],
                total_count: Some(2),
                has_next: Some(false),
                has_previous: Some(false),
            }),
        );
        page.browser.sort_mut().toggle("name");

        // The rows the index-based openers (rename, delete) see.
        let names: Vec<String> = page.view_rows().iter().map(|r| r.name.clone()).collect();
        assert_eq!(names, ["alpha", "beta"]);

        // The drawn table must show the same order, or a selection index
        // would open the modal for a different row than the one under
        // the cursor.
        let backend = TestBackend::new(80, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal
            .draw(|frame| page.render(frame, frame.area(), &MOCHA))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        let lines: Vec<String> = (0..buffer.area.height)
            .map(|y| {
                (0..buffer.area.width)
                    .map(|x| buffer[(x, y)].symbol())
                    .collect()
            })
            .collect();
        let alpha_at = lines.iter().position(|l| l.contains("alpha")).unwrap();
        let beta_at = lines.iter().position(|l| l.contains("beta")).unwrap();
        assert!(alpha_at < beta_at);
    }
}
