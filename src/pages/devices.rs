//! Device page.
//!
//! Server-paginated device list. The devices endpoint also returns the
//! full group list, which feeds the manage-group modal (`m` or Enter on a
//! row): pick a group, save, and the device moves.

use async_trait::async_trait;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::ApiClient;
use crate::api::models::{DeviceRaw, GroupChoice};
use crate::command::{Command, MutationCmd};
use crate::grid::{
    Browser, Commit, DEFAULT_PAGE_SIZE, DebounceTicket, PageData, PageQuery, SettleSearchCmd,
};
use crate::theme::Theme;
use crate::ui::{
    Column, DataTable, EventResult, GridRow, Keybinding, TableEvent, TableFrame, Toast, popup_area,
    sorted_view,
};

use super::{Page, UpdateResult, is_auth_error};

#[derive(Debug, Clone)]
pub struct DeviceRow {
    device_id: String,
    device_type: Option<String>,
    modbus_version: Option<String>,
    patch_version: Option<String>,
    modbus_config: Option<String>,
    patch: Option<String>,
    group: Option<String>,
    group_id: Option<String>,
}

impl DeviceRow {
    fn from_raw(raw: DeviceRaw) -> Self {
        Self {
            device_id: raw.device_id,
            device_type: raw.device_type,
            modbus_version: raw.modbus_version,
            patch_version: raw.patch_version,
            modbus_config: raw.modbus_config_name,
            patch: raw.patch_name,
            group: raw.group_name,
            group_id: raw.group_id,
        }
    }
}

impl GridRow for DeviceRow {
    fn field(&self, key: &str) -> Option<String> {
        match key {
            "device_id" => Some(self.device_id.clone()),
            "group" => self.group.clone(),
            "modbus_config" => self.modbus_config.clone(),
            "device_type" => self.device_type.clone(),
            "modbus_version" => self.modbus_version.clone(),
            "patch" => self.patch.clone(),
            "patch_version" => self.patch_version.clone(),
            _ => None,
        }
    }
}

fn columns() -> Vec<Column<DeviceRow>> {
    vec![
        Column::new("device_id", "Device ID", Constraint::Min(14)).sortable(),
        Column::new("group", "Group Name", Constraint::Min(12)).sortable(),
        Column::new("modbus_config", "Modbus Config", Constraint::Min(14)),
        Column::new("device_type", "Device Type", Constraint::Length(12)).sortable(),
        Column::new("modbus_version", "Modbus Ver", Constraint::Length(11)),
        Column::new("patch", "Patch", Constraint::Min(12)),
        Column::new("patch_version", "Patch Ver", Constraint::Length(10)),
    ]
}

/// The manage-group modal: radio-style single pick out of the group list.
struct GroupPicker {
    device_id: String,
    choices: Vec<GroupChoice>,
    selected: usize,
}

impl GroupPicker {
    fn new(device: &DeviceRow, choices: Vec<GroupChoice>) -> Self {
        let selected = device
            .group_id
            .as_ref()
            .and_then(|id| choices.iter().position(|g| &g.id == id))
            .unwrap_or(0);
        Self {
            device_id: device.device_id.clone(),
            choices,
            selected,
        }
    }

    fn picked(&self) -> Option<&GroupChoice> {
        self.choices.get(self.selected)
    }
}

type DeviceFetch = (PageData<DeviceRow>, Vec<GroupChoice>);

/// Fetch one page of devices together with the side-band group list.
struct FetchDevicesCmd {
    client: ApiClient,
    query: PageQuery,
    seq: u64,
    tx: UnboundedSender<DevicesMsg>,
}

#[async_trait]
impl Command for FetchDevicesCmd {
    fn name(&self) -> String {
        format!("fetch devices page {}", self.query.page_index + 1)
    }

    async fn execute(self: Box<Self>) -> Result<()> {
        let result = match self.client.devices(&self.query).await {
            Ok(envelope) => {
                let has_next = envelope.has_next();
                let has_previous = envelope.has_previous();
                let page = PageData {
                    rows: envelope
                        .results
                        .devices
                        .into_iter()
                        .map(DeviceRow::from_raw)
                        .collect(),
                    total_count: Some(envelope.count.unwrap_or(0)),
                    has_next,
                    has_previous,
                };
                Ok((page, envelope.results.groups))
            }
            Err(err) => Err(err.into()),
        };
        let _ = self.tx.send(DevicesMsg::PageLoaded(self.seq, result));
        Ok(())
    }
}

enum DevicesMsg {
    Refetch,
    PageLoaded(u64, Result<DeviceFetch>),
    SearchEdited(String),
    SearchSettled(DebounceTicket),
    NextPage,
    PrevPage,
    PageSize(usize),
    SortToggled(&'static str),
    ManageGroup(usize),
    SaveGroup { device_id: String, group_id: String },
    GroupChanged(Result<()>),
}

pub struct DevicesPage {
    client: ApiClient,
    browser: Browser<DeviceRow>,
    table: DataTable<DeviceRow>,
    groups: Vec<GroupChoice>,
    picker: Option<GroupPicker>,
    toasts: Vec<Toast>,
    msg_tx: UnboundedSender<DevicesMsg>,
    msg_rx: UnboundedReceiver<DevicesMsg>,
}

impl DevicesPage {
    pub fn new(client: ApiClient) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            client,
            browser: Browser::server(DEFAULT_PAGE_SIZE),
            table: DataTable::new("Devices", columns()),
            groups: Vec::new(),
            picker: None,
            toasts: Vec::new(),
            msg_tx,
            msg_rx,
        }
    }

    fn queue(&self, msg: DevicesMsg) {
        let _ = self.msg_tx.send(msg);
    }

    fn view_rows(&self) -> Vec<&DeviceRow> {
        Self::rows_of(&self.browser)
    }

    fn rows_of(browser: &Browser<DeviceRow>) -> Vec<&DeviceRow> {
        let window = browser.pagination().slice(browser.rows());
        sorted_view(window.iter().collect(), browser.sort())
    }

    fn refetch(&mut self) -> UpdateResult {
        let (seq, query) = self.browser.begin_fetch();
        FetchDevicesCmd {
            client: self.client.clone(),
            query,
            seq,
            tx: self.msg_tx.clone(),
        }
        .into()
    }

    fn process_message(&mut self, msg: DevicesMsg) -> UpdateResult {
        match msg {
            DevicesMsg::Refetch => self.refetch(),

            DevicesMsg::PageLoaded(seq, result) => {
                if let Err(err) = &result {
                    if is_auth_error(err) {
                        return UpdateResult::SessionExpired;
                    }
                }
                let commit = match result {
                    Ok((page, groups)) => {
                        let commit = self.browser.commit(seq, Ok(page));
                        if commit == Commit::Committed {
                            self.groups = groups;
                        }
                        commit
                    }
                    Err(err) => {
                        let commit = self.browser.commit(seq, Err(err));
                        if commit == Commit::Failed {
                            self.groups.clear();
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

            DevicesMsg::SearchEdited(raw) => {
                let ticket = self.browser.edit_search(raw);
                SettleSearchCmd::new(ticket, self.msg_tx.clone(), DevicesMsg::SearchSettled).into()
            }

            DevicesMsg::SearchSettled(ticket) => {
                if self.browser.settle_search(ticket) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            DevicesMsg::NextPage => {
                if self.browser.next_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            DevicesMsg::PrevPage => {
                if self.browser.prev_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            DevicesMsg::PageSize(size) => {
                if self.browser.set_page_size(size) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            DevicesMsg::SortToggled(column) => {
                self.browser.sort_mut().toggle(column);
                UpdateResult::Idle
            }

            DevicesMsg::ManageGroup(index) => {
                if self.groups.is_empty() {
                    self.toasts.push(Toast::info("No groups available"));
                } else if let Some(row) = self.view_rows().get(index) {
                    self.picker = Some(GroupPicker::new(row, self.groups.clone()));
                }
                UpdateResult::Idle
            }

            DevicesMsg::SaveGroup {
                device_id,
                group_id,
            } => {
                let client = self.client.clone();
                MutationCmd::new(
                    format!("move device {device_id}"),
                    async move {
                        client.change_device_group(&device_id, group_id).await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    DevicesMsg::GroupChanged,
                )
                .into()
            }

            DevicesMsg::GroupChanged(result) => match result {
                Ok(()) => {
                    self.toasts.push(Toast::success("Device group updated"));
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

    fn render_picker(frame: &mut Frame, area: Rect, theme: &Theme, picker: &GroupPicker) {
        let height = u16::try_from(picker.choices.len() + 5).unwrap_or(u16::MAX);
        let popup = popup_area(area, Constraint::Percentage(40), Constraint::Length(height));
        frame.render_widget(Clear, popup);

        let mut lines = vec![Line::from("")];
        for (i, group) in picker.choices.iter().enumerate() {
            let (marker, style) = if i == picker.selected {
                (
                    "◉ ",
                    Style::default().fg(theme.lavender).add_modifier(Modifier::BOLD),
                )
            } else {
                ("○ ", Style::default().fg(theme.text))
            };
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(marker, style),
                Span::styled(group.name.clone(), style),
            ]));
        }
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            "  j/k select   Enter save   Esc cancel",
            Style::default().fg(theme.overlay1),
        )));

        let block = Block::default()
            .title(format!(" Change group for {} ", picker.device_id))
            .title_style(Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1))
            .style(Style::default().bg(theme.base));

        frame.render_widget(Paragraph::new(lines).block(block), popup);
    }
}

impl Page for DevicesPage {
    fn init(&mut self) {
        self.queue(DevicesMsg::Refetch);
    }

    fn handle_key(&mut self, key: KeyEvent) -> EventResult<()> {
        if let Some(picker) = &mut self.picker {
            match key.code {
                KeyCode::Up | KeyCode::Char('k') => {
                    picker.selected = picker.selected.saturating_sub(1);
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    picker.selected = (picker.selected + 1).min(picker.choices.len() - 1);
                }
                KeyCode::Enter => {
                    if let Some(group) = picker.picked() {
                        let msg = DevicesMsg::SaveGroup {
                            device_id: picker.device_id.clone(),
                            group_id: group.id.clone(),
                        };
                        self.picker = None;
                        self.queue(msg);
                    }
                }
                KeyCode::Esc => self.picker = None,
                _ => {}
            }
            return EventResult::Consumed;
        }

        match self.table.handle_key(key) {
            EventResult::Event(event) => {
                match event {
                    TableEvent::Activated(index) => self.queue(DevicesMsg::ManageGroup(index)),
                    TableEvent::SearchEdited(raw) => self.queue(DevicesMsg::SearchEdited(raw)),
                    TableEvent::NextPage => self.queue(DevicesMsg::NextPage),
                    TableEvent::PrevPage => self.queue(DevicesMsg::PrevPage),
                    TableEvent::PageSizeChanged(size) => self.queue(DevicesMsg::PageSize(size)),
                    TableEvent::SortToggled(column) => self.queue(DevicesMsg::SortToggled(column)),
                }
                EventResult::Consumed
            }
            EventResult::Consumed => EventResult::Consumed,
            EventResult::Ignored => match key.code {
                KeyCode::Char('m') => {
                    if let Some(index) = self.table.selected() {
                        self.queue(DevicesMsg::ManageGroup(index));
                    }
                    EventResult::Consumed
                }
                KeyCode::Char('r') => {
                    self.queue(DevicesMsg::Refetch);
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
            empty_text: "No devices found.",
            search: self.browser.search().raw(),
            sort: self.browser.sort(),
            page: self.browser.pagination(),
        };
        self.table.render(frame, area, theme, &view);

        if let Some(picker) = &self.picker {
            Self::render_picker(frame, area, theme, picker);
        }
    }

    fn keybindings(&self) -> Vec<Keybinding> {
        vec![
            Keybinding::new("/", "Search"),
            Keybinding::new("h/l", "Page"),
            Keybinding::new("1-9", "Sort"),
            Keybinding::new("m", "Manage group"),
            Keybinding::new("r", "Reload"),
        ]
    }

    fn take_toasts(&mut self) -> Vec<Toast> {
        std::mem::take(&mut self.toasts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn choice(id: &str, name: &str) -> GroupChoice {
        GroupChoice {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn picker_preselects_current_group() {
        let row = DeviceRow {
            device_id: "d1".to_string(),
            device_type: None,
            modbus_version: None,
            patch_version: None,
            modbus_config: None,
            patch: None,
            group: Some("plant-b".to_string()),
            group_id: Some("g2".to_string()),
        };
        let picker = GroupPicker::new(&row, vec![choice("g1", "plant-a"), choice("g2", "plant-b")]);
        assert_eq!(picker.selected, 1);
        assert_eq!(picker.picked().map(|g| g.id.as_str()), Some("g2"));
    }

    #[test]
    fn picker_defaults_to_first_group_when_unassigned() {
        let row = DeviceRow {
            device_id: "d2".to_string(),
            device_type: None,
            modbus_version: None,
            patch_version: None,
            modbus_config: None,
            patch: None,
            group: None,
            group_id: None,
        };
        let picker = GroupPicker::new(&row, vec![choice("g1", "plant-a")]);
        assert_eq!(picker.selected, 0);
    }
}
