//! Firmware patch page.
//!
//! Server-paginated list of patches; `d` promotes the selected patch to
//! the group default after confirmation.

use std::sync::Arc;

use async_trait::async_trait;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::Cell;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::ApiClient;
use crate::api::models::PatchRaw;
use crate::command::MutationCmd;
use crate::grid::{
    Browser, Commit, DEFAULT_PAGE_SIZE, DebounceTicket, FetchPageCmd, PageData, PageQuery,
    PageSource, SettleSearchCmd,
};
use crate::theme::Theme;
use crate::ui::{
    Column, ConfirmDialog, ConfirmEvent, Component, DataTable, EventResult, GridRow, Keybinding,
    TableEvent, TableFrame, Toast, sorted_view,
};

use super::{Page, UpdateResult, is_auth_error};

#[derive(Debug, Clone)]
pub struct PatchRow {
    id: String,
    filename: String,
    group: Option<String>,
    is_default: bool,
}

impl PatchRow {
    fn from_raw(raw: PatchRaw) -> Self {
        Self {
            id: raw.id,
            filename: raw.filename,
            group: raw.group,
            is_default: raw.is_default,
        }
    }
}

impl GridRow for PatchRow {
    fn field(&self, key: &str) -> Option<String> {
        match key {
            "filename" => Some(self.filename.clone()),
            "group" => self.group.clone(),
            "default" => Some(if self.is_default { "Yes" } else { "No" }.to_string()),
            _ => None,
        }
    }
}

fn default_cell(row: &PatchRow, theme: &Theme) -> Cell<'static> {
    if row.is_default {
        Cell::from("Yes").style(Style::default().fg(theme.green).add_modifier(Modifier::BOLD))
    } else {
        Cell::from("No").style(Style::default().fg(theme.overlay1))
    }
}

fn columns() -> Vec<Column<PatchRow>> {
    vec![
        Column::new("filename", "Patch Name", Constraint::Min(24)).sortable(),
        Column::new("group", "Group", Constraint::Min(12)).sortable(),
        Column::new("default", "Default", Constraint::Length(8)).with(default_cell),
    ]
}

struct PatchSource {
    client: ApiClient,
}

#[async_trait]
impl PageSource for PatchSource {
    type Row = PatchRow;

    async fn fetch_page(&self, query: &PageQuery) -> Result<PageData<PatchRow>> {
        let envelope = self.client.patches(query).await?;
        Ok(envelope.into_page_data(PatchRow::from_raw))
    }
}

enum PatchesMsg {
    Refetch,
    PageLoaded(u64, Result<PageData<PatchRow>>),
    SearchEdited(String),
    SearchSettled(DebounceTicket),
    NextPage,
    PrevPage,
    PageSize(usize),
    SortToggled(&'static str),
    AskSetDefault(usize),
    SetDefault { id: String, filename: String },
    DefaultSet(Result<()>),
}

pub struct PatchesPage {
    client: ApiClient,
    source: Arc<PatchSource>,
    browser: Browser<PatchRow>,
    table: DataTable<PatchRow>,
    confirm: Option<(ConfirmDialog, String, String)>,
    toasts: Vec<Toast>,
    msg_tx: UnboundedSender<PatchesMsg>,
    msg_rx: UnboundedReceiver<PatchesMsg>,
}

impl PatchesPage {
    pub fn new(client: ApiClient) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            source: Arc::new(PatchSource {
                client: client.clone(),
            }),
            client,
            browser: Browser::server(DEFAULT_PAGE_SIZE),
            table: DataTable::new("Patches", columns()),
            confirm: None,
            toasts: Vec::new(),
            msg_tx,
            msg_rx,
        }
    }

    fn queue(&self, msg: PatchesMsg) {
        let _ = self.msg_tx.send(msg);
    }

    fn view_rows(&self) -> Vec<&PatchRow> {
        Self::rows_of(&self.browser)
    }

    fn rows_of(browser: &Browser<PatchRow>) -> Vec<&PatchRow> {
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
            PatchesMsg::PageLoaded,
        )
        .into()
    }

    fn process_message(&mut self, msg: PatchesMsg) -> UpdateResult {
        match msg {
            PatchesMsg::Refetch => self.refetch(),

            PatchesMsg::PageLoaded(seq, result) => {
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

            PatchesMsg::SearchEdited(raw) => {
                let ticket = self.browser.edit_search(raw);
                SettleSearchCmd::new(ticket, self.msg_tx.clone(), PatchesMsg::SearchSettled).into()
            }

            PatchesMsg::SearchSettled(ticket) => {
                if self.browser.settle_search(ticket) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            PatchesMsg::NextPage => {
                if self.browser.next_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            PatchesMsg::PrevPage => {
                if self.browser.prev_page() {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            PatchesMsg::PageSize(size) => {
                if self.browser.set_page_size(size) {
                    self.refetch()
                } else {
                    UpdateResult::Idle
                }
            }

            PatchesMsg::SortToggled(column) => {
                self.browser.sort_mut().toggle(column);
                UpdateResult::Idle
            }

            PatchesMsg::AskSetDefault(index) => {
                if let Some(row) = self.view_rows().get(index) {
                    if row.is_default {
                        self.toasts.push(Toast::info(format!(
                            "{} is already the default",
                            row.filename
                        )));
                    } else {
                        let dialog = ConfirmDialog::new(
                            "Set default",
                            format!("Set \"{}\" as the default patch?", row.filename),
                        );
                        self.confirm = Some((dialog, row.id.clone(), row.filename.clone()));
                    }
                }
                UpdateResult::Idle
            }

            PatchesMsg::SetDefault { id, filename } => {
                let client = self.client.clone();
                MutationCmd::new(
                    format!("set default patch {filename}"),
                    async move {
                        client.set_default_patch(&id).await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    PatchesMsg::DefaultSet,
                )
                .into()
            }

            PatchesMsg::DefaultSet(result) => match result {
                Ok(()) => {
                    self.toasts.push(Toast::success("Patch set as default"));
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
}

impl Page for PatchesPage {
    fn init(&mut self) {
        self.queue(PatchesMsg::Refetch);
    }

    fn handle_key(&mut self, key: KeyEvent) -> EventResult<()> {
        if let Some((dialog, id, filename)) = &mut self.confirm {
            match dialog.handle_key(key) {
                Ok(EventResult::Event(ConfirmEvent::Confirmed)) => {
                    let msg = PatchesMsg::SetDefault {
                        id: id.clone(),
                        filename: filename.clone(),
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
                match event {
                    TableEvent::Activated(index) => self.queue(PatchesMsg::AskSetDefault(index)),
                    TableEvent::SearchEdited(raw) => self.queue(PatchesMsg::SearchEdited(raw)),
                    TableEvent::NextPage => self.queue(PatchesMsg::NextPage),
                    TableEvent::PrevPage => self.queue(PatchesMsg::PrevPage),
                    TableEvent::PageSizeChanged(size) => self.queue(PatchesMsg::PageSize(size)),
                    TableEvent::SortToggled(column) => self.queue(PatchesMsg::SortToggled(column)),
                }
                EventResult::Consumed
            }
            EventResult::Consumed => EventResult::Consumed,
            EventResult::Ignored => match key.code {
                KeyCode::Char('d') => {
                    if let Some(index) = self.table.selected() {
                        self.queue(PatchesMsg::AskSetDefault(index));
                    }
                    EventResult::Consumed
                }
                KeyCode::Char('r') => {
                    self.queue(PatchesMsg::Refetch);
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
            empty_text: "No patches found.",
            search: self.browser.search().raw(),
            sort: self.browser.sort(),
            page: self.browser.pagination(),
        };
        self.table.render(frame, area, theme, &view);

        if let Some((dialog, _, _)) = &mut self.confirm {
            dialog.render(frame, area, theme);
        }
    }

    fn keybindings(&self) -> Vec<Keybinding> {
        vec![
            Keybinding::new("/", "Search"),
            Keybinding::new("h/l", "Page"),
            Keybinding::new("1-9", "Sort"),
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
    use super::*;

    #[test]
    fn row_maps_wire_fields() {
        let row = PatchRow::from_raw(PatchRaw {
            id: "p1".to_string(),
            filename: "fw-2.4.1.bin".to_string(),
            group: None,
            is_default: true,
        });
        assert_eq!(row.field("filename").as_deref(), Some("fw-2.4.1.bin"));
        assert!(row.field("group").is_none());
        assert_eq!(row.field("default").as_deref(), Some("Yes"));
    }
}
