//! User management page.
//!
//! The users endpoint returns the whole list at once, so this page runs
//! the grid in local mode: fuzzy filtering and pagination happen in
//! memory, and the debounced search never refetches.

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
use crate::api::models::{NewUser, UserRaw};
use crate::command::{Command, MutationCmd};
use crate::grid::{Browser, Commit, DEFAULT_PAGE_SIZE, DebounceTicket, PageData, SettleSearchCmd};
use crate::search::Matcher;
use crate::theme::Theme;
use crate::ui::{
    Column, Component, DataTable, EventResult, GridRow, Keybinding, TableEvent, TableFrame,
    TextInput, TextInputEvent, Toast, popup_area, sorted_view,
};

use super::{Page, UpdateResult, is_auth_error};

#[derive(Debug, Clone)]
pub struct UserRow {
    email: String,
    username: Option<String>,
    joined: Option<String>,
}

impl UserRow {
    fn from_raw(raw: UserRaw) -> Self {
        Self {
            email: raw.email,
            username: raw.username,
            joined: raw.date_joined.map(|d| d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl GridRow for UserRow {
    fn field(&self, key: &str) -> Option<String> {
        match key {
            "email" => Some(self.email.clone()),
            "username" => self.username.clone(),
            "joined" => self.joined.clone(),
            _ => None,
        }
    }
}

fn columns() -> Vec<Column<UserRow>> {
    vec![
        Column::new("email", "Email", Constraint::Min(24)).sortable(),
        Column::new("username", "Username", Constraint::Min(16)).sortable(),
        Column::new("joined", "Joined", Constraint::Length(12)).sortable(),
    ]
}

struct LoadUsersCmd {
    client: ApiClient,
    seq: u64,
    tx: UnboundedSender<UsersMsg>,
}

#[async_trait]
impl Command for LoadUsersCmd {
    fn name(&self) -> String {
        "load users".to_string()
    }

    async fn execute(self: Box<Self>) -> Result<()> {
        let result = match self.client.users().await {
            Ok(users) => Ok(users.into_iter().map(UserRow::from_raw).collect()),
            Err(err) => Err(err.into()),
        };
        let _ = self.tx.send(UsersMsg::Loaded(self.seq, result));
        Ok(())
    }
}

enum AddUserField {
    Email,
    Password,
}

struct AddUserModal {
    email: TextInput,
    password: TextInput,
    focus: AddUserField,
}

impl AddUserModal {
    fn new() -> Self {
        let mut email = TextInput::new("Email");
        email.set_focused(true);
        let mut password = TextInput::new("Password").masked();
        password.set_focused(false);
        Self {
            email,
            password,
            focus: AddUserField::Email,
        }
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            AddUserField::Email => {
                self.email.set_focused(false);
                self.password.set_focused(true);
                AddUserField::Password
            }
            AddUserField::Password => {
                self.email.set_focused(true);
                self.password.set_focused(false);
                AddUserField::Email
            }
        };
    }
}

enum UsersMsg {
    Reload,
    Loaded(u64, Result<Vec<UserRow>>),
    SearchEdited(String),
    SearchSettled(DebounceTicket),
    NextPage,
    PrevPage,
    PageSize(usize),
    SortToggled(&'static str),
    Create { email: String, password: String },
    Created(Result<()>),
}

pub struct UsersPage {
    client: ApiClient,
    browser: Browser<UserRow>,
    table: DataTable<UserRow>,
    matcher: Matcher,
    /// Indices into the browser's row set that pass the current filter.
    filtered: Vec<usize>,
    modal: Option<AddUserModal>,
    toasts: Vec<Toast>,
    msg_tx: UnboundedSender<UsersMsg>,
    msg_rx: UnboundedReceiver<UsersMsg>,
}

impl UsersPage {
    pub fn new(client: ApiClient) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        Self {
            client,
            browser: Browser::local(DEFAULT_PAGE_SIZE),
            table: DataTable::new("Users", columns()),
            matcher: Matcher::new(),
            filtered: Vec::new(),
            modal: None,
            toasts: Vec::new(),
            msg_tx,
            msg_rx,
        }
    }

    fn queue(&self, msg: UsersMsg) {
        let _ = self.msg_tx.send(msg);
    }

    fn reload(&mut self) -> UpdateResult {
        let (seq, _) = self.browser.begin_fetch();
        LoadUsersCmd {
            client: self.client.clone(),
            seq,
            tx: self.msg_tx.clone(),
        }
        .into()
    }

    /// Recompute the filtered index set and re-derive the page count.
    fn apply_filter(&mut self) {
        let query = self.browser.search().effective().to_string();
        self.filtered = self
            .browser
            .rows()
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                query.is_empty()
                    || self.matcher.matches_any(
                        [row.email.as_str()]
                            .into_iter()
                            .chain(row.username.as_deref()),
                        &query,
                    )
            })
            .map(|(i, _)| i)
            .collect();
        let count = self.filtered.len();
        self.browser.pagination_mut().sync_row_count(count);
    }

    fn view_rows(&self) -> Vec<&UserRow> {
        Self::rows_of(&self.browser, &self.filtered)
    }

    fn rows_of<'a>(browser: &'a Browser<UserRow>, filtered: &[usize]) -> Vec<&'a UserRow> {
        let rows = browser.rows();
        let filtered: Vec<&UserRow> = filtered.iter().map(|&i| &rows[i]).collect();
        let window = browser.pagination().slice(&filtered);
        sorted_view(window.to_vec(), browser.sort())
    }

    fn process_message(&mut self, msg: UsersMsg) -> UpdateResult {
        match msg {
            UsersMsg::Reload => self.reload(),

            UsersMsg::Loaded(seq, result) => {
                if let Err(err) = &result {
                    if is_auth_error(err) {
                        return UpdateResult::SessionExpired;
                    }
                }
                let commit = self.browser.commit(
                    seq,
                    result.map(|rows| PageData {
                        rows,
                        ..PageData::default()
                    }),
                );
                match commit {
                    Commit::Stale => {}
                    Commit::Committed => self.apply_filter(),
                    Commit::Failed => {
                        self.apply_filter();
                        if let Some(error) = self.browser.error() {
                            self.toasts.push(Toast::error(error.to_string()));
                        }
                    }
                }
                UpdateResult::Idle
            }

            UsersMsg::SearchEdited(raw) => {
                let ticket = self.browser.edit_search(raw);
                SettleSearchCmd::new(ticket, self.msg_tx.clone(), UsersMsg::SearchSettled).into()
            }

            UsersMsg::SearchSettled(ticket) => {
                if self.browser.settle_search(ticket) {
                    self.apply_filter();
                }
                UpdateResult::Idle
            }

            UsersMsg::NextPage => {
                self.browser.next_page();
                UpdateResult::Idle
            }

            UsersMsg::PrevPage => {
                self.browser.prev_page();
                UpdateResult::Idle
            }

            UsersMsg::PageSize(size) => {
                self.browser.set_page_size(size);
                UpdateResult::Idle
            }

            UsersMsg::SortToggled(column) => {
                self.browser.sort_mut().toggle(column);
                UpdateResult::Idle
            }

            UsersMsg::Create { email, password } => {
                let client = self.client.clone();
                MutationCmd::new(
                    format!("create user {email}"),
                    async move {
                        client.create_user(&NewUser { email, password }).await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    UsersMsg::Created,
                )
                .into()
            }

            UsersMsg::Created(result) => match result {
                Ok(()) => {
                    self.toasts.push(Toast::success("User added"));
                    self.reload()
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

    fn handle_modal_key(&mut self, key: KeyEvent) -> EventResult<()> {
        let Some(modal) = &mut self.modal else {
            return EventResult::Ignored;
        };
        if key.code == KeyCode::Tab {
            modal.toggle_focus();
            return EventResult::Consumed;
        }

        let event = match modal.focus {
            AddUserField::Email => modal.email.handle_key(key),
            AddUserField::Password => modal.password.handle_key(key),
        };
        match event {
            Ok(EventResult::Event(TextInputEvent::Submitted(_))) => {
                let email = modal.email.value().to_string();
                let password = modal.password.value().to_string();
                if email.is_empty() || password.is_empty() {
                    modal.toggle_focus();
                } else {
                    self.modal = None;
                    self.queue(UsersMsg::Create { email, password });
                }
            }
            Ok(EventResult::Event(TextInputEvent::Cancelled)) => self.modal = None,
            _ => {}
        }
        EventResult::Consumed
    }

    fn render_modal(frame: &mut Frame, area: Rect, theme: &Theme, modal: &mut AddUserModal) {
        let popup = popup_area(area, Constraint::Percentage(40), Constraint::Length(10));
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(" Add New User ")
            .title_style(Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1))
            .style(Style::default().bg(theme.base));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let [email_area, password_area, hint_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(inner);
        modal.email.render(frame, email_area, theme);
        modal.password.render(frame, password_area, theme);
        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "Tab to switch, Enter to submit, Esc to cancel",
                Style::default().fg(theme.overlay1),
            ))),
            hint_area,
        );
    }
}

impl Page for UsersPage {
    fn init(&mut self) {
        self.queue(UsersMsg::Reload);
    }

    fn handle_key(&mut self, key: KeyEvent) -> EventResult<()> {
        if self.modal.is_some() {
            return self.handle_modal_key(key);
        }

        match self.table.handle_key(key) {
            EventResult::Event(event) => {
                match event {
                    // Rows have no detail view.
                    TableEvent::Activated(_) => {}
                    TableEvent::SearchEdited(raw) => self.queue(UsersMsg::SearchEdited(raw)),
                    TableEvent::NextPage => self.queue(UsersMsg::NextPage),
                    TableEvent::PrevPage => self.queue(UsersMsg::PrevPage),
                    TableEvent::PageSizeChanged(size) => self.queue(UsersMsg::PageSize(size)),
                    TableEvent::SortToggled(column) => self.queue(UsersMsg::SortToggled(column)),
                }
                EventResult::Consumed
            }
            EventResult::Consumed => EventResult::Consumed,
            EventResult::Ignored => match key.code {
                KeyCode::Char('a') => {
                    self.modal = Some(AddUserModal::new());
                    EventResult::Consumed
                }
                KeyCode::Char('r') => {
                    self.queue(UsersMsg::Reload);
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
        let rows = Self::rows_of(&self.browser, &self.filtered);
        let view = TableFrame {
            rows: &rows,
            loading: self.browser.loading(),
            empty_text: "No users found.",
            search: self.browser.search().raw(),
            sort: self.browser.sort(),
            page: self.browser.pagination(),
        };
        self.table.render(frame, area, theme, &view);

        if let Some(modal) = &mut self.modal {
            Self::render_modal(frame, area, theme, modal);
        }
    }

    fn keybindings(&self) -> Vec<Keybinding> {
        vec![
            Keybinding::new("/", "Filter"),
            Keybinding::new("h/l", "Page"),
            Keybinding::new("1-9", "Sort"),
            Keybinding::new("a", "Add user"),
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

    fn user(email: &str, username: Option<&str>) -> UserRow {
        UserRow {
            email: email.to_string(),
            username: username.map(str::to_string),
            joined: None,
        }
    }

    fn loaded_page(users: Vec<UserRow>) -> UsersPage {
        let client = ApiClient::new("http://localhost", crate::api::client::DEFAULT_TIMEOUT)
            .expect("client");
        let mut page = UsersPage::new(client);
        let (seq, _) = page.browser.begin_fetch();
        page.browser.commit(
            seq,
            Ok(PageData {
                rows: users,
                ..PageData::default()
            }),
        );
        page.apply_filter();
        page
    }

    #[test]
    fn filter_matches_email_and_username() {
        let mut page = loaded_page(vec![
            user("ops@example.com", Some("operator")),
            user("dev@example.com", None),
        ]);
        let ticket = page.browser.edit_search("oper");
        assert!(page.browser.settle_search(ticket));
        page.apply_filter();
        assert_eq!(page.filtered, vec![0]);
        assert_eq!(page.browser.pagination().total_count(), 1);
    }

    #[test]
    fn clearing_filter_restores_all_rows() {
        let mut page = loaded_page(vec![
            user("a@example.com", None),
            user("b@example.com", None),
        ]);
        let ticket = page.browser.edit_search("a@");
        page.browser.settle_search(ticket);
        page.apply_filter();
        assert_eq!(page.filtered.len(), 1);

        let ticket = page.browser.edit_search("");
        page.browser.settle_search(ticket);
        page.apply_filter();
        assert_eq!(page.filtered.len(), 2);
        assert_eq!(page.browser.pagination().page_index(), 0);
    }

    #[test]
    fn filtered_rows_paginate_locally() {
        let users = (0..12)
            .map(|i| user(&format!("user{i}@example.com"), None))
            .collect();
        let mut page = loaded_page(users);
        assert_eq!(page.browser.pagination().page_count(), 2);
        assert_eq!(page.view_rows().len(), DEFAULT_PAGE_SIZE);
        page.browser.next_page();
        assert_eq!(page.view_rows().len(), 3);
    }
}
