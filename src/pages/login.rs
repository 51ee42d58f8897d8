//! Login page.
//!
//! Username/password form shown before any data page. A successful login
//! stores the token pair inside the shared [`ApiClient`] and hands
//! control to the first data page.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::api::ApiClient;
use crate::command::MutationCmd;
use crate::theme::Theme;
use crate::ui::{Component, EventResult, Keybinding, Spinner, TextInput, TextInputEvent, popup_area};

use super::{Page, UpdateResult};

enum LoginField {
    Username,
    Password,
}

enum LoginMsg {
    Submit,
    Finished(color_eyre::Result<()>),
}

pub struct LoginPage {
    client: ApiClient,
    username: TextInput,
    password: TextInput,
    focus: LoginField,
    spinner: Spinner,
    authenticating: bool,
    error: Option<String>,
    msg_tx: UnboundedSender<LoginMsg>,
    msg_rx: UnboundedReceiver<LoginMsg>,
}

impl LoginPage {
    pub fn new(client: ApiClient) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let mut username = TextInput::new("Username");
        username.set_focused(true);
        let password = TextInput::new("Password").masked();
        Self {
            client,
            username,
            password,
            focus: LoginField::Username,
            spinner: Spinner::new("Signing in..."),
            authenticating: false,
            error: None,
            msg_tx,
            msg_rx,
        }
    }

    /// Shown when the app bounced back here after a dead session.
    pub fn with_notice(client: ApiClient, notice: impl Into<String>) -> Self {
        let mut page = Self::new(client);
        page.error = Some(notice.into());
        page
    }

    fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            LoginField::Username => {
                self.username.set_focused(false);
                self.password.set_focused(true);
                LoginField::Password
            }
            LoginField::Password => {
                self.username.set_focused(true);
                self.password.set_focused(false);
                LoginField::Username
            }
        };
    }

    fn submit(&mut self) {
        if self.username.value().is_empty() || self.password.value().is_empty() {
            self.error = Some("Username and password are required.".to_string());
            return;
        }
        self.error = None;
        let _ = self.msg_tx.send(LoginMsg::Submit);
    }

    fn process_message(&mut self, msg: LoginMsg) -> UpdateResult {
        match msg {
            LoginMsg::Submit => {
                self.authenticating = true;
                let client = self.client.clone();
                let username = self.username.value().to_string();
                let password = self.password.value().to_string();
                MutationCmd::new(
                    "login",
                    async move {
                        client.login(username, password).await?;
                        Ok(())
                    },
                    self.msg_tx.clone(),
                    LoginMsg::Finished,
                )
                .into()
            }
            LoginMsg::Finished(result) => {
                self.authenticating = false;
                match result {
                    Ok(()) => UpdateResult::LoggedIn,
                    Err(err) => {
                        self.error = Some(format!("{err:#}"));
                        UpdateResult::Idle
                    }
                }
            }
        }
    }
}

impl Page for LoginPage {
    fn handle_tick(&mut self) {
        if self.authenticating {
            self.spinner.handle_tick();
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> EventResult<()> {
        if self.authenticating {
            return EventResult::Consumed;
        }
        match key.code {
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Down | KeyCode::Up => {
                self.toggle_focus();
                return EventResult::Consumed;
            }
            _ => {}
        }

        let event = match self.focus {
            LoginField::Username => self.username.handle_key(key),
            LoginField::Password => self.password.handle_key(key),
        };
        match event {
            Ok(EventResult::Event(TextInputEvent::Submitted(_))) => {
                if matches!(self.focus, LoginField::Username) {
                    self.toggle_focus();
                } else {
                    self.submit();
                }
                EventResult::Consumed
            }
            Ok(EventResult::Event(TextInputEvent::Cancelled)) => {
                self.error = None;
                EventResult::Consumed
            }
            Ok(EventResult::Consumed) => EventResult::Consumed,
            Ok(EventResult::Ignored) | Err(_) => EventResult::Ignored,
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
        let popup = popup_area(area, Constraint::Length(50), Constraint::Length(14));
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(" lazyfleet ")
            .title_alignment(Alignment::Center)
            .title_style(Style::default().fg(theme.mauve).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1))
            .style(Style::default().bg(theme.base));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let [username_area, password_area, status_area, hint_area] = Layout::vertical([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
        ])
        .areas(inner);

        self.username.render(frame, username_area, theme);
        self.password.render(frame, password_area, theme);

        if self.authenticating {
            self.spinner.render(frame, status_area, theme);
        } else if let Some(error) = &self.error {
            frame.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    error.clone(),
                    Style::default().fg(theme.red),
                )))
                .alignment(Alignment::Center),
                status_area,
            );
        }

        frame.render_widget(
            Paragraph::new(Line::from(Span::styled(
                "Tab to switch, Enter to sign in",
                Style::default().fg(theme.overlay1),
            )))
            .alignment(Alignment::Center),
            hint_area,
        );
    }

    fn keybindings(&self) -> Vec<Keybinding> {
        vec![
            Keybinding::new("Tab", "Switch field"),
            Keybinding::new("Enter", "Sign in"),
        ]
    }
}
