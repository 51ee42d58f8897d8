//! Application shell.
//!
//! Owns the active page, the shared API client, and the app-level chrome
//! (status bar, toasts, error dialog). Events from the terminal are routed
//! to the page first; whatever the page ignores falls through to global
//! keys like quit and tab switching.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::layout::{Constraint, Layout, Rect};
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::command::Command;
use crate::pages::{
    ConfigsPage, DevicesPage, GroupsPage, LoginPage, Page, PageKind, PatchesPage, UpdateResult,
    UsersPage,
};
use crate::theme::Theme;
use crate::tui::{Event, Tui};
use crate::ui::{Component, ErrorDialog, ErrorDialogEvent, EventResult, Keybinding, StatusBar, ToastManager};

pub struct App {
    client: ApiClient,
    theme: Theme,
    /// `None` while the login page is active.
    active: Option<PageKind>,
    page: Box<dyn Page>,
    toasts: ToastManager,
    error_dialog: Option<ErrorDialog>,
    should_quit: bool,
    should_suspend: bool,
}

impl App {
    pub fn new(client: ApiClient, theme: Theme) -> Self {
        let page = Box::new(LoginPage::new(client.clone()));
        Self {
            client,
            theme,
            active: None,
            page,
            toasts: ToastManager::new(),
            error_dialog: None,
            should_quit: false,
            should_suspend: false,
        }
    }

    pub async fn run(&mut self) -> color_eyre::Result<()> {
        let mut tui = Tui::new(60.0, 4.0)?;
        tui.enter()?;

        loop {
            let Some(event) = tui.next_event().await else {
                break;
            };
            self.handle_event(&mut tui, event)?;

            if self.should_suspend {
                self.should_suspend = false;
                tui.suspend()?;
                // Execution continues here once the shell foregrounds us.
                tui.resume()?;
            } else if self.should_quit {
                break;
            }
        }

        tui.exit()?;
        Ok(())
    }

    fn handle_event(&mut self, tui: &mut Tui, event: Event) -> color_eyre::Result<()> {
        match event {
            Event::Init => {
                self.page.init();
                self.drain_page();
            }
            Event::Quit => self.should_quit = true,
            Event::Suspend => self.should_suspend = true,
            Event::Tick => {
                self.page.handle_tick();
                self.toasts.handle_tick();
                self.drain_page();
            }
            Event::Render => self.render(tui)?,
            Event::Resize(width, height) => {
                tui.resize(Rect::new(0, 0, width, height))?;
                self.render(tui)?;
            }
            Event::Key(key) => {
                self.handle_key(key);
                self.drain_page();
            }
            Event::Error(message) => self.error_dialog = Some(ErrorDialog::new(message)),
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if let Some(dialog) = &mut self.error_dialog {
            if let Ok(EventResult::Event(ErrorDialogEvent::Dismissed)) = dialog.handle_key(key) {
                self.error_dialog = None;
            }
            return;
        }

        if self.page.handle_key(key).is_consumed() {
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => {
                if let Some(kind) = self.active {
                    self.switch_to(kind.next());
                }
            }
            KeyCode::BackTab => {
                if let Some(kind) = self.active {
                    self.switch_to(kind.prev());
                }
            }
            _ => {}
        }
    }

    /// Funnel queued page messages into app actions.
    fn drain_page(&mut self) {
        match self.page.update() {
            UpdateResult::Idle => {}
            UpdateResult::Commands(commands) => self.spawn_commands(commands),
            UpdateResult::LoggedIn => self.switch_to(PageKind::Groups),
            UpdateResult::SessionExpired => {
                debug!("session expired, returning to login");
                self.client.logout();
                self.active = None;
                self.page = Box::new(LoginPage::with_notice(
                    self.client.clone(),
                    "Session expired, sign in again.",
                ));
            }
        }
        for toast in self.page.take_toasts() {
            self.toasts.show(toast);
        }
    }

    fn switch_to(&mut self, kind: PageKind) {
        debug!(page = kind.title(), "switching page");
        self.active = Some(kind);
        self.page = self.open(kind);
        self.page.init();
        self.drain_page();
    }

    fn open(&self, kind: PageKind) -> Box<dyn Page> {
        let client = self.client.clone();
        match kind {
            PageKind::Groups => Box::new(GroupsPage::new(client)),
            PageKind::Devices => Box::new(DevicesPage::new(client)),
            PageKind::Configs => Box::new(ConfigsPage::new(client)),
            PageKind::Patches => Box::new(PatchesPage::new(client)),
            PageKind::Users => Box::new(UsersPage::new(client)),
        }
    }

    fn spawn_commands(&self, commands: Vec<Box<dyn Command>>) {
        for command in commands {
            let name = command.name();
            debug!(command = name, "spawning command");
            tokio::spawn(async move {
                if let Err(err) = command.execute().await {
                    warn!(command = name, "command failed: {err:#}");
                }
            });
        }
    }

    fn render(&mut self, tui: &mut Tui) -> color_eyre::Result<()> {
        let theme = self.theme;
        tui.draw(|frame| {
            let [page_area, bar_area] =
                Layout::vertical([Constraint::Min(5), Constraint::Length(3)]).areas(frame.area());

            self.page.render(frame, page_area, &theme);

            let mut hints = self.page.keybindings();
            if self.active.is_some() {
                hints.push(Keybinding::new("Tab", "Next page"));
                hints.push(Keybinding::new("q", "Quit"));
            }
            let titles: Vec<&str> = match self.active {
                Some(_) => PageKind::ALL.iter().map(|k| k.title()).collect(),
                None => Vec::new(),
            };
            let active_index = self
                .active
                .and_then(|kind| PageKind::ALL.iter().position(|&k| k == kind))
                .unwrap_or(0);
            StatusBar::render(frame, bar_area, &theme, &titles, active_index, &hints);

            self.toasts.render(frame, page_area, &theme);

            if let Some(dialog) = &mut self.error_dialog {
                dialog.render(frame, frame.area(), &theme);
            }
        })?;
        Ok(())
    }
}
