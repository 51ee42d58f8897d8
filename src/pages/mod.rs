//! Application pages.
//!
//! Each page owns its own state and message queue, mirroring one screen of
//! the admin console. The app drives them through [`Page`]: key events are
//! translated into queued messages, `update` drains the queue into
//! commands, and completed commands re-enter through the same queue.

pub mod configs;
pub mod devices;
pub mod groups;
pub mod login;
pub mod patches;
pub mod users;

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::Rect;

pub use configs::ConfigsPage;
pub use devices::DevicesPage;
pub use groups::GroupsPage;
pub use login::LoginPage;
pub use patches::PatchesPage;
pub use users::UsersPage;

use crate::api::ApiError;
use crate::command::Command;
use crate::theme::Theme;
use crate::ui::{EventResult, Keybinding, Toast};

/// Outcome of draining a page's message queue.
pub enum UpdateResult {
    Idle,
    /// Commands for the app to spawn.
    Commands(Vec<Box<dyn Command>>),
    /// Login succeeded; the app switches to the first data page.
    LoggedIn,
    /// The session is gone; the app returns to the login page.
    SessionExpired,
}

impl<T: Command> From<T> for UpdateResult {
    fn from(command: T) -> Self {
        Self::Commands(vec![Box::new(command)])
    }
}

/// The navigable data pages, in tab order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Groups,
    Devices,
    Configs,
    Patches,
    Users,
}

impl PageKind {
    pub const ALL: [Self; 5] = [
        Self::Groups,
        Self::Devices,
        Self::Configs,
        Self::Patches,
        Self::Users,
    ];

    pub const fn title(self) -> &'static str {
        match self {
            Self::Groups => "Groups",
            Self::Devices => "Devices",
            Self::Configs => "Configs",
            Self::Patches => "Patches",
            Self::Users => "Users",
        }
    }

    pub fn next(self) -> Self {
        let position = Self::ALL.iter().position(|&k| k == self).unwrap_or(0);
        Self::ALL[(position + 1) % Self::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let position = Self::ALL.iter().position(|&k| k == self).unwrap_or(0);
        Self::ALL[(position + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// One screen of the console.
///
/// The app calls methods in this order:
/// 1. `init()` once when the page becomes active, then `update()`
/// 2. per event: `handle_tick()` or `handle_key()`, then `update()`
/// 3. `update()` again whenever a spawned command completes
pub trait Page {
    fn init(&mut self) {}

    fn handle_tick(&mut self) {}

    fn handle_key(&mut self, key: KeyEvent) -> EventResult<()>;

    fn update(&mut self) -> UpdateResult;

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme);

    fn keybindings(&self) -> Vec<Keybinding> {
        Vec::new()
    }

    /// Notifications queued since the last drain.
    fn take_toasts(&mut self) -> Vec<Toast> {
        Vec::new()
    }
}

/// Whether a fetch failure means the session itself is dead.
pub(crate) fn is_auth_error(err: &color_eyre::Report) -> bool {
    err.downcast_ref::<ApiError>().is_some_and(ApiError::is_auth)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_order_wraps_both_ways() {
        assert_eq!(PageKind::Groups.next(), PageKind::Devices);
        assert_eq!(PageKind::Users.next(), PageKind::Groups);
        assert_eq!(PageKind::Groups.prev(), PageKind::Users);
    }

    #[test]
    fn auth_errors_are_detected_through_report() {
        let report = color_eyre::Report::from(ApiError::Unauthorized);
        assert!(is_auth_error(&report));
        let other = color_eyre::Report::from(ApiError::status(500, "boom"));
        assert!(!is_auth_error(&other));
    }
}
