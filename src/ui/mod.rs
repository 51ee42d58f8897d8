//! Reusable UI building blocks.
//!
//! Components handle input and emit generic outputs; they know nothing
//! about the fleet domain. Pages translate component events into their own
//! messages.

pub mod confirm_dialog;
pub mod error_dialog;
pub mod spinner;
pub mod status_bar;
pub mod table;
pub mod text_input;
pub mod toast;

use crossterm::event::KeyEvent;
use ratatui::Frame;
use ratatui::layout::{Constraint, Flex, Layout, Rect};

pub use color_eyre::Result;

pub use confirm_dialog::{ConfirmDialog, ConfirmEvent};
pub use error_dialog::{ErrorDialog, ErrorDialogEvent};
pub use spinner::Spinner;
pub use status_bar::{Keybinding, StatusBar};
pub use table::{CellRender, Column, DataTable, GridRow, TableEvent, TableFrame, sorted_view};
pub use text_input::{TextInput, TextInputEvent};
pub use toast::{Toast, ToastKind, ToastManager};

use crate::theme::Theme;

/// Result of handling an input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventResult<E> {
    /// Input was not handled, parent should process it.
    Ignored,
    /// Input was consumed but produced no event.
    Consumed,
    /// Input was consumed and produced an event.
    Event(E),
}

impl<E> EventResult<E> {
    pub fn is_consumed(&self) -> bool {
        !matches!(self, EventResult::Ignored)
    }
}

impl<E> From<E> for EventResult<E> {
    fn from(event: E) -> Self {
        EventResult::Event(event)
    }
}

/// Interactive UI building block.
pub trait Component {
    /// The output type produced by this component.
    type Output;

    fn handle_key(&mut self, key: KeyEvent) -> Result<EventResult<Self::Output>> {
        _ = key;
        Ok(EventResult::Ignored)
    }

    /// Called on each tick for animations and time-based updates.
    fn handle_tick(&mut self) {}

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme);
}

/// Center a popup of the given size within `area`.
pub fn popup_area(area: Rect, width: Constraint, height: Constraint) -> Rect {
    let [area] = Layout::horizontal([width]).flex(Flex::Center).areas(area);
    let [area] = Layout::vertical([height]).flex(Flex::Center).areas(area);
    area
}
