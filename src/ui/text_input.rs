use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use crate::theme::Theme;

use super::{Component, EventResult, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInputEvent {
    /// Enter was pressed with the current value.
    Submitted(String),
    /// Esc was pressed.
    Cancelled,
}

/// Single-line text field used in login and modal forms.
pub struct TextInput {
    label: String,
    value: String,
    masked: bool,
    focused: bool,
}

impl TextInput {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: String::new(),
            masked: false,
            focused: false,
        }
    }

    /// Render the value as dots, for passwords.
    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn set_focused(&mut self, focused: bool) {
        self.focused = focused;
    }
}

impl Component for TextInput {
    type Output = TextInputEvent;

    fn handle_key(&mut self, key: KeyEvent) -> Result<EventResult<Self::Output>> {
        if !self.focused {
            return Ok(EventResult::Ignored);
        }
        match key.code {
            KeyCode::Enter => Ok(TextInputEvent::Submitted(self.value.clone()).into()),
            KeyCode::Esc => Ok(TextInputEvent::Cancelled.into()),
            KeyCode::Backspace => {
                self.value.pop();
                Ok(EventResult::Consumed)
            }
            KeyCode::Char(c) => {
                self.value.push(c);
                Ok(EventResult::Consumed)
            }
            _ => Ok(EventResult::Ignored),
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let border = if self.focused {
            Style::default().fg(theme.lavender)
        } else {
            Style::default().fg(theme.surface1)
        };

        let display = if self.masked {
            "•".repeat(self.value.chars().count())
        } else {
            self.value.clone()
        };

        let mut spans = vec![Span::styled(display, Style::default().fg(theme.text))];
        if self.focused {
            spans.push(Span::styled(
                "_",
                Style::default().fg(theme.lavender).add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        let block = Block::default()
            .title(format!(" {} ", self.label))
            .title_style(Style::default().fg(theme.subtext0))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(border);

        frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    #[test]
    fn ignores_keys_when_unfocused() {
        let mut input = TextInput::new("Username");
        assert_eq!(
            input.handle_key(key(KeyCode::Char('a'))).unwrap(),
            EventResult::Ignored
        );
        assert_eq!(input.value(), "");
    }

    #[test]
    fn edits_and_submits_when_focused() {
        let mut input = TextInput::new("Username");
        input.set_focused(true);
        input.handle_key(key(KeyCode::Char('a'))).unwrap();
        input.handle_key(key(KeyCode::Char('b'))).unwrap();
        input.handle_key(key(KeyCode::Backspace)).unwrap();
        assert_eq!(input.value(), "a");
        assert_eq!(
            input.handle_key(key(KeyCode::Enter)).unwrap(),
            EventResult::Event(TextInputEvent::Submitted("a".to_string()))
        );
    }
}
