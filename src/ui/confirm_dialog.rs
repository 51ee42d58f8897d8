use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap};

use crate::theme::Theme;

use super::{Component, EventResult, Result, popup_area};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmEvent {
    Confirmed,
    Cancelled,
}

/// Yes/no modal for destructive or state-changing actions.
pub struct ConfirmDialog {
    title: String,
    message: String,
    danger: bool,
}

impl ConfirmDialog {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            danger: false,
        }
    }

    /// Red accents for deletes and other irreversible actions.
    pub fn danger(mut self) -> Self {
        self.danger = true;
        self
    }
}

impl Component for ConfirmDialog {
    type Output = ConfirmEvent;

    fn handle_key(&mut self, key: KeyEvent) -> Result<EventResult<Self::Output>> {
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                Ok(ConfirmEvent::Confirmed.into())
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                Ok(ConfirmEvent::Cancelled.into())
            }
            _ => Ok(EventResult::Consumed),
        }
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let popup = popup_area(area, Constraint::Percentage(50), Constraint::Length(8));

        frame.render_widget(Clear, popup);

        let accent = if self.danger { theme.red } else { theme.mauve };

        let lines = vec![
            Line::from(""),
            Line::from(Span::styled(
                &self.message,
                Style::default().fg(theme.text),
            )),
            Line::from(""),
            Line::from(vec![
                Span::styled("y", Style::default().fg(theme.green).add_modifier(Modifier::BOLD)),
                Span::styled(" confirm   ", Style::default().fg(theme.overlay1)),
                Span::styled("n", Style::default().fg(theme.red).add_modifier(Modifier::BOLD)),
                Span::styled("/Esc cancel", Style::default().fg(theme.overlay1)),
            ]),
        ];

        let block = Block::default()
            .title(format!(" {} ", self.title))
            .title_style(Style::default().fg(accent).add_modifier(Modifier::BOLD))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(accent))
            .style(Style::default().bg(theme.base));

        let paragraph = Paragraph::new(lines)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });

        frame.render_widget(paragraph, popup);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::from(code)
    }

    #[test]
    fn confirm_and_cancel_keys() {
        let mut dialog = ConfirmDialog::new("Delete group", "Really delete?").danger();
        assert_eq!(
            dialog.handle_key(key(KeyCode::Char('y'))).unwrap(),
            EventResult::Event(ConfirmEvent::Confirmed)
        );
        assert_eq!(
            dialog.handle_key(key(KeyCode::Esc)).unwrap(),
            EventResult::Event(ConfirmEvent::Cancelled)
        );
        assert_eq!(
            dialog.handle_key(key(KeyCode::Char('x'))).unwrap(),
            EventResult::Consumed
        );
    }
}
