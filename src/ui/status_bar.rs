use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph};

use crate::theme::Theme;

/// A key hint shown in the status bar.
#[derive(Debug, Clone)]
pub struct Keybinding {
    pub key: String,
    pub description: String,
}

impl Keybinding {
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            description: description.into(),
        }
    }
}

/// Bottom bar: page tabs on the left, key hints on the right.
pub struct StatusBar;

impl StatusBar {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        theme: &Theme,
        tabs: &[&str],
        active: usize,
        hints: &[Keybinding],
    ) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(theme.surface1));
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(20), Constraint::Fill(1)])
            .split(inner);

        let mut tab_spans = vec![Span::raw(" ")];
        for (i, tab) in tabs.iter().enumerate() {
            if i > 0 {
                tab_spans.push(Span::styled("  ", Style::default()));
            }
            let style = if i == active {
                Style::default()
                    .fg(theme.lavender)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
            } else {
                Style::default().fg(theme.overlay1)
            };
            tab_spans.push(Span::styled(*tab, style));
        }
        frame.render_widget(Paragraph::new(Line::from(tab_spans)), chunks[0]);

        let mut hint_spans = Vec::new();
        for hint in hints {
            hint_spans.push(Span::styled(
                hint.key.clone(),
                Style::default().fg(theme.peach),
            ));
            hint_spans.push(Span::styled(
                format!(" {}  ", hint.description),
                Style::default().fg(theme.subtext0),
            ));
        }
        frame.render_widget(
            Paragraph::new(Line::from(hint_spans)).right_aligned(),
            chunks[1],
        );
    }
}
