use std::collections::VecDeque;
use std::time::{Duration, Instant};

use ratatui::Frame;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

use crate::theme::Theme;

use super::Component;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Info,
    Error,
}

pub struct Toast {
    message: String,
    kind: ToastKind,
    created_at: Instant,
    duration: Duration,
}

impl Toast {
    pub fn new(message: impl Into<String>, kind: ToastKind) -> Self {
        Self {
            message: message.into(),
            kind,
            created_at: Instant::now(),
            duration: Duration::from_secs(3),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Success)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Info)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(message, ToastKind::Error)
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.duration
    }
}

/// Stacks short-lived notifications in the bottom-right corner.
pub struct ToastManager {
    toasts: VecDeque<Toast>,
    max_visible: usize,
}

impl Default for ToastManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastManager {
    pub fn new() -> Self {
        Self {
            toasts: VecDeque::new(),
            max_visible: 3,
        }
    }

    pub fn show(&mut self, toast: Toast) {
        self.toasts.push_back(toast);
        while self.toasts.len() > self.max_visible {
            self.toasts.pop_front();
        }
    }
}

impl Component for ToastManager {
    type Output = ();

    fn handle_tick(&mut self) {
        self.toasts.retain(|t| !t.is_expired());
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        if self.toasts.is_empty() {
            return;
        }

        let toast_height = 3u16;
        let toast_width = 50u16.min(area.width.saturating_sub(4));
        let spacing = 1u16;

        // Newest at the bottom, stacking upward.
        for (i, toast) in self.toasts.iter().rev().enumerate() {
            let y_offset = (i as u16) * (toast_height + spacing);
            let y = area.y + area.height.saturating_sub(toast_height + y_offset + 1);
            let x = area.x + area.width.saturating_sub(toast_width + 2);

            if y < area.y {
                break;
            }

            let toast_area = Rect::new(x, y, toast_width, toast_height);

            let (border_color, icon) = match toast.kind {
                ToastKind::Success => (theme.green, "✓"),
                ToastKind::Info => (theme.blue, "ℹ"),
                ToastKind::Error => (theme.red, "✗"),
            };

            frame.render_widget(Clear, toast_area);

            let block = Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color))
                .style(Style::default().bg(theme.surface0));

            let inner = block.inner(toast_area);
            frame.render_widget(block, toast_area);

            let paragraph = Paragraph::new(format!("{} {}", icon, toast.message))
                .style(Style::default().fg(theme.text).add_modifier(Modifier::BOLD))
                .alignment(Alignment::Center);

            frame.render_widget(paragraph, inner);
        }
    }
}
