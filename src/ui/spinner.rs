use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::Style;
use throbber_widgets_tui::{BRAILLE_SIX, Throbber, ThrobberState, WhichUse};

use crate::theme::Theme;

use super::Component;

/// Small animated busy indicator, advanced on app ticks.
pub struct Spinner {
    label: String,
    state: ThrobberState,
}

impl Spinner {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            state: ThrobberState::default(),
        }
    }
}

impl Component for Spinner {
    type Output = ();

    fn handle_tick(&mut self) {
        self.state.calc_next();
    }

    fn render(&mut self, frame: &mut Frame, area: Rect, theme: &Theme) {
        let throbber = Throbber::default()
            .label(self.label.clone())
            .style(Style::default().fg(theme.subtext0))
            .throbber_style(Style::default().fg(theme.mauve))
            .throbber_set(BRAILLE_SIX)
            .use_type(WhichUse::Spin);
        frame.render_stateful_widget(throbber, area, &mut self.state);
    }
}
