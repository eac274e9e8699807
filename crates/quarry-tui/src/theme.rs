use ratatui::style::{Color, Modifier, Style};

pub(crate) const FRAMES: [&str; 8] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧"];

pub(crate) const CHECK_MARK: &str = "✓";

#[derive(Debug, Clone, Default)]
pub(crate) struct SpinnerState {
    frame_index: usize,
}

impl SpinnerState {
    pub(crate) fn next_frame(&mut self) {
        self.frame_index = (self.frame_index + 1) % FRAMES.len();
    }

    pub(crate) fn current_frame(&self) -> &'static str {
        FRAMES[self.frame_index]
    }
}

pub(crate) fn accent() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

pub(crate) fn focus_prompt() -> Style {
    Style::default()
        .fg(Color::Blue)
        .add_modifier(Modifier::BOLD)
}

pub(crate) fn success_prompt() -> Style {
    Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD)
}

pub(crate) fn error_text() -> Style {
    Style::default().fg(Color::Red)
}

pub(crate) fn secondary_text() -> Style {
    Style::default().fg(Color::Gray).add_modifier(Modifier::DIM)
}
