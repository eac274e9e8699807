use std::collections::VecDeque;

use crossterm::event::KeyCode;
use ratatui::text::{Line, Span};
use tui_input::Input;
use tui_input::backend::crossterm::EventHandler;

use crate::message::{Event, IdGen, Tag};
use crate::theme;
use crate::unit::Unit;

/// Asks for the application name. Tab adopts the placeholder into an empty
/// field, Enter confirms (falling back to the placeholder); once confirmed
/// the unit freezes and ignores further keys. With an explicit name the unit
/// is constructed already confirmed and never consumes input.
pub struct PromptUnit {
    tag: Tag,
    input: Input,
    placeholder: String,
    done: bool,
}

impl PromptUnit {
    pub fn new(ids: &IdGen, placeholder: impl Into<String>) -> Self {
        Self {
            tag: ids.next(),
            input: Input::default(),
            placeholder: placeholder.into(),
            done: false,
        }
    }

    pub fn with_name(ids: &IdGen, name: impl Into<String>) -> Self {
        Self {
            tag: ids.next(),
            input: Input::new(name.into()),
            placeholder: String::new(),
            done: true,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn value(&self) -> &str {
        self.input.value()
    }
}

impl Unit for PromptUnit {
    fn update(&mut self, event: &Event, _queue: &mut VecDeque<Event>) {
        if self.done {
            return;
        }
        let Event::Key(key) = event else { return };

        match key.code {
            KeyCode::Tab => {
                if self.input.value().is_empty() {
                    self.input = Input::new(self.placeholder.clone());
                }
            }
            KeyCode::Enter => {
                if self.input.value().is_empty() {
                    self.input = Input::new(self.placeholder.clone());
                }
                self.done = true;
            }
            _ => {
                self.input
                    .handle_event(&crossterm::event::Event::Key(*key));
            }
        }
    }

    fn view(&self) -> Vec<Line<'static>> {
        let question = Line::styled("What should the application be called?", theme::focus_prompt());
        let answer = if self.input.value().is_empty() {
            Line::from(vec![
                Span::raw("> "),
                Span::styled(self.placeholder.clone(), theme::secondary_text()),
            ])
        } else {
            Line::from(format!("> {}", self.input.value()))
        };
        vec![question, answer]
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
