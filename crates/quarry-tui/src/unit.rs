use std::collections::VecDeque;

use ratatui::text::Line;

use crate::message::Event;

/// The composition seam every screen component implements. The composer
/// forwards each inbound event to all units unconditionally; a unit applies
/// what is addressed to it and may queue follow-up events for the next
/// dispatch round.
pub trait Unit {
    fn update(&mut self, event: &Event, queue: &mut VecDeque<Event>);

    /// Lines stacked by the composer, top to bottom.
    fn view(&self) -> Vec<Line<'static>>;

    fn is_done(&self) -> bool;
}
