pub mod build;
pub mod download;
pub mod message;
pub mod prompt;
pub mod screen;
mod theme;
pub mod unit;

use std::collections::VecDeque;
use std::io::{Stdout, stdout};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossterm::cursor::{Hide, Show};
use crossterm::event::{self, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::message::Event;
use crate::screen::NewScreen;

/// Idle poll window; a quiet terminal yields one tick per interval.
pub const TICK_RATE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuiExit {
    Completed,
    /// A unit failed; the screen can never complete, so the loop stops and
    /// the caller reports the failure outside the alternate screen.
    Failed,
    Canceled,
}

pub(crate) struct TerminalSession {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl TerminalSession {
    pub(crate) fn enter() -> Result<Self> {
        let terminal = enter_with_ops(
            || enable_raw_mode().context("failed to enable raw mode"),
            || {
                let mut out = stdout();
                execute!(out, EnterAlternateScreen, Hide)
                    .context("failed to enter alternate screen")
            },
            || {
                let backend = CrosstermBackend::new(stdout());
                Terminal::new(backend).context("failed to create terminal backend")
            },
            || {
                let mut out = stdout();
                execute!(out, Show, LeaveAlternateScreen)
                    .context("failed to restore terminal screen during rollback")
            },
            || disable_raw_mode().context("failed to disable raw mode during rollback"),
        )?;
        Ok(Self { terminal })
    }

    pub(crate) fn draw<F>(&mut self, draw_fn: F) -> Result<()>
    where
        F: FnOnce(&mut ratatui::Frame<'_>),
    {
        self.terminal
            .draw(draw_fn)
            .context("failed to render terminal")?;
        Ok(())
    }

    pub(crate) fn autoresize(&mut self) -> Result<()> {
        self.terminal
            .autoresize()
            .context("failed to autoresize terminal")?;
        Ok(())
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        let _ = execute!(self.terminal.backend_mut(), Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

fn enter_with_ops<T, EnableRawMode, EnterAltScreen, CreateTerminal, LeaveAltScreen, DisableRawMode>(
    mut enable_raw_mode_op: EnableRawMode,
    mut enter_alt_screen_op: EnterAltScreen,
    mut create_terminal_op: CreateTerminal,
    mut leave_alt_screen_op: LeaveAltScreen,
    mut disable_raw_mode_op: DisableRawMode,
) -> Result<T>
where
    EnableRawMode: FnMut() -> Result<()>,
    EnterAltScreen: FnMut() -> Result<()>,
    CreateTerminal: FnMut() -> Result<T>,
    LeaveAltScreen: FnMut() -> Result<()>,
    DisableRawMode: FnMut() -> Result<()>,
{
    enable_raw_mode_op()?;

    if let Err(error) = enter_alt_screen_op() {
        return Err(failure_with_rollback(
            error,
            false,
            &mut leave_alt_screen_op,
            &mut disable_raw_mode_op,
        ));
    }

    match create_terminal_op() {
        Ok(terminal) => Ok(terminal),
        Err(error) => Err(failure_with_rollback(
            error,
            true,
            &mut leave_alt_screen_op,
            &mut disable_raw_mode_op,
        )),
    }
}

fn failure_with_rollback<LeaveAltScreen, DisableRawMode>(
    setup_error: anyhow::Error,
    alt_screen_entered: bool,
    leave_alt_screen_op: &mut LeaveAltScreen,
    disable_raw_mode_op: &mut DisableRawMode,
) -> anyhow::Error
where
    LeaveAltScreen: FnMut() -> Result<()>,
    DisableRawMode: FnMut() -> Result<()>,
{
    let mut cleanup_failures = Vec::<String>::new();

    if alt_screen_entered && let Err(error) = leave_alt_screen_op() {
        cleanup_failures.push(format!("{error:#}"));
    }
    if let Err(error) = disable_raw_mode_op() {
        cleanup_failures.push(format!("{error:#}"));
    }

    if cleanup_failures.is_empty() {
        setup_error
    } else {
        anyhow!(
            "{setup_error:#}\nterminal rollback cleanup failed: {}",
            cleanup_failures.join("; ")
        )
    }
}

pub(crate) fn is_cancel(key: KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Drives the `new` screen until every unit reports done or the user cancels
/// with Ctrl-C. The queue is drained fully between draws, so follow-up events
/// a unit emits while applying a broadcast land in the same dispatch round.
pub fn run_new(screen: &mut NewScreen) -> Result<TuiExit> {
    let mut session = TerminalSession::enter()?;
    let mut queue = VecDeque::new();
    queue.push_back(Event::Tick);

    loop {
        while let Some(event) = queue.pop_front() {
            screen.update(&event, &mut queue);
            if screen.is_done() {
                session.draw(|frame| screen.render(frame))?;
                return Ok(TuiExit::Completed);
            }
            if screen.failed() {
                return Ok(TuiExit::Failed);
            }
        }
        session.draw(|frame| screen.render(frame))?;

        if !event::poll(TICK_RATE).context("failed to poll terminal events")? {
            queue.push_back(Event::Tick);
            continue;
        }
        match event::read().context("failed to read terminal event")? {
            event::Event::Key(key) if key.kind == KeyEventKind::Press => {
                if is_cancel(key) {
                    return Ok(TuiExit::Canceled);
                }
                queue.push_back(Event::Key(key));
            }
            event::Event::Resize(width, height) => {
                session.autoresize()?;
                queue.push_back(Event::Resize(width, height));
            }
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) fn unit_text(unit: &dyn crate::unit::Unit) -> String {
    unit.view()
        .iter()
        .flat_map(|line| line.spans.iter())
        .map(|span| span.content.clone().into_owned())
        .collect()
}
