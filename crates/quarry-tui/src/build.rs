use std::collections::VecDeque;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use ratatui::text::Line;

use crate::message::{Event, IdGen, Tag};
use crate::theme::{self, SpinnerState};
use crate::unit::Unit;

/// Lines of build output shown while a stage is running; the first slot is
/// taken by the spinner status line.
pub const TAIL_LINES: usize = 6;

const RETAINED_LINES: usize = 10_000;
const LINE_CHANNEL_DEPTH: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

/// The two-stage build: configure must exit zero before compile is spawned.
/// Injected through the `BuildStart` event so the commands stay testable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub build_dir: PathBuf,
    pub configure: CommandSpec,
    pub compile: CommandSpec,
}

impl BuildPlan {
    pub fn cmake(source_dir: &Path, pg_dir: &Path) -> Self {
        let build_dir = source_dir.join("build");
        Self {
            configure: CommandSpec::new(
                "cmake",
                [
                    source_dir.display().to_string(),
                    "-B".to_string(),
                    build_dir.display().to_string(),
                    "-DCMAKE_BUILD_TYPE=Release".to_string(),
                    format!("-DPGDIR={}", pg_dir.display()),
                ],
            ),
            compile: CommandSpec::new(
                "cmake",
                [
                    "--build".to_string(),
                    build_dir.display().to_string(),
                    "--parallel".to_string(),
                ],
            ),
            build_dir,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    NotStarted,
    Configuring,
    Compiling,
    Built,
    Errored,
}

/// Runs the build stages as child processes, scanning merged stdout line by
/// line on a background thread. The scanner's channel closing is the only
/// end-of-stream signal; the exit status is collected after that.
pub struct BuildUnit {
    tag: Tag,
    what: String,
    state: BuildState,
    spinner: SpinnerState,
    lines: VecDeque<String>,
    plan: Option<BuildPlan>,
    child: Option<Child>,
    line_rx: Option<Receiver<String>>,
    failure: Option<String>,
}

impl BuildUnit {
    pub fn new(ids: &IdGen, what: impl Into<String>) -> Self {
        Self {
            tag: ids.next(),
            what: what.into(),
            state: BuildState::NotStarted,
            spinner: SpinnerState::default(),
            lines: VecDeque::new(),
            plan: None,
            child: None,
            line_rx: None,
            failure: None,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn succeeded(&self) -> bool {
        self.state == BuildState::Built
    }

    pub fn retained_line_count(&self) -> usize {
        self.lines.len()
    }

    fn start(&mut self, plan: BuildPlan) {
        if let Err(error) = fs::create_dir_all(&plan.build_dir) {
            self.errored(format!(
                "failed to create build directory {}: {error}",
                plan.build_dir.display()
            ));
            return;
        }
        match self.spawn_stage(&plan.configure) {
            Ok(()) => {
                self.plan = Some(plan);
                self.state = BuildState::Configuring;
            }
            Err(message) => self.errored(message),
        }
    }

    fn spawn_stage(&mut self, spec: &CommandSpec) -> Result<(), String> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        // The child leads its own process group so terminal signals aimed at
        // this program do not reach it directly.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .map_err(|error| format!("failed to run {}: {error}", spec.program))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| format!("{} gave no output pipe", spec.program))?;

        let (line_tx, line_rx) = mpsc::sync_channel(LINE_CHANNEL_DEPTH);
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if line_tx.send(line).is_err() {
                    break;
                }
            }
        });

        self.child = Some(child);
        self.line_rx = Some(line_rx);
        Ok(())
    }

    fn drain(&mut self, queue: &mut VecDeque<Event>) {
        let Some(rx) = &self.line_rx else { return };

        let mut batch = Vec::new();
        let mut open = true;
        loop {
            match rx.try_recv() {
                Ok(line) => batch.push(line),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    open = false;
                    break;
                }
            }
        }

        if !open {
            self.line_rx = None;
        }
        if !batch.is_empty() || !open {
            queue.push_back(Event::BuildLines {
                tag: self.tag,
                lines: batch,
                open,
            });
        }
    }

    fn absorb(&mut self, lines: &[String], open: bool) {
        for line in lines {
            if self.lines.len() == RETAINED_LINES {
                self.lines.pop_front();
            }
            self.lines.push_back(line.clone());
        }
        if !open {
            self.finish_stage();
        }
    }

    fn finish_stage(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        let status = match child.wait() {
            Ok(status) => status,
            Err(error) => {
                self.errored(format!("failed to collect build status: {error}"));
                return;
            }
        };
        if !status.success() {
            let stage = match self.state {
                BuildState::Configuring => "configure",
                _ => "compile",
            };
            self.errored(format!("{stage} stage {status}"));
            return;
        }

        match self.state {
            BuildState::Configuring => {
                let Some(compile) = self.plan.as_ref().map(|plan| plan.compile.clone()) else {
                    return;
                };
                match self.spawn_stage(&compile) {
                    Ok(()) => self.state = BuildState::Compiling,
                    Err(message) => self.errored(message),
                }
            }
            BuildState::Compiling => {
                self.lines.clear();
                self.state = BuildState::Built;
            }
            _ => {}
        }
    }

    fn errored(&mut self, message: String) {
        self.state = BuildState::Errored;
        self.failure = Some(message);
        self.line_rx = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Unit for BuildUnit {
    fn update(&mut self, event: &Event, queue: &mut VecDeque<Event>) {
        match event {
            Event::Tick => {
                self.spinner.next_frame();
                self.drain(queue);
            }
            Event::BuildStart { tag, plan } if tag.matches(self.tag) => {
                if self.state == BuildState::NotStarted {
                    self.start(plan.clone());
                }
            }
            Event::BuildLines { tag, lines, open } if tag.matches(self.tag) => {
                self.absorb(lines, *open);
            }
            _ => {}
        }
    }

    fn view(&self) -> Vec<Line<'static>> {
        match self.state {
            BuildState::NotStarted => Vec::new(),
            BuildState::Built => vec![Line::styled(
                format!("{} Built {}", theme::CHECK_MARK, self.what),
                theme::success_prompt(),
            )],
            BuildState::Errored => {
                let failure = self.failure.as_deref().unwrap_or("build failed");
                let mut out = vec![Line::styled(
                    format!("Error building {}: {failure}", self.what),
                    theme::error_text(),
                )];
                // Full scrollback, not the tail: the failing line is usually
                // well above the last output.
                out.extend(
                    self.lines
                        .iter()
                        .map(|line| Line::styled(line.clone(), theme::error_text())),
                );
                out
            }
            BuildState::Configuring | BuildState::Compiling => {
                let mut out = vec![Line::styled(
                    format!(
                        " {} Building {}, this may take a while",
                        self.spinner.current_frame(),
                        self.what
                    ),
                    theme::accent(),
                )];
                let tail = self.lines.len().saturating_sub(TAIL_LINES - 1);
                out.extend(
                    self.lines
                        .iter()
                        .skip(tail)
                        .map(|line| Line::styled(line.clone(), theme::secondary_text())),
                );
                out
            }
        }
    }

    fn is_done(&self) -> bool {
        self.state == BuildState::Built
    }
}
