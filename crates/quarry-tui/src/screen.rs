use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use ratatui::Frame;
use ratatui::text::{Line, Text};
use ratatui::widgets::Paragraph;

use quarry_core::fetch::Transfer;

use crate::build::{BuildPlan, BuildState, BuildUnit};
use crate::download::DownloadUnit;
use crate::message::{Event, IdGen};
use crate::prompt::PromptUnit;
use crate::theme;
use crate::unit::Unit;

pub struct ScreenParams {
    /// Display label for the thing being fetched and built.
    pub what: String,
    /// Skips download and build entirely; the revision is already cached.
    pub cache_hit: bool,
    pub name_placeholder: String,
    pub name_flag: Option<String>,
    pub pg_dir: PathBuf,
    pub settle: Duration,
    /// Overrides the cmake plan; the build directory still comes from the
    /// plan itself.
    pub build_plan: Option<BuildPlan>,
}

/// Composes the three units of the `new` flow. Every event is forwarded to
/// every unit; the units filter by tag themselves. The composer's only cross-
/// unit knowledge is phase scheduling: once the download settles and the
/// source root is known, it queues a single `BuildStart`.
pub struct NewScreen {
    download: DownloadUnit,
    build: BuildUnit,
    prompt: PromptUnit,
    cache_hit: bool,
    pg_dir: PathBuf,
    plan_override: Option<BuildPlan>,
    build_scheduled: bool,
}

impl NewScreen {
    pub fn new(ids: &IdGen, params: ScreenParams) -> Self {
        let prompt = match params.name_flag {
            Some(name) => PromptUnit::with_name(ids, name),
            None => PromptUnit::new(ids, params.name_placeholder),
        };
        Self {
            download: DownloadUnit::with_settle(ids, params.what.clone(), params.settle),
            build: BuildUnit::new(ids, params.what),
            prompt,
            cache_hit: params.cache_hit,
            pg_dir: params.pg_dir,
            plan_override: params.build_plan,
            build_scheduled: false,
        }
    }

    pub fn begin_download(&mut self, transfer: Transfer, sources_dir: PathBuf) {
        self.download.begin(transfer, sources_dir);
    }

    pub fn update(&mut self, event: &Event, queue: &mut VecDeque<Event>) {
        self.download.update(event, queue);
        self.build.update(event, queue);
        self.prompt.update(event, queue);
        self.maybe_schedule_build(queue);
    }

    fn maybe_schedule_build(&mut self, queue: &mut VecDeque<Event>) {
        if self.cache_hit || self.build_scheduled || !self.download.is_done() {
            return;
        }
        let Some(root) = self.download.source_root() else {
            return;
        };
        let plan = match &self.plan_override {
            Some(plan) => plan.clone(),
            None => BuildPlan::cmake(root, &self.pg_dir),
        };
        self.build_scheduled = true;
        queue.push_back(Event::BuildStart {
            tag: self.build.tag(),
            plan,
        });
    }

    /// Finished units drop out of the stack; what remains is the live work
    /// plus the prompt, or just the prompt on a cache hit.
    pub fn view(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        if !self.cache_hit {
            for unit in [&self.build as &dyn Unit, &self.download] {
                if !unit.is_done() {
                    lines.extend(unit.view());
                }
            }
        }
        if !self.prompt.is_done() {
            if !lines.is_empty() {
                lines.push(Line::raw(""));
            }
            lines.extend(self.prompt.view());
        }
        if lines.is_empty() {
            lines.push(Line::styled(
                format!("{} Ready", theme::CHECK_MARK),
                theme::success_prompt(),
            ));
        }
        lines
    }

    pub fn render(&self, frame: &mut Frame<'_>) {
        let paragraph = Paragraph::new(Text::from(self.view()));
        frame.render_widget(paragraph, frame.area());
    }

    pub fn is_done(&self) -> bool {
        self.prompt.is_done()
            && (self.cache_hit || (self.download.is_done() && self.build.is_done()))
    }

    /// A failed unit never reports done, so the screen can only idle; the
    /// caller uses this to surface the failure and stop.
    pub fn failed(&self) -> bool {
        self.download.failed() || self.build.state() == BuildState::Errored
    }

    /// Plain-text rendering of the failed units, for reporting after the
    /// alternate screen has been torn down.
    pub fn failure_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.download.failed() {
            out.extend(line_strings(self.download.view()));
        }
        if self.build.state() == BuildState::Errored {
            out.extend(line_strings(self.build.view()));
        }
        out
    }

    pub fn project_name(&self) -> &str {
        self.prompt.value()
    }

    pub fn build_succeeded(&self) -> bool {
        self.build.succeeded()
    }
}

fn line_strings(lines: Vec<Line<'static>>) -> Vec<String> {
    lines
        .into_iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::time::Duration;

    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    use crate::message::{Event, IdGen};

    use super::{NewScreen, ScreenParams};

    fn params(cache_hit: bool) -> ScreenParams {
        ScreenParams {
            what: "runtime".to_string(),
            cache_hit,
            name_placeholder: "demo".to_string(),
            name_flag: None,
            pg_dir: PathBuf::from("/tmp/quarry-pg"),
            settle: Duration::from_millis(0),
            build_plan: None,
        }
    }

    fn press(screen: &mut NewScreen, code: KeyCode) {
        let mut queue = VecDeque::new();
        screen.update(
            &Event::Key(KeyEvent::new(code, KeyModifiers::NONE)),
            &mut queue,
        );
    }

    #[test]
    fn cache_hit_screen_is_done_once_the_prompt_confirms() {
        let ids = IdGen::new();
        let mut screen = NewScreen::new(&ids, params(true));

        assert!(!screen.is_done());
        press(&mut screen, KeyCode::Enter);

        assert!(screen.is_done());
        assert_eq!(screen.project_name(), "demo");
        assert!(!screen.build_succeeded());
    }

    #[test]
    fn cache_hit_view_shows_only_the_prompt() {
        let ids = IdGen::new();
        let screen = NewScreen::new(&ids, params(true));

        let rendered = screen
            .view()
            .iter()
            .flat_map(|line| line.spans.iter())
            .map(|span| span.content.clone().into_owned())
            .collect::<String>();
        assert!(rendered.contains("What should the application be called?"));
        assert!(!rendered.contains("Downloading"));
    }

    #[test]
    fn confirmed_prompt_alone_does_not_finish_a_miss() {
        let ids = IdGen::new();
        let mut screen = NewScreen::new(&ids, params(false));

        press(&mut screen, KeyCode::Enter);

        assert!(!screen.is_done());
    }

    #[test]
    fn build_is_scheduled_once_after_download_settles_with_a_root() {
        let ids = IdGen::new();
        let mut screen = NewScreen::new(&ids, params(false));
        let mut queue = VecDeque::new();
        let tag = screen.download.tag();
        screen.download.mark_transferring();

        screen.update(
            &Event::SourceRooted {
                tag,
                root: PathBuf::from("/tmp/quarry-sources/rt-0cc8d8c"),
            },
            &mut queue,
        );
        assert!(queue.is_empty(), "build scheduled before download settled");

        screen.update(&Event::Progress { tag, ratio: 1.0 }, &mut queue);
        screen.update(&Event::Tick, &mut queue);

        let start = queue.iter().find_map(|event| match event {
            Event::BuildStart { plan, .. } => Some(plan.clone()),
            _ => None,
        });
        let plan = start.expect("build start queued");
        assert_eq!(
            plan.build_dir,
            PathBuf::from("/tmp/quarry-sources/rt-0cc8d8c/build")
        );
        assert!(
            plan.configure
                .args
                .iter()
                .any(|arg| arg == "-DPGDIR=/tmp/quarry-pg")
        );

        // Further ticks must not schedule it again.
        let mut later = VecDeque::new();
        screen.update(&Event::Tick, &mut later);
        assert!(
            !later
                .iter()
                .any(|event| matches!(event, Event::BuildStart { .. }))
        );
    }

    #[test]
    fn download_failure_marks_the_screen_failed_and_never_done() {
        let ids = IdGen::new();
        let mut screen = NewScreen::new(&ids, params(false));
        let mut queue = VecDeque::new();
        screen.download.mark_transferring();

        screen.update(
            &Event::TransferClosed {
                tag: screen.download.tag(),
                error: Some("connection reset".to_string()),
            },
            &mut queue,
        );
        press(&mut screen, KeyCode::Enter);

        assert!(screen.failed());
        assert!(!screen.is_done());
    }
}
