use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use quarry_core::archive::{self, ArchiveFormat};
use quarry_core::fetch::Transfer;
use quarry_core::stream::{ProgressReader, chunk_pipe};
use ratatui::text::{Line, Span};

use crate::message::{Event, IdGen, Tag};
use crate::theme;
use crate::unit::Unit;

/// How long a finished progress bar lingers at 100% before the unit reports
/// done and the next phase is scheduled.
pub const SETTLE_DELAY: Duration = Duration::from_millis(750);

const PROGRESS_DEPTH: usize = 64;
const CHUNK_DEPTH: usize = 16;
const BAR_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DownloadState {
    Idle,
    Transferring,
    Settling,
    Done,
    Failed,
}

enum ExtractNotice {
    Root(PathBuf),
    Finished(Result<(), String>),
}

/// Streams the tarball body through a bounded chunk pipe into a concurrent
/// extractor, surfacing progress and completion as tagged events on each
/// tick. The transfer and the extractor run on their own threads; this unit
/// only drains their channels.
pub struct DownloadUnit {
    tag: Tag,
    what: String,
    state: DownloadState,
    settle: Duration,
    settle_until: Option<Instant>,
    ratio: f64,
    width: u16,
    error: Option<String>,
    source_root: Option<PathBuf>,
    progress_rx: Option<Receiver<f64>>,
    outcome_rx: Option<Receiver<Result<(), String>>>,
    extract_rx: Option<Receiver<ExtractNotice>>,
}

impl DownloadUnit {
    pub fn new(ids: &IdGen, what: impl Into<String>) -> Self {
        Self::with_settle(ids, what, SETTLE_DELAY)
    }

    pub fn with_settle(ids: &IdGen, what: impl Into<String>, settle: Duration) -> Self {
        Self {
            tag: ids.next(),
            what: what.into(),
            state: DownloadState::Idle,
            settle,
            settle_until: None,
            ratio: 0.0,
            width: 0,
            error: None,
            source_root: None,
            progress_rx: None,
            outcome_rx: None,
            extract_rx: None,
        }
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn source_root(&self) -> Option<&Path> {
        self.source_root.as_deref()
    }

    pub fn failed(&self) -> bool {
        self.state == DownloadState::Failed
    }

    /// Puts the unit into the transferring state without spawning workers.
    #[cfg(test)]
    pub(crate) fn mark_transferring(&mut self) {
        self.state = DownloadState::Transferring;
    }

    /// Starts the transfer copy and the extractor. The copy thread pushes the
    /// body through the chunk pipe and reports its outcome before the
    /// progress sender drops, so a closed progress channel always has a
    /// terminal outcome waiting.
    pub fn begin(&mut self, transfer: Transfer, sources_dir: PathBuf) {
        let (progress_tx, progress_rx) = mpsc::sync_channel(PROGRESS_DEPTH);
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let (extract_tx, extract_rx) = mpsc::channel();
        let (mut writer, chunks) = chunk_pipe(CHUNK_DEPTH);

        let filename = transfer.filename.clone();
        thread::spawn(move || {
            let result = match ArchiveFormat::identify(&filename) {
                Ok(format) => {
                    let root_tx = extract_tx.clone();
                    archive::extract(
                        format,
                        chunks,
                        &sources_dir,
                        |_| true,
                        |root| {
                            let _ = root_tx.send(ExtractNotice::Root(root.to_path_buf()));
                        },
                    )
                    .map_err(|error| error.to_string())
                }
                Err(error) => Err(error.to_string()),
            };
            let _ = extract_tx.send(ExtractNotice::Finished(result));
        });

        let total = transfer.total;
        let body = transfer.body;
        thread::spawn(move || {
            let mut reader = ProgressReader::new(body, total, progress_tx);
            let result = io::copy(&mut reader, &mut writer)
                .map(|_| ())
                .map_err(|error| error.to_string());
            drop(writer);
            let _ = outcome_tx.send(result);
        });

        self.progress_rx = Some(progress_rx);
        self.outcome_rx = Some(outcome_rx);
        self.extract_rx = Some(extract_rx);
        self.state = DownloadState::Transferring;
    }

    fn drain(&mut self, queue: &mut VecDeque<Event>) {
        if let Some(rx) = &self.progress_rx {
            let mut close = false;
            loop {
                match rx.try_recv() {
                    Ok(ratio) => queue.push_back(Event::Progress {
                        tag: self.tag,
                        ratio,
                    }),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        close = true;
                        break;
                    }
                }
            }
            if close {
                // The copy reports its outcome before the progress sender
                // drops, so the terminal result is already waiting here.
                let error = match self.outcome_rx.take().map(|rx| rx.try_recv()) {
                    Some(Ok(Ok(()))) => None,
                    Some(Ok(Err(message))) => Some(message),
                    _ => Some("transfer ended unexpectedly".to_string()),
                };
                queue.push_back(Event::TransferClosed {
                    tag: self.tag,
                    error,
                });
                self.progress_rx = None;
            }
        }

        if let Some(rx) = &self.extract_rx {
            let mut close = false;
            loop {
                match rx.try_recv() {
                    Ok(ExtractNotice::Root(root)) => queue.push_back(Event::SourceRooted {
                        tag: self.tag,
                        root,
                    }),
                    Ok(ExtractNotice::Finished(result)) => {
                        queue.push_back(Event::ExtractClosed {
                            tag: self.tag,
                            error: result.err(),
                        });
                        close = true;
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        queue.push_back(Event::ExtractClosed {
                            tag: self.tag,
                            error: Some("extraction ended unexpectedly".to_string()),
                        });
                        close = true;
                        break;
                    }
                }
            }
            if close {
                self.extract_rx = None;
            }
        }
    }

    fn begin_settling(&mut self) {
        self.state = DownloadState::Settling;
        self.settle_until = Some(Instant::now() + self.settle);
    }

    /// Dropping the receivers tears the worker pipeline down: the copy hits a
    /// broken pipe on its next write and the transfer body is released.
    fn fail(&mut self, message: String) {
        self.state = DownloadState::Failed;
        self.error = Some(message);
        self.progress_rx = None;
        self.outcome_rx = None;
        self.extract_rx = None;
    }
}

impl Unit for DownloadUnit {
    fn update(&mut self, event: &Event, queue: &mut VecDeque<Event>) {
        match event {
            Event::Tick => {
                self.drain(queue);
                if self.state == DownloadState::Settling
                    && let Some(until) = self.settle_until
                    && Instant::now() >= until
                {
                    self.state = DownloadState::Done;
                }
            }
            Event::Resize(width, _) => self.width = *width,
            Event::Progress { tag, ratio } if tag.matches(self.tag) => {
                if self.state == DownloadState::Transferring {
                    if *ratio > self.ratio {
                        self.ratio = *ratio;
                    }
                    if self.ratio >= 1.0 {
                        self.begin_settling();
                    }
                }
            }
            Event::TransferClosed { tag, error } if tag.matches(self.tag) => match error {
                Some(message) => self.fail(message.clone()),
                None => {
                    // Unknown-length transfers emit no ratios; a clean close
                    // is the only completion signal they get.
                    if self.state == DownloadState::Transferring {
                        self.ratio = 1.0;
                        self.begin_settling();
                    }
                }
            },
            Event::SourceRooted { tag, root } if tag.matches(self.tag) => {
                self.source_root = Some(root.clone());
            }
            Event::ExtractClosed { tag, error } if tag.matches(self.tag) => {
                if let Some(message) = error {
                    self.fail(format!("extraction failed: {message}"));
                }
            }
            _ => {}
        }
    }

    fn view(&self) -> Vec<Line<'static>> {
        if let Some(error) = &self.error {
            return vec![Line::styled(
                format!("Error downloading {}: {error}", self.what),
                theme::error_text(),
            )];
        }
        if self.state == DownloadState::Idle {
            return Vec::new();
        }

        let width = bar_width(self.width);
        let percent = (self.ratio * 100.0).round() as u16;
        vec![Line::from(vec![
            Span::raw(format!("Downloading {} ", self.what)),
            Span::styled(progress_bar(self.ratio, width), theme::accent()),
            Span::raw(format!(" {percent:>3}%")),
        ])]
    }

    fn is_done(&self) -> bool {
        self.state == DownloadState::Done
    }
}

fn bar_width(terminal_width: u16) -> usize {
    if terminal_width == 0 {
        return BAR_WIDTH;
    }
    BAR_WIDTH.min(usize::from(terminal_width).saturating_sub(20).max(10))
}

fn progress_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * width as f64).round() as usize;
    let mut bar = String::new();
    for slot in 0..width {
        bar.push(if slot < filled { '█' } else { '░' });
    }
    bar
}
