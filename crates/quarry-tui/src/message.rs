use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crossterm::event::KeyEvent;

use crate::build::BuildPlan;

/// Ownership tag stamped on every unit-sourced event. Units receive the full
/// broadcast stream and drop events carrying a foreign tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tag(u64);

impl Tag {
    pub fn matches(self, other: Tag) -> bool {
        self == other
    }
}

/// Injectable tag generator. Clones share the counter, so every unit built
/// from the same generator (on any thread) gets a process-unique identity.
#[derive(Debug, Clone, Default)]
pub struct IdGen {
    next: Arc<AtomicU64>,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Tag {
        Tag(self.next.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// Everything that flows through the screen's single event queue: terminal
/// input, the redraw tick, and the tagged events units surface from their
/// background channels.
#[derive(Debug, Clone)]
pub enum Event {
    Tick,
    Key(KeyEvent),
    Resize(u16, u16),
    /// Fractional download progress in [0, 1].
    Progress { tag: Tag, ratio: f64 },
    /// The transfer's progress channel closed; `error` carries the
    /// terminating failure, if any.
    TransferClosed { tag: Tag, error: Option<String> },
    /// The extractor identified the archive's top-level directory.
    SourceRooted { tag: Tag, root: PathBuf },
    /// Extraction finished, successfully or not.
    ExtractClosed { tag: Tag, error: Option<String> },
    /// Schedules the build unit's configure stage.
    BuildStart { tag: Tag, plan: BuildPlan },
    /// A drained batch of subprocess stdout lines; `open` is false once the
    /// scanner's channel has closed.
    BuildLines {
        tag: Tag,
        lines: Vec<String>,
        open: bool,
    },
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::IdGen;

    #[test]
    fn tags_are_unique_across_clones_and_threads() {
        let ids = IdGen::new();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ids = ids.clone();
            handles.push(std::thread::spawn(move || {
                (0..250).map(|_| ids.next()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for tag in handle.join().expect("generator thread") {
                assert!(seen.insert(tag), "tag issued twice");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn matches_is_plain_equality() {
        let ids = IdGen::new();
        let first = ids.next();
        let second = ids.next();

        assert!(first.matches(first));
        assert!(!first.matches(second));
    }
}
