//! Structured progress events emitted by the integration pipeline.
//!
//! The orchestrator reports its lifecycle through a caller-supplied
//! [`ProgressSink`] instead of printing directly, so the CLI can drive a
//! spinner while tests record the exact event sequence. The sink is a plain
//! sync trait; event delivery must never block the pipeline on I/O.

use std::fmt;
use std::sync::Mutex;

/// A pipeline stage. Stages are reported in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Locator parsing and context construction.
    Resolve,
    /// Cache reconciliation (clone/update/local no-op).
    Sync,
    /// Manifest loading and mode detection.
    Manifest,
    /// npm dependency reconciliation and install.
    Dependencies,
    /// Primary block file generation.
    Generate,
    /// Concurrent sub-block generation.
    SubBlocks,
    /// Route entry injection.
    Route,
    /// Container import injection.
    Container,
    /// Advisory view URL computation.
    ViewUrl,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Resolve => "resolve source",
            Self::Sync => "sync repository",
            Self::Manifest => "read manifest",
            Self::Dependencies => "install dependencies",
            Self::Generate => "generate block",
            Self::SubBlocks => "generate sub-blocks",
            Self::Route => "write route",
            Self::Container => "update container",
            Self::ViewUrl => "compute view url",
        };
        f.write_str(label)
    }
}

/// One event in the pipeline's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageEvent {
    /// The stage has begun.
    StageStarted {
        stage: Stage,
        /// Human-readable detail, e.g. the URL being cloned.
        detail: String,
    },
    /// The stage completed successfully.
    StageSucceeded {
        stage: Stage,
        detail: String,
    },
    /// The stage failed. For fatal stages the pipeline stops here.
    StageFailed {
        stage: Stage,
        error: String,
    },
}

impl StageEvent {
    /// The stage this event belongs to.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            Self::StageStarted { stage, .. }
            | Self::StageSucceeded { stage, .. }
            | Self::StageFailed { stage, .. } => *stage,
        }
    }
}

impl fmt::Display for StageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StageStarted { stage, detail } if detail.is_empty() => {
                write!(f, "{stage}...")
            }
            Self::StageStarted { stage, detail } => write!(f, "{stage}: {detail}..."),
            Self::StageSucceeded { stage, detail } if detail.is_empty() => {
                write!(f, "{stage}: done")
            }
            Self::StageSucceeded { stage, detail } => write!(f, "{stage}: {detail}"),
            Self::StageFailed { stage, error } => write!(f, "{stage}: failed: {error}"),
        }
    }
}

/// Receives pipeline events. Implementations must be cheap and non-blocking.
pub trait ProgressSink: Send + Sync {
    /// Called once per event, in pipeline order.
    fn emit(&self, event: &StageEvent);
}

/// Discards all events.
#[derive(Debug, Default)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn emit(&self, _event: &StageEvent) {}
}

/// Records every event in order. Test instrumentation.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<StageEvent>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events received so far, in order.
    pub fn events(&self) -> Vec<StageEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Stages that reported success, in order.
    pub fn succeeded_stages(&self) -> Vec<Stage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                StageEvent::StageSucceeded { stage, .. } => Some(*stage),
                _ => None,
            })
            .collect()
    }
}

impl ProgressSink for CollectingSink {
    fn emit(&self, event: &StageEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_preserves_order() {
        let sink = CollectingSink::new();
        sink.emit(&StageEvent::StageStarted {
            stage: Stage::Resolve,
            detail: String::new(),
        });
        sink.emit(&StageEvent::StageSucceeded {
            stage: Stage::Resolve,
            detail: "github.com/org/blk".to_string(),
        });
        sink.emit(&StageEvent::StageFailed {
            stage: Stage::Sync,
            error: "network unreachable".to_string(),
        });

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].stage(), Stage::Resolve);
        assert_eq!(sink.succeeded_stages(), vec![Stage::Resolve]);
    }

    #[test]
    fn test_event_display() {
        let e = StageEvent::StageStarted {
            stage: Stage::Sync,
            detail: "https://github.com/org/blk".to_string(),
        };
        assert_eq!(e.to_string(), "sync repository: https://github.com/org/blk...");

        let e = StageEvent::StageFailed {
            stage: Stage::Route,
            error: "conflict".to_string(),
        };
        assert_eq!(e.to_string(), "write route: failed: conflict");
    }
}
