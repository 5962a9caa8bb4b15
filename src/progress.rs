//! Pipeline events and the listener trait that receives them.
//!
//! Inject an [`Arc<dyn ConversionEventListener>`] via
//! [`crate::config::ConversionConfigBuilder::listener`] to observe a run as it
//! progresses: one [`PipelineEvent::TaskComplete`] per external invocation,
//! one stage-level event when every invocation of a stage has settled, state
//! transitions of the orchestrator, and the document/cleanup steps of
//! [`crate::convert::convert_to_document`].
//!
//! Events are observability only. Nothing in the pipeline waits on a listener
//! or changes behaviour based on what a listener does, so a listener must not
//! block for long: forward to a channel ([`ChannelListener`]) or a log
//! ([`TracingListener`]) and return.
//!
//! # Example
//!
//! ```rust
//! use pdf2office::{ConversionConfig, ConversionEventListener, PipelineEvent};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TaskCounter {
//!     finished: AtomicUsize,
//! }
//!
//! impl ConversionEventListener for TaskCounter {
//!     fn on_event(&self, event: &PipelineEvent) {
//!         if let PipelineEvent::TaskComplete { .. } = event {
//!             self.finished.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(TaskCounter { finished: AtomicUsize::new(0) });
//! let config = ConversionConfig::builder()
//!     .listener(counter as Arc<dyn ConversionEventListener>)
//!     .build()
//!     .unwrap();
//! ```

use crate::config::EngineKind;
use crate::convert::ConversionState;
use crate::error::TaskError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

/// A stage of the pipeline that runs a batch of external invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Splitting multi-page PDFs into single-page PDFs (Inkscape only).
    Split,
    /// Turning PDFs (or single pages) into PNG images.
    Rasterize,
    /// Repairing the last image of each source file.
    Crop,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Split => "split",
            Stage::Rasterize => "rasterize",
            Stage::Crop => "crop",
        })
    }
}

/// Everything the pipeline reports while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// The effective options of a document job, emitted once at its start.
    Options { summary: serde_json::Value },

    /// The orchestrator moved from one state to the next.
    StateChanged {
        from: ConversionState,
        to: ConversionState,
    },

    /// One external invocation (or PNG copy) settled.
    TaskComplete {
        stage: Stage,
        engine: Option<EngineKind>,
        command: String,
        elapsed_ms: u64,
        error: Option<TaskError>,
    },

    /// Every task of a stage succeeded. `output` lists the files the stage
    /// produced, in page order, when the stage discovers them.
    StageComplete {
        stage: Stage,
        output: Vec<PathBuf>,
        elapsed_ms: u64,
    },

    /// At least one task of a stage failed.
    StageFailed {
        stage: Stage,
        errors: Vec<TaskError>,
        elapsed_ms: u64,
    },

    /// The document assembler wrote its output file.
    DocumentSaved { output: PathBuf, elapsed_ms: u64 },

    /// The image directory was removed after assembly (or removal failed).
    Cleaned {
        dir: PathBuf,
        elapsed_ms: u64,
        error: Option<String>,
    },
}

impl PipelineEvent {
    /// Dotted event name, stable across releases, e.g. `done.gs.convert`.
    ///
    /// Useful as a log key or for wildcard-style filtering
    /// (`name.starts_with("err.")`).
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::Options { .. } => "options",
            PipelineEvent::StateChanged { .. } => "state.changed",
            PipelineEvent::TaskComplete { stage, engine, .. } => match (stage, engine) {
                (Stage::Split, _) => "done.pdf.separate",
                (Stage::Rasterize, Some(EngineKind::Mupdf)) => "done.mupdf.convert",
                (Stage::Rasterize, Some(EngineKind::Inkscape)) => "done.inkscape.export",
                (Stage::Rasterize, _) => "done.gs.convert",
                (Stage::Crop, _) => "done.im.convert",
            },
            PipelineEvent::StageComplete { stage, .. } => match stage {
                Stage::Split => "done.pdf.separate.all",
                Stage::Rasterize => "done.png.all",
                Stage::Crop => "done.im.convert.all",
            },
            PipelineEvent::StageFailed { stage, .. } => match stage {
                Stage::Split => "err.pdf.separate.all",
                Stage::Rasterize => "err.png.all",
                Stage::Crop => "err.im.convert",
            },
            PipelineEvent::DocumentSaved { .. } => "done.document.saved",
            PipelineEvent::Cleaned { .. } => "done.png.clean",
        }
    }

    /// True for events that report a failure.
    pub fn is_error(&self) -> bool {
        match self {
            PipelineEvent::TaskComplete { error, .. } => error.is_some(),
            PipelineEvent::StageFailed { .. } => true,
            PipelineEvent::Cleaned { error, .. } => error.is_some(),
            _ => false,
        }
    }
}

/// Receives [`PipelineEvent`]s from a conversion run.
///
/// Implementations must be `Send + Sync`: the listener is shared by every
/// task of a stage through an `Arc`.
pub trait ConversionEventListener: Send + Sync {
    fn on_event(&self, event: &PipelineEvent);
}

/// A no-op listener for callers that don't need events.
pub struct NoopListener;

impl ConversionEventListener for NoopListener {
    fn on_event(&self, _event: &PipelineEvent) {}
}

/// Writes every event to `tracing`: failures at WARN, the rest at DEBUG.
///
/// The payload is rendered as JSON so log lines stay greppable.
pub struct TracingListener;

impl ConversionEventListener for TracingListener {
    fn on_event(&self, event: &PipelineEvent) {
        let payload = serde_json::to_string(event).unwrap_or_else(|e| format!("<{e}>"));
        if event.is_error() {
            warn!(event = event.name(), "{}", payload);
        } else {
            debug!(event = event.name(), "{}", payload);
        }
    }
}

/// Forwards events into a Tokio unbounded channel.
///
/// Send errors (receiver dropped) are ignored: events are advisory.
pub struct ChannelListener {
    tx: UnboundedSender<PipelineEvent>,
}

impl ChannelListener {
    pub fn new(tx: UnboundedSender<PipelineEvent>) -> Self {
        Self { tx }
    }
}

impl ConversionEventListener for ChannelListener {
    fn on_event(&self, event: &PipelineEvent) {
        let _ = self.tx.send(event.clone());
    }
}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type EventListener = Arc<dyn ConversionEventListener>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        names: Mutex<Vec<&'static str>>,
    }

    impl ConversionEventListener for Recorder {
        fn on_event(&self, event: &PipelineEvent) {
            self.names.lock().unwrap().push(event.name());
        }
    }

    fn task(stage: Stage, engine: Option<EngineKind>) -> PipelineEvent {
        PipelineEvent::TaskComplete {
            stage,
            engine,
            command: "cmd".into(),
            elapsed_ms: 1,
            error: None,
        }
    }

    #[test]
    fn task_event_names_follow_engine() {
        assert_eq!(
            task(Stage::Rasterize, Some(EngineKind::Ghostscript)).name(),
            "done.gs.convert"
        );
        assert_eq!(
            task(Stage::Rasterize, Some(EngineKind::Mupdf)).name(),
            "done.mupdf.convert"
        );
        assert_eq!(
            task(Stage::Rasterize, Some(EngineKind::Inkscape)).name(),
            "done.inkscape.export"
        );
        assert_eq!(task(Stage::Split, None).name(), "done.pdf.separate");
        assert_eq!(task(Stage::Crop, None).name(), "done.im.convert");
    }

    #[test]
    fn stage_event_names() {
        let failed = PipelineEvent::StageFailed {
            stage: Stage::Rasterize,
            errors: vec![],
            elapsed_ms: 3,
        };
        assert_eq!(failed.name(), "err.png.all");
        assert!(failed.is_error());

        let done = PipelineEvent::StageComplete {
            stage: Stage::Crop,
            output: vec![],
            elapsed_ms: 3,
        };
        assert_eq!(done.name(), "done.im.convert.all");
        assert!(!done.is_error());
    }

    #[test]
    fn events_serialise_with_tag() {
        let json = serde_json::to_value(task(Stage::Split, None)).unwrap();
        assert_eq!(json["event"], "task_complete");
        assert_eq!(json["stage"], "split");
    }

    #[test]
    fn noop_and_tracing_listeners_do_not_panic() {
        let listeners: Vec<EventListener> = vec![Arc::new(NoopListener), Arc::new(TracingListener)];
        for l in listeners {
            l.on_event(&task(Stage::Crop, None));
        }
    }

    #[test]
    fn recorder_receives_events_in_order() {
        let rec = Recorder::default();
        rec.on_event(&task(Stage::Split, None));
        rec.on_event(&task(Stage::Rasterize, Some(EngineKind::Mupdf)));
        assert_eq!(
            *rec.names.lock().unwrap(),
            vec!["done.pdf.separate", "done.mupdf.convert"]
        );
    }

    #[tokio::test]
    async fn channel_listener_forwards() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let listener = ChannelListener::new(tx);
        listener.on_event(&task(Stage::Crop, None));
        let ev = rx.recv().await.expect("one event");
        assert_eq!(ev.name(), "done.im.convert");
    }

    #[test]
    fn channel_listener_ignores_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        ChannelListener::new(tx).on_event(&task(Stage::Crop, None));
    }
}
