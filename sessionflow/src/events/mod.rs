//! Pipeline lifecycle events.
//!
//! The runner emits `pipeline.started`, `stage.started`, `stage.persisted`,
//! `stage.completed`, and finally `pipeline.completed` or `pipeline.failed`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
