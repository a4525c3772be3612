use crate::classify::{Category, LogEvent};
use crate::job::{Outcome, Stage};
use crate::report::EventCounts;
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::{Arc, Mutex};

/// Everything the coordinator tells its subscribers. One-directional:
/// coordinator → presentation adapter.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    Progress {
        stage: Stage,
        percent: u8,
        message: String,
    },
    Log(LogEvent),
    Finished(Outcome),
}

/// Fire-and-continue event emitter. Sends never block the worker; if the
/// subscriber has gone away the events are dropped. Log emissions also
/// feed the per-category counters for the run summary.
#[derive(Clone)]
pub struct EventSink {
    tx: Sender<PipelineEvent>,
    counts: Arc<Mutex<EventCounts>>,
}

impl EventSink {
    pub fn channel() -> (Self, Receiver<PipelineEvent>) {
        let (tx, rx) = unbounded();
        (
            Self {
                tx,
                counts: Arc::new(Mutex::new(EventCounts::default())),
            },
            rx,
        )
    }

    pub fn progress(&self, stage: Stage, message: impl Into<String>) {
        let _ = self.tx.send(PipelineEvent::Progress {
            stage,
            percent: stage.percent(),
            message: message.into(),
        });
    }

    pub fn log(&self, event: LogEvent) {
        if let Ok(mut counts) = self.counts.lock() {
            counts.record(event.category);
        }
        let _ = self.tx.send(PipelineEvent::Log(event));
    }

    pub fn log_line(&self, category: Category, raw: impl Into<String>) {
        self.log(LogEvent::new(category, raw));
    }

    pub fn finished(&self, outcome: Outcome) {
        let _ = self.tx.send(PipelineEvent::Finished(outcome));
    }

    pub fn counts(&self) -> EventCounts {
        self.counts.lock().map(|c| c.clone()).unwrap_or_default()
    }
}
