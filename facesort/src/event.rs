use std::fmt;

use serde::Serialize;
use tokio::sync::mpsc;

/// Outcome reported for one file, or for the run as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// The file could not be decoded as an image.
    ReadError,
    /// No face was detected.
    NoFace,
    /// Two or more faces; copied to the group photo folder.
    GroupPhoto,
    /// Exactly one face; copied to its identity folder.
    Success,
    /// The run stopped at a cancellation request.
    Cancelled,
    /// The run failed.
    Error,
    /// The run finished and the store was saved.
    Done,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadError => write!(f, "read_error"),
            Self::NoFace => write!(f, "no_face"),
            Self::GroupPhoto => write!(f, "group_photo"),
            Self::Success => write!(f, "success"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Error => write!(f, "error"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// One log line of a sort run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEvent {
    /// Base name of the file, `None` for run-level events.
    pub filename: Option<String>,
    pub status: Status,
    /// Identity the file was assigned to, only for [`Status::Success`].
    pub identity: Option<String>,
}

/// Notification pushed from the worker to the controlling context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Log(LogEvent),
    Progress { percent: u8 },
}

impl Event {
    /// Returns the log payload, if any.
    pub fn as_log(&self) -> Option<&LogEvent> {
        match self {
            Self::Log(log) => Some(log),
            Self::Progress { .. } => None,
        }
    }
}

/// Creates a connected sink and receiver.
pub fn channel() -> (EventSink, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { tx }, rx)
}

/// Worker side of the event channel.
///
/// Sending never blocks and never fails: if the receiver is gone the
/// event is dropped and the run continues.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSink {
    /// Emits a log event.
    pub fn log(&self, filename: Option<&str>, status: Status, identity: Option<&str>) {
        self.emit(Event::Log(LogEvent {
            filename: filename.map(str::to_string),
            status,
            identity: identity.map(str::to_string),
        }));
    }

    /// Emits a progress update.
    pub fn progress(&self, percent: u8) {
        self.emit(Event::Progress { percent });
    }

    fn emit(&self, event: Event) {
        let _ = self.tx.send(event);
    }
}

/// Integer percent of `done` out of `total`, truncated toward zero.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (done.min(total) * 100 / total) as u8
}
