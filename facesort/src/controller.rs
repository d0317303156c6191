use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::error::{ControllerError, PipelineError};
use crate::event::{self, Event, Status};
use crate::pipeline::{Outcome, Sorter};

/// Runs sorts on a dedicated worker thread, one at a time.
///
/// [`Controller::start`] and [`Controller::reset`] fail with
/// [`ControllerError::Busy`] while a run is active.
pub struct Controller {
    sorter: Arc<Sorter>,
    busy: Arc<AtomicBool>,
}

/// Clears the busy flag when dropped.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// A started run.
pub struct RunHandle {
    cancel: CancellationToken,
    events: mpsc::UnboundedReceiver<Event>,
    join: JoinHandle<Outcome>,
}

impl RunHandle {
    /// Requests cooperative cancellation. Takes effect before the next file.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Returns a token that cancels this run.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Receiver of the run's events. Yields `None` after the worker exits.
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<Event> {
        &mut self.events
    }

    /// Returns true once the worker has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Waits for the worker and returns the outcome together with any
    /// events not yet drained.
    pub fn join(mut self) -> (Outcome, Vec<Event>) {
        let outcome = self
            .join
            .join()
            .unwrap_or(Outcome::Failed(PipelineError::Panicked));
        let mut rest = Vec::new();
        while let Ok(e) = self.events.try_recv() {
            rest.push(e);
        }
        (outcome, rest)
    }
}

impl Controller {
    pub fn new(sorter: Sorter) -> Self {
        Self {
            sorter: Arc::new(sorter),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn sorter(&self) -> &Sorter {
        &self.sorter
    }

    /// Returns true while a run is active.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Starts sorting `input` on a new worker thread.
    pub fn start(&self, input: impl Into<PathBuf>) -> Result<RunHandle, ControllerError> {
        let guard = self.acquire()?;
        let input = input.into();
        let (sink, events) = event::channel();
        let cancel = CancellationToken::new();

        let sorter = self.sorter.clone();
        let token = cancel.clone();
        let join = thread::Builder::new()
            .name("facesort-worker".into())
            .spawn(move || {
                let _guard = guard;
                panic::catch_unwind(AssertUnwindSafe(|| sorter.run(&input, &token, &sink)))
                    .unwrap_or_else(|_| {
                        error!("sort worker panicked");
                        sink.log(None, Status::Error, None);
                        Outcome::Failed(PipelineError::Panicked)
                    })
            })
            .map_err(ControllerError::Spawn)?;

        Ok(RunHandle {
            cancel,
            events,
            join,
        })
    }

    /// Deletes the cache and the output tree. Rejected during a run.
    pub fn reset(&self) -> Result<(), ControllerError> {
        let _guard = self.acquire()?;
        self.sorter.layout().reset()?;
        Ok(())
    }

    /// Renames an identity in the cache and on disk. Rejected during a run.
    pub fn rename_identity(&self, old: &str, new: &str) -> Result<(), ControllerError> {
        let _guard = self.acquire()?;
        self.sorter.layout().rename_identity(old, new)?;
        Ok(())
    }

    fn acquire(&self) -> Result<BusyGuard, ControllerError> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| ControllerError::Busy)?;
        Ok(BusyGuard(self.busy.clone()))
    }
}
