use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::broker::{Broker, Options};
use crate::error::{Error, Result};
use crate::interface::{BrokerTraits, ResultsTraits};
use crate::jobs::{Job, TaskId, TaskStatus};
use crate::results::Results;

// Constants
pub const WORKER_THREAD: &str = "taskserver-worker";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Running,
    StopRequested,
    Stopped,
}

/// What the worker does with queued tasks once a stop is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownPolicy {
    /// Exit at the next check of the stop flag; whatever is still queued is
    /// abandoned.
    #[default]
    Abandon,
    /// Keep executing until the queue is empty, then exit.
    Drain,
}

pub struct ServerOpts<T> {
    pub broker: Arc<dyn BrokerTraits<T>>,
    pub results: Arc<dyn ResultsTraits<T>>,
    pub shutdown: ShutdownPolicy,
}

impl<T: Send + 'static> ServerOpts<T> {
    pub fn in_memory(options: Options) -> Self {
        ServerOpts {
            broker: Arc::new(Broker::<T>::new(options)),
            results: Arc::new(Results::<T>::new()),
            shutdown: ShutdownPolicy::default(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl<T: Send + 'static> Default for ServerOpts<T> {
    fn default() -> Self {
        Self::in_memory(Options::default())
    }
}

// State shared with the worker thread
struct Shared<T> {
    broker: Arc<dyn BrokerTraits<T>>,
    results: Arc<dyn ResultsTraits<T>>,
    shutdown: ShutdownPolicy,
    stop_requested: AtomicBool,
    stopped: AtomicBool,
}

/// Single-worker task server.
///
/// Any number of threads may `submit` and `request_result` through a shared
/// reference. One dedicated worker thread executes tasks one at a time in
/// submission order.
pub struct Server<T = f64> {
    shared: Arc<Shared<T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<T: Send + 'static> Server<T> {
    /// Builds the server and starts its worker thread.
    pub fn new(opts: ServerOpts<T>) -> Result<Self> {
        let shared = Arc::new(Shared {
            broker: opts.broker,
            results: opts.results,
            shutdown: opts.shutdown,
            stop_requested: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
        });

        let worker = {
            let shared = shared.clone();
            thread::Builder::new()
                .name(WORKER_THREAD.to_string())
                .spawn(move || shared.process())
                .map_err(Error::Spawn)?
        };

        Ok(Server {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::new(ServerOpts::default())
    }

    /// Queues `func` and returns its id. Never blocks beyond lock contention.
    /// Tasks submitted after `stop` get an id but are abandoned immediately.
    pub fn submit<F>(&self, func: F) -> TaskId
    where
        F: FnOnce() -> T + Send + 'static,
    {
        self.shared.broker.enqueue(Box::new(func))
    }
}

impl<T> Server<T> {
    /// Blocks until the task's result is published, then takes it.
    ///
    /// Returns `Error::Abandoned` once `stop` has completed and the task never
    /// ran, and `Error::AlreadyConsumed` on a second call for the same id.
    pub fn request_result(&self, id: TaskId) -> Result<T> {
        self.check_admitted(id)?;
        let broker = &self.shared.broker;
        self.shared.results.await_result(id, &|id| broker.is_pending(id))
    }

    /// Like `request_result`, but gives up with `Error::Timeout` after
    /// `timeout`. The result stays retrievable. A timeout too large to
    /// schedule waits without a deadline.
    pub fn request_result_timeout(&self, id: TaskId, timeout: Duration) -> Result<T> {
        self.check_admitted(id)?;
        let broker = &self.shared.broker;
        self.shared
            .results
            .await_timeout(id, timeout, &|id| broker.is_pending(id))
    }

    /// Requests shutdown and joins the worker. Calling it again, from any
    /// thread, is a no-op once the first call has returned.
    ///
    /// Called from inside a running task it only requests the stop: the
    /// worker finishes shutting down after that task returns.
    pub fn stop(&self) {
        let mut worker = self.worker.lock();
        let Some(on_worker) = worker
            .as_ref()
            .map(|handle| handle.thread().id() == thread::current().id())
        else {
            return;
        };

        if !self.shared.stop_requested.load(Ordering::SeqCst) {
            info!(policy = ?self.shared.shutdown, "stopping server");
            // Close before raising the flag: once the worker sees the flag,
            // an empty queue means nothing more can arrive.
            self.shared.broker.close();
            self.shared.stop_requested.store(true, Ordering::SeqCst);
        }

        // The handle stays for a later stop from another thread to join.
        if on_worker {
            debug!("stop requested from the worker thread");
            return;
        }
        let Some(handle) = worker.take() else {
            return;
        };
        if handle.join().is_err() {
            error!("worker thread panicked");
            self.shared.finish();
        }
    }

    pub fn state(&self) -> ServerState {
        if self.shared.stopped.load(Ordering::SeqCst) {
            ServerState::Stopped
        } else if self.shared.stop_requested.load(Ordering::SeqCst) {
            ServerState::StopRequested
        } else {
            ServerState::Running
        }
    }

    /// Snapshot of where `id` is. Checked in lifecycle order, so the answer
    /// held at some instant during the call.
    pub fn status(&self, id: TaskId) -> TaskStatus {
        match self.check_admitted(id) {
            Err(Error::UnknownTask(_)) => return TaskStatus::Unknown,
            Err(_) => return TaskStatus::Abandoned,
            Ok(()) => {}
        }
        if self.shared.broker.is_pending(id) {
            return TaskStatus::Pending;
        }
        // begin() precedes dequeue, so a task that left the queue is known
        // to the table until it is consumed
        self.shared.results.status(id).unwrap_or(TaskStatus::Consumed)
    }

    pub fn pending(&self) -> Vec<TaskId> {
        self.shared.broker.get_pending()
    }

    pub fn completed(&self) -> Vec<TaskId> {
        self.shared.results.get_completed()
    }

    pub fn last_id(&self) -> TaskId {
        self.shared.broker.last_id()
    }

    // Unknown if never issued, abandoned if issued after the queue closed.
    fn check_admitted(&self, id: TaskId) -> Result<()> {
        if id == 0 || id > self.shared.broker.last_id() {
            return Err(Error::UnknownTask(id));
        }
        match self.shared.broker.closed_at() {
            Some(closed_at) if id > closed_at => Err(Error::Abandoned(id)),
            _ => Ok(()),
        }
    }
}

impl<T> Drop for Server<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T> Shared<T> {
    fn process(&self) {
        info!("worker started");
        loop {
            let stopping = self.stop_requested.load(Ordering::SeqCst);
            if stopping && self.shutdown == ShutdownPolicy::Abandon {
                break;
            }

            match self.broker.wait_next() {
                Some(id) => {
                    // mark before dequeue so the task is never untracked
                    self.results.begin(id);
                    match self.broker.try_dequeue() {
                        Some(job) => self.exec_job(job),
                        None => warn!(task = id, "queue head vanished before dequeue"),
                    }
                }
                None if stopping => break,
                None => {}
            }
        }
        info!("worker stopped");
        self.finish();
    }

    // Runs once, on the worker's way out (or in `stop` if the worker died).
    fn finish(&self) {
        let abandoned = self.broker.get_pending();
        self.results.close(&abandoned);
        self.broker.drain();
        if let (Some(first), Some(last)) = (abandoned.first(), abandoned.last()) {
            warn!(
                count = abandoned.len(),
                first = *first,
                last = *last,
                "abandoning queued tasks"
            );
        }
        self.stopped.store(true, Ordering::SeqCst);
        info!("server stopped");
    }

    fn exec_job(&self, job: Job<T>) {
        let Job { id, func } = job;
        debug!(task = id, "executing task");

        let outcome = panic::catch_unwind(AssertUnwindSafe(func)).map_err(|payload| {
            let message = panic_message(payload.as_ref());
            error!(task = id, %message, "task panicked");
            Error::Panicked { id, message }
        });

        self.results.publish(id, outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
