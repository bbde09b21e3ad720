use std::time::Duration;

use crate::error::Result;
use crate::jobs::{Job, TaskFn, TaskId, TaskStatus};

/// Reports whether a task is still sitting in the queue.
pub type PendingCheck<'a> = &'a dyn Fn(TaskId) -> bool;

// Define the Broker trait
pub trait BrokerTraits<T>: Send + Sync {
    /// Assigns the next id and appends the task to the tail of the queue.
    fn enqueue(&self, func: TaskFn<T>) -> TaskId;
    fn try_dequeue(&self) -> Option<Job<T>>;
    /// Blocks for at most one poll period until the queue is non-empty and
    /// returns the head's id without removing it. `None` on timeout or once
    /// the broker is closed and empty.
    fn wait_next(&self) -> Option<TaskId>;
    /// Stops admitting tasks and wakes a consumer blocked in `wait_next`.
    /// Tasks already queued stay queued.
    fn close(&self);
    /// `last_id` at the moment `close` was first called. Ids above it were
    /// never queued.
    fn closed_at(&self) -> Option<TaskId>;
    /// Removes every queued task, head first.
    fn drain(&self) -> Vec<Job<T>>;
    fn get_pending(&self) -> Vec<TaskId>;
    fn is_pending(&self, id: TaskId) -> bool;
    /// Highest id handed out so far, 0 if none.
    fn last_id(&self) -> TaskId;
}

// Define the Result trait
//
// A task is marked with `begin` before it leaves the queue and stays marked
// until `publish`, so an issued id is always pending, executing, completed,
// abandoned, or consumed.
pub trait ResultsTraits<T>: Send + Sync {
    fn begin(&self, id: TaskId);
    fn publish(&self, id: TaskId, outcome: Result<T>);
    /// Blocks until `id` has a result, then removes and returns it.
    fn await_result(&self, id: TaskId, pending: PendingCheck<'_>) -> Result<T>;
    fn await_timeout(&self, id: TaskId, timeout: Duration, pending: PendingCheck<'_>) -> Result<T>;
    /// `Executing`, `Completed` or `Abandoned` if the table knows the id,
    /// `None` otherwise.
    fn status(&self, id: TaskId) -> Option<TaskStatus>;
    fn get_completed(&self) -> Vec<TaskId>;
    /// Marks the table final and records the ids that will never run.
    /// Waiters on ids without a result are released with `Error::Abandoned`.
    fn close(&self, abandoned: &[TaskId]);
}
