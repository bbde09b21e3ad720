use std::fmt;

/// Identifier handed out by `Server::submit`. Ids start at 1 and increase by
/// one per admitted submission.
pub type TaskId = u64;

/// A zero-argument callable with its arguments already bound.
pub type TaskFn<T> = Box<dyn FnOnce() -> T + Send + 'static>;

pub struct Job<T> {
    pub id: TaskId,
    pub func: TaskFn<T>,
}

impl<T> Job<T> {
    pub fn new(id: TaskId, func: TaskFn<T>) -> Self {
        Job { id, func }
    }
}

impl<T> fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Where a task currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    /// Queued, not yet picked up by the worker.
    Pending,
    Executing,
    /// Result published and not yet taken.
    Completed,
    /// Result taken by `request_result`.
    Consumed,
    /// Still queued when the server stopped; it will never run.
    Abandoned,
    Unknown,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Executing => "executing",
            TaskStatus::Completed => "completed",
            TaskStatus::Consumed => "consumed",
            TaskStatus::Abandoned => "abandoned",
            TaskStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
