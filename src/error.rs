use std::time::Duration;

use crate::jobs::TaskId;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server stopped before the task was executed.
    #[error("task {0} was abandoned when the server stopped")]
    Abandoned(TaskId),

    /// The result was already taken by an earlier `request_result`.
    #[error("result of task {0} was already consumed")]
    AlreadyConsumed(TaskId),

    #[error("task {0} was never submitted to this server")]
    UnknownTask(TaskId),

    #[error("task {id} panicked: {message}")]
    Panicked { id: TaskId, message: String },

    #[error("no result for task {id} after {waited:?}")]
    Timeout { id: TaskId, waited: Duration },

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
