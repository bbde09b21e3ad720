use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{Error, Result};
use crate::interface::{PendingCheck, ResultsTraits};
use crate::jobs::{TaskId, TaskStatus};

struct Table<T> {
    entries: HashMap<TaskId, Result<T>>,
    executing: Option<TaskId>,
    abandoned: HashSet<TaskId>,
    closed: bool,
}

/// In-memory result table with read-once lookup.
///
/// Every publish wakes all waiters; each waiter re-checks only its own id
/// while holding the table lock, so a wakeup for another id is never taken
/// as completion. Consumed ids leave nothing behind: an id that is neither
/// queued, executing, stored nor abandoned has already been read.
pub struct Results<T> {
    table: Mutex<Table<T>>,
    published: Condvar,
}

impl<T> Results<T> {
    pub fn new() -> Self {
        Results {
            table: Mutex::new(Table {
                entries: HashMap::new(),
                executing: None,
                abandoned: HashSet::new(),
                closed: false,
            }),
            published: Condvar::new(),
        }
    }

    // Lock order is table, then queue. The worker never holds both.
    fn wait(&self, id: TaskId, timeout: Option<Duration>, pending: PendingCheck<'_>) -> Result<T> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t).map(|at| (at, t)));
        let mut table = self.table.lock();
        loop {
            if let Some(outcome) = table.entries.remove(&id) {
                return outcome;
            }
            if table.abandoned.contains(&id) {
                return Err(Error::Abandoned(id));
            }
            if !pending(id) && table.executing != Some(id) {
                return Err(Error::AlreadyConsumed(id));
            }
            if table.closed {
                return Err(Error::Abandoned(id));
            }

            match deadline {
                Some((deadline, waited)) => {
                    if self.published.wait_until(&mut table, deadline).timed_out() {
                        return match table.entries.remove(&id) {
                            Some(outcome) => outcome,
                            None => Err(Error::Timeout { id, waited }),
                        };
                    }
                }
                None => self.published.wait(&mut table),
            }
        }
    }
}

impl<T> Default for Results<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ResultsTraits<T> for Results<T> {
    fn begin(&self, id: TaskId) {
        self.table.lock().executing = Some(id);
    }

    fn publish(&self, id: TaskId, outcome: Result<T>) {
        let mut table = self.table.lock();
        table.entries.insert(id, outcome);
        if table.executing == Some(id) {
            table.executing = None;
        }
        drop(table);
        self.published.notify_all();
    }

    fn await_result(&self, id: TaskId, pending: PendingCheck<'_>) -> Result<T> {
        self.wait(id, None, pending)
    }

    fn await_timeout(&self, id: TaskId, timeout: Duration, pending: PendingCheck<'_>) -> Result<T> {
        self.wait(id, Some(timeout), pending)
    }

    fn status(&self, id: TaskId) -> Option<TaskStatus> {
        let table = self.table.lock();
        if table.entries.contains_key(&id) {
            Some(TaskStatus::Completed)
        } else if table.executing == Some(id) {
            Some(TaskStatus::Executing)
        } else if table.abandoned.contains(&id) {
            Some(TaskStatus::Abandoned)
        } else {
            None
        }
    }

    fn get_completed(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.table.lock().entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn close(&self, abandoned: &[TaskId]) {
        let mut table = self.table.lock();
        table.abandoned.extend(abandoned.iter().copied());
        table.closed = true;
        drop(table);
        self.published.notify_all();
    }
}
