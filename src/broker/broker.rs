use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::interface::BrokerTraits;
use crate::jobs::{Job, TaskFn, TaskId};

#[derive(Debug, Clone)]
pub struct Options {
    /// How long the consumer blocks on an empty queue before it looks at the
    /// stop flag again.
    pub poll_period: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            poll_period: Duration::from_millis(100),
        }
    }
}

struct Queue<T> {
    last_id: TaskId,
    jobs: VecDeque<Job<T>>,
    closed_at: Option<TaskId>,
}

/// In-memory FIFO broker. The id counter and the queue share one lock, so id
/// order and queue order are the same total order.
pub struct Broker<T> {
    opts: Options,
    queue: Mutex<Queue<T>>,
    available: Condvar,
}

impl<T> Broker<T> {
    pub fn new(opts: Options) -> Self {
        Broker {
            opts,
            queue: Mutex::new(Queue {
                last_id: 0,
                jobs: VecDeque::new(),
                closed_at: None,
            }),
            available: Condvar::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Broker<T> {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl<T> BrokerTraits<T> for Broker<T> {
    fn enqueue(&self, func: TaskFn<T>) -> TaskId {
        let mut queue = self.queue.lock();
        queue.last_id += 1;
        let id = queue.last_id;

        if queue.closed_at.is_some() {
            drop(queue);
            warn!(task = id, "broker closed, task will not run");
            return id;
        }

        queue.jobs.push_back(Job::new(id, func));
        drop(queue);
        self.available.notify_one();
        id
    }

    fn try_dequeue(&self) -> Option<Job<T>> {
        self.queue.lock().jobs.pop_front()
    }

    fn wait_next(&self) -> Option<TaskId> {
        // too large to add to now: wait without a deadline
        let deadline = Instant::now().checked_add(self.opts.poll_period);
        let mut queue = self.queue.lock();
        loop {
            if let Some(job) = queue.jobs.front() {
                return Some(job.id);
            }
            if queue.closed_at.is_some() {
                return None;
            }
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut queue, deadline).timed_out() {
                        return queue.jobs.front().map(|job| job.id);
                    }
                }
                None => self.available.wait(&mut queue),
            }
        }
    }

    fn close(&self) {
        let mut queue = self.queue.lock();
        if queue.closed_at.is_none() {
            queue.closed_at = Some(queue.last_id);
        }
        drop(queue);
        self.available.notify_all();
    }

    fn closed_at(&self) -> Option<TaskId> {
        self.queue.lock().closed_at
    }

    fn drain(&self) -> Vec<Job<T>> {
        self.queue.lock().jobs.drain(..).collect()
    }

    fn get_pending(&self) -> Vec<TaskId> {
        self.queue.lock().jobs.iter().map(|job| job.id).collect()
    }

    fn is_pending(&self, id: TaskId) -> bool {
        self.queue.lock().jobs.iter().any(|job| job.id == id)
    }

    fn last_id(&self) -> TaskId {
        self.queue.lock().last_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn job(value: f64) -> TaskFn<f64> {
        Box::new(move || value)
    }

    #[test]
    fn ids_start_at_one_and_follow_queue_order() {
        let broker = Broker::default();
        assert_eq!(broker.last_id(), 0);
        assert_eq!(broker.enqueue(job(1.0)), 1);
        assert_eq!(broker.enqueue(job(2.0)), 2);
        assert_eq!(broker.enqueue(job(3.0)), 3);
        assert_eq!(broker.get_pending(), vec![1, 2, 3]);

        let first = broker.try_dequeue().unwrap();
        assert_eq!(first.id, 1);
        assert_eq!((first.func)(), 1.0);
        assert_eq!(broker.try_dequeue().unwrap().id, 2);
        assert!(broker.is_pending(3));
        assert!(!broker.is_pending(2));
    }

    #[test]
    fn try_dequeue_on_empty_returns_immediately() {
        let broker: Broker<f64> = Broker::default();
        assert!(broker.try_dequeue().is_none());
        assert!(broker.is_empty());
    }

    fn broker_polling_every(poll_period: Duration) -> Broker<f64> {
        Broker::new(Options { poll_period })
    }

    #[test]
    fn wait_next_gives_up_after_poll_period() {
        let broker = broker_polling_every(Duration::from_millis(20));
        let started = Instant::now();
        assert!(broker.wait_next().is_none());
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn wait_next_peeks_without_removing() {
        let broker = Broker::default();
        broker.enqueue(job(1.0));
        broker.enqueue(job(2.0));
        assert_eq!(broker.wait_next(), Some(1));
        assert_eq!(broker.wait_next(), Some(1));
        assert_eq!(broker.try_dequeue().unwrap().id, 1);
        assert_eq!(broker.wait_next(), Some(2));
    }

    #[test]
    fn wait_next_wakes_on_enqueue() {
        let broker = Arc::new(broker_polling_every(Duration::from_secs(10)));
        let consumer = {
            let broker = broker.clone();
            thread::spawn(move || broker.wait_next())
        };
        thread::sleep(Duration::from_millis(20));
        broker.enqueue(job(7.0));
        assert_eq!(consumer.join().unwrap(), Some(1));
    }

    #[test]
    fn unbounded_poll_period_does_not_overflow() {
        let broker = Arc::new(broker_polling_every(Duration::MAX));
        let consumer = {
            let broker = broker.clone();
            thread::spawn(move || broker.wait_next())
        };
        thread::sleep(Duration::from_millis(20));
        broker.enqueue(job(1.0));
        assert_eq!(consumer.join().unwrap(), Some(1));

        let idle = {
            let broker = broker.clone();
            thread::spawn(move || {
                broker.try_dequeue();
                broker.wait_next()
            })
        };
        thread::sleep(Duration::from_millis(20));
        broker.close();
        assert_eq!(idle.join().unwrap(), None);
    }

    #[test]
    fn close_releases_blocked_consumer() {
        let broker = Arc::new(broker_polling_every(Duration::from_secs(10)));
        let consumer = {
            let broker = broker.clone();
            thread::spawn(move || broker.wait_next())
        };
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        broker.close();
        assert!(consumer.join().unwrap().is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn closed_broker_still_hands_out_ids_but_drops_tasks() {
        let broker = Broker::default();
        broker.enqueue(job(1.0));
        assert_eq!(broker.closed_at(), None);
        broker.close();
        assert_eq!(broker.enqueue(job(2.0)), 2);
        assert_eq!(broker.last_id(), 2);
        assert_eq!(broker.closed_at(), Some(1));

        broker.close();
        assert_eq!(broker.closed_at(), Some(1));
        assert_eq!(broker.get_pending(), vec![1]);

        // queued work survives close until drained
        let drained = broker.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, 1);
        assert!(broker.is_empty());
    }

    #[test]
    fn concurrent_producers_get_distinct_ids() {
        let broker: Arc<Broker<f64>> = Arc::new(Broker::default());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let broker = broker.clone();
                thread::spawn(move || (0..250).map(|_| broker.enqueue(job(0.0))).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<TaskId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=1000).collect::<Vec<_>>());
        assert_eq!(broker.get_pending(), (1..=1000).collect::<Vec<_>>());
    }
}
