use crate::db;
use crate::error::CatalogError;
use crate::time::DateTime;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

/// A unit of work dispatched through the in-memory priority Work Queue. `payload` is opaque to
/// the queue itself; callers downcast it via the `Payload` enum.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: u64,
    pub priority: i16,
    pub payload: Payload,
    pub retries: i16,
}

#[derive(Debug, Clone)]
pub enum Payload {
    Capture { site_id: i32 },
    Diff { queue_entry_id: i32, site_id: i32, old_snapshot_id: i32, new_snapshot_id: i32 },
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

struct Entry {
    priority: i16,
    sequence: u64,
    job: Job,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.sequence == other.sequence
    }
}
impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    /// Lower priority values are more urgent, and ties are broken by insertion order. Wrapped
    /// in `Reverse` at the `BinaryHeap` call site so the max-heap pops the most urgent entry.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority.cmp(&other.priority).then(self.sequence.cmp(&other.sequence))
    }
}

/// In-memory, at-least-once priority queue. A job moves `pending -> processing` on `next()`,
/// then `processing -> completed` or back to `pending` (with decremented urgency) on `fail`
/// with retry, or `processing -> failed` terminally.
pub struct WorkQueue {
    heap: Mutex<BinaryHeap<Reverse<Entry>>>,
    processing: Mutex<HashMap<u64, Job>>,
    next_id: AtomicU64,
    next_sequence: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
}

impl Default for WorkQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkQueue {
    pub fn new() -> Self {
        Self {
            heap: Mutex::new(BinaryHeap::new()),
            processing: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            next_sequence: AtomicU64::new(1),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    pub fn enqueue(&self, payload: Payload, priority: i16) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let job = Job { id, priority, payload, retries: 0 };
        self.heap.lock().unwrap().push(Reverse(Entry { priority, sequence, job }));
        id
    }

    fn requeue(&self, mut job: Job, priority: i16) {
        job.priority = priority;
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        self.heap.lock().unwrap().push(Reverse(Entry { priority, sequence, job }));
    }

    /// Atomically pops the most urgent job and moves it into the processing set.
    pub fn next(&self) -> Option<Job> {
        let entry = self.heap.lock().unwrap().pop()?.0;
        let job = entry.job;
        self.processing.lock().unwrap().insert(job.id, job.clone());
        Some(job)
    }

    pub fn complete(&self, job_id: u64) {
        self.processing.lock().unwrap().remove(&job_id);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    /// On retryable failure within the retry budget, requeues with `priority + 1` (less urgent).
    /// Otherwise marks the job terminally failed.
    pub fn fail(&self, job_id: u64, retryable: bool, max_retries: i16) {
        let job = self.processing.lock().unwrap().remove(&job_id);
        let Some(mut job) = job else { return };

        if retryable && job.retries < max_retries {
            job.retries += 1;
            let priority = job.priority + 1;
            self.requeue(job, priority);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.heap.lock().unwrap().len() as u64,
            processing: self.processing.lock().unwrap().len() as u64,
            completed: self.completed.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

/// A fencing identifier returned by a successful `acquire`; required to `release` the same lock.
pub type LockToken = String;

/// Catalog-backed distributed lock: `acquire` is an upsert that only succeeds when no holder is
/// present or the existing holder's lease has expired; `release` is a compare-and-delete keyed
/// on the fencing token so a lock can't be released by anyone but its current holder.
pub fn acquire(name: &str, ttl: time::Duration) -> Result<Option<LockToken>, CatalogError> {
    use crate::schema::scheduler_locks::dsl;
    use diesel::prelude::*;

    let mut conn = db::get_connection()?;
    let token = Uuid::new_v4().to_string();
    let expires_at: DateTime = (*DateTime::now() + ttl).into();

    let acquired = conn.transaction(|conn| {
        let existing = dsl::scheduler_locks
            .filter(dsl::name.eq(name))
            .select(dsl::expires_at)
            .first::<DateTime>(conn)
            .optional()?;

        let lease_expired = existing.is_none_or(|expiry| *expiry < *DateTime::now());
        if !lease_expired {
            return Ok::<bool, diesel::result::Error>(false);
        }

        diesel::insert_into(dsl::scheduler_locks)
            .values((dsl::name.eq(name), dsl::holder.eq(&token), dsl::expires_at.eq(expires_at)))
            .on_conflict(dsl::name)
            .do_update()
            .set((dsl::holder.eq(&token), dsl::expires_at.eq(expires_at)))
            .execute(conn)?;
        Ok(true)
    })?;

    Ok(acquired.then_some(token))
}

pub fn release(name: &str, token: &LockToken) -> Result<bool, CatalogError> {
    use crate::schema::scheduler_locks::dsl;
    use diesel::prelude::*;

    let mut conn = db::get_connection()?;
    let deleted = diesel::delete(dsl::scheduler_locks.filter(dsl::name.eq(name)).filter(dsl::holder.eq(token)))
        .execute(&mut conn)?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn next_returns_highest_priority_first() {
        let queue = WorkQueue::new();
        queue.enqueue(Payload::Capture { site_id: 1 }, 5);
        queue.enqueue(Payload::Capture { site_id: 2 }, 1);
        queue.enqueue(Payload::Capture { site_id: 3 }, 3);

        let first = queue.next().unwrap();
        assert!(matches!(first.payload, Payload::Capture { site_id: 2 }));
        let second = queue.next().unwrap();
        assert!(matches!(second.payload, Payload::Capture { site_id: 3 }));
    }

    #[test]
    fn ties_broken_by_insertion_order() {
        let queue = WorkQueue::new();
        queue.enqueue(Payload::Capture { site_id: 10 }, 3);
        queue.enqueue(Payload::Capture { site_id: 20 }, 3);

        let first = queue.next().unwrap();
        assert!(matches!(first.payload, Payload::Capture { site_id: 10 }));
    }

    #[test]
    fn fail_within_retry_budget_requeues_with_lower_urgency() {
        let queue = WorkQueue::new();
        let id = queue.enqueue(Payload::Capture { site_id: 1 }, 3);
        let job = queue.next().unwrap();
        assert_eq!(job.id, id);

        queue.fail(id, true, 3);
        let stats = queue.stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 0);

        let requeued = queue.next().unwrap();
        assert_eq!(requeued.priority, 4);
        assert_eq!(requeued.retries, 1);
    }

    #[test]
    fn fail_at_retry_budget_is_terminal() {
        let queue = WorkQueue::new();
        let id = queue.enqueue(Payload::Capture { site_id: 1 }, 3);
        let mut job = queue.next().unwrap();
        job.retries = 3;
        queue.processing.lock().unwrap().insert(id, job);

        queue.fail(id, true, 3);
        let stats = queue.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn non_retryable_failure_is_always_terminal() {
        let queue = WorkQueue::new();
        let id = queue.enqueue(Payload::Capture { site_id: 1 }, 3);
        queue.next().unwrap();
        queue.fail(id, false, 3);

        let stats = queue.stats();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn diff_jobs_share_the_capture_queue_priority_ordering() {
        let queue = WorkQueue::new();
        queue.enqueue(Payload::Diff { queue_entry_id: 1, site_id: 1, old_snapshot_id: 1, new_snapshot_id: 2 }, 5);
        queue.enqueue(Payload::Diff { queue_entry_id: 2, site_id: 2, old_snapshot_id: 3, new_snapshot_id: 4 }, 1);

        let first = queue.next().unwrap();
        assert!(matches!(first.payload, Payload::Diff { queue_entry_id: 2, .. }));
    }
}
