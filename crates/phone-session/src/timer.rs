//! Idle-timeout scheduling.
//!
//! A scheduler runs a task once after a delay unless it is cancelled first.
//! `ThreadScheduler` serves every session from one background thread;
//! `ManualScheduler` runs on a virtual clock driven by the caller.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::debug;

pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub(crate) u64);

pub trait TimeoutScheduler: Send + Sync {
    /// Run `task` once after `delay`, unless cancelled first.
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId;

    /// Drop a scheduled task. A cancelled task never runs; cancelling a task
    /// that already ran or an unknown id is a no-op.
    fn cancel(&self, id: TimerId);

    /// Stop firing. Pending tasks are dropped. Idempotent.
    fn shutdown(&self) {}
}

// ---------------------------------------------------------------------------
// ThreadScheduler
// ---------------------------------------------------------------------------

enum TimerCommand {
    Schedule {
        id: TimerId,
        deadline: Instant,
        task: TimerTask,
    },
    Cancel(TimerId),
    Shutdown,
}

/// One timer thread waiting on a deadline queue for all sessions.
pub struct ThreadScheduler {
    tx: mpsc::Sender<TimerCommand>,
    next_id: AtomicU64,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadScheduler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel::<TimerCommand>();
        let worker = thread::Builder::new()
            .name("oldphone-timer".into())
            .spawn(move || timer_loop(rx))
            .expect("failed to spawn timer thread");
        Self {
            tx,
            next_id: AtomicU64::new(0),
            worker: Mutex::new(Some(worker)),
        }
    }
}

impl Default for ThreadScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeoutScheduler for ThreadScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let id = TimerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let _ = self.tx.send(TimerCommand::Schedule {
            id,
            deadline: Instant::now() + delay,
            task,
        });
        id
    }

    fn cancel(&self, id: TimerId) {
        let _ = self.tx.send(TimerCommand::Cancel(id));
    }

    fn shutdown(&self) {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return;
        };
        let _ = self.tx.send(TimerCommand::Shutdown);
        // A task running on the timer thread may itself trigger shutdown
        if worker.thread().id() != thread::current().id() {
            let _ = worker.join();
        }
    }
}

impl Drop for ThreadScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn timer_loop(rx: mpsc::Receiver<TimerCommand>) {
    let mut queue: BinaryHeap<Reverse<(Instant, TimerId)>> = BinaryHeap::new();
    let mut tasks: HashMap<TimerId, TimerTask> = HashMap::new();

    loop {
        // Fire everything that is due. Cancelled ids have no task left.
        let now = Instant::now();
        while let Some(&Reverse((deadline, id))) = queue.peek() {
            if deadline > now {
                break;
            }
            queue.pop();
            if let Some(task) = tasks.remove(&id) {
                task();
            }
        }

        let next = match queue.peek() {
            Some(&Reverse((deadline, _))) => {
                match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
                    Ok(cmd) => cmd,
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => break,
            },
        };

        match next {
            TimerCommand::Schedule { id, deadline, task } => {
                queue.push(Reverse((deadline, id)));
                tasks.insert(id, task);
            }
            TimerCommand::Cancel(id) => {
                tasks.remove(&id);
            }
            TimerCommand::Shutdown => break,
        }
    }

    debug!(dropped = tasks.len(), "timer thread stopped");
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    pending: BTreeMap<TimerId, (Duration, TimerTask)>,
    stopped: bool,
}

/// Scheduler on a virtual clock: tasks run only inside [`advance`](Self::advance).
///
/// Deterministic replacement for [`ThreadScheduler`] in tests and replays.
#[derive(Default)]
pub struct ManualScheduler {
    state: Mutex<ManualState>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move the clock forward by `by`, running due tasks in deadline order.
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.lock().now + by;
        let mut fired = 0;
        loop {
            // Take the next due task, then run it without holding the lock:
            // tasks call back into schedule/cancel.
            let task = {
                let mut state = self.lock();
                let due = state
                    .pending
                    .iter()
                    .filter(|(_, (deadline, _))| *deadline <= target)
                    .min_by_key(|(id, (deadline, _))| (*deadline, **id))
                    .map(|(id, (deadline, _))| (*id, *deadline));
                match due {
                    Some((id, deadline)) => {
                        state.now = deadline;
                        state.pending.remove(&id).map(|(_, task)| task)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };
            match task {
                Some(task) => {
                    task();
                    fired += 1;
                }
                None => return fired,
            }
        }
    }

    /// Elapsed virtual time.
    pub fn now(&self) -> Duration {
        self.lock().now
    }

    /// Number of scheduled, not yet run or cancelled, tasks.
    pub fn pending(&self) -> usize {
        self.lock().pending.len()
    }
}

impl TimeoutScheduler for ManualScheduler {
    fn schedule(&self, delay: Duration, task: TimerTask) -> TimerId {
        let mut state = self.lock();
        let id = TimerId(state.next_id);
        state.next_id += 1;
        if !state.stopped {
            let deadline = state.now + delay;
            state.pending.insert(id, (deadline, task));
        }
        id
    }

    fn cancel(&self, id: TimerId) {
        self.lock().pending.remove(&id);
    }

    fn shutdown(&self) {
        let mut state = self.lock();
        state.stopped = true;
        state.pending.clear();
    }
}
