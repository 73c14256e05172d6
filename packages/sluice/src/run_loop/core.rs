// minimal run-loop: a task queue and its state machine. the exposed API is a wrapper around this.

use crate::error::TimedOutError;
use std::{
    collections::VecDeque,
    mem,
    sync::{
        atomic::{
            AtomicU8,
            Ordering::Relaxed,
        },
        Condvar,
        Mutex,
    },
    time::Instant,
};


// unit of work queued on a run-loop.
//
// exactly one of the two methods is eventually called, with the loop's mutex unlocked.
pub(crate) trait Task: Send {
    // run the task.
    fn execute(self: Box<Self>);

    // the loop closed before the task could run.
    fn abandon(self: Box<Self>);
}

// timeout for popping a task.
#[derive(Debug, Copy, Clone)]
pub(crate) enum Timeout {
    // never time out.
    Never,
    // time out at the given deadline.
    At(Instant),
    // time out if no task can be popped without blocking.
    NonBlocking,
}

// run-loop shared state.
pub(crate) struct Shared {
    // mutex around lockable state.
    lockable: Mutex<Lockable>,
    // signalled when a task is pushed or the state changes.
    cond: Condvar,
    // begins as LoopState::Running. only ever moves forward through the states.
    //
    // - only written with the mutex locked, so reading it with the mutex locked is consistent with
    //   the queue.
    // - if closed, the queue is empty and stays empty.
    state: AtomicU8,
}

// run-loop lockable state.
struct Lockable {
    // tasks in FIFO order.
    tasks: VecDeque<Box<dyn Task>>,
    // number of popped tasks which have not finished executing. they may still push more tasks,
    // so a finished loop only closes once this is zero.
    executing: usize,
}

// possible values for Shared.state
#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum LoopState {
    // tasks are accepted and run.
    Running,
    // tasks are accepted and run, but once the queue is observed empty with no task executing
    // the loop closes.
    Finished,
    // tasks are abandoned.
    Closed,
}

impl LoopState {
    fn from_u8(b: u8) -> Self {
        match b {
            0 => LoopState::Running,
            1 => LoopState::Finished,
            _ => LoopState::Closed,
        }
    }
}

impl Shared {
    // construct running and empty.
    pub(crate) fn new() -> Self {
        Shared {
            lockable: Mutex::new(Lockable { tasks: VecDeque::new(), executing: 0 }),
            cond: Condvar::new(),
            state: AtomicU8::new(LoopState::Running as u8),
        }
    }

    // atomic-read the state.
    pub(crate) fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Relaxed))
    }

    // only call with the mutex locked.
    fn set_state(&self, state: LoopState) {
        debug!(from = ?self.state(), to = ?state, "run-loop state transition");
        self.state.store(state as u8, Relaxed);
    }

    // enqueue a task, or abandon it if closed.
    pub(crate) fn push(&self, task: Box<dyn Task>) {
        let mut lock = self.lockable.lock().unwrap();
        if self.state() == LoopState::Closed {
            drop(lock);
            warn!("work scheduled onto closed run-loop, completing it stopped");
            task.abandon();
            return;
        }
        lock.tasks.push_back(task);
        trace!(queued = lock.tasks.len(), "pushed run-loop task");
        drop(lock);
        self.cond.notify_one();
    }

    // pop the next task, counting it as executing. returns none if the loop is closed, or has just
    // been closed by this call because it was finished, empty, and idle. returns error if the
    // timeout elapsed first.
    fn pop(&self, timeout: Timeout) -> Result<Option<Box<dyn Task>>, TimedOutError> {
        let mut lock = self.lockable.lock().unwrap();
        loop {
            if let Some(task) = lock.tasks.pop_front() {
                lock.executing += 1;
                trace!(queued = lock.tasks.len(), "popped run-loop task");
                return Ok(Some(task));
            }
            match self.state() {
                LoopState::Running => (),
                LoopState::Finished if lock.executing == 0 => {
                    self.set_state(LoopState::Closed);
                    drop(lock);
                    self.cond.notify_all();
                    return Ok(None);
                }
                // a task running on another thread may still push more
                LoopState::Finished => (),
                LoopState::Closed => return Ok(None),
            }
            lock = match timeout {
                Timeout::NonBlocking => return Err(TimedOutError),
                Timeout::Never => self.cond.wait(lock).unwrap(),
                Timeout::At(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(TimedOutError);
                    }
                    self.cond.wait_timeout(lock, deadline - now).unwrap().0
                }
            };
        }
    }

    // pop and execute tasks until the loop is closed, or the timeout elapses.
    pub(crate) fn run(&self, timeout: Timeout) -> Result<(), TimedOutError> {
        while let Some(task) = self.pop(timeout)? {
            let _executing = Executing(self);
            task.execute();
        }
        Ok(())
    }

    // a popped task is done executing. closes the loop if that leaves it finished and drained.
    fn task_done(&self) {
        let mut lock = self.lockable.lock().unwrap();
        lock.executing -= 1;
        if lock.executing == 0 && lock.tasks.is_empty() && self.state() == LoopState::Finished {
            self.set_state(LoopState::Closed);
            drop(lock);
            self.cond.notify_all();
        }
    }

    // mark finished, so that the loop closes once drained.
    pub(crate) fn finish(&self) {
        let lock = self.lockable.lock().unwrap();
        if self.state() == LoopState::Running {
            self.set_state(LoopState::Finished);
        }
        drop(lock);
        self.cond.notify_all();
    }

    // close immediately, abandoning queued tasks.
    pub(crate) fn close(&self) {
        let mut lock = self.lockable.lock().unwrap();
        if self.state() != LoopState::Closed {
            self.set_state(LoopState::Closed);
        }
        let tasks = mem::take(&mut lock.tasks);
        drop(lock);
        self.cond.notify_all();
        abandon_all(tasks);
    }
}

// counts a popped task as executing until dropped, including by unwinding.
struct Executing<'a>(&'a Shared);

impl Drop for Executing<'_> {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let tasks = mem::take(&mut self.lockable.get_mut().unwrap().tasks);
        abandon_all(tasks);
    }
}

fn abandon_all(tasks: VecDeque<Box<dyn Task>>) {
    if !tasks.is_empty() {
        warn!(count = tasks.len(), "run-loop closed with pending work, completing it stopped");
    }
    for task in tasks {
        task.abandon();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::Arc,
        thread,
        time::Duration,
    };

    // task appending its name to a log, prefixed with "!" if abandoned.
    struct Entry(&'static str, Arc<Mutex<Vec<String>>>);

    impl Task for Entry {
        fn execute(self: Box<Self>) {
            self.1.lock().unwrap().push(self.0.to_owned());
        }

        fn abandon(self: Box<Self>) {
            self.1.lock().unwrap().push(format!("!{}", self.0));
        }
    }

    fn entry(name: &'static str, log: &Arc<Mutex<Vec<String>>>) -> Box<dyn Task> {
        Box::new(Entry(name, Arc::clone(log)))
    }

    // task which, once run, waits a moment and then queues an entry onto the same loop.
    struct Spawner(Arc<Shared>, Arc<Mutex<Vec<String>>>);

    impl Task for Spawner {
        fn execute(self: Box<Self>) {
            thread::sleep(Duration::from_millis(20));
            self.0.push(entry("spawned", &self.1));
        }

        fn abandon(self: Box<Self>) {
            self.1.lock().unwrap().push("!spawner".to_owned());
        }
    }

    #[test]
    fn fifo_order() {
        let shared = Shared::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        shared.push(entry("a", &log));
        shared.push(entry("b", &log));
        shared.push(entry("c", &log));
        assert_eq!(shared.run(Timeout::NonBlocking), Err(TimedOutError));
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
        assert_eq!(shared.state(), LoopState::Running);
    }

    #[test]
    fn finish_drains_then_closes() {
        let shared = Shared::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        shared.push(entry("a", &log));
        shared.push(entry("b", &log));
        shared.finish();
        assert_eq!(shared.state(), LoopState::Finished);
        assert_eq!(shared.run(Timeout::Never), Ok(()));
        assert_eq!(shared.state(), LoopState::Closed);

        shared.push(entry("late", &log));
        assert_eq!(*log.lock().unwrap(), ["a", "b", "!late"]);
    }

    #[test]
    fn finish_waits_for_executing_tasks() {
        // one runner executes the spawner while the other sees the loop finished and empty
        let shared = Arc::new(Shared::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        shared.push(Box::new(Spawner(Arc::clone(&shared), Arc::clone(&log))));
        shared.finish();
        let runners = (0..2)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || shared.run(Timeout::Never))
            })
            .collect::<Vec<_>>();
        for runner in runners {
            assert_eq!(runner.join().unwrap(), Ok(()));
        }
        assert_eq!(*log.lock().unwrap(), ["spawned"]);
        assert_eq!(shared.state(), LoopState::Closed);
    }

    #[test]
    fn finish_empty_returns_immediately() {
        let shared = Shared::new();
        shared.finish();
        assert!(shared.pop(Timeout::Never).unwrap().is_none());
        assert_eq!(shared.state(), LoopState::Closed);
    }

    #[test]
    fn close_abandons_queued() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let shared = Shared::new();
        shared.push(entry("a", &log));
        shared.close();
        assert!(shared.pop(Timeout::NonBlocking).unwrap().is_none());
        assert_eq!(*log.lock().unwrap(), ["!a"]);

        let shared = Shared::new();
        shared.push(entry("b", &log));
        drop(shared);
        assert_eq!(*log.lock().unwrap(), ["!a", "!b"]);
    }

    #[test]
    fn pop_deadline_times_out() {
        let shared = Shared::new();
        let deadline = Instant::now() + Duration::from_millis(20);
        assert_eq!(shared.pop(Timeout::At(deadline)).err(), Some(TimedOutError));
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn blocked_pop_woken_by_push() {
        let shared = Arc::new(Shared::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || shared.run(Timeout::Never))
        };
        thread::sleep(Duration::from_millis(20));
        shared.push(entry("a", &log));
        shared.finish();
        assert_eq!(runner.join().unwrap(), Ok(()));
        assert_eq!(*log.lock().unwrap(), ["a"]);
    }
}
