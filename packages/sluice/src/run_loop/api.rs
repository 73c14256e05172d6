// public run-loop API, wrapping the core.

use super::core::{Shared, Task, Timeout, LoopState};
use crate::{
    completion::{CompletionSignatures, SetStopped, SetValue},
    env::Env,
    error::TimedOutError,
    operation::OperationState,
    query::{get_stop_token, ForwardProgressGuarantee, GetCompletionScheduler},
    receiver::Receiver,
    scheduler::{AnyScheduler, Scheduler},
    sender::Sender,
};
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
    time::{Duration, Instant},
};


/// Single-threaded cooperative execution context
///
/// Work scheduled onto the loop runs, in FIFO order, when the owner calls [`run`](RunLoop::run).
/// `run` never blocks: it returns as soon as the queue is empty.
///
/// Dropping the loop closes it: work still queued, and work scheduled afterwards through a
/// surviving scheduler, completes with stopped.
pub struct RunLoop {
    shared: Arc<Shared>,
}

impl RunLoop {
    /// Construct an empty loop
    pub fn new() -> Self {
        RunLoop { shared: Arc::new(Shared::new()) }
    }

    /// Get a scheduler which schedules onto this loop
    pub fn scheduler(&self) -> RunLoopScheduler {
        RunLoopScheduler::new(Arc::clone(&self.shared), ForwardProgressGuarantee::WeaklyParallel)
    }

    /// Execute queued work, including work queued while running, until the queue is empty
    pub fn run(&self) {
        match self.shared.run(Timeout::NonBlocking) {
            Ok(()) | Err(TimedOutError) => (),
        }
    }

    /// Mark the loop as finished
    ///
    /// Work already queued still runs. Once a call to [`run`](Self::run) observes the queue empty,
    /// the loop closes.
    pub fn finish(&self) {
        self.shared.finish()
    }

    /// Close the loop, completing queued work with stopped
    pub fn close(&self) {
        self.shared.close()
    }

    /// Whether the loop has closed
    pub fn is_closed(&self) -> bool {
        self.shared.state() == LoopState::Closed
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        RunLoop::new()
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl Debug for RunLoop {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("RunLoop").field("state", &self.shared.state()).finish()
    }
}


/// Thread-safe blocking execution context
///
/// Like [`RunLoop`], except that [`run`](Self::run) blocks while the queue is empty, and only
/// returns once the loop has been [finished](Self::finish) and drained. Any number of threads may
/// run the loop concurrently.
pub struct SynchronizedRunLoop {
    shared: Arc<Shared>,
}

impl SynchronizedRunLoop {
    /// Construct an empty loop
    pub fn new() -> Self {
        SynchronizedRunLoop { shared: Arc::new(Shared::new()) }
    }

    /// Get a scheduler which schedules onto this loop
    pub fn scheduler(&self) -> RunLoopScheduler {
        self.scheduler_with(ForwardProgressGuarantee::WeaklyParallel)
    }

    pub(crate) fn scheduler_with(&self, progress: ForwardProgressGuarantee) -> RunLoopScheduler {
        RunLoopScheduler::new(Arc::clone(&self.shared), progress)
    }

    /// Execute work until the loop is finished and drained, blocking while there is none
    pub fn run(&self) {
        match self.shared.run(Timeout::Never) {
            Ok(()) => (),
            Err(TimedOutError) => unreachable!("run without timeout timed out"),
        }
    }

    /// Like [`run`](Self::run), but give up after `timeout`
    pub fn run_timeout(&self, timeout: Duration) -> Result<(), TimedOutError> {
        self.run_deadline(Instant::now() + timeout)
    }

    /// Like [`run`](Self::run), but give up at `deadline`
    pub fn run_deadline(&self, deadline: Instant) -> Result<(), TimedOutError> {
        self.shared.run(Timeout::At(deadline))
    }

    /// Mark the loop as finished
    ///
    /// Work already queued still runs. Once a thread running the loop observes the queue empty,
    /// the loop closes and all threads running it return.
    pub fn finish(&self) {
        self.shared.finish()
    }

    /// Close the loop, completing queued work with stopped
    pub fn close(&self) {
        self.shared.close()
    }

    /// Whether the loop has closed
    pub fn is_closed(&self) -> bool {
        self.shared.state() == LoopState::Closed
    }
}

impl Default for SynchronizedRunLoop {
    fn default() -> Self {
        SynchronizedRunLoop::new()
    }
}

impl Drop for SynchronizedRunLoop {
    fn drop(&mut self) {
        self.shared.close();
    }
}

impl Debug for SynchronizedRunLoop {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("SynchronizedRunLoop").field("state", &self.shared.state()).finish()
    }
}


/// Scheduler of a [`RunLoop`] or [`SynchronizedRunLoop`]
///
/// Equal to another run-loop scheduler if both schedule onto the same loop.
#[derive(Clone)]
pub struct RunLoopScheduler {
    shared: Arc<Shared>,
    progress: ForwardProgressGuarantee,
}

impl RunLoopScheduler {
    fn new(shared: Arc<Shared>, progress: ForwardProgressGuarantee) -> Self {
        RunLoopScheduler { shared, progress }
    }

    // finish the loop this schedules onto.
    pub(crate) fn finish_loop(&self) {
        self.shared.finish()
    }
}

impl PartialEq for RunLoopScheduler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl Eq for RunLoopScheduler {}

impl Debug for RunLoopScheduler {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("RunLoopScheduler")
            .field("loop", &Arc::as_ptr(&self.shared))
            .field("progress", &self.progress)
            .finish()
    }
}

impl Scheduler for RunLoopScheduler {
    type Sender = ScheduleSender;

    fn schedule(&self) -> ScheduleSender {
        ScheduleSender { scheduler: self.clone() }
    }

    fn forward_progress_guarantee(&self) -> ForwardProgressGuarantee {
        self.progress
    }
}


/// Sender which completes on a run-loop
///
/// Completes with `()` when the loop runs it, or with stopped if stop was requested by then or the
/// loop closed first.
#[derive(Debug, Clone)]
pub struct ScheduleSender {
    scheduler: RunLoopScheduler,
}

impl Sender for ScheduleSender {
    type Value = ();
    type Operation<R: Receiver<()>> = ScheduleOperation<R>;

    fn connect<R: Receiver<()>>(self, receiver: R) -> ScheduleOperation<R> {
        ScheduleOperation { shared: self.scheduler.shared, receiver }
    }

    fn env(&self) -> Env {
        let scheduler = AnyScheduler::new(self.scheduler.clone());
        Env::empty()
            .with(GetCompletionScheduler::<SetValue>::new(), scheduler.clone())
            .with(GetCompletionScheduler::<SetStopped>::new(), scheduler)
    }

    fn completion_signatures(&self, _: &Env) -> CompletionSignatures {
        CompletionSignatures::value::<()>().union(&CompletionSignatures::stopped())
    }
}

crate::adaptors::pipe::impl_pipe!([] ScheduleSender);

/// Operation state of [`ScheduleSender`]
pub struct ScheduleOperation<R> {
    shared: Arc<Shared>,
    receiver: R,
}

impl<R: Receiver<()>> OperationState for ScheduleOperation<R> {
    fn start(self) {
        self.shared.push(Box::new(ScheduleTask(self.receiver)));
    }
}

// a started schedule operation, queued on the loop.
struct ScheduleTask<R>(R);

impl<R: Receiver<()>> Task for ScheduleTask<R> {
    fn execute(self: Box<Self>) {
        let ScheduleTask(receiver) = *self;
        if get_stop_token(&receiver.env()).stop_requested() {
            receiver.set_stopped();
        } else {
            receiver.set_value(());
        }
    }

    fn abandon(self: Box<Self>) {
        let ScheduleTask(receiver) = *self;
        receiver.set_stopped();
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adaptors::SenderExt,
        query::{get_completion_scheduler, GetStopToken},
        scheduler::schedule,
        sender::connect,
        stop::StopSource,
        test_util::Recorder,
    };
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;
    use std::{
        sync::Mutex,
        thread,
    };

    #[test]
    fn run_executes_in_fifo_order() {
        let run_loop = RunLoop::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            let (recorder, _recording) = Recorder::new();
            connect(schedule(&run_loop.scheduler()).then(move |()| log.lock().unwrap().push(name)), recorder)
                .start();
        }
        assert!(log.lock().unwrap().is_empty());
        run_loop.run();
        assert_eq!(*log.lock().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn run_returns_when_empty() {
        let run_loop = RunLoop::new();
        run_loop.run();
        assert!(!run_loop.is_closed());
        run_loop.finish();
        run_loop.run();
        assert!(run_loop.is_closed());
    }

    #[test]
    fn finish_drains_pending_work() {
        let run_loop = SynchronizedRunLoop::new();
        let (recorder, recording) = Recorder::new();
        connect(run_loop.scheduler().schedule().then(|()| 1), recorder).start();
        run_loop.finish();
        run_loop.run();
        assert_eq!(recording.value(), 1);
        assert!(run_loop.is_closed());
    }

    #[test]
    fn stop_requested_completes_stopped() {
        let run_loop = RunLoop::new();
        let source = StopSource::new();
        let (recorder, recording) = Recorder::with_env(Env::empty().with(GetStopToken, source.token()));
        connect(run_loop.scheduler().schedule(), recorder).start();
        source.request_stop();
        run_loop.run();
        recording.stopped();
    }

    #[test]
    fn closed_loop_completes_stopped() {
        let run_loop = RunLoop::new();
        let scheduler = run_loop.scheduler();

        let (queued, queued_recording) = Recorder::new();
        connect(scheduler.schedule(), queued).start();
        drop(run_loop);
        queued_recording.stopped();

        let (late, late_recording) = Recorder::new();
        connect(scheduler.schedule(), late).start();
        late_recording.stopped();
    }

    #[test]
    fn schedule_sender_attrs_name_completion_scheduler() {
        let run_loop = RunLoop::new();
        let sender = run_loop.scheduler().schedule();
        let expected = AnyScheduler::new(run_loop.scheduler());
        assert_eq!(get_completion_scheduler::<SetValue>(&sender.env()), Some(expected.clone()));
        // forwarded through adaptors
        let sender = sender.then(|()| 0);
        assert_eq!(get_completion_scheduler::<SetStopped>(&sender.env()), Some(expected));
    }

    #[test]
    fn run_timeout_on_idle_loop() {
        let run_loop = SynchronizedRunLoop::new();
        assert_eq!(run_loop.run_timeout(Duration::from_millis(10)), Err(TimedOutError));
        assert!(!run_loop.is_closed());
    }

    // many threads schedule onto one loop driven by one thread. every item must complete, and
    // items from one thread must run in the order that thread scheduled them.
    #[test]
    fn concurrent_schedulers_keep_per_thread_order() {
        let run_loop = Arc::new(SynchronizedRunLoop::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = {
            let run_loop = Arc::clone(&run_loop);
            thread::spawn(move || run_loop.run())
        };
        let mut rng = Pcg32::from_seed(0xdeadbeefdeadbeefdeadbeefdeadbeefu128.to_le_bytes());
        let producers = (0..4)
            .map(|t| {
                let scheduler = run_loop.scheduler();
                let log = Arc::clone(&log);
                let count = rng.gen_range(1..200);
                let seed = rng.gen::<u64>();
                thread::spawn(move || {
                    let mut rng = Pcg32::seed_from_u64(seed);
                    for i in 0..count {
                        let log = Arc::clone(&log);
                        let (recorder, _recording) = Recorder::new();
                        connect(
                            scheduler.schedule().then(move |()| log.lock().unwrap().push((t, i))),
                            recorder,
                        ).start();
                        if rng.gen_bool(0.1) {
                            thread::yield_now();
                        }
                    }
                    count
                })
            })
            .collect::<Vec<_>>();
        let counts = producers.into_iter().map(|p| p.join().unwrap()).collect::<Vec<_>>();
        run_loop.finish();
        runner.join().unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), counts.iter().sum::<usize>());
        for (t, &count) in counts.iter().enumerate() {
            let seen = log.iter().filter(|&&(u, _)| u == t).map(|&(_, i)| i).collect::<Vec<_>>();
            assert_eq!(seen, (0..count).collect::<Vec<_>>());
        }
    }
}
