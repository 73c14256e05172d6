//! Blocking on a sender from synchronous code

use crate::{
    completion::Completion,
    domain::{resolve_domain, Algorithm},
    env::Env,
    error::{Error, SyncWaitError, TimedOutError},
    operation::OperationState,
    query::{GetDelegationScheduler, GetScheduler, GetStopToken},
    receiver::Receiver,
    run_loop::{RunLoopScheduler, SynchronizedRunLoop},
    scheduler::AnyScheduler,
    sender::{connect, Sender},
    stop::StopSource,
};
use std::{
    any::type_name,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};


/// Key for [`sync_wait`] as an [`Algorithm`], so a domain can take over how it runs a sender
///
/// The rule produces what `sync_wait` would return.
#[derive(Debug, Copy, Clone, Default)]
pub struct SyncWait;

impl Algorithm for SyncWait {
    type Output<S: Sender> = Result<Option<S::Value>, Error>;
}

/// Run a sender to completion, blocking the calling thread
///
/// The calling thread drives a fresh [`SynchronizedRunLoop`] until the sender completes. That loop
/// is offered to the sender as the receiver's scheduler and delegation scheduler, so work the
/// sender schedules onto it runs on the calling thread.
///
/// If the domain named by the sender's attributes has an apply rule for [`SyncWait`] and the
/// sender's type, the rule runs the sender instead.
///
/// Returns `Ok(Some(value))` on the value channel, `Err(error)` on the error channel, and
/// `Ok(None)` if the sender was stopped.
pub fn sync_wait<S: Sender>(sender: S) -> Result<Option<S::Value>, Error> {
    let domain = resolve_domain(&sender.env(), &Env::empty());
    let sender = match domain.apply_sender::<SyncWait, S>(sender) {
        Ok(result) => return result,
        Err(sender) => sender,
    };
    let waiter = Waiter::new();
    connect(sender, waiter.receiver()).start();
    waiter.run_loop.run();
    waiter.take().into_result()
}

/// Like [`sync_wait`], but give up after `timeout`
///
/// On timeout, stop is requested on the stop token offered to the sender and the run-loop is
/// closed, so that work still pending on it completes with stopped. Work the sender runs elsewhere
/// is not waited for. A value or error which arrives before the loop is closed is still returned,
/// but stopped at that point is reported as the timeout.
///
/// Domain apply rules are not consulted.
pub fn sync_wait_timeout<S: Sender>(
    sender: S,
    timeout: Duration,
) -> Result<Option<S::Value>, SyncWaitError> {
    let deadline = Instant::now() + timeout;
    let waiter = Waiter::new();
    connect(sender, waiter.receiver()).start();
    if waiter.run_loop.run_deadline(deadline).is_err() {
        return waiter.give_up(timeout, type_name::<S>());
    }
    waiter.take().into_result().map_err(SyncWaitError::Failed)
}


// state of one blocking wait.
struct Waiter<V> {
    run_loop: SynchronizedRunLoop,
    stop: StopSource,
    slot: Arc<Mutex<Option<Completion<V>>>>,
}

// receiver storing the completion and finishing the waiter's run-loop.
struct WaitReceiver<V> {
    slot: Arc<Mutex<Option<Completion<V>>>>,
    scheduler: RunLoopScheduler,
    env: Env,
}

impl<V: Send + 'static> Waiter<V> {
    fn new() -> Self {
        Waiter {
            run_loop: SynchronizedRunLoop::new(),
            stop: StopSource::new(),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    fn receiver(&self) -> WaitReceiver<V> {
        let scheduler = self.run_loop.scheduler();
        let erased = AnyScheduler::new(scheduler.clone());
        let env = Env::empty()
            .with(GetScheduler, erased.clone())
            .with(GetDelegationScheduler, erased)
            .with(GetStopToken, self.stop.token());
        WaitReceiver { slot: Arc::clone(&self.slot), scheduler, env }
    }

    fn try_take(&self) -> Option<Completion<V>> {
        self.slot.lock().unwrap().take()
    }

    // the deadline passed. completions may land from other threads until the loop is closed, so the
    // slot is checked both before and after closing it. stopped after closing comes from the loop
    // abandoning work, which is the timeout.
    fn give_up(&self, timeout: Duration, sender: &'static str) -> Result<Option<V>, SyncWaitError> {
        if let Some(completion) = self.try_take() {
            return completion.into_result().map_err(SyncWaitError::Failed);
        }
        warn!(?timeout, sender, "sync_wait timed out, requesting stop");
        self.stop.request_stop();
        self.run_loop.close();
        match self.try_take() {
            None | Some(Completion::Stopped) => Err(TimedOutError.into()),
            Some(completion) => completion.into_result().map_err(SyncWaitError::Failed),
        }
    }

    // take the completion after the run-loop has been finished and drained.
    fn take(&self) -> Completion<V> {
        // the loop is only ever finished by the receiver, after storing a completion
        self.try_take().unwrap_or(Completion::Stopped)
    }
}

impl<V> WaitReceiver<V> {
    fn complete(self, completion: Completion<V>) {
        *self.slot.lock().unwrap() = Some(completion);
        self.scheduler.finish_loop();
    }
}

impl<V: Send + 'static> Receiver<V> for WaitReceiver<V> {
    fn set_value(self, value: V) {
        self.complete(Completion::Value(value))
    }

    fn set_error(self, error: Error) {
        self.complete(Completion::Error(error))
    }

    fn set_stopped(self) {
        self.complete(Completion::Stopped)
    }

    fn env(&self) -> Env {
        self.env.clone()
    }
}
