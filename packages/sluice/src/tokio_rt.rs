//! Scheduling onto a tokio runtime

use crate::{
    completion::{CompletionSignatures, SetStopped, SetValue},
    env::Env,
    operation::OperationState,
    query::{get_stop_token, ForwardProgressGuarantee, GetCompletionScheduler},
    receiver::Receiver,
    scheduler::{AnyScheduler, Scheduler},
    sender::Sender,
};
use std::{
    fmt::{self, Debug, Formatter},
    sync::Arc,
};
use tokio::runtime::{Handle, TryCurrentError};


/// Scheduler which spawns work as tasks on a tokio runtime
///
/// Two tokio schedulers are equal if one was cloned from the other, since they then hand work to
/// the same runtime handle.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
    // identity of the scheduler, for equality.
    id: Arc<()>,
}

impl TokioScheduler {
    /// Schedule onto the runtime of the given handle
    pub fn new(handle: Handle) -> Self {
        TokioScheduler { handle, id: Arc::new(()) }
    }

    /// Schedule onto the runtime of the current context
    ///
    /// Panics if not called from within a tokio runtime.
    pub fn current() -> Self {
        TokioScheduler::new(Handle::current())
    }

    /// Schedule onto the runtime of the current context, if there is one
    pub fn try_current() -> Result<Self, TryCurrentError> {
        Handle::try_current().map(TokioScheduler::new)
    }

    /// The runtime handle work is spawned on
    pub fn handle(&self) -> &Handle {
        &self.handle
    }
}

impl PartialEq for TokioScheduler {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.id, &other.id)
    }
}

impl Eq for TokioScheduler {}

impl Debug for TokioScheduler {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("TokioScheduler").field("id", &Arc::as_ptr(&self.id)).finish()
    }
}

impl Scheduler for TokioScheduler {
    type Sender = TokioScheduleSender;

    fn schedule(&self) -> TokioScheduleSender {
        TokioScheduleSender { scheduler: self.clone() }
    }

    fn forward_progress_guarantee(&self) -> ForwardProgressGuarantee {
        ForwardProgressGuarantee::Parallel
    }
}


/// Sender which completes on a tokio runtime task
///
/// Completes with `()` from within a spawned task, or with stopped if stop was requested by then
/// or the runtime dropped the task without running it.
#[derive(Debug, Clone)]
pub struct TokioScheduleSender {
    scheduler: TokioScheduler,
}

impl Sender for TokioScheduleSender {
    type Value = ();
    type Operation<R: Receiver<()>> = TokioScheduleOperation<R>;

    fn connect<R: Receiver<()>>(self, receiver: R) -> TokioScheduleOperation<R> {
        TokioScheduleOperation { handle: self.scheduler.handle, receiver }
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

crate::adaptors::pipe::impl_pipe!([] TokioScheduleSender);

/// Operation state of [`TokioScheduleSender`]
pub struct TokioScheduleOperation<R> {
    handle: Handle,
    receiver: R,
}

impl<R: Receiver<()>> OperationState for TokioScheduleOperation<R> {
    fn start(self) {
        let guard = StopOnDrop(Some(self.receiver));
        // the task is detached. a runtime shutting down drops it, and with it the guard.
        drop(self.handle.spawn(async move { guard.complete() }));
    }
}

// receiver held by a spawned task, completed with stopped if the task is dropped before it runs.
struct StopOnDrop<R: Receiver<()>>(Option<R>);

impl<R: Receiver<()>> StopOnDrop<R> {
    fn complete(mut self) {
        if let Some(receiver) = self.0.take() {
            if get_stop_token(&receiver.env()).stop_requested() {
                receiver.set_stopped();
            } else {
                receiver.set_value(());
            }
        }
    }
}

impl<R: Receiver<()>> Drop for StopOnDrop<R> {
    fn drop(&mut self) {
        if let Some(receiver) = self.0.take() {
            debug!("tokio task dropped before running, completing it stopped");
            receiver.set_stopped();
        }
    }
}
