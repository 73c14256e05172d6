//! Schedulers: handles to execution contexts

use crate::{
    domain::Domain,
    query::ForwardProgressGuarantee,
    sender::{AnySender, Sender},
};
use std::{
    any::{Any, type_name},
    fmt::{self, Debug, Formatter},
    sync::Arc,
};


/// Lightweight handle to an execution context
///
/// The sender returned by [`schedule`](Scheduler::schedule) completes with `()` on the value
/// channel from within the execution context, or with stopped if the context is shut down or
/// stop is requested before the work runs. Two schedulers compare equal if they schedule onto the
/// same execution context.
pub trait Scheduler: Clone + PartialEq + Send + Sync + 'static {
    /// Sender produced by [`schedule`](Scheduler::schedule)
    type Sender: Sender<Value = ()>;

    /// Describe transitioning onto the execution context
    fn schedule(&self) -> Self::Sender;

    /// How execution agents of this context progress relative to each other
    fn forward_progress_guarantee(&self) -> ForwardProgressGuarantee {
        ForwardProgressGuarantee::WeaklyParallel
    }

    /// Domain senders completing on this context are transformed in
    fn domain(&self) -> Domain {
        Domain::default()
    }
}

/// Describe transitioning onto the scheduler's execution context
pub fn schedule<S: Scheduler>(scheduler: &S) -> S::Sender {
    scheduler.schedule()
}


/// Type-erased [`Scheduler`], as stored in environments
#[derive(Clone)]
pub struct AnyScheduler(Arc<dyn DynScheduler>);

trait DynScheduler: Send + Sync {
    fn schedule_dyn(&self) -> AnySender<()>;

    fn forward_progress_guarantee_dyn(&self) -> ForwardProgressGuarantee;

    fn domain_dyn(&self) -> Domain;

    fn eq_dyn(&self, other: &dyn Any) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn type_name_dyn(&self) -> &'static str;
}

impl<S: Scheduler> DynScheduler for S {
    fn schedule_dyn(&self) -> AnySender<()> {
        self.schedule().boxed()
    }

    fn forward_progress_guarantee_dyn(&self) -> ForwardProgressGuarantee {
        self.forward_progress_guarantee()
    }

    fn domain_dyn(&self) -> Domain {
        self.domain()
    }

    fn eq_dyn(&self, other: &dyn Any) -> bool {
        other.downcast_ref::<S>().is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name_dyn(&self) -> &'static str {
        type_name::<S>()
    }
}

impl AnyScheduler {
    /// Erase the type of a scheduler
    pub fn new<S: Scheduler>(scheduler: S) -> Self {
        AnyScheduler(Arc::new(scheduler))
    }

    /// Get the underlying scheduler, if it is of type `S`
    pub fn downcast_ref<S: Scheduler>(&self) -> Option<&S> {
        self.0.as_any().downcast_ref::<S>()
    }
}

impl Scheduler for AnyScheduler {
    type Sender = AnySender<()>;

    fn schedule(&self) -> AnySender<()> {
        self.0.schedule_dyn()
    }

    fn forward_progress_guarantee(&self) -> ForwardProgressGuarantee {
        self.0.forward_progress_guarantee_dyn()
    }

    fn domain(&self) -> Domain {
        self.0.domain_dyn()
    }
}

impl PartialEq for AnyScheduler {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_dyn(other.0.as_any())
    }
}

impl Debug for AnyScheduler {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("AnyScheduler").field(&self.0.type_name_dyn()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adaptors::SenderExt,
        run_loop::{RunLoop, RunLoopScheduler},
        sender::connect,
        operation::OperationState,
        test_util::Recorder,
    };

    #[test]
    fn any_scheduler_equality_follows_inner() {
        let a = RunLoop::new();
        let b = RunLoop::new();
        assert_eq!(AnyScheduler::new(a.scheduler()), AnyScheduler::new(a.scheduler()));
        assert_ne!(AnyScheduler::new(a.scheduler()), AnyScheduler::new(b.scheduler()));
        let erased = AnyScheduler::new(a.scheduler());
        assert!(erased.downcast_ref::<RunLoopScheduler>().is_some());
        assert_eq!(erased.forward_progress_guarantee(), a.scheduler().forward_progress_guarantee());
    }

    #[test]
    fn any_scheduler_schedules_on_inner() {
        let run_loop = RunLoop::new();
        let scheduler = AnyScheduler::new(run_loop.scheduler());
        let (recorder, recording) = Recorder::new();
        connect(schedule(&scheduler).then(|()| 9), recorder).start();
        assert_eq!(recording.count(), 0);
        run_loop.run();
        assert_eq!(recording.value(), 9);
    }
}
