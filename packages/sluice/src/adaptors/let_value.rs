// adaptors continuing with a new sender produced from a completion.

use crate::{
    basic::{BasicSender, Children, CompleteImpl, SenderImpl},
    completion::{Channel, Completion, CompletionSignatures, SetError, SetStopped, SetValue},
    env::Env,
    error::{invoke, Error},
    operation::OperationState,
    query::GetCompletionScheduler,
    receiver::Receiver,
    sender::{completion_signatures, connect, Sender},
};
use std::marker::PhantomData;


/// Tag for adaptors which continue with a sender produced from completions on channel `C`
pub struct LetTag<C>(PhantomData<C>);

/// Sender returned by [`let_value`]
pub type LetValue<S, F> = BasicSender<LetTag<SetValue>, F, (S,)>;

/// Sender returned by [`let_error`]
pub type LetError<S, F> = BasicSender<LetTag<SetError>, F, (S,)>;

/// Sender returned by [`let_stopped`]
pub type LetStopped<S, F> = BasicSender<LetTag<SetStopped>, F, (S,)>;

/// Continue with the sender `f` returns when given the value `sender` completes with
///
/// The new sender is connected to the downstream receiver (so domains apply to it) and started
/// right away. If `f` panics, the panic is sent on the error channel. Errors and stopped pass
/// through.
pub fn let_value<S, F, S2>(sender: S, f: F) -> LetValue<S, F>
where
    S: Sender,
    F: FnOnce(S::Value) -> S2 + Send + 'static,
    S2: Sender,
{
    BasicSender::new(f, (sender,))
}

/// Continue with the sender `f` returns when given the error `sender` completes with
pub fn let_error<S, F, S2>(sender: S, f: F) -> LetError<S, F>
where
    S: Sender,
    F: FnOnce(Error) -> S2 + Send + 'static,
    S2: Sender<Value = S::Value>,
{
    BasicSender::new(f, (sender,))
}

/// Continue with the sender `f` returns when `sender` completes with stopped
pub fn let_stopped<S, F, S2>(sender: S, f: F) -> LetStopped<S, F>
where
    S: Sender,
    F: FnOnce() -> S2 + Send + 'static,
    S2: Sender<Value = S::Value>,
{
    BasicSender::new(f, (sender,))
}


// invoke the continuation factory, then connect and start what it produced.
fn continue_with<S2, R>(receiver: R, f: impl FnOnce() -> S2)
where
    S2: Sender,
    R: Receiver<S2::Value>,
{
    match invoke(f) {
        Ok(next) => connect(next, receiver).start(),
        Err(error) => receiver.set_error(error),
    }
}

// the continuation completes wherever it happens to run, so the child's completion schedulers
// are not passed through.
fn let_attrs(children: &impl Children) -> Env {
    children.attrs()
        .without::<GetCompletionScheduler<SetValue>>()
        .without::<GetCompletionScheduler<SetError>>()
        .without::<GetCompletionScheduler<SetStopped>>()
}

// the continuation sender only exists once the child completes, so its signatures are
// over-approximated from its type: any value of its value type, error, or stopped.
fn let_signatures<V2: 'static>(child: CompletionSignatures, channel: Channel) -> CompletionSignatures {
    let continuation = CompletionSignatures::value::<V2>()
        .union(&CompletionSignatures::error())
        .union(&CompletionSignatures::stopped());
    child.replace(channel, &continuation).union(&CompletionSignatures::error())
}


impl<S, F, S2> SenderImpl<F, (S,)> for LetTag<SetValue>
where
    S: Sender,
    F: FnOnce(S::Value) -> S2 + Send + 'static,
    S2: Sender,
{
    type Value = S2::Value;
    type State = F;

    fn get_state(f: F) -> F {
        f
    }

    fn attrs(_: &F, children: &(S,)) -> Env {
        let_attrs(children)
    }

    fn signatures(_: &F, (child,): &(S,), env: &Env) -> CompletionSignatures {
        let_signatures::<S2::Value>(completion_signatures(child, env), Channel::Value)
    }
}

impl<S, F, S2> CompleteImpl<F, S> for LetTag<SetValue>
where
    S: Sender,
    F: FnOnce(S::Value) -> S2 + Send + 'static,
    S2: Sender,
{
    fn complete<R: Receiver<S2::Value>>(
        _: usize,
        f: F,
        receiver: R,
        completion: Completion<S::Value>,
    ) {
        match completion {
            Completion::Value(value) => continue_with(receiver, move || f(value)),
            Completion::Error(error) => receiver.set_error(error),
            Completion::Stopped => receiver.set_stopped(),
        }
    }
}

impl<S, F, S2> SenderImpl<F, (S,)> for LetTag<SetError>
where
    S: Sender,
    F: FnOnce(Error) -> S2 + Send + 'static,
    S2: Sender<Value = S::Value>,
{
    type Value = S::Value;
    type State = F;

    fn get_state(f: F) -> F {
        f
    }

    fn attrs(_: &F, children: &(S,)) -> Env {
        let_attrs(children)
    }

    fn signatures(_: &F, (child,): &(S,), env: &Env) -> CompletionSignatures {
        let_signatures::<S::Value>(completion_signatures(child, env), Channel::Error)
    }
}

impl<S, F, S2> CompleteImpl<F, S> for LetTag<SetError>
where
    S: Sender,
    F: FnOnce(Error) -> S2 + Send + 'static,
    S2: Sender<Value = S::Value>,
{
    fn complete<R: Receiver<S::Value>>(
        _: usize,
        f: F,
        receiver: R,
        completion: Completion<S::Value>,
    ) {
        match completion {
            Completion::Error(error) => continue_with(receiver, move || f(error)),
            other => other.deliver(receiver),
        }
    }
}

impl<S, F, S2> SenderImpl<F, (S,)> for LetTag<SetStopped>
where
    S: Sender,
    F: FnOnce() -> S2 + Send + 'static,
    S2: Sender<Value = S::Value>,
{
    type Value = S::Value;
    type State = F;

    fn get_state(f: F) -> F {
        f
    }

    fn attrs(_: &F, children: &(S,)) -> Env {
        let_attrs(children)
    }

    fn signatures(_: &F, (child,): &(S,), env: &Env) -> CompletionSignatures {
        let_signatures::<S::Value>(completion_signatures(child, env), Channel::Stopped)
    }
}

impl<S, F, S2> CompleteImpl<F, S> for LetTag<SetStopped>
where
    S: Sender,
    F: FnOnce() -> S2 + Send + 'static,
    S2: Sender<Value = S::Value>,
{
    fn complete<R: Receiver<S::Value>>(
        _: usize,
        f: F,
        receiver: R,
        completion: Completion<S::Value>,
    ) {
        match completion {
            Completion::Stopped => continue_with(receiver, f),
            other => other.deliver(receiver),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adaptors::{just, just_error, just_stopped, then},
        completion::Signature,
        domain::Domain,
        error::Panicked,
        query::{get_completion_scheduler, GetDomain},
        adaptors::Just,
        run_loop::RunLoop,
        scheduler::Scheduler,
        test_util::Recorder,
    };

    #[test]
    fn let_value_continues() {
        let (recorder, recording) = Recorder::new();
        connect(let_value(just(1), |v| just(v + 42)), recorder).start();
        assert_eq!(recording.value(), 43);
    }

    #[test]
    fn let_value_chains() {
        let sender = let_value(
            let_value(just(2), |v| then(just(v), |v| v * 3)),
            |v| let_value(just(v), |v| just(format!("{}", v + 1))),
        );
        let (recorder, recording) = Recorder::new();
        connect(sender, recorder).start();
        assert_eq!(recording.value(), "7");
    }

    #[test]
    fn let_value_continuation_can_fail() {
        let (recorder, recording) = Recorder::<i32>::new();
        connect(
            let_value(just(1), |_| just_error::<i32>(anyhow::anyhow!("inner"))),
            recorder,
        ).start();
        assert_eq!(recording.error().to_string(), "inner");
    }

    #[test]
    fn let_value_factory_panic_becomes_error() {
        let (recorder, recording) = Recorder::<i32>::new();
        connect(
            let_value(just(1), |_: i32| -> Just<i32> { panic!("factory") }),
            recorder,
        ).start();
        assert!(recording.error().downcast_ref::<Panicked>().is_some());
    }

    #[test]
    fn let_error_and_let_stopped_recover() {
        let (recorder, recording) = Recorder::new();
        connect(
            let_error(just_error::<u32>(anyhow::anyhow!("e")), |_| just(5u32)),
            recorder,
        ).start();
        assert_eq!(recording.value(), 5);

        let (recorder, recording) = Recorder::new();
        connect(let_stopped(just_stopped::<u32>(), || just(6u32)), recorder).start();
        assert_eq!(recording.value(), 6);

        let (recorder, recording) = Recorder::new();
        connect(let_stopped(just(7u32), || just(6u32)), recorder).start();
        assert_eq!(recording.value(), 7);
    }

    #[test]
    fn continuation_connects_through_domain() {
        let domain = Domain::builder("plus-hundred")
            .rule(|sender: Just<i32>, _: &Env| {
                let (v, ()) = sender.into_parts();
                then(just(()), move |()| v + 100).boxed()
            })
            .build();
        let (recorder, recording) = Recorder::with_env(Env::empty().with(GetDomain, domain));
        // both the outer just and the continuation are rewritten
        connect(let_value(just(1), |v| just(v * 2)), recorder).start();
        assert_eq!(recording.value(), 302);
    }

    #[test]
    fn signatures_over_approximate_continuation() {
        let sigs = let_value(just(1u8), |v| just(v as i64)).completion_signatures(&Env::empty());
        assert!(sigs.contains(&Signature::value::<i64>()));
        assert!(!sigs.contains(&Signature::value::<u8>()));
        assert!(sigs.sends(Channel::Error));
        assert!(sigs.sends(Channel::Stopped));
    }

    #[test]
    fn attrs_drop_child_completion_schedulers() {
        let first = RunLoop::new();
        let second = RunLoop::new();
        let next = second.scheduler();
        let child = first.scheduler().schedule();
        assert!(get_completion_scheduler::<SetValue>(&child.env()).is_some());

        let sender = let_value(child, move |()| next.schedule());
        let attrs = sender.env();
        assert!(get_completion_scheduler::<SetValue>(&attrs).is_none());
        assert!(get_completion_scheduler::<SetError>(&attrs).is_none());
        assert!(get_completion_scheduler::<SetStopped>(&attrs).is_none());
    }
}
