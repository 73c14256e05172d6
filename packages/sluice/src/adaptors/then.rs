// adaptors transforming one completion channel with a function.

use crate::{
    basic::{BasicSender, CompleteImpl, SenderImpl},
    completion::{Channel, Completion, CompletionSignatures, SetError, SetStopped, SetValue},
    env::Env,
    error::{invoke, Error},
    receiver::Receiver,
    sender::{completion_signatures, Sender},
};
use std::marker::PhantomData;


/// Tag for adaptors which map completions on channel `C` into values with a function
pub struct ThenTag<C>(PhantomData<C>);

/// Sender returned by [`then`]
pub type Then<S, F> = BasicSender<ThenTag<SetValue>, F, (S,)>;

/// Sender returned by [`upon_error`]
pub type UponError<S, F> = BasicSender<ThenTag<SetError>, F, (S,)>;

/// Sender returned by [`upon_stopped`]
pub type UponStopped<S, F> = BasicSender<ThenTag<SetStopped>, F, (S,)>;

/// Transform the value `sender` completes with by calling `f` on it
///
/// If `f` panics, the panic is sent on the error channel as a
/// [`Panicked`](crate::error::Panicked). Errors and stopped pass through.
pub fn then<S, F, U>(sender: S, f: F) -> Then<S, F>
where
    S: Sender,
    F: FnOnce(S::Value) -> U + Send + 'static,
    U: Send + 'static,
{
    BasicSender::new(f, (sender,))
}

/// Recover from an error `sender` completes with by calling `f` on it to produce a value
///
/// Values and stopped pass through.
pub fn upon_error<S, F>(sender: S, f: F) -> UponError<S, F>
where
    S: Sender,
    F: FnOnce(Error) -> S::Value + Send + 'static,
{
    BasicSender::new(f, (sender,))
}

/// Recover from `sender` being stopped by calling `f` to produce a value
///
/// Values and errors pass through.
pub fn upon_stopped<S, F>(sender: S, f: F) -> UponStopped<S, F>
where
    S: Sender,
    F: FnOnce() -> S::Value + Send + 'static,
{
    BasicSender::new(f, (sender,))
}


// deliver the result of a callback, or the panic it raised.
fn deliver_invoked<V, R: Receiver<V>>(receiver: R, f: impl FnOnce() -> V) {
    match invoke(f) {
        Ok(value) => receiver.set_value(value),
        Err(error) => receiver.set_error(error),
    }
}

// the child's signatures with the given channel replaced by a value of type U, plus error.
fn mapped_signatures<U: 'static>(
    child: CompletionSignatures,
    channel: Channel,
) -> CompletionSignatures {
    child.replace(channel, &CompletionSignatures::value::<U>())
        .union(&CompletionSignatures::error())
}


impl<S, F, U> SenderImpl<F, (S,)> for ThenTag<SetValue>
where
    S: Sender,
    F: FnOnce(S::Value) -> U + Send + 'static,
    U: Send + 'static,
{
    type Value = U;
    type State = F;

    fn get_state(f: F) -> F {
        f
    }

    fn signatures(_: &F, (child,): &(S,), env: &Env) -> CompletionSignatures {
        mapped_signatures::<U>(completion_signatures(child, env), Channel::Value)
    }
}

impl<S, F, U> CompleteImpl<F, S> for ThenTag<SetValue>
where
    S: Sender,
    F: FnOnce(S::Value) -> U + Send + 'static,
    U: Send + 'static,
{
    fn complete<R: Receiver<U>>(_: usize, f: F, receiver: R, completion: Completion<S::Value>) {
        match completion {
            Completion::Value(value) => deliver_invoked(receiver, move || f(value)),
            Completion::Error(error) => receiver.set_error(error),
            Completion::Stopped => receiver.set_stopped(),
        }
    }
}

impl<S, F> SenderImpl<F, (S,)> for ThenTag<SetError>
where
    S: Sender,
    F: FnOnce(Error) -> S::Value + Send + 'static,
{
    type Value = S::Value;
    type State = F;

    fn get_state(f: F) -> F {
        f
    }

    fn signatures(_: &F, (child,): &(S,), env: &Env) -> CompletionSignatures {
        mapped_signatures::<S::Value>(completion_signatures(child, env), Channel::Error)
    }
}

impl<S, F> CompleteImpl<F, S> for ThenTag<SetError>
where
    S: Sender,
    F: FnOnce(Error) -> S::Value + Send + 'static,
{
    fn complete<R: Receiver<S::Value>>(
        _: usize,
        f: F,
        receiver: R,
        completion: Completion<S::Value>,
    ) {
        match completion {
            Completion::Error(error) => deliver_invoked(receiver, move || f(error)),
            other => other.deliver(receiver),
        }
    }
}

impl<S, F> SenderImpl<F, (S,)> for ThenTag<SetStopped>
where
    S: Sender,
    F: FnOnce() -> S::Value + Send + 'static,
{
    type Value = S::Value;
    type State = F;

    fn get_state(f: F) -> F {
        f
    }

    fn signatures(_: &F, (child,): &(S,), env: &Env) -> CompletionSignatures {
        mapped_signatures::<S::Value>(completion_signatures(child, env), Channel::Stopped)
    }
}

impl<S, F> CompleteImpl<F, S> for ThenTag<SetStopped>
where
    S: Sender,
    F: FnOnce() -> S::Value + Send + 'static,
{
    fn complete<R: Receiver<S::Value>>(
        _: usize,
        f: F,
        receiver: R,
        completion: Completion<S::Value>,
    ) {
        match completion {
            Completion::Stopped => deliver_invoked(receiver, f),
            other => other.deliver(receiver),
        }
    }
}
