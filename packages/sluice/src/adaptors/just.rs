// senders which complete immediately on start.

use crate::{
    basic::{BasicSender, SenderImpl, StartImpl},
    completion::{CompletionSignatures, SetError, SetStopped, SetValue},
    env::Env,
    error::Error,
    receiver::Receiver,
};
use std::marker::PhantomData;


/// Tag for senders which complete immediately on channel `C`
pub struct JustTag<C>(PhantomData<C>);

/// Data of [`JustError`]
pub struct JustErrorData<V> {
    error: Error,
    _value: PhantomData<fn() -> V>,
}

/// Data of [`JustStopped`]
pub struct JustStoppedData<V>(PhantomData<fn() -> V>);

/// Sender returned by [`just`]
pub type Just<V> = BasicSender<JustTag<SetValue>, V, ()>;

/// Sender returned by [`just_error`]
pub type JustError<V> = BasicSender<JustTag<SetError>, JustErrorData<V>, ()>;

/// Sender returned by [`just_stopped`]
pub type JustStopped<V> = BasicSender<JustTag<SetStopped>, JustStoppedData<V>, ()>;

/// Sender completing with `value` as soon as it is started
///
/// Multiple values are sent as a tuple.
pub fn just<V: Send + 'static>(value: V) -> Just<V> {
    BasicSender::new(value, ())
}

/// Sender completing with `error` as soon as it is started
///
/// The value type `V` is never sent, but determines what type of sender this is.
pub fn just_error<V: Send + 'static>(error: impl Into<Error>) -> JustError<V> {
    BasicSender::new(JustErrorData { error: error.into(), _value: PhantomData }, ())
}

/// Sender completing with stopped as soon as it is started
pub fn just_stopped<V: Send + 'static>() -> JustStopped<V> {
    BasicSender::new(JustStoppedData(PhantomData), ())
}


impl<V: Send + 'static> SenderImpl<V, ()> for JustTag<SetValue> {
    type Value = V;
    type State = V;

    fn get_state(value: V) -> V {
        value
    }

    fn signatures(_: &V, _: &(), _: &Env) -> CompletionSignatures {
        CompletionSignatures::value::<V>()
    }
}

impl<V: Send + 'static> StartImpl<V> for JustTag<SetValue> {
    fn start<R: Receiver<V>>(value: V, receiver: R) {
        receiver.set_value(value)
    }
}

impl<V: Send + 'static> SenderImpl<JustErrorData<V>, ()> for JustTag<SetError> {
    type Value = V;
    type State = Error;

    fn get_state(data: JustErrorData<V>) -> Error {
        data.error
    }

    fn signatures(_: &JustErrorData<V>, _: &(), _: &Env) -> CompletionSignatures {
        CompletionSignatures::error()
    }
}

impl<V: Send + 'static> StartImpl<JustErrorData<V>> for JustTag<SetError> {
    fn start<R: Receiver<V>>(error: Error, receiver: R) {
        receiver.set_error(error)
    }
}

impl<V: Send + 'static> SenderImpl<JustStoppedData<V>, ()> for JustTag<SetStopped> {
    type Value = V;
    type State = ();

    fn get_state(_: JustStoppedData<V>) {}

    fn signatures(_: &JustStoppedData<V>, _: &(), _: &Env) -> CompletionSignatures {
        CompletionSignatures::stopped()
    }
}

impl<V: Send + 'static> StartImpl<JustStoppedData<V>> for JustTag<SetStopped> {
    fn start<R: Receiver<V>>(_: (), receiver: R) {
        receiver.set_stopped()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        completion::{Channel, Signature},
        sender::{connect, completion_signatures},
        operation::OperationState,
        error::QueryUnavailable,
        test_util::Recorder,
    };

    #[test]
    fn just_completes_before_start_returns() {
        let (recorder, recording) = Recorder::new();
        let operation = connect(just((1, "two", 3.0)), recorder);
        assert_eq!(recording.count(), 0);
        operation.start();
        assert_eq!(recording.value(), (1, "two", 3.0));
    }

    #[test]
    fn just_error_delivers_error() {
        let (recorder, recording) = Recorder::<u8>::new();
        connect(just_error::<u8>(QueryUnavailable { query: "x" }), recorder).start();
        let error = recording.error();
        assert_eq!(error.downcast_ref::<QueryUnavailable>(), Some(&QueryUnavailable { query: "x" }));
    }

    #[test]
    fn just_stopped_delivers_stopped() {
        let (recorder, recording) = Recorder::<String>::new();
        connect(just_stopped::<String>(), recorder).start();
        recording.stopped();
    }

    #[test]
    fn signatures_have_exactly_one_entry() {
        let env = Env::empty();
        let sigs = completion_signatures(&just(5u16), &env);
        assert_eq!(sigs.len(), 1);
        assert!(sigs.contains(&Signature::value::<u16>()));

        let sigs = completion_signatures(&just_error::<u16>(anyhow::anyhow!("e")), &env);
        assert_eq!(sigs.len(), 1);
        assert!(sigs.sends(Channel::Error));

        let sigs = completion_signatures(&just_stopped::<u16>(), &env);
        assert_eq!(sigs.len(), 1);
        assert!(sigs.sends(Channel::Stopped));
    }
}
