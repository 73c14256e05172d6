//! Receivers: the consuming end of an operation

use crate::{
    env::Env,
    error::Error,
};


/// Consumer of exactly one completion of an operation
///
/// All three completion methods take `self` by value, so a receiver can only ever be completed
/// once. An operation which has been started must eventually call exactly one of them.
///
/// Completion methods must not fail. Anything which could go wrong while producing the arguments
/// of a completion is to be caught beforehand and sent through [`set_error`](Self::set_error).
pub trait Receiver<V>: Send + 'static {
    /// Complete with a value
    fn set_value(self, value: V);

    /// Complete with an error
    fn set_error(self, error: Error);

    /// Complete with neither value nor error, because the work was cancelled
    fn set_stopped(self);

    /// The environment the operation completes into
    fn env(&self) -> Env {
        Env::empty()
    }
}


/// Type-erased [`Receiver`]
pub struct AnyReceiver<V>(Box<dyn DynReceiver<V>>);

trait DynReceiver<V>: Send {
    fn set_value_dyn(self: Box<Self>, value: V);

    fn set_error_dyn(self: Box<Self>, error: Error);

    fn set_stopped_dyn(self: Box<Self>);

    fn env_dyn(&self) -> Env;
}

impl<V, R: Receiver<V>> DynReceiver<V> for R {
    fn set_value_dyn(self: Box<Self>, value: V) {
        (*self).set_value(value)
    }

    fn set_error_dyn(self: Box<Self>, error: Error) {
        (*self).set_error(error)
    }

    fn set_stopped_dyn(self: Box<Self>) {
        (*self).set_stopped()
    }

    fn env_dyn(&self) -> Env {
        self.env()
    }
}

impl<V: 'static> AnyReceiver<V> {
    /// Erase the type of a receiver
    pub fn new<R: Receiver<V>>(receiver: R) -> Self {
        AnyReceiver(Box::new(receiver))
    }
}

impl<V: 'static> Receiver<V> for AnyReceiver<V> {
    fn set_value(self, value: V) {
        self.0.set_value_dyn(value)
    }

    fn set_error(self, error: Error) {
        self.0.set_error_dyn(error)
    }

    fn set_stopped(self) {
        self.0.set_stopped_dyn()
    }

    fn env(&self) -> Env {
        self.0.env_dyn()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        completion::Completion,
        query::GetStopToken,
        stop::StopSource,
        test_util::Recorder,
    };

    #[test]
    fn any_receiver_delegates() {
        let source = StopSource::new();
        let (recorder, recording) = Recorder::<u8>::with_env(
            Env::empty().with(GetStopToken, source.token())
        );
        let erased = AnyReceiver::new(recorder);
        assert!(erased.env().contains::<GetStopToken>());
        erased.set_value(4);
        assert!(matches!(recording.single(), Completion::Value(4)));
    }
}
