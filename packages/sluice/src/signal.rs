//! Senders completed by external events
//!
//! [`signal`] creates a sender and a handle with which non-sender code (a callback from a device,
//! another thread, a completion port) completes it. This is how events which are signalled outside
//! of any scheduler are brought into sender composition.

use crate::{
    completion::{Completion, CompletionSignatures},
    env::Env,
    error::Error,
    operation::OperationState,
    receiver::{AnyReceiver, Receiver},
    sender::Sender,
};
use std::{
    fmt::{self, Debug, Formatter},
    mem,
    sync::{Arc, Mutex},
};


/// Create a sender completed through a separate handle
///
/// The [`Signal`] sender completes with whatever the [`SignalSender`] handle is used to signal. If
/// the handle is dropped without signalling, the sender completes with stopped. Signalling may
/// happen before or after the sender is started.
pub fn signal<V: Send + 'static>() -> (Signal<V>, SignalSender<V>) {
    let shared = Arc::new(Mutex::new(State::Pending));
    (Signal { shared: Arc::clone(&shared) }, SignalSender { shared: Some(shared) })
}

// state shared between the two halves.
enum State<V> {
    // neither signalled nor started.
    Pending,
    // signalled, not yet started.
    Ready(Completion<V>),
    // started, not yet signalled.
    Waiting(AnyReceiver<V>),
    // completion delivered.
    Done,
}

/// Sender half of [`signal`]
pub struct Signal<V> {
    shared: Arc<Mutex<State<V>>>,
}

/// Producer half of [`signal`]
pub struct SignalSender<V: Send + 'static> {
    // none once signalled.
    shared: Option<Arc<Mutex<State<V>>>>,
}

/// Operation state of [`Signal`]
pub struct SignalOperation<V, R> {
    shared: Arc<Mutex<State<V>>>,
    receiver: R,
}

impl<V: Send + 'static> Sender for Signal<V> {
    type Value = V;
    type Operation<R: Receiver<V>> = SignalOperation<V, R>;

    fn connect<R: Receiver<V>>(self, receiver: R) -> SignalOperation<V, R> {
        SignalOperation { shared: self.shared, receiver }
    }

    fn completion_signatures(&self, _: &Env) -> CompletionSignatures {
        CompletionSignatures::value::<V>()
            .union(&CompletionSignatures::error())
            .union(&CompletionSignatures::stopped())
    }
}

crate::adaptors::pipe::impl_pipe!([V: Send + 'static,] Signal<V>);

impl<V: Send + 'static, R: Receiver<V>> OperationState for SignalOperation<V, R> {
    fn start(self) {
        let mut lock = self.shared.lock().unwrap();
        match mem::replace(&mut *lock, State::Done) {
            State::Pending => *lock = State::Waiting(AnyReceiver::new(self.receiver)),
            State::Ready(completion) => {
                drop(lock);
                completion.deliver(self.receiver);
            }
            State::Waiting(_) | State::Done => unreachable!("signal sender started twice"),
        }
    }
}

impl<V: Send + 'static> SignalSender<V> {
    /// Complete the sender with a value
    pub fn complete(mut self, value: V) {
        self.signal(Completion::Value(value))
    }

    /// Complete the sender with an error
    pub fn fail(mut self, error: impl Into<Error>) {
        self.signal(Completion::Error(error.into()))
    }

    /// Complete the sender with stopped
    pub fn cancel(mut self) {
        self.signal(Completion::Stopped)
    }

    fn signal(&mut self, completion: Completion<V>) {
        let Some(shared) = self.shared.take() else { return };
        let mut lock = shared.lock().unwrap();
        match mem::replace(&mut *lock, State::Done) {
            State::Pending => *lock = State::Ready(completion),
            State::Waiting(receiver) => {
                drop(lock);
                completion.deliver(receiver);
            }
            State::Ready(_) | State::Done => unreachable!("signal signalled twice"),
        }
    }
}

impl<V: Send + 'static> Drop for SignalSender<V> {
    fn drop(&mut self) {
        if self.shared.is_some() {
            trace!("signal dropped without signalling, completing it stopped");
            self.signal(Completion::Stopped);
        }
    }
}

impl<V> Debug for Signal<V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("Signal")
    }
}

impl<V: Send + 'static> Debug for SignalSender<V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("SignalSender").field("signalled", &self.shared.is_none()).finish()
    }
}
