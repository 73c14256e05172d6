// error types.
//
// the error channel of every sender carries an `anyhow::Error`. the concrete types below are the
// failures this crate itself produces; they reach receivers wrapped in that `anyhow::Error` and can
// be recovered with `downcast_ref`.

use std::{
    any::{Any, type_name},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Mutex,
};
use thiserror::Error;


/// Payload of the error completion channel
pub type Error = anyhow::Error;


// ==== base error types ====


/// Error for a user callback that panicked while producing a completion
///
/// The panic is caught where the callback was invoked and delivered through the error channel
/// instead of unwinding through the operation. The original panic payload is kept and can be
/// taken back out.
#[derive(Error, Debug)]
#[error("callback panicked: {message}")]
pub struct Panicked {
    message: String,
    // Mutex only so that the error is Sync, which anyhow requires.
    payload: Mutex<Option<Box<dyn Any + Send>>>,
}

impl Panicked {
    /// Wrap a payload caught by `catch_unwind`
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_owned()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "<non-string panic payload>".to_owned()
        };
        Panicked { message, payload: Mutex::new(Some(payload)) }
    }

    /// Human readable panic message, if the payload was a string
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the payload (if not yet taken) is of type `T`
    pub fn payload_is<T: Any>(&self) -> bool {
        self.payload.lock().unwrap().as_ref().is_some_and(|p| p.is::<T>())
    }

    /// Take the original panic payload, if not already taken
    ///
    /// Useful for resuming the panic with `std::panic::resume_unwind`.
    pub fn take_payload(&self) -> Option<Box<dyn Any + Send>> {
        self.payload.lock().unwrap().take()
    }
}

/// Error for reading a capability from an environment which neither carries it nor has a fallback
/// for it
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
#[error("environment does not provide query {query}")]
pub struct QueryUnavailable {
    /// Type name of the query
    pub query: &'static str,
}

impl QueryUnavailable {
    pub(crate) fn of<Q>() -> Self {
        QueryUnavailable { query: type_name::<Q>() }
    }
}

/// Error for a blocking wait that did not finish by its deadline
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("blocking wait timed out")]
pub struct TimedOutError;


// ==== compound error types ====


/// Error for waiting on a sender with [`sync_wait_timeout`](crate::sync_wait_timeout)
#[derive(Error, Debug)]
pub enum SyncWaitError {
    /// The sender completed with an error
    #[error("sender completed with an error: {0}")]
    Failed(#[source] Error),
    /// The sender did not complete in time
    #[error(transparent)]
    TimedOut(#[from] TimedOutError),
}


// ==== helpers ====


// run a user callback, converting a panic into an error for the error channel.
pub(crate) fn invoke<T>(f: impl FnOnce() -> T) -> Result<T, Error> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let panicked = Panicked::from_payload(payload);
        debug!(message = panicked.message(), "caught panic in sender callback");
        Error::new(panicked)
    })
}


#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Boom(u32);

    #[test]
    fn invoke_passes_through_return_value() {
        assert_eq!(invoke(|| 5).unwrap(), 5);
    }

    #[test]
    fn invoke_keeps_string_message() {
        // formatted from a runtime value, so the payload is an owned String
        let input = std::hint::black_box(3);
        let error = invoke(move || -> u32 { panic!("bad input {}", input) }).unwrap_err();
        let panicked = error.downcast_ref::<Panicked>().unwrap();
        assert_eq!(panicked.message(), "bad input 3");
        assert!(panicked.payload_is::<String>());
    }

    #[test]
    fn invoke_keeps_custom_payload() {
        let error = invoke(|| std::panic::panic_any(Boom(7))).unwrap_err();
        let panicked = error.downcast_ref::<Panicked>().unwrap();
        assert!(panicked.payload_is::<Boom>());
        let payload = panicked.take_payload().unwrap();
        assert_eq!(*payload.downcast::<Boom>().unwrap(), Boom(7));
        assert!(panicked.take_payload().is_none());
    }

    #[test]
    fn sync_wait_error_from_timeout() {
        let error = SyncWaitError::from(TimedOutError);
        assert!(matches!(error, SyncWaitError::TimedOut(TimedOutError)));
        assert_eq!(error.to_string(), "blocking wait timed out");
    }
}
