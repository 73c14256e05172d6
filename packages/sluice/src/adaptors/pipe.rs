//! Pipe form of the adaptors
//!
//! Each function here takes the adaptor's arguments except for the sender, and returns a
//! [`Closure`] which is applied to a sender with `|`:
//!
//! ```
//! use sluice::{just, pipe, sync_wait};
//!
//! let sender = just((1, 2, 3))
//!     | pipe::then(|(a, b, c): (i32, i32, i32)| a + b + c)
//!     | pipe::then(|n: i32| n * 2);
//! assert_eq!(sync_wait(sender).unwrap(), Some(12));
//! ```

use crate::{
    adaptors::{
        let_value::LetTag,
        then::ThenTag,
    },
    basic::BasicSender,
    completion::{SetError, SetStopped, SetValue},
    sender::AnySender,
};
use std::marker::PhantomData;


/// An adaptor with all arguments except its sender bound, applied to a sender with `|`
pub struct Closure<T, F> {
    tag: PhantomData<fn() -> T>,
    f: F,
}

impl<T, F> Closure<T, F> {
    fn new(f: F) -> Self {
        Closure { tag: PhantomData, f }
    }

    /// Apply the adaptor to a sender
    pub fn apply<S>(self, sender: S) -> BasicSender<T, F, (S,)> {
        BasicSender::new(self.f, (sender,))
    }
}

/// Pipe form of [`then`](crate::then)
pub fn then<F>(f: F) -> Closure<ThenTag<SetValue>, F> {
    Closure::new(f)
}

/// Pipe form of [`upon_error`](crate::upon_error)
pub fn upon_error<F>(f: F) -> Closure<ThenTag<SetError>, F> {
    Closure::new(f)
}

/// Pipe form of [`upon_stopped`](crate::upon_stopped)
pub fn upon_stopped<F>(f: F) -> Closure<ThenTag<SetStopped>, F> {
    Closure::new(f)
}

/// Pipe form of [`let_value`](crate::let_value)
pub fn let_value<F>(f: F) -> Closure<LetTag<SetValue>, F> {
    Closure::new(f)
}

/// Pipe form of [`let_error`](crate::let_error)
pub fn let_error<F>(f: F) -> Closure<LetTag<SetError>, F> {
    Closure::new(f)
}

/// Pipe form of [`let_stopped`](crate::let_stopped)
pub fn let_stopped<F>(f: F) -> Closure<LetTag<SetStopped>, F> {
    Closure::new(f)
}


// implement `sender | closure` for a sender type. generic parameters of the sender type go in the
// brackets, each followed by a comma.
macro_rules! impl_pipe {
    ([$($generics:tt)*] $sender:ty) => {
        impl<$($generics)* PipeTag, PipeFn> std::ops::BitOr<$crate::adaptors::pipe::Closure<PipeTag, PipeFn>>
        for $sender
        {
            type Output = $crate::basic::BasicSender<PipeTag, PipeFn, ($sender,)>;

            fn bitor(self, closure: $crate::adaptors::pipe::Closure<PipeTag, PipeFn>) -> Self::Output {
                closure.apply(self)
            }
        }
    };
}

pub(crate) use impl_pipe;

impl_pipe!([T, D, C,] BasicSender<T, D, C>);
impl_pipe!([V,] AnySender<V>);


#[cfg(test)]
mod tests {
    use crate::{
        adaptors::{just, just_error, just_stopped},
        pipe,
        sender::{connect, Sender},
        operation::OperationState,
        test_util::Recorder,
    };

    #[test]
    fn pipe_then() {
        let (recorder, recording) = Recorder::new();
        let sender = just((1, 2, 3)) | pipe::then(|(a, b, c): (i32, i32, i32)| a + b + c);
        connect(sender, recorder).start();
        assert_eq!(recording.value(), 6);
    }

    #[test]
    fn pipe_chains_across_erasure() {
        let sender = (just(3) | pipe::then(|v: i32| v + 1)).boxed()
            | pipe::let_value(|v: i32| just(v * 10))
            | pipe::then(|v: i32| v.to_string());
        let (recorder, recording) = Recorder::new();
        connect(sender, recorder).start();
        assert_eq!(recording.value(), "40");
    }

    #[test]
    fn pipe_recovery() {
        let sender = just_error::<i32>(anyhow::anyhow!("x"))
            | pipe::upon_error(|_| -1)
            | pipe::let_stopped(|| just(0));
        let (recorder, recording) = Recorder::new();
        connect(sender, recorder).start();
        assert_eq!(recording.value(), -1);

        let sender = just_stopped::<i32>()
            | pipe::let_error(|_| just(1))
            | pipe::upon_stopped(|| 2);
        let (recorder, recording) = Recorder::new();
        connect(sender, recorder).start();
        assert_eq!(recording.value(), 2);
    }
}
