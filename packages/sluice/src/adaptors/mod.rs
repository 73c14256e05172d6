//! Sender factories and adaptors
//!
//! Every adaptor is available in three forms: a free function taking the sender as its first
//! argument, a [`SenderExt`] method, and a [`pipe`] closure applied with `|`. They are all built on
//! [`BasicSender`](crate::basic::BasicSender).

pub(crate) mod just;
pub(crate) mod then;
pub(crate) mod let_value;
pub(crate) mod read_env;
pub mod pipe;

pub use self::{
    just::{just, just_error, just_stopped, Just, JustError, JustErrorData, JustStopped, JustStoppedData, JustTag},
    then::{then, upon_error, upon_stopped, Then, ThenTag, UponError, UponStopped},
    let_value::{let_error, let_stopped, let_value, LetError, LetStopped, LetTag, LetValue},
    read_env::{read_env, ReadEnv, ReadEnvTag},
};

use crate::{
    error::Error,
    sender::Sender,
};


/// Method form of the adaptors, for every sender
pub trait SenderExt: Sender {
    /// See [`then`]
    fn then<F, U>(self, f: F) -> Then<Self, F>
    where
        F: FnOnce(Self::Value) -> U + Send + 'static,
        U: Send + 'static,
    {
        then(self, f)
    }

    /// See [`upon_error`]
    fn upon_error<F>(self, f: F) -> UponError<Self, F>
    where
        F: FnOnce(Error) -> Self::Value + Send + 'static,
    {
        upon_error(self, f)
    }

    /// See [`upon_stopped`]
    fn upon_stopped<F>(self, f: F) -> UponStopped<Self, F>
    where
        F: FnOnce() -> Self::Value + Send + 'static,
    {
        upon_stopped(self, f)
    }

    /// See [`let_value`]
    fn let_value<F, S2>(self, f: F) -> LetValue<Self, F>
    where
        F: FnOnce(Self::Value) -> S2 + Send + 'static,
        S2: Sender,
    {
        let_value(self, f)
    }

    /// See [`let_error`]
    fn let_error<F, S2>(self, f: F) -> LetError<Self, F>
    where
        F: FnOnce(Error) -> S2 + Send + 'static,
        S2: Sender<Value = Self::Value>,
    {
        let_error(self, f)
    }

    /// See [`let_stopped`]
    fn let_stopped<F, S2>(self, f: F) -> LetStopped<Self, F>
    where
        F: FnOnce() -> S2 + Send + 'static,
        S2: Sender<Value = Self::Value>,
    {
        let_stopped(self, f)
    }
}

impl<S: Sender> SenderExt for S {}
