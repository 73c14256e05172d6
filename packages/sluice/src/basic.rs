//! Generic sender substrate
//!
//! Most senders in this crate are a [`BasicSender`]: a tag type, a data payload, and zero or one
//! child senders. The tag type says what the sender does by implementing the customization traits
//! of this module, and everything else (connecting, children, attributes, operation states) is
//! shared.
//!
//! - [`SenderImpl`] is implemented by every tag. It names the value type and the per-operation
//!   state, and computes attributes and completion signatures.
//! - [`StartImpl`] is implemented by leaf tags (no children). It delivers the completion when the
//!   operation is started.
//! - [`CompleteImpl`] is implemented by adaptor tags (one child). It receives the child's
//!   completion and produces the parent's.

use crate::{
    completion::{Completion, CompletionSignatures},
    env::Env,
    domain::resolve_domain,
    error::Error,
    operation::OperationState,
    receiver::Receiver,
    sender::{completion_signatures, connect, Connected, Sender},
};
use std::{
    any::type_name,
    fmt::{self, Debug, Formatter},
    marker::PhantomData,
};


/// Sender composed of a tag `T`, data `D`, and children `C`, which is `()` or `(S,)`
pub struct BasicSender<T, D, C> {
    tag: PhantomData<fn() -> T>,
    data: D,
    children: C,
}

impl<T, D, C> BasicSender<T, D, C> {
    /// Construct from parts
    pub fn new(data: D, children: C) -> Self {
        BasicSender { tag: PhantomData, data, children }
    }

    /// The data payload
    pub fn data(&self) -> &D {
        &self.data
    }

    /// The children
    pub fn children(&self) -> &C {
        &self.children
    }

    /// Decompose into data payload and children
    pub fn into_parts(self) -> (D, C) {
        (self.data, self.children)
    }
}

impl<T, D, C> Debug for BasicSender<T, D, C> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_struct("BasicSender")
            .field("tag", &type_name::<T>())
            .finish_non_exhaustive()
    }
}


/// Child senders of a [`BasicSender`]
pub trait Children: Send + 'static {
    /// Attributes adaptors expose by default: the forwarded attributes of the single child, or
    /// nothing if there are no children
    fn attrs(&self) -> Env;

    /// Union of the children's completion signatures
    fn signatures(&self, env: &Env) -> CompletionSignatures;
}

impl Children for () {
    fn attrs(&self) -> Env {
        Env::empty()
    }

    fn signatures(&self, _: &Env) -> CompletionSignatures {
        CompletionSignatures::new()
    }
}

impl<S: Sender> Children for (S,) {
    fn attrs(&self) -> Env {
        self.0.env().forwarded()
    }

    fn signatures(&self, env: &Env) -> CompletionSignatures {
        completion_signatures(&self.0, env)
    }
}


/// Customization table entries every tag provides
pub trait SenderImpl<D, C: Children>: Sized + 'static {
    /// Value the sender completes with
    type Value: Send + 'static;

    /// State carried by the operation from connect to completion
    type State: Send + 'static;

    /// Turn the data payload into operation state, at connect time
    fn get_state(data: D) -> Self::State;

    /// The sender's attributes
    fn attrs(data: &D, children: &C) -> Env {
        let _ = data;
        children.attrs()
    }

    /// The sender's completion signatures for a receiver with environment `env`
    fn signatures(data: &D, children: &C, env: &Env) -> CompletionSignatures;

    /// The environment of the receiver connected to the child
    ///
    /// `env` is the environment of `receiver`, after the domain's environment rule for this sender
    /// has been applied to it. By default the child sees exactly that.
    fn child_env<R: Receiver<Self::Value>>(state: &Self::State, receiver: &R, env: Env) -> Env {
        let _ = (state, receiver);
        env
    }
}

/// Customization for tags without children: what happens on start
pub trait StartImpl<D>: SenderImpl<D, ()> {
    /// Deliver the completion
    fn start<R: Receiver<Self::Value>>(state: Self::State, receiver: R);
}

/// Customization for tags with one child: what happens when the child completes
pub trait CompleteImpl<D, S: Sender>: SenderImpl<D, (S,)> {
    /// Handle completion of the child with the given index
    fn complete<R: Receiver<Self::Value>>(
        index: usize,
        state: Self::State,
        receiver: R,
        completion: Completion<S::Value>,
    );
}

/// Deliver a child's completion to the parent's receiver unchanged
pub fn forward<V, R: Receiver<V>>(receiver: R, completion: Completion<V>) {
    completion.deliver(receiver)
}


// ==== leaf senders ====


/// Operation state of a [`BasicSender`] without children
pub struct LeafOperation<T: SenderImpl<D, ()>, D, R> {
    state: T::State,
    receiver: R,
    _data: PhantomData<fn() -> D>,
}

impl<T, D, R> OperationState for LeafOperation<T, D, R>
where
    T: StartImpl<D>,
    D: 'static,
    R: Receiver<T::Value>,
{
    fn start(self) {
        T::start(self.state, self.receiver)
    }
}

impl<T, D> Sender for BasicSender<T, D, ()>
where
    T: StartImpl<D>,
    D: Send + 'static,
{
    type Value = T::Value;
    type Operation<R: Receiver<T::Value>> = LeafOperation<T, D, R>;

    fn connect<R: Receiver<T::Value>>(self, receiver: R) -> LeafOperation<T, D, R> {
        LeafOperation { state: T::get_state(self.data), receiver, _data: PhantomData }
    }

    fn env(&self) -> Env {
        T::attrs(&self.data, &self.children)
    }

    fn completion_signatures(&self, env: &Env) -> CompletionSignatures {
        T::signatures(&self.data, &self.children, env)
    }
}


// ==== single-child senders ====


/// Receiver connected to the child of a [`BasicSender`], routing its completion to the tag
pub struct ChildReceiver<T: SenderImpl<D, (S,)>, D, S: Sender, R> {
    index: usize,
    state: T::State,
    receiver: R,
    // receiver env as rewritten by a domain env rule, if one applied at connect.
    env: Option<Env>,
    _data: PhantomData<fn() -> D>,
}

impl<T, D, S, R> Receiver<S::Value> for ChildReceiver<T, D, S, R>
where
    T: CompleteImpl<D, S>,
    D: 'static,
    S: Sender,
    R: Receiver<T::Value>,
{
    fn set_value(self, value: S::Value) {
        T::complete(self.index, self.state, self.receiver, Completion::Value(value))
    }

    fn set_error(self, error: Error) {
        T::complete(self.index, self.state, self.receiver, Completion::Error(error))
    }

    fn set_stopped(self) {
        T::complete(self.index, self.state, self.receiver, Completion::Stopped)
    }

    fn env(&self) -> Env {
        let env = match &self.env {
            Some(env) => env.clone(),
            None => self.receiver.env(),
        };
        T::child_env(&self.state, &self.receiver, env)
    }
}

impl<T, D, S> Sender for BasicSender<T, D, (S,)>
where
    T: CompleteImpl<D, S>,
    D: Send + 'static,
    S: Sender,
{
    type Value = T::Value;
    type Operation<R: Receiver<T::Value>> = Connected<S, ChildReceiver<T, D, S, R>>;

    fn connect<R: Receiver<T::Value>>(self, receiver: R) -> Self::Operation<R> {
        let receiver_env = receiver.env();
        let domain = resolve_domain(&self.env(), &receiver_env);
        let env = domain.has_env_rule::<Self>()
            .then(|| domain.transform_env(&self, receiver_env));
        let state = T::get_state(self.data);
        let (child,) = self.children;
        connect(child, ChildReceiver { index: 0, state, receiver, env, _data: PhantomData })
    }

    fn env(&self) -> Env {
        T::attrs(&self.data, &self.children)
    }

    fn completion_signatures(&self, env: &Env) -> CompletionSignatures {
        T::signatures(&self.data, &self.children, env)
    }
}
