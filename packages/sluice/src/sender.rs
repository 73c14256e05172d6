//! Senders, connecting, and completion signatures

use crate::{
    completion::{CompletionSignatures, Signature},
    domain::{Domain, late_domain, resolve_domain},
    env::Env,
    operation::{OperationHandle, OperationState},
    receiver::{AnyReceiver, Receiver},
};
use std::{
    any::type_name,
    fmt::{self, Debug, Formatter},
};


/// Maximum number of consecutive rewrites a domain may apply to one sender while connecting
pub const MAX_TRANSFORM_DEPTH: usize = 64;


/// Lazy description of asynchronous work
///
/// A sender does nothing until it is [connected](connect) to a receiver and the resulting
/// operation is [started](crate::start). It completes with [`Self::Value`](Sender::Value) on the
/// value channel, with an [`Error`](crate::Error) on the error channel, or with nothing on the
/// stopped channel.
pub trait Sender: Send + Sized + 'static {
    /// Type the sender completes with on the value channel
    type Value: Send + 'static;

    /// Operation state this sender produces when connected to `R`
    type Operation<R: Receiver<Self::Value>>: OperationState;

    /// Connect to a receiver, directly
    ///
    /// This bypasses domain transformation. Use the free function [`connect`] instead unless
    /// implementing a sender in terms of an already-transformed one.
    fn connect<R: Receiver<Self::Value>>(self, receiver: R) -> Self::Operation<R>;

    /// The sender's attributes
    fn env(&self) -> Env {
        Env::empty()
    }

    /// The set of completions this sender may deliver to a receiver with environment `env`
    fn completion_signatures(&self, env: &Env) -> CompletionSignatures;

    /// The sender's own transformation hook, consulted by a domain which has no rule for it
    fn transform_sender(self, domain: &Domain, env: &Env) -> Transformed<Self> {
        let _ = (domain, env);
        Transformed::Unchanged(self)
    }

    /// Whether [`transform_sender`](Self::transform_sender) may rewrite this sender in `domain`
    ///
    /// Senders which override the transformation hook should override this as well, so that their
    /// completion signatures account for the rewrite.
    fn may_transform(&self, domain: &Domain) -> bool {
        let _ = domain;
        false
    }

    /// Erase the type of this sender
    fn boxed(self) -> AnySender<Self::Value> {
        AnySender::new(self)
    }
}

/// Result of asking a domain to transform a sender
pub enum Transformed<S: Sender> {
    /// The sender was left as it was
    Unchanged(S),
    /// The sender was replaced by another with the same value type
    Rewritten(AnySender<S::Value>),
}

impl<S: Sender> Transformed<S> {
    /// Whether a rewrite happened
    pub fn is_rewritten(&self) -> bool {
        matches!(self, Transformed::Rewritten(_))
    }

    /// Get the resulting sender, type-erased
    pub fn into_any(self) -> AnySender<S::Value> {
        match self {
            Transformed::Unchanged(sender) => sender.boxed(),
            Transformed::Rewritten(sender) => sender,
        }
    }
}


/// Operation produced by [`connect`]
pub enum Connected<S: Sender, R: Receiver<S::Value>> {
    /// The sender was connected as given
    Direct(S::Operation<R>),
    /// A domain rewrote the sender, and the rewritten sender was connected
    Rewritten(OperationHandle),
}

impl<S: Sender, R: Receiver<S::Value>> OperationState for Connected<S, R> {
    fn start(self) {
        match self {
            Connected::Direct(operation) => operation.start(),
            Connected::Rewritten(operation) => operation.start(),
        }
    }
}

/// Connect a sender to a receiver, producing an operation state
///
/// Before connecting, the sender's domain is determined late, from the sender's attributes and the
/// receiver's environment, and asked to transform the sender until it reaches a fixed point.
///
/// Panics if the sender's completion schedulers disagree on a domain, or if transformation does
/// not reach a fixed point within [`MAX_TRANSFORM_DEPTH`] rewrites.
pub fn connect<S, R>(sender: S, receiver: R) -> Connected<S, R>
where
    S: Sender,
    R: Receiver<S::Value>,
{
    let env = receiver.env();
    let domain = resolve_domain(&sender.env(), &env);
    let mut current = match domain.transform_sender(sender, &env) {
        Transformed::Unchanged(sender) => return Connected::Direct(sender.connect(receiver)),
        Transformed::Rewritten(sender) => sender,
    };
    let mut depth = 1;
    loop {
        match domain.transform_sender(current, &env) {
            Transformed::Unchanged(sender) => {
                trace!(?domain, depth, sender = type_name::<S>(), "connecting rewritten sender");
                return Connected::Rewritten(sender.connect(receiver));
            }
            Transformed::Rewritten(sender) => {
                depth += 1;
                if depth > MAX_TRANSFORM_DEPTH {
                    panic!(
                        "domain {:?} did not reach a fixed point transforming {} within {} rewrites",
                        domain, type_name::<S>(), MAX_TRANSFORM_DEPTH,
                    );
                }
                current = sender;
            }
        }
    }
}

/// Compute the completion signatures of a sender for a receiver with environment `env`
///
/// The domain is determined the same way [`connect`] determines it. If that domain may rewrite
/// the sender, only the value type is known ahead of time, so the answer is that value type plus
/// the error and stopped channels.
///
/// Panics if the sender's completion schedulers disagree on a domain.
pub fn completion_signatures<S: Sender>(sender: &S, env: &Env) -> CompletionSignatures {
    let domain = late_domain(&sender.env(), env);
    if domain.may_rewrite(sender) {
        return CompletionSignatures::value::<S::Value>()
            .with(Signature::error())
            .with(Signature::stopped());
    }
    sender.completion_signatures(env)
}


/// Type-erased [`Sender`]
pub struct AnySender<V>(Box<dyn DynSender<V>>);

trait DynSender<V>: Send {
    fn connect_dyn(self: Box<Self>, receiver: AnyReceiver<V>) -> OperationHandle;

    fn env_dyn(&self) -> Env;

    fn signatures_dyn(&self, env: &Env) -> CompletionSignatures;

    // transform the concrete sender. err if left unchanged.
    fn transform_dyn(
        self: Box<Self>,
        domain: &Domain,
        env: &Env,
    ) -> Result<AnySender<V>, Box<dyn DynSender<V>>>;

    fn may_transform_dyn(&self, domain: &Domain) -> bool;

    fn type_name_dyn(&self) -> &'static str;
}

impl<S: Sender> DynSender<S::Value> for S {
    fn connect_dyn(self: Box<Self>, receiver: AnyReceiver<S::Value>) -> OperationHandle {
        OperationHandle::new((*self).connect(receiver))
    }

    fn env_dyn(&self) -> Env {
        self.env()
    }

    fn signatures_dyn(&self, env: &Env) -> CompletionSignatures {
        self.completion_signatures(env)
    }

    fn transform_dyn(
        self: Box<Self>,
        domain: &Domain,
        env: &Env,
    ) -> Result<AnySender<S::Value>, Box<dyn DynSender<S::Value>>> {
        match domain.transform_sender(*self, env) {
            Transformed::Unchanged(sender) => Err(Box::new(sender)),
            Transformed::Rewritten(sender) => Ok(sender),
        }
    }

    fn may_transform_dyn(&self, domain: &Domain) -> bool {
        domain.may_rewrite(self)
    }

    fn type_name_dyn(&self) -> &'static str {
        type_name::<S>()
    }
}

impl<V: Send + 'static> AnySender<V> {
    /// Erase the type of a sender
    pub fn new<S: Sender<Value = V>>(sender: S) -> Self {
        AnySender(Box::new(sender))
    }

    /// Type name of the underlying sender
    pub fn type_name(&self) -> &'static str {
        self.0.type_name_dyn()
    }
}

impl<V: Send + 'static> Sender for AnySender<V> {
    type Value = V;
    type Operation<R: Receiver<V>> = OperationHandle;

    fn connect<R: Receiver<V>>(self, receiver: R) -> OperationHandle {
        self.0.connect_dyn(AnyReceiver::new(receiver))
    }

    fn env(&self) -> Env {
        self.0.env_dyn()
    }

    fn completion_signatures(&self, env: &Env) -> CompletionSignatures {
        self.0.signatures_dyn(env)
    }

    // domain rules are keyed on the concrete sender type, so look through the erasure.
    fn transform_sender(self, domain: &Domain, env: &Env) -> Transformed<Self> {
        match self.0.transform_dyn(domain, env) {
            Ok(sender) => Transformed::Rewritten(sender),
            Err(sender) => Transformed::Unchanged(AnySender(sender)),
        }
    }

    fn may_transform(&self, domain: &Domain) -> bool {
        self.0.may_transform_dyn(domain)
    }

    fn boxed(self) -> AnySender<V> {
        self
    }
}

impl<V> Debug for AnySender<V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_tuple("AnySender").field(&self.0.type_name_dyn()).finish()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        adaptors::{just, just_error, then, Just},
        completion::Channel,
        query::GetDomain,
        test_util::Recorder,
    };

    #[test]
    fn connect_default_domain_is_direct() {
        let (recorder, recording) = Recorder::new();
        let operation = connect(just(5), recorder);
        assert!(matches!(operation, Connected::Direct(_)));
        operation.start();
        assert_eq!(recording.value(), 5);
    }

    #[test]
    fn any_sender_roundtrips_completion() {
        let sender = then(just((1, 2)), |(a, b)| a * b).boxed();
        assert!(sender.type_name().contains("BasicSender"));
        let (recorder, recording) = Recorder::new();
        connect(sender, recorder).start();
        assert_eq!(recording.value(), 2);
    }

    #[test]
    fn signatures_of_erased_sender() {
        let sender = just_error::<String>(anyhow::anyhow!("no")).boxed();
        let sigs = completion_signatures(&sender, &Env::empty());
        assert_eq!(sigs.len(), 1);
        assert!(sigs.contains(&Signature::error()));
        assert!(!sigs.sends(Channel::Value));
    }

    #[test]
    fn signatures_account_for_receiver_domain() {
        let domain = Domain::builder("failing")
            .rule(|_: Just<i32>, _: &Env| just_error::<i32>(anyhow::anyhow!("rewritten")).boxed())
            .build();
        let env = Env::empty().with(GetDomain, domain);

        // the rule applies through erasure and below an adaptor too
        for sigs in [
            completion_signatures(&just(1), &env),
            completion_signatures(&just(1).boxed(), &env),
            completion_signatures(&then(just(1), |v| v + 1), &env),
        ] {
            assert!(sigs.sends(Channel::Error));
            assert!(sigs.contains(&Signature::value::<i32>()));
        }
        assert!(!completion_signatures(&just(1), &Env::empty()).sends(Channel::Error));

        // what was declared covers what is delivered
        let sigs = completion_signatures(&just(1), &env);
        let (recorder, recording) = Recorder::<i32>::with_env(env);
        connect(just(1), recorder).start();
        let completion = recording.single();
        assert_eq!(completion.channel(), Channel::Error);
        assert!(sigs.sends(completion.channel()));
    }
}
