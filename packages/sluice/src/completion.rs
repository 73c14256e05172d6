//! The completion protocol and completion signatures
//!
//! Every operation finishes through exactly one of three channels: the value channel, the error
//! channel, or the stopped channel. [`Completion`] is that outcome as a value, and
//! [`CompletionSignatures`] is the declared set of outcomes a sender may finish with.

use crate::{
    error::Error,
    receiver::Receiver,
};
use smallvec::SmallVec;
use std::{
    any::{TypeId, type_name},
    fmt::{self, Debug, Formatter},
};


/// One of the three completion channels
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Channel {
    /// Successful completion, carrying the sender's value
    Value,
    /// Failed completion, carrying an [`Error`]
    Error,
    /// Cancelled completion, carrying nothing
    Stopped,
}

/// Marker type for a completion channel, used to parameterize queries and combinators by channel
pub trait ChannelTag: Copy + Default + Send + Sync + 'static {
    /// The runtime channel this marker stands for
    const CHANNEL: Channel;
}

/// Marker for the value channel
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SetValue;

/// Marker for the error channel
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SetError;

/// Marker for the stopped channel
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct SetStopped;

impl ChannelTag for SetValue {
    const CHANNEL: Channel = Channel::Value;
}

impl ChannelTag for SetError {
    const CHANNEL: Channel = Channel::Error;
}

impl ChannelTag for SetStopped {
    const CHANNEL: Channel = Channel::Stopped;
}


/// The outcome of an operation
pub enum Completion<V> {
    /// Completed with a value
    Value(V),
    /// Completed with an error
    Error(Error),
    /// Completed without a result because work was cancelled
    Stopped,
}

impl<V> Completion<V> {
    /// The channel this completion is delivered on
    pub fn channel(&self) -> Channel {
        match self {
            Completion::Value(_) => Channel::Value,
            Completion::Error(_) => Channel::Error,
            Completion::Stopped => Channel::Stopped,
        }
    }

    /// Invoke the receiver's completion method for this outcome
    pub fn deliver<R: Receiver<V>>(self, receiver: R) {
        match self {
            Completion::Value(value) => receiver.set_value(value),
            Completion::Error(error) => receiver.set_error(error),
            Completion::Stopped => receiver.set_stopped(),
        }
    }

    /// Convert into a `Result`, where `Ok(None)` represents the stopped channel
    pub fn into_result(self) -> Result<Option<V>, Error> {
        match self {
            Completion::Value(value) => Ok(Some(value)),
            Completion::Error(error) => Err(error),
            Completion::Stopped => Ok(None),
        }
    }
}

impl<V: Debug> Debug for Completion<V> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Completion::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Completion::Error(error) => f.debug_tuple("Error").field(error).finish(),
            Completion::Stopped => f.write_str("Stopped"),
        }
    }
}


/// A single declared way for a sender to complete
///
/// The value channel records the value's type. The error channel always carries [`Error`] and the
/// stopped channel carries nothing, so they record no type.
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct Signature {
    channel: Channel,
    // (type id, type name) of the value, for value signatures only.
    value: Option<(TypeId, &'static str)>,
}

impl Signature {
    /// Signature for completing with a value of type `V`
    pub fn value<V: 'static>() -> Self {
        Signature { channel: Channel::Value, value: Some((TypeId::of::<V>(), type_name::<V>())) }
    }

    /// Signature for completing with an error
    pub fn error() -> Self {
        Signature { channel: Channel::Error, value: None }
    }

    /// Signature for completing with stopped
    pub fn stopped() -> Self {
        Signature { channel: Channel::Stopped, value: None }
    }

    /// The channel of this signature
    pub fn channel(&self) -> Channel {
        self.channel
    }

    /// Type name of the value, for value signatures
    pub fn value_type_name(&self) -> Option<&'static str> {
        self.value.map(|(_, name)| name)
    }

    /// Whether this is the value signature for type `V`
    pub fn is_value_of<V: 'static>(&self) -> bool {
        self.value.is_some_and(|(id, _)| id == TypeId::of::<V>())
    }
}

impl Debug for Signature {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match (self.channel, self.value) {
            (Channel::Value, Some((_, name))) => write!(f, "set_value({})", name),
            (Channel::Value, None) => f.write_str("set_value(?)"),
            (Channel::Error, _) => f.write_str("set_error(Error)"),
            (Channel::Stopped, _) => f.write_str("set_stopped()"),
        }
    }
}


/// The set of ways a sender may complete in a given environment
///
/// This is an over-approximation: every completion an operation actually delivers is a member of
/// the set, but members may be unreachable. Entries are kept unique.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CompletionSignatures {
    sigs: SmallVec<[Signature; 4]>,
}

impl CompletionSignatures {
    /// Construct empty (a sender that never completes)
    pub fn new() -> Self {
        CompletionSignatures::default()
    }

    /// Construct with the single value signature for `V`
    pub fn value<V: 'static>() -> Self {
        CompletionSignatures::new().with(Signature::value::<V>())
    }

    /// Construct with the single error signature
    pub fn error() -> Self {
        CompletionSignatures::new().with(Signature::error())
    }

    /// Construct with the single stopped signature
    pub fn stopped() -> Self {
        CompletionSignatures::new().with(Signature::stopped())
    }

    /// Add a signature, if not already present
    pub fn insert(&mut self, sig: Signature) {
        if !self.sigs.contains(&sig) {
            self.sigs.push(sig);
        }
    }

    /// Ownership-chaining version of [`insert`](Self::insert)
    pub fn with(mut self, sig: Signature) -> Self {
        self.insert(sig);
        self
    }

    /// Set union
    pub fn union(mut self, other: &CompletionSignatures) -> Self {
        for &sig in other.iter() {
            self.insert(sig);
        }
        self
    }

    /// Remove all signatures of the given channel
    pub fn without(mut self, channel: Channel) -> Self {
        self.sigs.retain(|sig| sig.channel != channel);
        self
    }

    /// Replace all signatures of the given channel with the contents of `replacement`
    ///
    /// This is how adaptors that transform one channel compute their signatures: the child's
    /// signatures on the targeted channel are swapped for whatever the transformation produces.
    pub fn replace(self, channel: Channel, replacement: &CompletionSignatures) -> Self {
        if self.sends(channel) {
            self.without(channel).union(replacement)
        } else {
            self
        }
    }

    /// Whether any signature is on the given channel
    pub fn sends(&self, channel: Channel) -> bool {
        self.sigs.iter().any(|sig| sig.channel == channel)
    }

    /// Whether the set contains the signature
    pub fn contains(&self, sig: &Signature) -> bool {
        self.sigs.contains(sig)
    }

    /// Number of signatures
    pub fn len(&self) -> usize {
        self.sigs.len()
    }

    /// Whether there are no signatures
    pub fn is_empty(&self) -> bool {
        self.sigs.is_empty()
    }

    /// Iterate over the signatures
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.sigs.iter()
    }
}

impl Debug for CompletionSignatures {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.debug_set().entries(self.sigs.iter()).finish()
    }
}
